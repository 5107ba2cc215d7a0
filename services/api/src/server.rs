use crate::cli::ServeArgs;
use crate::infra::{seed_demo_data, AppState, InMemoryStore, LocalMediaStore, StaticDirectory};
use crate::routes::with_service_routes;
use axum::Extension;
use axum_prometheus::PrometheusMetricLayer;
use chrono::Utc;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use checkbot::checklists::drafts::DraftStore;
use checkbot::checklists::BotState;
use checkbot::config::AppConfig;
use checkbot::error::AppError;
use checkbot::telemetry;
use tracing::{info, warn};

pub(crate) async fn run(mut args: ServeArgs) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;

    if let Some(host) = args.host.take() {
        config.server.host = host;
    }
    if let Some(port) = args.port.take() {
        config.server.port = port;
    }

    telemetry::init(&config.telemetry)?;

    let (prometheus_layer, prometheus_handle) = PrometheusMetricLayer::pair();
    let readiness_flag = Arc::new(std::sync::atomic::AtomicBool::new(false));
    let app_state = AppState {
        readiness: readiness_flag.clone(),
        metrics: Arc::new(prometheus_handle),
    };

    let store = Arc::new(InMemoryStore::default());
    seed_demo_data(&store);
    let media = Arc::new(LocalMediaStore::new(config.media.root.clone()));
    let directory = Arc::new(StaticDirectory::demo());
    let bot_state = Arc::new(BotState::new(store.clone(), media, directory.clone()));

    // stale-draft sweep runs off the request path
    let sweep_ttl = config.drafts.ttl();
    let sweep_store = store.clone();
    tokio::spawn(async move {
        let drafts = DraftStore::new(sweep_store);
        let mut ticker = tokio::time::interval(std::time::Duration::from_secs(3600));
        loop {
            ticker.tick().await;
            if let Err(err) = drafts.sweep_stale(Utc::now(), sweep_ttl) {
                warn!(error = %err, "stale draft sweep failed");
            }
        }
    });

    let app = with_service_routes(bot_state)
        .layer(Extension(app_state))
        .layer(Extension(directory))
        .layer(prometheus_layer);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    readiness_flag.store(true, Ordering::Release);

    info!(?config.environment, %addr, "checklist bot service ready");

    axum::serve(listener, app).await?;
    Ok(())
}
