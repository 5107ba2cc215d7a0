use crate::infra::{AppState, StaticDirectory};
use axum::extract::Extension;
use axum::http::{header, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use checkbot::checklists::auth::{CredentialVerifier, UserDirectory};
use checkbot::checklists::media::MediaStore;
use checkbot::checklists::storage::{AttemptRepository, CatalogRepository, DraftRepository};
use checkbot::checklists::{bot_router, BotState};

/// Bot endpoints from the library plus the service-level probes and login.
pub(crate) fn with_service_routes<S, M, U>(state: Arc<BotState<S, M, U>>) -> axum::Router
where
    S: CatalogRepository + DraftRepository + AttemptRepository + 'static,
    M: MediaStore + 'static,
    U: UserDirectory + 'static,
{
    bot_router(state)
        .route("/health", axum::routing::get(healthcheck))
        .route("/ready", axum::routing::get(readiness_endpoint))
        .route("/metrics", axum::routing::get(metrics_endpoint))
        .route("/api/v1/login", axum::routing::post(login_endpoint))
}

pub(crate) async fn healthcheck() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

pub(crate) async fn readiness_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    let ready = state.readiness.load(std::sync::atomic::Ordering::Relaxed);
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let payload = if ready {
        json!({ "status": "ready" })
    } else {
        json!({ "status": "initializing" })
    };

    (status, Json(payload))
}

pub(crate) async fn metrics_endpoint(Extension(state): Extension<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.metrics.render(),
    )
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginRequest {
    pub(crate) login: String,
    pub(crate) password: String,
}

pub(crate) async fn login_endpoint(
    Extension(directory): Extension<Arc<StaticDirectory>>,
    Json(request): Json<LoginRequest>,
) -> impl IntoResponse {
    match directory.verify(&request.login, &request.password) {
        Some(profile) => (StatusCode::OK, Json(json!({ "user": profile }))),
        None => (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "invalid credentials" })),
        ),
    }
}
