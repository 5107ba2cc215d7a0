//! HTTP surface for the checklist bot: a JSON stand-in for any chat
//! transport (events in, commands out), report retrieval for the export
//! renderer, and the admin CSV import.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;

use super::auth::UserDirectory;
use super::catalog::import::{ChecklistCsvImporter, ImportError, ImportRequest};
use super::catalog::CatalogReader;
use super::conversation::{ConversationEngine, InboundEvent};
use super::domain::{AttemptId, TenantId, UserId};
use super::media::MediaStore;
use super::report::{ReportAssembler, ReportError};
use super::storage::{AttemptRepository, CatalogRepository, DraftRepository, StorageError};

/// Everything the HTTP handlers need, bundled once at startup.
pub struct BotState<S, M, U> {
    pub engine: ConversationEngine<S, M>,
    pub reports: ReportAssembler<S, S>,
    pub importer: ChecklistCsvImporter<S>,
    pub directory: Arc<U>,
}

impl<S, M, U> BotState<S, M, U>
where
    S: CatalogRepository + DraftRepository + AttemptRepository,
    M: MediaStore,
    U: UserDirectory,
{
    pub fn new(storage: Arc<S>, media: Arc<M>, directory: Arc<U>) -> Self {
        let catalog = CatalogReader::new(storage.clone());
        Self {
            engine: ConversationEngine::new(storage.clone(), media),
            reports: ReportAssembler::new(catalog, storage.clone()),
            importer: ChecklistCsvImporter::new(storage),
            directory,
        }
    }
}

/// Router builder exposing the conversation, report, and import endpoints.
pub fn bot_router<S, M, U>(state: Arc<BotState<S, M, U>>) -> Router
where
    S: CatalogRepository + DraftRepository + AttemptRepository + 'static,
    M: MediaStore + 'static,
    U: UserDirectory + 'static,
{
    Router::new()
        .route(
            "/api/v1/conversations/:user_id/events",
            post(conversation_handler::<S, M, U>),
        )
        .route(
            "/api/v1/attempts/:attempt_id/report",
            get(report_handler::<S, M, U>),
        )
        .route(
            "/api/v1/checklists/import",
            post(import_handler::<S, M, U>),
        )
        .with_state(state)
}

pub(crate) async fn conversation_handler<S, M, U>(
    State(state): State<Arc<BotState<S, M, U>>>,
    Path(user_id): Path<String>,
    axum::Json(event): axum::Json<InboundEvent>,
) -> Response
where
    S: CatalogRepository + DraftRepository + AttemptRepository + 'static,
    M: MediaStore + 'static,
    U: UserDirectory + 'static,
{
    let user = match state.directory.user(&UserId(user_id)) {
        Ok(Some(profile)) => profile,
        Ok(None) => {
            let payload = json!({ "error": "unknown user" });
            return (StatusCode::NOT_FOUND, axum::Json(payload)).into_response();
        }
        Err(err) => return storage_error_response(err),
    };

    // conversation turns may block on media fetches, so they run off the
    // async dispatch path; other sessions keep flowing meanwhile
    let worker_state = state.clone();
    let turn =
        tokio::task::spawn_blocking(move || worker_state.engine.handle(&user, event, Utc::now()))
            .await;

    match turn {
        Ok(commands) => (StatusCode::OK, axum::Json(commands)).into_response(),
        Err(_) => {
            let payload = json!({ "error": "conversation worker failed" });
            (StatusCode::INTERNAL_SERVER_ERROR, axum::Json(payload)).into_response()
        }
    }
}

pub(crate) async fn report_handler<S, M, U>(
    State(state): State<Arc<BotState<S, M, U>>>,
    Path(attempt_id): Path<String>,
) -> Response
where
    S: CatalogRepository + DraftRepository + AttemptRepository + 'static,
    M: MediaStore + 'static,
    U: UserDirectory + 'static,
{
    match state.reports.assemble(&AttemptId(attempt_id)) {
        Ok(report) => (StatusCode::OK, axum::Json(report)).into_response(),
        Err(ReportError::AttemptNotFound) => {
            let payload = json!({ "error": "attempt not found" });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
        Err(ReportError::Catalog(err)) => {
            let payload = json!({ "error": err.to_string() });
            (StatusCode::NOT_FOUND, axum::Json(payload)).into_response()
        }
        Err(ReportError::Storage(err)) => storage_error_response(err),
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct ImportParams {
    pub(crate) tenant: String,
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) scored: bool,
    pub(crate) created_by: String,
}

pub(crate) async fn import_handler<S, M, U>(
    State(state): State<Arc<BotState<S, M, U>>>,
    Query(params): Query<ImportParams>,
    body: String,
) -> Response
where
    S: CatalogRepository + DraftRepository + AttemptRepository + 'static,
    M: MediaStore + 'static,
    U: UserDirectory + 'static,
{
    let request = ImportRequest {
        tenant: TenantId(params.tenant),
        name: params.name,
        is_scored: params.scored,
        created_by: UserId(params.created_by),
    };

    match state
        .importer
        .from_reader(body.as_bytes(), request, Utc::now())
    {
        Ok(checklist) => {
            let payload = json!({ "checklist_id": checklist.0 });
            (StatusCode::CREATED, axum::Json(payload)).into_response()
        }
        Err(ImportError::Storage(err)) => storage_error_response(err),
        Err(other) => {
            let payload = json!({ "error": other.to_string() });
            (StatusCode::UNPROCESSABLE_ENTITY, axum::Json(payload)).into_response()
        }
    }
}

fn storage_error_response(err: StorageError) -> Response {
    let status = match err {
        StorageError::Conflict => StatusCode::CONFLICT,
        StorageError::NotFound => StatusCode::NOT_FOUND,
        StorageError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    };
    let payload = json!({ "error": err.to_string() });
    (status, axum::Json(payload)).into_response()
}
