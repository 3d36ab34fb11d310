#![forbid(unsafe_code)]

use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use monitore_core::notify::ChangeEvent;
use monitore_core::CoreError;
use rusqlite::Connection;
use serde_json::json;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};

mod feed;
mod routes;
mod setup_admin;

pub const CRATE_NAME: &str = "monitore-server";

/// How many change events a slow SSE subscriber may fall behind before the
/// feed drops events for it. Consumers treat the feed as advisory and
/// re-fetch after a gap.
const CHANGE_FEED_CAPACITY: usize = 256;

#[derive(Clone)]
pub struct AppState {
    db: Arc<Mutex<Connection>>,
    changes: broadcast::Sender<ChangeEvent>,
    service_key: Arc<str>,
}

impl AppState {
    pub fn new(conn: Connection, service_key: impl Into<Arc<str>>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_FEED_CAPACITY);
        AppState {
            db: Arc::new(Mutex::new(conn)),
            changes,
            service_key: service_key.into(),
        }
    }

    pub(crate) fn publish(&self, event: ChangeEvent) {
        // Zero receivers is normal when no dashboard is connected.
        let _ = self.changes.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.changes.subscribe()
    }
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/healthz", get(routes::healthz))
        .route("/v1/auth/login", post(routes::login))
        .route(
            "/v1/occurrences",
            get(routes::list_occurrences).post(routes::create_occurrence),
        )
        .route(
            "/v1/occurrences/:id",
            get(routes::get_occurrence)
                .patch(routes::update_occurrence)
                .delete(routes::delete_occurrence),
        )
        .route("/v1/occurrences/:id/comments", post(routes::add_comment))
        .route("/v1/occurrences/:id/contact", get(routes::get_contact))
        .route("/v1/changes", get(feed::change_feed))
        .route(
            "/functions/v1/setup-admin",
            post(setup_admin::invoke).options(setup_admin::preflight),
        )
        .with_state(state)
}

/// Boundary mapping from the core failure taxonomy onto HTTP. Authorization
/// denials stay generic; storage failures are marked retryable.
pub struct ApiError(pub CoreError);

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self.0 {
            CoreError::Validation { field, message } => (
                StatusCode::BAD_REQUEST,
                "validation",
                format!("{field}: {message}"),
            ),
            CoreError::AccessDenied => (
                StatusCode::FORBIDDEN,
                "access_denied",
                "access denied".to_string(),
            ),
            CoreError::NotFound => (StatusCode::NOT_FOUND, "not_found", "not found".to_string()),
            CoreError::Store(detail) => {
                tracing::error!(detail = %detail, "storage failure");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "store_unavailable",
                    "temporary storage failure, retry later".to_string(),
                )
            }
            CoreError::Bootstrap(detail) => {
                tracing::error!(detail = %detail, "bootstrap failure");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "bootstrap_failed",
                    detail.clone(),
                )
            }
        };
        (status, Json(json!({ "error": code, "message": message }))).into_response()
    }
}

pub(crate) fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
}
