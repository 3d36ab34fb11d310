//! The privileged `setup-admin` function endpoint. Callable only with the
//! service key configured out of band; answers browser preflight with
//! permissive CORS headers so an admin console can invoke it directly.

use crate::{bearer_token, AppState};
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use monitore_core::bootstrap;
use serde::Serialize;
use tracing::{error, info};

#[derive(Debug, Serialize)]
struct AdminSetupResponse {
    success: bool,
    message: String,
    #[serde(rename = "userExists", skip_serializing_if = "Option::is_none")]
    user_exists: Option<bool>,
}

fn cors_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        "access-control-allow-origin",
        HeaderValue::from_static("*"),
    );
    headers.insert(
        "access-control-allow-headers",
        HeaderValue::from_static("authorization, x-client-info, apikey, content-type"),
    );
    headers
}

pub(crate) async fn preflight() -> Response {
    (StatusCode::NO_CONTENT, cors_headers()).into_response()
}

pub(crate) async fn invoke(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if bearer_token(&headers) != Some(state.service_key.as_ref()) {
        let body = AdminSetupResponse {
            success: false,
            message: "unauthorized".to_string(),
            user_exists: None,
        };
        return (StatusCode::UNAUTHORIZED, cors_headers(), Json(body)).into_response();
    }

    let mut conn = state.db.lock().await;
    match bootstrap::ensure_admin(&mut conn) {
        Ok(outcome) => {
            info!(user_exists = outcome.user_exists, "admin setup complete");
            let body = AdminSetupResponse {
                success: true,
                message: if outcome.user_exists {
                    "Admin user already exists".to_string()
                } else {
                    "Admin user created successfully".to_string()
                },
                user_exists: Some(outcome.user_exists),
            };
            (StatusCode::OK, cors_headers(), Json(body)).into_response()
        }
        Err(err) => {
            error!(error = %err, "admin setup failed");
            let body = AdminSetupResponse {
                success: false,
                message: err.to_string(),
                user_exists: None,
            };
            (StatusCode::INTERNAL_SERVER_ERROR, cors_headers(), Json(body)).into_response()
        }
    }
}
