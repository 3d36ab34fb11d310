use crate::{bearer_token, ApiError, AppState};
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use monitore_core::notify::ChangeEvent;
use monitore_core::schema::{Category, NewOccurrence, Occurrence, Priority, Status};
use monitore_core::{access, auth, lifecycle, CoreError, Principal};
use serde::{Deserialize, Serialize};
use tracing::info;

pub(crate) async fn healthz() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok", "service": crate::CRATE_NAME }))
}

#[derive(Debug, Deserialize)]
pub(crate) struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct LoginResponse {
    token: String,
    user_id: String,
}

pub(crate) async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let conn = state.db.lock().await;
    let session = auth::login(&conn, request.email.trim(), &request.password)?;
    info!(user_id = %session.user_id, "session opened");
    Ok(Json(LoginResponse {
        token: session.token,
        user_id: session.user_id,
    }))
}

pub(crate) async fn create_occurrence(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(submission): Json<NewOccurrence>,
) -> Result<impl IntoResponse, ApiError> {
    let mut conn = state.db.lock().await;
    let principal = auth::principal_for_token(&conn, bearer_token(&headers))?;
    let created = lifecycle::submit(&mut conn, &principal, &submission)?;
    drop(conn);

    info!(id = %created.id, category = created.category.as_str(), "occurrence created");
    state.publish(ChangeEvent::Insert {
        occurrence: created.clone(),
    });
    Ok((StatusCode::CREATED, Json(created)))
}

/// Dashboard filters, matching the triage panel: status, category, priority,
/// accessibility flag and a free-text search over address and description.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ListParams {
    status: Option<String>,
    category: Option<String>,
    priority: Option<String>,
    accessibility: Option<bool>,
    q: Option<String>,
}

fn matches_filters(occurrence: &Occurrence, params: &ParsedFilters) -> bool {
    if let Some(status) = params.status {
        if occurrence.status != status {
            return false;
        }
    }
    if let Some(category) = params.category {
        if occurrence.category != category {
            return false;
        }
    }
    if let Some(priority) = params.priority {
        if occurrence.priority != priority {
            return false;
        }
    }
    if let Some(accessibility) = params.accessibility {
        if occurrence.accessibility_affected != accessibility {
            return false;
        }
    }
    if let Some(needle) = &params.search {
        let haystack = format!(
            "{} {}",
            occurrence.address.to_lowercase(),
            occurrence.description.to_lowercase()
        );
        if !haystack.contains(needle) {
            return false;
        }
    }
    true
}

struct ParsedFilters {
    status: Option<Status>,
    category: Option<Category>,
    priority: Option<Priority>,
    accessibility: Option<bool>,
    search: Option<String>,
}

impl ListParams {
    fn parse(self) -> Result<ParsedFilters, CoreError> {
        Ok(ParsedFilters {
            status: self.status.as_deref().map(Status::parse).transpose()?,
            category: self.category.as_deref().map(Category::parse).transpose()?,
            priority: self.priority.as_deref().map(Priority::parse).transpose()?,
            accessibility: self.accessibility,
            search: self
                .q
                .as_deref()
                .map(str::trim)
                .filter(|q| !q.is_empty())
                .map(str::to_lowercase),
        })
    }
}

pub(crate) async fn list_occurrences(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Occurrence>>, ApiError> {
    let filters = params.parse()?;
    let conn = state.db.lock().await;
    let principal = auth::principal_for_token(&conn, bearer_token(&headers))?;
    let visible = lifecycle::list(&conn, &principal)?;
    let filtered = visible
        .into_iter()
        .filter(|occurrence| matches_filters(occurrence, &filters))
        .collect();
    Ok(Json(filtered))
}

pub(crate) async fn get_occurrence(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Occurrence>, ApiError> {
    let conn = state.db.lock().await;
    let principal = auth::principal_for_token(&conn, bearer_token(&headers))?;
    Ok(Json(lifecycle::fetch(&conn, &principal, &id)?))
}

#[derive(Debug, Deserialize)]
pub(crate) struct TriageRequest {
    status: Option<String>,
    priority: Option<String>,
}

pub(crate) async fn update_occurrence(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(request): Json<TriageRequest>,
) -> Result<Json<Occurrence>, ApiError> {
    let status = request.status.as_deref().map(Status::parse).transpose()?;
    let priority = request
        .priority
        .as_deref()
        .map(Priority::parse)
        .transpose()?;

    let conn = state.db.lock().await;
    let principal = auth::principal_for_token(&conn, bearer_token(&headers))?;
    let updated = lifecycle::update_triage(&conn, &principal, &id, status, priority)?;
    drop(conn);

    info!(id = %updated.id, status = updated.status.as_str(), priority = updated.priority.as_str(), "occurrence triaged");
    state.publish(ChangeEvent::Update {
        occurrence: updated.clone(),
    });
    Ok(Json(updated))
}

#[derive(Debug, Deserialize)]
pub(crate) struct CommentRequest {
    text: String,
}

pub(crate) async fn add_comment(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(request): Json<CommentRequest>,
) -> Result<Json<Occurrence>, ApiError> {
    let mut conn = state.db.lock().await;
    let principal = auth::principal_for_token(&conn, bearer_token(&headers))?;
    let updated = lifecycle::add_comment(&mut conn, &principal, &id, &request.text)?;
    drop(conn);

    info!(id = %updated.id, entries = updated.history.len(), "comment appended");
    state.publish(ChangeEvent::Update {
        occurrence: updated.clone(),
    });
    Ok(Json(updated))
}

pub(crate) async fn delete_occurrence(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let conn = state.db.lock().await;
    let principal = auth::principal_for_token(&conn, bearer_token(&headers))?;
    lifecycle::remove(&conn, &principal, &id)?;
    drop(conn);

    info!(id = %id, "occurrence deleted");
    state.publish(ChangeEvent::Delete { id });
    Ok(StatusCode::NO_CONTENT)
}

pub(crate) async fn get_contact(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let conn = state.db.lock().await;
    let principal = auth::principal_for_token(&conn, bearer_token(&headers))?;
    let contact = lifecycle::fetch_contact(&conn, &principal, &id)?;
    Ok(Json(contact))
}

/// Admin gate shared with the SSE feed.
pub(crate) fn require_admin(principal: &Principal) -> Result<(), CoreError> {
    if access::can_mutate(principal).is_allowed() {
        Ok(())
    } else {
        Err(CoreError::AccessDenied)
    }
}
