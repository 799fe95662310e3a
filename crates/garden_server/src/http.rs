//! HTTP endpoint handlers

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use garden_core::{
    core_version, FeedParams, FeedResponse, FeedService, Item, ItemDraft, ItemService, RepoError,
    ServiceError, SqliteItemRepository,
};
use log::{debug, error, info};
use serde::Deserialize;
use serde_json::json;

use crate::session::{expired_session_cookie, session_cookie, session_token};
use crate::AppState;

/// Error returned by handlers, rendered as `{ "error": message }`.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized,
    NotFound(String),
    Internal(String),
}

impl ApiError {
    fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn message(&self) -> &str {
        match self {
            Self::BadRequest(message) | Self::NotFound(message) | Self::Internal(message) => {
                message
            }
            Self::Unauthorized => "login required",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            Self::Internal(message) => error!(
                "event=http_request module=server status=error code={} error={message}",
                status.as_u16()
            ),
            other => debug!(
                "event=http_request module=server status=rejected code={} error={}",
                status.as_u16(),
                other.message()
            ),
        }
        (status, Json(json!({ "error": self.message() }))).into_response()
    }
}

impl From<RepoError> for ApiError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::NotFound(id) => Self::NotFound(format!("item not found: {id}")),
            RepoError::Validation(err) => Self::BadRequest(err.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(value: ServiceError) -> Self {
        match value {
            ServiceError::Validation(err) => Self::BadRequest(err.to_string()),
            ServiceError::ItemNotFound(id) => Self::NotFound(format!("item not found: {id}")),
            err @ ServiceError::NotATask(_) => Self::BadRequest(err.to_string()),
            ServiceError::Repo(err) => err.into(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(value: JsonRejection) -> Self {
        Self::BadRequest(value.body_text())
    }
}

/// Get one feed page.
///
/// The query string is read as raw pairs so repeated or odd keys normalize
/// instead of rejecting the request.
pub async fn list_items(
    State(state): State<Arc<AppState>>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<FeedResponse>, ApiError> {
    let params = FeedParams::from_pairs(pairs);
    let response = state.with_db(|conn| {
        let repo = SqliteItemRepository::try_new(conn)?;
        Ok(FeedService::new(repo).feed(&params)?)
    })?;
    Ok(Json(response))
}

/// Create an item from a draft payload.
pub async fn create_item(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ItemDraft>, JsonRejection>,
) -> Result<(StatusCode, Json<Item>), ApiError> {
    let Json(draft) = payload?;
    let item = state.with_db(|conn| {
        let repo = SqliteItemRepository::try_new(conn)?;
        Ok(ItemService::new(repo).create(draft)?)
    })?;
    Ok((StatusCode::CREATED, Json(item)))
}

pub async fn get_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Item>, ApiError> {
    let item = state.with_db(|conn| {
        let repo = SqliteItemRepository::try_new(conn)?;
        Ok(ItemService::new(repo).get(&id)?)
    })?;
    Ok(Json(item))
}

/// Replace the content of an item.
pub async fn update_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    payload: Result<Json<ItemDraft>, JsonRejection>,
) -> Result<Json<Item>, ApiError> {
    let Json(draft) = payload?;
    let item = state.with_db(|conn| {
        let repo = SqliteItemRepository::try_new(conn)?;
        Ok(ItemService::new(repo).update(&id, draft)?)
    })?;
    Ok(Json(item))
}

/// Soft-delete an item.
pub async fn delete_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.with_db(|conn| {
        let repo = SqliteItemRepository::try_new(conn)?;
        Ok(ItemService::new(repo).soft_delete(&id)?)
    })?;
    Ok(StatusCode::NO_CONTENT)
}

/// Mark a task as done.
pub async fn complete_item(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Item>, ApiError> {
    let item = state.with_db(|conn| {
        let repo = SqliteItemRepository::try_new(conn)?;
        Ok(ItemService::new(repo).complete_task(&id)?)
    })?;
    Ok(Json(item))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub password: String,
}

/// Exchange the password for a session cookie.
pub async fn login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(request) = payload?;
    if let Some(expected) = state.password.as_deref() {
        if request.password != expected {
            info!("event=login module=server status=rejected");
            return Err(ApiError::Unauthorized);
        }
    }

    let token = state.sessions.issue();
    info!("event=login module=server status=ok");
    Ok((
        StatusCode::NO_CONTENT,
        [(header::SET_COOKIE, session_cookie(&token))],
    )
        .into_response())
}

/// Drop the caller's session, if any.
pub async fn logout(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    if let Some(token) = session_token(&headers) {
        state.sessions.revoke(&token);
    }
    (
        StatusCode::NO_CONTENT,
        [(header::SET_COOKIE, expired_session_cookie())],
    )
        .into_response()
}

pub async fn health() -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "version": core_version(),
    }))
}
