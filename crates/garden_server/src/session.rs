//! Cookie sessions guarding the item routes.
//!
//! # Invariants
//! - Tokens are random v4 UUIDs, held only in memory.
//! - With no password configured the gate lets every request through.

use std::collections::HashSet;
use std::sync::{Arc, PoisonError, RwLock};

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use log::debug;
use uuid::Uuid;

use crate::http::ApiError;
use crate::AppState;

pub const SESSION_COOKIE: &str = "garden_session";

/// In-memory set of live session tokens.
#[derive(Debug, Default)]
pub struct SessionStore {
    tokens: RwLock<HashSet<String>>,
}

impl SessionStore {
    /// Issues and remembers a new token.
    pub fn issue(&self) -> String {
        let token = Uuid::new_v4().to_string();
        self.tokens
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(token.clone());
        token
    }

    pub fn contains(&self, token: &str) -> bool {
        self.tokens
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(token)
    }

    /// Forgets a token. Returns whether it was live.
    pub fn revoke(&self, token: &str) -> bool {
        self.tokens
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(token)
    }
}

/// Extracts the session token from `Cookie` headers.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

pub fn session_cookie(token: &str) -> String {
    format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Strict")
}

pub fn expired_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Strict; Max-Age=0")
}

/// Rejects requests without a live session when login is required.
pub async fn require_session(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if !state.requires_login() {
        return Ok(next.run(request).await);
    }

    match session_token(request.headers()) {
        Some(token) if state.sessions.contains(&token) => Ok(next.run(request).await),
        _ => {
            debug!(
                "event=session_check module=server status=rejected path={}",
                request.uri().path()
            );
            Err(ApiError::Unauthorized)
        }
    }
}
