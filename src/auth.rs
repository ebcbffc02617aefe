//! HTTP Basic Authentication for moderator routes

use axum::{
    body::Body,
    extract::{Query, State},
    http::{header, Request, Response, StatusCode},
    middleware::Next,
    response::IntoResponse,
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use std::sync::Arc;

use crate::types::Role;
use crate::ws::WsQuery;

/// Authentication configuration
#[derive(Debug, Clone)]
pub struct ModAuthConfig {
    /// Moderator username (None = auth disabled)
    pub username: Option<String>,
    pub password: Option<String>,
}

impl ModAuthConfig {
    /// MOD_USERNAME and MOD_PASSWORD must both be set to enable auth
    pub fn from_env() -> Self {
        let username = std::env::var("MOD_USERNAME")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        let password = std::env::var("MOD_PASSWORD")
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        if username.is_some() && password.is_some() {
            tracing::info!("Moderator authentication enabled");
            Self { username, password }
        } else {
            if username.is_some() || password.is_some() {
                tracing::warn!(
                    "MOD_USERNAME and MOD_PASSWORD must both be set to enable authentication"
                );
            }
            tracing::warn!("Moderator authentication DISABLED - anyone can backfill and settle sessions!");
            Self::disabled()
        }
    }

    pub fn disabled() -> Self {
        Self {
            username: None,
            password: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }

    pub fn validate(&self, username: &str, password: &str) -> bool {
        match (&self.username, &self.password) {
            (Some(u), Some(p)) => {
                constant_time_eq(u.as_bytes(), username.as_bytes())
                    && constant_time_eq(p.as_bytes(), password.as_bytes())
            }
            _ => true, // Auth disabled, allow all
        }
    }

    /// Whether the request carries valid Basic credentials
    fn authorizes(&self, request: &Request<Body>) -> bool {
        request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.strip_prefix("Basic "))
            .and_then(|encoded| STANDARD.decode(encoded.trim()).ok())
            .and_then(|decoded| String::from_utf8(decoded).ok())
            .is_some_and(|credentials| {
                credentials
                    .split_once(':')
                    .is_some_and(|(username, password)| self.validate(username, password))
            })
    }
}

/// Constant-time byte comparison to prevent timing attacks
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

fn unauthorized(realm: &str) -> Response<Body> {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, format!("Basic realm=\"{}\"", realm))],
        "Unauthorized",
    )
        .into_response()
}

/// Middleware for HTTP Basic Authentication on admin routes
pub async fn moderator_auth_middleware(
    State(auth_config): State<Arc<ModAuthConfig>>,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    if !auth_config.is_enabled() || auth_config.authorizes(&request) {
        return next.run(request).await;
    }
    unauthorized("Pickem Moderator")
}

/// Role the WebSocket handler will assign, decoded exactly as its `Query` extractor does
fn requested_ws_role(request: &Request<Body>) -> Option<Role> {
    Query::<WsQuery>::try_from_uri(request.uri())
        .ok()
        .map(|Query(params)| params.role())
}

/// Require Basic Auth for `/ws?role=moderator`; member connections pass through.
pub async fn moderator_ws_auth_middleware(
    State(auth_config): State<Arc<ModAuthConfig>>,
    request: Request<Body>,
    next: Next,
) -> Response<Body> {
    let is_moderator_ws =
        request.uri().path() == "/ws" && requested_ws_role(&request) == Some(Role::Moderator);

    if !is_moderator_ws {
        return next.run(request).await;
    }

    if !auth_config.is_enabled() {
        tracing::warn!(
            "Moderator WebSocket requested but authentication is DISABLED; set MOD_USERNAME and MOD_PASSWORD"
        );
        return next.run(request).await;
    }

    if auth_config.authorizes(&request) {
        return next.run(request).await;
    }
    unauthorized("Pickem Moderator (WebSocket)")
}
