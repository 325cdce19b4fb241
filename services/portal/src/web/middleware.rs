//! services/portal/src/web/middleware.rs
//!
//! Authentication middleware for protecting the REST admin surface.

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::error;
use uuid::Uuid;

use crate::web::state::AppState;
use horoscope_core::domain::Role;

/// Pulls the session token from `Authorization: Bearer ...` or from the
/// `session` cookie. Tokens are issued by the WebSocket sign-in flow.
fn extract_token(req: &Request) -> Option<String> {
    if let Some(value) = req.headers().get(header::AUTHORIZATION) {
        if let Some(token) = value.to_str().ok().and_then(|v| v.strip_prefix("Bearer ")) {
            return Some(token.to_string());
        }
    }
    req.headers()
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())?
        .split(';')
        .find_map(|c| c.trim().strip_prefix("session="))
        .map(|t| t.to_string())
}

/// Middleware that validates the session token and requires an admin
/// profile.
///
/// If valid, inserts the admin's user_id into request extensions for
/// handlers to use. A valid session without an admin profile yields 403.
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, StatusCode> {
    // 1. Extract the session token
    let token = extract_token(&req).ok_or(StatusCode::UNAUTHORIZED)?;

    // 2. Validate it against the session table, get the user id
    let user_id: Uuid = sqlx::query_scalar(
        "SELECT user_id FROM auth_sessions WHERE token = $1 AND expires_at > NOW()",
    )
    .bind(&token)
    .fetch_optional(&state.pool)
    .await
    .map_err(|e| {
        error!("Failed to validate auth session: {:?}", e);
        StatusCode::UNAUTHORIZED
    })?
    .ok_or(StatusCode::UNAUTHORIZED)?;

    // 3. The profile row carries the role; the corrected row is the
    //    authority, never a cached claim.
    let profile = state
        .profiles
        .fetch_by_id(user_id)
        .await
        .map_err(|e| {
            error!("Failed to load profile for {user_id}: {:?}", e);
            StatusCode::UNAUTHORIZED
        })?
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if profile.role != Role::Admin {
        return Err(StatusCode::FORBIDDEN);
    }

    // 4. Insert the user_id into request extensions
    req.extensions_mut().insert(user_id);

    // 5. Continue to the handler
    Ok(next.run(req).await)
}
