//! services/portal/src/web/admin.rs
//!
//! REST handlers for the admin panel: user management, account counts and
//! sign-content editing. All routes sit behind `require_admin`.

use crate::web::rest::parse_sign;
use crate::web::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
    Extension,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, info};
use utoipa::ToSchema;
use uuid::Uuid;

use horoscope_core::domain::{Profile, Role, SignContentChanges};
use horoscope_core::ports::PortError;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// One row of the manage-users screen.
#[derive(Serialize, ToSchema)]
pub struct UserSummary {
    pub id: Uuid,
    pub full_name: String,
    pub gender: String,
    pub date_of_birth: Option<String>,
    pub zodiac_sign: Option<String>,
    pub role: String,
    pub created_at: DateTime<Utc>,
}

impl UserSummary {
    fn from_profile(profile: Profile) -> Self {
        Self {
            id: profile.id,
            full_name: profile.full_name,
            gender: profile.gender,
            date_of_birth: profile.date_of_birth,
            zodiac_sign: profile.zodiac_sign.map(|s| s.as_str().to_string()),
            role: profile.role.as_str().to_string(),
            created_at: profile.created_at,
        }
    }
}

/// Account counts for the admin dashboard.
#[derive(Serialize, ToSchema)]
pub struct StatsResponse {
    pub users: i64,
    pub admins: i64,
}

/// The editable fields of a sign's editorial content.
#[derive(Deserialize, ToSchema)]
pub struct SignContentUpdate {
    pub description: String,
    pub traits: String,
    pub compatibility: String,
    pub daily_horoscope: String,
    pub monthly_horoscope: String,
}

//=========================================================================================
// Handlers
//=========================================================================================

/// GET /admin/users - List every profile row.
#[utoipa::path(
    get,
    path = "/admin/users",
    responses(
        (status = 200, description = "All profiles", body = [UserSummary]),
        (status = 401, description = "Missing or invalid session"),
        (status = 403, description = "Not an admin"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list_users_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let profiles = app_state.profiles.list_all().await.map_err(|e| {
        error!("Failed to list profiles: {:?}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to list users".to_string(),
        )
    })?;

    let body: Vec<UserSummary> = profiles.into_iter().map(UserSummary::from_profile).collect();
    Ok(Json(body))
}

/// DELETE /admin/users/{id} - Remove a profile row.
///
/// Admins cannot delete themselves; the signed-in admin id comes from the
/// auth middleware.
#[utoipa::path(
    delete,
    path = "/admin/users/{id}",
    responses(
        (status = 204, description = "Profile deleted"),
        (status = 400, description = "Attempted self-deletion"),
        (status = 401, description = "Missing or invalid session"),
        (status = 403, description = "Not an admin"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("id" = Uuid, Path, description = "The profile id to delete.")
    )
)]
pub async fn delete_user_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(admin_id): Extension<Uuid>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    if id == admin_id {
        return Err((
            StatusCode::BAD_REQUEST,
            "You cannot delete your own account.".to_string(),
        ));
    }

    app_state.profiles.delete(id).await.map_err(|e| {
        error!("Failed to delete profile {id}: {:?}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to delete user".to_string(),
        )
    })?;

    info!(%admin_id, deleted = %id, "profile deleted from admin panel");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /admin/stats - Account counts for the admin dashboard.
#[utoipa::path(
    get,
    path = "/admin/stats",
    responses(
        (status = 200, description = "Account counts", body = StatsResponse),
        (status = 401, description = "Missing or invalid session"),
        (status = 403, description = "Not an admin"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn stats_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let users = app_state.profiles.count_by_role(Role::User).await;
    let admins = app_state.profiles.count_by_role(Role::Admin).await;

    match (users, admins) {
        (Ok(users), Ok(admins)) => Ok(Json(StatsResponse { users, admins })),
        (Err(e), _) | (_, Err(e)) => {
            error!("Failed to count accounts: {:?}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to count accounts".to_string(),
            ))
        }
    }
}

/// PUT /admin/signs/{sign} - Rewrite a sign's editorial content.
#[utoipa::path(
    put,
    path = "/admin/signs/{sign}",
    request_body = SignContentUpdate,
    responses(
        (status = 204, description = "Sign content updated"),
        (status = 400, description = "Unknown sign name"),
        (status = 401, description = "Missing or invalid session"),
        (status = 403, description = "Not an admin"),
        (status = 404, description = "No content row for this sign"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("sign" = String, Path, description = "Sign name, e.g. 'Gemini'.")
    )
)]
pub async fn update_sign_handler(
    State(app_state): State<Arc<AppState>>,
    Path(raw_sign): Path<String>,
    Json(update): Json<SignContentUpdate>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let sign = parse_sign(&raw_sign)?;

    let changes = SignContentChanges {
        description: update.description,
        traits: update.traits,
        compatibility: update.compatibility,
        daily_horoscope: update.daily_horoscope,
        monthly_horoscope: update.monthly_horoscope,
    };

    app_state
        .signs
        .update_sign(sign, changes)
        .await
        .map_err(|e| match e {
            PortError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            other => {
                error!("Failed to update sign {sign}: {:?}", other);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Failed to update sign content".to_string(),
                )
            }
        })?;

    Ok(StatusCode::NO_CONTENT)
}
