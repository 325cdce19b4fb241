//! services/portal/src/web/rest.rs
//!
//! Contains the Axum handlers for the public REST endpoints and the master
//! definition for the OpenAPI specification.

use crate::web::admin;
use crate::web::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json},
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tracing::error;
use utoipa::{OpenApi, ToSchema};

use horoscope_core::domain::{SignContent, ZodiacSign};

//=========================================================================================
// OpenAPI Master Definition
//=========================================================================================

#[derive(OpenApi)]
#[openapi(
    paths(
        list_signs_handler,
        get_sign_handler,
        admin::list_users_handler,
        admin::delete_user_handler,
        admin::stats_handler,
        admin::update_sign_handler,
    ),
    components(
        schemas(
            SignContentResponse,
            admin::UserSummary,
            admin::StatsResponse,
            admin::SignContentUpdate,
        )
    ),
    tags(
        (name = "Cosmic Portal API", description = "REST endpoints for horoscope content and admin management.")
    )
)]
pub struct ApiDoc;

//=========================================================================================
// API Response and Payload Structs
//=========================================================================================

/// The editorial content for one zodiac sign.
#[derive(Serialize, ToSchema)]
pub struct SignContentResponse {
    pub sign_name: String,
    pub symbol: String,
    pub date_range: String,
    pub element: String,
    pub ruling_planet: String,
    pub traits: String,
    pub compatibility: String,
    pub color_hex: String,
    pub description: String,
    pub daily_horoscope: String,
    pub monthly_horoscope: String,
    pub created_at: DateTime<Utc>,
}

impl SignContentResponse {
    pub fn from_domain(content: SignContent) -> Self {
        Self {
            sign_name: content.sign.as_str().to_string(),
            symbol: content.symbol,
            date_range: content.date_range,
            element: content.element,
            ruling_planet: content.ruling_planet,
            traits: content.traits,
            compatibility: content.compatibility,
            color_hex: content.color_hex,
            description: content.description,
            daily_horoscope: content.daily_horoscope,
            monthly_horoscope: content.monthly_horoscope,
            created_at: content.created_at,
        }
    }
}

/// Parses a sign name path segment, case-sensitively matching the twelve
/// labels.
pub fn parse_sign(raw: &str) -> Result<ZodiacSign, (StatusCode, String)> {
    ZodiacSign::from_label(raw)
        .ok_or_else(|| (StatusCode::BAD_REQUEST, format!("Unknown sign '{}'", raw)))
}

//=========================================================================================
// REST API Handlers
//=========================================================================================

/// List the editorial content for all twelve signs.
#[utoipa::path(
    get,
    path = "/signs",
    responses(
        (status = 200, description = "All sign content", body = [SignContentResponse]),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn list_signs_handler(
    State(app_state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let signs = app_state.signs.list_signs().await.map_err(|e| {
        error!("Failed to list signs: {:?}", e);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            "Failed to load sign content".to_string(),
        )
    })?;

    let body: Vec<SignContentResponse> = signs
        .into_iter()
        .map(SignContentResponse::from_domain)
        .collect();
    Ok(Json(body))
}

/// Fetch the editorial content for a single sign.
#[utoipa::path(
    get,
    path = "/signs/{sign}",
    responses(
        (status = 200, description = "Sign content", body = SignContentResponse),
        (status = 400, description = "Unknown sign name"),
        (status = 404, description = "No content row for this sign"),
        (status = 500, description = "Internal server error")
    ),
    params(
        ("sign" = String, Path, description = "Sign name, e.g. 'Gemini'.")
    )
)]
pub async fn get_sign_handler(
    State(app_state): State<Arc<AppState>>,
    Path(raw_sign): Path<String>,
) -> Result<impl IntoResponse, (StatusCode, String)> {
    let sign = parse_sign(&raw_sign)?;

    let content = app_state
        .signs
        .fetch_sign(sign)
        .await
        .map_err(|e| {
            error!("Failed to fetch sign {sign}: {:?}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Failed to load sign content".to_string(),
            )
        })?
        .ok_or_else(|| {
            (
                StatusCode::NOT_FOUND,
                format!("No content for sign '{}'", sign),
            )
        })?;

    Ok(Json(SignContentResponse::from_domain(content)))
}
