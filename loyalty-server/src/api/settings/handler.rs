//! Loyalty settings API handlers

use axum::extract::State;
use axum::Json;

use shared::error::AppResult;
use shared::models::{LoyaltySettings, LoyaltySettingsUpdate};

use crate::api::MerchantId;
use crate::core::ServerState;
use crate::db::repository::settings;

/// GET /api/loyalty/settings - merchant configuration, seeded on first read
pub async fn get_settings(
    State(state): State<ServerState>,
    MerchantId(merchant_id): MerchantId,
) -> AppResult<Json<LoyaltySettings>> {
    let settings = settings::ensure(state.pool(), merchant_id).await?;
    Ok(Json(settings))
}

/// PUT /api/loyalty/settings - partial update, returns the new settings
pub async fn update_settings(
    State(state): State<ServerState>,
    MerchantId(merchant_id): MerchantId,
    Json(payload): Json<LoyaltySettingsUpdate>,
) -> AppResult<Json<LoyaltySettings>> {
    let settings = settings::update(state.pool(), merchant_id, payload).await?;
    Ok(Json(settings))
}
