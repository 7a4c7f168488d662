//! Loyalty tiers API handlers

use axum::extract::{Path, State};
use axum::Json;
use validator::Validate;

use shared::error::{AppError, AppResult};
use shared::models::{LoyaltyTier, LoyaltyTierUpdate};

use crate::api::MerchantId;
use crate::core::ServerState;
use crate::db::repository::tier;

#[derive(Debug, serde::Deserialize, Validate)]
pub struct CreateTierPayload {
    #[validate(length(min = 1, max = 64))]
    pub name: String,
    #[serde(default)]
    pub name_ar: String,
    #[validate(range(min = 0))]
    pub min_points: i64,
    #[serde(default)]
    #[validate(range(min = 0, max = 100))]
    pub discount_percentage: i64,
    #[serde(default)]
    pub free_shipping: bool,
    #[serde(default)]
    pub priority: i64,
    pub color: Option<String>,
    pub icon: Option<String>,
}

/// GET /api/loyalty/tiers - the merchant's ladder, ascending by threshold
pub async fn list(
    State(state): State<ServerState>,
    MerchantId(merchant_id): MerchantId,
) -> AppResult<Json<Vec<LoyaltyTier>>> {
    let tiers = tier::list(state.pool(), merchant_id).await?;
    Ok(Json(tiers))
}

/// POST /api/loyalty/tiers - create a tier
pub async fn create(
    State(state): State<ServerState>,
    MerchantId(merchant_id): MerchantId,
    Json(payload): Json<CreateTierPayload>,
) -> AppResult<Json<LoyaltyTier>> {
    payload
        .validate()
        .map_err(|e| AppError::validation(e.to_string()))?;

    let created = tier::create(
        state.pool(),
        merchant_id,
        shared::models::LoyaltyTierCreate {
            name: payload.name,
            name_ar: payload.name_ar,
            min_points: payload.min_points,
            discount_percentage: payload.discount_percentage,
            free_shipping: payload.free_shipping,
            priority: payload.priority,
            color: payload.color,
            icon: payload.icon,
        },
    )
    .await?;
    Ok(Json(created))
}

/// PUT /api/loyalty/tiers/:id - partial update
pub async fn update(
    State(state): State<ServerState>,
    MerchantId(merchant_id): MerchantId,
    Path(id): Path<i64>,
    Json(payload): Json<LoyaltyTierUpdate>,
) -> AppResult<Json<LoyaltyTier>> {
    let updated = tier::update(state.pool(), merchant_id, id, payload).await?;
    Ok(Json(updated))
}

/// DELETE /api/loyalty/tiers/:id
pub async fn delete(
    State(state): State<ServerState>,
    MerchantId(merchant_id): MerchantId,
    Path(id): Path<i64>,
) -> AppResult<Json<bool>> {
    tier::delete(state.pool(), merchant_id, id).await?;
    Ok(Json(true))
}
