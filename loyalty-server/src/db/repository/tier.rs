//! Loyalty tier repository - CRUD over a merchant's tier ladder

use shared::models::{default_tiers, LoyaltyTier, LoyaltyTierCreate, LoyaltyTierUpdate};
use shared::util::{now_millis, snowflake_id};
use sqlx::SqlitePool;

use super::{RepoError, RepoResult};

/// Tiers for a merchant, ascending by threshold - the order tier
/// resolution expects.
pub async fn list(pool: &SqlitePool, merchant_id: i64) -> RepoResult<Vec<LoyaltyTier>> {
    let tiers = sqlx::query_as::<_, LoyaltyTier>(
        "SELECT * FROM loyalty_tier WHERE merchant_id = ? ORDER BY min_points ASC, id ASC",
    )
    .bind(merchant_id)
    .fetch_all(pool)
    .await?;
    Ok(tiers)
}

pub async fn get(pool: &SqlitePool, merchant_id: i64, id: i64) -> RepoResult<LoyaltyTier> {
    sqlx::query_as::<_, LoyaltyTier>("SELECT * FROM loyalty_tier WHERE merchant_id = ? AND id = ?")
        .bind(merchant_id)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| RepoError::NotFound(format!("Tier {id} not found")))
}

fn validate_threshold(min_points: i64) -> RepoResult<()> {
    if min_points < 0 {
        return Err(RepoError::InvalidEntry(
            "min_points must not be negative".to_string(),
        ));
    }
    Ok(())
}

pub async fn create(
    pool: &SqlitePool,
    merchant_id: i64,
    payload: LoyaltyTierCreate,
) -> RepoResult<LoyaltyTier> {
    validate_threshold(payload.min_points)?;
    let now = now_millis();
    let tier = LoyaltyTier {
        id: snowflake_id(),
        merchant_id,
        name: payload.name,
        name_ar: payload.name_ar,
        min_points: payload.min_points,
        discount_percentage: payload.discount_percentage,
        free_shipping: payload.free_shipping,
        priority: payload.priority,
        color: payload.color,
        icon: payload.icon,
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        "INSERT INTO loyalty_tier \
         (id, merchant_id, name, name_ar, min_points, discount_percentage, \
          free_shipping, priority, color, icon, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(tier.id)
    .bind(tier.merchant_id)
    .bind(&tier.name)
    .bind(&tier.name_ar)
    .bind(tier.min_points)
    .bind(tier.discount_percentage)
    .bind(tier.free_shipping)
    .bind(tier.priority)
    .bind(&tier.color)
    .bind(&tier.icon)
    .bind(tier.created_at)
    .bind(tier.updated_at)
    .execute(pool)
    .await?;

    Ok(tier)
}

pub async fn update(
    pool: &SqlitePool,
    merchant_id: i64,
    id: i64,
    patch: LoyaltyTierUpdate,
) -> RepoResult<LoyaltyTier> {
    let mut tier = get(pool, merchant_id, id).await?;

    if let Some(v) = patch.name {
        tier.name = v;
    }
    if let Some(v) = patch.name_ar {
        tier.name_ar = v;
    }
    if let Some(v) = patch.min_points {
        tier.min_points = v;
    }
    if let Some(v) = patch.discount_percentage {
        tier.discount_percentage = v;
    }
    if let Some(v) = patch.free_shipping {
        tier.free_shipping = v;
    }
    if let Some(v) = patch.priority {
        tier.priority = v;
    }
    if let Some(v) = patch.color {
        tier.color = Some(v);
    }
    if let Some(v) = patch.icon {
        tier.icon = Some(v);
    }
    validate_threshold(tier.min_points)?;
    tier.updated_at = now_millis();

    sqlx::query(
        "UPDATE loyalty_tier SET \
           name = ?, name_ar = ?, min_points = ?, discount_percentage = ?, \
           free_shipping = ?, priority = ?, color = ?, icon = ?, updated_at = ? \
         WHERE merchant_id = ? AND id = ?",
    )
    .bind(&tier.name)
    .bind(&tier.name_ar)
    .bind(tier.min_points)
    .bind(tier.discount_percentage)
    .bind(tier.free_shipping)
    .bind(tier.priority)
    .bind(&tier.color)
    .bind(&tier.icon)
    .bind(tier.updated_at)
    .bind(merchant_id)
    .bind(id)
    .execute(pool)
    .await?;

    Ok(tier)
}

pub async fn delete(pool: &SqlitePool, merchant_id: i64, id: i64) -> RepoResult<()> {
    let result = sqlx::query("DELETE FROM loyalty_tier WHERE merchant_id = ? AND id = ?")
        .bind(merchant_id)
        .bind(id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(RepoError::NotFound(format!("Tier {id} not found")));
    }
    Ok(())
}

/// Seed the Bronze/Silver/Gold ladder for a new merchant
pub async fn seed_defaults(pool: &SqlitePool, merchant_id: i64) -> RepoResult<()> {
    for payload in default_tiers() {
        create(pool, merchant_id, payload).await?;
    }
    Ok(())
}
