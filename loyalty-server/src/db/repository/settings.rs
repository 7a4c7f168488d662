//! Loyalty settings repository
//!
//! One configuration row per merchant, created lazily with defaults on
//! first access. Rates are exact decimals stored as TEXT; SQLite has no
//! native decimal type and floats would drift on accrual math.

use rust_decimal::Decimal;
use shared::models::{LoyaltySettings, LoyaltySettingsUpdate};
use shared::util::now_millis;
use sqlx::SqlitePool;
use std::str::FromStr;

use super::{tier, RepoError, RepoResult};

#[derive(sqlx::FromRow)]
struct SettingsRow {
    merchant_id: i64,
    is_enabled: bool,
    points_per_currency: String,
    currency_per_point: String,
    enable_referral_bonus: bool,
    referral_bonus_points: i64,
    enable_review_bonus: bool,
    review_bonus_points: i64,
    enable_birthday_bonus: bool,
    birthday_bonus_points: i64,
    points_expiry_days: i64,
    created_at: i64,
    updated_at: i64,
}

fn parse_rate(column: &str, raw: &str) -> RepoResult<Decimal> {
    Decimal::from_str(raw)
        .map_err(|e| RepoError::Database(format!("Corrupt {column} value '{raw}': {e}")))
}

impl SettingsRow {
    fn into_settings(self) -> RepoResult<LoyaltySettings> {
        Ok(LoyaltySettings {
            merchant_id: self.merchant_id,
            is_enabled: self.is_enabled,
            points_per_currency: parse_rate("points_per_currency", &self.points_per_currency)?,
            currency_per_point: parse_rate("currency_per_point", &self.currency_per_point)?,
            enable_referral_bonus: self.enable_referral_bonus,
            referral_bonus_points: self.referral_bonus_points,
            enable_review_bonus: self.enable_review_bonus,
            review_bonus_points: self.review_bonus_points,
            enable_birthday_bonus: self.enable_birthday_bonus,
            birthday_bonus_points: self.birthday_bonus_points,
            points_expiry_days: self.points_expiry_days,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// Fetch a merchant's settings if they exist
pub async fn get(pool: &SqlitePool, merchant_id: i64) -> RepoResult<Option<LoyaltySettings>> {
    let row: Option<SettingsRow> =
        sqlx::query_as("SELECT * FROM loyalty_settings WHERE merchant_id = ?")
            .bind(merchant_id)
            .fetch_optional(pool)
            .await?;
    row.map(SettingsRow::into_settings).transpose()
}

/// Fetch a merchant's settings, seeding defaults (and the default tier
/// ladder) on first access.
pub async fn ensure(pool: &SqlitePool, merchant_id: i64) -> RepoResult<LoyaltySettings> {
    if let Some(settings) = get(pool, merchant_id).await? {
        return Ok(settings);
    }

    let settings = LoyaltySettings::defaults(merchant_id, now_millis());
    let inserted = sqlx::query(
        "INSERT OR IGNORE INTO loyalty_settings \
         (merchant_id, is_enabled, points_per_currency, currency_per_point, \
          enable_referral_bonus, referral_bonus_points, \
          enable_review_bonus, review_bonus_points, \
          enable_birthday_bonus, birthday_bonus_points, \
          points_expiry_days, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(settings.merchant_id)
    .bind(settings.is_enabled)
    .bind(settings.points_per_currency.to_string())
    .bind(settings.currency_per_point.to_string())
    .bind(settings.enable_referral_bonus)
    .bind(settings.referral_bonus_points)
    .bind(settings.enable_review_bonus)
    .bind(settings.review_bonus_points)
    .bind(settings.enable_birthday_bonus)
    .bind(settings.birthday_bonus_points)
    .bind(settings.points_expiry_days)
    .bind(settings.created_at)
    .bind(settings.updated_at)
    .execute(pool)
    .await?;

    if inserted.rows_affected() > 0 {
        tier::seed_defaults(pool, merchant_id).await?;
        tracing::info!(merchant_id, "Seeded default loyalty settings and tiers");
        return Ok(settings);
    }

    // Lost a seeding race; the winner's row is authoritative
    get(pool, merchant_id)
        .await?
        .ok_or_else(|| RepoError::Database("Settings row vanished after seed".to_string()))
}

fn validate_patch(patch: &LoyaltySettingsUpdate) -> RepoResult<()> {
    if patch
        .points_per_currency
        .is_some_and(|v| v < Decimal::ZERO)
    {
        return Err(RepoError::InvalidEntry(
            "points_per_currency must not be negative".to_string(),
        ));
    }
    if patch
        .currency_per_point
        .is_some_and(|v| v <= Decimal::ZERO)
    {
        return Err(RepoError::InvalidEntry(
            "currency_per_point must be positive".to_string(),
        ));
    }
    let bonuses = [
        patch.referral_bonus_points,
        patch.review_bonus_points,
        patch.birthday_bonus_points,
    ];
    if bonuses.iter().flatten().any(|&v| v < 0) {
        return Err(RepoError::InvalidEntry(
            "Bonus amounts must not be negative".to_string(),
        ));
    }
    if patch.points_expiry_days.is_some_and(|v| v < 0) {
        return Err(RepoError::InvalidEntry(
            "points_expiry_days must not be negative".to_string(),
        ));
    }
    Ok(())
}

/// Apply a partial update, returning the new settings.
///
/// The patch is applied in a single UPDATE with per-column COALESCE, so
/// concurrent partial updates to the same merchant cannot overwrite each
/// other's untouched columns.
pub async fn update(
    pool: &SqlitePool,
    merchant_id: i64,
    patch: LoyaltySettingsUpdate,
) -> RepoResult<LoyaltySettings> {
    validate_patch(&patch)?;
    ensure(pool, merchant_id).await?;

    sqlx::query(
        "UPDATE loyalty_settings SET \
           is_enabled = COALESCE(?, is_enabled), \
           points_per_currency = COALESCE(?, points_per_currency), \
           currency_per_point = COALESCE(?, currency_per_point), \
           enable_referral_bonus = COALESCE(?, enable_referral_bonus), \
           referral_bonus_points = COALESCE(?, referral_bonus_points), \
           enable_review_bonus = COALESCE(?, enable_review_bonus), \
           review_bonus_points = COALESCE(?, review_bonus_points), \
           enable_birthday_bonus = COALESCE(?, enable_birthday_bonus), \
           birthday_bonus_points = COALESCE(?, birthday_bonus_points), \
           points_expiry_days = COALESCE(?, points_expiry_days), \
           updated_at = ? \
         WHERE merchant_id = ?",
    )
    .bind(patch.is_enabled)
    .bind(patch.points_per_currency.map(|v| v.to_string()))
    .bind(patch.currency_per_point.map(|v| v.to_string()))
    .bind(patch.enable_referral_bonus)
    .bind(patch.referral_bonus_points)
    .bind(patch.enable_review_bonus)
    .bind(patch.review_bonus_points)
    .bind(patch.enable_birthday_bonus)
    .bind(patch.birthday_bonus_points)
    .bind(patch.points_expiry_days)
    .bind(now_millis())
    .bind(merchant_id)
    .execute(pool)
    .await?;

    get(pool, merchant_id)
        .await?
        .ok_or_else(|| RepoError::Database("Settings row vanished during update".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::memory_pool;

    #[tokio::test]
    async fn test_ensure_seeds_defaults_once() {
        let pool = memory_pool().await;

        assert!(get(&pool, 7).await.unwrap().is_none());

        let seeded = ensure(&pool, 7).await.unwrap();
        assert!(seeded.is_enabled);
        assert_eq!(seeded.points_per_currency, Decimal::ONE);
        assert_eq!(seeded.points_expiry_days, 365);

        // Default tier ladder lands with the settings row
        let tiers = tier::list(&pool, 7).await.unwrap();
        assert_eq!(tiers.len(), 3);

        // Second call reads, does not re-seed
        let again = ensure(&pool, 7).await.unwrap();
        assert_eq!(again.created_at, seeded.created_at);
        assert_eq!(tier::list(&pool, 7).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_update_is_partial() {
        let pool = memory_pool().await;
        ensure(&pool, 7).await.unwrap();

        let patch = LoyaltySettingsUpdate {
            points_per_currency: Some(Decimal::new(5, 1)), // 0.5
            enable_birthday_bonus: Some(true),
            ..Default::default()
        };
        let updated = update(&pool, 7, patch).await.unwrap();
        assert_eq!(updated.points_per_currency, Decimal::new(5, 1));
        assert!(updated.enable_birthday_bonus);
        // Untouched fields keep their values
        assert_eq!(updated.referral_bonus_points, 50);

        // Round-trips through the TEXT column exactly
        let reread = get(&pool, 7).await.unwrap().unwrap();
        assert_eq!(reread.points_per_currency, Decimal::new(5, 1));
    }

    #[tokio::test]
    async fn test_interleaved_patches_both_persist() {
        let pool = memory_pool().await;
        ensure(&pool, 7).await.unwrap();

        // Disjoint patches racing on the same row; neither may clobber
        // the other's column
        let toggle = update(
            &pool,
            7,
            LoyaltySettingsUpdate {
                is_enabled: Some(false),
                ..Default::default()
            },
        );
        let bonus = update(
            &pool,
            7,
            LoyaltySettingsUpdate {
                review_bonus_points: Some(99),
                ..Default::default()
            },
        );
        let (toggle, bonus) = tokio::join!(toggle, bonus);
        toggle.unwrap();
        bonus.unwrap();

        let settings = get(&pool, 7).await.unwrap().unwrap();
        assert!(!settings.is_enabled);
        assert_eq!(settings.review_bonus_points, 99);
    }

    #[tokio::test]
    async fn test_update_rejects_invalid_rates() {
        let pool = memory_pool().await;

        let patch = LoyaltySettingsUpdate {
            currency_per_point: Some(Decimal::ZERO),
            ..Default::default()
        };
        let err = update(&pool, 7, patch).await.unwrap_err();
        assert!(matches!(err, RepoError::InvalidEntry(_)));

        let patch = LoyaltySettingsUpdate {
            points_expiry_days: Some(-1),
            ..Default::default()
        };
        let err = update(&pool, 7, patch).await.unwrap_err();
        assert!(matches!(err, RepoError::InvalidEntry(_)));
    }

    #[tokio::test]
    async fn test_merchants_are_isolated() {
        let pool = memory_pool().await;
        ensure(&pool, 1).await.unwrap();
        ensure(&pool, 2).await.unwrap();

        let patch = LoyaltySettingsUpdate {
            is_enabled: Some(false),
            ..Default::default()
        };
        update(&pool, 1, patch).await.unwrap();

        assert!(!get(&pool, 1).await.unwrap().unwrap().is_enabled);
        assert!(get(&pool, 2).await.unwrap().unwrap().is_enabled);
    }
}
