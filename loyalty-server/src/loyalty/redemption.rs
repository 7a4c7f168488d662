//! Redemption and manual adjustment service
//!
//! Admin-facing point movements: redeem points into a discount value, or
//! credit/debit a customer by hand. All three go through the ledger's
//! transactional append, so overdrafts and races are rejected there.

use rust_decimal::{Decimal, RoundingStrategy};
use shared::error::{AppError, AppResult, ErrorCode};
use shared::models::{EntryKind, LedgerEntry, NewLedgerEntry};
use shared::util::{now_millis, DAY_MS};
use sqlx::SqlitePool;

use crate::db::repository::{ledger, settings};

use super::locks::CustomerLocks;

/// Outcome of a successful redemption
#[derive(Debug, Clone, serde::Serialize)]
pub struct RedemptionReceipt {
    pub entry: LedgerEntry,
    /// Monetary value of the redeemed points at the merchant's rate,
    /// rounded to 2 decimal places
    pub currency_value: Decimal,
    /// Spendable balance left after the redemption
    pub remaining_points: i64,
}

/// Caller-supplied fields for a manual credit or deduction
#[derive(Debug, Clone, Default)]
pub struct Adjustment {
    pub points: i64,
    pub reason: Option<String>,
    pub reason_ar: Option<String>,
    /// Admin identity, folded into the stored reason for the audit trail
    pub actor: Option<String>,
}

impl Adjustment {
    fn reason_texts(&self, default_en: &str, default_ar: &str) -> (String, String) {
        let mut reason = self
            .reason
            .clone()
            .unwrap_or_else(|| default_en.to_string());
        let mut reason_ar = self
            .reason_ar
            .clone()
            .unwrap_or_else(|| default_ar.to_string());
        if let Some(actor) = self.actor.as_deref() {
            reason = format!("{reason} [{actor}]");
            reason_ar = format!("{reason_ar} [{actor}]");
        }
        (reason, reason_ar)
    }
}

fn require_positive(points: i64) -> AppResult<()> {
    if points <= 0 {
        return Err(AppError::invalid_amount(
            "Point amount must be a positive integer",
        ));
    }
    Ok(())
}

async fn current_balance(
    pool: &SqlitePool,
    merchant_id: i64,
    customer_phone: &str,
) -> AppResult<i64> {
    let entries = ledger::list_by_customer(pool, merchant_id, customer_phone).await?;
    Ok(super::projector::project_entries(&entries).current_points(now_millis()))
}

/// Convert points into monetary value and debit them.
///
/// `currency_value = points / currency_per_point`, so at the default rate
/// of 10 points per unit, redeeming 100 points is worth 10.00.
pub async fn redeem(
    pool: &SqlitePool,
    locks: &CustomerLocks,
    merchant_id: i64,
    customer_phone: &str,
    points: i64,
) -> AppResult<RedemptionReceipt> {
    require_positive(points)?;

    let merchant = settings::ensure(pool, merchant_id).await?;
    if !merchant.is_enabled {
        return Err(AppError::new(ErrorCode::LoyaltyDisabled));
    }

    let mut currency_value = (Decimal::from(points) / merchant.currency_per_point)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    // Always two decimal places on the wire ("10.00", not "10")
    currency_value.rescale(2);

    let _guard = locks.acquire(merchant_id, customer_phone).await?;

    let entry = ledger::append(
        pool,
        NewLedgerEntry {
            merchant_id,
            customer_phone: customer_phone.to_string(),
            kind: EntryKind::Redemption,
            amount: -points,
            reason: format!("Redeemed {points} points for {currency_value}"),
            reason_ar: format!("استبدال {points} نقطة بقيمة {currency_value}"),
            source_ref: None,
            expires_at: None,
        },
    )
    .await?;

    let remaining_points = current_balance(pool, merchant_id, customer_phone).await?;
    tracing::info!(
        merchant_id,
        customer_phone,
        points,
        %currency_value,
        remaining_points,
        "Points redeemed"
    );

    Ok(RedemptionReceipt {
        entry,
        currency_value,
        remaining_points,
    })
}

/// Manually credit points, with the merchant's usual expiry window
pub async fn credit(
    pool: &SqlitePool,
    locks: &CustomerLocks,
    merchant_id: i64,
    customer_phone: &str,
    adjustment: Adjustment,
) -> AppResult<LedgerEntry> {
    require_positive(adjustment.points)?;
    let merchant = settings::ensure(pool, merchant_id).await?;

    let now = now_millis();
    let expires_at =
        (merchant.points_expiry_days > 0).then(|| now + merchant.points_expiry_days * DAY_MS);
    let (reason, reason_ar) = adjustment.reason_texts("Manual credit", "إضافة نقاط يدوية");

    let _guard = locks.acquire(merchant_id, customer_phone).await?;
    let entry = ledger::append(
        pool,
        NewLedgerEntry {
            merchant_id,
            customer_phone: customer_phone.to_string(),
            kind: EntryKind::ManualCredit,
            amount: adjustment.points,
            reason,
            reason_ar,
            source_ref: None,
            expires_at,
        },
    )
    .await?;

    tracing::info!(
        merchant_id,
        customer_phone,
        points = adjustment.points,
        "Manual credit posted"
    );
    Ok(entry)
}

/// Manually debit points; rejected if the balance cannot cover it
pub async fn deduct(
    pool: &SqlitePool,
    locks: &CustomerLocks,
    merchant_id: i64,
    customer_phone: &str,
    adjustment: Adjustment,
) -> AppResult<LedgerEntry> {
    require_positive(adjustment.points)?;
    settings::ensure(pool, merchant_id).await?;

    let (reason, reason_ar) = adjustment.reason_texts("Manual deduction", "خصم نقاط يدوي");

    let _guard = locks.acquire(merchant_id, customer_phone).await?;
    let entry = ledger::append(
        pool,
        NewLedgerEntry {
            merchant_id,
            customer_phone: customer_phone.to_string(),
            kind: EntryKind::ManualDebit,
            amount: -adjustment.points,
            reason,
            reason_ar,
            source_ref: None,
            expires_at: None,
        },
    )
    .await?;

    tracing::info!(
        merchant_id,
        customer_phone,
        points = adjustment.points,
        "Manual debit posted"
    );
    Ok(entry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::memory_pool;
    use shared::models::LoyaltySettingsUpdate;
    use std::str::FromStr;
    use std::time::Duration;

    const MERCHANT: i64 = 7;
    const PHONE: &str = "966500000001";

    fn locks() -> CustomerLocks {
        CustomerLocks::new(Duration::from_secs(1))
    }

    fn adjust(points: i64) -> Adjustment {
        Adjustment {
            points,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_redeem_converts_points_to_currency() {
        let pool = memory_pool().await;
        let locks = locks();
        credit(&pool, &locks, MERCHANT, PHONE, adjust(500))
            .await
            .unwrap();

        // Default rate: 10 points per currency unit
        let receipt = redeem(&pool, &locks, MERCHANT, PHONE, 100).await.unwrap();
        assert_eq!(receipt.currency_value, Decimal::from(10));
        assert_eq!(receipt.entry.amount, -100);
        assert_eq!(receipt.remaining_points, 400);
    }

    #[tokio::test]
    async fn test_redeem_rounds_to_two_decimals() {
        let pool = memory_pool().await;
        let locks = locks();
        settings::update(
            &pool,
            MERCHANT,
            LoyaltySettingsUpdate {
                currency_per_point: Some(Decimal::from(3)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        credit(&pool, &locks, MERCHANT, PHONE, adjust(100))
            .await
            .unwrap();

        // 100 / 3 = 33.333... -> 33.33
        let receipt = redeem(&pool, &locks, MERCHANT, PHONE, 100).await.unwrap();
        assert_eq!(receipt.currency_value, Decimal::from_str("33.33").unwrap());
    }

    #[tokio::test]
    async fn test_redeem_rejects_overdraw() {
        let pool = memory_pool().await;
        let locks = locks();
        credit(&pool, &locks, MERCHANT, PHONE, adjust(50))
            .await
            .unwrap();

        let err = redeem(&pool, &locks, MERCHANT, PHONE, 100).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::InsufficientBalance);
        let details = err.details.unwrap();
        assert_eq!(details.get("requested").unwrap(), 100);
        assert_eq!(details.get("available").unwrap(), 50);
    }

    #[tokio::test]
    async fn test_redeem_requires_enabled_program() {
        let pool = memory_pool().await;
        let locks = locks();
        credit(&pool, &locks, MERCHANT, PHONE, adjust(500))
            .await
            .unwrap();
        settings::update(
            &pool,
            MERCHANT,
            LoyaltySettingsUpdate {
                is_enabled: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let err = redeem(&pool, &locks, MERCHANT, PHONE, 10).await.unwrap_err();
        assert_eq!(err.code, ErrorCode::LoyaltyDisabled);
    }

    #[tokio::test]
    async fn test_invalid_amounts_rejected() {
        let pool = memory_pool().await;
        let locks = locks();

        for points in [0, -5] {
            let err = redeem(&pool, &locks, MERCHANT, PHONE, points)
                .await
                .unwrap_err();
            assert_eq!(err.code, ErrorCode::InvalidAmount);
            let err = credit(&pool, &locks, MERCHANT, PHONE, adjust(points))
                .await
                .unwrap_err();
            assert_eq!(err.code, ErrorCode::InvalidAmount);
            let err = deduct(&pool, &locks, MERCHANT, PHONE, adjust(points))
                .await
                .unwrap_err();
            assert_eq!(err.code, ErrorCode::InvalidAmount);
        }
    }

    #[tokio::test]
    async fn test_manual_credit_carries_expiry_window() {
        let pool = memory_pool().await;
        let locks = locks();

        let entry = credit(
            &pool,
            &locks,
            MERCHANT,
            PHONE,
            Adjustment {
                points: 100,
                reason: Some("Goodwill".to_string()),
                ..Default::default()
            },
        )
            .await
            .unwrap();
        // Expiry is stamped just before the insert, so allow a little skew
        let window = entry.expires_at.unwrap() - entry.created_at;
        assert!((365 * DAY_MS - 50..=365 * DAY_MS).contains(&window));
        assert_eq!(entry.reason, "Goodwill");
    }

    #[tokio::test]
    async fn test_adjustment_stores_localized_reason_and_actor() {
        let pool = memory_pool().await;
        let locks = locks();
        credit(&pool, &locks, MERCHANT, PHONE, adjust(100))
            .await
            .unwrap();

        let entry = deduct(
            &pool,
            &locks,
            MERCHANT,
            PHONE,
            Adjustment {
                points: 40,
                reason: Some("Fraud reversal".to_string()),
                reason_ar: Some("عكس احتيال".to_string()),
                actor: Some("admin@shop".to_string()),
            },
        )
        .await
        .unwrap();
        assert_eq!(entry.reason, "Fraud reversal [admin@shop]");
        assert_eq!(entry.reason_ar, "عكس احتيال [admin@shop]");

        // Without caller text, the locale defaults still get the actor
        let entry = deduct(
            &pool,
            &locks,
            MERCHANT,
            PHONE,
            Adjustment {
                points: 10,
                actor: Some("admin@shop".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert_eq!(entry.reason, "Manual deduction [admin@shop]");
        assert_eq!(entry.reason_ar, "خصم نقاط يدوي [admin@shop]");
    }

    #[tokio::test]
    async fn test_deduct_respects_balance() {
        let pool = memory_pool().await;
        let locks = locks();
        credit(&pool, &locks, MERCHANT, PHONE, adjust(100))
            .await
            .unwrap();

        deduct(&pool, &locks, MERCHANT, PHONE, adjust(100))
            .await
            .unwrap();
        let err = deduct(&pool, &locks, MERCHANT, PHONE, adjust(1))
            .await
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::InsufficientBalance);
    }
}
