//! Accrual policy engine
//!
//! Turns business events (completed orders, referrals, reviews, birthdays)
//! into ledger credits according to the merchant's settings. Disabled
//! programs and disabled bonuses are silent no-ops so callers can fire
//! events unconditionally; duplicates collapse onto the first posting.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use shared::error::{AppError, AppResult};
use shared::models::{EntryKind, LedgerEntry, LoyaltySettings, NewLedgerEntry};
use shared::util::{now_millis, DAY_MS};
use sqlx::SqlitePool;

use crate::db::repository::{ledger, settings, RepoError};

use super::locks::CustomerLocks;

/// Why an accrual posted nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The merchant's loyalty program is switched off
    ProgramDisabled,
    /// This specific bonus is switched off
    BonusDisabled,
    /// The computed credit rounded down to zero points
    ZeroPoints,
}

/// Result of feeding one business event to the engine
#[derive(Debug)]
pub enum AccrualOutcome {
    /// A new credit landed in the ledger
    Posted(LedgerEntry),
    /// A credit for this `(kind, source_ref)` already exists; returned as-is
    AlreadyRecorded(LedgerEntry),
    /// Nothing posted, by policy
    Skipped(SkipReason),
}

impl AccrualOutcome {
    /// The ledger entry backing this event, when one exists
    pub fn entry(&self) -> Option<&LedgerEntry> {
        match self {
            AccrualOutcome::Posted(e) | AccrualOutcome::AlreadyRecorded(e) => Some(e),
            AccrualOutcome::Skipped(_) => None,
        }
    }
}

/// Points for a purchase: `floor(order_total * points_per_currency)`
pub fn purchase_points(order_total: Decimal, points_per_currency: Decimal) -> i64 {
    (order_total * points_per_currency)
        .floor()
        .to_i64()
        .unwrap_or(0)
}

/// Expiry stamp for a credit posted now; `None` when points never expire
fn expiry_for(settings: &LoyaltySettings, now: i64) -> Option<i64> {
    (settings.points_expiry_days > 0).then(|| now + settings.points_expiry_days * DAY_MS)
}

async fn post(
    pool: &SqlitePool,
    locks: &CustomerLocks,
    new: NewLedgerEntry,
) -> AppResult<AccrualOutcome> {
    let _guard = locks.acquire(new.merchant_id, &new.customer_phone).await?;

    let merchant_id = new.merchant_id;
    let kind = new.kind;
    let source_ref = new.source_ref.clone();

    match ledger::append(pool, new).await {
        Ok(entry) => {
            tracing::info!(
                merchant_id,
                customer_phone = %entry.customer_phone,
                kind = %entry.kind,
                amount = entry.amount,
                "Accrual posted"
            );
            Ok(AccrualOutcome::Posted(entry))
        }
        Err(RepoError::DuplicateAccrual { source_ref }) => {
            let existing = ledger::find_by_source_ref(pool, merchant_id, kind, &source_ref)
                .await?
                .ok_or_else(|| {
                    AppError::database(format!(
                        "Duplicate accrual for {source_ref} but original entry missing"
                    ))
                })?;
            tracing::debug!(merchant_id, %source_ref, "Accrual already recorded");
            Ok(AccrualOutcome::AlreadyRecorded(existing))
        }
        Err(err) => {
            tracing::error!(
                merchant_id,
                kind = %kind,
                source_ref = source_ref.as_deref().unwrap_or(""),
                error = %err,
                "Accrual failed"
            );
            Err(err.into())
        }
    }
}

/// Credit points for a completed order.
///
/// `source_ref` is the order identifier; retrying the same order returns
/// the original entry instead of double-crediting.
pub async fn accrue_purchase(
    pool: &SqlitePool,
    locks: &CustomerLocks,
    merchant_id: i64,
    customer_phone: &str,
    order_total: Decimal,
    source_ref: &str,
) -> AppResult<AccrualOutcome> {
    if order_total < Decimal::ZERO {
        return Err(AppError::invalid_amount("Order total must not be negative"));
    }

    let merchant = settings::ensure(pool, merchant_id).await?;
    if !merchant.is_enabled {
        return Ok(AccrualOutcome::Skipped(SkipReason::ProgramDisabled));
    }

    let points = purchase_points(order_total, merchant.points_per_currency);
    if points <= 0 {
        return Ok(AccrualOutcome::Skipped(SkipReason::ZeroPoints));
    }

    let now = now_millis();
    post(
        pool,
        locks,
        NewLedgerEntry {
            merchant_id,
            customer_phone: customer_phone.to_string(),
            kind: EntryKind::Purchase,
            amount: points,
            reason: format!("Points earned from order {source_ref}"),
            reason_ar: format!("نقاط مكتسبة من الطلب {source_ref}"),
            source_ref: Some(source_ref.to_string()),
            expires_at: expiry_for(&merchant, now),
        },
    )
    .await
}

fn bonus_reason(kind: EntryKind) -> (&'static str, &'static str) {
    match kind {
        EntryKind::ReferralBonus => ("Referral bonus", "مكافأة الإحالة"),
        EntryKind::ReviewBonus => ("Review bonus", "مكافأة التقييم"),
        EntryKind::BirthdayBonus => ("Birthday bonus", "مكافأة عيد الميلاد"),
        _ => ("Bonus", "مكافأة"),
    }
}

/// Credit a flat bonus (referral, review, or birthday).
///
/// `source_ref` identifies the triggering event: the referred order, the
/// review id, or e.g. `"birthday-2026"` for an annual birthday grant.
pub async fn accrue_bonus(
    pool: &SqlitePool,
    locks: &CustomerLocks,
    merchant_id: i64,
    customer_phone: &str,
    kind: EntryKind,
    source_ref: &str,
) -> AppResult<AccrualOutcome> {
    let merchant = settings::ensure(pool, merchant_id).await?;
    if !merchant.is_enabled {
        return Ok(AccrualOutcome::Skipped(SkipReason::ProgramDisabled));
    }

    let (enabled, points) = merchant
        .bonus_config(kind)
        .ok_or_else(|| AppError::invalid_request(format!("{kind} is not a bonus kind")))?;
    if !enabled {
        return Ok(AccrualOutcome::Skipped(SkipReason::BonusDisabled));
    }
    if points <= 0 {
        return Ok(AccrualOutcome::Skipped(SkipReason::ZeroPoints));
    }

    let (reason, reason_ar) = bonus_reason(kind);
    let now = now_millis();
    post(
        pool,
        locks,
        NewLedgerEntry {
            merchant_id,
            customer_phone: customer_phone.to_string(),
            kind,
            amount: points,
            reason: reason.to_string(),
            reason_ar: reason_ar.to_string(),
            source_ref: Some(source_ref.to_string()),
            expires_at: expiry_for(&merchant, now),
        },
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_support::memory_pool;
    use shared::models::LoyaltySettingsUpdate;
    use std::time::Duration;

    const MERCHANT: i64 = 7;
    const PHONE: &str = "966500000001";

    fn locks() -> CustomerLocks {
        CustomerLocks::new(Duration::from_secs(1))
    }

    #[test]
    fn test_purchase_points_floors() {
        let rate = Decimal::ONE;
        assert_eq!(purchase_points(Decimal::new(2505, 1), rate), 250); // 250.5
        assert_eq!(purchase_points(Decimal::new(2999, 2), rate), 29); // 29.99
        assert_eq!(purchase_points(Decimal::ZERO, rate), 0);
        // Fractional rate: 199.99 * 0.5 = 99.995 -> 99
        let half = Decimal::new(5, 1);
        assert_eq!(purchase_points(Decimal::new(19999, 2), half), 99);
    }

    #[tokio::test]
    async fn test_purchase_accrual_posts_floored_points() {
        let pool = memory_pool().await;
        let locks = locks();

        let outcome =
            accrue_purchase(&pool, &locks, MERCHANT, PHONE, Decimal::new(2505, 1), "order-1")
                .await
                .unwrap();
        let entry = match outcome {
            AccrualOutcome::Posted(e) => e,
            other => panic!("expected Posted, got {other:?}"),
        };
        assert_eq!(entry.amount, 250);
        assert_eq!(entry.kind, EntryKind::Purchase);
        // Default 365-day window, stamped just before the insert
        let window = entry.expires_at.unwrap() - entry.created_at;
        assert!((365 * DAY_MS - 50..=365 * DAY_MS).contains(&window));
    }

    #[tokio::test]
    async fn test_purchase_retry_returns_original() {
        let pool = memory_pool().await;
        let locks = locks();
        let total = Decimal::from(100);

        let first = accrue_purchase(&pool, &locks, MERCHANT, PHONE, total, "order-1")
            .await
            .unwrap();
        let first_id = first.entry().unwrap().id;

        let retry = accrue_purchase(&pool, &locks, MERCHANT, PHONE, total, "order-1")
            .await
            .unwrap();
        match retry {
            AccrualOutcome::AlreadyRecorded(e) => assert_eq!(e.id, first_id),
            other => panic!("expected AlreadyRecorded, got {other:?}"),
        }

        let entries = ledger::list_by_customer(&pool, MERCHANT, PHONE).await.unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn test_disabled_program_is_silent_noop() {
        let pool = memory_pool().await;
        let locks = locks();
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

        let outcome = accrue_purchase(&pool, &locks, MERCHANT, PHONE, Decimal::from(100), "o1")
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            AccrualOutcome::Skipped(SkipReason::ProgramDisabled)
        ));
        let outcome =
            accrue_bonus(&pool, &locks, MERCHANT, PHONE, EntryKind::ReferralBonus, "r1")
                .await
                .unwrap();
        assert!(matches!(
            outcome,
            AccrualOutcome::Skipped(SkipReason::ProgramDisabled)
        ));
        assert!(ledger::list_by_customer(&pool, MERCHANT, PHONE)
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn test_disabled_bonus_is_silent_noop() {
        let pool = memory_pool().await;
        let locks = locks();

        // Birthday bonus is off by default
        let outcome = accrue_bonus(
            &pool,
            &locks,
            MERCHANT,
            PHONE,
            EntryKind::BirthdayBonus,
            "birthday-2026",
        )
        .await
        .unwrap();
        assert!(matches!(
            outcome,
            AccrualOutcome::Skipped(SkipReason::BonusDisabled)
        ));

        // Referral bonus is on by default and posts the flat amount
        let outcome =
            accrue_bonus(&pool, &locks, MERCHANT, PHONE, EntryKind::ReferralBonus, "r1")
                .await
                .unwrap();
        assert_eq!(outcome.entry().unwrap().amount, 50);
    }

    #[tokio::test]
    async fn test_zero_point_purchase_skipped() {
        let pool = memory_pool().await;
        let locks = locks();

        // 0.50 * 1 point/unit floors to 0
        let outcome =
            accrue_purchase(&pool, &locks, MERCHANT, PHONE, Decimal::new(50, 2), "order-1")
                .await
                .unwrap();
        assert!(matches!(
            outcome,
            AccrualOutcome::Skipped(SkipReason::ZeroPoints)
        ));
    }

    #[tokio::test]
    async fn test_negative_total_rejected() {
        let pool = memory_pool().await;
        let locks = locks();
        let err = accrue_purchase(&pool, &locks, MERCHANT, PHONE, Decimal::from(-1), "o1")
            .await
            .unwrap_err();
        assert_eq!(err.code, shared::error::ErrorCode::InvalidAmount);
    }

    #[tokio::test]
    async fn test_non_bonus_kind_rejected() {
        let pool = memory_pool().await;
        let locks = locks();
        let err = accrue_bonus(&pool, &locks, MERCHANT, PHONE, EntryKind::Purchase, "o1")
            .await
            .unwrap_err();
        assert_eq!(err.code, shared::error::ErrorCode::InvalidRequest);
    }

    #[tokio::test]
    async fn test_zero_expiry_days_means_no_expiry() {
        let pool = memory_pool().await;
        let locks = locks();
        settings::update(
            &pool,
            MERCHANT,
            LoyaltySettingsUpdate {
                points_expiry_days: Some(0),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let outcome = accrue_purchase(&pool, &locks, MERCHANT, PHONE, Decimal::from(10), "o1")
            .await
            .unwrap();
        assert_eq!(outcome.entry().unwrap().expires_at, None);
    }
}
