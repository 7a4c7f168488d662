//! Customer read-side queries
//!
//! Balances and summaries are projected from the ledger on demand; there
//! is no stored balance to drift out of sync.

use shared::error::{AppError, AppResult, ErrorCode};
use shared::models::{CustomerBalance, CustomerSummary, LedgerEntry};
use shared::util::now_millis;
use sqlx::SqlitePool;

use crate::db::repository::{ledger, tier};

use super::projector;

/// Projected balance and tier for one customer.
///
/// Errors with `CustomerNotFound` when the customer has no ledger history
/// under this merchant.
pub async fn balance(
    pool: &SqlitePool,
    merchant_id: i64,
    customer_phone: &str,
) -> AppResult<CustomerBalance> {
    let entries = ledger::list_by_customer(pool, merchant_id, customer_phone).await?;
    if entries.is_empty() {
        return Err(
            AppError::new(ErrorCode::CustomerNotFound).with_detail("customer_phone", customer_phone)
        );
    }
    let tiers = tier::list(pool, merchant_id).await?;
    Ok(projector::project(
        merchant_id,
        customer_phone,
        &entries,
        &tiers,
        now_millis(),
    ))
}

/// Paged transaction history, newest first
pub async fn transactions(
    pool: &SqlitePool,
    merchant_id: i64,
    customer_phone: &str,
    limit: i64,
    offset: i64,
) -> AppResult<Vec<LedgerEntry>> {
    Ok(ledger::page_transactions(pool, merchant_id, customer_phone, limit, offset).await?)
}

/// Paged list of customers with projected balances, highest lifetime
/// points first.
pub async fn summaries(
    pool: &SqlitePool,
    merchant_id: i64,
    limit: i64,
    offset: i64,
) -> AppResult<Vec<CustomerSummary>> {
    let customers = ledger::list_customers(pool, merchant_id, limit, offset).await?;
    let tiers = tier::list(pool, merchant_id).await?;
    let as_of = now_millis();

    let mut result = Vec::with_capacity(customers.len());
    for (phone, last_activity_at) in customers {
        let entries = ledger::list_by_customer(pool, merchant_id, &phone).await?;
        let projection = projector::project_entries(&entries);
        let tier_name = projector::resolve_tier(&tiers, projection.lifetime_points)
            .map(|t| t.name.clone());
        result.push(CustomerSummary {
            customer_phone: phone,
            current_points: projection.current_points(as_of),
            lifetime_points: projection.lifetime_points,
            tier_name,
            last_activity_at,
        });
    }
    Ok(result)
}
