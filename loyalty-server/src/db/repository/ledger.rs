//! Ledger repository - the only mutating surface for customer points
//!
//! Every append runs inside a transaction: the customer's history is
//! replayed, the resulting balance is checked, and only then is the row
//! inserted. The partial unique index on `(merchant_id, kind, source_ref)`
//! backs the duplicate check under concurrency.

use shared::models::{EntryKind, LedgerEntry, LoyaltyStats, NewLedgerEntry};
use shared::util::{now_millis, snowflake_id};
use sqlx::SqlitePool;

use super::{RepoError, RepoResult};
use crate::loyalty::projector;

const SELECT_COLS: &str = "id, merchant_id, customer_phone, kind, amount, reason, reason_ar, \
     source_ref, created_at, expires_at";

#[derive(sqlx::FromRow)]
struct LedgerRow {
    id: i64,
    merchant_id: i64,
    customer_phone: String,
    kind: String,
    amount: i64,
    reason: String,
    reason_ar: String,
    source_ref: Option<String>,
    created_at: i64,
    expires_at: Option<i64>,
}

impl LedgerRow {
    fn into_entry(self) -> RepoResult<LedgerEntry> {
        let kind = EntryKind::parse(&self.kind)
            .ok_or_else(|| RepoError::Database(format!("Unknown ledger kind: {}", self.kind)))?;
        Ok(LedgerEntry {
            id: self.id,
            merchant_id: self.merchant_id,
            customer_phone: self.customer_phone,
            kind,
            amount: self.amount,
            reason: self.reason,
            reason_ar: self.reason_ar,
            source_ref: self.source_ref,
            created_at: self.created_at,
            expires_at: self.expires_at,
        })
    }
}

fn rows_to_entries(rows: Vec<LedgerRow>) -> RepoResult<Vec<LedgerEntry>> {
    rows.into_iter().map(LedgerRow::into_entry).collect()
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.message().contains("UNIQUE constraint failed"))
}

/// Validate the shape of a new entry before touching the database
fn validate(new: &NewLedgerEntry) -> RepoResult<()> {
    if new.amount == 0 {
        return Err(RepoError::InvalidEntry(
            "Entry amount must be non-zero".to_string(),
        ));
    }
    if new.kind.is_credit() && new.amount < 0 {
        return Err(RepoError::InvalidEntry(format!(
            "{} entries must carry a positive amount",
            new.kind
        )));
    }
    if new.kind.is_debit() && new.amount > 0 {
        return Err(RepoError::InvalidEntry(format!(
            "{} entries must carry a negative amount",
            new.kind
        )));
    }
    if new.kind.requires_unique_source_ref() && new.source_ref.is_none() {
        return Err(RepoError::InvalidEntry(format!(
            "{} entries require a source_ref",
            new.kind
        )));
    }
    if new.expires_at.is_some() && !new.kind.is_credit() {
        return Err(RepoError::InvalidEntry(
            "Only credit entries may carry an expiry".to_string(),
        ));
    }
    Ok(())
}

/// Append an entry, enforcing idempotency and the non-negative balance
/// invariant atomically.
///
/// Debits (other than expiry, whose amount the sweeper caps against the
/// same projection) are rejected with `InsufficientBalance` when the
/// customer's spendable balance at append time cannot cover them.
pub async fn append(pool: &SqlitePool, new: NewLedgerEntry) -> RepoResult<LedgerEntry> {
    validate(&new)?;

    let mut tx = pool.begin().await?;

    if let Some(source_ref) = new.source_ref.as_deref() {
        if new.kind.requires_unique_source_ref() {
            let existing: Option<(i64,)> = sqlx::query_as(
                "SELECT id FROM loyalty_ledger \
                 WHERE merchant_id = ? AND kind = ? AND source_ref = ?",
            )
            .bind(new.merchant_id)
            .bind(new.kind.as_str())
            .bind(source_ref)
            .fetch_optional(&mut *tx)
            .await?;
            if existing.is_some() {
                return Err(RepoError::DuplicateAccrual {
                    source_ref: source_ref.to_string(),
                });
            }
        }
    }

    let created_at = now_millis();

    if new.amount < 0 && new.kind != EntryKind::Expiry {
        let rows: Vec<LedgerRow> = sqlx::query_as(&format!(
            "SELECT {SELECT_COLS} FROM loyalty_ledger \
             WHERE merchant_id = ? AND customer_phone = ? \
             ORDER BY created_at ASC, id ASC"
        ))
        .bind(new.merchant_id)
        .bind(&new.customer_phone)
        .fetch_all(&mut *tx)
        .await?;

        let entries = rows_to_entries(rows)?;
        let available = projector::project_entries(&entries).current_points(created_at);
        let requested = -new.amount;
        if available < requested {
            return Err(RepoError::InsufficientBalance {
                requested,
                available,
            });
        }
    }

    let entry = LedgerEntry {
        id: snowflake_id(),
        merchant_id: new.merchant_id,
        customer_phone: new.customer_phone,
        kind: new.kind,
        amount: new.amount,
        reason: new.reason,
        reason_ar: new.reason_ar,
        source_ref: new.source_ref,
        created_at,
        expires_at: new.expires_at,
    };

    let insert = sqlx::query(
        "INSERT INTO loyalty_ledger \
         (id, merchant_id, customer_phone, kind, amount, reason, reason_ar, \
          source_ref, created_at, expires_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(entry.id)
    .bind(entry.merchant_id)
    .bind(&entry.customer_phone)
    .bind(entry.kind.as_str())
    .bind(entry.amount)
    .bind(&entry.reason)
    .bind(&entry.reason_ar)
    .bind(&entry.source_ref)
    .bind(entry.created_at)
    .bind(entry.expires_at)
    .execute(&mut *tx)
    .await;

    match insert {
        Ok(_) => {}
        // Lost a race on the unique index between the check and the insert
        Err(err) if is_unique_violation(&err) => {
            return Err(RepoError::DuplicateAccrual {
                source_ref: entry.source_ref.unwrap_or_default(),
            });
        }
        Err(err) => return Err(err.into()),
    }

    tx.commit().await?;
    Ok(entry)
}

/// Full history for one customer in replay order `(created_at, id)`
pub async fn list_by_customer(
    pool: &SqlitePool,
    merchant_id: i64,
    customer_phone: &str,
) -> RepoResult<Vec<LedgerEntry>> {
    let rows: Vec<LedgerRow> = sqlx::query_as(&format!(
        "SELECT {SELECT_COLS} FROM loyalty_ledger \
         WHERE merchant_id = ? AND customer_phone = ? \
         ORDER BY created_at ASC, id ASC"
    ))
    .bind(merchant_id)
    .bind(customer_phone)
    .fetch_all(pool)
    .await?;
    rows_to_entries(rows)
}

/// Paged history for display, newest first
pub async fn page_transactions(
    pool: &SqlitePool,
    merchant_id: i64,
    customer_phone: &str,
    limit: i64,
    offset: i64,
) -> RepoResult<Vec<LedgerEntry>> {
    let rows: Vec<LedgerRow> = sqlx::query_as(&format!(
        "SELECT {SELECT_COLS} FROM loyalty_ledger \
         WHERE merchant_id = ? AND customer_phone = ? \
         ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?"
    ))
    .bind(merchant_id)
    .bind(customer_phone)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;
    rows_to_entries(rows)
}

/// Look up an entry by its idempotency key
pub async fn find_by_source_ref(
    pool: &SqlitePool,
    merchant_id: i64,
    kind: EntryKind,
    source_ref: &str,
) -> RepoResult<Option<LedgerEntry>> {
    let row: Option<LedgerRow> = sqlx::query_as(&format!(
        "SELECT {SELECT_COLS} FROM loyalty_ledger \
         WHERE merchant_id = ? AND kind = ? AND source_ref = ?"
    ))
    .bind(merchant_id)
    .bind(kind.as_str())
    .bind(source_ref)
    .fetch_optional(pool)
    .await?;
    row.map(LedgerRow::into_entry).transpose()
}

/// Distinct customers with ledger activity, ordered by lifetime points
/// (the sum of their credits) descending.
/// Returns `(customer_phone, last_activity_at)` pairs.
pub async fn list_customers(
    pool: &SqlitePool,
    merchant_id: i64,
    limit: i64,
    offset: i64,
) -> RepoResult<Vec<(String, i64)>> {
    let rows: Vec<(String, i64)> = sqlx::query_as(
        "SELECT customer_phone, MAX(created_at) AS last_activity_at \
         FROM loyalty_ledger WHERE merchant_id = ? \
         GROUP BY customer_phone \
         ORDER BY COALESCE(SUM(CASE WHEN amount > 0 THEN amount END), 0) DESC \
         LIMIT ? OFFSET ?",
    )
    .bind(merchant_id)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Merchants holding credits whose expiry window has passed
pub async fn merchants_with_expirable(pool: &SqlitePool, now: i64) -> RepoResult<Vec<i64>> {
    let rows: Vec<(i64,)> = sqlx::query_as(
        "SELECT DISTINCT merchant_id FROM loyalty_ledger \
         WHERE expires_at IS NOT NULL AND expires_at <= ?",
    )
    .bind(now)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

/// Customers of one merchant holding credits past their expiry window.
/// The sweeper projects each to find which credits still need retiring.
pub async fn customers_with_expirable(
    pool: &SqlitePool,
    merchant_id: i64,
    now: i64,
) -> RepoResult<Vec<String>> {
    let rows: Vec<(String,)> = sqlx::query_as(
        "SELECT DISTINCT customer_phone FROM loyalty_ledger \
         WHERE merchant_id = ? AND expires_at IS NOT NULL AND expires_at <= ?",
    )
    .bind(merchant_id)
    .bind(now)
    .fetch_all(pool)
    .await?;
    Ok(rows.into_iter().map(|(phone,)| phone).collect())
}

/// Merchant-wide aggregates for the dashboard
pub async fn stats(pool: &SqlitePool, merchant_id: i64) -> RepoResult<LoyaltyStats> {
    let row: (i64, i64, i64, i64, i64) = sqlx::query_as(
        "SELECT \
           COUNT(DISTINCT customer_phone), \
           COALESCE(SUM(CASE WHEN amount > 0 THEN amount END), 0), \
           COALESCE(-SUM(CASE WHEN kind = 'redemption' THEN amount END), 0), \
           COALESCE(-SUM(CASE WHEN kind = 'expiry' THEN amount END), 0), \
           COALESCE(SUM(CASE WHEN kind = 'redemption' THEN 1 END), 0) \
         FROM loyalty_ledger WHERE merchant_id = ?",
    )
    .bind(merchant_id)
    .fetch_one(pool)
    .await?;
    Ok(LoyaltyStats {
        total_customers: row.0,
        total_points_distributed: row.1,
        total_points_redeemed: row.2,
        total_points_expired: row.3,
        total_redemptions: row.4,
    })
}
