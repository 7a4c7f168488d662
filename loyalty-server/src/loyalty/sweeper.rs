//! Expiry sweeper
//!
//! Periodically retires credits whose expiry window has passed by posting
//! `expiry` debits. Balances already exclude stale credits lazily, so the
//! sweeper only materializes the loss in the audit trail; a missed or late
//! run never changes what customers can spend.
//!
//! Each expiry entry carries the retired credit's id as its `source_ref`,
//! so a crashed or concurrent sweep resumes without double-posting.

use shared::error::AppResult;
use shared::models::{EntryKind, NewLedgerEntry};
use shared::util::now_millis;
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::db::repository::{ledger, RepoError};

use super::locks::CustomerLocks;
use super::projector;

/// Totals from one sweep pass
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub merchants_scanned: usize,
    pub customers_scanned: usize,
    pub entries_posted: usize,
    pub points_expired: i64,
}

#[derive(Clone)]
pub struct ExpirySweeper {
    pool: SqlitePool,
    locks: Arc<CustomerLocks>,
    interval: Duration,
}

impl ExpirySweeper {
    pub fn new(pool: SqlitePool, locks: Arc<CustomerLocks>, interval: Duration) -> Self {
        Self {
            pool,
            locks,
            interval,
        }
    }

    /// Retire expired credits for one customer. Returns
    /// `(entries_posted, points_expired)`.
    pub async fn sweep_customer(
        &self,
        merchant_id: i64,
        customer_phone: &str,
        now: i64,
    ) -> AppResult<(usize, i64)> {
        let _guard = self.locks.acquire(merchant_id, customer_phone).await?;

        let entries = ledger::list_by_customer(&self.pool, merchant_id, customer_phone).await?;
        let projection = projector::project_entries(&entries);

        let mut posted = 0usize;
        let mut expired_points = 0i64;
        for credit in projection.expirable_credits(now) {
            // Fully consumed credits have nothing left to retire
            if credit.remaining <= 0 {
                continue;
            }
            let result = ledger::append(
                &self.pool,
                NewLedgerEntry {
                    merchant_id,
                    customer_phone: customer_phone.to_string(),
                    kind: EntryKind::Expiry,
                    amount: -credit.remaining,
                    reason: "Points expired".to_string(),
                    reason_ar: "انتهاء صلاحية النقاط".to_string(),
                    source_ref: Some(credit.entry_id.to_string()),
                    expires_at: None,
                },
            )
            .await;

            match result {
                Ok(_) => {
                    posted += 1;
                    expired_points += credit.remaining;
                }
                // Another sweep got here first
                Err(RepoError::DuplicateAccrual { .. }) => {}
                Err(err) => return Err(err.into()),
            }
        }
        Ok((posted, expired_points))
    }

    /// Sweep every customer of one merchant holding stale credits
    pub async fn sweep_merchant(&self, merchant_id: i64, now: i64) -> AppResult<(usize, i64)> {
        let phones = ledger::customers_with_expirable(&self.pool, merchant_id, now).await?;
        let mut posted = 0usize;
        let mut expired_points = 0i64;
        for phone in phones {
            let (p, x) = self.sweep_customer(merchant_id, &phone, now).await?;
            posted += p;
            expired_points += x;
        }
        Ok((posted, expired_points))
    }

    /// One full pass over every merchant with stale credits.
    ///
    /// A failing merchant is logged and skipped so one tenant's trouble
    /// does not stall the others.
    pub async fn sweep_all(&self, now: i64) -> SweepReport {
        let merchants = match ledger::merchants_with_expirable(&self.pool, now).await {
            Ok(m) => m,
            Err(err) => {
                tracing::error!(error = %err, "Expiry sweep scan failed");
                return SweepReport::default();
            }
        };

        let mut report = SweepReport {
            merchants_scanned: merchants.len(),
            ..Default::default()
        };
        for merchant_id in merchants {
            let customers = ledger::customers_with_expirable(&self.pool, merchant_id, now)
                .await
                .unwrap_or_default();
            report.customers_scanned += customers.len();

            match self.sweep_merchant(merchant_id, now).await {
                Ok((posted, points)) => {
                    report.entries_posted += posted;
                    report.points_expired += points;
                }
                Err(err) => {
                    tracing::error!(merchant_id, error = %err, "Expiry sweep failed for merchant");
                }
            }
        }

        if report.entries_posted > 0 {
            tracing::info!(
                merchants = report.merchants_scanned,
                entries = report.entries_posted,
                points = report.points_expired,
                "Expired credits retired"
            );
        }
        report
    }

    /// Periodic loop until the token is cancelled. An immediate pass runs
    /// on startup to catch up after downtime.
    pub async fn run(self, cancel: CancellationToken) {
        tracing::info!(interval_secs = self.interval.as_secs(), "Expiry sweeper started");
        let mut ticker = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.sweep_all(now_millis()).await;
                }
                _ = cancel.cancelled() => {
                    tracing::info!("Expiry sweeper stopped");
                    return;
                }
            }
        }
    }
}
