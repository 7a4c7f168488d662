use std::sync::Arc;
use std::time::Duration;

use shared::error::AppResult;
use sqlx::SqlitePool;

use crate::core::Config;
use crate::db::DbService;
use crate::loyalty::{CustomerLocks, ExpirySweeper};

/// Shared server state - one instance cloned into every handler
///
/// | Field | Description |
/// |-------|-------------|
/// | config | Immutable server configuration |
/// | db | SQLite pool wrapper |
/// | locks | Per-customer write serialization |
#[derive(Clone)]
pub struct ServerState {
    pub config: Config,
    pub db: DbService,
    pub locks: Arc<CustomerLocks>,
}

impl ServerState {
    /// Open the database, run migrations, and build the shared state
    pub async fn initialize(config: &Config) -> AppResult<Self> {
        let db = DbService::new(&config.database_path).await?;
        let locks = Arc::new(CustomerLocks::new(Duration::from_millis(
            config.lock_timeout_ms,
        )));
        Ok(Self {
            config: config.clone(),
            db,
            locks,
        })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.db.pool
    }

    /// Build the expiry sweeper bound to this state
    pub fn sweeper(&self) -> ExpirySweeper {
        ExpirySweeper::new(
            self.db.pool.clone(),
            self.locks.clone(),
            Duration::from_secs(self.config.sweep_interval_secs),
        )
    }
}
