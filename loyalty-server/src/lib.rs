//! Loyalty Server - points engine for WhatsApp-commerce merchants
//!
//! # Architecture overview
//!
//! The customer points ledger is the single source of truth: every credit,
//! debit, redemption, and expiry is an immutable row, and balances are
//! projected from history on read.
//!
//! - **Ledger** (`db/repository/ledger`): append-only store with atomic
//!   balance enforcement and idempotent accruals
//! - **Projector** (`loyalty/projector`): first-expiring-first-out balance
//!   replay with lazy expiry
//! - **Accrual** (`loyalty/accrual`): turns orders and bonus events into
//!   credits per merchant settings
//! - **Sweeper** (`loyalty/sweeper`): periodically retires expired credits
//! - **HTTP API** (`api`): merchant-scoped REST interface
//!
//! # Module structure
//!
//! ```text
//! loyalty-server/src/
//! ├── core/          # config, state, server, background tasks
//! ├── db/            # SQLite pool, migrations, repositories
//! ├── loyalty/       # projector, accrual, redemption, sweeper
//! ├── api/           # HTTP routes and handlers
//! ├── routes/        # router assembly and middleware
//! └── utils/         # logging
//! ```

pub mod api;
pub mod core;
pub mod db;
pub mod loyalty;
pub mod routes;
pub mod utils;

// Re-export public types
pub use crate::core::{Config, Server, ServerState};
pub use loyalty::{CustomerLocks, ExpirySweeper};

// Re-export unified error types from shared
pub use shared::error::{ApiResponse, AppError, AppResult, ErrorCategory, ErrorCode};

// Re-export logger functions
pub use utils::logger::{init_logger, init_logger_with_file};

/// Prepare the process environment: dotenv, working directory, logging
pub fn setup_environment() -> std::io::Result<()> {
    dotenv::dotenv().ok();

    let work_dir = std::env::var("WORK_DIR").unwrap_or_else(|_| "/var/lib/loyalty".into());
    std::fs::create_dir_all(&work_dir)?;
    let log_dir = format!("{work_dir}/logs");
    std::fs::create_dir_all(&log_dir)?;

    let level = std::env::var("LOG_LEVEL").ok();
    init_logger_with_file(level.as_deref(), Some(&log_dir));
    Ok(())
}

pub fn print_banner() {
    println!(
        r#"
    __                        __ __
   / /   ____  __  ______ _  / / /___  __
  / /   / __ \/ / / / __ `/ / / __/ / / /
 / /___/ /_/ / /_/ / /_/ / / / /_/ /_/ /
/_____/\____/\__, /\__,_/_/_/\__/\__, /
            /____/              /____/
    "#
    );
}
