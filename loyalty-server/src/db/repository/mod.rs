//! Repository Module
//!
//! SQLite-backed stores for the loyalty core. The ledger repository is the
//! only mutating surface for point balances; settings and tiers are plain
//! CRUD.

pub mod ledger;
pub mod settings;
pub mod tier;

use shared::error::AppError;
use thiserror::Error;

/// Repository error types
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Duplicate accrual for source_ref {source_ref}")]
    DuplicateAccrual { source_ref: String },

    #[error("Insufficient balance: requested {requested}, available {available}")]
    InsufficientBalance { requested: i64, available: i64 },

    #[error("Invalid entry: {0}")]
    InvalidEntry(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<sqlx::Error> for RepoError {
    fn from(err: sqlx::Error) -> Self {
        RepoError::Database(err.to_string())
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound(msg) => AppError::not_found(msg),
            RepoError::DuplicateAccrual { source_ref } => AppError::duplicate_accrual(source_ref),
            RepoError::InsufficientBalance {
                requested,
                available,
            } => AppError::insufficient_balance(requested, available),
            RepoError::InvalidEntry(msg) => AppError::invalid_amount(msg),
            RepoError::Database(msg) => AppError::database(msg),
        }
    }
}

/// Result type for repository operations
pub type RepoResult<T> = Result<T, RepoError>;
