//! Shared types for the loyalty engine
//!
//! Common types used across crates: ledger and settings models,
//! unified error codes, API response structures, and ID/time utilities.

pub mod error;
pub mod models;
pub mod util;

// Re-exports
pub use axum::{Json, body};
pub use http;
pub use serde::{Deserialize, Serialize};

pub use error::{ApiResponse, AppError, AppResult, ErrorCode};
pub use models::{CustomerBalance, EntryKind, LedgerEntry, LoyaltySettings, LoyaltyTier};
