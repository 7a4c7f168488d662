//! Loyalty domain services
//!
//! The ledger repository owns persistence; everything here is policy:
//! projecting balances, turning business events into credits, converting
//! points back into money, and retiring expired credits.

pub mod accrual;
pub mod customers;
pub mod locks;
pub mod projector;
pub mod redemption;
pub mod sweeper;

pub use accrual::{AccrualOutcome, SkipReason};
pub use locks::CustomerLocks;
pub use redemption::{Adjustment, RedemptionReceipt};
pub use sweeper::{ExpirySweeper, SweepReport};
