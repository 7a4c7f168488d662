//! Domain models shared between the server and clients

pub mod customer;
pub mod ledger;
pub mod settings;
pub mod tier;

pub use customer::{CustomerBalance, CustomerSummary, LoyaltyStats};
pub use ledger::{EntryKind, LedgerEntry, NewLedgerEntry};
pub use settings::{LoyaltySettings, LoyaltySettingsUpdate};
pub use tier::{default_tiers, LoyaltyTier, LoyaltyTierCreate, LoyaltyTierUpdate};
