//! Derived customer balance and reporting models
//!
//! Balances are projections over the ledger, never stored authoritatively.

use super::tier::LoyaltyTier;
use serde::{Deserialize, Serialize};

/// Projected balance for one customer
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerBalance {
    pub merchant_id: i64,
    pub customer_phone: String,
    /// Sum of non-expired credits minus all debits; never negative
    pub current_points: i64,
    /// Sum of all positive credits ever posted; never decreases
    pub lifetime_points: i64,
    /// Highest tier whose threshold is <= lifetime_points
    pub tier: Option<LoyaltyTier>,
}

/// One row of the merchant's customer listing, ordered by lifetime points
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerSummary {
    pub customer_phone: String,
    pub current_points: i64,
    pub lifetime_points: i64,
    pub tier_name: Option<String>,
    /// Timestamp of the newest ledger entry for this customer
    pub last_activity_at: i64,
}

/// Merchant-wide loyalty program statistics
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoyaltyStats {
    pub total_customers: i64,
    /// Sum of all positive credit amounts ever posted
    pub total_points_distributed: i64,
    /// Absolute sum of redemption debits
    pub total_points_redeemed: i64,
    /// Absolute sum of expiry debits
    pub total_points_expired: i64,
    /// Count of redemption entries
    pub total_redemptions: i64,
}
