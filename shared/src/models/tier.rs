//! Loyalty tier model

use serde::{Deserialize, Serialize};

/// Loyalty tier - a named level derived from lifetime accumulated points
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "db", derive(sqlx::FromRow))]
pub struct LoyaltyTier {
    pub id: i64,
    pub merchant_id: i64,
    pub name: String,
    pub name_ar: String,
    /// Lifetime-points threshold to reach this tier
    pub min_points: i64,
    pub discount_percentage: i64,
    pub free_shipping: bool,
    /// Display ordering in the admin UI
    pub priority: i64,
    pub color: Option<String>,
    pub icon: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Create tier payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoyaltyTierCreate {
    pub name: String,
    pub name_ar: String,
    pub min_points: i64,
    pub discount_percentage: i64,
    pub free_shipping: bool,
    pub priority: i64,
    pub color: Option<String>,
    pub icon: Option<String>,
}

/// Update tier payload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoyaltyTierUpdate {
    pub name: Option<String>,
    pub name_ar: Option<String>,
    pub min_points: Option<i64>,
    pub discount_percentage: Option<i64>,
    pub free_shipping: Option<bool>,
    pub priority: Option<i64>,
    pub color: Option<String>,
    pub icon: Option<String>,
}

/// Default tiers seeded with the settings row on merchant signup
pub fn default_tiers() -> Vec<LoyaltyTierCreate> {
    vec![
        LoyaltyTierCreate {
            name: "Bronze".to_string(),
            name_ar: "برونزي".to_string(),
            min_points: 0,
            discount_percentage: 5,
            free_shipping: false,
            priority: 1,
            color: Some("#CD7F32".to_string()),
            icon: Some("🥉".to_string()),
        },
        LoyaltyTierCreate {
            name: "Silver".to_string(),
            name_ar: "فضي".to_string(),
            min_points: 500,
            discount_percentage: 10,
            free_shipping: true,
            priority: 2,
            color: Some("#C0C0C0".to_string()),
            icon: Some("🥈".to_string()),
        },
        LoyaltyTierCreate {
            name: "Gold".to_string(),
            name_ar: "ذهبي".to_string(),
            min_points: 1500,
            discount_percentage: 15,
            free_shipping: true,
            priority: 3,
            color: Some("#FFD700".to_string()),
            icon: Some("🥇".to_string()),
        },
    ]
}
