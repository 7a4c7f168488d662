//! Loyalty settings model (per-merchant configuration)

use super::ledger::EntryKind;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Loyalty program configuration, one row per merchant
///
/// Created with defaults on first access and updated only through the
/// settings API. Every policy decision receives the merchant's own record;
/// there is no process-wide configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoyaltySettings {
    pub merchant_id: i64,
    pub is_enabled: bool,
    /// Points credited per currency unit spent (purchase accrual rate)
    pub points_per_currency: Decimal,
    /// Currency units returned per point redeemed
    pub currency_per_point: Decimal,
    pub enable_referral_bonus: bool,
    pub referral_bonus_points: i64,
    pub enable_review_bonus: bool,
    pub review_bonus_points: i64,
    pub enable_birthday_bonus: bool,
    pub birthday_bonus_points: i64,
    /// Credit lifetime in days; 0 = points never expire
    pub points_expiry_days: i64,
    pub created_at: i64,
    pub updated_at: i64,
}

impl LoyaltySettings {
    /// Default configuration seeded on merchant signup
    pub fn defaults(merchant_id: i64, now: i64) -> Self {
        Self {
            merchant_id,
            is_enabled: true,
            points_per_currency: Decimal::ONE,
            currency_per_point: Decimal::from(10),
            enable_referral_bonus: true,
            referral_bonus_points: 50,
            enable_review_bonus: true,
            review_bonus_points: 10,
            enable_birthday_bonus: false,
            birthday_bonus_points: 20,
            points_expiry_days: 365,
            created_at: now,
            updated_at: now,
        }
    }

    /// Toggle and flat amount for a bonus kind; `None` for non-bonus kinds
    pub fn bonus_config(&self, kind: EntryKind) -> Option<(bool, i64)> {
        match kind {
            EntryKind::ReferralBonus => {
                Some((self.enable_referral_bonus, self.referral_bonus_points))
            }
            EntryKind::ReviewBonus => Some((self.enable_review_bonus, self.review_bonus_points)),
            EntryKind::BirthdayBonus => {
                Some((self.enable_birthday_bonus, self.birthday_bonus_points))
            }
            _ => None,
        }
    }
}

/// Partial update payload for loyalty settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoyaltySettingsUpdate {
    pub is_enabled: Option<bool>,
    pub points_per_currency: Option<Decimal>,
    pub currency_per_point: Option<Decimal>,
    pub enable_referral_bonus: Option<bool>,
    pub referral_bonus_points: Option<i64>,
    pub enable_review_bonus: Option<bool>,
    pub review_bonus_points: Option<i64>,
    pub enable_birthday_bonus: Option<bool>,
    pub birthday_bonus_points: Option<i64>,
    pub points_expiry_days: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_signup_seed() {
        let s = LoyaltySettings::defaults(7, 1_000);
        assert!(s.is_enabled);
        assert_eq!(s.points_per_currency, Decimal::ONE);
        assert_eq!(s.currency_per_point, Decimal::from(10));
        assert_eq!(s.referral_bonus_points, 50);
        assert_eq!(s.review_bonus_points, 10);
        assert!(!s.enable_birthday_bonus);
        assert_eq!(s.points_expiry_days, 365);
    }

    #[test]
    fn test_bonus_config_lookup() {
        let s = LoyaltySettings::defaults(7, 0);
        assert_eq!(s.bonus_config(EntryKind::ReferralBonus), Some((true, 50)));
        assert_eq!(s.bonus_config(EntryKind::BirthdayBonus), Some((false, 20)));
        assert_eq!(s.bonus_config(EntryKind::Purchase), None);
        assert_eq!(s.bonus_config(EntryKind::Redemption), None);
    }
}
