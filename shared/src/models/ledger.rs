//! Ledger entry model - immutable point-affecting facts
//!
//! Every change to a customer's points is an append-only `LedgerEntry`.
//! Corrections are new entries; rows are never mutated or deleted.

use serde::{Deserialize, Serialize};

/// Ledger entry kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "db", derive(sqlx::Type))]
#[cfg_attr(feature = "db", sqlx(rename_all = "snake_case"))]
pub enum EntryKind {
    /// Credit earned from a completed order
    Purchase,
    /// Flat bonus for a confirmed referral
    ReferralBonus,
    /// Flat bonus for a product review
    ReviewBonus,
    /// Flat bonus on the customer's birthday
    BirthdayBonus,
    /// Admin-initiated credit adjustment
    ManualCredit,
    /// Admin-initiated debit adjustment
    ManualDebit,
    /// Points converted back into monetary value
    Redemption,
    /// Stale credit retired by the sweeper
    Expiry,
}

impl EntryKind {
    /// Kinds that carry a positive amount
    pub fn is_credit(&self) -> bool {
        matches!(
            self,
            EntryKind::Purchase
                | EntryKind::ReferralBonus
                | EntryKind::ReviewBonus
                | EntryKind::BirthdayBonus
                | EntryKind::ManualCredit
        )
    }

    /// Kinds that carry a negative amount
    pub fn is_debit(&self) -> bool {
        !self.is_credit()
    }

    /// Kinds generated automatically from a business event.
    ///
    /// These are the kinds whose `(kind, source_ref)` pair is unique per
    /// merchant - the guard against double-crediting a retried webhook.
    pub fn is_accrual(&self) -> bool {
        matches!(
            self,
            EntryKind::Purchase
                | EntryKind::ReferralBonus
                | EntryKind::ReviewBonus
                | EntryKind::BirthdayBonus
        )
    }

    /// Kinds guarded by the `(kind, source_ref)` uniqueness constraint.
    ///
    /// Accruals reference the originating business object; expiry entries
    /// reference the credit they retire. Both must be idempotent under
    /// retries.
    pub fn requires_unique_source_ref(&self) -> bool {
        self.is_accrual() || *self == EntryKind::Expiry
    }

    /// Stable string form used in the database and the API
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Purchase => "purchase",
            EntryKind::ReferralBonus => "referral_bonus",
            EntryKind::ReviewBonus => "review_bonus",
            EntryKind::BirthdayBonus => "birthday_bonus",
            EntryKind::ManualCredit => "manual_credit",
            EntryKind::ManualDebit => "manual_debit",
            EntryKind::Redemption => "redemption",
            EntryKind::Expiry => "expiry",
        }
    }

    /// Parse the stable string form
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "purchase" => Some(EntryKind::Purchase),
            "referral_bonus" => Some(EntryKind::ReferralBonus),
            "review_bonus" => Some(EntryKind::ReviewBonus),
            "birthday_bonus" => Some(EntryKind::BirthdayBonus),
            "manual_credit" => Some(EntryKind::ManualCredit),
            "manual_debit" => Some(EntryKind::ManualDebit),
            "redemption" => Some(EntryKind::Redemption),
            "expiry" => Some(EntryKind::Expiry),
            _ => None,
        }
    }
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Ledger entry - immutable audit record of a point credit or debit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Snowflake ID, monotonically assigned
    pub id: i64,
    /// Owning tenant
    pub merchant_id: i64,
    /// Merchant-scoped customer identifier (phone number)
    pub customer_phone: String,
    /// Entry kind
    pub kind: EntryKind,
    /// Signed point amount; positive = credit, negative = debit/expiry
    pub amount: i64,
    /// Free-form audit text
    pub reason: String,
    /// Audit text, Arabic locale
    pub reason_ar: String,
    /// Reference to the originating business object (order id, referral id,
    /// or the expired credit's entry id)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_ref: Option<String>,
    /// Server timestamp (Unix milliseconds), immutable
    pub created_at: i64,
    /// Expiry timestamp; only set on credit entries, NULL = never expires
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
}

/// Payload for appending a new ledger entry
///
/// `id` and `created_at` are assigned by the ledger store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewLedgerEntry {
    pub merchant_id: i64,
    pub customer_phone: String,
    pub kind: EntryKind,
    pub amount: i64,
    pub reason: String,
    pub reason_ar: String,
    pub source_ref: Option<String>,
    pub expires_at: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_credit_debit_partition() {
        for kind in [
            EntryKind::Purchase,
            EntryKind::ReferralBonus,
            EntryKind::ReviewBonus,
            EntryKind::BirthdayBonus,
            EntryKind::ManualCredit,
        ] {
            assert!(kind.is_credit());
            assert!(!kind.is_debit());
        }
        for kind in [
            EntryKind::ManualDebit,
            EntryKind::Redemption,
            EntryKind::Expiry,
        ] {
            assert!(kind.is_debit());
            assert!(!kind.is_credit());
        }
    }

    #[test]
    fn test_accrual_kinds() {
        assert!(EntryKind::Purchase.is_accrual());
        assert!(EntryKind::ReferralBonus.is_accrual());
        assert!(!EntryKind::ManualCredit.is_accrual());
        assert!(!EntryKind::Expiry.is_accrual());
        // Expiry still needs the uniqueness guard for sweep resumption
        assert!(EntryKind::Expiry.requires_unique_source_ref());
        assert!(!EntryKind::Redemption.requires_unique_source_ref());
    }

    #[test]
    fn test_kind_string_roundtrip() {
        for kind in [
            EntryKind::Purchase,
            EntryKind::ReferralBonus,
            EntryKind::ReviewBonus,
            EntryKind::BirthdayBonus,
            EntryKind::ManualCredit,
            EntryKind::ManualDebit,
            EntryKind::Redemption,
            EntryKind::Expiry,
        ] {
            assert_eq!(EntryKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(EntryKind::parse("bogus"), None);
    }

    #[test]
    fn test_kind_serde_matches_as_str() {
        let json = serde_json::to_string(&EntryKind::ReferralBonus).unwrap();
        assert_eq!(json, "\"referral_bonus\"");
    }
}
