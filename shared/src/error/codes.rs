//! Unified error codes for the loyalty engine
//!
//! Error codes are shared between the server and the admin frontend.
//! They are organized by category:
//! - 0xxx: General errors
//! - 3xxx: Merchant/tenant errors
//! - 4xxx: Loyalty errors
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values for efficient serialization
/// and cross-language compatibility (Rust, TypeScript, etc.)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Unknown error
    Unknown = 1,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Resource already exists
    AlreadyExists = 4,
    /// Invalid request
    InvalidRequest = 5,
    /// Required field missing
    RequiredField = 6,

    // ==================== 3xxx: Merchant ====================
    /// Merchant not found
    MerchantNotFound = 3001,
    /// X-Merchant-Id header missing or malformed
    MerchantHeaderMissing = 3002,

    // ==================== 4xxx: Loyalty ====================
    /// Point amount is zero, negative, or not an integer
    InvalidAmount = 4001,
    /// Debit exceeds the customer's current projected balance
    InsufficientBalance = 4002,
    /// An accrual entry for the same (kind, source_ref) already exists
    DuplicateAccrual = 4003,
    /// Loyalty program is disabled for the merchant
    LoyaltyDisabled = 4004,
    /// The specific bonus kind is toggled off
    BonusDisabled = 4005,
    /// Customer has no ledger history
    CustomerNotFound = 4006,
    /// Loyalty tier not found
    TierNotFound = 4101,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
    /// Database error
    DatabaseError = 9002,
    /// Ledger storage transaction failed or timed out; retryable
    StoreUnavailable = 9003,
}

impl ErrorCode {
    /// Get the numeric value of this error code
    pub fn code(&self) -> u16 {
        *self as u16
    }

    /// Get the default human-readable message for this error code
    pub fn message(&self) -> &'static str {
        match self {
            Self::Success => "Success",
            Self::Unknown => "Unknown error",
            Self::ValidationFailed => "Validation failed",
            Self::NotFound => "Resource not found",
            Self::AlreadyExists => "Resource already exists",
            Self::InvalidRequest => "Invalid request",
            Self::RequiredField => "Required field missing",

            Self::MerchantNotFound => "Merchant not found",
            Self::MerchantHeaderMissing => "Merchant header missing",

            Self::InvalidAmount => "Point amount must be a positive integer",
            Self::InsufficientBalance => "Cannot deduct more points than available",
            Self::DuplicateAccrual => "Points for this event were already recorded",
            Self::LoyaltyDisabled => "Loyalty program is disabled",
            Self::BonusDisabled => "This bonus is disabled",
            Self::CustomerNotFound => "Customer not found",
            Self::TierNotFound => "Tier not found",

            Self::InternalError => "Internal server error",
            Self::DatabaseError => "Database error",
            Self::StoreUnavailable => "Ledger store temporarily unavailable",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

impl From<ErrorCode> for u16 {
    fn from(code: ErrorCode) -> u16 {
        code.code()
    }
}

/// Error returned when a u16 does not map to a known [`ErrorCode`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Success),
            1 => Ok(Self::Unknown),
            2 => Ok(Self::ValidationFailed),
            3 => Ok(Self::NotFound),
            4 => Ok(Self::AlreadyExists),
            5 => Ok(Self::InvalidRequest),
            6 => Ok(Self::RequiredField),
            3001 => Ok(Self::MerchantNotFound),
            3002 => Ok(Self::MerchantHeaderMissing),
            4001 => Ok(Self::InvalidAmount),
            4002 => Ok(Self::InsufficientBalance),
            4003 => Ok(Self::DuplicateAccrual),
            4004 => Ok(Self::LoyaltyDisabled),
            4005 => Ok(Self::BonusDisabled),
            4006 => Ok(Self::CustomerNotFound),
            4101 => Ok(Self::TierNotFound),
            9001 => Ok(Self::InternalError),
            9002 => Ok(Self::DatabaseError),
            9003 => Ok(Self::StoreUnavailable),
            other => Err(InvalidErrorCode(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_values() {
        assert_eq!(ErrorCode::Success.code(), 0);
        assert_eq!(ErrorCode::InvalidAmount.code(), 4001);
        assert_eq!(ErrorCode::InsufficientBalance.code(), 4002);
        assert_eq!(ErrorCode::DuplicateAccrual.code(), 4003);
        assert_eq!(ErrorCode::StoreUnavailable.code(), 9003);
    }

    #[test]
    fn test_roundtrip_u16() {
        for code in [
            ErrorCode::Success,
            ErrorCode::ValidationFailed,
            ErrorCode::MerchantNotFound,
            ErrorCode::InvalidAmount,
            ErrorCode::InsufficientBalance,
            ErrorCode::DuplicateAccrual,
            ErrorCode::LoyaltyDisabled,
            ErrorCode::CustomerNotFound,
            ErrorCode::InternalError,
        ] {
            let raw: u16 = code.into();
            assert_eq!(ErrorCode::try_from(raw).unwrap(), code);
        }
    }

    #[test]
    fn test_invalid_code_rejected() {
        assert_eq!(ErrorCode::try_from(1234), Err(InvalidErrorCode(1234)));
    }

    #[test]
    fn test_serde_as_number() {
        let json = serde_json::to_string(&ErrorCode::InsufficientBalance).unwrap();
        assert_eq!(json, "4002");
        let back: ErrorCode = serde_json::from_str("4002").unwrap();
        assert_eq!(back, ErrorCode::InsufficientBalance);
    }
}
