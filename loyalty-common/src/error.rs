// ================================================================
// File: loyalty-common/src/error.rs
// ================================================================

use thiserror::Error;

use crate::models::redemption::RedemptionStatus;

/// Coarse grouping of errors, used by the HTTP layer to pick a status code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorFamily {
    Authorization,
    Validation,
    Eligibility,
    Inventory,
    Balance,
    State,
    NotFound,
    System,
}

#[derive(Debug, Error)]
pub enum Error {
    // Authorization
    #[error("Invalid redemption token")]
    InvalidToken,

    #[error("Redemption token has expired")]
    ExpiredToken,

    #[error("Partner mismatch: {0}")]
    PartnerMismatch(String),

    // Validation
    #[error("Required field is missing: {0}")]
    MissingField(&'static str),

    #[error("Minimum purchase amount is {minimum}, bill was {bill_amount}")]
    BelowMinimumPurchase { minimum: i64, bill_amount: i64 },

    #[error("Not applicable: {0}")]
    NotApplicable(String),

    #[error("Applied discount {submitted} does not match computed discount {expected}")]
    DiscountMismatch { expected: i64, submitted: i64 },

    #[error("Invalid points amount: {0}")]
    InvalidAmount(i64),

    #[error("Amount out of range: {0}")]
    AmountOutOfRange(i64),

    #[error("Invalid reward definition: {0}")]
    InvalidReward(String),

    // Eligibility
    #[error("Reward is not active")]
    RewardNotActive,

    #[error("Reward is not yet available")]
    RewardNotYetAvailable,

    #[error("Reward has expired")]
    RewardExpired,

    #[error("This reward is only available to specific organization members")]
    RewardOrgRestricted,

    // Inventory
    #[error("Reward is out of stock: {0}")]
    OutOfStock(String),

    #[error("Maximum redemption limit reached ({limit}) for this reward")]
    MaxLimitReached { limit: i64 },

    // Balance
    #[error("Insufficient points balance: need {required}, have {available}")]
    InsufficientBalance { required: i64, available: i64 },

    // State
    #[error("Invalid redemption status: expected {expected}, found {actual}")]
    InvalidState {
        expected: &'static str,
        actual: RedemptionStatus,
    },

    #[error("Redemption already used")]
    AlreadyUsed,

    #[error("Redemption has been cancelled")]
    Cancelled,

    #[error("Redemption has expired")]
    Expired,

    // Not found
    #[error("Redemption not found: {0}")]
    RedemptionNotFound(String),

    #[error("Reward not found: {0}")]
    RewardNotFound(String),

    #[error("User points record not found: {0}")]
    UserNotFound(String),

    // System
    #[error("Transaction failed after repeated write conflicts on {0}")]
    TransactionConflict(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Token signing error: {0}")]
    Signing(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

impl Error {
    /// Stable, client-facing error code.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidToken => "RDM-010",
            Error::ExpiredToken => "RDM-011",
            Error::PartnerMismatch(_) => "PTR-001",

            Error::MissingField(_) => "VAL-002",
            Error::BelowMinimumPurchase { .. } => "VAL-009",
            Error::NotApplicable(_) => "VAL-010",
            Error::DiscountMismatch { .. } => "VAL-011",
            Error::InvalidAmount(_) => "PTS-004",
            Error::AmountOutOfRange(_) => "VAL-003",
            Error::InvalidReward(_) => "RWD-008",

            Error::RewardNotActive => "RWD-003",
            Error::RewardNotYetAvailable => "RWD-004",
            Error::RewardExpired => "RWD-002",
            Error::RewardOrgRestricted => "RWD-007",

            Error::OutOfStock(_) => "RWD-005",
            Error::MaxLimitReached { .. } => "RWD-006",

            Error::InsufficientBalance { .. } => "PTS-001",

            Error::InvalidState { .. } => "RDM-005",
            Error::AlreadyUsed => "RDM-003",
            Error::Cancelled => "RDM-004",
            Error::Expired => "RDM-002",

            Error::RedemptionNotFound(_) => "RDM-001",
            Error::RewardNotFound(_) => "RWD-001",
            Error::UserNotFound(_) => "USR-001",

            Error::TransactionConflict(_) => "SYS-008",
            Error::Database(_) | Error::Migration(_) => "SYS-002",
            Error::Config(_) => "SYS-006",
            Error::Json(_) | Error::Io(_) | Error::Signing(_) | Error::Corrupt(_) => "SYS-001",
        }
    }

    pub fn family(&self) -> ErrorFamily {
        match self {
            Error::InvalidToken | Error::ExpiredToken | Error::PartnerMismatch(_) => {
                ErrorFamily::Authorization
            }
            Error::MissingField(_)
            | Error::BelowMinimumPurchase { .. }
            | Error::NotApplicable(_)
            | Error::DiscountMismatch { .. }
            | Error::InvalidAmount(_)
            | Error::AmountOutOfRange(_)
            | Error::InvalidReward(_) => ErrorFamily::Validation,
            Error::RewardNotActive
            | Error::RewardNotYetAvailable
            | Error::RewardExpired
            | Error::RewardOrgRestricted => ErrorFamily::Eligibility,
            Error::OutOfStock(_) | Error::MaxLimitReached { .. } => ErrorFamily::Inventory,
            Error::InsufficientBalance { .. } => ErrorFamily::Balance,
            Error::InvalidState { .. } | Error::AlreadyUsed | Error::Cancelled | Error::Expired => {
                ErrorFamily::State
            }
            Error::RedemptionNotFound(_) | Error::RewardNotFound(_) | Error::UserNotFound(_) => {
                ErrorFamily::NotFound
            }
            Error::TransactionConflict(_)
            | Error::Database(_)
            | Error::Migration(_)
            | Error::Json(_)
            | Error::Io(_)
            | Error::Config(_)
            | Error::Signing(_)
            | Error::Corrupt(_) => ErrorFamily::System,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_grouped_by_family() {
        assert_eq!(Error::InvalidToken.code(), "RDM-010");
        assert_eq!(Error::InvalidToken.family(), ErrorFamily::Authorization);

        let e = Error::InsufficientBalance { required: 500, available: 100 };
        assert_eq!(e.code(), "PTS-001");
        assert_eq!(e.family(), ErrorFamily::Balance);

        let e = Error::InvalidState {
            expected: "active",
            actual: RedemptionStatus::Redeemed,
        };
        assert_eq!(e.family(), ErrorFamily::State);
        assert_eq!(e.to_string(), "Invalid redemption status: expected active, found redeemed");

        assert_eq!(Error::OutOfStock("r1".into()).family(), ErrorFamily::Inventory);
        assert_eq!(Error::TransactionConflict("points".into()).code(), "SYS-008");
    }
}
