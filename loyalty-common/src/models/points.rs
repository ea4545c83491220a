// File: loyalty-common/src/models/points.rs

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One user's points aggregate.
///
/// `reserved` is a lock against open redemptions and does not reduce `balance`;
/// only a commit moves points out of `balance`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PointsAccount {
    pub user_id: String,
    pub balance: i64,
    pub reserved: i64,
    pub redeemed: i64,
    /// Bumped by the store on every successful write.
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

impl PointsAccount {
    pub fn new(user_id: &str, opening_balance: i64) -> Self {
        Self {
            user_id: user_id.to_string(),
            balance: opening_balance,
            reserved: 0,
            redeemed: 0,
            version: 0,
            updated_at: Utc::now(),
        }
    }

    /// Points not yet locked by an open reservation.
    pub fn available(&self) -> i64 {
        (self.balance - self.reserved).max(0)
    }

    pub fn snapshot(&self) -> PointsBalance {
        PointsBalance {
            balance: self.balance,
            reserved: self.reserved,
            redeemed: self.redeemed,
            available: self.available(),
        }
    }
}

/// Read-only view returned by `GetBalance`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointsBalance {
    pub balance: i64,
    pub reserved: i64,
    pub redeemed: i64,
    pub available: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointsEntryKind {
    Reserve,
    Release,
    Commit,
    Refund,
}

impl PointsEntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PointsEntryKind::Reserve => "reserve",
            PointsEntryKind::Release => "release",
            PointsEntryKind::Commit => "commit",
            PointsEntryKind::Refund => "refund",
        }
    }
}

impl fmt::Display for PointsEntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PointsEntryKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reserve" => Ok(PointsEntryKind::Reserve),
            "release" => Ok(PointsEntryKind::Release),
            "commit" => Ok(PointsEntryKind::Commit),
            "refund" => Ok(PointsEntryKind::Refund),
            other => Err(format!("unknown points entry kind '{}'", other)),
        }
    }
}

/// Immutable history row written in the same atomic write as the account change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointsEntry {
    pub entry_id: Uuid,
    pub user_id: String,
    pub kind: PointsEntryKind,
    pub points: i64,
    pub redemption_id: Uuid,
    pub balance_after: i64,
    pub reserved_after: i64,
    pub recorded_at: DateTime<Utc>,
}
