// File: loyalty-common/src/models/redemption.rs

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::reward::{DiscountTerms, Reward, RewardType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedemptionStatus {
    Reserved,
    Active,
    Redeemed,
    Cancelled,
    Expired,
}

impl RedemptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RedemptionStatus::Reserved => "reserved",
            RedemptionStatus::Active => "active",
            RedemptionStatus::Redeemed => "redeemed",
            RedemptionStatus::Cancelled => "cancelled",
            RedemptionStatus::Expired => "expired",
        }
    }

    /// RESERVED and ACTIVE still hold points (and stock, for coupons).
    pub fn is_open(&self) -> bool {
        matches!(self, RedemptionStatus::Reserved | RedemptionStatus::Active)
    }

    /// Statuses that count against a reward's per-user cap.
    pub const CAP_STATUSES: [RedemptionStatus; 3] = [
        RedemptionStatus::Reserved,
        RedemptionStatus::Active,
        RedemptionStatus::Redeemed,
    ];

    pub fn counts_toward_cap(&self) -> bool {
        Self::CAP_STATUSES.contains(self)
    }
}

impl fmt::Display for RedemptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RedemptionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reserved" => Ok(RedemptionStatus::Reserved),
            "active" => Ok(RedemptionStatus::Active),
            "redeemed" => Ok(RedemptionStatus::Redeemed),
            "cancelled" => Ok(RedemptionStatus::Cancelled),
            "expired" => Ok(RedemptionStatus::Expired),
            other => Err(format!("unknown redemption status '{}'", other)),
        }
    }
}

/// Reward terms frozen at reservation time. Later edits to the reward do not
/// reach in-flight redemptions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewardSnapshot {
    pub title: String,
    pub subtitle: Option<String>,
    pub brand_name: String,
    pub how_to_claim: Vec<String>,
    pub terms_and_conditions: Option<String>,
    pub terms: DiscountTerms,
}

impl RewardSnapshot {
    pub fn of(reward: &Reward) -> Self {
        Self {
            title: reward.title.clone(),
            subtitle: reward.subtitle.clone(),
            brand_name: reward.brand_name.clone(),
            how_to_claim: reward.how_to_claim.clone(),
            terms_and_conditions: reward.terms_and_conditions.clone(),
            terms: reward.kind.terms(),
        }
    }

    pub fn reward_type(&self) -> RewardType {
        self.terms.reward_type()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Redemption {
    pub redemption_id: Uuid,
    pub user_id: String,
    pub reward_id: String,
    pub snapshot: RewardSnapshot,
    pub points_deducted: i64,
    pub status: RedemptionStatus,
    /// When set, only this partner may act on the redemption.
    pub partner_binding: Option<String>,
    /// Partner that activated the redemption by scanning it.
    pub scanned_by: Option<String>,
    pub coupon_code: Option<String>,
    pub reserved_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub activated_at: Option<DateTime<Utc>>,
    pub redeemed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub expired_at: Option<DateTime<Utc>>,
    pub cancellation_reason: Option<String>,
    pub cancelled_by: Option<String>,
    pub partner_transaction_id: Option<String>,
    pub bill_amount: Option<i64>,
    pub applied_discount: Option<i64>,
    pub version: i64,
}

impl Redemption {
    pub fn reward_type(&self) -> RewardType {
        self.snapshot.reward_type()
    }

    pub fn is_past_expiry(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Who is asking for a cancellation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    User(String),
    Partner(String),
}

impl Actor {
    pub fn id(&self) -> &str {
        match self {
            Actor::User(id) | Actor::Partner(id) => id,
        }
    }
}

impl fmt::Display for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Actor::User(id) => write!(f, "user:{}", id),
            Actor::Partner(id) => write!(f, "partner:{}", id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Redeem,
    Cancel,
    Expire,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Redeem => "redeem",
            AuditAction::Cancel => "cancel",
            AuditAction::Expire => "expire",
        }
    }
}

impl FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "redeem" => Ok(AuditAction::Redeem),
            "cancel" => Ok(AuditAction::Cancel),
            "expire" => Ok(AuditAction::Expire),
            other => Err(format!("unknown audit action '{}'", other)),
        }
    }
}

/// Append-only record of a terminal transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RedemptionAuditEntry {
    pub audit_id: Uuid,
    pub redemption_id: Uuid,
    pub user_id: String,
    pub reward_id: String,
    pub partner_id: Option<String>,
    pub action: AuditAction,
    pub reward_type: RewardType,
    pub points: i64,
    pub bill_amount: Option<i64>,
    pub applied_discount: Option<i64>,
    pub reason: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl RedemptionAuditEntry {
    pub fn new(redemption: &Redemption, action: AuditAction, partner_id: Option<&str>) -> Self {
        Self {
            audit_id: Uuid::new_v4(),
            redemption_id: redemption.redemption_id,
            user_id: redemption.user_id.clone(),
            reward_id: redemption.reward_id.clone(),
            partner_id: partner_id.map(String::from),
            action,
            reward_type: redemption.reward_type(),
            points: redemption.points_deducted,
            bill_amount: redemption.bill_amount,
            applied_discount: redemption.applied_discount,
            reason: redemption.cancellation_reason.clone(),
            recorded_at: Utc::now(),
        }
    }
}
