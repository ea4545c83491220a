// File: loyalty-common/src/models/reward.rs

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardType {
    Coupon,
    PercentOff,
    AmountOff,
}

impl RewardType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RewardType::Coupon => "coupon",
            RewardType::PercentOff => "percent_off",
            RewardType::AmountOff => "amount_off",
        }
    }
}

impl fmt::Display for RewardType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RewardType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "coupon" => Ok(RewardType::Coupon),
            "percent_off" => Ok(RewardType::PercentOff),
            "amount_off" => Ok(RewardType::AmountOff),
            other => Err(format!("unknown reward type '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardStatus {
    Active,
    Inactive,
}

impl RewardStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RewardStatus::Active => "active",
            RewardStatus::Inactive => "inactive",
        }
    }
}

impl FromStr for RewardStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(RewardStatus::Active),
            "inactive" => Ok(RewardStatus::Inactive),
            other => Err(format!("unknown reward status '{}'", other)),
        }
    }
}

/// Type-specific payload of a reward. Only the coupon variant carries stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RewardKind {
    Coupon {
        stock_total: i64,
        stock_available: i64,
    },
    PercentOff {
        discount_percent: i64,
        max_discount_amount: Option<i64>,
        min_purchase_amount: Option<i64>,
    },
    AmountOff {
        discount_amount: i64,
        min_purchase_amount: Option<i64>,
    },
}

impl RewardKind {
    pub fn reward_type(&self) -> RewardType {
        match self {
            RewardKind::Coupon { .. } => RewardType::Coupon,
            RewardKind::PercentOff { .. } => RewardType::PercentOff,
            RewardKind::AmountOff { .. } => RewardType::AmountOff,
        }
    }

    /// This definition applied over a stored one. A coupon keeps its live
    /// `stock_available`, moved by the change in `stock_total`.
    pub fn carry_stock_from(&self, stored: &RewardKind) -> RewardKind {
        match (self, stored) {
            (
                RewardKind::Coupon { stock_total, .. },
                RewardKind::Coupon {
                    stock_total: old_total,
                    stock_available: old_available,
                },
            ) => RewardKind::Coupon {
                stock_total: *stock_total,
                stock_available: (old_available + stock_total - old_total)
                    .clamp(0, (*stock_total).max(0)),
            },
            _ => self.clone(),
        }
    }

    /// Discount terms with the mutable stock counters stripped.
    pub fn terms(&self) -> DiscountTerms {
        match *self {
            RewardKind::Coupon { .. } => DiscountTerms::Coupon,
            RewardKind::PercentOff {
                discount_percent,
                max_discount_amount,
                min_purchase_amount,
            } => DiscountTerms::PercentOff {
                discount_percent,
                max_discount_amount,
                min_purchase_amount,
            },
            RewardKind::AmountOff {
                discount_amount,
                min_purchase_amount,
            } => DiscountTerms::AmountOff {
                discount_amount,
                min_purchase_amount,
            },
        }
    }
}

/// The discount parameters frozen into a redemption at reservation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DiscountTerms {
    Coupon,
    PercentOff {
        discount_percent: i64,
        max_discount_amount: Option<i64>,
        min_purchase_amount: Option<i64>,
    },
    AmountOff {
        discount_amount: i64,
        min_purchase_amount: Option<i64>,
    },
}

impl DiscountTerms {
    pub fn reward_type(&self) -> RewardType {
        match self {
            DiscountTerms::Coupon => RewardType::Coupon,
            DiscountTerms::PercentOff { .. } => RewardType::PercentOff,
            DiscountTerms::AmountOff { .. } => RewardType::AmountOff,
        }
    }
}

/// A catalog entry. Created and edited by the management side; the redemption
/// core only reads it and moves `stock_available`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reward {
    pub reward_id: String,
    pub title: String,
    pub subtitle: Option<String>,
    pub brand_name: String,
    pub kind: RewardKind,
    pub points_cost: i64,
    pub max_per_user: i64,
    pub valid_from: DateTime<Utc>,
    pub valid_to: DateTime<Utc>,
    pub status: RewardStatus,
    /// `None` means visible to everyone.
    pub audience_org_id: Option<String>,
    /// Copied into a redemption's partner binding.
    pub partner_id: Option<String>,
    pub how_to_claim: Vec<String>,
    pub terms_and_conditions: Option<String>,
    pub version: i64,
    pub updated_at: DateTime<Utc>,
}

impl Reward {
    pub fn reward_type(&self) -> RewardType {
        self.kind.reward_type()
    }

    /// Half-open validity window check: `valid_from <= now < valid_to`.
    pub fn is_within_window(&self, now: DateTime<Utc>) -> bool {
        now >= self.valid_from && now < self.valid_to
    }

    pub fn is_visible_to(&self, org_id: Option<&str>) -> bool {
        match self.audience_org_id.as_deref() {
            None => true,
            Some(aud) => org_id == Some(aud),
        }
    }

    pub fn stock_available(&self) -> Option<i64> {
        match self.kind {
            RewardKind::Coupon { stock_available, .. } => Some(stock_available),
            _ => None,
        }
    }
}
