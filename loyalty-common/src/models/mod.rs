// File: loyalty-common/src/models/mod.rs
pub mod points;
pub mod reward;
pub mod redemption;

pub use points::{PointsAccount, PointsBalance, PointsEntry, PointsEntryKind};
pub use reward::{DiscountTerms, Reward, RewardKind, RewardStatus, RewardType};
pub use redemption::{
    Actor, AuditAction, Redemption, RedemptionAuditEntry, RedemptionStatus, RewardSnapshot,
};
