// src/repositories/memory/mod.rs
//
// In-process stores used by tests and single-node deployments.

pub mod points;
pub mod redemptions;
pub mod rewards;

pub use points::InMemoryPointsRepository;
pub use redemptions::{InMemoryAuditRepository, InMemoryRedemptionRepository};
pub use rewards::InMemoryRewardRepository;
