// src/repositories/mod.rs

pub use loyalty_common::traits::{
    PointsRepository, RedemptionAuditRepository, RedemptionRepository, RewardRepository,
};

pub use memory::{
    InMemoryAuditRepository, InMemoryPointsRepository, InMemoryRedemptionRepository,
    InMemoryRewardRepository,
};
pub use postgres::{
    PostgresAuditRepository, PostgresPointsRepository, PostgresRedemptionRepository,
    PostgresRewardRepository,
};

pub mod memory;
pub mod postgres;
