// src/repositories/postgres/mod.rs

pub mod points;
pub mod redemptions;
pub mod rewards;

pub use points::PostgresPointsRepository;
pub use redemptions::{PostgresAuditRepository, PostgresRedemptionRepository};
pub use rewards::PostgresRewardRepository;
