pub mod repository_traits;

pub use repository_traits::{
    PointsRepository, RedemptionAuditRepository, RedemptionRepository, RewardRepository,
};
