// File: src/services/mod.rs

pub mod discount;
pub mod points_ledger;
pub mod redemption_service;
pub mod reward_catalog;

pub use discount::DiscountQuote;
pub use points_ledger::PointsLedger;
pub use redemption_service::{
    CancelReceipt, ConfirmReceipt, ConfirmRequest, PartnerHistory, PartnerStats, RedemptionService,
    ReserveReceipt, RewardDisplay, ScanSummary,
};
pub use reward_catalog::RewardCatalog;
