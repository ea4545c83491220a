use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Error;
use crate::models::{
    PointsAccount, PointsEntry, Redemption, RedemptionAuditEntry, RedemptionStatus, Reward,
};

/// Per-user points aggregates.
///
/// Writes are optimistic: `update_if_version` only applies when the stored
/// version still equals `account.version`, and bumps it on success. A `false`
/// return means another writer got there first.
#[async_trait]
pub trait PointsRepository: Send + Sync {
    async fn get_account(&self, user_id: &str) -> Result<Option<PointsAccount>, Error>;

    async fn insert_account(&self, account: &PointsAccount) -> Result<(), Error>;

    /// Writes the account and appends `entry` in one atomic step.
    async fn update_if_version(
        &self,
        account: &PointsAccount,
        entry: &PointsEntry,
    ) -> Result<bool, Error>;

    async fn list_entries(&self, user_id: &str, limit: i64) -> Result<Vec<PointsEntry>, Error>;
}

#[async_trait]
pub trait RewardRepository: Send + Sync {
    async fn get_reward(&self, reward_id: &str) -> Result<Option<Reward>, Error>;

    /// Inserts or replaces a reward definition (management side / fixtures).
    /// Replacing a coupon keeps its live `stock_available`, shifted by any
    /// change to `stock_total` and clamped to `0..=stock_total`.
    async fn upsert_reward(&self, reward: &Reward) -> Result<(), Error>;

    /// Sets `stock_available` if the stored version equals `expected_version`.
    async fn set_stock_if_version(
        &self,
        reward_id: &str,
        stock_available: i64,
        expected_version: i64,
    ) -> Result<bool, Error>;

    async fn list_active_rewards(&self, now: DateTime<Utc>) -> Result<Vec<Reward>, Error>;
}

#[async_trait]
pub trait RedemptionRepository: Send + Sync {
    /// Inserts `redemption` unless its user already holds `max_per_user`
    /// redemptions of the same reward in a cap-counting status. The count and
    /// the insert are one atomic step; `false` means the cap was full.
    async fn insert_redemption(
        &self,
        redemption: &Redemption,
        max_per_user: i64,
    ) -> Result<bool, Error>;

    async fn get_redemption(&self, redemption_id: Uuid) -> Result<Option<Redemption>, Error>;

    /// Version-guarded write; every state transition goes through here.
    async fn update_if_version(&self, redemption: &Redemption) -> Result<bool, Error>;

    async fn count_for_user_reward(
        &self,
        user_id: &str,
        reward_id: &str,
        statuses: &[RedemptionStatus],
    ) -> Result<i64, Error>;

    async fn list_for_user(
        &self,
        user_id: &str,
        status: Option<RedemptionStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Redemption>, Error>;

    async fn list_redeemed_by_partner(
        &self,
        partner_id: &str,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Redemption>, Error>;

    /// RESERVED or ACTIVE redemptions whose `expires_at <= now`.
    async fn list_overdue(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<Redemption>, Error>;
}

#[async_trait]
pub trait RedemptionAuditRepository: Send + Sync {
    async fn insert_entry(&self, entry: &RedemptionAuditEntry) -> Result<(), Error>;
    async fn list_for_redemption(&self, redemption_id: Uuid) -> Result<Vec<RedemptionAuditEntry>, Error>;
}
