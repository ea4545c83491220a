// src/repositories/memory/redemptions.rs

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use uuid::Uuid;

use crate::Error;
use crate::models::{Redemption, RedemptionAuditEntry, RedemptionStatus};
use loyalty_common::traits::{RedemptionAuditRepository, RedemptionRepository};

#[derive(Clone, Default)]
pub struct InMemoryRedemptionRepository {
    redemptions: Arc<DashMap<Uuid, Redemption>>,
    /// (user, reward) -> redemption ids. Its entry lock serializes cap checks;
    /// always taken before any `redemptions` lock.
    by_owner: Arc<DashMap<(String, String), Vec<Uuid>>>,
}

impl InMemoryRedemptionRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn page(mut list: Vec<Redemption>, limit: i64, offset: i64) -> Vec<Redemption> {
        list.sort_by(|a, b| b.reserved_at.cmp(&a.reserved_at));
        list.into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect()
    }
}

#[async_trait]
impl RedemptionRepository for InMemoryRedemptionRepository {
    async fn insert_redemption(
        &self,
        redemption: &Redemption,
        max_per_user: i64,
    ) -> Result<bool, Error> {
        let key = (redemption.user_id.clone(), redemption.reward_id.clone());
        let mut held = self.by_owner.entry(key).or_default();

        let counted = held
            .iter()
            .filter(|id| {
                self.redemptions
                    .get(*id)
                    .is_some_and(|r| r.status.counts_toward_cap())
            })
            .count() as i64;
        if counted >= max_per_user {
            return Ok(false);
        }

        match self.redemptions.entry(redemption.redemption_id) {
            Entry::Occupied(_) => {
                return Err(Error::Config(format!(
                    "redemption {} already exists",
                    redemption.redemption_id
                )));
            }
            Entry::Vacant(v) => {
                v.insert(redemption.clone());
            }
        }
        held.push(redemption.redemption_id);
        Ok(true)
    }

    async fn get_redemption(&self, redemption_id: Uuid) -> Result<Option<Redemption>, Error> {
        Ok(self.redemptions.get(&redemption_id).map(|r| r.clone()))
    }

    async fn update_if_version(&self, redemption: &Redemption) -> Result<bool, Error> {
        let Some(mut stored) = self.redemptions.get_mut(&redemption.redemption_id) else {
            return Err(Error::RedemptionNotFound(redemption.redemption_id.to_string()));
        };
        if stored.version != redemption.version {
            return Ok(false);
        }
        let mut next = redemption.clone();
        next.version = redemption.version + 1;
        *stored = next;
        Ok(true)
    }

    async fn count_for_user_reward(
        &self,
        user_id: &str,
        reward_id: &str,
        statuses: &[RedemptionStatus],
    ) -> Result<i64, Error> {
        let n = self
            .redemptions
            .iter()
            .filter(|r| r.user_id == user_id && r.reward_id == reward_id && statuses.contains(&r.status))
            .count();
        Ok(n as i64)
    }

    async fn list_for_user(
        &self,
        user_id: &str,
        status: Option<RedemptionStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Redemption>, Error> {
        let list = self
            .redemptions
            .iter()
            .filter(|r| r.user_id == user_id && status.is_none_or(|s| r.status == s))
            .map(|r| r.clone())
            .collect();
        Ok(Self::page(list, limit, offset))
    }

    async fn list_redeemed_by_partner(
        &self,
        partner_id: &str,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Redemption>, Error> {
        let mut list: Vec<Redemption> = self
            .redemptions
            .iter()
            .filter(|r| {
                r.status == RedemptionStatus::Redeemed
                    && r.scanned_by.as_deref() == Some(partner_id)
                    && r.redeemed_at.is_some_and(|at| {
                        since.is_none_or(|s| at >= s) && until.is_none_or(|u| at <= u)
                    })
            })
            .map(|r| r.clone())
            .collect();
        list.sort_by(|a, b| b.redeemed_at.cmp(&a.redeemed_at));
        Ok(list
            .into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }

    async fn list_overdue(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<Redemption>, Error> {
        let mut list: Vec<Redemption> = self
            .redemptions
            .iter()
            .filter(|r| r.status.is_open() && r.expires_at <= now)
            .map(|r| r.clone())
            .collect();
        list.sort_by(|a, b| a.expires_at.cmp(&b.expires_at));
        list.truncate(limit.max(0) as usize);
        Ok(list)
    }
}

#[derive(Clone, Default)]
pub struct InMemoryAuditRepository {
    entries: Arc<DashMap<Uuid, Vec<RedemptionAuditEntry>>>,
}

impl InMemoryAuditRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RedemptionAuditRepository for InMemoryAuditRepository {
    async fn insert_entry(&self, entry: &RedemptionAuditEntry) -> Result<(), Error> {
        self.entries
            .entry(entry.redemption_id)
            .or_default()
            .push(entry.clone());
        Ok(())
    }

    async fn list_for_redemption(&self, redemption_id: Uuid) -> Result<Vec<RedemptionAuditEntry>, Error> {
        Ok(self
            .entries
            .get(&redemption_id)
            .map(|e| e.clone())
            .unwrap_or_default())
    }
}
