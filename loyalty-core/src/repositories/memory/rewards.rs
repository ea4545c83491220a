// src/repositories/memory/rewards.rs

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::Error;
use crate::models::{Reward, RewardKind, RewardStatus};
use loyalty_common::traits::RewardRepository;

#[derive(Clone, Default)]
pub struct InMemoryRewardRepository {
    rewards: Arc<DashMap<String, Reward>>,
}

impl InMemoryRewardRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RewardRepository for InMemoryRewardRepository {
    async fn get_reward(&self, reward_id: &str) -> Result<Option<Reward>, Error> {
        Ok(self.rewards.get(reward_id).map(|r| r.clone()))
    }

    async fn upsert_reward(&self, reward: &Reward) -> Result<(), Error> {
        let mut next = reward.clone();
        next.updated_at = Utc::now();
        match self.rewards.entry(reward.reward_id.clone()) {
            Entry::Occupied(mut o) => {
                let stored = o.get_mut();
                next.kind = reward.kind.carry_stock_from(&stored.kind);
                next.version = stored.version + 1;
                *stored = next;
            }
            Entry::Vacant(v) => {
                v.insert(next);
            }
        }
        Ok(())
    }

    async fn set_stock_if_version(
        &self,
        reward_id: &str,
        stock_available: i64,
        expected_version: i64,
    ) -> Result<bool, Error> {
        let Some(mut reward) = self.rewards.get_mut(reward_id) else {
            return Err(Error::RewardNotFound(reward_id.to_string()));
        };
        if reward.version != expected_version {
            return Ok(false);
        }
        match &mut reward.kind {
            RewardKind::Coupon { stock_available: avail, .. } => *avail = stock_available,
            _ => {
                return Err(Error::NotApplicable(format!(
                    "reward '{}' does not track stock",
                    reward_id
                )));
            }
        }
        reward.version += 1;
        reward.updated_at = Utc::now();
        Ok(true)
    }

    async fn list_active_rewards(&self, now: DateTime<Utc>) -> Result<Vec<Reward>, Error> {
        let mut list: Vec<Reward> = self
            .rewards
            .iter()
            .filter(|r| r.status == RewardStatus::Active && r.valid_to > now)
            .map(|r| r.clone())
            .collect();
        list.sort_by(|a, b| b.valid_to.cmp(&a.valid_to));
        Ok(list)
    }
}
