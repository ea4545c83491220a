// File: loyalty-core/src/services/reward_catalog.rs

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::Error;
use crate::models::{Reward, RewardKind, RewardStatus, RewardType};
use crate::services::discount;
use crate::txn::{run_optimistic, Attempt, RetryPolicy};
use loyalty_common::traits::RewardRepository;

pub struct RewardCatalog {
    repo: Arc<dyn RewardRepository + Send + Sync>,
    retry: RetryPolicy,
}

impl RewardCatalog {
    pub fn new(repo: Arc<dyn RewardRepository + Send + Sync>, retry: RetryPolicy) -> Self {
        Self { repo, retry }
    }

    pub async fn get_reward(&self, reward_id: &str) -> Result<Reward, Error> {
        self.repo
            .get_reward(reward_id)
            .await?
            .ok_or_else(|| Error::RewardNotFound(reward_id.to_string()))
    }

    /// Write path for catalog management and fixtures.
    pub async fn upsert(&self, reward: &Reward) -> Result<(), Error> {
        if reward.points_cost <= 0 {
            return Err(Error::InvalidAmount(reward.points_cost));
        }
        if let RewardKind::Coupon { stock_total, stock_available } = reward.kind {
            if stock_available < 0 || stock_available > stock_total {
                return Err(Error::InvalidReward(format!(
                    "reward '{}' has stock {}/{}",
                    reward.reward_id, stock_available, stock_total
                )));
            }
        }
        discount::validate_terms(&reward.kind.terms())?;
        self.repo.upsert_reward(reward).await
    }

    /// Checks run in a fixed order; the first failure wins.
    pub fn validate_eligibility(
        &self,
        reward: &Reward,
        user_id: &str,
        user_org_id: Option<&str>,
        prior_count: i64,
        now: DateTime<Utc>,
    ) -> Result<(), Error> {
        if reward.status != RewardStatus::Active {
            return Err(Error::RewardNotActive);
        }
        if now < reward.valid_from {
            return Err(Error::RewardNotYetAvailable);
        }
        if now >= reward.valid_to {
            return Err(Error::RewardExpired);
        }
        if !reward.is_visible_to(user_org_id) {
            debug!(
                "user '{}' (org {:?}) is outside audience of reward '{}'",
                user_id, user_org_id, reward.reward_id
            );
            return Err(Error::RewardOrgRestricted);
        }
        if prior_count >= reward.max_per_user {
            return Err(Error::MaxLimitReached { limit: reward.max_per_user });
        }
        Ok(())
    }

    /// Takes one coupon unit. Returns the remaining stock, or `None` for
    /// reward types without stock.
    pub async fn decrement_stock(&self, reward_id: &str) -> Result<Option<i64>, Error> {
        let aggregate = format!("stock:{}", reward_id);
        let repo = &self.repo;

        run_optimistic(&self.retry, &aggregate, || async move {
            let reward = repo
                .get_reward(reward_id)
                .await?
                .ok_or_else(|| Error::RewardNotFound(reward_id.to_string()))?;

            let RewardKind::Coupon { stock_available, .. } = reward.kind else {
                return Ok(Attempt::Committed(None));
            };
            if stock_available <= 0 {
                return Err(Error::OutOfStock(reward_id.to_string()));
            }

            let next = stock_available - 1;
            if repo.set_stock_if_version(reward_id, next, reward.version).await? {
                Ok(Attempt::Committed(Some(next)))
            } else {
                Ok(Attempt::Conflict)
            }
        })
        .await
    }

    /// Returns one coupon unit, never above `stock_total`.
    pub async fn increment_stock(&self, reward_id: &str) -> Result<Option<i64>, Error> {
        let aggregate = format!("stock:{}", reward_id);
        let repo = &self.repo;

        run_optimistic(&self.retry, &aggregate, || async move {
            let reward = repo
                .get_reward(reward_id)
                .await?
                .ok_or_else(|| Error::RewardNotFound(reward_id.to_string()))?;

            let RewardKind::Coupon { stock_total, stock_available } = reward.kind else {
                return Ok(Attempt::Committed(None));
            };
            if stock_available >= stock_total {
                warn!(
                    "stock for reward '{}' already at total {}; not incrementing",
                    reward_id, stock_total
                );
                return Ok(Attempt::Committed(Some(stock_available)));
            }

            let next = stock_available + 1;
            if repo.set_stock_if_version(reward_id, next, reward.version).await? {
                Ok(Attempt::Committed(Some(next)))
            } else {
                Ok(Attempt::Conflict)
            }
        })
        .await
    }

    /// Active rewards inside their window and visible to the caller's org.
    pub async fn list_available(
        &self,
        user_org_id: Option<&str>,
        type_filter: Option<RewardType>,
        limit: i64,
        offset: i64,
        now: DateTime<Utc>,
    ) -> Result<Vec<Reward>, Error> {
        let rewards = self.repo.list_active_rewards(now).await?;
        Ok(rewards
            .into_iter()
            .filter(|r| r.is_within_window(now))
            .filter(|r| r.is_visible_to(user_org_id))
            .filter(|r| type_filter.is_none_or(|t| r.reward_type() == t))
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .collect())
    }
}
