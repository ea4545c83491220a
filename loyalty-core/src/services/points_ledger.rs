// File: loyalty-core/src/services/points_ledger.rs

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};
use uuid::Uuid;

use crate::Error;
use crate::config::BalanceRule;
use crate::models::{PointsAccount, PointsBalance, PointsEntry, PointsEntryKind};
use crate::txn::{run_optimistic, Attempt, RetryPolicy};
use loyalty_common::traits::PointsRepository;

/// Per-user points counters. Every mutator is one version-guarded write of the
/// user's aggregate plus its history entry.
pub struct PointsLedger {
    repo: Arc<dyn PointsRepository + Send + Sync>,
    retry: RetryPolicy,
    balance_rule: BalanceRule,
}

impl PointsLedger {
    pub fn new(
        repo: Arc<dyn PointsRepository + Send + Sync>,
        retry: RetryPolicy,
        balance_rule: BalanceRule,
    ) -> Self {
        Self { repo, retry, balance_rule }
    }

    /// Creates an account with an opening balance. Earning points is handled
    /// elsewhere; this is the seeding path.
    pub async fn open_account(&self, user_id: &str, opening_balance: i64) -> Result<PointsBalance, Error> {
        if opening_balance < 0 {
            return Err(Error::InvalidAmount(opening_balance));
        }
        let account = PointsAccount::new(user_id, opening_balance);
        self.repo.insert_account(&account).await?;
        info!("Opened points account for '{}' with {} points", user_id, opening_balance);
        Ok(account.snapshot())
    }

    pub async fn get_balance(&self, user_id: &str) -> Result<PointsBalance, Error> {
        self.repo
            .get_account(user_id)
            .await?
            .map(|a| a.snapshot())
            .ok_or_else(|| Error::UserNotFound(user_id.to_string()))
    }

    /// Locks `points` against an open redemption. `balance` is untouched.
    pub async fn reserve(&self, user_id: &str, points: i64, redemption_id: Uuid) -> Result<PointsBalance, Error> {
        let rule = self.balance_rule;
        self.mutate(user_id, points, redemption_id, PointsEntryKind::Reserve, move |acct| {
            let spendable = match rule {
                BalanceRule::Available => acct.balance - acct.reserved,
                BalanceRule::Raw => acct.balance,
            };
            if spendable < points {
                return Err(Error::InsufficientBalance {
                    required: points,
                    available: spendable.max(0),
                });
            }
            acct.reserved += points;
            Ok(())
        })
        .await
    }

    pub async fn commit(&self, user_id: &str, points: i64, redemption_id: Uuid) -> Result<PointsBalance, Error> {
        self.mutate(user_id, points, redemption_id, PointsEntryKind::Commit, move |acct| {
            if acct.balance < points {
                return Err(Error::InsufficientBalance {
                    required: points,
                    available: acct.balance,
                });
            }
            acct.balance -= points;
            acct.reserved = (acct.reserved - points).max(0);
            acct.redeemed += points;
            Ok(())
        })
        .await
    }

    pub async fn release(&self, user_id: &str, points: i64, redemption_id: Uuid) -> Result<PointsBalance, Error> {
        self.mutate(user_id, points, redemption_id, PointsEntryKind::Release, move |acct| {
            acct.reserved = (acct.reserved - points).max(0);
            Ok(())
        })
        .await
    }

    /// Reverses a committed redemption.
    pub async fn refund(&self, user_id: &str, points: i64, redemption_id: Uuid) -> Result<PointsBalance, Error> {
        self.mutate(user_id, points, redemption_id, PointsEntryKind::Refund, move |acct| {
            acct.balance += points;
            acct.redeemed = (acct.redeemed - points).max(0);
            Ok(())
        })
        .await
    }

    /// Newest-first ledger entries for a user.
    pub async fn history(&self, user_id: &str, limit: i64) -> Result<Vec<PointsEntry>, Error> {
        if self.repo.get_account(user_id).await?.is_none() {
            return Err(Error::UserNotFound(user_id.to_string()));
        }
        self.repo.list_entries(user_id, limit).await
    }

    async fn mutate<F>(
        &self,
        user_id: &str,
        points: i64,
        redemption_id: Uuid,
        kind: PointsEntryKind,
        apply: F,
    ) -> Result<PointsBalance, Error>
    where
        F: Fn(&mut PointsAccount) -> Result<(), Error> + Send + Sync,
    {
        if points <= 0 {
            return Err(Error::InvalidAmount(points));
        }

        let aggregate = format!("points:{}", user_id);
        let repo = &self.repo;
        let apply = &apply;

        let balance = run_optimistic(&self.retry, &aggregate, || async move {
            let mut account = repo
                .get_account(user_id)
                .await?
                .ok_or_else(|| Error::UserNotFound(user_id.to_string()))?;

            apply(&mut account)?;

            let entry = PointsEntry {
                entry_id: Uuid::new_v4(),
                user_id: user_id.to_string(),
                kind,
                points,
                redemption_id,
                balance_after: account.balance,
                reserved_after: account.reserved,
                recorded_at: Utc::now(),
            };

            if repo.update_if_version(&account, &entry).await? {
                Ok(Attempt::Committed(account.snapshot()))
            } else {
                Ok(Attempt::Conflict)
            }
        })
        .await?;

        debug!(
            "points {} of {} for '{}' (redemption {}) => balance={}, reserved={}",
            kind, points, user_id, redemption_id, balance.balance, balance.reserved
        );
        Ok(balance)
    }
}
