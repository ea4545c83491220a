// src/repositories/memory/points.rs

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;

use crate::Error;
use crate::models::{PointsAccount, PointsEntry};
use loyalty_common::traits::PointsRepository;

struct AccountRow {
    account: PointsAccount,
    entries: Vec<PointsEntry>,
}

/// Points aggregates held in a sharded map. The shard lock taken by
/// `get_mut` makes each version check + write atomic.
#[derive(Clone, Default)]
pub struct InMemoryPointsRepository {
    rows: Arc<DashMap<String, AccountRow>>,
}

impl InMemoryPointsRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PointsRepository for InMemoryPointsRepository {
    async fn get_account(&self, user_id: &str) -> Result<Option<PointsAccount>, Error> {
        Ok(self.rows.get(user_id).map(|r| r.account.clone()))
    }

    async fn insert_account(&self, account: &PointsAccount) -> Result<(), Error> {
        match self.rows.entry(account.user_id.clone()) {
            Entry::Occupied(_) => Err(Error::Config(format!(
                "points account for '{}' already exists",
                account.user_id
            ))),
            Entry::Vacant(v) => {
                v.insert(AccountRow { account: account.clone(), entries: Vec::new() });
                Ok(())
            }
        }
    }

    async fn update_if_version(
        &self,
        account: &PointsAccount,
        entry: &PointsEntry,
    ) -> Result<bool, Error> {
        let Some(mut row) = self.rows.get_mut(&account.user_id) else {
            return Err(Error::UserNotFound(account.user_id.clone()));
        };
        if row.account.version != account.version {
            return Ok(false);
        }
        let mut next = account.clone();
        next.version = account.version + 1;
        next.updated_at = Utc::now();
        row.account = next;
        row.entries.push(entry.clone());
        Ok(true)
    }

    async fn list_entries(&self, user_id: &str, limit: i64) -> Result<Vec<PointsEntry>, Error> {
        let Some(row) = self.rows.get(user_id) else {
            return Ok(Vec::new());
        };
        Ok(row
            .entries
            .iter()
            .rev()
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}
