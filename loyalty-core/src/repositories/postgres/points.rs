// File: loyalty-core/src/repositories/postgres/points.rs

use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};

use crate::Error;
use crate::models::{PointsAccount, PointsEntry, PointsEntryKind};
use loyalty_common::traits::PointsRepository;

pub struct PostgresPointsRepository {
    pub pool: Pool<Postgres>,
}

impl PostgresPointsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

fn row_to_account(r: &PgRow) -> Result<PointsAccount, Error> {
    Ok(PointsAccount {
        user_id: r.try_get("user_id")?,
        balance: r.try_get("balance")?,
        reserved: r.try_get("reserved")?,
        redeemed: r.try_get("redeemed")?,
        version: r.try_get("version")?,
        updated_at: r.try_get("updated_at")?,
    })
}

fn row_to_entry(r: &PgRow) -> Result<PointsEntry, Error> {
    let kind: String = r.try_get("kind")?;
    Ok(PointsEntry {
        entry_id: r.try_get("entry_id")?,
        user_id: r.try_get("user_id")?,
        kind: kind.parse::<PointsEntryKind>().map_err(Error::Corrupt)?,
        points: r.try_get("points")?,
        redemption_id: r.try_get("redemption_id")?,
        balance_after: r.try_get("balance_after")?,
        reserved_after: r.try_get("reserved_after")?,
        recorded_at: r.try_get("recorded_at")?,
    })
}

#[async_trait]
impl PointsRepository for PostgresPointsRepository {
    async fn get_account(&self, user_id: &str) -> Result<Option<PointsAccount>, Error> {
        let row_opt = sqlx::query(
            r#"
            SELECT user_id, balance, reserved, redeemed, version, updated_at
            FROM points_accounts
            WHERE user_id = $1
            "#,
        )
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        row_opt.as_ref().map(row_to_account).transpose()
    }

    async fn insert_account(&self, account: &PointsAccount) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO points_accounts (
                user_id, balance, reserved, redeemed, version, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
            .bind(&account.user_id)
            .bind(account.balance)
            .bind(account.reserved)
            .bind(account.redeemed)
            .bind(account.version)
            .bind(account.updated_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn update_if_version(
        &self,
        account: &PointsAccount,
        entry: &PointsEntry,
    ) -> Result<bool, Error> {
        let mut tx = self.pool.begin().await?;

        let res = sqlx::query(
            r#"
            UPDATE points_accounts
            SET balance = $2,
                reserved = $3,
                redeemed = $4,
                version = version + 1,
                updated_at = now()
            WHERE user_id = $1
              AND version = $5
            "#,
        )
            .bind(&account.user_id)
            .bind(account.balance)
            .bind(account.reserved)
            .bind(account.redeemed)
            .bind(account.version)
            .execute(&mut *tx)
            .await?;

        if res.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            r#"
            INSERT INTO points_entries (
                entry_id, user_id, kind, points, redemption_id,
                balance_after, reserved_after, recorded_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
            .bind(entry.entry_id)
            .bind(&entry.user_id)
            .bind(entry.kind.as_str())
            .bind(entry.points)
            .bind(entry.redemption_id)
            .bind(entry.balance_after)
            .bind(entry.reserved_after)
            .bind(entry.recorded_at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn list_entries(&self, user_id: &str, limit: i64) -> Result<Vec<PointsEntry>, Error> {
        let rows = sqlx::query(
            r#"
            SELECT entry_id, user_id, kind, points, redemption_id,
                   balance_after, reserved_after, recorded_at
            FROM points_entries
            WHERE user_id = $1
            ORDER BY recorded_at DESC
            LIMIT $2
            "#,
        )
            .bind(user_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_entry).collect()
    }
}
