// File: loyalty-core/src/repositories/postgres/redemptions.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};
use uuid::Uuid;

use crate::Error;
use crate::models::{
    AuditAction, Redemption, RedemptionAuditEntry, RedemptionStatus, RewardSnapshot, RewardType,
};
use loyalty_common::traits::{RedemptionAuditRepository, RedemptionRepository};

pub struct PostgresRedemptionRepository {
    pub pool: Pool<Postgres>,
}

impl PostgresRedemptionRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

const REDEMPTION_COLUMNS: &str = r#"
    redemption_id, user_id, reward_id, snapshot, points_deducted, status,
    partner_binding, scanned_by, coupon_code, reserved_at, expires_at,
    activated_at, redeemed_at, cancelled_at, expired_at, cancellation_reason,
    cancelled_by, partner_transaction_id, bill_amount, applied_discount, version
"#;

fn row_to_redemption(r: &PgRow) -> Result<Redemption, Error> {
    let snapshot: serde_json::Value = r.try_get("snapshot")?;
    let status: String = r.try_get("status")?;
    Ok(Redemption {
        redemption_id: r.try_get("redemption_id")?,
        user_id: r.try_get("user_id")?,
        reward_id: r.try_get("reward_id")?,
        snapshot: serde_json::from_value::<RewardSnapshot>(snapshot)?,
        points_deducted: r.try_get("points_deducted")?,
        status: status.parse::<RedemptionStatus>().map_err(Error::Corrupt)?,
        partner_binding: r.try_get("partner_binding")?,
        scanned_by: r.try_get("scanned_by")?,
        coupon_code: r.try_get("coupon_code")?,
        reserved_at: r.try_get("reserved_at")?,
        expires_at: r.try_get("expires_at")?,
        activated_at: r.try_get("activated_at")?,
        redeemed_at: r.try_get("redeemed_at")?,
        cancelled_at: r.try_get("cancelled_at")?,
        expired_at: r.try_get("expired_at")?,
        cancellation_reason: r.try_get("cancellation_reason")?,
        cancelled_by: r.try_get("cancelled_by")?,
        partner_transaction_id: r.try_get("partner_transaction_id")?,
        bill_amount: r.try_get("bill_amount")?,
        applied_discount: r.try_get("applied_discount")?,
        version: r.try_get("version")?,
    })
}

#[async_trait]
impl RedemptionRepository for PostgresRedemptionRepository {
    async fn insert_redemption(
        &self,
        redemption: &Redemption,
        max_per_user: i64,
    ) -> Result<bool, Error> {
        let mut tx = self.pool.begin().await?;

        // Serializes concurrent reservations of one reward by one user.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(format!("{}:{}", redemption.user_id, redemption.reward_id))
            .execute(&mut *tx)
            .await?;

        let cap_statuses: Vec<String> = RedemptionStatus::CAP_STATUSES
            .iter()
            .map(|s| s.as_str().to_string())
            .collect();
        let held: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM redemptions
            WHERE user_id = $1
              AND reward_id = $2
              AND status = ANY($3)
            "#,
        )
            .bind(&redemption.user_id)
            .bind(&redemption.reward_id)
            .bind(&cap_statuses)
            .fetch_one(&mut *tx)
            .await?;

        if held >= max_per_user {
            tx.rollback().await?;
            return Ok(false);
        }

        sqlx::query(
            r#"
            INSERT INTO redemptions (
                redemption_id, user_id, reward_id, snapshot, points_deducted, status,
                partner_binding, scanned_by, coupon_code, reserved_at, expires_at,
                activated_at, redeemed_at, cancelled_at, expired_at, cancellation_reason,
                cancelled_by, partner_transaction_id, bill_amount, applied_discount, version
            )
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18,$19,$20,$21)
            "#,
        )
            .bind(redemption.redemption_id)
            .bind(&redemption.user_id)
            .bind(&redemption.reward_id)
            .bind(serde_json::to_value(&redemption.snapshot)?)
            .bind(redemption.points_deducted)
            .bind(redemption.status.as_str())
            .bind(&redemption.partner_binding)
            .bind(&redemption.scanned_by)
            .bind(&redemption.coupon_code)
            .bind(redemption.reserved_at)
            .bind(redemption.expires_at)
            .bind(redemption.activated_at)
            .bind(redemption.redeemed_at)
            .bind(redemption.cancelled_at)
            .bind(redemption.expired_at)
            .bind(&redemption.cancellation_reason)
            .bind(&redemption.cancelled_by)
            .bind(&redemption.partner_transaction_id)
            .bind(redemption.bill_amount)
            .bind(redemption.applied_discount)
            .bind(redemption.version)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn get_redemption(&self, redemption_id: Uuid) -> Result<Option<Redemption>, Error> {
        let sql = format!(
            "SELECT {} FROM redemptions WHERE redemption_id = $1",
            REDEMPTION_COLUMNS
        );
        let row_opt = sqlx::query(&sql)
            .bind(redemption_id)
            .fetch_optional(&self.pool)
            .await?;

        row_opt.as_ref().map(row_to_redemption).transpose()
    }

    async fn update_if_version(&self, redemption: &Redemption) -> Result<bool, Error> {
        // Snapshot, points, and reservation time are immutable once inserted.
        let res = sqlx::query(
            r#"
            UPDATE redemptions
            SET status = $2,
                partner_binding = $3,
                scanned_by = $4,
                coupon_code = $5,
                expires_at = $6,
                activated_at = $7,
                redeemed_at = $8,
                cancelled_at = $9,
                expired_at = $10,
                cancellation_reason = $11,
                cancelled_by = $12,
                partner_transaction_id = $13,
                bill_amount = $14,
                applied_discount = $15,
                version = version + 1
            WHERE redemption_id = $1
              AND version = $16
            "#,
        )
            .bind(redemption.redemption_id)
            .bind(redemption.status.as_str())
            .bind(&redemption.partner_binding)
            .bind(&redemption.scanned_by)
            .bind(&redemption.coupon_code)
            .bind(redemption.expires_at)
            .bind(redemption.activated_at)
            .bind(redemption.redeemed_at)
            .bind(redemption.cancelled_at)
            .bind(redemption.expired_at)
            .bind(&redemption.cancellation_reason)
            .bind(&redemption.cancelled_by)
            .bind(&redemption.partner_transaction_id)
            .bind(redemption.bill_amount)
            .bind(redemption.applied_discount)
            .bind(redemption.version)
            .execute(&self.pool)
            .await?;

        if res.rows_affected() == 1 {
            return Ok(true);
        }

        // Distinguish a stale version from a missing row.
        let exists: Option<i64> = sqlx::query_scalar(
            "SELECT version FROM redemptions WHERE redemption_id = $1",
        )
            .bind(redemption.redemption_id)
            .fetch_optional(&self.pool)
            .await?;
        match exists {
            Some(_) => Ok(false),
            None => Err(Error::RedemptionNotFound(redemption.redemption_id.to_string())),
        }
    }

    async fn count_for_user_reward(
        &self,
        user_id: &str,
        reward_id: &str,
        statuses: &[RedemptionStatus],
    ) -> Result<i64, Error> {
        let statuses: Vec<String> = statuses.iter().map(|s| s.as_str().to_string()).collect();
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM redemptions
            WHERE user_id = $1
              AND reward_id = $2
              AND status = ANY($3)
            "#,
        )
            .bind(user_id)
            .bind(reward_id)
            .bind(&statuses)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn list_for_user(
        &self,
        user_id: &str,
        status: Option<RedemptionStatus>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Redemption>, Error> {
        let sql = format!(
            r#"
            SELECT {}
            FROM redemptions
            WHERE user_id = $1
              AND ($2::TEXT IS NULL OR status = $2)
            ORDER BY reserved_at DESC
            LIMIT $3 OFFSET $4
            "#,
            REDEMPTION_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(user_id)
            .bind(status.map(|s| s.as_str()))
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_redemption).collect()
    }

    async fn list_redeemed_by_partner(
        &self,
        partner_id: &str,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Redemption>, Error> {
        let sql = format!(
            r#"
            SELECT {}
            FROM redemptions
            WHERE scanned_by = $1
              AND status = 'redeemed'
              AND ($2::TIMESTAMPTZ IS NULL OR redeemed_at >= $2)
              AND ($3::TIMESTAMPTZ IS NULL OR redeemed_at <= $3)
            ORDER BY redeemed_at DESC
            LIMIT $4 OFFSET $5
            "#,
            REDEMPTION_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(partner_id)
            .bind(since)
            .bind(until)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_redemption).collect()
    }

    async fn list_overdue(&self, now: DateTime<Utc>, limit: i64) -> Result<Vec<Redemption>, Error> {
        let sql = format!(
            r#"
            SELECT {}
            FROM redemptions
            WHERE status IN ('reserved', 'active')
              AND expires_at <= $1
            ORDER BY expires_at ASC
            LIMIT $2
            "#,
            REDEMPTION_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(now)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_redemption).collect()
    }
}

pub struct PostgresAuditRepository {
    pub pool: Pool<Postgres>,
}

impl PostgresAuditRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RedemptionAuditRepository for PostgresAuditRepository {
    async fn insert_entry(&self, entry: &RedemptionAuditEntry) -> Result<(), Error> {
        sqlx::query(
            r#"
            INSERT INTO redemption_audit (
                audit_id, redemption_id, user_id, reward_id, partner_id, action,
                reward_type, points, bill_amount, applied_discount, reason, recorded_at
            )
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12)
            "#,
        )
            .bind(entry.audit_id)
            .bind(entry.redemption_id)
            .bind(&entry.user_id)
            .bind(&entry.reward_id)
            .bind(&entry.partner_id)
            .bind(entry.action.as_str())
            .bind(entry.reward_type.as_str())
            .bind(entry.points)
            .bind(entry.bill_amount)
            .bind(entry.applied_discount)
            .bind(&entry.reason)
            .bind(entry.recorded_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list_for_redemption(&self, redemption_id: Uuid) -> Result<Vec<RedemptionAuditEntry>, Error> {
        let rows = sqlx::query(
            r#"
            SELECT audit_id, redemption_id, user_id, reward_id, partner_id, action,
                   reward_type, points, bill_amount, applied_discount, reason, recorded_at
            FROM redemption_audit
            WHERE redemption_id = $1
            ORDER BY recorded_at ASC
            "#,
        )
            .bind(redemption_id)
            .fetch_all(&self.pool)
            .await?;

        let mut out = Vec::with_capacity(rows.len());
        for r in rows {
            let action: String = r.try_get("action")?;
            let reward_type: String = r.try_get("reward_type")?;
            out.push(RedemptionAuditEntry {
                audit_id: r.try_get("audit_id")?,
                redemption_id: r.try_get("redemption_id")?,
                user_id: r.try_get("user_id")?,
                reward_id: r.try_get("reward_id")?,
                partner_id: r.try_get("partner_id")?,
                action: action.parse::<AuditAction>().map_err(Error::Corrupt)?,
                reward_type: reward_type.parse::<RewardType>().map_err(Error::Corrupt)?,
                points: r.try_get("points")?,
                bill_amount: r.try_get("bill_amount")?,
                applied_discount: r.try_get("applied_discount")?,
                reason: r.try_get("reason")?,
                recorded_at: r.try_get("recorded_at")?,
            });
        }
        Ok(out)
    }
}
