// File: loyalty-core/src/repositories/postgres/rewards.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::{Pool, Postgres, Row};

use crate::Error;
use crate::models::{Reward, RewardKind, RewardStatus, RewardType};
use loyalty_common::traits::RewardRepository;

pub struct PostgresRewardRepository {
    pub pool: Pool<Postgres>,
}

impl PostgresRewardRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

const REWARD_COLUMNS: &str = r#"
    reward_id, title, subtitle, brand_name, reward_type, points_cost,
    max_per_user, valid_from, valid_to, status, audience_org_id, partner_id,
    stock_total, stock_available, discount_percent, discount_amount,
    max_discount_amount, min_purchase_amount, how_to_claim,
    terms_and_conditions, version, updated_at
"#;

/// The nullable per-type columns a `RewardKind` flattens into.
#[derive(Default)]
struct KindColumns {
    stock_total: Option<i64>,
    stock_available: Option<i64>,
    discount_percent: Option<i64>,
    discount_amount: Option<i64>,
    max_discount_amount: Option<i64>,
    min_purchase_amount: Option<i64>,
}

impl From<&RewardKind> for KindColumns {
    fn from(kind: &RewardKind) -> Self {
        match *kind {
            RewardKind::Coupon { stock_total, stock_available } => KindColumns {
                stock_total: Some(stock_total),
                stock_available: Some(stock_available),
                ..Default::default()
            },
            RewardKind::PercentOff {
                discount_percent,
                max_discount_amount,
                min_purchase_amount,
            } => KindColumns {
                discount_percent: Some(discount_percent),
                max_discount_amount,
                min_purchase_amount,
                ..Default::default()
            },
            RewardKind::AmountOff { discount_amount, min_purchase_amount } => KindColumns {
                discount_amount: Some(discount_amount),
                min_purchase_amount,
                ..Default::default()
            },
        }
    }
}

fn required(value: Option<i64>, column: &str, reward_id: &str) -> Result<i64, Error> {
    value.ok_or_else(|| Error::Corrupt(format!("reward '{}' is missing {}", reward_id, column)))
}

fn row_to_reward(r: &PgRow) -> Result<Reward, Error> {
    let reward_id: String = r.try_get("reward_id")?;
    let reward_type: String = r.try_get("reward_type")?;
    let status: String = r.try_get("status")?;
    let min_purchase_amount: Option<i64> = r.try_get("min_purchase_amount")?;

    let kind = match reward_type.parse::<RewardType>().map_err(Error::Corrupt)? {
        RewardType::Coupon => RewardKind::Coupon {
            stock_total: required(r.try_get("stock_total")?, "stock_total", &reward_id)?,
            stock_available: required(r.try_get("stock_available")?, "stock_available", &reward_id)?,
        },
        RewardType::PercentOff => RewardKind::PercentOff {
            discount_percent: required(r.try_get("discount_percent")?, "discount_percent", &reward_id)?,
            max_discount_amount: r.try_get("max_discount_amount")?,
            min_purchase_amount,
        },
        RewardType::AmountOff => RewardKind::AmountOff {
            discount_amount: required(r.try_get("discount_amount")?, "discount_amount", &reward_id)?,
            min_purchase_amount,
        },
    };

    let how_to_claim: serde_json::Value = r.try_get("how_to_claim")?;

    Ok(Reward {
        reward_id,
        title: r.try_get("title")?,
        subtitle: r.try_get("subtitle")?,
        brand_name: r.try_get("brand_name")?,
        kind,
        points_cost: r.try_get("points_cost")?,
        max_per_user: r.try_get("max_per_user")?,
        valid_from: r.try_get("valid_from")?,
        valid_to: r.try_get("valid_to")?,
        status: status.parse::<RewardStatus>().map_err(Error::Corrupt)?,
        audience_org_id: r.try_get("audience_org_id")?,
        partner_id: r.try_get("partner_id")?,
        how_to_claim: serde_json::from_value(how_to_claim)?,
        terms_and_conditions: r.try_get("terms_and_conditions")?,
        version: r.try_get("version")?,
        updated_at: r.try_get("updated_at")?,
    })
}

#[async_trait]
impl RewardRepository for PostgresRewardRepository {
    async fn get_reward(&self, reward_id: &str) -> Result<Option<Reward>, Error> {
        let sql = format!("SELECT {} FROM rewards WHERE reward_id = $1", REWARD_COLUMNS);
        let row_opt = sqlx::query(&sql)
            .bind(reward_id)
            .fetch_optional(&self.pool)
            .await?;

        row_opt.as_ref().map(row_to_reward).transpose()
    }

    async fn upsert_reward(&self, reward: &Reward) -> Result<(), Error> {
        let cols = KindColumns::from(&reward.kind);
        sqlx::query(
            r#"
            INSERT INTO rewards (
                reward_id, title, subtitle, brand_name, reward_type, points_cost,
                max_per_user, valid_from, valid_to, status, audience_org_id, partner_id,
                stock_total, stock_available, discount_percent, discount_amount,
                max_discount_amount, min_purchase_amount, how_to_claim,
                terms_and_conditions, version, updated_at
            )
            VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16,$17,$18,$19,$20,0,now())
            ON CONFLICT (reward_id) DO UPDATE SET
                title = EXCLUDED.title,
                subtitle = EXCLUDED.subtitle,
                brand_name = EXCLUDED.brand_name,
                reward_type = EXCLUDED.reward_type,
                points_cost = EXCLUDED.points_cost,
                max_per_user = EXCLUDED.max_per_user,
                valid_from = EXCLUDED.valid_from,
                valid_to = EXCLUDED.valid_to,
                status = EXCLUDED.status,
                audience_org_id = EXCLUDED.audience_org_id,
                partner_id = EXCLUDED.partner_id,
                stock_total = EXCLUDED.stock_total,
                -- live stock survives edits; only the change in total moves it
                stock_available = CASE
                    WHEN rewards.reward_type = 'coupon' AND EXCLUDED.reward_type = 'coupon'
                    THEN GREATEST(0, LEAST(
                        EXCLUDED.stock_total,
                        rewards.stock_available + EXCLUDED.stock_total - rewards.stock_total
                    ))
                    ELSE EXCLUDED.stock_available
                END,
                discount_percent = EXCLUDED.discount_percent,
                discount_amount = EXCLUDED.discount_amount,
                max_discount_amount = EXCLUDED.max_discount_amount,
                min_purchase_amount = EXCLUDED.min_purchase_amount,
                how_to_claim = EXCLUDED.how_to_claim,
                terms_and_conditions = EXCLUDED.terms_and_conditions,
                version = rewards.version + 1,
                updated_at = now()
            "#,
        )
            .bind(&reward.reward_id)
            .bind(&reward.title)
            .bind(&reward.subtitle)
            .bind(&reward.brand_name)
            .bind(reward.reward_type().as_str())
            .bind(reward.points_cost)
            .bind(reward.max_per_user)
            .bind(reward.valid_from)
            .bind(reward.valid_to)
            .bind(reward.status.as_str())
            .bind(&reward.audience_org_id)
            .bind(&reward.partner_id)
            .bind(cols.stock_total)
            .bind(cols.stock_available)
            .bind(cols.discount_percent)
            .bind(cols.discount_amount)
            .bind(cols.max_discount_amount)
            .bind(cols.min_purchase_amount)
            .bind(serde_json::to_value(&reward.how_to_claim)?)
            .bind(&reward.terms_and_conditions)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn set_stock_if_version(
        &self,
        reward_id: &str,
        stock_available: i64,
        expected_version: i64,
    ) -> Result<bool, Error> {
        let res = sqlx::query(
            r#"
            UPDATE rewards
            SET stock_available = $2,
                version = version + 1,
                updated_at = now()
            WHERE reward_id = $1
              AND version = $3
              AND reward_type = 'coupon'
            "#,
        )
            .bind(reward_id)
            .bind(stock_available)
            .bind(expected_version)
            .execute(&self.pool)
            .await?;

        Ok(res.rows_affected() == 1)
    }

    async fn list_active_rewards(&self, now: DateTime<Utc>) -> Result<Vec<Reward>, Error> {
        let sql = format!(
            "SELECT {} FROM rewards WHERE status = 'active' AND valid_to > $1 ORDER BY valid_to DESC",
            REWARD_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(now)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(row_to_reward).collect()
    }
}
