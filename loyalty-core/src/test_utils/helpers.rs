// File: loyalty-core/src/test_utils/helpers.rs

use std::sync::Arc;

use chrono::{Duration, Utc};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Connection, PgConnection, Pool, Postgres};

use crate::Error;
use crate::config::RedemptionConfig;
use crate::crypto::TokenCodec;
use crate::db::Database;
use crate::models::{Reward, RewardKind, RewardStatus};
use crate::repositories::{
    InMemoryAuditRepository, InMemoryPointsRepository, InMemoryRedemptionRepository,
    InMemoryRewardRepository,
};
use crate::services::{PointsLedger, RedemptionService, RewardCatalog};
use loyalty_common::traits::{
    PointsRepository, RedemptionAuditRepository, RedemptionRepository, RewardRepository,
};

/// A fully wired service over in-memory stores, with handles to each store.
pub struct TestEngine {
    pub service: Arc<RedemptionService>,
    pub points: Arc<InMemoryPointsRepository>,
    pub rewards: Arc<InMemoryRewardRepository>,
    pub redemptions: Arc<InMemoryRedemptionRepository>,
    pub audit: Arc<InMemoryAuditRepository>,
}

impl TestEngine {
    pub fn ledger(&self) -> &Arc<PointsLedger> {
        self.service.ledger()
    }

    pub fn catalog(&self) -> &Arc<RewardCatalog> {
        self.service.catalog()
    }

    /// Current coupon stock, or `None` for rewards without stock.
    pub async fn stock_of(&self, reward_id: &str) -> Result<Option<i64>, Error> {
        Ok(self.catalog().get_reward(reward_id).await?.stock_available())
    }
}

/// Wires the four services over arbitrary repositories.
pub fn build_service(
    points: Arc<dyn PointsRepository + Send + Sync>,
    rewards: Arc<dyn RewardRepository + Send + Sync>,
    redemptions: Arc<dyn RedemptionRepository + Send + Sync>,
    audit: Arc<dyn RedemptionAuditRepository + Send + Sync>,
    config: RedemptionConfig,
) -> RedemptionService {
    let ledger = Arc::new(PointsLedger::new(points, config.retry, config.balance_rule));
    let catalog = Arc::new(RewardCatalog::new(rewards, config.retry));
    let tokens = TokenCodec::new_dev().with_max_ttl(config.max_token_ttl);
    RedemptionService::new(ledger, catalog, redemptions, audit, tokens, config)
}

pub fn in_memory_engine(config: RedemptionConfig) -> TestEngine {
    let points = Arc::new(InMemoryPointsRepository::new());
    let rewards = Arc::new(InMemoryRewardRepository::new());
    let redemptions = Arc::new(InMemoryRedemptionRepository::new());
    let audit = Arc::new(InMemoryAuditRepository::new());

    let service = build_service(
        points.clone(),
        rewards.clone(),
        redemptions.clone(),
        audit.clone(),
        config,
    );

    TestEngine {
        service: Arc::new(service),
        points,
        rewards,
        redemptions,
        audit,
    }
}

fn base_reward(reward_id: &str, points_cost: i64, kind: RewardKind) -> Reward {
    let now = Utc::now();
    Reward {
        reward_id: reward_id.to_string(),
        title: format!("Reward {}", reward_id),
        subtitle: None,
        brand_name: "Brewhouse".to_string(),
        kind,
        points_cost,
        max_per_user: 5,
        valid_from: now - Duration::days(1),
        valid_to: now + Duration::days(30),
        status: RewardStatus::Active,
        audience_org_id: None,
        partner_id: None,
        how_to_claim: vec!["Show the code at the counter".to_string()],
        terms_and_conditions: None,
        version: 0,
        updated_at: now,
    }
}

pub fn coupon_reward(reward_id: &str, points_cost: i64, stock: i64) -> Reward {
    base_reward(
        reward_id,
        points_cost,
        RewardKind::Coupon {
            stock_total: stock,
            stock_available: stock,
        },
    )
}

pub fn percent_off_reward(
    reward_id: &str,
    points_cost: i64,
    discount_percent: i64,
    max_discount_amount: Option<i64>,
    min_purchase_amount: Option<i64>,
) -> Reward {
    base_reward(
        reward_id,
        points_cost,
        RewardKind::PercentOff {
            discount_percent,
            max_discount_amount,
            min_purchase_amount,
        },
    )
}

pub fn amount_off_reward(
    reward_id: &str,
    points_cost: i64,
    discount_amount: i64,
    min_purchase_amount: Option<i64>,
) -> Reward {
    base_reward(
        reward_id,
        points_cost,
        RewardKind::AmountOff {
            discount_amount,
            min_purchase_amount,
        },
    )
}

/// Create the test database if it does not exist yet.
pub async fn ensure_test_database_exists() -> Result<(), Error> {
    let admin_url = std::env::var("DATABASE_ADMIN_URL")
        .unwrap_or_else(|_| "postgres://loyalty@localhost/postgres".to_string());
    let mut conn = PgConnection::connect(&admin_url).await?;

    let test_db = "loyalty_test";
    let create_db_sql = format!("CREATE DATABASE {test_db};");
    if let Err(e) = sqlx::query(&create_db_sql).execute(&mut conn).await {
        // 42P04 => duplicate_database
        let duplicate = e
            .as_database_error()
            .and_then(|db_err| db_err.code())
            .is_some_and(|code| code == "42P04");
        if !duplicate {
            return Err(Error::Database(e));
        }
    }
    Ok(())
}

/// Pool for `TEST_DATABASE_URL`, else `postgres://loyalty@localhost/loyalty_test`.
pub async fn create_test_db_pool() -> Result<Pool<Postgres>, Error> {
    let url = std::env::var("TEST_DATABASE_URL")
        .unwrap_or_else(|_| "postgres://loyalty@localhost/loyalty_test".to_string());

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await?;

    Ok(pool)
}

/// Wipes out test data so each test can start fresh.
pub async fn clean_database(pool: &Pool<Postgres>) -> Result<(), Error> {
    sqlx::query(
        r#"
        TRUNCATE TABLE
            redemption_audit,
            redemptions,
            points_entries,
            points_accounts,
            rewards
        CASCADE;
    "#,
    )
        .execute(pool)
        .await?;

    Ok(())
}

/// Returns a migrated, empty test DB handle.
pub async fn setup_test_database() -> Result<Database, Error> {
    ensure_test_database_exists().await?;

    let pool = create_test_db_pool().await?;
    let db = Database::from_pool(pool);
    db.migrate().await?;
    clean_database(db.pool()).await?;

    Ok(db)
}
