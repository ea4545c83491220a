//! loyalty-server/src/context.rs
//!
//! Builds the shared service graph from the command-line config.

use std::sync::Arc;

use anyhow::Context;
use chrono::Duration;
use tracing::{info, warn};

use loyalty_common::traits::{
    PointsRepository, RedemptionAuditRepository, RedemptionRepository, RewardRepository,
};
use loyalty_core::config::{BalanceRule, RedemptionConfig};
use loyalty_core::crypto::TokenCodec;
use loyalty_core::repositories::{
    InMemoryAuditRepository, InMemoryPointsRepository, InMemoryRedemptionRepository,
    InMemoryRewardRepository, PostgresAuditRepository, PostgresPointsRepository,
    PostgresRedemptionRepository, PostgresRewardRepository,
};
use loyalty_core::services::{PointsLedger, RedemptionService, RewardCatalog};
use loyalty_core::Database;

use crate::Args;

/// Handed to every request handler through axum state.
#[derive(Clone)]
pub struct AppContext {
    pub service: Arc<RedemptionService>,
}

struct Stores {
    points: Arc<dyn PointsRepository + Send + Sync>,
    rewards: Arc<dyn RewardRepository + Send + Sync>,
    redemptions: Arc<dyn RedemptionRepository + Send + Sync>,
    audit: Arc<dyn RedemptionAuditRepository + Send + Sync>,
}

impl AppContext {
    pub async fn new(args: &Args) -> anyhow::Result<Self> {
        let config = redemption_config(args);
        let tokens = token_codec(args, config.max_token_ttl)?;
        let stores = open_stores(args).await?;

        let ledger = Arc::new(PointsLedger::new(stores.points, config.retry, config.balance_rule));
        let catalog = Arc::new(RewardCatalog::new(stores.rewards, config.retry));
        let service = RedemptionService::new(
            ledger,
            catalog,
            stores.redemptions,
            stores.audit,
            tokens,
            config,
        );

        Ok(Self::from_service(Arc::new(service)))
    }

    pub fn from_service(service: Arc<RedemptionService>) -> Self {
        Self { service }
    }
}

fn redemption_config(args: &Args) -> RedemptionConfig {
    RedemptionConfig {
        max_token_ttl: args.max_token_ttl_secs.map(Duration::seconds),
        balance_rule: if args.raw_balance {
            BalanceRule::Raw
        } else {
            BalanceRule::Available
        },
        ..RedemptionConfig::default()
    }
}

fn token_codec(args: &Args, max_ttl: Option<Duration>) -> anyhow::Result<TokenCodec> {
    match &args.token_secret {
        Some(secret) => TokenCodec::new(secret.as_bytes(), max_ttl)
            .context("invalid LOYALTY_TOKEN_SECRET"),
        None => {
            warn!("No token secret configured; using the development secret. Do not run this in production.");
            Ok(TokenCodec::new_dev().with_max_ttl(max_ttl))
        }
    }
}

async fn open_stores(args: &Args) -> anyhow::Result<Stores> {
    match &args.database_url {
        Some(url) => {
            let db = Database::new(url, args.db_max_connections)
                .await
                .context("connecting to Postgres")?;
            db.migrate().await.context("applying migrations")?;
            let pool = db.pool().clone();
            Ok(Stores {
                points: Arc::new(PostgresPointsRepository::new(pool.clone())),
                rewards: Arc::new(PostgresRewardRepository::new(pool.clone())),
                redemptions: Arc::new(PostgresRedemptionRepository::new(pool.clone())),
                audit: Arc::new(PostgresAuditRepository::new(pool)),
            })
        }
        None => {
            info!("No DATABASE_URL set; using the in-memory store.");
            Ok(Stores {
                points: Arc::new(InMemoryPointsRepository::new()),
                rewards: Arc::new(InMemoryRewardRepository::new()),
                redemptions: Arc::new(InMemoryRedemptionRepository::new()),
                audit: Arc::new(InMemoryAuditRepository::new()),
            })
        }
    }
}
