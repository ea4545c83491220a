// loyalty-server/src/seed.rs
//
// Startup fixtures for local runs against the in-memory store.

use std::path::Path;

use anyhow::Context;
use serde::Deserialize;
use tracing::{info, warn};

use loyalty_common::models::Reward;

use crate::context::AppContext;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedFile {
    #[serde(default)]
    pub rewards: Vec<Reward>,
    #[serde(default)]
    pub accounts: Vec<SeedAccount>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedAccount {
    pub user_id: String,
    pub balance: i64,
}

/// Upserts every reward and opens every account. An account that already
/// exists is skipped with a warning.
pub async fn load_seed_file(ctx: &AppContext, path: &Path) -> anyhow::Result<()> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading seed file {}", path.display()))?;
    let seed: SeedFile = serde_json::from_str(&raw)
        .with_context(|| format!("parsing seed file {}", path.display()))?;
    apply(ctx, &seed).await
}

pub async fn apply(ctx: &AppContext, seed: &SeedFile) -> anyhow::Result<()> {
    let catalog = ctx.service.catalog();
    for reward in &seed.rewards {
        catalog
            .upsert(reward)
            .await
            .with_context(|| format!("seeding reward '{}'", reward.reward_id))?;
    }

    let ledger = ctx.service.ledger();
    for account in &seed.accounts {
        if let Err(e) = ledger.open_account(&account.user_id, account.balance).await {
            warn!("Skipping seed account '{}': {}", account.user_id, e);
        }
    }

    info!(
        "Seeded {} reward(s) and {} account(s)",
        seed.rewards.len(),
        seed.accounts.len()
    );
    Ok(())
}
