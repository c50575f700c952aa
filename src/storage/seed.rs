//! Development fixture loader.
//!
//! Reads a JSON file of matches and account balances and writes it
//! through the pricing/funding side of a store. Used to bring up a local
//! instance with something to bet on; production catalogs are written by
//! the external pricing system.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::info;

use super::StoreError;
use crate::types::Match;

/// Writer methods a store exposes for seeding.
#[async_trait]
pub trait SeedTarget: Send + Sync {
    async fn seed_match(&self, m: Match) -> Result<(), StoreError>;

    async fn seed_balance(
        &self,
        user_id: &str,
        balance: Decimal,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError>;
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedAccount {
    pub user_id: String,
    pub balance: Decimal,
}

#[derive(Debug, Default, Deserialize)]
pub struct SeedFile {
    #[serde(default)]
    pub matches: Vec<Match>,
    #[serde(default)]
    pub accounts: Vec<SeedAccount>,
}

impl SeedFile {
    pub fn parse(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse seed file")
    }
}

/// Load a seed file from disk into `target`. Returns (matches, accounts).
pub async fn load_seed(path: &str, target: &dyn SeedTarget) -> Result<(usize, usize)> {
    let json = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read seed file {path}"))?;
    let seed = SeedFile::parse(&json)?;
    apply_seed(seed, target).await
}

pub async fn apply_seed(seed: SeedFile, target: &dyn SeedTarget) -> Result<(usize, usize)> {
    let now = Utc::now();
    let match_count = seed.matches.len();
    let account_count = seed.accounts.len();

    for m in seed.matches {
        let id = m.match_id.clone();
        target
            .seed_match(m)
            .await
            .with_context(|| format!("Failed to seed match {id}"))?;
    }
    for account in seed.accounts {
        target
            .seed_balance(&account.user_id, account.balance, now)
            .await
            .with_context(|| format!("Failed to seed account {}", account.user_id))?;
    }

    info!(matches = match_count, accounts = account_count, "Seed data loaded");
    Ok((match_count, account_count))
}
