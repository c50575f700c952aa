//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! The database URL may be overridden at runtime by the environment
//! variable named in `storage.database_url_env`.

use anyhow::{bail, Context, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::fs;
use std::time::Duration;

use crate::catalog::CatalogLimits;
use crate::engine::validator::BettingRules;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub service: ServiceConfig,
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub betting: BettingConfig,
    pub catalog: CatalogConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub name: String,
    pub currency: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Which backing store holds the catalog and the ledger.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Sqlite,
    Memory,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub database_url: String,
    /// Env var that, when set, overrides `database_url`.
    #[serde(default)]
    pub database_url_env: Option<String>,
    pub max_connections: u32,
    pub store_timeout_ms: u64,
    /// Development fixture loaded into the store at startup.
    #[serde(default)]
    pub seed_file: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BettingConfig {
    pub min_stake: Decimal,
    pub max_stake: Decimal,
    pub max_selections_per_ticket: usize,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CatalogConfig {
    pub default_limit: usize,
    pub max_limit: usize,
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::from_toml(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    /// Parse and validate configuration from a TOML string.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject limits that would make every placement or listing fail.
    pub fn validate(&self) -> Result<()> {
        let b = &self.betting;
        if b.min_stake <= Decimal::ZERO {
            bail!("betting.min_stake must be positive (got {})", b.min_stake);
        }
        if b.min_stake > b.max_stake {
            bail!(
                "betting.min_stake ({}) exceeds betting.max_stake ({})",
                b.min_stake,
                b.max_stake
            );
        }
        if b.max_selections_per_ticket == 0 {
            bail!("betting.max_selections_per_ticket must be at least 1");
        }
        let c = &self.catalog;
        if c.max_limit == 0 || c.default_limit == 0 {
            bail!("catalog limits must be at least 1");
        }
        if c.default_limit > c.max_limit {
            bail!(
                "catalog.default_limit ({}) exceeds catalog.max_limit ({})",
                c.default_limit,
                c.max_limit
            );
        }
        if self.storage.store_timeout_ms == 0 {
            bail!("storage.store_timeout_ms must be positive");
        }
        Ok(())
    }

    /// The database URL, taking the env override into account.
    pub fn database_url(&self) -> String {
        self.storage
            .database_url_env
            .as_deref()
            .and_then(|env| std::env::var(env).ok())
            .unwrap_or_else(|| self.storage.database_url.clone())
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.storage.store_timeout_ms)
    }

    pub fn betting_rules(&self) -> BettingRules {
        BettingRules {
            min_stake: self.betting.min_stake,
            max_stake: self.betting.max_stake,
            max_selections: self.betting.max_selections_per_ticket,
        }
    }

    pub fn catalog_limits(&self) -> CatalogLimits {
        CatalogLimits {
            default_limit: self.catalog.default_limit,
            max_limit: self.catalog.max_limit,
        }
    }

    /// Resolve an environment variable name to its value.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }
}
