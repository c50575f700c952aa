//! WAGERBOOK — wagering ledger and bet-placement engine
//!
//! Entry point. Loads configuration, initialises structured logging,
//! opens the configured store (optionally seeding it), and serves the
//! HTTP interface until Ctrl+C.

use anyhow::{Context, Result};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;

use wagerbook::api::{self, routes::ServiceState};
use wagerbook::catalog::CatalogReader;
use wagerbook::config::{AppConfig, StorageBackend};
use wagerbook::engine::placement::BetService;
use wagerbook::storage::memory::MemoryStore;
use wagerbook::storage::seed::{load_seed, SeedTarget};
use wagerbook::storage::sqlite::SqliteStore;
use wagerbook::storage::{CatalogStore, LedgerStore};

const BANNER: &str = r#"
__        ___    ____ _____ ____  ____   ___   ___  _  __
\ \      / / \  / ___| ____|  _ \| __ ) / _ \ / _ \| |/ /
 \ \ /\ / / _ \| |  _|  _| | |_) |  _ \| | | | | | | ' /
  \ V  V / ___ \ |_| | |___|  _ <| |_) | |_| | |_| | . \
   \_/\_/_/   \_\____|_____|_| \_\____/ \___/ \___/|_|\_\

  Wagering ledger and bet-placement engine
  v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let config_path = std::env::var("WAGERBOOK_CONFIG").unwrap_or_else(|_| "config.toml".into());
    let cfg = AppConfig::load(&config_path)?;

    init_logging();

    println!("{BANNER}");
    info!(
        service = %cfg.service.name,
        currency = %cfg.service.currency,
        backend = ?cfg.storage.backend,
        min_stake = %cfg.betting.min_stake,
        max_stake = %cfg.betting.max_stake,
        "WAGERBOOK starting up"
    );

    // -- Open the store --------------------------------------------------

    let (catalog, ledger, seeder) = open_store(&cfg).await?;

    if let Some(path) = &cfg.storage.seed_file {
        load_seed(path, seeder.as_ref())
            .await
            .with_context(|| format!("Failed to load seed file {path}"))?;
    }

    // -- Wire the services -----------------------------------------------

    let timeout = cfg.store_timeout();
    let state = Arc::new(ServiceState {
        catalog: CatalogReader::new(catalog.clone(), cfg.catalog_limits(), timeout),
        bets: BetService::new(catalog, ledger, cfg.betting_rules(), timeout),
    });

    let addr: SocketAddr = format!("{}:{}", cfg.server.host, cfg.server.port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", cfg.server.host, cfg.server.port))?;

    api::serve(state, addr, async {
        let _ = tokio::signal::ctrl_c().await;
        info!("Shutdown signal received.");
    })
    .await?;

    info!("WAGERBOOK shut down cleanly.");
    Ok(())
}

type Stores = (Arc<dyn CatalogStore>, Arc<dyn LedgerStore>, Arc<dyn SeedTarget>);

async fn open_store(cfg: &AppConfig) -> Result<Stores> {
    match cfg.storage.backend {
        StorageBackend::Sqlite => {
            let url = cfg.database_url();
            let store = Arc::new(
                SqliteStore::connect(&url, cfg.storage.max_connections)
                    .await
                    .context("Failed to open SQLite store")?,
            );
            store.health_check().await.context("SQLite health check failed")?;
            info!(max_connections = cfg.storage.max_connections, "Using SQLite backend");
            let stores: Stores = (store.clone(), store.clone(), store);
            Ok(stores)
        }
        StorageBackend::Memory => {
            let store = MemoryStore::new();
            info!("Using in-memory backend (state is lost on exit)");
            let stores: Stores = (store.clone(), store.clone(), store);
            Ok(stores)
        }
    }
}

/// Initialise the tracing subscriber with env-filter support.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("wagerbook=info,tower_http=info"));

    let json_logging = std::env::var("WAGERBOOK_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
