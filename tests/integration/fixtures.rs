//! Shared fixtures for integration tests.
//!
//! Builds a small NPFL catalog and wires the catalog reader and bet
//! service over either the in-memory or the SQLite store.

use chrono::{DateTime, Duration as ChronoDuration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use wagerbook::catalog::{CatalogLimits, CatalogReader};
use wagerbook::engine::placement::BetService;
use wagerbook::engine::validator::BettingRules;
use wagerbook::storage::memory::MemoryStore;
use wagerbook::storage::seed::SeedTarget;
use wagerbook::storage::sqlite::SqliteStore;
use wagerbook::storage::{CatalogStore, LedgerStore};
use wagerbook::types::{Match, MatchStatus, OddsTable, SelectionRequest, TicketRequest};

pub const STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// Everything a test needs: services plus direct store handles.
pub struct Harness {
    pub catalog: CatalogReader,
    pub bets: Arc<BetService>,
    pub ledger: Arc<dyn LedgerStore>,
    pub seeder: Arc<dyn SeedTarget>,
    pub now: DateTime<Utc>,
    // Last so the stores above are released first.
    scratch: Option<ScratchDir>,
}

/// Per-test directory for a file-backed database, removed on drop along
/// with the WAL and shared-memory files SQLite leaves beside it.
struct ScratchDir(PathBuf);

impl ScratchDir {
    fn new() -> Self {
        let dir = std::env::temp_dir().join(format!("wagerbook-it-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        Self(dir)
    }
}

impl Drop for ScratchDir {
    fn drop(&mut self) {
        let _ = std::fs::remove_dir_all(&self.0);
    }
}

impl Harness {
    fn wire(
        catalog: Arc<dyn CatalogStore>,
        ledger: Arc<dyn LedgerStore>,
        seeder: Arc<dyn SeedTarget>,
    ) -> Self {
        Self {
            catalog: CatalogReader::new(catalog.clone(), CatalogLimits::default(), STORE_TIMEOUT),
            bets: Arc::new(BetService::new(
                catalog,
                ledger.clone(),
                BettingRules::default(),
                STORE_TIMEOUT,
            )),
            ledger,
            seeder,
            now: Utc::now(),
            scratch: None,
        }
    }

    pub fn memory() -> Self {
        let store = MemoryStore::new();
        Self::wire(store.clone(), store.clone(), store)
    }

    /// A file-backed SQLite database so several pool connections can
    /// contend for the write lock.
    pub async fn sqlite() -> Self {
        let scratch = ScratchDir::new();
        let url = format!("sqlite://{}", scratch.0.join("ledger.db").display());
        let store = Arc::new(SqliteStore::connect(&url, 4).await.unwrap());
        Self {
            scratch: Some(scratch),
            ..Self::wire(store.clone(), store.clone(), store)
        }
    }

    pub fn scratch_dir(&self) -> Option<&std::path::Path> {
        self.scratch.as_ref().map(|d| d.0.as_path())
    }

    pub async fn with_catalog(self) -> Self {
        for m in catalog(self.now) {
            self.seeder.seed_match(m).await.unwrap();
        }
        self
    }

    pub async fn fund(&self, user_id: &str, balance: Decimal) {
        self.seeder.seed_balance(user_id, balance, self.now).await.unwrap();
    }

    pub async fn balance(&self, user_id: &str) -> Decimal {
        self.ledger
            .get_account(user_id)
            .await
            .unwrap()
            .map(|a| a.balance)
            .unwrap_or(Decimal::ZERO)
    }
}

fn fixture(
    id: &str,
    league: &str,
    home: &str,
    away: &str,
    kickoff: DateTime<Utc>,
    status: MatchStatus,
    prices: [Decimal; 3],
) -> Match {
    let mut odds = OddsTable::new();
    odds.insert(
        "1X2".into(),
        BTreeMap::from([
            ("home".to_string(), prices[0]),
            ("draw".to_string(), prices[1]),
            ("away".to_string(), prices[2]),
        ]),
    );
    Match {
        match_id: id.into(),
        sport: "football".into(),
        league: league.into(),
        home_team: home.into(),
        away_team: away.into(),
        kickoff,
        status,
        odds,
        home_score: None,
        away_score: None,
    }
}

/// Six matches covering every status, one already kicked off.
pub fn catalog(now: DateTime<Utc>) -> Vec<Match> {
    let h = ChronoDuration::hours;
    vec![
        fixture("NPFL-1", "NPFL", "Enyimba", "Rangers", now + h(2), MatchStatus::Upcoming, [dec!(1.8), dec!(3.1), dec!(4.0)]),
        fixture("NPFL-2", "NPFL", "Rivers United", "Remo Stars", now + h(3), MatchStatus::Open, [dec!(1.5), dec!(3.4), dec!(2.0)]),
        fixture("NPFL-3", "NPFL", "Kano Pillars", "Lobi Stars", now - ChronoDuration::minutes(5), MatchStatus::Upcoming, [dec!(2.2), dec!(3.0), dec!(3.1)]),
        fixture("EPL-1", "EPL", "Arsenal", "Chelsea", now + h(5), MatchStatus::Suspended, [dec!(2.1), dec!(3.3), dec!(3.4)]),
        fixture("EPL-2", "EPL", "Everton", "Fulham", now - h(20), MatchStatus::Finished, [dec!(2.5), dec!(3.2), dec!(2.9)]),
        fixture("EPL-3", "EPL", "Brighton", "Wolves", now + h(30), MatchStatus::Cancelled, [dec!(1.9), dec!(3.5), dec!(4.2)]),
    ]
}

pub fn leg(match_id: &str, selection: &str, odd: Option<Decimal>) -> SelectionRequest {
    SelectionRequest {
        match_id: match_id.into(),
        market: "1X2".into(),
        selection: selection.into(),
        odd,
    }
}

pub fn ticket(selections: Vec<SelectionRequest>, stake: Decimal) -> TicketRequest {
    TicketRequest { selections, stake }
}
