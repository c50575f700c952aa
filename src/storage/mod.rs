//! Persistence layer.
//!
//! Defines the `CatalogStore` and `LedgerStore` traits the engine talks to,
//! and provides an in-memory implementation (tests, local development) and
//! a SQLite implementation built on `sqlx`.
//!
//! The ledger contract hinges on `LedgerStore::commit_bet`: a balance
//! debit and a bet insert applied together only if both conditions hold,
//! with no partial effect otherwise.

pub mod memory;
pub mod seed;
pub mod sqlite;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;

use crate::types::{Account, Bet, Match, MatchStatus};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// A precondition of the conditional atomic commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    /// Account exists and its balance covers the stake.
    SufficientBalance,
    /// No bet is stored under the new bet id.
    UniqueBetId,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The commit was rejected as a whole; lists every failed condition.
    #[error("Conditional commit rejected: {0:?}")]
    ConditionFailed(Vec<Condition>),

    #[error("Store call timed out")]
    Timeout,

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// Stored data could not be decoded.
    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Store error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => StoreError::Timeout,
            sqlx::Error::Io(e) => StoreError::Unavailable(e.to_string()),
            sqlx::Error::PoolClosed => StoreError::Unavailable("connection pool closed".into()),
            sqlx::Error::WorkerCrashed => StoreError::Unavailable("database worker crashed".into()),
            sqlx::Error::ColumnDecode { index, source } => {
                StoreError::Corrupt(format!("column {index}: {source}"))
            }
            other => StoreError::Backend(other.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        StoreError::Backend(format!("migration failed: {err}"))
    }
}

/// Run a store call under a deadline; an elapsed deadline is a `Timeout`.
pub async fn with_timeout<T, F>(limit: Duration, call: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout),
    }
}

// ---------------------------------------------------------------------------
// Catalog queries
// ---------------------------------------------------------------------------

/// Which access path a catalog listing uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CatalogQuery {
    /// Status index, ascending kickoff.
    ByStatus(MatchStatus),
    /// Sport/league index, ascending kickoff.
    BySportLeague { sport: String, league: String },
    /// Full scan. Bounded only by catalog size.
    Scan,
}

/// Continuation cursor: the last row of the previous page.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct PageKey {
    pub kickoff: DateTime<Utc>,
    pub match_id: String,
}

impl PageKey {
    pub fn of(m: &Match) -> Self {
        Self {
            kickoff: m.kickoff,
            match_id: m.match_id.clone(),
        }
    }
}

/// One page of a catalog listing.
#[derive(Debug, Clone, Default)]
pub struct MatchPage {
    pub items: Vec<Match>,
    /// Present when the page was full; more rows may follow.
    pub next: Option<PageKey>,
}

impl MatchPage {
    /// Build a page, setting the cursor when `page_size` rows were returned.
    pub fn from_rows(items: Vec<Match>, page_size: usize) -> Self {
        let next = if page_size > 0 && items.len() == page_size {
            items.last().map(PageKey::of)
        } else {
            None
        };
        Self { items, next }
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Read side of the match catalog.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CatalogStore: Send + Sync {
    /// Point lookup by match id.
    async fn get_match(&self, match_id: &str) -> Result<Option<Match>, StoreError>;

    /// Fetch up to `page_size` rows ordered by (kickoff, match_id),
    /// starting strictly after `start_after`.
    async fn query_matches(
        &self,
        query: CatalogQuery,
        start_after: Option<PageKey>,
        page_size: usize,
    ) -> Result<MatchPage, StoreError>;
}

/// The debit half of a conditional commit.
#[derive(Debug, Clone, PartialEq)]
pub struct BalanceDebit {
    pub user_id: String,
    pub amount: Decimal,
    pub at: DateTime<Utc>,
}

/// Accounts and bet records.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn get_account(&self, user_id: &str) -> Result<Option<Account>, StoreError>;

    /// Insert a zero-balance account unless one exists. Returns whether
    /// an account was created.
    async fn create_account_if_absent(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Apply `debit` and insert `bet` as one all-or-nothing unit.
    ///
    /// Fails with `StoreError::ConditionFailed` listing every unmet
    /// condition, leaving both records untouched.
    async fn commit_bet(&self, debit: BalanceDebit, bet: Bet) -> Result<(), StoreError>;

    async fn get_bet(&self, bet_id: &str) -> Result<Option<Bet>, StoreError>;
}
