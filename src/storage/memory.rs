//! In-memory store.
//!
//! Holds the catalog and the ledger in process. The ledger sits behind a
//! single mutex so that `commit_bet` evaluates both conditions and applies
//! both writes against the same snapshot, which is the same guarantee a
//! transactional backing store gives. Faults can be injected to exercise
//! the transient-failure paths.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use super::seed::SeedTarget;
use super::{
    BalanceDebit, CatalogQuery, CatalogStore, Condition, LedgerStore, MatchPage, PageKey,
    StoreError,
};
use crate::types::{Account, Bet, Match};

#[derive(Debug, Default)]
struct Ledger {
    accounts: HashMap<String, Account>,
    bets: HashMap<String, Bet>,
}

/// Catalog + ledger held in memory.
#[derive(Default)]
pub struct MemoryStore {
    matches: RwLock<BTreeMap<String, Match>>,
    ledger: Mutex<Ledger>,
    /// If set, every call fails with this error.
    fault: Mutex<Option<StoreError>>,
    match_reads: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Force all subsequent calls to fail with `err`.
    pub async fn set_fault(&self, err: StoreError) {
        *self.fault.lock().await = Some(err);
    }

    pub async fn clear_fault(&self) {
        *self.fault.lock().await = None;
    }

    /// Number of point lookups served by `get_match`.
    pub fn match_reads(&self) -> usize {
        self.match_reads.load(Ordering::Relaxed)
    }

    /// Insert or replace a catalog entry (pricing-system side).
    pub async fn upsert_match(&self, m: Match) {
        self.matches.write().await.insert(m.match_id.clone(), m);
    }

    /// Create or overwrite an account balance (funding side).
    pub async fn set_balance(&self, user_id: &str, balance: Decimal, now: DateTime<Utc>) {
        let mut ledger = self.ledger.lock().await;
        let account = ledger
            .accounts
            .entry(user_id.to_string())
            .or_insert_with(|| Account::empty(user_id, now));
        account.balance = balance;
        account.last_updated = now;
    }

    /// All bets recorded for a user.
    pub async fn bets_for(&self, user_id: &str) -> Vec<Bet> {
        let ledger = self.ledger.lock().await;
        let mut bets: Vec<Bet> = ledger
            .bets
            .values()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect();
        bets.sort_by_key(|b| b.placed_at);
        bets
    }

    async fn check_fault(&self) -> Result<(), StoreError> {
        match self.fault.lock().await.as_ref() {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

fn matches_query(m: &Match, query: &CatalogQuery) -> bool {
    match query {
        CatalogQuery::ByStatus(status) => m.status == *status,
        CatalogQuery::BySportLeague { sport, league } => m.sport == *sport && m.league == *league,
        CatalogQuery::Scan => true,
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn get_match(&self, match_id: &str) -> Result<Option<Match>, StoreError> {
        self.check_fault().await?;
        self.match_reads.fetch_add(1, Ordering::Relaxed);
        Ok(self.matches.read().await.get(match_id).cloned())
    }

    async fn query_matches(
        &self,
        query: CatalogQuery,
        start_after: Option<PageKey>,
        page_size: usize,
    ) -> Result<MatchPage, StoreError> {
        self.check_fault().await?;
        let catalog = self.matches.read().await;
        let mut rows: Vec<&Match> = catalog
            .values()
            .filter(|m| matches_query(m, &query))
            .filter(|m| match &start_after {
                Some(after) => PageKey::of(m) > *after,
                None => true,
            })
            .collect();
        rows.sort_by(|a, b| PageKey::of(a).cmp(&PageKey::of(b)));
        let items: Vec<Match> = rows.into_iter().take(page_size).cloned().collect();
        Ok(MatchPage::from_rows(items, page_size))
    }
}

#[async_trait]
impl LedgerStore for MemoryStore {
    async fn get_account(&self, user_id: &str) -> Result<Option<Account>, StoreError> {
        self.check_fault().await?;
        Ok(self.ledger.lock().await.accounts.get(user_id).cloned())
    }

    async fn create_account_if_absent(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        self.check_fault().await?;
        let mut ledger = self.ledger.lock().await;
        if ledger.accounts.contains_key(user_id) {
            return Ok(false);
        }
        ledger
            .accounts
            .insert(user_id.to_string(), Account::empty(user_id, now));
        Ok(true)
    }

    async fn commit_bet(&self, debit: BalanceDebit, bet: Bet) -> Result<(), StoreError> {
        self.check_fault().await?;
        let mut ledger = self.ledger.lock().await;

        let mut failed = Vec::new();
        let covered = ledger
            .accounts
            .get(&debit.user_id)
            .map(|a| a.balance >= debit.amount)
            .unwrap_or(false);
        if !covered {
            failed.push(Condition::SufficientBalance);
        }
        if ledger.bets.contains_key(&bet.bet_id) {
            failed.push(Condition::UniqueBetId);
        }
        if !failed.is_empty() {
            debug!(bet_id = %bet.bet_id, ?failed, "Commit conditions failed");
            return Err(StoreError::ConditionFailed(failed));
        }

        if let Some(account) = ledger.accounts.get_mut(&debit.user_id) {
            account.balance -= debit.amount;
            account.last_updated = debit.at;
        }
        ledger.bets.insert(bet.bet_id.clone(), bet);
        Ok(())
    }

    async fn get_bet(&self, bet_id: &str) -> Result<Option<Bet>, StoreError> {
        self.check_fault().await?;
        Ok(self.ledger.lock().await.bets.get(bet_id).cloned())
    }
}

#[async_trait]
impl SeedTarget for MemoryStore {
    async fn seed_match(&self, m: Match) -> Result<(), StoreError> {
        self.upsert_match(m).await;
        Ok(())
    }

    async fn seed_balance(
        &self,
        user_id: &str,
        balance: Decimal,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.set_balance(user_id, balance, now).await;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
