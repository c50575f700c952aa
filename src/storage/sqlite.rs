//! SQLite store built on `sqlx`.
//!
//! Balances are held as integer minor units so the conditional debit can
//! be expressed as a single `UPDATE … WHERE balance_minor >= ?`. The debit
//! runs first inside the transaction, which takes the write lock before
//! anything is read; the bet insert follows with `ON CONFLICT DO NOTHING`
//! and the transaction only commits when both statements touched a row.

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow,
};
use sqlx::Row;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

use super::seed::SeedTarget;
use super::{
    BalanceDebit, CatalogQuery, CatalogStore, Condition, LedgerStore, MatchPage, PageKey,
    StoreError,
};
use crate::types::{
    from_minor_units, to_minor_units, Account, Bet, BetStatus, Match, MatchStatus, OddsTable,
    ResolvedSelection,
};

const MATCH_COLUMNS: &str = "match_id, sport, league, home_team, away_team, kickoff_ms, \
                             status, odds_json, home_score, away_score";

const BET_COLUMNS: &str = "bet_id, user_id, selections_json, stake_minor, total_odds, \
                           potential_payout, placed_at, status, match_ids_json, winnings";

/// Catalog + ledger in a SQLite database.
#[derive(Clone)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect to a file database (WAL, busy timeout) and run migrations.
    pub async fn connect(url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?;
        Self::from_pool(pool).await
    }

    /// A private in-memory database. One connection that never expires,
    /// since every new connection would see an empty database.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        Self::from_pool(pool).await
    }

    async fn from_pool(pool: SqlitePool) -> Result<Self, StoreError> {
        sqlx::migrate!("./migrations").run(&pool).await?;
        info!("SQLite store ready");
        Ok(Self { pool })
    }

    pub async fn health_check(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    /// Insert or replace a catalog entry (pricing-system side).
    pub async fn upsert_match(&self, m: &Match) -> Result<(), StoreError> {
        let odds_json = serde_json::to_string(&m.odds)
            .map_err(|e| StoreError::Backend(format!("encode odds: {e}")))?;
        sqlx::query(
            r#"
            INSERT INTO matches (match_id, sport, league, home_team, away_team, kickoff_ms,
                                 status, odds_json, home_score, away_score)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (match_id) DO UPDATE SET
                sport = excluded.sport,
                league = excluded.league,
                home_team = excluded.home_team,
                away_team = excluded.away_team,
                kickoff_ms = excluded.kickoff_ms,
                status = excluded.status,
                odds_json = excluded.odds_json,
                home_score = excluded.home_score,
                away_score = excluded.away_score
            "#,
        )
        .bind(&m.match_id)
        .bind(&m.sport)
        .bind(&m.league)
        .bind(&m.home_team)
        .bind(&m.away_team)
        .bind(m.kickoff.timestamp_millis())
        .bind(m.status.as_str())
        .bind(odds_json)
        .bind(m.home_score.map(i64::from))
        .bind(m.away_score.map(i64::from))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Create or overwrite an account balance (funding side).
    pub async fn set_balance(
        &self,
        user_id: &str,
        balance: Decimal,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let minor = to_minor_units(balance)
            .ok_or_else(|| StoreError::Backend(format!("balance {balance} not in minor units")))?;
        let ts = now.to_rfc3339();
        sqlx::query(
            r#"
            INSERT INTO accounts (user_id, balance_minor, created_at, last_updated)
            VALUES (?, ?, ?, ?)
            ON CONFLICT (user_id) DO UPDATE SET
                balance_minor = excluded.balance_minor,
                last_updated = excluded.last_updated
            "#,
        )
        .bind(user_id)
        .bind(minor)
        .bind(&ts)
        .bind(&ts)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Row decoding
// ---------------------------------------------------------------------------

fn corrupt(what: &str, err: impl std::fmt::Display) -> StoreError {
    StoreError::Corrupt(format!("{what}: {err}"))
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| corrupt("timestamp", e))
}

fn parse_decimal(raw: &str) -> Result<Decimal, StoreError> {
    Decimal::from_str(raw).map_err(|e| corrupt("decimal", e))
}

fn match_from_row(row: &SqliteRow) -> Result<Match, StoreError> {
    let kickoff_ms: i64 = row.try_get("kickoff_ms")?;
    let kickoff = Utc
        .timestamp_millis_opt(kickoff_ms)
        .single()
        .ok_or_else(|| corrupt("kickoff", kickoff_ms))?;
    let status: String = row.try_get("status")?;
    let status = MatchStatus::from_str(&status).map_err(|e| corrupt("match status", e))?;
    let odds_json: String = row.try_get("odds_json")?;
    let odds: OddsTable = serde_json::from_str(&odds_json).map_err(|e| corrupt("odds", e))?;
    let home_score: Option<i64> = row.try_get("home_score")?;
    let away_score: Option<i64> = row.try_get("away_score")?;

    Ok(Match {
        match_id: row.try_get("match_id")?,
        sport: row.try_get("sport")?,
        league: row.try_get("league")?,
        home_team: row.try_get("home_team")?,
        away_team: row.try_get("away_team")?,
        kickoff,
        status,
        odds,
        home_score: home_score.and_then(|s| u32::try_from(s).ok()),
        away_score: away_score.and_then(|s| u32::try_from(s).ok()),
    })
}

fn account_from_row(row: &SqliteRow) -> Result<Account, StoreError> {
    let balance_minor: i64 = row.try_get("balance_minor")?;
    let created_at: String = row.try_get("created_at")?;
    let last_updated: String = row.try_get("last_updated")?;
    Ok(Account {
        user_id: row.try_get("user_id")?,
        balance: from_minor_units(balance_minor),
        created_at: parse_ts(&created_at)?,
        last_updated: parse_ts(&last_updated)?,
    })
}

fn bet_from_row(row: &SqliteRow) -> Result<Bet, StoreError> {
    let selections_json: String = row.try_get("selections_json")?;
    let selections: Vec<ResolvedSelection> =
        serde_json::from_str(&selections_json).map_err(|e| corrupt("selections", e))?;
    let match_ids_json: String = row.try_get("match_ids_json")?;
    let match_ids: Vec<String> =
        serde_json::from_str(&match_ids_json).map_err(|e| corrupt("match ids", e))?;
    let stake_minor: i64 = row.try_get("stake_minor")?;
    let total_odds: String = row.try_get("total_odds")?;
    let potential_payout: String = row.try_get("potential_payout")?;
    let placed_at: String = row.try_get("placed_at")?;
    let status: String = row.try_get("status")?;
    let winnings: String = row.try_get("winnings")?;

    Ok(Bet {
        bet_id: row.try_get("bet_id")?,
        user_id: row.try_get("user_id")?,
        selections,
        stake: from_minor_units(stake_minor),
        total_odds: parse_decimal(&total_odds)?,
        potential_payout: parse_decimal(&potential_payout)?,
        placed_at: parse_ts(&placed_at)?,
        status: BetStatus::from_str(&status).map_err(|e| corrupt("bet status", e))?,
        match_ids,
        winnings: parse_decimal(&winnings)?,
    })
}

// ---------------------------------------------------------------------------
// Trait implementations
// ---------------------------------------------------------------------------

#[async_trait]
impl CatalogStore for SqliteStore {
    async fn get_match(&self, match_id: &str) -> Result<Option<Match>, StoreError> {
        let sql = format!("SELECT {MATCH_COLUMNS} FROM matches WHERE match_id = ?");
        let row = sqlx::query(&sql)
            .bind(match_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(match_from_row).transpose()
    }

    async fn query_matches(
        &self,
        query: CatalogQuery,
        start_after: Option<PageKey>,
        page_size: usize,
    ) -> Result<MatchPage, StoreError> {
        let mut clauses: Vec<&str> = Vec::new();
        match &query {
            CatalogQuery::ByStatus(_) => clauses.push("status = ?"),
            CatalogQuery::BySportLeague { .. } => clauses.push("sport = ? AND league = ?"),
            CatalogQuery::Scan => {}
        }
        if start_after.is_some() {
            clauses.push("(kickoff_ms, match_id) > (?, ?)");
        }
        let where_sql = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };
        let sql = format!(
            "SELECT {MATCH_COLUMNS} FROM matches {where_sql} ORDER BY kickoff_ms, match_id LIMIT ?"
        );

        let mut q = sqlx::query(&sql);
        match &query {
            CatalogQuery::ByStatus(status) => q = q.bind(status.as_str()),
            CatalogQuery::BySportLeague { sport, league } => q = q.bind(sport).bind(league),
            CatalogQuery::Scan => {}
        }
        if let Some(after) = &start_after {
            q = q.bind(after.kickoff.timestamp_millis()).bind(&after.match_id);
        }
        let limit = i64::try_from(page_size).unwrap_or(i64::MAX);
        let rows = q.bind(limit).fetch_all(&self.pool).await?;

        let items = rows
            .iter()
            .map(match_from_row)
            .collect::<Result<Vec<_>, _>>()?;
        debug!(?query, rows = items.len(), "Catalog page fetched");
        Ok(MatchPage::from_rows(items, page_size))
    }
}

#[async_trait]
impl LedgerStore for SqliteStore {
    async fn get_account(&self, user_id: &str) -> Result<Option<Account>, StoreError> {
        let row = sqlx::query(
            "SELECT user_id, balance_minor, created_at, last_updated FROM accounts WHERE user_id = ?",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        row.as_ref().map(account_from_row).transpose()
    }

    async fn create_account_if_absent(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let ts = now.to_rfc3339();
        let result = sqlx::query(
            r#"
            INSERT INTO accounts (user_id, balance_minor, created_at, last_updated)
            VALUES (?, 0, ?, ?)
            ON CONFLICT (user_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(&ts)
        .bind(&ts)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn commit_bet(&self, debit: BalanceDebit, bet: Bet) -> Result<(), StoreError> {
        let amount_minor = to_minor_units(debit.amount)
            .ok_or_else(|| StoreError::Backend(format!("stake {} not in minor units", debit.amount)))?;
        let selections_json = serde_json::to_string(&bet.selections)
            .map_err(|e| StoreError::Backend(format!("encode selections: {e}")))?;
        let match_ids_json = serde_json::to_string(&bet.match_ids)
            .map_err(|e| StoreError::Backend(format!("encode match ids: {e}")))?;
        let stake_minor = to_minor_units(bet.stake)
            .ok_or_else(|| StoreError::Backend(format!("stake {} not in minor units", bet.stake)))?;

        let mut tx = self.pool.begin().await?;

        let debited = sqlx::query(
            r#"
            UPDATE accounts
            SET balance_minor = balance_minor - ?, last_updated = ?
            WHERE user_id = ? AND balance_minor >= ?
            "#,
        )
        .bind(amount_minor)
        .bind(debit.at.to_rfc3339())
        .bind(&debit.user_id)
        .bind(amount_minor)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        let insert_sql = format!(
            "INSERT INTO bets ({BET_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?) \
             ON CONFLICT (bet_id) DO NOTHING"
        );
        let inserted = sqlx::query(&insert_sql)
            .bind(&bet.bet_id)
            .bind(&bet.user_id)
            .bind(selections_json)
            .bind(stake_minor)
            .bind(bet.total_odds.to_string())
            .bind(bet.potential_payout.to_string())
            .bind(bet.placed_at.to_rfc3339())
            .bind(bet.status.as_str())
            .bind(match_ids_json)
            .bind(bet.winnings.to_string())
            .execute(&mut *tx)
            .await?
            .rows_affected();

        let mut failed = Vec::new();
        if debited == 0 {
            failed.push(Condition::SufficientBalance);
        }
        if inserted == 0 {
            failed.push(Condition::UniqueBetId);
        }
        if !failed.is_empty() {
            tx.rollback().await?;
            debug!(bet_id = %bet.bet_id, ?failed, "Commit conditions failed, rolled back");
            return Err(StoreError::ConditionFailed(failed));
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_bet(&self, bet_id: &str) -> Result<Option<Bet>, StoreError> {
        let sql = format!("SELECT {BET_COLUMNS} FROM bets WHERE bet_id = ?");
        let row = sqlx::query(&sql)
            .bind(bet_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(bet_from_row).transpose()
    }
}

#[async_trait]
impl SeedTarget for SqliteStore {
    async fn seed_match(&self, m: Match) -> Result<(), StoreError> {
        self.upsert_match(&m).await
    }

    async fn seed_balance(
        &self,
        user_id: &str,
        balance: Decimal,
        now: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        self.set_balance(user_id, balance, now).await
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
