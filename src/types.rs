//! Shared types for the WAGERBOOK ledger.
//!
//! These types form the data model used across all modules: the match
//! catalog, accounts, ticket requests and committed bets. Wire names are
//! camelCase to match the public JSON interface.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::error::ValidationError;

/// Decimal places of the currency's smallest unit (kobo, cents).
pub const CURRENCY_SCALE: u32 = 2;

/// Decimal places kept for aggregate odds on a bet record.
pub const ODDS_SCALE: u32 = 4;

/// Market name → (selection label → decimal odd).
pub type OddsTable = BTreeMap<String, BTreeMap<String, Decimal>>;

// ---------------------------------------------------------------------------
// Money helpers
// ---------------------------------------------------------------------------

/// Convert a currency amount to integer minor units.
///
/// Returns `None` when the amount carries more precision than the
/// currency allows or does not fit in an `i64`.
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
    let scaled = amount.checked_mul(Decimal::from(10i64.pow(CURRENCY_SCALE)))?;
    if scaled.fract() != Decimal::ZERO {
        return None;
    }
    scaled.to_i64()
}

/// Convert integer minor units back to a currency amount.
pub fn from_minor_units(minor: i64) -> Decimal {
    Decimal::new(minor, CURRENCY_SCALE)
}

// ---------------------------------------------------------------------------
// Match
// ---------------------------------------------------------------------------

/// Lifecycle status of a match as published by the pricing system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchStatus {
    Upcoming,
    Open,
    Suspended,
    Finished,
    Cancelled,
}

impl MatchStatus {
    /// Only `upcoming` and `open` matches accept bets.
    pub fn accepts_bets(&self) -> bool {
        matches!(self, MatchStatus::Upcoming | MatchStatus::Open)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MatchStatus::Upcoming => "upcoming",
            MatchStatus::Open => "open",
            MatchStatus::Suspended => "suspended",
            MatchStatus::Finished => "finished",
            MatchStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MatchStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "upcoming" => Ok(MatchStatus::Upcoming),
            "open" => Ok(MatchStatus::Open),
            "suspended" => Ok(MatchStatus::Suspended),
            "finished" => Ok(MatchStatus::Finished),
            "cancelled" | "canceled" => Ok(MatchStatus::Cancelled),
            _ => Err(ValidationError::InvalidFilter(format!("unknown status '{s}'"))),
        }
    }
}

/// A fixture in the match catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Match {
    pub match_id: String,
    pub sport: String,
    pub league: String,
    pub home_team: String,
    pub away_team: String,
    #[serde(rename = "matchDateTime", alias = "kickoff")]
    pub kickoff: DateTime<Utc>,
    pub status: MatchStatus,
    #[serde(default)]
    pub odds: OddsTable,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home_score: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub away_score: Option<u32>,
}

impl Match {
    /// "Home vs Away", used in rejection messages.
    pub fn fixture(&self) -> String {
        format!("{} vs {}", self.home_team, self.away_team)
    }

    /// Bettable iff kickoff is strictly in the future and the status
    /// accepts bets.
    pub fn is_bettable_at(&self, now: DateTime<Utc>) -> bool {
        self.kickoff > now && self.status.accepts_bets()
    }

    /// Copy with in-progress/historical scores removed.
    pub fn without_scores(mut self) -> Self {
        self.home_score = None;
        self.away_score = None;
        self
    }

    /// Authoritative odd for a market/selection pair, if priced.
    pub fn odd_for(&self, market: &str, selection: &str) -> Option<Decimal> {
        self.odds.get(market)?.get(selection).copied()
    }
}

// ---------------------------------------------------------------------------
// Accounts
// ---------------------------------------------------------------------------

/// A user's wagering account.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub user_id: String,
    pub balance: Decimal,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl Account {
    /// A freshly provisioned, never-funded account.
    pub fn empty(user_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            balance: Decimal::ZERO,
            created_at: now,
            last_updated: now,
        }
    }
}

// ---------------------------------------------------------------------------
// Tickets & bets
// ---------------------------------------------------------------------------

/// One leg of a ticket as proposed by the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionRequest {
    pub match_id: String,
    pub market: String,
    pub selection: String,
    /// Client-claimed odd. Advisory only, never used for pricing.
    #[serde(default)]
    pub odd: Option<Decimal>,
}

/// A client-submitted ticket prior to validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketRequest {
    pub selections: Vec<SelectionRequest>,
    pub stake: Decimal,
}

/// A selection after re-pricing against the catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedSelection {
    pub match_id: String,
    pub market: String,
    pub selection: String,
    /// Authoritative odd from the catalog.
    pub odd: Decimal,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub claimed_odd: Option<Decimal>,
}

/// Bet lifecycle status. Only `Pending` is written by this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BetStatus {
    Pending,
    Won,
    Lost,
    Void,
}

impl BetStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BetStatus::Pending => "pending",
            BetStatus::Won => "won",
            BetStatus::Lost => "lost",
            BetStatus::Void => "void",
        }
    }
}

impl fmt::Display for BetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BetStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(BetStatus::Pending),
            "won" => Ok(BetStatus::Won),
            "lost" => Ok(BetStatus::Lost),
            "void" => Ok(BetStatus::Void),
            other => Err(format!("unknown bet status '{other}'")),
        }
    }
}

/// A committed bet record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bet {
    pub bet_id: String,
    pub user_id: String,
    pub selections: Vec<ResolvedSelection>,
    pub stake: Decimal,
    /// Product of resolved odds, rounded to `ODDS_SCALE` places.
    pub total_odds: Decimal,
    /// Stake × aggregate odds, rounded to `CURRENCY_SCALE` places.
    pub potential_payout: Decimal,
    pub placed_at: DateTime<Utc>,
    pub status: BetStatus,
    /// Distinct match ids in first-seen order.
    pub match_ids: Vec<String>,
    pub winnings: Decimal,
}

impl fmt::Display for Bet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} user={} legs={} stake={:.2} odds={} payout={:.2} [{}]",
            self.bet_id,
            self.user_id,
            self.selections.len(),
            self.stake,
            self.total_odds,
            self.potential_payout,
            self.status,
        )
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
