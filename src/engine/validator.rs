//! Selection validator.
//!
//! Re-resolves every leg of a client ticket against the catalog. Shape and
//! stake checks run before any store access; the referenced matches are
//! then fetched concurrently, one lookup per distinct match, and each leg
//! is checked for kickoff, status, market and selection. The catalog's odd
//! always replaces whatever the client claimed.

use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{Rejection, ServiceError, ValidationError};
use crate::storage::{with_timeout, CatalogStore};
use crate::types::{to_minor_units, Match, ResolvedSelection, SelectionRequest};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Ticket limits enforced before any store access.
#[derive(Debug, Clone)]
pub struct BettingRules {
    pub min_stake: Decimal,
    pub max_stake: Decimal,
    pub max_selections: usize,
}

impl Default for BettingRules {
    fn default() -> Self {
        Self {
            min_stake: dec!(100),
            max_stake: dec!(500000),
            max_selections: 20,
        }
    }
}

impl BettingRules {
    /// Selection count, leg completeness and stake range. Touches no store.
    pub fn check_ticket(
        &self,
        selections: &[SelectionRequest],
        stake: Decimal,
    ) -> Result<(), ValidationError> {
        if selections.is_empty() {
            return Err(ValidationError::EmptySelections);
        }
        if selections.len() > self.max_selections {
            return Err(ValidationError::TooManySelections {
                count: selections.len(),
                max: self.max_selections,
            });
        }
        for (index, s) in selections.iter().enumerate() {
            if s.match_id.trim().is_empty()
                || s.market.trim().is_empty()
                || s.selection.trim().is_empty()
            {
                return Err(ValidationError::IncompleteSelection { index });
            }
        }

        if stake < self.min_stake || stake > self.max_stake {
            return Err(ValidationError::StakeOutOfRange {
                min: self.min_stake,
                max: self.max_stake,
            });
        }
        if to_minor_units(stake).is_none() {
            return Err(ValidationError::StakePrecision { stake });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// A ticket whose every leg carries the authoritative odd.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedTicket {
    pub user_id: String,
    pub selections: Vec<ResolvedSelection>,
    pub stake: Decimal,
}

impl ValidatedTicket {
    pub fn odds(&self) -> impl Iterator<Item = Decimal> + '_ {
        self.selections.iter().map(|s| s.odd)
    }

    /// Distinct match ids in first-seen order.
    pub fn match_ids(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.selections
            .iter()
            .filter(|s| seen.insert(s.match_id.as_str()))
            .map(|s| s.match_id.clone())
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Validator
// ---------------------------------------------------------------------------

pub struct SelectionValidator {
    catalog: Arc<dyn CatalogStore>,
    rules: BettingRules,
    store_timeout: Duration,
}

impl SelectionValidator {
    pub fn new(catalog: Arc<dyn CatalogStore>, rules: BettingRules, store_timeout: Duration) -> Self {
        Self {
            catalog,
            rules,
            store_timeout,
        }
    }

    pub fn rules(&self) -> &BettingRules {
        &self.rules
    }

    pub async fn validate(
        &self,
        user_id: &str,
        selections: &[SelectionRequest],
        stake: Decimal,
        now: DateTime<Utc>,
    ) -> Result<ValidatedTicket, ServiceError> {
        self.rules.check_ticket(selections, stake)?;

        let fixtures = self.fetch_matches(selections).await?;

        // Every referenced match must exist before any per-leg check.
        for s in selections {
            if !fixtures.contains_key(&s.match_id) {
                return Err(Rejection::MatchNotFound {
                    match_id: s.match_id.clone(),
                }
                .into());
            }
        }

        let mut resolved = Vec::with_capacity(selections.len());
        for s in selections {
            let fixture = &fixtures[&s.match_id];
            let odd = resolve_leg(fixture, s, now)?;
            if let Some(claimed) = s.odd {
                if claimed != odd {
                    warn!(
                        user_id,
                        match_id = %s.match_id,
                        market = %s.market,
                        selection = %s.selection,
                        client_odd = %claimed,
                        server_odd = %odd,
                        "Client odd differs from catalog, using catalog odd"
                    );
                }
            }
            resolved.push(ResolvedSelection {
                match_id: s.match_id.clone(),
                market: s.market.clone(),
                selection: s.selection.clone(),
                odd,
                claimed_odd: s.odd,
            });
        }

        debug!(user_id, legs = resolved.len(), %stake, "Ticket validated");
        Ok(ValidatedTicket {
            user_id: user_id.to_string(),
            selections: resolved,
            stake,
        })
    }

    /// Fetch each distinct match once, all lookups in flight together.
    async fn fetch_matches(
        &self,
        selections: &[SelectionRequest],
    ) -> Result<HashMap<String, Match>, ServiceError> {
        let mut seen = HashSet::new();
        let ids: Vec<&str> = selections
            .iter()
            .map(|s| s.match_id.as_str())
            .filter(|id| seen.insert(*id))
            .collect();

        let lookups = ids
            .iter()
            .map(|id| with_timeout(self.store_timeout, self.catalog.get_match(id)));
        let found = try_join_all(lookups).await?;

        Ok(found
            .into_iter()
            .flatten()
            .map(|m| (m.match_id.clone(), m))
            .collect())
    }
}

/// Kickoff, status, market and selection checks for one leg. Returns the
/// authoritative odd.
fn resolve_leg(fixture: &Match, s: &SelectionRequest, now: DateTime<Utc>) -> Result<Decimal, Rejection> {
    if fixture.kickoff <= now {
        return Err(Rejection::MatchStarted {
            match_id: fixture.match_id.clone(),
            fixture: fixture.fixture(),
        });
    }
    if !fixture.status.accepts_bets() {
        return Err(Rejection::MatchNotOpen {
            match_id: fixture.match_id.clone(),
            fixture: fixture.fixture(),
            status: fixture.status,
        });
    }
    if !fixture.odds.contains_key(&s.market) {
        return Err(Rejection::MarketNotFound {
            match_id: fixture.match_id.clone(),
            market: s.market.clone(),
        });
    }
    match fixture.odd_for(&s.market, &s.selection) {
        Some(odd) if odd > Decimal::ZERO => Ok(odd),
        _ => Err(Rejection::SelectionUnavailable {
            match_id: fixture.match_id.clone(),
            market: s.market.clone(),
            selection: s.selection.clone(),
        }),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
