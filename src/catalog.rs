//! Match catalog reader.
//!
//! Lists currently bettable matches. Picks the cheapest access path the
//! filter allows (status index, then sport/league index, then a full
//! scan), pages through it with a continuation cursor, and re-checks every
//! row against the clock because an index can lag the freshest catalog
//! state. Scores are never returned.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::ServiceError;
use crate::storage::{with_timeout, CatalogQuery, CatalogStore, PageKey};
use crate::types::{Match, MatchStatus};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Result-size bounds for catalog listings.
#[derive(Debug, Clone, Copy)]
pub struct CatalogLimits {
    /// Used when the caller gives no limit.
    pub default_limit: usize,
    /// Hard ceiling; larger requests are clamped.
    pub max_limit: usize,
}

impl Default for CatalogLimits {
    fn default() -> Self {
        Self {
            default_limit: 100,
            max_limit: 200,
        }
    }
}

/// A validated listing filter. Built at the HTTP boundary.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchFilter {
    pub status: Option<MatchStatus>,
    pub sport: Option<String>,
    pub league: Option<String>,
    pub limit: Option<usize>,
}

impl MatchFilter {
    /// The access path for this filter. `status` wins over sport/league.
    pub fn query(&self) -> CatalogQuery {
        if let Some(status) = self.status {
            return CatalogQuery::ByStatus(status);
        }
        match (&self.sport, &self.league) {
            (Some(sport), Some(league)) => CatalogQuery::BySportLeague {
                sport: sport.clone(),
                league: league.clone(),
            },
            _ => CatalogQuery::Scan,
        }
    }
}

// ---------------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------------

pub struct CatalogReader {
    store: Arc<dyn CatalogStore>,
    limits: CatalogLimits,
    store_timeout: Duration,
}

impl CatalogReader {
    pub fn new(store: Arc<dyn CatalogStore>, limits: CatalogLimits, store_timeout: Duration) -> Self {
        Self {
            store,
            limits,
            store_timeout,
        }
    }

    /// Clamp the requested size to `[1, max_limit]`.
    pub fn effective_limit(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.limits.default_limit)
            .clamp(1, self.limits.max_limit)
    }

    /// List bettable matches for `filter` as of `now`.
    pub async fn list_bettable_matches(
        &self,
        filter: &MatchFilter,
        now: DateTime<Utc>,
    ) -> Result<Vec<Match>, ServiceError> {
        let limit = self.effective_limit(filter.limit);
        let query = filter.query();
        if query == CatalogQuery::Scan {
            warn!(limit, "No indexed filter given, performing a full catalog scan");
        }

        let mut candidates: Vec<Match> = Vec::new();
        let mut cursor: Option<PageKey> = None;
        let mut pages = 0usize;
        loop {
            let page = with_timeout(
                self.store_timeout,
                self.store.query_matches(query.clone(), cursor.take(), limit),
            )
            .await?;
            pages += 1;
            candidates.extend(page.items);
            match page.next {
                Some(next) if candidates.len() < limit => cursor = Some(next),
                _ => break,
            }
        }

        let fetched = candidates.len();
        let matches: Vec<Match> = candidates
            .into_iter()
            .filter(|m| m.is_bettable_at(now))
            .take(limit)
            .map(Match::without_scores)
            .collect();

        debug!(?query, pages, fetched, "Catalog candidates fetched");
        info!(returned = matches.len(), limit, "Bettable matches listed");
        Ok(matches)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
