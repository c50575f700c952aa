//! Ledger commit engine.
//!
//! Turns a validated, priced ticket into a bet record and hands the debit
//! and the insert to the store as one conditional unit. A lost race on the
//! balance or a reused bet id comes back as a domain rejection; anything
//! else the store reports is a transient failure with no partial effect.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::calculator::Quote;
use super::validator::ValidatedTicket;
use crate::error::{Rejection, ServiceError};
use crate::storage::{with_timeout, BalanceDebit, Condition, LedgerStore, StoreError};
use crate::types::{Bet, BetStatus};

pub struct LedgerCommitEngine {
    store: Arc<dyn LedgerStore>,
    store_timeout: Duration,
}

impl LedgerCommitEngine {
    pub fn new(store: Arc<dyn LedgerStore>, store_timeout: Duration) -> Self {
        Self {
            store,
            store_timeout,
        }
    }

    /// Build the pending bet record for a ticket. Rounding happens here.
    pub fn build_bet(
        ticket: &ValidatedTicket,
        quote: &Quote,
        bet_id: &str,
        now: DateTime<Utc>,
    ) -> Bet {
        Bet {
            bet_id: bet_id.to_string(),
            user_id: ticket.user_id.clone(),
            selections: ticket.selections.clone(),
            stake: ticket.stake,
            total_odds: quote.rounded_odds(),
            potential_payout: quote.rounded_payout(),
            placed_at: now,
            status: BetStatus::Pending,
            match_ids: ticket.match_ids(),
            winnings: Decimal::ZERO,
        }
    }

    /// Debit the stake and record the bet atomically. Returns the bet id.
    pub async fn commit(
        &self,
        ticket: &ValidatedTicket,
        quote: &Quote,
        bet_id: &str,
        now: DateTime<Utc>,
    ) -> Result<String, ServiceError> {
        let user_id = ticket.user_id.as_str();

        // First contact provisions an empty account; the debit below then
        // fails on balance rather than on a missing row.
        let created = with_timeout(
            self.store_timeout,
            self.store.create_account_if_absent(user_id, now),
        )
        .await?;
        if created {
            info!(user_id, "Provisioned zero-balance account");
        }

        let bet = Self::build_bet(ticket, quote, bet_id, now);
        let debit = BalanceDebit {
            user_id: user_id.to_string(),
            amount: ticket.stake,
            at: now,
        };
        debug!(%bet, "Committing bet");

        match with_timeout(self.store_timeout, self.store.commit_bet(debit, bet)).await {
            Ok(()) => {
                info!(
                    bet_id,
                    user_id,
                    stake = %ticket.stake,
                    total_odds = %quote.rounded_odds(),
                    potential_payout = %quote.rounded_payout(),
                    "Bet committed"
                );
                Ok(bet_id.to_string())
            }
            Err(StoreError::ConditionFailed(failed)) => {
                let rejection = classify(&failed, bet_id);
                warn!(bet_id, user_id, ?failed, code = rejection.code(), "Bet commit rejected");
                Err(rejection.into())
            }
            Err(e) => {
                warn!(bet_id, user_id, error = %e, "Bet commit failed");
                Err(e.into())
            }
        }
    }
}

/// A reused bet id outranks a short balance.
fn classify(failed: &[Condition], bet_id: &str) -> Rejection {
    if failed.contains(&Condition::UniqueBetId) {
        Rejection::DuplicateBet {
            bet_id: bet_id.to_string(),
        }
    } else {
        Rejection::InsufficientFunds
    }
}
