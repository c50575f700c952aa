//! Bet service: one placement request from ticket to committed bet.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use uuid::Uuid;

use super::calculator;
use super::ledger::LedgerCommitEngine;
use super::validator::{BettingRules, SelectionValidator};
use crate::error::{Rejection, ServiceError};
use crate::storage::{with_timeout, CatalogStore, LedgerStore};
use crate::types::{Bet, TicketRequest};

/// Namespace for idempotency-derived bet ids.
const BET_ID_NAMESPACE: Uuid = Uuid::from_u128(0x6b1f_2c4e_93a7_4d0b_8e55_0f3a_91c2_d7e4);

/// Outcome of a successful placement.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacementReceipt {
    pub bet_id: String,
    /// The bet was already recorded under this idempotency key.
    pub replayed: bool,
    pub total_odds: Decimal,
    pub potential_payout: Decimal,
}

/// Bet id for a placement: random, or derived from the caller's key so a
/// retried request lands on the same id.
pub fn bet_id_for(user_id: &str, idempotency_key: Option<&str>) -> String {
    let id = match idempotency_key {
        Some(key) => Uuid::new_v5(&BET_ID_NAMESPACE, format!("{user_id}:{key}").as_bytes()),
        None => Uuid::new_v4(),
    };
    format!("BET-{id}")
}

pub struct BetService {
    validator: SelectionValidator,
    ledger: LedgerCommitEngine,
    ledger_store: Arc<dyn LedgerStore>,
    store_timeout: Duration,
}

impl BetService {
    pub fn new(
        catalog: Arc<dyn CatalogStore>,
        ledger_store: Arc<dyn LedgerStore>,
        rules: BettingRules,
        store_timeout: Duration,
    ) -> Self {
        Self {
            validator: SelectionValidator::new(catalog, rules, store_timeout),
            ledger: LedgerCommitEngine::new(ledger_store.clone(), store_timeout),
            ledger_store,
            store_timeout,
        }
    }

    /// Validate, price and commit one ticket.
    ///
    /// With an idempotency key, a bet already recorded under that key is
    /// replayed before any catalog check, so a retry still succeeds after the
    /// match has been suspended or kicked off.
    pub async fn place_bet(
        &self,
        user_id: &str,
        ticket: TicketRequest,
        idempotency_key: Option<&str>,
        now: DateTime<Utc>,
    ) -> Result<PlacementReceipt, ServiceError> {
        self.validator
            .rules()
            .check_ticket(&ticket.selections, ticket.stake)?;
        let bet_id = bet_id_for(user_id, idempotency_key);

        if idempotency_key.is_some() {
            let existing = with_timeout(self.store_timeout, self.ledger_store.get_bet(&bet_id)).await?;
            if let Some(bet) = existing {
                return replay(user_id, &ticket, bet);
            }
        }

        let validated = self
            .validator
            .validate(user_id, &ticket.selections, ticket.stake, now)
            .await?;
        let quote = calculator::quote(validated.stake, validated.odds())?;

        match self.ledger.commit(&validated, &quote, &bet_id, now).await {
            Ok(bet_id) => Ok(PlacementReceipt {
                bet_id,
                replayed: false,
                total_odds: quote.rounded_odds(),
                potential_payout: quote.rounded_payout(),
            }),
            // A concurrent request with the same key won the commit.
            Err(ServiceError::Rejected(Rejection::DuplicateBet { bet_id })) if idempotency_key.is_some() => {
                match with_timeout(self.store_timeout, self.ledger_store.get_bet(&bet_id)).await? {
                    Some(bet) => replay(user_id, &ticket, bet),
                    None => Err(Rejection::DuplicateBet { bet_id }.into()),
                }
            }
            Err(e) => Err(e),
        }
    }
}

/// Answer a keyed retry from the recorded bet. The key only replays the
/// ticket it was first used with.
fn replay(user_id: &str, ticket: &TicketRequest, bet: Bet) -> Result<PlacementReceipt, ServiceError> {
    if bet.user_id != user_id {
        warn!(bet_id = %bet.bet_id, user_id, "Bet id collision with another owner");
        return Err(Rejection::DuplicateBet { bet_id: bet.bet_id }.into());
    }
    if !same_ticket(&bet, ticket) {
        warn!(bet_id = %bet.bet_id, user_id, "Idempotency key reused for a different ticket");
        return Err(Rejection::IdempotencyKeyReused { bet_id: bet.bet_id }.into());
    }
    info!(bet_id = %bet.bet_id, user_id, "Idempotent replay of recorded bet");
    Ok(PlacementReceipt {
        bet_id: bet.bet_id,
        replayed: true,
        total_odds: bet.total_odds,
        potential_payout: bet.potential_payout,
    })
}

/// Same stake and the same legs in the same order. Client-claimed odds are
/// advisory and do not count.
fn same_ticket(bet: &Bet, ticket: &TicketRequest) -> bool {
    bet.stake == ticket.stake
        && bet.selections.len() == ticket.selections.len()
        && bet
            .selections
            .iter()
            .zip(&ticket.selections)
            .all(|(recorded, asked)| {
                recorded.match_id == asked.match_id
                    && recorded.market == asked.market
                    && recorded.selection == asked.selection
            })
}
