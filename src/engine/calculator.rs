//! Odds and payout calculator.
//!
//! Accumulator pricing: aggregate odds are the product of every leg's
//! authoritative odd, and the potential payout is stake × aggregate odds.
//! Everything is computed at full `Decimal` precision; rounding happens
//! once, when the figures are written onto a bet record.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::error::Rejection;
use crate::types::{CURRENCY_SCALE, ODDS_SCALE};

/// Unrounded pricing of a ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quote {
    pub stake: Decimal,
    pub aggregate_odds: Decimal,
    pub potential_payout: Decimal,
}

impl Quote {
    /// Aggregate odds as persisted (4 dp, midpoint away from zero).
    pub fn rounded_odds(&self) -> Decimal {
        self.aggregate_odds
            .round_dp_with_strategy(ODDS_SCALE, RoundingStrategy::MidpointAwayFromZero)
    }

    /// Potential payout as persisted (2 dp, midpoint away from zero).
    pub fn rounded_payout(&self) -> Decimal {
        self.potential_payout
            .round_dp_with_strategy(CURRENCY_SCALE, RoundingStrategy::MidpointAwayFromZero)
    }
}

/// Price a ticket from its resolved odds.
pub fn quote<I>(stake: Decimal, odds: I) -> Result<Quote, Rejection>
where
    I: IntoIterator<Item = Decimal>,
{
    let aggregate_odds = odds
        .into_iter()
        .try_fold(Decimal::ONE, |acc, odd| acc.checked_mul(odd))
        .ok_or(Rejection::PayoutOverflow)?;
    let potential_payout = stake
        .checked_mul(aggregate_odds)
        .ok_or(Rejection::PayoutOverflow)?;

    Ok(Quote {
        stake,
        aggregate_odds,
        potential_payout,
    })
}
