//! Error taxonomy for the placement and catalog paths.
//!
//! `ValidationError` covers malformed input, `Rejection` covers domain
//! rules, and `ServiceError` adds the transient/fatal split that callers
//! use to decide whether a retry is safe.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::storage::StoreError;
use crate::types::MatchStatus;

/// Malformed or out-of-range input. Fixed by the caller, never retried.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("X-User-Id header is required.")]
    MissingIdentity,

    #[error("Invalid request body: {0}")]
    InvalidBody(String),

    #[error("Bet selections are required and must be a non-empty array.")]
    EmptySelections,

    #[error("Maximum of {max} selections allowed per ticket (got {count}).")]
    TooManySelections { count: usize, max: usize },

    #[error("Selection #{index} must name a match, a market and a selection.")]
    IncompleteSelection { index: usize },

    #[error("Stake must be between {min} and {max}.")]
    StakeOutOfRange { min: Decimal, max: Decimal },

    #[error("Stake {stake} has more precision than the currency allows.")]
    StakePrecision { stake: Decimal },

    #[error("Invalid match filter: {0}")]
    InvalidFilter(String),
}

impl ValidationError {
    pub fn code(&self) -> &'static str {
        match self {
            ValidationError::MissingIdentity => "missing_identity",
            ValidationError::InvalidBody(_) => "invalid_body",
            ValidationError::EmptySelections => "empty_selections",
            ValidationError::TooManySelections { .. } => "too_many_selections",
            ValidationError::IncompleteSelection { .. } => "incomplete_selection",
            ValidationError::StakeOutOfRange { .. } => "stake_out_of_range",
            ValidationError::StakePrecision { .. } => "stake_precision",
            ValidationError::InvalidFilter(_) => "invalid_filter",
        }
    }
}

/// A ticket that is well-formed but fails a domain rule.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Rejection {
    #[error("Match {match_id} not found.")]
    MatchNotFound { match_id: String },

    #[error("Match '{fixture}' ({match_id}) has already kicked off.")]
    MatchStarted { match_id: String, fixture: String },

    #[error("Match '{fixture}' ({match_id}) is not open for betting (Status: {status}).")]
    MatchNotOpen {
        match_id: String,
        fixture: String,
        status: MatchStatus,
    },

    #[error("Market '{market}' not found for match {match_id}.")]
    MarketNotFound { match_id: String, market: String },

    #[error("Selection '{selection}' or its odd is invalid for market '{market}' in match {match_id}.")]
    SelectionUnavailable {
        match_id: String,
        market: String,
        selection: String,
    },

    #[error("Potential payout exceeds the representable range.")]
    PayoutOverflow,

    #[error("Insufficient balance. Please deposit funds.")]
    InsufficientFunds,

    #[error("Bet {bet_id} has already been recorded.")]
    DuplicateBet { bet_id: String },

    #[error("Idempotency key was already used for a different ticket (bet {bet_id}).")]
    IdempotencyKeyReused { bet_id: String },
}

impl Rejection {
    pub fn code(&self) -> &'static str {
        match self {
            Rejection::MatchNotFound { .. } => "match_not_found",
            Rejection::MatchStarted { .. } => "match_started",
            Rejection::MatchNotOpen { .. } => "match_not_open",
            Rejection::MarketNotFound { .. } => "market_not_found",
            Rejection::SelectionUnavailable { .. } => "selection_unavailable",
            Rejection::PayoutOverflow => "payout_overflow",
            Rejection::InsufficientFunds => "insufficient_funds",
            Rejection::DuplicateBet { .. } => "duplicate_bet",
            Rejection::IdempotencyKeyReused { .. } => "idempotency_key_reused",
        }
    }
}

/// Everything the catalog and placement paths can report to a caller.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Rejected(#[from] Rejection),

    /// Store or network unavailability. Safe to retry: no partial effect.
    #[error("Temporary failure, please retry: {0}")]
    Transient(String),

    /// Programming or configuration error. Never retried blindly.
    #[error("Internal error: {0}")]
    Fatal(String),
}

impl ServiceError {
    pub fn code(&self) -> &'static str {
        match self {
            ServiceError::Validation(e) => e.code(),
            ServiceError::Rejected(r) => r.code(),
            ServiceError::Transient(_) => "temporarily_unavailable",
            ServiceError::Fatal(_) => "internal_error",
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, ServiceError::Transient(_))
    }
}

/// Store errors that reach this point were not condition failures the
/// ledger could classify, so they default to transient.
impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Corrupt(msg) => ServiceError::Fatal(msg),
            other => ServiceError::Transient(other.to_string()),
        }
    }
}
