//! Placement engine: validate → price → commit.

pub mod calculator;
pub mod validator;
pub mod ledger;
pub mod placement;
