//! WAGERBOOK — wagering ledger and bet-placement engine.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod error;
pub mod storage;
pub mod catalog;
pub mod engine;
pub mod api;
