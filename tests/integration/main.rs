//! End-to-end tests against both store backends.

mod fixtures;
mod catalog;
mod placement;
mod concurrency;
mod api;
