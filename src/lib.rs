//! etfhelper: ETF and portfolio investment backtester.
//!
//! Hexagonal architecture: domain logic in [`domain`], port traits in [`ports`],
//! concrete implementations in [`adapters`], command-line orchestration in
//! [`cli`].

pub mod domain;
pub mod ports;
pub mod adapters;
pub mod cli;
