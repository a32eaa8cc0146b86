//! Core domain types and logic.

pub mod price_series;
pub mod plan;
pub mod backtest;
pub mod portfolio;
pub mod aggregate;
pub mod compare;
pub mod tickers;
pub mod config_validation;
pub mod error;
