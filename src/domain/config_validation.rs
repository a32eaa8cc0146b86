//! Configuration validation.
//!
//! Validates all config fields before a backtest, comparison or lookup runs.

use crate::domain::aggregate::JoinPolicy;
use crate::domain::error::EtfHelperError;
use crate::domain::plan::PlanMode;
use crate::domain::portfolio::MAX_WEIGHT;
use crate::ports::config_port::ConfigPort;
use chrono::NaiveDate;

pub const PORTFOLIO_SECTION_PREFIX: &str = "portfolio.";
pub const DEFAULT_START_DATE: &str = "2010-01-01";
pub const DEFAULT_END_DATE: &str = "2024-01-01";

pub fn validate_backtest_config(config: &dyn ConfigPort) -> Result<(), EtfHelperError> {
    validate_date_range(config)?;
    validate_mode(config)?;
    validate_amount(config)?;
    validate_join(config)?;
    validate_portfolios(config)?;
    Ok(())
}

pub fn validate_data_config(config: &dyn ConfigPort) -> Result<(), EtfHelperError> {
    let source = config
        .get_string("data", "source")
        .unwrap_or_else(|| "csv".to_string());
    match source.trim().to_lowercase().as_str() {
        "csv" => require(config, "data", "csv_dir"),
        "sqlite" => require(config, "sqlite", "path"),
        other => Err(invalid(
            "data",
            "source",
            format!("unknown source '{other}' (expected csv or sqlite)"),
        )),
    }
}

/// Every `[portfolio.<name>]` section maps tickers to weights in 0..=100 with
/// at least one positive weight.
pub fn validate_portfolios(config: &dyn ConfigPort) -> Result<(), EtfHelperError> {
    for section in portfolio_sections(config) {
        let mut total = 0.0;
        for key in config.keys(&section) {
            let raw = config.get_string(&section, &key).unwrap_or_default();
            let weight: f64 = raw.trim().parse().map_err(|_| {
                invalid(&section, &key, format!("weight '{raw}' is not a number"))
            })?;
            if !weight.is_finite() || !(0.0..=MAX_WEIGHT).contains(&weight) {
                return Err(invalid(
                    &section,
                    &key,
                    "weight must be between 0 and 100".to_string(),
                ));
            }
            total += weight;
        }
        if total <= 0.0 {
            return Err(EtfHelperError::ConfigInvalid {
                section: section.clone(),
                key: "*".to_string(),
                reason: "portfolio needs at least one positive weight".to_string(),
            });
        }
    }
    Ok(())
}

pub fn portfolio_sections(config: &dyn ConfigPort) -> Vec<String> {
    config
        .sections()
        .into_iter()
        .filter(|s| s.starts_with(PORTFOLIO_SECTION_PREFIX))
        .collect()
}

/// Date from `[section] key`, or `default` when the key is absent.
pub fn parse_date(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: &str,
) -> Result<NaiveDate, EtfHelperError> {
    let value = config
        .get_string(section, key)
        .unwrap_or_else(|| default.to_string());
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| {
        invalid(
            section,
            key,
            format!("invalid {} format, expected YYYY-MM-DD", key),
        )
    })
}

/// `[backtest] start_date` and `end_date` parse and `start_date < end_date`.
pub fn validate_date_range(config: &dyn ConfigPort) -> Result<(), EtfHelperError> {
    let start_date = parse_date(config, "backtest", "start_date", DEFAULT_START_DATE)?;
    let end_date = parse_date(config, "backtest", "end_date", DEFAULT_END_DATE)?;

    if start_date >= end_date {
        return Err(invalid(
            "backtest",
            "start_date",
            "start_date must be before end_date".to_string(),
        ));
    }
    Ok(())
}

fn validate_mode(config: &dyn ConfigPort) -> Result<(), EtfHelperError> {
    if let Some(mode) = config.get_string("backtest", "mode") {
        mode.parse::<PlanMode>()
            .map_err(|reason| invalid("backtest", "mode", reason))?;
    }
    Ok(())
}

fn validate_amount(config: &dyn ConfigPort) -> Result<(), EtfHelperError> {
    if let Some(raw) = config.get_string("backtest", "amount") {
        let amount: f64 = raw
            .trim()
            .parse()
            .map_err(|_| invalid("backtest", "amount", format!("'{raw}' is not a number")))?;
        if !amount.is_finite() || amount <= 0.0 {
            return Err(invalid(
                "backtest",
                "amount",
                "amount must be positive".to_string(),
            ));
        }
    }
    Ok(())
}

fn validate_join(config: &dyn ConfigPort) -> Result<(), EtfHelperError> {
    if let Some(join) = config.get_string("backtest", "join") {
        join.parse::<JoinPolicy>()
            .map_err(|reason| invalid("backtest", "join", reason))?;
    }
    Ok(())
}

fn require(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), EtfHelperError> {
    match config.get_string(section, key) {
        Some(s) if !s.trim().is_empty() => Ok(()),
        _ => Err(EtfHelperError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }),
    }
}

fn invalid(section: &str, key: &str, reason: String) -> EtfHelperError {
    EtfHelperError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason,
    }
}
