//! Weighted portfolio price series.
//!
//! Each ticker's closes are scaled by its normalized weight and summed per
//! date. With [`JoinPolicy::ZeroFill`] a date missing from some series counts
//! those series as zero, so the combined curve dips at the edges when ranges
//! differ.

use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use super::error::EtfHelperError;
use super::portfolio::PortfolioSpec;
use super::price_series::{PricePoint, PriceSeries};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinPolicy {
    /// Union of dates, missing values contribute zero.
    #[default]
    ZeroFill,
    /// Only dates present in every contributing series.
    Intersection,
}

impl FromStr for JoinPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "zero_fill" | "outer" => Ok(JoinPolicy::ZeroFill),
            "intersection" | "inner" => Ok(JoinPolicy::Intersection),
            other => Err(format!(
                "unknown join '{other}' (expected zero_fill or intersection)"
            )),
        }
    }
}

impl fmt::Display for JoinPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinPolicy::ZeroFill => write!(f, "zero_fill"),
            JoinPolicy::Intersection => write!(f, "intersection"),
        }
    }
}

pub fn aggregate(
    portfolio: &PortfolioSpec,
    series_by_ticker: &HashMap<String, PriceSeries>,
) -> Result<PriceSeries, EtfHelperError> {
    aggregate_with(portfolio, series_by_ticker, JoinPolicy::ZeroFill)
}

pub fn aggregate_with(
    portfolio: &PortfolioSpec,
    series_by_ticker: &HashMap<String, PriceSeries>,
    join: JoinPolicy,
) -> Result<PriceSeries, EtfHelperError> {
    if let Some(missing) = portfolio
        .tickers()
        .find(|t| !series_by_ticker.contains_key(*t))
    {
        return Err(EtfHelperError::UnknownTicker {
            ticker: missing.to_string(),
        });
    }
    let weights = portfolio.normalized()?;

    let mut totals: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
    let mut contributing = 0usize;
    for (ticker, weight) in &weights {
        let series = &series_by_ticker[ticker];
        if *weight == 0.0 || series.is_empty() {
            continue;
        }
        contributing += 1;
        for point in series.scaled(*weight).points() {
            let entry = totals.entry(point.date).or_insert((0.0, 0));
            entry.0 += point.close;
            entry.1 += 1;
        }
    }

    let points = totals
        .into_iter()
        .filter(|(_, (_, seen))| join == JoinPolicy::ZeroFill || *seen == contributing)
        .map(|(date, (close, _))| PricePoint::new(date, close))
        .collect();
    PriceSeries::new(points)
}
