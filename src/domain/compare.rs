//! Relative performance of several tickers over the same range.

use chrono::NaiveDate;
use log::warn;
use std::collections::HashMap;

use super::error::EtfHelperError;
use super::price_series::{PricePoint, PriceSeries};

#[derive(Debug, Clone, PartialEq)]
pub struct RelativeSeries {
    pub ticker: String,
    /// First trading day at or after the requested start.
    pub base_date: NaiveDate,
    pub base_close: f64,
    /// `close / base_close` for each point from `base_date` onward.
    pub points: Vec<PricePoint>,
}

impl RelativeSeries {
    pub fn final_ratio(&self) -> Option<f64> {
        self.points.last().map(|p| p.close)
    }

    pub fn return_pct(&self) -> Option<f64> {
        self.final_ratio().map(|r| (r - 1.0) * 100.0)
    }
}

/// Normalizes each ticker's series to 1.0 at its first close on or after
/// `start`. Tickers with no data from `start` onward are left out.
pub fn relative_performance(
    series_by_ticker: &HashMap<String, PriceSeries>,
    start: NaiveDate,
) -> Result<Vec<RelativeSeries>, EtfHelperError> {
    let mut tickers: Vec<&String> = series_by_ticker.keys().collect();
    tickers.sort();

    let mut out = Vec::with_capacity(tickers.len());
    for ticker in tickers {
        let series = &series_by_ticker[ticker];
        let Some(base) = series.first_on_or_after(start) else {
            warn!("{ticker}: no data on or after {start}, left out of comparison");
            continue;
        };
        if !base.is_tradable() {
            return Err(EtfHelperError::MissingPriceData { date: base.date });
        }
        let base = *base;
        let points = series
            .points()
            .iter()
            .filter(|p| p.date >= base.date)
            .map(|p| PricePoint::new(p.date, p.close / base.close))
            .collect();
        out.push(RelativeSeries {
            ticker: ticker.clone(),
            base_date: base.date,
            base_close: base.close,
            points,
        });
    }
    Ok(out)
}
