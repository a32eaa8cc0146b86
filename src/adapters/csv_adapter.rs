//! CSV directory price adapter.
//!
//! Each ticker lives in `<base_path>/<TICKER>.csv` with a header row. The
//! `date` and `close` columns are found by name, so both `date,close` files
//! and full `date,open,high,low,close,...` exports load.

use crate::domain::error::EtfHelperError;
use crate::domain::price_series::{PricePoint, PriceSeries};
use crate::ports::data_port::PriceDataPort;
use chrono::NaiveDate;
use log::{debug, warn};
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

pub struct CsvPriceAdapter {
    base_path: PathBuf,
}

impl CsvPriceAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, ticker: &str) -> PathBuf {
        self.base_path.join(format!("{}.csv", ticker.to_uppercase()))
    }

    fn column(headers: &csv::StringRecord, name: &str) -> Option<usize> {
        headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
    }
}

impl PriceDataPort for CsvPriceAdapter {
    fn fetch(
        &self,
        ticker: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<PriceSeries, EtfHelperError> {
        let path = self.csv_path(ticker);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!("{}: no file at {}", ticker, path.display());
                return Ok(PriceSeries::empty());
            }
            Err(e) => {
                return Err(EtfHelperError::DataSource {
                    reason: format!("failed to read {}: {}", path.display(), e),
                });
            }
        };

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let headers = rdr
            .headers()
            .map_err(|e| EtfHelperError::DataSource {
                reason: format!("CSV header error in {}: {}", path.display(), e),
            })?
            .clone();
        let date_col = Self::column(&headers, "date").ok_or_else(|| EtfHelperError::DataSource {
            reason: format!("missing date column in {}", path.display()),
        })?;
        let close_col =
            Self::column(&headers, "close").ok_or_else(|| EtfHelperError::DataSource {
                reason: format!("missing close column in {}", path.display()),
            })?;

        let mut points = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| EtfHelperError::DataSource {
                reason: format!("CSV parse error: {}", e),
            })?;

            let date_str = record.get(date_col).unwrap_or_default().trim();
            let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").map_err(|e| {
                EtfHelperError::DataSource {
                    reason: format!("invalid date '{}': {}", date_str, e),
                }
            })?;
            if date < start_date || date > end_date {
                continue;
            }

            let close_str = record.get(close_col).unwrap_or_default().trim();
            if close_str.is_empty() || close_str.eq_ignore_ascii_case("null") {
                warn!("{}: no close on {}, row ignored", ticker, date);
                continue;
            }
            let close: f64 = close_str.parse().map_err(|e| EtfHelperError::DataSource {
                reason: format!("invalid close value '{}': {}", close_str, e),
            })?;

            points.push(PricePoint::new(date, close));
        }

        PriceSeries::from_unsorted(points)
    }

    fn list_tickers(&self) -> Result<Vec<String>, EtfHelperError> {
        let entries = fs::read_dir(&self.base_path).map_err(|e| EtfHelperError::DataSource {
            reason: format!(
                "failed to read directory {}: {}",
                self.base_path.display(),
                e
            ),
        })?;

        let mut tickers = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| EtfHelperError::DataSource {
                reason: format!("directory entry error: {}", e),
            })?;

            let name = entry.file_name();
            let name_str = name.to_string_lossy();
            if let Some(ticker) = name_str.strip_suffix(".csv") {
                tickers.push(ticker.to_uppercase());
            }
        }

        tickers.sort();
        Ok(tickers)
    }
}
