#![allow(dead_code)]

use chrono::NaiveDate;
use etfhelper::domain::error::EtfHelperError;
use etfhelper::domain::price_series::{PricePoint, PriceSeries};
use etfhelper::ports::data_port::PriceDataPort;
use std::cell::RefCell;
use std::collections::HashMap;
use std::process::ExitCode;

pub struct MockPriceDataPort {
    pub data: HashMap<String, PriceSeries>,
    pub errors: HashMap<String, String>,
    pub fetches: RefCell<Vec<String>>,
}

impl MockPriceDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
            fetches: RefCell::new(Vec::new()),
        }
    }

    pub fn with_series(mut self, ticker: &str, series: PriceSeries) -> Self {
        self.data.insert(ticker.to_string(), series);
        self
    }

    pub fn with_error(mut self, ticker: &str, reason: &str) -> Self {
        self.errors.insert(ticker.to_string(), reason.to_string());
        self
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.borrow().len()
    }
}

impl PriceDataPort for MockPriceDataPort {
    fn fetch(
        &self,
        ticker: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<PriceSeries, EtfHelperError> {
        self.fetches.borrow_mut().push(ticker.to_string());
        if let Some(reason) = self.errors.get(ticker) {
            return Err(EtfHelperError::DataSource {
                reason: reason.clone(),
            });
        }
        Ok(self
            .data
            .get(ticker)
            .map(|s| s.between(start_date, end_date))
            .unwrap_or_else(PriceSeries::empty))
    }

    fn list_tickers(&self) -> Result<Vec<String>, EtfHelperError> {
        let mut tickers: Vec<String> = self.data.keys().cloned().collect();
        tickers.sort();
        Ok(tickers)
    }
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

pub fn series(points: &[(NaiveDate, f64)]) -> PriceSeries {
    PriceSeries::new(
        points
            .iter()
            .map(|(d, c)| PricePoint::new(*d, *c))
            .collect(),
    )
    .unwrap()
}

/// Monthly closes on the first of each month, growing by `growth` per month.
pub fn generate_monthly(start: NaiveDate, months: u32, start_price: f64, growth: f64) -> PriceSeries {
    let points = (0..months)
        .map(|i| {
            let d = start
                .checked_add_months(chrono::Months::new(i))
                .unwrap();
            PricePoint::new(d, start_price * growth.powi(i as i32))
        })
        .collect();
    PriceSeries::new(points).unwrap()
}

/// Daily closes rising by one per day.
pub fn generate_daily(start_date: &str, count: usize, start_price: f64) -> PriceSeries {
    let start = NaiveDate::parse_from_str(start_date, "%Y-%m-%d").unwrap();
    let points = (0..count)
        .map(|i| PricePoint::new(start + chrono::Duration::days(i as i64), start_price + i as f64))
        .collect();
    PriceSeries::new(points).unwrap()
}

/// The three-month example: closes 100, 110, 121 on the first of Jan-Mar 2020.
pub fn example_series() -> PriceSeries {
    series(&[
        (date(2020, 1, 1), 100.0),
        (date(2020, 2, 1), 110.0),
        (date(2020, 3, 1), 121.0),
    ])
}

pub fn is_success(code: ExitCode) -> bool {
    format!("{code:?}") == format!("{:?}", ExitCode::SUCCESS)
}

pub fn same_code(code: ExitCode, expected: u8) -> bool {
    format!("{code:?}") == format!("{:?}", ExitCode::from(expected))
}
