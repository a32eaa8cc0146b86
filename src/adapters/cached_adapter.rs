//! Memoizing decorator over any [`PriceDataPort`].
//!
//! A single CLI command fetches each (ticker, start, end) at most once, so
//! hits come from library callers that run several backtests or lookups
//! against one port over the same window, such as comparing plans.

use crate::domain::error::EtfHelperError;
use crate::domain::price_series::PriceSeries;
use crate::ports::data_port::PriceDataPort;
use chrono::NaiveDate;
use log::debug;
use std::cell::RefCell;
use std::collections::HashMap;

type CacheKey = (String, NaiveDate, NaiveDate);

/// Caches successful fetches by (ticker, start, end). Errors are not cached.
pub struct CachedDataPort<P> {
    inner: P,
    cache: RefCell<HashMap<CacheKey, PriceSeries>>,
}

impl<P: PriceDataPort> CachedDataPort<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            cache: RefCell::new(HashMap::new()),
        }
    }

    pub fn cached_entries(&self) -> usize {
        self.cache.borrow().len()
    }

    pub fn clear(&self) {
        self.cache.borrow_mut().clear();
    }

    pub fn into_inner(self) -> P {
        self.inner
    }
}

impl<P: PriceDataPort> PriceDataPort for CachedDataPort<P> {
    fn fetch(
        &self,
        ticker: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<PriceSeries, EtfHelperError> {
        let key = (ticker.to_uppercase(), start_date, end_date);
        if let Some(series) = self.cache.borrow().get(&key) {
            debug!("cache hit for {} {}..{}", key.0, start_date, end_date);
            return Ok(series.clone());
        }

        let series = self.inner.fetch(ticker, start_date, end_date)?;
        self.cache.borrow_mut().insert(key, series.clone());
        Ok(series)
    }

    fn list_tickers(&self) -> Result<Vec<String>, EtfHelperError> {
        self.inner.list_tickers()
    }
}
