//! Price data access port trait.

use crate::domain::error::EtfHelperError;
use crate::domain::price_series::PriceSeries;
use chrono::NaiveDate;

pub trait PriceDataPort {
    /// Daily closes for `ticker` within `[start_date, end_date]`.
    ///
    /// An unknown ticker or a range outside its history yields an empty
    /// series. `Err` is reserved for the source itself failing.
    fn fetch(
        &self,
        ticker: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<PriceSeries, EtfHelperError>;

    fn list_tickers(&self) -> Result<Vec<String>, EtfHelperError>;
}

impl<T: PriceDataPort + ?Sized> PriceDataPort for Box<T> {
    fn fetch(
        &self,
        ticker: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<PriceSeries, EtfHelperError> {
        (**self).fetch(ticker, start_date, end_date)
    }

    fn list_tickers(&self) -> Result<Vec<String>, EtfHelperError> {
        (**self).list_tickers()
    }
}
