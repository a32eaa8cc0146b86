//! SQLite price store adapter.

use crate::domain::error::EtfHelperError;
use crate::domain::price_series::{PricePoint, PriceSeries};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::PriceDataPort;
use chrono::NaiveDate;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;

pub struct SqlitePriceAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn pool_error(e: r2d2::Error) -> EtfHelperError {
    EtfHelperError::DataSource {
        reason: e.to_string(),
    }
}

fn query_error(e: rusqlite::Error) -> EtfHelperError {
    EtfHelperError::DataQuery {
        reason: e.to_string(),
    }
}

impl SqlitePriceAdapter {
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, EtfHelperError> {
        let db_path =
            config
                .get_string("sqlite", "path")
                .ok_or_else(|| EtfHelperError::ConfigMissing {
                    section: "sqlite".into(),
                    key: "path".into(),
                })?;

        let pool_size = config.get_int("sqlite", "pool_size", 4).max(1) as u32;

        let manager = SqliteConnectionManager::file(&db_path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(pool_error)?;

        Ok(Self { pool })
    }

    pub fn in_memory() -> Result<Self, EtfHelperError> {
        let manager = SqliteConnectionManager::memory();
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(pool_error)?;

        Ok(Self { pool })
    }

    pub fn initialize_schema(&self) -> Result<(), EtfHelperError> {
        let conn = self.pool.get().map_err(pool_error)?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS prices (
                ticker TEXT NOT NULL,
                date TEXT NOT NULL,
                close REAL NOT NULL,
                PRIMARY KEY (ticker, date)
            );
            CREATE INDEX IF NOT EXISTS idx_prices_date ON prices(date);",
        )
        .map_err(query_error)?;

        Ok(())
    }

    pub fn insert_series(&self, ticker: &str, series: &PriceSeries) -> Result<(), EtfHelperError> {
        let mut conn = self.pool.get().map_err(pool_error)?;
        let tx = conn.transaction().map_err(query_error)?;

        for point in series.points() {
            tx.execute(
                "INSERT OR REPLACE INTO prices (ticker, date, close) VALUES (?1, ?2, ?3)",
                params![
                    ticker.to_uppercase(),
                    point.date.format("%Y-%m-%d").to_string(),
                    point.close
                ],
            )
            .map_err(query_error)?;
        }

        tx.commit().map_err(query_error)?;
        Ok(())
    }
}

impl PriceDataPort for SqlitePriceAdapter {
    fn fetch(
        &self,
        ticker: &str,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> Result<PriceSeries, EtfHelperError> {
        let conn = self.pool.get().map_err(pool_error)?;

        let start_str = start_date.format("%Y-%m-%d").to_string();
        let end_str = end_date.format("%Y-%m-%d").to_string();

        let query = "SELECT date, close
                     FROM prices
                     WHERE ticker = ?1 AND date >= ?2 AND date <= ?3
                     ORDER BY date ASC";

        let mut stmt = conn.prepare(query).map_err(query_error)?;

        let rows = stmt
            .query_map(params![ticker.to_uppercase(), start_str, end_str], |row| {
                let date_str: String = row.get(0)?;
                let date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").map_err(|e| {
                    rusqlite::Error::FromSqlConversionFailure(
                        0,
                        rusqlite::types::Type::Text,
                        Box::new(e),
                    )
                })?;
                Ok(PricePoint::new(date, row.get(1)?))
            })
            .map_err(query_error)?;

        let mut points = Vec::new();
        for row in rows {
            points.push(row.map_err(query_error)?);
        }

        PriceSeries::new(points)
    }

    fn list_tickers(&self) -> Result<Vec<String>, EtfHelperError> {
        let conn = self.pool.get().map_err(pool_error)?;

        let mut stmt = conn
            .prepare("SELECT DISTINCT ticker FROM prices ORDER BY ticker")
            .map_err(query_error)?;

        let rows = stmt
            .query_map([], |row| row.get(0))
            .map_err(query_error)?;

        let mut tickers = Vec::new();
        for row in rows {
            tickers.push(row.map_err(query_error)?);
        }

        Ok(tickers)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EmptyConfig;

    impl ConfigPort for EmptyConfig {
        fn get_string(&self, _section: &str, _key: &str) -> Option<String> {
            None
        }
        fn get_int(&self, _section: &str, _key: &str, default: i64) -> i64 {
            default
        }
        fn get_double(&self, _section: &str, _key: &str, default: f64) -> f64 {
            default
        }
        fn get_bool(&self, _section: &str, _key: &str, default: bool) -> bool {
            default
        }
        fn sections(&self) -> Vec<String> {
            Vec::new()
        }
        fn keys(&self, _section: &str) -> Vec<String> {
            Vec::new()
        }
    }

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn seeded() -> SqlitePriceAdapter {
        let adapter = SqlitePriceAdapter::in_memory().unwrap();
        adapter.initialize_schema().unwrap();
        let spy = PriceSeries::new(vec![
            PricePoint::new(d(2024, 1, 2), 470.0),
            PricePoint::new(d(2024, 1, 3), 468.5),
            PricePoint::new(d(2024, 1, 4), 467.0),
        ])
        .unwrap();
        let bnd = PriceSeries::new(vec![PricePoint::new(d(2024, 1, 2), 72.0)]).unwrap();
        adapter.insert_series("SPY", &spy).unwrap();
        adapter.insert_series("bnd", &bnd).unwrap();
        adapter
    }

    #[test]
    fn from_config_missing_path() {
        match SqlitePriceAdapter::from_config(&EmptyConfig) {
            Err(EtfHelperError::ConfigMissing { section, key }) => {
                assert_eq!(section, "sqlite");
                assert_eq!(key, "path");
            }
            Err(other) => panic!("expected ConfigMissing, got: {other}"),
            Ok(_) => panic!("expected error, got Ok"),
        }
    }

    #[test]
    fn fetch_returns_range() {
        let adapter = seeded();
        let series = adapter.fetch("SPY", d(2024, 1, 3), d(2024, 1, 4)).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series.first().unwrap().close, 468.5);
    }

    #[test]
    fn fetch_unknown_ticker_is_empty() {
        let adapter = seeded();
        let series = adapter.fetch("VTI", d(2024, 1, 1), d(2024, 1, 31)).unwrap();
        assert!(series.is_empty());
    }

    #[test]
    fn list_tickers_uppercased_and_sorted() {
        let adapter = seeded();
        assert_eq!(adapter.list_tickers().unwrap(), vec!["BND", "SPY"]);
    }

    #[test]
    fn fetch_without_schema_is_query_error() {
        let adapter = SqlitePriceAdapter::in_memory().unwrap();
        let result = adapter.fetch("SPY", d(2024, 1, 1), d(2024, 1, 31));
        assert!(matches!(result, Err(EtfHelperError::DataQuery { .. })));
    }
}
