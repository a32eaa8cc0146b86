//! Domain error types.

use chrono::NaiveDate;

/// Top-level error type for etfhelper.
#[derive(Debug, thiserror::Error)]
pub enum EtfHelperError {
    #[error("price series is empty")]
    EmptySeries,

    #[error("invalid investment amount {amount}: must be positive")]
    InvalidAmount { amount: f64 },

    #[error("no usable price on or before {date}")]
    MissingPriceData { date: NaiveDate },

    #[error("no price series for ticker {ticker}")]
    UnknownTicker { ticker: String },

    #[error("portfolio has no positive weight")]
    EmptyPortfolio,

    #[error("invalid weight {weight} for {ticker}: must be between 0 and 100")]
    InvalidWeight { ticker: String, weight: f64 },

    #[error("price series out of order at {date}")]
    UnorderedSeries { date: NaiveDate },

    #[error("invalid window: {start} is after {end}")]
    InvalidWindow { start: NaiveDate, end: NaiveDate },

    #[error("portfolio {name} already exists")]
    DuplicatePortfolio { name: String },

    #[error("unknown portfolio {name}")]
    UnknownPortfolio { name: String },

    #[error("data source error: {reason}")]
    DataSource { reason: String },

    #[error("data query error: {reason}")]
    DataQuery { reason: String },

    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("report write error: {reason}")]
    Report { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<&EtfHelperError> for std::process::ExitCode {
    fn from(err: &EtfHelperError) -> Self {
        let code: u8 = match err {
            EtfHelperError::Io(_) | EtfHelperError::Report { .. } => 1,
            EtfHelperError::ConfigParse { .. }
            | EtfHelperError::ConfigMissing { .. }
            | EtfHelperError::ConfigInvalid { .. } => 2,
            EtfHelperError::DataSource { .. } | EtfHelperError::DataQuery { .. } => 3,
            EtfHelperError::UnknownTicker { .. }
            | EtfHelperError::EmptyPortfolio
            | EtfHelperError::InvalidWeight { .. }
            | EtfHelperError::DuplicatePortfolio { .. }
            | EtfHelperError::UnknownPortfolio { .. } => 4,
            EtfHelperError::EmptySeries
            | EtfHelperError::InvalidAmount { .. }
            | EtfHelperError::MissingPriceData { .. }
            | EtfHelperError::UnorderedSeries { .. }
            | EtfHelperError::InvalidWindow { .. } => 5,
        };
        std::process::ExitCode::from(code)
    }
}
