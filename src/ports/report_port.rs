//! Report generation port trait.

use crate::domain::backtest::BacktestResult;
use crate::domain::compare::RelativeSeries;
use crate::domain::error::EtfHelperError;

/// Port for writing backtest and comparison results.
pub trait ReportPort {
    fn write_backtest(
        &self,
        result: &BacktestResult,
        output_path: &str,
    ) -> Result<(), EtfHelperError>;

    fn write_comparison(
        &self,
        series: &[RelativeSeries],
        output_path: &str,
    ) -> Result<(), EtfHelperError>;
}
