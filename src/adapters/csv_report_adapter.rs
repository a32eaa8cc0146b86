//! CSV report adapter for backtest schedules and comparisons.

use crate::domain::backtest::{BacktestResult, LumpSumOutcome, RecurringOutcome};
use crate::domain::compare::RelativeSeries;
use crate::domain::error::EtfHelperError;
use crate::ports::report_port::ReportPort;
use std::io::Write;

pub struct CsvReportAdapter;

fn csv_error(e: csv::Error) -> EtfHelperError {
    let reason = e.to_string();
    match e.into_kind() {
        csv::ErrorKind::Io(io) => EtfHelperError::Io(io),
        _ => EtfHelperError::Report { reason },
    }
}

impl CsvReportAdapter {
    pub fn write_recurring<W: Write>(
        outcome: &RecurringOutcome,
        out: W,
    ) -> Result<(), EtfHelperError> {
        let mut wtr = csv::Writer::from_writer(out);
        wtr.write_record([
            "date",
            "price_date",
            "close",
            "units_bought",
            "total_contributed",
            "total_units",
            "total_value",
            "return_pct",
        ])
        .map_err(csv_error)?;

        for row in &outcome.schedule {
            wtr.write_record([
                row.date.to_string(),
                row.price_date.to_string(),
                format!("{:.4}", row.execution_price),
                format!("{:.6}", row.units_bought),
                format!("{:.2}", row.total_contributed),
                format!("{:.6}", row.total_units),
                format!("{:.2}", row.total_value),
                format!("{:.2}", row.cumulative_return_pct),
            ])
            .map_err(csv_error)?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn write_lump_sum<W: Write>(
        outcome: &LumpSumOutcome,
        out: W,
    ) -> Result<(), EtfHelperError> {
        let mut wtr = csv::Writer::from_writer(out);
        wtr.write_record(["event", "date", "close", "units", "value"])
            .map_err(csv_error)?;
        wtr.write_record([
            "purchase".to_string(),
            outcome.purchase.date.to_string(),
            format!("{:.4}", outcome.purchase.close),
            format!("{:.6}", outcome.units),
            format!("{:.2}", outcome.amount),
        ])
        .map_err(csv_error)?;
        wtr.write_record([
            "valuation".to_string(),
            outcome.valuation.date.to_string(),
            format!("{:.4}", outcome.valuation.close),
            format!("{:.6}", outcome.units),
            format!("{:.2}", outcome.final_value),
        ])
        .map_err(csv_error)?;
        wtr.flush()?;
        Ok(())
    }

    pub fn write_relative<W: Write>(
        series: &[RelativeSeries],
        out: W,
    ) -> Result<(), EtfHelperError> {
        let mut wtr = csv::Writer::from_writer(out);
        wtr.write_record(["ticker", "date", "relative_close"])
            .map_err(csv_error)?;
        for rel in series {
            for point in &rel.points {
                wtr.write_record([
                    rel.ticker.clone(),
                    point.date.to_string(),
                    format!("{:.6}", point.close),
                ])
                .map_err(csv_error)?;
            }
        }
        wtr.flush()?;
        Ok(())
    }
}

impl ReportPort for CsvReportAdapter {
    fn write_backtest(
        &self,
        result: &BacktestResult,
        output_path: &str,
    ) -> Result<(), EtfHelperError> {
        let file = std::fs::File::create(output_path)?;
        match result {
            BacktestResult::LumpSum(o) => Self::write_lump_sum(o, file),
            BacktestResult::Recurring(o) => Self::write_recurring(o, file),
        }
    }

    fn write_comparison(
        &self,
        series: &[RelativeSeries],
        output_path: &str,
    ) -> Result<(), EtfHelperError> {
        let file = std::fs::File::create(output_path)?;
        Self::write_relative(series, file)
    }
}
