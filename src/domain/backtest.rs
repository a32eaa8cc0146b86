//! Backtest engine for lump-sum and monthly contribution plans.
//!
//! Recurring plans contribute once per calendar month. The first contribution
//! lands on the schedule start, later ones on the first day of each month.
//! Each contribution executes at the latest close at or before its date.

use chrono::{Datelike, Duration, Months, NaiveDate};
use log::{debug, warn};

use super::aggregate::JoinPolicy;
use super::error::EtfHelperError;
use super::plan::InvestmentPlan;
use super::price_series::{PricePoint, PriceSeries};

/// What a backtest runs against.
#[derive(Debug, Clone, PartialEq)]
pub enum Target {
    Ticker(String),
    Portfolio(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestConfig {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub target: Target,
    pub plan: InvestmentPlan,
    pub join: JoinPolicy,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LumpSumOutcome {
    pub amount: f64,
    pub units: f64,
    pub purchase: PricePoint,
    pub valuation: PricePoint,
    pub final_value: f64,
    /// `price[last] / price[0]`
    pub multiplier: f64,
    pub return_pct: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScheduleRow {
    /// Nominal contribution date.
    pub date: NaiveDate,
    /// Trading day whose close was used.
    pub price_date: NaiveDate,
    pub execution_price: f64,
    pub units_bought: f64,
    pub total_contributed: f64,
    pub total_units: f64,
    pub total_value: f64,
    pub cumulative_return_pct: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    BeforeFirstPrice,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedContribution {
    pub date: NaiveDate,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecurringOutcome {
    pub amount_per_period: f64,
    pub schedule: Vec<ScheduleRow>,
    pub skipped: Vec<SkippedContribution>,
}

impl RecurringOutcome {
    pub fn final_row(&self) -> Option<&ScheduleRow> {
        self.schedule.last()
    }

    pub fn months(&self) -> usize {
        self.schedule.len()
    }

    pub fn final_value(&self) -> f64 {
        self.final_row().map(|r| r.total_value).unwrap_or(0.0)
    }

    pub fn total_contributed(&self) -> f64 {
        self.final_row().map(|r| r.total_contributed).unwrap_or(0.0)
    }

    pub fn return_pct(&self) -> f64 {
        self.final_row()
            .map(|r| r.cumulative_return_pct)
            .unwrap_or(0.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum BacktestResult {
    LumpSum(LumpSumOutcome),
    Recurring(RecurringOutcome),
}

impl BacktestResult {
    pub fn final_value(&self) -> f64 {
        match self {
            BacktestResult::LumpSum(o) => o.final_value,
            BacktestResult::Recurring(o) => o.final_value(),
        }
    }

    pub fn total_contributed(&self) -> f64 {
        match self {
            BacktestResult::LumpSum(o) => o.amount,
            BacktestResult::Recurring(o) => o.total_contributed(),
        }
    }

    pub fn return_pct(&self) -> f64 {
        match self {
            BacktestResult::LumpSum(o) => o.return_pct,
            BacktestResult::Recurring(o) => o.return_pct(),
        }
    }
}

/// Runs `plan` over the whole of `prices`.
pub fn run(prices: &PriceSeries, plan: &InvestmentPlan) -> Result<BacktestResult, EtfHelperError> {
    let (start, end) = prices.date_range().ok_or(EtfHelperError::EmptySeries)?;
    run_window(prices, plan, start, end)
}

/// Runs `plan` over `[start, end]`. A recurring contribution dated before the
/// first available close executes at that close when it falls in the same
/// month. Months that end before the first close are skipped and reported in
/// [`RecurringOutcome::skipped`].
pub fn run_window(
    prices: &PriceSeries,
    plan: &InvestmentPlan,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<BacktestResult, EtfHelperError> {
    if prices.is_empty() {
        return Err(EtfHelperError::EmptySeries);
    }
    plan.validate()?;
    if start > end {
        return Err(EtfHelperError::InvalidWindow { start, end });
    }

    match *plan {
        InvestmentPlan::LumpSum { amount } => {
            run_lump_sum(&prices.between(start, end), amount).map(BacktestResult::LumpSum)
        }
        InvestmentPlan::Recurring {
            amount_per_period, ..
        } => run_recurring(prices, amount_per_period, start, end).map(BacktestResult::Recurring),
    }
}

fn run_lump_sum(prices: &PriceSeries, amount: f64) -> Result<LumpSumOutcome, EtfHelperError> {
    let (purchase, valuation) = match (prices.first(), prices.last()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => return Err(EtfHelperError::EmptySeries),
    };
    for point in [purchase, valuation] {
        if !point.is_tradable() {
            return Err(EtfHelperError::MissingPriceData { date: point.date });
        }
    }

    let units = amount / purchase.close;
    let multiplier = valuation.close / purchase.close;
    Ok(LumpSumOutcome {
        amount,
        units,
        purchase,
        valuation,
        final_value: units * valuation.close,
        multiplier,
        return_pct: (multiplier - 1.0) * 100.0,
    })
}

fn run_recurring(
    prices: &PriceSeries,
    amount: f64,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<RecurringOutcome, EtfHelperError> {
    let dates = contribution_dates(start, end);
    let mut schedule: Vec<ScheduleRow> = Vec::with_capacity(dates.len());
    let mut skipped = Vec::new();
    let mut total_units = 0.0_f64;

    for date in dates {
        let Some(point) = execution_point(prices, date, end) else {
            warn!("skipping contribution on {date}: no price data in its month yet");
            skipped.push(SkippedContribution {
                date,
                reason: SkipReason::BeforeFirstPrice,
            });
            continue;
        };
        if !point.is_tradable() {
            return Err(EtfHelperError::MissingPriceData { date });
        }

        let units_bought = amount / point.close;
        total_units += units_bought;
        let total_contributed = amount * (schedule.len() + 1) as f64;
        let total_value = total_units * point.close;

        schedule.push(ScheduleRow {
            date,
            price_date: point.date,
            execution_price: point.close,
            units_bought,
            total_contributed,
            total_units,
            total_value,
            cumulative_return_pct: (total_value / total_contributed - 1.0) * 100.0,
        });
    }

    if schedule.is_empty() {
        return Err(EtfHelperError::MissingPriceData { date: start });
    }

    debug!(
        "recurring backtest: {} contributions, {} skipped",
        schedule.len(),
        skipped.len()
    );

    Ok(RecurringOutcome {
        amount_per_period: amount,
        schedule,
        skipped,
    })
}

/// Latest close at or before `date`. A date before the first close falls
/// back to the first close when that close lies in the same calendar month
/// and no later than `end`.
fn execution_point(prices: &PriceSeries, date: NaiveDate, end: NaiveDate) -> Option<&PricePoint> {
    prices.at_or_before(date).or_else(|| {
        prices.first_on_or_after(date).filter(|p| {
            p.date <= end && p.date.year() == date.year() && p.date.month() == date.month()
        })
    })
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.day0()))
}

/// One date per calendar month from `start`'s month to `end`'s month
/// inclusive: `start` itself, then the first of each following month.
pub fn contribution_dates(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    if start > end {
        return Vec::new();
    }
    let last = first_of_month(end);
    let mut dates = vec![start];
    let mut month = first_of_month(start);
    while let Some(next) = month.checked_add_months(Months::new(1)) {
        if next > last {
            break;
        }
        dates.push(next);
        month = next;
    }
    dates
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn series(points: &[(NaiveDate, f64)]) -> PriceSeries {
        PriceSeries::new(
            points
                .iter()
                .map(|&(date, close)| PricePoint::new(date, close))
                .collect(),
        )
        .unwrap()
    }

    fn three_months() -> PriceSeries {
        series(&[
            (d(2020, 1, 1), 100.0),
            (d(2020, 2, 1), 110.0),
            (d(2020, 3, 1), 121.0),
        ])
    }

    fn recurring(result: BacktestResult) -> RecurringOutcome {
        match result {
            BacktestResult::Recurring(o) => o,
            other => panic!("expected recurring outcome, got {other:?}"),
        }
    }

    fn lump(result: BacktestResult) -> LumpSumOutcome {
        match result {
            BacktestResult::LumpSum(o) => o,
            other => panic!("expected lump-sum outcome, got {other:?}"),
        }
    }

    #[test]
    fn empty_series_fails() {
        let err = run(&PriceSeries::empty(), &InvestmentPlan::lump_sum(100.0)).unwrap_err();
        assert!(matches!(err, EtfHelperError::EmptySeries));
    }

    #[test]
    fn non_positive_amount_fails() {
        let err = run(&three_months(), &InvestmentPlan::monthly(0.0)).unwrap_err();
        assert!(matches!(err, EtfHelperError::InvalidAmount { .. }));
    }

    #[test]
    fn lump_sum_ratio() {
        let o = lump(run(&three_months(), &InvestmentPlan::lump_sum(1000.0)).unwrap());
        assert_relative_eq!(o.units, 10.0);
        assert_relative_eq!(o.final_value, 1210.0);
        assert_relative_eq!(o.multiplier, 1.21);
        assert_relative_eq!(o.return_pct, 21.0, epsilon = 1e-9);
        assert_eq!(o.purchase.date, d(2020, 1, 1));
        assert_eq!(o.valuation.date, d(2020, 3, 1));
    }

    #[test]
    fn lump_sum_single_point_is_flat() {
        let o = lump(
            run(&series(&[(d(2021, 5, 3), 42.0)]), &InvestmentPlan::lump_sum(84.0)).unwrap(),
        );
        assert_relative_eq!(o.final_value, 84.0);
        assert_relative_eq!(o.return_pct, 0.0);
    }

    #[test]
    fn lump_sum_zero_first_price_is_missing_data() {
        let prices = series(&[(d(2020, 1, 1), 0.0), (d(2020, 1, 2), 10.0)]);
        let err = run(&prices, &InvestmentPlan::lump_sum(10.0)).unwrap_err();
        assert!(matches!(err, EtfHelperError::MissingPriceData { date } if date == d(2020, 1, 1)));
    }

    #[test]
    fn recurring_three_month_example() {
        let o = recurring(run(&three_months(), &InvestmentPlan::monthly(100.0)).unwrap());
        assert_eq!(o.schedule.len(), 3);

        let r1 = &o.schedule[0];
        assert_relative_eq!(r1.total_units, 1.0);
        assert_relative_eq!(r1.total_contributed, 100.0);
        assert_relative_eq!(r1.total_value, 100.0);
        assert_relative_eq!(r1.cumulative_return_pct, 0.0);

        let r2 = &o.schedule[1];
        assert_relative_eq!(r2.total_units, 1.0 + 100.0 / 110.0);
        assert_relative_eq!(r2.total_contributed, 200.0);
        assert_relative_eq!(r2.total_value, 210.0, epsilon = 1e-9);
        assert_relative_eq!(r2.cumulative_return_pct, 5.0, epsilon = 1e-9);

        let r3 = &o.schedule[2];
        assert_relative_eq!(r3.total_units, 2.7355, epsilon = 1e-4);
        assert_relative_eq!(r3.total_contributed, 300.0);
        assert_relative_eq!(r3.total_value, 331.0, epsilon = 1e-9);
        assert!((r3.cumulative_return_pct - 10.33).abs() < 0.005);

        assert_relative_eq!(o.final_value(), 331.0, epsilon = 1e-9);
        assert_relative_eq!(o.total_contributed(), 300.0);
    }

    #[test]
    fn recurring_forward_fills_non_trading_days() {
        // 2022-05-01 is a Sunday; the Friday before is used.
        let prices = series(&[
            (d(2022, 4, 1), 50.0),
            (d(2022, 4, 29), 40.0),
            (d(2022, 5, 2), 60.0),
        ]);
        let o = recurring(run(&prices, &InvestmentPlan::monthly(40.0)).unwrap());
        assert_eq!(o.schedule.len(), 2);
        assert_eq!(o.schedule[1].date, d(2022, 5, 1));
        assert_eq!(o.schedule[1].price_date, d(2022, 4, 29));
        assert_relative_eq!(o.schedule[1].execution_price, 40.0);
        assert_relative_eq!(o.schedule[1].units_bought, 1.0);
    }

    #[test]
    fn recurring_within_one_month_has_one_contribution() {
        let prices = series(&[(d(2023, 6, 12), 10.0), (d(2023, 6, 20), 12.0)]);
        let o = recurring(run(&prices, &InvestmentPlan::monthly(10.0)).unwrap());
        assert_eq!(o.schedule.len(), 1);
        assert_eq!(o.schedule[0].date, d(2023, 6, 12));
    }

    #[test]
    fn recurring_mid_month_start_uses_first_trading_day() {
        let prices = series(&[(d(2023, 1, 16), 20.0), (d(2023, 2, 1), 25.0)]);
        let o = recurring(run(&prices, &InvestmentPlan::monthly(100.0)).unwrap());
        assert_eq!(o.schedule.len(), 2);
        assert_relative_eq!(o.schedule[0].units_bought, 5.0);
        assert!(o.skipped.is_empty());
    }

    #[test]
    fn recurring_invalid_mid_series_price_is_missing_data() {
        let prices = series(&[
            (d(2020, 1, 1), 100.0),
            (d(2020, 2, 1), f64::NAN),
            (d(2020, 3, 1), 121.0),
        ]);
        let err = run(&prices, &InvestmentPlan::monthly(100.0)).unwrap_err();
        assert!(matches!(err, EtfHelperError::MissingPriceData { date } if date == d(2020, 2, 1)));
    }

    #[test]
    fn window_before_data_skips_early_months() {
        let prices = series(&[(d(2020, 3, 2), 10.0), (d(2020, 4, 1), 20.0)]);
        let o = recurring(
            run_window(
                &prices,
                &InvestmentPlan::monthly(10.0),
                d(2020, 1, 1),
                d(2020, 4, 30),
            )
            .unwrap(),
        );
        let skipped: Vec<NaiveDate> = o.skipped.iter().map(|s| s.date).collect();
        assert_eq!(skipped, vec![d(2020, 1, 1), d(2020, 2, 1)]);
        assert_eq!(o.skipped[1].reason, SkipReason::BeforeFirstPrice);
        assert_eq!(o.schedule.len(), 2);
        assert_eq!(o.schedule[0].date, d(2020, 3, 1));
        assert_eq!(o.schedule[0].price_date, d(2020, 3, 2));
        assert_relative_eq!(o.schedule[0].units_bought, 1.0);
        assert_eq!(o.schedule[1].date, d(2020, 4, 1));
        assert_relative_eq!(o.schedule[1].units_bought, 0.5);
        // Rows only count executed contributions.
        assert_relative_eq!(o.total_contributed(), 20.0);
    }

    #[test]
    fn window_starting_on_holiday_uses_first_close_of_month() {
        let prices = series(&[
            (d(2010, 1, 4), 100.0),
            (d(2010, 2, 1), 100.0),
            (d(2010, 3, 1), 100.0),
        ]);
        let o = recurring(
            run_window(
                &prices,
                &InvestmentPlan::monthly(100.0),
                d(2010, 1, 1),
                d(2010, 3, 31),
            )
            .unwrap(),
        );
        assert!(o.skipped.is_empty());
        assert_eq!(o.months(), 3);
        assert_eq!(o.schedule[0].price_date, d(2010, 1, 4));
        assert_relative_eq!(o.total_contributed(), 300.0);
    }

    #[test]
    fn short_window_starting_on_weekend_has_one_contribution() {
        let prices = series(&[(d(2023, 6, 5), 50.0), (d(2023, 6, 20), 55.0)]);
        let o = recurring(
            run_window(
                &prices,
                &InvestmentPlan::monthly(100.0),
                d(2023, 6, 3),
                d(2023, 6, 20),
            )
            .unwrap(),
        );
        assert_eq!(o.months(), 1);
        assert_eq!(o.schedule[0].date, d(2023, 6, 3));
        assert_eq!(o.schedule[0].price_date, d(2023, 6, 5));
        assert_relative_eq!(o.schedule[0].units_bought, 2.0);
    }

    #[test]
    fn first_close_after_window_end_is_not_used() {
        let prices = series(&[(d(2023, 6, 25), 50.0)]);
        let err = run_window(
            &prices,
            &InvestmentPlan::monthly(100.0),
            d(2023, 6, 3),
            d(2023, 6, 20),
        )
        .unwrap_err();
        assert!(matches!(err, EtfHelperError::MissingPriceData { .. }));
    }

    #[test]
    fn window_entirely_before_data_fails() {
        let prices = series(&[(d(2021, 1, 4), 10.0)]);
        let err = run_window(
            &prices,
            &InvestmentPlan::monthly(10.0),
            d(2020, 1, 1),
            d(2020, 6, 1),
        )
        .unwrap_err();
        assert!(matches!(err, EtfHelperError::MissingPriceData { date } if date == d(2020, 1, 1)));
    }

    #[test]
    fn window_start_after_end_fails() {
        let err = run_window(
            &three_months(),
            &InvestmentPlan::monthly(10.0),
            d(2020, 3, 1),
            d(2020, 1, 1),
        )
        .unwrap_err();
        assert!(matches!(err, EtfHelperError::InvalidWindow { .. }));
    }

    #[test]
    fn window_lump_sum_uses_points_inside_window() {
        let o = lump(
            run_window(
                &three_months(),
                &InvestmentPlan::lump_sum(110.0),
                d(2020, 1, 15),
                d(2020, 3, 31),
            )
            .unwrap(),
        );
        assert_eq!(o.purchase.date, d(2020, 2, 1));
        assert_relative_eq!(o.final_value, 121.0, epsilon = 1e-9);
    }

    #[test]
    fn contribution_dates_span_year_boundary() {
        let dates = contribution_dates(d(2019, 11, 20), d(2020, 2, 3));
        assert_eq!(
            dates,
            vec![d(2019, 11, 20), d(2019, 12, 1), d(2020, 1, 1), d(2020, 2, 1)]
        );
    }

    #[test]
    fn contribution_dates_empty_for_reversed_range() {
        assert!(contribution_dates(d(2020, 2, 1), d(2020, 1, 1)).is_empty());
    }

    #[test]
    fn result_accessors_dispatch() {
        let result = run(&three_months(), &InvestmentPlan::monthly(100.0)).unwrap();
        assert_relative_eq!(result.total_contributed(), 300.0);
        assert_relative_eq!(result.final_value(), 331.0, epsilon = 1e-9);

        let result = run(&three_months(), &InvestmentPlan::lump_sum(100.0)).unwrap();
        assert_relative_eq!(result.total_contributed(), 100.0);
        assert_relative_eq!(result.return_pct(), 21.0, epsilon = 1e-9);
    }
}
