//! Daily closing-price series.
//!
//! A [`PriceSeries`] is ordered by strictly increasing date. Closes are not
//! validated on construction: a zero, negative or non-finite close is a data
//! defect reported by the consumer that tries to trade at it.

use chrono::NaiveDate;

use super::error::EtfHelperError;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

impl PricePoint {
    pub fn new(date: NaiveDate, close: f64) -> Self {
        Self { date, close }
    }

    /// True when the close can be used as a divisor.
    pub fn is_tradable(&self) -> bool {
        self.close.is_finite() && self.close > 0.0
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceSeries {
    points: Vec<PricePoint>,
}

impl PriceSeries {
    pub fn new(points: Vec<PricePoint>) -> Result<Self, EtfHelperError> {
        if let Some(bad) = points.windows(2).find(|w| w[1].date <= w[0].date) {
            return Err(EtfHelperError::UnorderedSeries { date: bad[1].date });
        }
        Ok(Self { points })
    }

    /// Builds a series from points in any order. Duplicate dates are still
    /// rejected.
    pub fn from_unsorted(mut points: Vec<PricePoint>) -> Result<Self, EtfHelperError> {
        points.sort_by_key(|p| p.date);
        Self::new(points)
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn first(&self) -> Option<&PricePoint> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&PricePoint> {
        self.points.last()
    }

    pub fn date_range(&self) -> Option<(NaiveDate, NaiveDate)> {
        Some((self.first()?.date, self.last()?.date))
    }

    /// Close on exactly `date`, if it was a trading day.
    pub fn close_on(&self, date: NaiveDate) -> Option<f64> {
        self.points
            .binary_search_by_key(&date, |p| p.date)
            .ok()
            .map(|i| self.points[i].close)
    }

    /// Most recent point at or before `date` (forward-fill).
    pub fn at_or_before(&self, date: NaiveDate) -> Option<&PricePoint> {
        let idx = self.points.partition_point(|p| p.date <= date);
        idx.checked_sub(1).map(|i| &self.points[i])
    }

    /// First point at or after `date`.
    pub fn first_on_or_after(&self, date: NaiveDate) -> Option<&PricePoint> {
        let idx = self.points.partition_point(|p| p.date < date);
        self.points.get(idx)
    }

    /// Every close multiplied by `factor`.
    pub fn scaled(&self, factor: f64) -> Self {
        Self {
            points: self
                .points
                .iter()
                .map(|p| PricePoint::new(p.date, p.close * factor))
                .collect(),
        }
    }

    /// Points whose date falls inside `[start, end]`.
    pub fn between(&self, start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            points: self
                .points
                .iter()
                .filter(|p| p.date >= start && p.date <= end)
                .copied()
                .collect(),
        }
    }
}
