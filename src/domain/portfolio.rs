//! Weighted portfolios: an in-progress builder, the frozen spec, and a named
//! library of specs.

use std::collections::BTreeMap;

use super::error::EtfHelperError;

pub const MAX_WEIGHT: f64 = 100.0;

/// Ticker → relative weight. Weights need not sum to 100.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PortfolioSpec {
    weights: BTreeMap<String, f64>,
}

impl PortfolioSpec {
    pub fn from_weights<I, S>(weights: I) -> Result<Self, EtfHelperError>
    where
        I: IntoIterator<Item = (S, f64)>,
        S: AsRef<str>,
    {
        let mut builder = PortfolioBuilder::new();
        for (ticker, weight) in weights {
            builder.add(ticker.as_ref(), weight)?;
        }
        Ok(builder.freeze())
    }

    pub fn weights(&self) -> &BTreeMap<String, f64> {
        &self.weights
    }

    pub fn tickers(&self) -> impl Iterator<Item = &str> {
        self.weights.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    pub fn total_weight(&self) -> f64 {
        self.weights.values().sum()
    }

    /// Each weight divided by the total, or `EmptyPortfolio` when the total
    /// is zero.
    pub fn normalized(&self) -> Result<BTreeMap<String, f64>, EtfHelperError> {
        let total = self.total_weight();
        if self.is_empty() || total <= 0.0 {
            return Err(EtfHelperError::EmptyPortfolio);
        }
        Ok(self
            .weights
            .iter()
            .map(|(ticker, weight)| (ticker.clone(), weight / total))
            .collect())
    }
}

#[derive(Debug, Clone, Default)]
pub struct PortfolioBuilder {
    weights: BTreeMap<String, f64>,
}

impl PortfolioBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `weight` to `ticker`, accumulating onto an existing entry.
    /// Returns `false` when the input is blank (empty ticker or zero weight)
    /// and nothing was added.
    pub fn add(&mut self, ticker: &str, weight: f64) -> Result<bool, EtfHelperError> {
        let ticker = ticker.trim().to_uppercase();
        if !weight.is_finite() || !(0.0..=MAX_WEIGHT).contains(&weight) {
            return Err(EtfHelperError::InvalidWeight { ticker, weight });
        }
        if ticker.is_empty() || weight == 0.0 {
            return Ok(false);
        }
        *self.weights.entry(ticker).or_insert(0.0) += weight;
        Ok(true)
    }

    pub fn remove(&mut self, ticker: &str) -> Result<f64, EtfHelperError> {
        let ticker = ticker.trim().to_uppercase();
        self.weights
            .remove(&ticker)
            .ok_or(EtfHelperError::UnknownTicker { ticker })
    }

    pub fn weight(&self, ticker: &str) -> Option<f64> {
        self.weights.get(&ticker.trim().to_uppercase()).copied()
    }

    pub fn len(&self) -> usize {
        self.weights.len()
    }

    pub fn is_empty(&self) -> bool {
        self.weights.is_empty()
    }

    /// Takes the current entries as a spec and leaves the builder empty.
    pub fn freeze(&mut self) -> PortfolioSpec {
        PortfolioSpec {
            weights: std::mem::take(&mut self.weights),
        }
    }
}

/// Named portfolios. Names are unique.
#[derive(Debug, Clone, Default)]
pub struct PortfolioLibrary {
    portfolios: BTreeMap<String, PortfolioSpec>,
}

impl PortfolioLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Freezes `builder` under `name`. A taken name leaves the builder as is.
    pub fn submit(
        &mut self,
        name: &str,
        builder: &mut PortfolioBuilder,
    ) -> Result<(), EtfHelperError> {
        let name = name.trim();
        if self.portfolios.contains_key(name) {
            return Err(EtfHelperError::DuplicatePortfolio {
                name: name.to_string(),
            });
        }
        self.portfolios.insert(name.to_string(), builder.freeze());
        Ok(())
    }

    pub fn insert(&mut self, name: &str, spec: PortfolioSpec) -> Result<(), EtfHelperError> {
        let name = name.trim().to_string();
        if self.portfolios.contains_key(&name) {
            return Err(EtfHelperError::DuplicatePortfolio { name });
        }
        self.portfolios.insert(name, spec);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&PortfolioSpec, EtfHelperError> {
        self.portfolios
            .get(name.trim())
            .ok_or_else(|| EtfHelperError::UnknownPortfolio {
                name: name.trim().to_string(),
            })
    }

    pub fn names(&self) -> Vec<&str> {
        self.portfolios.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.portfolios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.portfolios.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &PortfolioSpec)> {
        self.portfolios.iter().map(|(k, v)| (k.as_str(), v))
    }
}
