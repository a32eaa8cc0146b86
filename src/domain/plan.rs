//! Investment plans: a single purchase or a fixed monthly contribution.

use std::fmt;
use std::str::FromStr;

use super::error::EtfHelperError;

pub const DEFAULT_LUMP_SUM: f64 = 1000.0;
pub const DEFAULT_MONTHLY: f64 = 100.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Period {
    Monthly,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InvestmentPlan {
    LumpSum { amount: f64 },
    Recurring { amount_per_period: f64, period: Period },
}

impl InvestmentPlan {
    pub fn lump_sum(amount: f64) -> Self {
        InvestmentPlan::LumpSum { amount }
    }

    pub fn monthly(amount_per_period: f64) -> Self {
        InvestmentPlan::Recurring {
            amount_per_period,
            period: Period::Monthly,
        }
    }

    pub fn amount(&self) -> f64 {
        match *self {
            InvestmentPlan::LumpSum { amount } => amount,
            InvestmentPlan::Recurring {
                amount_per_period, ..
            } => amount_per_period,
        }
    }

    pub fn mode(&self) -> PlanMode {
        match self {
            InvestmentPlan::LumpSum { .. } => PlanMode::LumpSum,
            InvestmentPlan::Recurring { .. } => PlanMode::Recurring,
        }
    }

    pub fn validate(&self) -> Result<(), EtfHelperError> {
        let amount = self.amount();
        if !amount.is_finite() || amount <= 0.0 {
            return Err(EtfHelperError::InvalidAmount { amount });
        }
        Ok(())
    }
}

/// Plan kind without an amount, as selected in config or on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlanMode {
    LumpSum,
    Recurring,
}

impl PlanMode {
    pub fn default_amount(&self) -> f64 {
        match self {
            PlanMode::LumpSum => DEFAULT_LUMP_SUM,
            PlanMode::Recurring => DEFAULT_MONTHLY,
        }
    }

    pub fn with_amount(&self, amount: f64) -> InvestmentPlan {
        match self {
            PlanMode::LumpSum => InvestmentPlan::lump_sum(amount),
            PlanMode::Recurring => InvestmentPlan::monthly(amount),
        }
    }
}

impl FromStr for PlanMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "lump_sum" | "lumpsum" | "once" => Ok(PlanMode::LumpSum),
            "recurring" | "monthly" | "dca" => Ok(PlanMode::Recurring),
            other => Err(format!(
                "unknown mode '{other}' (expected lump_sum or recurring)"
            )),
        }
    }
}

impl fmt::Display for PlanMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlanMode::LumpSum => write!(f, "lump_sum"),
            PlanMode::Recurring => write!(f, "recurring"),
        }
    }
}
