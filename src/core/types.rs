use std::fmt;

use serde::Serialize;

/// Household inputs for one projection. Immutable per run; every edit on the
/// caller's side produces a fresh `Parameters` and a full recomputation.
#[derive(Debug, Clone)]
pub struct Parameters {
    pub current_age: u32,
    pub current_income: f64,
    pub savings_to_retirement_pct: f64,
    pub savings_to_investment_pct: f64,
    pub home_value: f64,
    pub home_appreciation_rate_pct: f64,
    pub market_return_pct: f64,
    pub inflation_rate_pct: f64,
    pub retirement_age: u32,
    pub retirement_income_percent: f64,
    pub num_simulations: u32,
    pub seed: u64,
    pub start_year: i32,
}

/// One simulated year. Rates are the realized values for that year, reported
/// in percent. `income_or_withdrawal` is positive gross income while working
/// and minus the required withdrawal once retired. `deductions` and
/// `net_income` are reporting-only: contributions are sized on gross income.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct YearSnapshot {
    pub age: u32,
    pub calendar_year: i32,
    pub net_worth: f64,
    pub retirement_account: f64,
    pub investment_account: f64,
    pub home_value: f64,
    pub income_or_withdrawal: f64,
    pub deductions: f64,
    pub net_income: f64,
    pub is_retired: bool,
    pub inflation_rate: f64,
    pub home_appreciation_rate: f64,
    pub market_return: f64,
}

/// One full path from the current age to age 95 inclusive.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Trajectory {
    pub label: String,
    pub is_base: bool,
    pub years: Vec<YearSnapshot>,
}

/// The deterministic base case plus `num_simulations` stochastic runs, all
/// produced from the same `Parameters`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SimulationRun {
    pub base: Trajectory,
    pub stochastic: Vec<Trajectory>,
}

/// Net-worth percentile band for one age, computed across the stochastic
/// trajectories, alongside the base-case value at the same index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PercentileRow {
    pub age: u32,
    pub calendar_year: i32,
    pub base_case: f64,
    pub p10: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p90: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SimulationError {
    InvalidParameter {
        field: &'static str,
        reason: String,
    },
    DegenerateAggregation,
}

impl fmt::Display for SimulationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SimulationError::InvalidParameter { field, reason } => {
                write!(f, "invalid parameter {field}: {reason}")
            }
            SimulationError::DegenerateAggregation => {
                write!(f, "percentile aggregation requires at least one stochastic run")
            }
        }
    }
}

impl std::error::Error for SimulationError {}
