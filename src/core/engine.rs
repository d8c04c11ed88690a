use std::f64::consts::PI;

use super::tax;
use super::types::{
    Parameters, PercentileRow, SimulationError, SimulationRun, Trajectory, YearSnapshot,
};

/// Fixed annual standard deviations for the stochastic draws, in fraction
/// units.
const INFLATION_VOL: f64 = 0.015;
const HOME_APPRECIATION_VOL: f64 = 0.02;
const MARKET_RETURN_VOL: f64 = 0.12;

/// Every trajectory runs through this age inclusive.
const FINAL_AGE: u32 = 95;

/// Realized rates for one simulated year, in fraction units.
#[derive(Debug, Clone, Copy)]
struct RateSet {
    inflation: f64,
    home_appreciation: f64,
    market_return: f64,
}

#[derive(Debug)]
struct Household {
    /// Gross income while working; once retired, the inflating basis that
    /// sizes the required withdrawal.
    income_basis: f64,
    retirement_account: f64,
    investment_account: f64,
    home_value: f64,
}

/// Produce the deterministic base case plus `num_simulations` independent
/// stochastic trajectories from one immutable set of parameters.
pub fn run_simulation(params: &Parameters) -> Result<SimulationRun, SimulationError> {
    validate_parameters(params)?;

    let base = trajectory_with(params, "Base Case".to_string(), true, None);
    let mut stochastic = Vec::with_capacity(params.num_simulations as usize);
    for run_index in 0..params.num_simulations {
        let mut rng = Rng::new(derive_seed(params.seed, run_index));
        stochastic.push(trajectory_with(
            params,
            format!("Simulation {}", run_index + 1),
            false,
            Some(&mut rng),
        ));
    }

    Ok(SimulationRun { base, stochastic })
}

/// One trajectory on its own. Deterministic mode uses the parameter rates
/// directly; stochastic mode draws fresh rates each year from an RNG seeded
/// off `params.seed`.
pub fn simulate_trajectory(
    params: &Parameters,
    stochastic: bool,
) -> Result<Trajectory, SimulationError> {
    validate_parameters(params)?;

    if stochastic {
        let mut rng = Rng::new(derive_seed(params.seed, 0));
        Ok(trajectory_with(
            params,
            "Simulation 1".to_string(),
            false,
            Some(&mut rng),
        ))
    } else {
        Ok(trajectory_with(params, "Base Case".to_string(), true, None))
    }
}

/// Net-worth percentile bands across the stochastic trajectories, one row
/// per simulated age. Rank selection truncates: `sorted[floor(len × p)]`.
pub fn aggregate_percentiles(run: &SimulationRun) -> Result<Vec<PercentileRow>, SimulationError> {
    if run.stochastic.is_empty() {
        return Err(SimulationError::DegenerateAggregation);
    }

    let mut rows = Vec::with_capacity(run.base.years.len());
    for (index, base_year) in run.base.years.iter().enumerate() {
        let mut net_worths = run
            .stochastic
            .iter()
            .map(|trajectory| trajectory.years[index].net_worth)
            .collect::<Vec<_>>();
        net_worths.sort_by(|a, b| a.total_cmp(b));

        rows.push(PercentileRow {
            age: base_year.age,
            calendar_year: base_year.calendar_year,
            base_case: base_year.net_worth,
            p10: select_percentile(&net_worths, 0.10),
            p25: select_percentile(&net_worths, 0.25),
            p50: select_percentile(&net_worths, 0.50),
            p75: select_percentile(&net_worths, 0.75),
            p90: select_percentile(&net_worths, 0.90),
        });
    }

    Ok(rows)
}

fn select_percentile(sorted: &[f64], p: f64) -> f64 {
    let index = (sorted.len() as f64 * p).floor() as usize;
    sorted[index.min(sorted.len() - 1)]
}

fn validate_parameters(params: &Parameters) -> Result<(), SimulationError> {
    fn invalid(field: &'static str, reason: impl Into<String>) -> SimulationError {
        SimulationError::InvalidParameter {
            field,
            reason: reason.into(),
        }
    }

    if params.current_age == 0 || params.current_age > FINAL_AGE {
        return Err(invalid(
            "currentAge",
            format!("must be between 1 and {FINAL_AGE}"),
        ));
    }
    if params.retirement_age <= params.current_age {
        return Err(invalid("retirementAge", "must be greater than currentAge"));
    }

    for (field, value) in [
        ("currentIncome", params.current_income),
        ("savingsToRetirementPct", params.savings_to_retirement_pct),
        ("savingsToInvestmentPct", params.savings_to_investment_pct),
        ("homeValue", params.home_value),
        ("retirementIncomePercent", params.retirement_income_percent),
    ] {
        if !value.is_finite() || value < 0.0 {
            return Err(invalid(field, "must be finite and >= 0"));
        }
    }

    for (field, value) in [
        ("homeAppreciationRatePct", params.home_appreciation_rate_pct),
        ("marketReturnPct", params.market_return_pct),
        ("inflationRatePct", params.inflation_rate_pct),
    ] {
        if !value.is_finite() {
            return Err(invalid(field, "must be finite"));
        }
    }

    Ok(())
}

fn trajectory_with(
    params: &Parameters,
    label: String,
    is_base: bool,
    mut rng: Option<&mut Rng>,
) -> Trajectory {
    let mut household = Household {
        income_basis: params.current_income,
        retirement_account: 0.0,
        investment_account: 0.0,
        home_value: params.home_value,
    };

    let mut years = Vec::with_capacity((FINAL_AGE + 1 - params.current_age) as usize);
    for age in params.current_age..=FINAL_AGE {
        let rates = match rng.as_deref_mut() {
            Some(rng) => sample_rates(params, rng),
            None => fixed_rates(params),
        };
        years.push(advance_year(params, age, &mut household, rates));
    }

    Trajectory {
        label,
        is_base,
        years,
    }
}

fn fixed_rates(params: &Parameters) -> RateSet {
    RateSet {
        inflation: params.inflation_rate_pct / 100.0,
        home_appreciation: params.home_appreciation_rate_pct / 100.0,
        market_return: params.market_return_pct / 100.0,
    }
}

/// One normal draw per economic factor. The inflation draw is floored at
/// zero; home appreciation and market return may go negative.
fn sample_rates(params: &Parameters, rng: &mut Rng) -> RateSet {
    RateSet {
        inflation: rng
            .normal(params.inflation_rate_pct / 100.0, INFLATION_VOL)
            .max(0.0),
        home_appreciation: rng.normal(
            params.home_appreciation_rate_pct / 100.0,
            HOME_APPRECIATION_VOL,
        ),
        market_return: rng.normal(params.market_return_pct / 100.0, MARKET_RETURN_VOL),
    }
}

/// Advance the household by one year and return its snapshot.
///
/// Working years contribute a percentage of GROSS income to each account
/// before growth; deductions are computed for reporting only and never
/// reduce the contribution base. Retirement years withdraw the required
/// income from the retirement account first, spilling any shortfall into
/// the investment account, which is allowed to go negative. The income
/// basis inflates every year regardless of retirement status, and the home
/// always appreciates.
fn advance_year(
    params: &Parameters,
    age: u32,
    household: &mut Household,
    rates: RateSet,
) -> YearSnapshot {
    let is_retired = age >= params.retirement_age;
    let income_or_withdrawal;
    let deductions;
    let net_income;

    if is_retired {
        let required_income = household.income_basis * params.retirement_income_percent / 100.0;
        if household.retirement_account >= required_income {
            household.retirement_account -= required_income;
        } else {
            let shortfall = required_income - household.retirement_account;
            household.retirement_account = 0.0;
            household.investment_account -= shortfall;
        }
        household.retirement_account *= 1.0 + rates.market_return;
        household.investment_account *= 1.0 + rates.market_return;

        income_or_withdrawal = -required_income;
        deductions = 0.0;
        net_income = 0.0;
    } else {
        let gross_income = household.income_basis;
        deductions = tax::compute_deductions(gross_income);
        net_income = gross_income - deductions;

        let retirement_contribution = gross_income * params.savings_to_retirement_pct / 100.0;
        let investment_contribution = gross_income * params.savings_to_investment_pct / 100.0;
        household.retirement_account =
            (household.retirement_account + retirement_contribution) * (1.0 + rates.market_return);
        household.investment_account =
            (household.investment_account + investment_contribution) * (1.0 + rates.market_return);

        income_or_withdrawal = gross_income;
    }

    household.income_basis *= 1.0 + rates.inflation;
    household.home_value *= 1.0 + rates.home_appreciation;

    let net_worth =
        household.retirement_account + household.investment_account + household.home_value;

    YearSnapshot {
        age,
        calendar_year: params.start_year + (age - params.current_age) as i32,
        net_worth,
        retirement_account: household.retirement_account,
        investment_account: household.investment_account,
        home_value: household.home_value,
        income_or_withdrawal,
        deductions,
        net_income,
        is_retired,
        inflation_rate: rates.inflation * 100.0,
        home_appreciation_rate: rates.home_appreciation * 100.0,
        market_return: rates.market_return * 100.0,
    }
}

fn derive_seed(base_seed: u64, run_index: u32) -> u64 {
    splitmix64(base_seed ^ ((run_index as u64) << 32))
}

fn splitmix64(mut x: u64) -> u64 {
    x = x.wrapping_add(0x9E3779B97F4A7C15);
    let mut z = x;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

struct Rng {
    state: u64,
    cached_normal: Option<f64>,
}

impl Rng {
    fn new(seed: u64) -> Self {
        let state = if seed == 0 {
            0xA5A5_A5A5_A5A5_A5A5
        } else {
            seed
        };
        Self {
            state,
            cached_normal: None,
        }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x >> 12;
        x ^= x << 25;
        x ^= x >> 27;
        self.state = x;
        x.wrapping_mul(0x2545F4914F6CDD1D)
    }

    fn next_f64(&mut self) -> f64 {
        const DENOM: f64 = (1_u64 << 53) as f64;
        let v = self.next_u64() >> 11;
        ((v as f64) + 0.5) / DENOM
    }

    /// Box–Muller; the second variate of each pair is cached.
    fn standard_normal(&mut self) -> f64 {
        if let Some(z) = self.cached_normal.take() {
            return z;
        }

        let u1 = self.next_f64().max(1e-12);
        let u2 = self.next_f64();
        let r = (-2.0 * u1.ln()).sqrt();
        let theta = 2.0 * PI * u2;

        let z0 = r * theta.cos();
        let z1 = r * theta.sin();
        self.cached_normal = Some(z1);
        z0
    }

    fn normal(&mut self, mean: f64, std_dev: f64) -> f64 {
        mean + std_dev * self.standard_normal()
    }
}
