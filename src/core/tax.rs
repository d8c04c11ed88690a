//! Mandatory payroll deductions under the 2024 federal and Alberta
//! schedules: two progressive bracket tables plus capped CPP and EI
//! contributions.

/// (upper bound, marginal rate) pairs; the last bound is unbounded.
type BracketSchedule = [(f64, f64)];

const FEDERAL_BRACKETS: [(f64, f64); 5] = [
    (55_867.0, 0.15),
    (111_733.0, 0.205),
    (173_205.0, 0.26),
    (246_752.0, 0.29),
    (f64::INFINITY, 0.33),
];

const PROVINCIAL_BRACKETS: [(f64, f64); 5] = [
    (148_269.0, 0.10),
    (177_922.0, 0.12),
    (237_230.0, 0.13),
    (355_845.0, 0.14),
    (f64::INFINITY, 0.15),
];

const CPP_RATE: f64 = 0.0595;
const CPP_MAX: f64 = 3_867.0;
const EI_RATE: f64 = 0.0163;
const EI_MAX: f64 = 1_049.0;

fn tax_from_schedule(income: f64, brackets: &BracketSchedule) -> f64 {
    let mut tax = 0.0;
    let mut previous_upper = 0.0;
    for &(upper, rate) in brackets {
        if income <= previous_upper {
            break;
        }
        tax += (income.min(upper) - previous_upper) * rate;
        previous_upper = upper;
    }
    tax
}

/// Total income tax plus payroll contributions on a gross annual income.
pub fn compute_deductions(gross_income: f64) -> f64 {
    let gross = gross_income.max(0.0);
    let federal_tax = tax_from_schedule(gross, &FEDERAL_BRACKETS);
    let provincial_tax = tax_from_schedule(gross, &PROVINCIAL_BRACKETS);
    let cpp = (gross * CPP_RATE).min(CPP_MAX);
    let ei = (gross * EI_RATE).min(EI_MAX);
    federal_tax + provincial_tax + cpp + ei
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::proptest;

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn zero_income_owes_nothing() {
        assert_approx(compute_deductions(0.0), 0.0);
    }

    #[test]
    fn first_federal_bracket_boundary_matches_closed_form() {
        let income = 55_867.0;
        let expected = income * 0.15 // entire first federal bracket
            + income * 0.10 // all inside the first provincial bracket
            + income * CPP_RATE
            + income * EI_RATE;
        assert_approx(compute_deductions(income), expected);
    }

    #[test]
    fn mid_income_spans_two_federal_brackets() {
        let income = 75_000.0;
        let expected = 55_867.0 * 0.15
            + (income - 55_867.0) * 0.205
            + income * 0.10
            + income * CPP_RATE
            + income * EI_RATE;
        assert_approx(compute_deductions(income), expected);
    }

    #[test]
    fn high_income_caps_payroll_contributions_and_reaches_top_brackets() {
        let income = 400_000.0;
        let federal = 55_867.0 * 0.15
            + (111_733.0 - 55_867.0) * 0.205
            + (173_205.0 - 111_733.0) * 0.26
            + (246_752.0 - 173_205.0) * 0.29
            + (income - 246_752.0) * 0.33;
        let provincial = 148_269.0 * 0.10
            + (177_922.0 - 148_269.0) * 0.12
            + (237_230.0 - 177_922.0) * 0.13
            + (355_845.0 - 237_230.0) * 0.14
            + (income - 355_845.0) * 0.15;
        let expected = federal + provincial + CPP_MAX + EI_MAX;
        assert_approx(compute_deductions(income), expected);
    }

    #[test]
    fn negative_income_is_clamped_to_zero() {
        assert_approx(compute_deductions(-10_000.0), 0.0);
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(64))]

        #[test]
        fn prop_deductions_are_monotone_in_income(lo in 0.0_f64..500_000.0, delta in 0.0_f64..100_000.0) {
            let low = compute_deductions(lo);
            let high = compute_deductions(lo + delta);
            assert!(high + EPS >= low, "deductions fell from {low} to {high}");
        }

        #[test]
        fn prop_deductions_never_exceed_income(income in 0.0_f64..1_000_000.0) {
            let deductions = compute_deductions(income);
            assert!(deductions >= 0.0);
            assert!(deductions <= income + EPS, "deductions {deductions} exceed income {income}");
        }
    }
}
