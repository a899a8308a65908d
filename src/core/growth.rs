use super::errors::{CoreError, CoreResult};
use super::types::{GrowthInputs, GrowthPoint, GrowthSeries, GrowthSummary};

const MONTHS_PER_YEAR: u32 = 12;

fn monthly_fraction(annual_pct: f64) -> f64 {
    annual_pct / f64::from(MONTHS_PER_YEAR) / 100.0
}

fn validate(inputs: &GrowthInputs) -> CoreResult<()> {
    if inputs.horizon_years < 1 {
        return Err(CoreError::MalformedInput(
            "horizon must be at least one year".to_string(),
        ));
    }
    let rates = [
        ("initial amount", inputs.initial_amount),
        ("monthly contribution", inputs.monthly_contribution),
        ("annual return", inputs.annual_return_pct),
        ("inflation", inputs.inflation_pct),
        ("dividend yield", inputs.dividend_yield_pct),
    ];
    if let Some((label, value)) = rates.iter().find(|(_, v)| !v.is_finite()) {
        return Err(CoreError::MalformedInput(format!(
            "{label} must be finite, got {value}"
        )));
    }
    if inputs.inflation_pct <= -1200.0 {
        return Err(CoreError::MalformedInput(format!(
            "inflation {}% would discount below zero",
            inputs.inflation_pct
        )));
    }
    Ok(())
}

/// Month-by-month balance: contribution, then return, then (optionally)
/// reinvested dividends. The recorded dividend income is the year-end
/// balance times the yield, not what actually accrued during the year.
pub fn simulate(inputs: &GrowthInputs) -> CoreResult<GrowthSeries> {
    validate(inputs)?;

    let monthly_return = monthly_fraction(inputs.annual_return_pct);
    let monthly_inflation = monthly_fraction(inputs.inflation_pct);
    let monthly_dividend = monthly_fraction(inputs.dividend_yield_pct);

    let mut points = Vec::with_capacity(inputs.horizon_years as usize + 1);
    points.push(GrowthPoint {
        year: 0,
        nominal_value: inputs.initial_amount,
        real_value: inputs.initial_amount,
        annual_dividend_income: 0.0,
    });

    let mut nominal = inputs.initial_amount;
    for year in 1..=inputs.horizon_years {
        for _ in 0..MONTHS_PER_YEAR {
            nominal += inputs.monthly_contribution;
            nominal += nominal * monthly_return;
            if inputs.reinvest_dividends {
                nominal += nominal * monthly_dividend;
            }
        }

        let elapsed_months = year * MONTHS_PER_YEAR;
        let discount = (1.0 + monthly_inflation).powf(f64::from(elapsed_months));
        points.push(GrowthPoint {
            year,
            nominal_value: nominal,
            real_value: nominal / discount,
            annual_dividend_income: nominal * inputs.dividend_yield_pct / 100.0,
        });
    }

    Ok(GrowthSeries { points })
}

pub fn summarize_growth(inputs: &GrowthInputs, series: &GrowthSeries) -> GrowthSummary {
    let last = series.last().copied().unwrap_or(GrowthPoint {
        year: 0,
        nominal_value: inputs.initial_amount,
        real_value: inputs.initial_amount,
        annual_dividend_income: 0.0,
    });
    let total_contributions = inputs.initial_amount
        + inputs.monthly_contribution * f64::from(MONTHS_PER_YEAR) * f64::from(last.year);
    let investment_growth = last.nominal_value - total_contributions;

    GrowthSummary {
        final_nominal_value: last.nominal_value,
        final_real_value: last.real_value,
        total_contributions,
        investment_growth,
        roi_pct: if total_contributions > 0.0 {
            investment_growth / total_contributions * 100.0
        } else {
            0.0
        },
        final_annual_dividend_income: last.annual_dividend_income,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::{prop_assert, prop_assert_eq, proptest};

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn assert_approx_tol(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected} +/- {tol}, got {actual}"
        );
    }

    fn lump_sum(initial_amount: f64, annual_return_pct: f64, horizon_years: u32) -> GrowthInputs {
        GrowthInputs {
            initial_amount,
            monthly_contribution: 0.0,
            horizon_years,
            annual_return_pct,
            inflation_pct: 0.0,
            dividend_yield_pct: 0.0,
            reinvest_dividends: false,
        }
    }

    #[test]
    fn one_year_at_twelve_percent_compounds_monthly() {
        let series = simulate(&lump_sum(10_000.0, 12.0, 1)).expect("simulates");

        assert_eq!(series.points.len(), 2);
        assert_eq!(series.points[0].year, 0);
        assert_approx(series.points[0].nominal_value, 10_000.0);
        assert_approx_tol(series.points[1].nominal_value, 11_268.25, 0.01);
        assert_approx(series.points[1].nominal_value, 10_000.0 * 1.01f64.powi(12));
        assert_approx(series.points[1].real_value, series.points[1].nominal_value);
    }

    #[test]
    fn contributions_land_before_the_monthly_return() {
        let inputs = GrowthInputs {
            monthly_contribution: 100.0,
            ..lump_sum(0.0, 12.0, 1)
        };
        let series = simulate(&inputs).expect("simulates");

        let expected: f64 = (1..=12).map(|k| 100.0 * 1.01f64.powi(k)).sum();
        assert_approx(series.points[1].nominal_value, expected);
    }

    #[test]
    fn real_value_discounts_by_total_elapsed_months() {
        let inputs = GrowthInputs {
            inflation_pct: 3.0,
            ..lump_sum(50_000.0, 0.0, 3)
        };
        let series = simulate(&inputs).expect("simulates");

        for point in &series.points[1..] {
            assert_approx(point.nominal_value, 50_000.0);
            let discount = (1.0 + 0.03 / 12.0f64).powi(point.year as i32 * 12);
            assert_approx(point.real_value, 50_000.0 / discount);
        }
    }

    #[test]
    fn dividend_income_is_year_end_annualization() {
        let kept = GrowthInputs {
            dividend_yield_pct: 4.0,
            ..lump_sum(10_000.0, 6.0, 2)
        };
        let series = simulate(&kept).expect("simulates");
        assert_eq!(series.points[0].annual_dividend_income, 0.0);
        for point in &series.points[1..] {
            assert_approx(point.annual_dividend_income, point.nominal_value * 0.04);
        }

        let reinvested = simulate(&GrowthInputs {
            reinvest_dividends: true,
            ..kept.clone()
        })
        .expect("simulates");
        assert!(reinvested.points[2].nominal_value > series.points[2].nominal_value);
    }

    #[test]
    fn reinvested_dividends_accrue_after_return() {
        let inputs = GrowthInputs {
            dividend_yield_pct: 12.0,
            reinvest_dividends: true,
            ..lump_sum(1_000.0, 12.0, 1)
        };
        let series = simulate(&inputs).expect("simulates");
        assert_approx(
            series.points[1].nominal_value,
            1_000.0 * (1.01f64 * 1.01).powi(12),
        );
    }

    #[test]
    fn zero_horizon_is_rejected() {
        assert!(matches!(
            simulate(&lump_sum(1_000.0, 7.0, 0)),
            Err(CoreError::MalformedInput(_))
        ));
        assert!(matches!(
            simulate(&lump_sum(f64::NAN, 7.0, 5)),
            Err(CoreError::MalformedInput(_))
        ));
    }

    #[test]
    fn summary_reports_contributions_and_roi() {
        let inputs = GrowthInputs {
            monthly_contribution: 500.0,
            dividend_yield_pct: 2.0,
            inflation_pct: 3.0,
            ..lump_sum(10_000.0, 7.0, 10)
        };
        let series = simulate(&inputs).expect("simulates");
        let summary = summarize_growth(&inputs, &series);
        let last = series.last().expect("non-empty");

        assert_approx(summary.total_contributions, 70_000.0);
        assert_approx(summary.final_nominal_value, last.nominal_value);
        assert_approx(summary.final_real_value, last.real_value);
        assert_approx(summary.investment_growth, last.nominal_value - 70_000.0);
        assert_approx(
            summary.roi_pct,
            (last.nominal_value / 70_000.0 - 1.0) * 100.0,
        );
        assert_approx(summary.final_annual_dividend_income, last.nominal_value * 0.02);
    }

    proptest! {
        #![proptest_config(proptest::test_runner::Config::with_cases(48))]

        #[test]
        fn prop_nominal_never_decreases(
            initial in 0.0f64..1_000_000.0,
            monthly in 0.0f64..10_000.0,
            years in 1u32..40,
            ret in 0.0f64..20.0,
            inflation in 0.0f64..10.0,
            dividend in 0.0f64..8.0,
            reinvest in proptest::bool::ANY
        ) {
            let series = simulate(&GrowthInputs {
                initial_amount: initial,
                monthly_contribution: monthly,
                horizon_years: years,
                annual_return_pct: ret,
                inflation_pct: inflation,
                dividend_yield_pct: dividend,
                reinvest_dividends: reinvest,
            }).expect("simulates");

            prop_assert_eq!(series.points.len(), years as usize + 1);
            for pair in series.points.windows(2) {
                prop_assert!(pair[1].nominal_value >= pair[0].nominal_value);
                prop_assert_eq!(pair[1].year, pair[0].year + 1);
            }
        }

        #[test]
        fn prop_real_value_matches_closed_form_discount(
            initial in 1.0f64..1_000_000.0,
            monthly in 0.0f64..5_000.0,
            years in 1u32..30,
            ret in 0.0f64..15.0,
            inflation in 0.0f64..10.0
        ) {
            let series = simulate(&GrowthInputs {
                initial_amount: initial,
                monthly_contribution: monthly,
                horizon_years: years,
                annual_return_pct: ret,
                inflation_pct: inflation,
                dividend_yield_pct: 0.0,
                reinvest_dividends: false,
            }).expect("simulates");

            let monthly_inflation = inflation / 1200.0;
            for point in &series.points {
                let expected = point.nominal_value
                    / (1.0 + monthly_inflation).powf(f64::from(point.year * 12));
                prop_assert!(
                    (point.real_value - expected).abs() <= expected.abs() * 1e-12 + 1e-9,
                    "year {}: expected {expected}, got {}", point.year, point.real_value
                );
            }
        }
    }
}
