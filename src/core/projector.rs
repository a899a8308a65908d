use tracing::debug;

use super::errors::{CoreError, CoreResult};
use super::types::{
    CrashScenario, FireInputs, FirePlan, FirePlanInputs, ProjectionAssumptions, ProjectionResult,
    RetirementSweep, SweepPoint,
};

const MONTHS_PER_YEAR: f64 = 12.0;

fn compound(balance: f64, monthly_rate: f64, months: f64) -> f64 {
    balance * (1.0 + monthly_rate).powf(months)
}

/// Future value of one unit deposited every month, each deposit earning a
/// full month of return in the month it is made.
fn annuity_factor(monthly_rate: f64, months: f64) -> f64 {
    if months <= 0.0 {
        return 0.0;
    }
    if monthly_rate == 0.0 {
        return months;
    }
    ((1.0 + monthly_rate).powf(months) - 1.0) / monthly_rate * (1.0 + monthly_rate)
}

fn validate_assumptions(assumptions: &ProjectionAssumptions) -> CoreResult<()> {
    let ProjectionAssumptions {
        investment_return,
        cash_return,
        safe_withdrawal_rate,
    } = *assumptions;
    if !investment_return.is_finite() || investment_return <= -1.0 {
        return Err(CoreError::MalformedInput(format!(
            "investment return must be above -100%, got {investment_return}"
        )));
    }
    if !cash_return.is_finite() || cash_return <= -1.0 {
        return Err(CoreError::MalformedInput(format!(
            "cash return must be above -100%, got {cash_return}"
        )));
    }
    if !safe_withdrawal_rate.is_finite() || safe_withdrawal_rate <= 0.0 {
        return Err(CoreError::MalformedInput(format!(
            "safe withdrawal rate must be positive, got {safe_withdrawal_rate}"
        )));
    }
    Ok(())
}

pub fn project(
    inputs: &FireInputs,
    assumptions: ProjectionAssumptions,
) -> CoreResult<ProjectionResult> {
    validate_assumptions(&assumptions)?;

    let years_to_fire = inputs.retirement_age as i32 - inputs.current_age as i32;
    let months = f64::from(years_to_fire.max(0)) * MONTHS_PER_YEAR;
    let investment_rate = assumptions.investment_return / MONTHS_PER_YEAR;
    let cash_rate = assumptions.cash_return / MONTHS_PER_YEAR;

    let (future_portfolio_value, future_cash_savings) = if years_to_fire > 0 {
        (
            compound(inputs.current_portfolio, investment_rate, months)
                + inputs.monthly_investment * annuity_factor(investment_rate, months),
            compound(inputs.current_cash_savings, cash_rate, months)
                + inputs.monthly_cash_savings * annuity_factor(cash_rate, months),
        )
    } else {
        (inputs.current_portfolio, inputs.current_cash_savings)
    };

    let total_future_value = future_portfolio_value + future_cash_savings;
    let projected_dividend_income = future_portfolio_value * inputs.portfolio_dividend_yield;
    let safe_withdrawal_amount = future_portfolio_value * assumptions.safe_withdrawal_rate;
    let required_portfolio = inputs.annual_expenses_net / assumptions.safe_withdrawal_rate;
    let shortfall = (required_portfolio - total_future_value).max(0.0);

    let additional_monthly_needed = if shortfall > 0.0 && years_to_fire > 0 {
        shortfall / annuity_factor(investment_rate, months)
    } else {
        0.0
    };

    debug!(
        years_to_fire,
        total_future_value, required_portfolio, shortfall, "projected FIRE trajectory"
    );

    Ok(ProjectionResult {
        current_portfolio: inputs.current_portfolio,
        current_cash_savings: inputs.current_cash_savings,
        current_dividend_income: inputs.current_portfolio * inputs.portfolio_dividend_yield,
        future_portfolio_value,
        future_cash_savings,
        total_future_value,
        projected_dividend_income,
        safe_withdrawal_amount,
        total_retirement_income: safe_withdrawal_amount + projected_dividend_income,
        required_portfolio,
        shortfall,
        additional_monthly_needed,
        years_to_fire,
        required_monthly_investment: inputs.monthly_investment + additional_monthly_needed,
    })
}

impl FirePlanInputs {
    fn retirement_annual_expenses(&self) -> f64 {
        self.annual_expenses * self.retirement_expense_modifier_pct / 100.0
    }

    fn other_retirement_income(&self) -> f64 {
        (self.monthly_social_security + self.monthly_pension) * MONTHS_PER_YEAR
    }

    fn net_annual_expenses(&self) -> f64 {
        (self.retirement_annual_expenses() - self.other_retirement_income()).max(0.0)
    }

    fn fire_inputs(&self) -> FireInputs {
        FireInputs {
            retirement_age: self.retirement_age,
            annual_expenses_net: self.net_annual_expenses(),
            current_age: self.current_age,
            monthly_investment: self.monthly_investment,
            monthly_cash_savings: self.monthly_cash_savings,
            current_cash_savings: self.current_cash_savings,
            portfolio_dividend_yield: self.portfolio_dividend_yield_pct / 100.0,
            current_portfolio: self.current_portfolio,
        }
    }

    fn assumptions(&self) -> ProjectionAssumptions {
        ProjectionAssumptions {
            safe_withdrawal_rate: self.safe_withdrawal_rate_pct / 100.0,
            ..ProjectionAssumptions::default()
        }
    }
}

/// Full retirement plan: expenses adjusted for retirement and offset by other
/// income, then projected with the chosen withdrawal rate.
pub fn plan_fire(inputs: &FirePlanInputs) -> CoreResult<FirePlan> {
    if let Some(impact) = inputs.crash_impact_pct
        && !(0.0..=100.0).contains(&impact)
    {
        return Err(CoreError::MalformedInput(format!(
            "crash impact must be between 0 and 100, got {impact}"
        )));
    }

    let net_annual_expenses = inputs.net_annual_expenses();
    let projection = project(&inputs.fire_inputs(), inputs.assumptions())?;

    let retirement_years = inputs.life_expectancy as i32 - inputs.retirement_age as i32;
    let depletion_rate =
        (net_annual_expenses - projection.projected_dividend_income) / projection.total_future_value;
    let years_covered = (depletion_rate > 0.0)
        .then(|| (1.0 / depletion_rate).min(f64::from(retirement_years.max(0))));

    let fire_number = projection.required_portfolio;
    let crash = inputs.crash_impact_pct.map(|impact_pct| {
        let portfolio_after_crash = projection.total_future_value * (1.0 - impact_pct / 100.0);
        CrashScenario {
            impact_pct,
            portfolio_after_crash,
            additional_needed: (fire_number - portfolio_after_crash).max(0.0),
        }
    });

    Ok(FirePlan {
        retirement_annual_expenses: inputs.retirement_annual_expenses(),
        other_retirement_income: inputs.other_retirement_income(),
        net_annual_expenses,
        fire_number,
        retirement_years,
        years_covered,
        projection,
        crash,
    })
}

/// Sweep over retirement ages with the plan's adjusted expenses and
/// withdrawal rate.
pub fn sweep_plan(inputs: &FirePlanInputs, max_age: u32) -> CoreResult<RetirementSweep> {
    sweep_retirement_ages(&inputs.fire_inputs(), inputs.assumptions(), max_age)
}

/// Projects every retirement age from the current age up to `max_age`.
pub fn sweep_retirement_ages(
    inputs: &FireInputs,
    assumptions: ProjectionAssumptions,
    max_age: u32,
) -> CoreResult<RetirementSweep> {
    if max_age < inputs.current_age {
        return Err(CoreError::MalformedInput(format!(
            "max age {max_age} is below current age {}",
            inputs.current_age
        )));
    }

    let points = (inputs.current_age..=max_age)
        .map(|retirement_age| {
            let candidate = FireInputs {
                retirement_age,
                ..inputs.clone()
            };
            project(&candidate, assumptions).map(|projection| SweepPoint {
                retirement_age,
                projection,
            })
        })
        .collect::<CoreResult<Vec<_>>>()?;

    let selected_index = points.iter().position(|p| p.projection.shortfall <= 0.0);
    let best_index = points
        .iter()
        .enumerate()
        .min_by(|(_, a), (_, b)| a.projection.shortfall.total_cmp(&b.projection.shortfall))
        .map(|(idx, _)| idx)
        .unwrap_or(0);

    Ok(RetirementSweep {
        points,
        selected_index,
        best_index,
    })
}
