use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::core::{CoreError, CoreResult, FirePlanInputs, GrowthInputs};
use crate::logging::LogFormat;

#[derive(Parser, Debug)]
#[command(
    name = "firecast",
    about = "Brokerage portfolio aggregation, FIRE projection and fair-value estimates"
)]
pub struct Cli {
    #[arg(long, short, default_value = "firecast.json")]
    pub config: PathBuf,
    #[arg(long, help = "Overrides log.level from the config file")]
    pub log_level: Option<String>,
    #[arg(long, value_enum, help = "Overrides log.format from the config file")]
    pub log_format: Option<LogFormat>,
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Serve the JSON API.
    Serve {
        #[arg(long, default_value_t = 8080)]
        port: u16,
    },
    /// Aggregate every configured account.
    Portfolio {
        #[arg(long, default_value_t = 5)]
        top: usize,
    },
    Fire(FireArgs),
    Growth(GrowthArgs),
    FairValue {
        ticker: String,
    },
    Stock {
        ticker: String,
    },
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct FireArgs {
    #[arg(long, default_value_t = 30)]
    pub current_age: u32,
    #[arg(long, default_value_t = 65)]
    pub retirement_age: u32,
    #[arg(long, default_value_t = 90)]
    pub life_expectancy: u32,
    #[arg(long, default_value_t = 40_000.0)]
    pub annual_expenses: f64,
    #[arg(
        long,
        default_value_t = 100.0,
        help = "Retirement expenses as a percentage of current expenses"
    )]
    pub retirement_expense_modifier: f64,
    #[arg(long, default_value_t = 500.0)]
    pub monthly_investment: f64,
    #[arg(long, default_value_t = 200.0)]
    pub monthly_cash_savings: f64,
    #[arg(long, default_value_t = 0.0)]
    pub current_cash_savings: f64,
    #[arg(long, help = "Defaults to the aggregated portfolio total")]
    pub current_portfolio: Option<f64>,
    #[arg(long, help = "Defaults to the portfolio's blended dividend yield")]
    pub dividend_yield: Option<f64>,
    #[arg(long, default_value_t = 4.0)]
    pub withdrawal_rate: f64,
    #[arg(long, default_value_t = 2_000.0)]
    pub social_security: f64,
    #[arg(long, default_value_t = 0.0)]
    pub pension: f64,
    #[arg(long, help = "Market crash drop in percent")]
    pub crash_impact: Option<f64>,
    #[arg(long, help = "Also project every retirement age up to this age")]
    pub sweep_max_age: Option<u32>,
}

impl Default for FireArgs {
    fn default() -> Self {
        Self {
            current_age: 30,
            retirement_age: 65,
            life_expectancy: 90,
            annual_expenses: 40_000.0,
            retirement_expense_modifier: 100.0,
            monthly_investment: 500.0,
            monthly_cash_savings: 200.0,
            current_cash_savings: 0.0,
            current_portfolio: None,
            dividend_yield: None,
            withdrawal_rate: 4.0,
            social_security: 2_000.0,
            pension: 0.0,
            crash_impact: None,
            sweep_max_age: None,
        }
    }
}

/// Yield assumed when the portfolio cannot be read.
pub const DEFAULT_DIVIDEND_YIELD_PCT: f64 = 2.0;

/// Starting state taken from the aggregated portfolio for any input the
/// caller leaves unset.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PortfolioBaseline {
    pub total_equity: f64,
    pub dividend_yield_pct: f64,
}

impl Default for PortfolioBaseline {
    fn default() -> Self {
        Self {
            total_equity: 0.0,
            dividend_yield_pct: DEFAULT_DIVIDEND_YIELD_PCT,
        }
    }
}

fn invalid(msg: impl Into<String>) -> CoreError {
    CoreError::MalformedInput(msg.into())
}

fn non_negative(value: f64, flag: &str) -> CoreResult<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(invalid(format!("--{flag} must be >= 0")));
    }
    Ok(())
}

impl FireArgs {
    /// Whether any input falls back to the aggregated portfolio.
    pub fn needs_portfolio(&self) -> bool {
        self.current_portfolio.is_none() || self.dividend_yield.is_none()
    }

    pub fn plan_inputs(&self, baseline: PortfolioBaseline) -> CoreResult<FirePlanInputs> {
        if self.retirement_age < self.current_age {
            return Err(invalid("--retirement-age must be >= --current-age"));
        }
        if self.life_expectancy < self.retirement_age {
            return Err(invalid("--life-expectancy must be >= --retirement-age"));
        }
        if let Some(max_age) = self.sweep_max_age
            && max_age < self.current_age
        {
            return Err(invalid("--sweep-max-age must be >= --current-age"));
        }
        non_negative(self.annual_expenses, "annual-expenses")?;
        non_negative(self.retirement_expense_modifier, "retirement-expense-modifier")?;
        non_negative(self.monthly_investment, "monthly-investment")?;
        non_negative(self.monthly_cash_savings, "monthly-cash-savings")?;
        non_negative(self.current_cash_savings, "current-cash-savings")?;
        let dividend_yield = self.dividend_yield.unwrap_or(baseline.dividend_yield_pct);
        non_negative(dividend_yield, "dividend-yield")?;
        non_negative(self.social_security, "social-security")?;
        non_negative(self.pension, "pension")?;
        if !(self.withdrawal_rate > 0.0 && self.withdrawal_rate <= 100.0) {
            return Err(invalid("--withdrawal-rate must be in (0, 100]"));
        }
        let current_portfolio = self.current_portfolio.unwrap_or(baseline.total_equity);
        non_negative(current_portfolio, "current-portfolio")?;

        Ok(FirePlanInputs {
            current_age: self.current_age,
            retirement_age: self.retirement_age,
            life_expectancy: self.life_expectancy,
            annual_expenses: self.annual_expenses,
            retirement_expense_modifier_pct: self.retirement_expense_modifier,
            monthly_investment: self.monthly_investment,
            monthly_cash_savings: self.monthly_cash_savings,
            current_cash_savings: self.current_cash_savings,
            current_portfolio,
            portfolio_dividend_yield_pct: dividend_yield,
            safe_withdrawal_rate_pct: self.withdrawal_rate,
            monthly_social_security: self.social_security,
            monthly_pension: self.pension,
            crash_impact_pct: self.crash_impact,
        })
    }
}

#[derive(Args, Debug, Clone, PartialEq)]
pub struct GrowthArgs {
    #[arg(long, help = "Defaults to the aggregated portfolio total")]
    pub initial_amount: Option<f64>,
    #[arg(long, default_value_t = 500.0)]
    pub monthly_contribution: f64,
    #[arg(long, default_value_t = 10)]
    pub years: u32,
    #[arg(long, default_value_t = 7.0)]
    pub annual_return: f64,
    #[arg(long, default_value_t = 3.0)]
    pub inflation: f64,
    #[arg(long, help = "Defaults to the portfolio's blended dividend yield")]
    pub dividend_yield: Option<f64>,
    #[arg(long, default_value_t = true, action = clap::ArgAction::Set)]
    pub reinvest_dividends: bool,
}

impl Default for GrowthArgs {
    fn default() -> Self {
        Self {
            initial_amount: None,
            monthly_contribution: 500.0,
            years: 10,
            annual_return: 7.0,
            inflation: 3.0,
            dividend_yield: None,
            reinvest_dividends: true,
        }
    }
}

impl GrowthArgs {
    pub fn needs_portfolio(&self) -> bool {
        self.initial_amount.is_none() || self.dividend_yield.is_none()
    }

    pub fn growth_inputs(&self, baseline: PortfolioBaseline) -> CoreResult<GrowthInputs> {
        if self.years < 1 {
            return Err(invalid("--years must be >= 1"));
        }
        let initial_amount = self.initial_amount.unwrap_or(baseline.total_equity);
        let dividend_yield = self.dividend_yield.unwrap_or(baseline.dividend_yield_pct);
        non_negative(initial_amount, "initial-amount")?;
        non_negative(self.monthly_contribution, "monthly-contribution")?;
        non_negative(dividend_yield, "dividend-yield")?;
        if !self.annual_return.is_finite() || self.annual_return <= -100.0 {
            return Err(invalid("--annual-return must be > -100"));
        }
        if !self.inflation.is_finite() || self.inflation <= -100.0 {
            return Err(invalid("--inflation must be > -100"));
        }

        Ok(GrowthInputs {
            initial_amount,
            monthly_contribution: self.monthly_contribution,
            horizon_years: self.years,
            annual_return_pct: self.annual_return,
            inflation_pct: self.inflation,
            dividend_yield_pct: dividend_yield,
            reinvest_dividends: self.reinvest_dividends,
        })
    }
}
