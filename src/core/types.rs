use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Holding {
    pub symbol: String,
    pub name: String,
    pub equity: f64,
    pub cost: f64,
    pub gain_loss: f64,
    pub return_pct: f64,
    pub dividend_yield_pct: f64,
    pub annual_dividend: f64,
    pub allocation_pct: f64,
    pub accounts: BTreeSet<String>,
}

/// Positional index or header name of a column in an account export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnRef {
    Index(usize),
    Header(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMapping {
    pub symbol: ColumnRef,
    pub name: ColumnRef,
    pub equity: ColumnRef,
    pub cost: ColumnRef,
    pub gain_loss: ColumnRef,
    #[serde(default)]
    pub allocation: Option<ColumnRef>,
    #[serde(default)]
    pub annual_dividend: Option<ColumnRef>,
    #[serde(default)]
    pub dividend_yield: Option<ColumnRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawHoldingRow {
    pub cells: Vec<String>,
}

impl RawHoldingRow {
    pub fn cell(&self, index: usize) -> Option<&str> {
        self.cells.get(index).map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for RawHoldingRow {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            cells: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// One account's export: data rows (the last one is the broker's subtotal),
/// optional header names and the mapping that locates each field.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountSnapshot {
    pub headers: Option<Vec<String>>,
    pub rows: Vec<RawHoldingRow>,
    pub mapping: ColumnMapping,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RowWarning {
    pub account: String,
    /// `None` for problems that affect every row of the account.
    pub row: Option<usize>,
    pub field: &'static str,
    pub raw: String,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioAggregate {
    pub total_equity: f64,
    pub holdings: BTreeMap<String, Holding>,
    pub warnings: Vec<RowWarning>,
    pub failed_accounts: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioSummary {
    pub total_equity: f64,
    pub total_cost: f64,
    pub total_gain_loss: f64,
    pub total_annual_dividend: f64,
    pub portfolio_dividend_yield_pct: f64,
    pub holding_count: usize,
    pub best_performers: Vec<Holding>,
    pub worst_performers: Vec<Holding>,
    pub largest_allocations: Vec<Holding>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FireInputs {
    pub retirement_age: u32,
    pub annual_expenses_net: f64,
    pub current_age: u32,
    pub monthly_investment: f64,
    pub monthly_cash_savings: f64,
    pub current_cash_savings: f64,
    /// Fraction, e.g. 0.02 for 2%.
    pub portfolio_dividend_yield: f64,
    pub current_portfolio: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectionAssumptions {
    pub investment_return: f64,
    pub cash_return: f64,
    pub safe_withdrawal_rate: f64,
}

impl Default for ProjectionAssumptions {
    fn default() -> Self {
        Self {
            investment_return: 0.07,
            cash_return: 0.02,
            safe_withdrawal_rate: 0.04,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectionResult {
    pub current_portfolio: f64,
    pub current_cash_savings: f64,
    pub current_dividend_income: f64,
    pub future_portfolio_value: f64,
    pub future_cash_savings: f64,
    pub total_future_value: f64,
    pub projected_dividend_income: f64,
    pub safe_withdrawal_amount: f64,
    pub total_retirement_income: f64,
    pub required_portfolio: f64,
    pub shortfall: f64,
    pub additional_monthly_needed: f64,
    pub years_to_fire: i32,
    pub required_monthly_investment: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FirePlanInputs {
    pub current_age: u32,
    pub retirement_age: u32,
    pub life_expectancy: u32,
    pub annual_expenses: f64,
    pub retirement_expense_modifier_pct: f64,
    pub monthly_investment: f64,
    pub monthly_cash_savings: f64,
    pub current_cash_savings: f64,
    pub current_portfolio: f64,
    pub portfolio_dividend_yield_pct: f64,
    pub safe_withdrawal_rate_pct: f64,
    pub monthly_social_security: f64,
    pub monthly_pension: f64,
    pub crash_impact_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrashScenario {
    pub impact_pct: f64,
    pub portfolio_after_crash: f64,
    pub additional_needed: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FirePlan {
    pub retirement_annual_expenses: f64,
    pub other_retirement_income: f64,
    pub net_annual_expenses: f64,
    pub fire_number: f64,
    pub retirement_years: i32,
    /// `None` when dividends cover expenses and the portfolio is never drawn down.
    pub years_covered: Option<f64>,
    pub projection: ProjectionResult,
    pub crash: Option<CrashScenario>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SweepPoint {
    pub retirement_age: u32,
    pub projection: ProjectionResult,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetirementSweep {
    pub points: Vec<SweepPoint>,
    pub selected_index: Option<usize>,
    pub best_index: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GrowthInputs {
    pub initial_amount: f64,
    pub monthly_contribution: f64,
    pub horizon_years: u32,
    pub annual_return_pct: f64,
    pub inflation_pct: f64,
    pub dividend_yield_pct: f64,
    pub reinvest_dividends: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GrowthPoint {
    pub year: u32,
    pub nominal_value: f64,
    pub real_value: f64,
    pub annual_dividend_income: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct GrowthSeries {
    pub points: Vec<GrowthPoint>,
}

impl GrowthSeries {
    pub fn last(&self) -> Option<&GrowthPoint> {
        self.points.last()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GrowthSummary {
    pub final_nominal_value: f64,
    pub final_real_value: f64,
    pub total_contributions: f64,
    pub investment_growth: f64,
    pub roi_pct: f64,
    pub final_annual_dividend_income: f64,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ValuationBand {
    OverValued,
    UnderValued,
    Fair,
}

impl ValuationBand {
    pub fn from_ratio(valuation_ratio: f64) -> Self {
        if valuation_ratio > 1.1 {
            ValuationBand::OverValued
        } else if valuation_ratio < 0.9 {
            ValuationBand::UnderValued
        } else {
            ValuationBand::Fair
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FairValueSources {
    pub pe_ratio: &'static str,
    pub eps_growth: &'static str,
    pub dividend_yield: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FairValueResult {
    pub ticker: String,
    pub fair_value: f64,
    pub current_price: f64,
    pub pe_ratio: f64,
    pub peg_ratio: f64,
    pub eps_growth_pct: f64,
    pub dividend_yield_pct: f64,
    pub valuation_ratio: f64,
    pub band: ValuationBand,
    pub sources: FairValueSources,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockSnapshot {
    pub ticker: String,
    pub name: Option<String>,
    pub current_price: f64,
    pub week_52_high: f64,
    pub week_52_low: f64,
    pub market_cap: f64,
    pub pe_ratio: f64,
    pub forward_ratio: f64,
    pub peg_ratio: f64,
    pub beta: f64,
}
