pub mod cache;
mod dividend;
mod errors;
mod fallback;
mod growth;
pub mod parse;
mod portfolio;
mod projector;
mod types;
mod valuation;

pub use cache::{CachePolicy, MokaYieldCache, YieldCache};
pub use dividend::{DividendYieldResolver, KNOWN_YIELD_TICKERS};
pub use errors::{CoreError, CoreResult, ErrorKind};
pub use growth::{simulate, summarize_growth};
pub use portfolio::{YieldSource, aggregate, summarize};
pub use projector::{plan_fire, project, sweep_plan, sweep_retirement_ages};
pub use types::{
    AccountSnapshot, ColumnMapping, ColumnRef, CrashScenario, FairValueResult, FairValueSources,
    FireInputs, FirePlan, FirePlanInputs, GrowthInputs, GrowthPoint, GrowthSeries, GrowthSummary,
    Holding, PortfolioAggregate, PortfolioSummary, ProjectionAssumptions, ProjectionResult,
    RawHoldingRow, RetirementSweep, RowWarning, StockSnapshot, SweepPoint, ValuationBand,
};
pub use valuation::{FairValueEstimator, MARKET_INDEX};
