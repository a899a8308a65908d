use axum::{
    Router,
    extract::{Json, Path, Query, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::cli::{FireArgs, GrowthArgs, PortfolioBaseline};
use crate::config::AppConfig;
use crate::core::{
    CoreError, CoreResult, DividendYieldResolver, ErrorKind, FairValueEstimator, FairValueResult,
    FirePlan, GrowthSeries, GrowthSummary, MokaYieldCache, PortfolioAggregate, PortfolioSummary,
    RetirementSweep, StockSnapshot, aggregate, plan_fire, simulate, summarize, summarize_growth,
    sweep_plan,
};
use crate::market::{FixtureMarketData, MarketDataProvider};
use crate::reader::{AccountReader, CsvAccountReader};

const DEFAULT_TOP_N: usize = 5;

/// Everything a request needs: the account reader plus the market-data
/// backed services sharing one dividend cache.
pub struct AppState {
    reader: Arc<dyn AccountReader>,
    resolver: Arc<DividendYieldResolver>,
    estimator: FairValueEstimator,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioReport {
    pub portfolio: PortfolioAggregate,
    pub summary: PortfolioSummary,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FireReport {
    pub plan: FirePlan,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sweep: Option<RetirementSweep>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GrowthReport {
    pub series: GrowthSeries,
    pub summary: GrowthSummary,
}

impl AppState {
    pub fn new(reader: Arc<dyn AccountReader>, resolver: Arc<DividendYieldResolver>) -> Self {
        let estimator = FairValueEstimator::new(resolver.clone());
        Self {
            reader,
            resolver,
            estimator,
        }
    }

    pub fn from_config(config: &AppConfig) -> CoreResult<Self> {
        let provider: Arc<dyn MarketDataProvider> = Arc::new(
            FixtureMarketData::load(&config.market_data)
                .map_err(|e| CoreError::Configuration(e.to_string()))?,
        );
        let cache = Arc::new(MokaYieldCache::new(config.cache.policy()));
        let resolver = Arc::new(DividendYieldResolver::new(provider, cache));
        let reader = Arc::new(CsvAccountReader::new(config.accounts.clone()));
        Ok(Self::new(reader, resolver))
    }

    pub fn portfolio(&self) -> CoreResult<PortfolioAggregate> {
        let accounts = self.reader.read_accounts();
        aggregate(&accounts, self.resolver.as_ref())
    }

    pub fn portfolio_report(&self, top_n: usize) -> CoreResult<PortfolioReport> {
        let portfolio = self.portfolio()?;
        let summary = summarize(&portfolio, top_n);
        Ok(PortfolioReport { portfolio, summary })
    }

    /// Total equity and blended yield of the aggregated portfolio, or an
    /// empty portfolio at the default yield when no account can be read.
    fn portfolio_baseline(&self) -> PortfolioBaseline {
        match self.portfolio() {
            Ok(portfolio) => PortfolioBaseline {
                total_equity: portfolio.total_equity,
                dividend_yield_pct: summarize(&portfolio, 0).portfolio_dividend_yield_pct,
            },
            Err(e) => {
                warn!(error = %e, "portfolio unavailable, assuming an empty portfolio");
                PortfolioBaseline::default()
            }
        }
    }

    fn baseline_if(&self, needed: bool) -> PortfolioBaseline {
        if needed {
            self.portfolio_baseline()
        } else {
            PortfolioBaseline::default()
        }
    }

    pub fn fire(&self, args: &FireArgs) -> CoreResult<FireReport> {
        let baseline = self.baseline_if(args.needs_portfolio());
        let inputs = args.plan_inputs(baseline)?;
        let plan = plan_fire(&inputs)?;

        let sweep = args
            .sweep_max_age
            .map(|max_age| sweep_plan(&inputs, max_age))
            .transpose()?;

        Ok(FireReport { plan, sweep })
    }

    pub fn growth(&self, args: &GrowthArgs) -> CoreResult<GrowthReport> {
        let baseline = self.baseline_if(args.needs_portfolio());
        let inputs = args.growth_inputs(baseline)?;
        let series = simulate(&inputs)?;
        let summary = summarize_growth(&inputs, &series);
        Ok(GrowthReport { series, summary })
    }

    pub fn fair_value(&self, ticker: &str) -> CoreResult<FairValueResult> {
        self.estimator.estimate(ticker)
    }

    pub fn stock(&self, ticker: &str) -> CoreResult<StockSnapshot> {
        self.estimator.snapshot(ticker)
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    kind: &'static str,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct PortfolioQuery {
    top: Option<usize>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct FirePayload {
    current_age: Option<u32>,
    retirement_age: Option<u32>,
    life_expectancy: Option<u32>,
    annual_expenses: Option<f64>,
    retirement_expense_modifier: Option<f64>,
    monthly_investment: Option<f64>,
    monthly_cash_savings: Option<f64>,
    current_cash_savings: Option<f64>,
    current_portfolio: Option<f64>,
    dividend_yield: Option<f64>,
    withdrawal_rate: Option<f64>,
    social_security: Option<f64>,
    include_social_security: Option<bool>,
    pension: Option<f64>,
    include_pension: Option<bool>,
    crash_impact: Option<f64>,
    sweep_max_age: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct GrowthPayload {
    initial_amount: Option<f64>,
    monthly_contribution: Option<f64>,
    years: Option<u32>,
    annual_return: Option<f64>,
    inflation: Option<f64>,
    dividend_yield: Option<f64>,
    reinvest_dividends: Option<bool>,
}

fn fire_args_from_payload(payload: FirePayload) -> FireArgs {
    let mut args = FireArgs::default();

    if let Some(v) = payload.current_age {
        args.current_age = v;
    }
    if let Some(v) = payload.retirement_age {
        args.retirement_age = v;
    }
    if let Some(v) = payload.life_expectancy {
        args.life_expectancy = v;
    }
    if let Some(v) = payload.annual_expenses {
        args.annual_expenses = v;
    }
    if let Some(v) = payload.retirement_expense_modifier {
        args.retirement_expense_modifier = v;
    }
    if let Some(v) = payload.monthly_investment {
        args.monthly_investment = v;
    }
    if let Some(v) = payload.monthly_cash_savings {
        args.monthly_cash_savings = v;
    }
    if let Some(v) = payload.current_cash_savings {
        args.current_cash_savings = v;
    }
    if let Some(v) = payload.withdrawal_rate {
        args.withdrawal_rate = v;
    }
    if let Some(v) = payload.social_security {
        args.social_security = v;
    }
    if let Some(v) = payload.pension {
        args.pension = v;
    }
    if payload.include_social_security == Some(false) {
        args.social_security = 0.0;
    }
    if payload.include_pension == Some(false) {
        args.pension = 0.0;
    }
    args.current_portfolio = payload.current_portfolio;
    args.dividend_yield = payload.dividend_yield;
    args.crash_impact = payload.crash_impact;
    args.sweep_max_age = payload.sweep_max_age;

    args
}

fn growth_args_from_payload(payload: GrowthPayload) -> GrowthArgs {
    let mut args = GrowthArgs::default();

    if let Some(v) = payload.monthly_contribution {
        args.monthly_contribution = v;
    }
    if let Some(v) = payload.years {
        args.years = v;
    }
    if let Some(v) = payload.annual_return {
        args.annual_return = v;
    }
    if let Some(v) = payload.inflation {
        args.inflation = v;
    }
    if let Some(v) = payload.reinvest_dividends {
        args.reinvest_dividends = v;
    }
    args.initial_amount = payload.initial_amount;
    args.dividend_yield = payload.dividend_yield;

    args
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/health", get(health_handler))
        .route("/api/portfolio", get(portfolio_handler))
        .route("/api/fire", get(fire_get_handler).post(fire_post_handler))
        .route(
            "/api/growth",
            get(growth_get_handler).post(growth_post_handler),
        )
        .route("/api/fair-value/:ticker", get(fair_value_handler))
        .route("/api/stock/:ticker", get(stock_handler))
        .fallback(not_found_handler)
        .with_state(state)
}

pub async fn run_http_server(state: AppState, port: u16) -> std::io::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let app = router(Arc::new(state));

    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "firecast HTTP API listening");

    axum::serve(listener, app).await
}

async fn health_handler() -> Response {
    json_response(StatusCode::OK, HealthResponse { status: "ok" })
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found", "not-found")
}

async fn portfolio_handler(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PortfolioQuery>,
) -> Response {
    let top_n = query.top.unwrap_or(DEFAULT_TOP_N);
    run_blocking(move || state.portfolio_report(top_n)).await
}

async fn fire_get_handler(
    State(state): State<Arc<AppState>>,
    Query(payload): Query<FirePayload>,
) -> Response {
    fire_handler_impl(state, payload).await
}

async fn fire_post_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<FirePayload>,
) -> Response {
    fire_handler_impl(state, payload).await
}

async fn fire_handler_impl(state: Arc<AppState>, payload: FirePayload) -> Response {
    let args = fire_args_from_payload(payload);
    run_blocking(move || state.fire(&args)).await
}

async fn growth_get_handler(
    State(state): State<Arc<AppState>>,
    Query(payload): Query<GrowthPayload>,
) -> Response {
    growth_handler_impl(state, payload).await
}

async fn growth_post_handler(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<GrowthPayload>,
) -> Response {
    growth_handler_impl(state, payload).await
}

async fn growth_handler_impl(state: Arc<AppState>, payload: GrowthPayload) -> Response {
    let args = growth_args_from_payload(payload);
    run_blocking(move || state.growth(&args)).await
}

async fn fair_value_handler(
    State(state): State<Arc<AppState>>,
    Path(ticker): Path<String>,
) -> Response {
    run_blocking(move || state.fair_value(&ticker)).await
}

async fn stock_handler(
    State(state): State<Arc<AppState>>,
    Path(ticker): Path<String>,
) -> Response {
    run_blocking(move || state.stock(&ticker)).await
}

/// Market data and account files are read synchronously; keep that off the
/// async workers.
async fn run_blocking<T, F>(work: F) -> Response
where
    T: Serialize + Send + 'static,
    F: FnOnce() -> CoreResult<T> + Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(Ok(body)) => json_response(StatusCode::OK, body),
        Ok(Err(e)) => core_error_response(&e),
        Err(e) => {
            error!(error = %e, "request worker failed");
            error_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal error",
                "internal",
            )
        }
    }
}

fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::DataUnavailable => StatusCode::NOT_FOUND,
        ErrorKind::MalformedInput => StatusCode::BAD_REQUEST,
        ErrorKind::DomainInvalid => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::Configuration => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn kind_label(kind: ErrorKind) -> &'static str {
    match kind {
        ErrorKind::DataUnavailable => "data-unavailable",
        ErrorKind::MalformedInput => "malformed-input",
        ErrorKind::DomainInvalid => "domain-invalid",
        ErrorKind::Configuration => "configuration",
    }
}

fn core_error_response(err: &CoreError) -> Response {
    let kind = err.kind();
    if kind.is_fatal() {
        error!(error = %err, "request failed");
    }
    error_response(status_for(kind), &err.to_string(), kind_label(kind))
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-store"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str, kind: &'static str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
            kind,
        },
    )
}

#[cfg(test)]
fn fire_args_from_json(json: &str) -> Result<FireArgs, String> {
    let payload = serde_json::from_str::<FirePayload>(json)
        .map_err(|e| format!("Invalid API JSON payload: {e}"))?;
    Ok(fire_args_from_payload(payload))
}
