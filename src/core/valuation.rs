use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::{debug, warn};

use super::dividend::DividendYieldResolver;
use super::errors::{CoreError, CoreResult};
use super::fallback::{Attempt, first_valid, is_finite, is_positive_finite};
use super::types::{FairValueResult, FairValueSources, StockSnapshot, ValuationBand};
use crate::market::{
    BASIC_EPS, MarketDataProvider, NET_INCOME, ONE_DAY, ONE_YEAR, PriceBar, StatementPeriod,
    latest_close,
};

pub const MARKET_INDEX: &str = "^GSPC";
const MAX_PRICE_MULTIPLE: f64 = 5.0;
const QUARTERS_PER_YEAR: usize = 4;

struct PricedTicker<'a> {
    provider: &'a dyn MarketDataProvider,
    symbol: &'a str,
    price: f64,
}

impl PricedTicker<'_> {
    fn eps(&self, period: StatementPeriod) -> Option<Vec<f64>> {
        let statements = self.provider.financials(self.symbol, period).ok()?;
        statements.line(BASIC_EPS).map(<[f64]>::to_vec)
    }
}

fn quick_quote_pe(ctx: &PricedTicker<'_>) -> Option<f64> {
    ctx.provider.fast_quote(ctx.symbol).ok()?.trailing_pe
}

fn summary_pe(ctx: &PricedTicker<'_>) -> Option<f64> {
    let info = ctx.provider.info(ctx.symbol).ok()?;
    info.number("trailingPE")
        .filter(is_positive_finite)
        .or_else(|| info.number("forwardPE"))
}

fn annual_eps_pe(ctx: &PricedTicker<'_>) -> Option<f64> {
    let latest = *ctx.eps(StatementPeriod::Annual)?.first()?;
    (latest > 0.0).then(|| ctx.price / latest)
}

fn trailing_eps_pe(ctx: &PricedTicker<'_>) -> Option<f64> {
    let quarters = ctx.eps(StatementPeriod::Quarterly)?;
    let ttm: f64 = quarters.iter().take(QUARTERS_PER_YEAR).sum();
    (ttm > 0.0).then(|| ctx.price / ttm)
}

fn pe_chain<'a>() -> [Attempt<PricedTicker<'a>, f64>; 4] {
    [
        Attempt::new("quick-quote", quick_quote_pe),
        Attempt::new("summary", summary_pe),
        Attempt::new("annual-eps", annual_eps_pe),
        Attempt::new("ttm-eps", trailing_eps_pe),
    ]
}

/// Geometric mean growth across the annual EPS history, newest first.
fn annual_eps_growth(ctx: &PricedTicker<'_>) -> Option<f64> {
    let history = ctx.eps(StatementPeriod::Annual)?;
    let (&newest, &oldest) = (history.first()?, history.last()?);
    if history.len() < 2 || newest <= 0.0 || oldest <= 0.0 {
        return None;
    }
    Some(((newest / oldest).powf(1.0 / history.len() as f64) - 1.0) * 100.0)
}

fn quarterly_eps_growth(ctx: &PricedTicker<'_>) -> Option<f64> {
    let quarters = ctx.eps(StatementPeriod::Quarterly)?;
    let (&current, &year_ago) = (quarters.first()?, quarters.get(QUARTERS_PER_YEAR)?);
    if year_ago == 0.0 {
        return None;
    }
    Some((current / year_ago - 1.0) * 100.0)
}

fn summary_eps_growth(ctx: &PricedTicker<'_>) -> Option<f64> {
    let info = ctx.provider.info(ctx.symbol).ok()?;
    ["earningsGrowth", "earningsQuarterlyGrowth"]
        .into_iter()
        .filter_map(|key| info.number(key))
        .find(|growth| *growth != 0.0)
        .map(|growth| growth * 100.0)
}

fn growth_chain<'a>() -> [Attempt<PricedTicker<'a>, f64>; 3] {
    [
        Attempt::new("annual-eps", annual_eps_growth),
        Attempt::new("quarterly-eps", quarterly_eps_growth),
        Attempt::new("summary", summary_eps_growth),
    ]
}

fn summary_dividend_pct(ctx: &PricedTicker<'_>) -> Option<f64> {
    let info = ctx.provider.info(ctx.symbol).ok()?;
    info.number("dividendYield")
        .filter(is_positive_finite)
        .or_else(|| info.number("trailingAnnualDividendYield"))
        .map(|fraction| fraction * 100.0)
}

/// Daily close-to-close returns for the dates both series share.
fn aligned_returns(stock: &[PriceBar], market: &[PriceBar]) -> Vec<(f64, f64)> {
    let market_closes: BTreeMap<NaiveDate, f64> =
        market.iter().map(|bar| (bar.date, bar.close)).collect();
    let paired: Vec<(f64, f64)> = stock
        .iter()
        .filter_map(|bar| market_closes.get(&bar.date).map(|m| (bar.close, *m)))
        .collect();

    paired
        .windows(2)
        .filter(|w| w[0].0 != 0.0 && w[0].1 != 0.0)
        .map(|w| (w[1].0 / w[0].0 - 1.0, w[1].1 / w[0].1 - 1.0))
        .collect()
}

fn beta(stock: &[PriceBar], market: &[PriceBar]) -> Option<f64> {
    let returns = aligned_returns(stock, market);
    if returns.len() < 2 {
        return None;
    }
    let n = returns.len() as f64;
    let mean_stock = returns.iter().map(|r| r.0).sum::<f64>() / n;
    let mean_market = returns.iter().map(|r| r.1).sum::<f64>() / n;
    let covariance = returns
        .iter()
        .map(|(s, m)| (s - mean_stock) * (m - mean_market))
        .sum::<f64>()
        / (n - 1.0);
    let variance = returns
        .iter()
        .map(|(_, m)| (m - mean_market).powi(2))
        .sum::<f64>()
        / (n - 1.0);
    (variance > 0.0).then(|| covariance / variance).filter(|b| b.is_finite())
}

/// Growth-and-income adjusted valuation of a single ticker.
pub struct FairValueEstimator {
    resolver: Arc<DividendYieldResolver>,
}

impl FairValueEstimator {
    pub fn new(resolver: Arc<DividendYieldResolver>) -> Self {
        Self { resolver }
    }

    fn provider(&self) -> &dyn MarketDataProvider {
        self.resolver.provider().as_ref()
    }

    fn current_price(&self, symbol: &str, lookback_days: u32) -> CoreResult<(Vec<PriceBar>, f64)> {
        let bars = self
            .provider()
            .price_history(symbol, lookback_days)
            .map_err(|e| CoreError::DataUnavailable(format!("no price data for {symbol}: {e}")))?;
        let price = latest_close(&bars)
            .filter(|p| *p > 0.0)
            .ok_or_else(|| CoreError::DataUnavailable(format!("no price data for {symbol}")))?;
        Ok((bars, price))
    }

    pub fn estimate(&self, ticker: &str) -> CoreResult<FairValueResult> {
        let symbol = ticker.trim().to_ascii_uppercase();
        let (_, current_price) = self.current_price(&symbol, ONE_DAY)?;
        let ctx = PricedTicker {
            provider: self.provider(),
            symbol: &symbol,
            price: current_price,
        };

        let pe = pe_chain();
        let (pe_source, pe_ratio) = first_valid("pe-ratio", &ctx, &pe, is_positive_finite)
            .ok_or_else(|| CoreError::NoPeRatio {
                ticker: symbol.clone(),
            })?;

        let growth = growth_chain();
        let (growth_source, eps_growth_pct) =
            first_valid("eps-growth", &ctx, &growth, is_finite).unwrap_or(("default", 0.0));

        let resolved = self.resolver.resolve(&symbol) * 100.0;
        let (dividend_source, dividend_yield_pct) = if resolved > 0.0 {
            ("resolver", resolved)
        } else {
            summary_dividend_pct(&ctx)
                .filter(is_positive_finite)
                .map_or(("none", 0.0), |pct| ("summary", pct))
        };

        let peg_ratio = if eps_growth_pct <= 0.0 {
            pe_ratio
        } else {
            pe_ratio / eps_growth_pct
        };
        let fair_value = (pe_ratio / peg_ratio) * (eps_growth_pct + dividend_yield_pct);
        debug!(
            ticker = %symbol,
            pe_ratio,
            pe_source,
            eps_growth_pct,
            growth_source,
            dividend_yield_pct,
            fair_value,
            "estimated fair value"
        );

        if fair_value <= 0.0 || !fair_value.is_finite() {
            warn!(ticker = %symbol, fair_value, "rejected non-positive fair value");
            return Err(CoreError::NonPositiveFairValue {
                ticker: symbol,
                fair_value,
            });
        }
        if fair_value > current_price * MAX_PRICE_MULTIPLE {
            warn!(ticker = %symbol, fair_value, current_price, "rejected outsized fair value");
            return Err(CoreError::UnreasonablyHighFairValue {
                ticker: symbol,
                fair_value,
                current_price,
            });
        }

        let valuation_ratio = current_price / fair_value;
        Ok(FairValueResult {
            ticker: symbol,
            fair_value,
            current_price,
            pe_ratio,
            peg_ratio,
            eps_growth_pct,
            dividend_yield_pct,
            valuation_ratio,
            band: ValuationBand::from_ratio(valuation_ratio),
            sources: FairValueSources {
                pe_ratio: pe_source,
                eps_growth: growth_source,
                dividend_yield: dividend_source,
            },
        })
    }

    /// One-year market snapshot. Every metric other than price degrades to 0
    /// when its data is missing.
    pub fn snapshot(&self, ticker: &str) -> CoreResult<StockSnapshot> {
        let symbol = ticker.trim().to_ascii_uppercase();
        let (history, current_price) = self.current_price(&symbol, ONE_YEAR)?;
        let provider = self.provider();

        let week_52_high = history
            .iter()
            .map(|b| b.high.max(b.close))
            .fold(f64::MIN, f64::max);
        let week_52_low = history
            .iter()
            .map(|b| if b.low > 0.0 { b.low.min(b.close) } else { b.close })
            .fold(f64::MAX, f64::min);

        let shares = provider
            .fast_quote(&symbol)
            .ok()
            .and_then(|q| q.shares_outstanding)
            .filter(|s| *s > 0.0);
        let market_cap = shares.map_or(0.0, |s| s * current_price);

        let ttm_net_income = provider
            .financials(&symbol, StatementPeriod::Quarterly)
            .ok()
            .and_then(|f| {
                f.line(NET_INCOME)
                    .map(|q| q.iter().take(QUARTERS_PER_YEAR).sum::<f64>())
            });
        let pe_ratio = match (ttm_net_income, shares) {
            (Some(income), Some(_)) if income > 0.0 => market_cap / income,
            _ => 0.0,
        };

        let forward_ratio = provider
            .price_targets(&symbol)
            .ok()
            .and_then(|t| t.mean)
            .map_or(0.0, |mean| mean / current_price);

        let year_ago = history.first().map_or(0.0, |b| b.close);
        let growth_pct = if year_ago > 0.0 {
            (current_price / year_ago - 1.0) * 100.0
        } else {
            0.0
        };
        let peg_ratio = if growth_pct > 0.0 && pe_ratio > 0.0 {
            pe_ratio / growth_pct
        } else {
            0.0
        };

        let beta = provider
            .price_history(MARKET_INDEX, ONE_YEAR)
            .ok()
            .and_then(|market| beta(&history, &market))
            .unwrap_or(0.0);

        let name = provider.info(&symbol).ok().and_then(|info| {
            info.text("longName")
                .or_else(|| info.text("shortName"))
                .map(str::to_string)
        });

        Ok(StockSnapshot {
            ticker: symbol,
            name,
            current_price,
            week_52_high,
            week_52_low,
            market_cap,
            pe_ratio,
            forward_ratio,
            peg_ratio,
            beta,
        })
    }
}
