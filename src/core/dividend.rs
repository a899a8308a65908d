use std::sync::Arc;

use tracing::{debug, warn};

use super::cache::{MokaYieldCache, YieldCache};
use super::fallback::{Attempt, first_valid, is_positive_finite};
use crate::market::{MarketDataProvider, ONE_YEAR, latest_close};

/// Index and fund tickers known to pay dividends; their trailing history is
/// fetched a second time when every other source came back empty.
pub const KNOWN_YIELD_TICKERS: [&str; 4] = ["VTI", "SCHD", "VXUS", "VIG"];

struct YieldContext<'a> {
    provider: &'a dyn MarketDataProvider,
    symbol: &'a str,
}

fn trailing_history_yield(ctx: &YieldContext<'_>) -> Option<f64> {
    let bars = ctx.provider.price_history(ctx.symbol, ONE_YEAR).ok()?;
    let price = latest_close(&bars)?;
    if price <= 0.0 {
        return None;
    }
    let annual: f64 = bars.iter().map(|bar| bar.dividends).sum();
    Some(annual / price)
}

fn quick_quote_yield(ctx: &YieldContext<'_>) -> Option<f64> {
    let quote = ctx.provider.fast_quote(ctx.symbol).ok()?;
    let last_dividend = quote.last_dividend?;
    let price = quote.last_price.filter(|p| *p > 0.0)?;
    Some(last_dividend * 4.0 / price)
}

fn summary_yield(ctx: &YieldContext<'_>) -> Option<f64> {
    let info = ctx.provider.info(ctx.symbol).ok()?;
    let candidates = [
        info.number("dividendYield"),
        info.number("trailingAnnualDividendYield"),
        info.number("dividendRate")
            .zip(info.number("regularMarketPrice").filter(|p| *p > 0.0))
            .map(|(rate, price)| rate / price),
    ];
    candidates.into_iter().flatten().find(is_positive_finite)
}

fn known_ticker_history_yield(ctx: &YieldContext<'_>) -> Option<f64> {
    if !KNOWN_YIELD_TICKERS.contains(&ctx.symbol) {
        return None;
    }
    trailing_history_yield(ctx)
}

/// Resolves an annualized dividend yield (as a fraction) per symbol, memoized
/// through an injected [`YieldCache`].
pub struct DividendYieldResolver {
    provider: Arc<dyn MarketDataProvider>,
    cache: Arc<dyn YieldCache>,
}

impl DividendYieldResolver {
    pub fn new(provider: Arc<dyn MarketDataProvider>, cache: Arc<dyn YieldCache>) -> Self {
        Self { provider, cache }
    }

    pub fn with_default_cache(provider: Arc<dyn MarketDataProvider>) -> Self {
        Self::new(provider, Arc::new(MokaYieldCache::default()))
    }

    pub fn provider(&self) -> &Arc<dyn MarketDataProvider> {
        &self.provider
    }

    /// Never fails: a symbol no source can price resolves to `0`.
    pub fn resolve(&self, symbol: &str) -> f64 {
        let symbol = symbol.trim().to_ascii_uppercase();
        if let Some(cached) = self.cache.get(&symbol) {
            debug!(symbol = %symbol, yield_fraction = cached, "dividend yield cache hit");
            return cached;
        }

        let ctx = YieldContext {
            provider: self.provider.as_ref(),
            symbol: &symbol,
        };
        let chain = yield_chain();
        let resolved = match first_valid("dividend-yield", &ctx, &chain, is_positive_finite) {
            Some((source, value)) => {
                debug!(symbol = %symbol, source, yield_fraction = value, "resolved dividend yield");
                value
            }
            None => {
                warn!(symbol = %symbol, "no dividend yield source available, using 0");
                0.0
            }
        };

        self.cache.insert(&symbol, resolved);
        resolved
    }
}

fn yield_chain<'a>() -> [Attempt<YieldContext<'a>, f64>; 4] {
    [
        Attempt::new("trailing-history", trailing_history_yield),
        Attempt::new("quick-quote", quick_quote_yield),
        Attempt::new("summary", summary_yield),
        Attempt::new("known-ticker-history", known_ticker_history_yield),
    ]
}
