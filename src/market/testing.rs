use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use chrono::{Duration, NaiveDate};

use super::{
    FastQuote, FinancialStatements, InfoRecord, MarketDataError, MarketDataProvider, PriceBar,
    PriceTargets, StatementPeriod,
};

#[derive(Default, Clone)]
struct TickerStub {
    history: Option<Vec<PriceBar>>,
    fast: Option<FastQuote>,
    info: Option<InfoRecord>,
    annual: Option<FinancialStatements>,
    quarterly: Option<FinancialStatements>,
    targets: Option<PriceTargets>,
}

/// In-memory provider that counts every call so tests can observe caching.
#[derive(Default)]
pub(crate) struct StubProvider {
    tickers: HashMap<String, TickerStub>,
    history_calls: AtomicUsize,
    total_calls: AtomicUsize,
}

pub(crate) fn daily_bars(closes: &[f64], dividends: &[f64]) -> Vec<PriceBar> {
    let start = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap_or_default();
    closes
        .iter()
        .enumerate()
        .map(|(idx, &close)| PriceBar {
            date: start + Duration::days(idx as i64),
            open: close,
            high: close,
            low: close,
            close,
            volume: 1_000.0,
            dividends: dividends.get(idx).copied().unwrap_or(0.0),
        })
        .collect()
}

pub(crate) fn statements(line: &str, values: &[f64]) -> FinancialStatements {
    let mut statements = FinancialStatements::default();
    statements
        .line_items
        .insert(line.to_string(), values.to_vec());
    statements
}

pub(crate) fn info(fields: serde_json::Value) -> InfoRecord {
    serde_json::from_value(fields).expect("info fixture must be an object")
}

impl StubProvider {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    fn entry(&mut self, symbol: &str) -> &mut TickerStub {
        self.tickers.entry(symbol.to_string()).or_default()
    }

    pub(crate) fn with_history(mut self, symbol: &str, bars: Vec<PriceBar>) -> Self {
        self.entry(symbol).history = Some(bars);
        self
    }

    pub(crate) fn with_fast(mut self, symbol: &str, fast: FastQuote) -> Self {
        self.entry(symbol).fast = Some(fast);
        self
    }

    pub(crate) fn with_info(mut self, symbol: &str, info: InfoRecord) -> Self {
        self.entry(symbol).info = Some(info);
        self
    }

    pub(crate) fn with_annual(mut self, symbol: &str, statements: FinancialStatements) -> Self {
        self.entry(symbol).annual = Some(statements);
        self
    }

    pub(crate) fn with_quarterly(mut self, symbol: &str, statements: FinancialStatements) -> Self {
        self.entry(symbol).quarterly = Some(statements);
        self
    }

    pub(crate) fn with_targets(mut self, symbol: &str, targets: PriceTargets) -> Self {
        self.entry(symbol).targets = Some(targets);
        self
    }

    pub(crate) fn history_calls(&self) -> usize {
        self.history_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn total_calls(&self) -> usize {
        self.total_calls.load(Ordering::SeqCst)
    }

    fn lookup(&self, symbol: &str) -> Option<&TickerStub> {
        self.total_calls.fetch_add(1, Ordering::SeqCst);
        self.tickers.get(symbol)
    }
}

impl MarketDataProvider for StubProvider {
    fn price_history(
        &self,
        symbol: &str,
        lookback_days: u32,
    ) -> Result<Vec<PriceBar>, MarketDataError> {
        self.history_calls.fetch_add(1, Ordering::SeqCst);
        let bars = self
            .lookup(symbol)
            .and_then(|t| t.history.clone())
            .ok_or_else(|| MarketDataError::not_found(symbol, "history"))?;
        let keep = (lookback_days as usize).max(1);
        let skip = bars.len().saturating_sub(keep);
        Ok(bars.into_iter().skip(skip).collect())
    }

    fn fast_quote(&self, symbol: &str) -> Result<FastQuote, MarketDataError> {
        self.lookup(symbol)
            .and_then(|t| t.fast.clone())
            .ok_or_else(|| MarketDataError::not_found(symbol, "fast quote"))
    }

    fn info(&self, symbol: &str) -> Result<InfoRecord, MarketDataError> {
        self.lookup(symbol)
            .and_then(|t| t.info.clone())
            .ok_or_else(|| MarketDataError::not_found(symbol, "info"))
    }

    fn financials(
        &self,
        symbol: &str,
        period: StatementPeriod,
    ) -> Result<FinancialStatements, MarketDataError> {
        let ticker = self.lookup(symbol);
        let statements = match period {
            StatementPeriod::Annual => ticker.and_then(|t| t.annual.clone()),
            StatementPeriod::Quarterly => ticker.and_then(|t| t.quarterly.clone()),
        };
        statements.ok_or_else(|| MarketDataError::not_found(symbol, "financials"))
    }

    fn price_targets(&self, symbol: &str) -> Result<PriceTargets, MarketDataError> {
        self.lookup(symbol)
            .and_then(|t| t.targets.clone())
            .ok_or_else(|| MarketDataError::not_found(symbol, "price targets"))
    }
}
