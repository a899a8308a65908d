use std::collections::HashMap;
use std::fs;
use std::path::Path;

use chrono::Duration;
use serde::Deserialize;

use super::{
    FastQuote, FinancialStatements, InfoRecord, MarketDataError, MarketDataProvider, PriceBar,
    PriceTargets, StatementPeriod,
};

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct TickerFixture {
    history: Option<Vec<PriceBar>>,
    fast: Option<FastQuote>,
    info: Option<InfoRecord>,
    annual: Option<FinancialStatements>,
    quarterly: Option<FinancialStatements>,
    targets: Option<PriceTargets>,
}

/// Market data served from a JSON document keyed by ticker.
#[derive(Debug, Default)]
pub struct FixtureMarketData {
    tickers: HashMap<String, TickerFixture>,
}

impl FixtureMarketData {
    pub fn from_json(json: &str) -> Result<Self, MarketDataError> {
        let raw: HashMap<String, TickerFixture> =
            serde_json::from_str(json).map_err(|e| MarketDataError::Parse(e.to_string()))?;

        let tickers = raw
            .into_iter()
            .map(|(symbol, mut fixture)| {
                if let Some(history) = fixture.history.as_mut() {
                    history.sort_by_key(|bar| bar.date);
                }
                (symbol.trim().to_ascii_uppercase(), fixture)
            })
            .collect();

        Ok(Self { tickers })
    }

    pub fn load(path: &Path) -> Result<Self, MarketDataError> {
        let json = fs::read_to_string(path).map_err(|e| {
            MarketDataError::Unavailable(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_json(&json)
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.tickers.keys().map(String::as_str)
    }

    fn ticker(&self, symbol: &str) -> Option<&TickerFixture> {
        self.tickers.get(&symbol.trim().to_ascii_uppercase())
    }
}

impl MarketDataProvider for FixtureMarketData {
    fn price_history(
        &self,
        symbol: &str,
        lookback_days: u32,
    ) -> Result<Vec<PriceBar>, MarketDataError> {
        let history = self
            .ticker(symbol)
            .and_then(|t| t.history.as_ref())
            .filter(|h| !h.is_empty())
            .ok_or_else(|| MarketDataError::not_found(symbol, "history"))?;

        let Some(latest) = history.last().map(|bar| bar.date) else {
            return Err(MarketDataError::not_found(symbol, "history"));
        };
        let cutoff = latest - Duration::days(i64::from(lookback_days.max(1)));
        Ok(history
            .iter()
            .filter(|bar| bar.date > cutoff)
            .cloned()
            .collect())
    }

    fn fast_quote(&self, symbol: &str) -> Result<FastQuote, MarketDataError> {
        self.ticker(symbol)
            .and_then(|t| t.fast.clone())
            .ok_or_else(|| MarketDataError::not_found(symbol, "fast quote"))
    }

    fn info(&self, symbol: &str) -> Result<InfoRecord, MarketDataError> {
        self.ticker(symbol)
            .and_then(|t| t.info.clone())
            .ok_or_else(|| MarketDataError::not_found(symbol, "info"))
    }

    fn financials(
        &self,
        symbol: &str,
        period: StatementPeriod,
    ) -> Result<FinancialStatements, MarketDataError> {
        let (statements, dataset) = match period {
            StatementPeriod::Annual => (self.ticker(symbol).and_then(|t| t.annual.clone()), "annual"),
            StatementPeriod::Quarterly => (
                self.ticker(symbol).and_then(|t| t.quarterly.clone()),
                "quarterly",
            ),
        };
        statements.ok_or_else(|| MarketDataError::not_found(symbol, dataset))
    }

    fn price_targets(&self, symbol: &str) -> Result<PriceTargets, MarketDataError> {
        self.ticker(symbol)
            .and_then(|t| t.targets.clone())
            .ok_or_else(|| MarketDataError::not_found(symbol, "price targets"))
    }
}
