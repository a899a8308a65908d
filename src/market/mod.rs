use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod fixture;
#[cfg(test)]
pub(crate) mod testing;

pub use fixture::FixtureMarketData;

pub const BASIC_EPS: &str = "Basic EPS";
pub const NET_INCOME: &str = "Net Income";

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MarketDataError {
    #[error("no {dataset} data for {symbol}")]
    NotFound {
        symbol: String,
        dataset: &'static str,
    },
    #[error("provider unavailable: {0}")]
    Unavailable(String),
    #[error("failed to parse market data: {0}")]
    Parse(String),
}

impl MarketDataError {
    pub fn not_found(symbol: &str, dataset: &'static str) -> Self {
        MarketDataError::NotFound {
            symbol: symbol.to_string(),
            dataset,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceBar {
    pub date: NaiveDate,
    #[serde(default)]
    pub open: f64,
    #[serde(default)]
    pub high: f64,
    #[serde(default)]
    pub low: f64,
    pub close: f64,
    #[serde(default)]
    pub volume: f64,
    #[serde(default)]
    pub dividends: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FastQuote {
    pub last_price: Option<f64>,
    pub last_dividend: Option<f64>,
    pub shares_outstanding: Option<f64>,
    pub trailing_pe: Option<f64>,
}

/// Free-form summary record keyed by provider field names such as
/// `trailingPE`, `dividendYield` or `earningsGrowth`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InfoRecord {
    pub fields: HashMap<String, serde_json::Value>,
}

impl InfoRecord {
    pub fn number(&self, key: &str) -> Option<f64> {
        self.fields
            .get(key)
            .and_then(serde_json::Value::as_f64)
            .filter(|v| v.is_finite())
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(serde_json::Value::as_str)
    }
}

/// Statement line items, each ordered newest period first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FinancialStatements {
    pub line_items: HashMap<String, Vec<f64>>,
}

impl FinancialStatements {
    pub fn line(&self, name: &str) -> Option<&[f64]> {
        self.line_items
            .get(name)
            .map(Vec::as_slice)
            .filter(|values| !values.is_empty())
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum StatementPeriod {
    Annual,
    Quarterly,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PriceTargets {
    pub mean: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
}

pub const ONE_DAY: u32 = 1;
pub const ONE_YEAR: u32 = 365;

/// Per-ticker market data. Every dataset may be missing for a given ticker;
/// implementations report that as an error and never panic.
pub trait MarketDataProvider: Send + Sync {
    /// Daily bars within `lookback_days` calendar days of the latest bar,
    /// oldest first.
    fn price_history(
        &self,
        symbol: &str,
        lookback_days: u32,
    ) -> Result<Vec<PriceBar>, MarketDataError>;

    fn fast_quote(&self, symbol: &str) -> Result<FastQuote, MarketDataError>;

    fn info(&self, symbol: &str) -> Result<InfoRecord, MarketDataError>;

    fn financials(
        &self,
        symbol: &str,
        period: StatementPeriod,
    ) -> Result<FinancialStatements, MarketDataError>;

    fn price_targets(&self, symbol: &str) -> Result<PriceTargets, MarketDataError>;
}

pub fn latest_close(bars: &[PriceBar]) -> Option<f64> {
    bars.last().map(|bar| bar.close).filter(|close| close.is_finite())
}
