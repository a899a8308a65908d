use serde::Serialize;
use thiserror::Error;

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorKind {
    DataUnavailable,
    MalformedInput,
    DomainInvalid,
    Configuration,
}

impl ErrorKind {
    /// Only configuration failures abort a whole request; the other kinds are
    /// scoped to one symbol, row or ticker.
    pub fn is_fatal(self) -> bool {
        matches!(self, ErrorKind::Configuration)
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    #[error("data unavailable: {0}")]
    DataUnavailable(String),

    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("no P/E available for {ticker}")]
    NoPeRatio { ticker: String },

    #[error("non-positive fair value for {ticker}: {fair_value:.4}")]
    NonPositiveFairValue { ticker: String, fair_value: f64 },

    #[error(
        "unreasonably high fair value for {ticker}: {fair_value:.2} exceeds 5x current price {current_price:.2}"
    )]
    UnreasonablyHighFairValue {
        ticker: String,
        fair_value: f64,
        current_price: f64,
    },

    #[error("no account data could be read (failed accounts: {})", failed_accounts.join(", "))]
    NoAccountData { failed_accounts: Vec<String> },

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CoreError::DataUnavailable(_) => ErrorKind::DataUnavailable,
            CoreError::MalformedInput(_) => ErrorKind::MalformedInput,
            CoreError::NoPeRatio { .. }
            | CoreError::NonPositiveFairValue { .. }
            | CoreError::UnreasonablyHighFairValue { .. } => ErrorKind::DomainInvalid,
            CoreError::NoAccountData { .. } | CoreError::Configuration(_) => {
                ErrorKind::Configuration
            }
        }
    }
}

pub type CoreResult<T> = std::result::Result<T, CoreError>;
