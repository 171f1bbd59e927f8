//! Market-data error types.

use broker::BrokerError;
use thiserror::Error;

/// Errors surfaced by the market data provider.
#[derive(Debug, Error)]
pub enum MarketDataError {
    /// Data could not be produced for this symbol right now.
    ///
    /// Callers skip the symbol for the current tick; no setup is produced
    /// and nothing crashes.
    #[error("data unavailable for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },
}

impl MarketDataError {
    pub fn unavailable(symbol: &str, reason: impl Into<String>) -> Self {
        Self::DataUnavailable {
            symbol: symbol.to_string(),
            reason: reason.into(),
        }
    }

    pub fn from_broker(symbol: &str, err: BrokerError) -> Self {
        Self::unavailable(symbol, err.to_string())
    }
}
