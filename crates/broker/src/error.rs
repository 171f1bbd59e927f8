//! Normalized broker error taxonomy.

use rest_client::RestError;
use thiserror::Error;

/// Errors surfaced by every broker adapter call.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// The account lacks buying power for the order.
    #[error("insufficient buying power")]
    InsufficientBuyingPower,

    /// The market is closed for the requested operation.
    #[error("market closed")]
    MarketClosed,

    /// The symbol is unknown to the brokerage.
    #[error("unknown symbol: {0}")]
    UnknownSymbol(String),

    /// A client order ID was reused.
    #[error("duplicate client order id: {0}")]
    DuplicateClientOrderId(String),

    /// Request throttled; retry after the suggested backoff.
    #[error("rate limited, retry after {retry_after_ms}ms")]
    RateLimited {
        /// Suggested wait before retrying.
        retry_after_ms: u64,
    },

    /// Transient failure (network, timeout, 5xx). Retryable.
    #[error("transient broker error: {0}")]
    Transient(String),

    /// The broker rejected the request outright.
    #[error("rejected: {0}")]
    Rejected(String),

    /// The referenced order already reached a terminal state.
    ///
    /// On cancel this is success; on replace it means the stop just filled.
    #[error("order already terminal")]
    AlreadyTerminal,
}

impl BrokerError {
    /// Whether the same call may be retried unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::RateLimited { .. })
    }

    /// Classify a REST-layer failure into the normalized taxonomy.
    ///
    /// `symbol` is used to enrich `UnknownSymbol`.
    pub fn classify(err: RestError, symbol: &str) -> Self {
        match err {
            RestError::RateLimited { retry_after_ms } => Self::RateLimited { retry_after_ms },
            RestError::Timeout | RestError::Connection(_) => Self::Transient(err.to_string()),
            RestError::Http { status, body } => Self::classify_http(status, &body, symbol),
            other => Self::Transient(other.to_string()),
        }
    }

    fn classify_http(status: u16, body: &str, symbol: &str) -> Self {
        let lower = body.to_ascii_lowercase();
        match status {
            403 if lower.contains("buying power") => Self::InsufficientBuyingPower,
            403 if lower.contains("market") && lower.contains("closed") => Self::MarketClosed,
            404 if lower.contains("symbol") || lower.contains("asset") => {
                Self::UnknownSymbol(symbol.to_string())
            }
            422 if lower.contains("client_order_id") && lower.contains("unique") => {
                Self::DuplicateClientOrderId(symbol.to_string())
            }
            422 if lower.contains("not cancelable")
                || lower.contains("already") && (lower.contains("filled") || lower.contains("done"))
                || lower.contains("terminal") =>
            {
                Self::AlreadyTerminal
            }
            s if s >= 500 => Self::Transient(format!("HTTP {s}: {body}")),
            _ => Self::Rejected(format!("HTTP {status}: {body}")),
        }
    }
}
