//! TTL-cached market data access and derived analytics.
//!
//! [`MarketDataProvider`] memoizes bars per (symbol, timeframe) with a TTL
//! matching the bar length and quotes with a short TTL, validates bar
//! ordering and intra-session continuity, and assembles the per-symbol
//! [`IndicatorSnapshot`] the strategy consumes.

mod cache;
mod error;
mod provider;
mod snapshot;

pub use cache::TtlCache;
pub use error::MarketDataError;
pub use provider::MarketDataProvider;
pub use snapshot::{build_snapshot, gap_from_daily, IndicatorSnapshot};
