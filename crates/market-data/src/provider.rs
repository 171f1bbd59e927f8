//! Cached bars/quote provider.

use crate::cache::TtlCache;
use crate::error::MarketDataError;
use broker::SharedBroker;
use chrono::Duration as ChronoDuration;
use model::{Bar, Quote, Timeframe};
use std::time::Duration;

/// Quote TTL: quotes older than this are refetched.
const QUOTE_TTL: Duration = Duration::from_secs(2);

/// Minimum window fetched for intraday bars so indicator warmup is covered
/// regardless of the caller's `n`.
const MIN_FETCH: usize = 120;

/// TTL-cached view over the broker's market-data endpoints.
///
/// Bars are cached per (symbol, timeframe) with a TTL equal to the bar
/// length; quotes for at most [`QUOTE_TTL`]. Stale reads refetch; broker
/// failures surface as [`MarketDataError::DataUnavailable`] so callers skip
/// the symbol for the tick.
pub struct MarketDataProvider {
    broker: SharedBroker,
    bars: TtlCache<(String, Timeframe), Vec<Bar>>,
    quotes: TtlCache<String, Quote>,
}

impl MarketDataProvider {
    pub fn new(broker: SharedBroker) -> Self {
        Self {
            broker,
            bars: TtlCache::new(),
            quotes: TtlCache::new(),
        }
    }

    /// Last `n` bars for the symbol in strictly ascending timestamp order.
    ///
    /// Bars are validated: out-of-order or intra-session gaps fail the
    /// request rather than fabricating data.
    pub async fn bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        n: usize,
    ) -> Result<Vec<Bar>, MarketDataError> {
        let key = (symbol.to_string(), timeframe);

        if let Some(cached) = self.bars.get(&key) {
            if cached.len() >= n {
                return Ok(cached[cached.len() - n..].to_vec());
            }
        }

        let fetch_n = n.max(MIN_FETCH);
        let fetched = self
            .broker
            .bars(symbol, timeframe, fetch_n)
            .await
            .map_err(|e| MarketDataError::from_broker(symbol, e))?;

        validate_bars(symbol, timeframe, &fetched)?;

        if fetched.len() < n {
            return Err(MarketDataError::unavailable(
                symbol,
                format!("only {} of {} bars available", fetched.len(), n),
            ));
        }

        self.bars
            .insert(key, fetched.clone(), timeframe.bar_length());
        Ok(fetched[fetched.len() - n..].to_vec())
    }

    /// Latest quote, cached for up to two seconds.
    pub async fn last(&self, symbol: &str) -> Result<Quote, MarketDataError> {
        if let Some(cached) = self.quotes.get(&symbol.to_string()) {
            return Ok(cached);
        }

        let quote = self
            .broker
            .last_trade(symbol)
            .await
            .map_err(|e| MarketDataError::from_broker(symbol, e))?;

        self.quotes
            .insert(symbol.to_string(), quote.clone(), QUOTE_TTL);
        Ok(quote)
    }

    /// Drop any cached quote so the next read hits the wire.
    pub fn invalidate_quote(&self, symbol: &str) {
        self.quotes.invalidate(&symbol.to_string());
    }
}

/// Ascending order everywhere; fixed spacing between bars of the same
/// trading day for intraday timeframes.
fn validate_bars(
    symbol: &str,
    timeframe: Timeframe,
    bars: &[Bar],
) -> Result<(), MarketDataError> {
    let step = ChronoDuration::from_std(timeframe.bar_length()).unwrap_or(ChronoDuration::zero());

    for w in bars.windows(2) {
        let (prev, next) = (&w[0], &w[1]);
        if next.timestamp <= prev.timestamp {
            return Err(MarketDataError::unavailable(
                symbol,
                format!("bars out of order at {}", next.timestamp),
            ));
        }
        if timeframe.is_intraday()
            && prev.timestamp.date_naive() == next.timestamp.date_naive()
            && next.timestamp - prev.timestamp != step
        {
            return Err(MarketDataError::unavailable(
                symbol,
                format!("missing bar before {}", next.timestamp),
            ));
        }
    }
    Ok(())
}
