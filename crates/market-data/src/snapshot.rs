//! Derived per-symbol analytics.

use chrono::{DateTime, Utc};
use indicators::{
    atr, macd, macd_divergence, rolling_high, rolling_low, rsi, vwap, Divergence, MacdCross,
    DEFAULT_FAST, DEFAULT_SIGNAL, DEFAULT_SLOW,
};
use model::{Bar, GapObservation};
use rust_decimal::Decimal;

/// Divergence scan window (bars).
const DIVERGENCE_WINDOW: usize = 20;
/// Support/resistance and average-volume window (bars/days).
const LEVEL_WINDOW: usize = 20;
/// Wilder period for RSI/ATR.
const WILDER_PERIOD: usize = 14;

/// Everything the strategy needs to score one symbol. Derived, never
/// persisted.
#[derive(Debug, Clone)]
pub struct IndicatorSnapshot {
    pub rsi14: f64,
    pub atr14: f64,
    pub macd_line: f64,
    pub macd_signal: f64,
    pub macd_hist: f64,
    pub macd_cross: MacdCross,
    pub macd_divergence: Divergence,
    /// Session-cumulative VWAP.
    pub vwap: Decimal,
    pub support20: Decimal,
    pub resistance20: Decimal,
    /// Mean full-session volume over the prior 20 days.
    pub avg_volume20: f64,
    /// Today's cumulative volume vs. the pace implied by `avg_volume20`.
    pub cumulative_volume_ratio: f64,
}

/// Assemble a snapshot from a trailing 5-minute window and daily history.
///
/// `bars_5m` may span several sessions (indicator warmup); bars at or after
/// `session_start` feed the session-cumulative VWAP and volume pace.
/// `daily_bars` must end with today's partial bar. `session_fraction` is the
/// elapsed share of the regular session in (0, 1].
///
/// Returns `None` when any indicator is still warming up.
pub fn build_snapshot(
    bars_5m: &[Bar],
    daily_bars: &[Bar],
    session_start: DateTime<Utc>,
    session_fraction: f64,
) -> Option<IndicatorSnapshot> {
    let closes: Vec<f64> = bars_5m.iter().map(Bar::close_f64).collect();

    let rsi14 = last_value(&rsi(&closes, WILDER_PERIOD))?;
    let atr14 = last_value(&atr(bars_5m, WILDER_PERIOD))?;

    let series = macd(&closes, DEFAULT_FAST, DEFAULT_SLOW, DEFAULT_SIGNAL);
    let macd_line = last_value(&series.line)?;
    let macd_signal = last_value(&series.signal)?;
    let macd_hist = last_value(&series.histogram)?;
    let macd_cross = series.last_cross();
    let divergence = macd_divergence(bars_5m, &series, DIVERGENCE_WINDOW);

    let session_bars: Vec<Bar> = bars_5m
        .iter()
        .filter(|b| b.timestamp >= session_start)
        .cloned()
        .collect();
    let vwap = vwap(&session_bars)?;

    let support20 = rolling_low(bars_5m, LEVEL_WINDOW)?;
    let resistance20 = rolling_high(bars_5m, LEVEL_WINDOW)?;

    // Prior-day volumes exclude today's in-progress daily bar.
    if daily_bars.len() < LEVEL_WINDOW + 1 {
        return None;
    }
    let history = &daily_bars[..daily_bars.len() - 1];
    let tail = &history[history.len() - LEVEL_WINDOW..];
    let avg_volume20 =
        tail.iter().map(|b| b.volume as f64).sum::<f64>() / LEVEL_WINDOW as f64;

    let cumulative_volume: f64 = session_bars.iter().map(|b| b.volume as f64).sum();
    let expected = avg_volume20 * session_fraction.clamp(0.01, 1.0);
    let cumulative_volume_ratio = if expected > 0.0 {
        cumulative_volume / expected
    } else {
        0.0
    };

    Some(IndicatorSnapshot {
        rsi14,
        atr14,
        macd_line,
        macd_signal,
        macd_hist,
        macd_cross,
        macd_divergence: divergence,
        vwap,
        support20,
        resistance20,
        avg_volume20,
        cumulative_volume_ratio,
    })
}

fn last_value(series: &[Option<f64>]) -> Option<f64> {
    series.last().copied().flatten()
}

/// Compute today's gap from daily bars ending with today's bar.
pub fn gap_from_daily(symbol: &str, daily_bars: &[Bar]) -> Option<GapObservation> {
    if daily_bars.len() < 2 {
        return None;
    }
    let prev = &daily_bars[daily_bars.len() - 2];
    let today = &daily_bars[daily_bars.len() - 1];
    GapObservation::compute(symbol, prev.close, today.open)
}
