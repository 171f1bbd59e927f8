//! MACD(12, 26, 9) and regular divergence detection.
//!
//! MACD line = EMA(fast) - EMA(slow); signal = EMA(signal) of the MACD line;
//! histogram = line - signal. First valid index: slow + signal - 2.

use crate::ema::ema;
use model::Bar;

pub const DEFAULT_FAST: usize = 12;
pub const DEFAULT_SLOW: usize = 26;
pub const DEFAULT_SIGNAL: usize = 9;

/// Aligned MACD output series.
#[derive(Debug, Clone)]
pub struct MacdSeries {
    pub line: Vec<Option<f64>>,
    pub signal: Vec<Option<f64>>,
    pub histogram: Vec<Option<f64>>,
}

impl MacdSeries {
    /// Histogram sign change at the final bar, if any.
    pub fn last_cross(&self) -> MacdCross {
        let n = self.histogram.len();
        if n < 2 {
            return MacdCross::None;
        }
        match (self.histogram[n - 2], self.histogram[n - 1]) {
            (Some(prev), Some(curr)) if prev <= 0.0 && curr > 0.0 => MacdCross::Bullish,
            (Some(prev), Some(curr)) if prev >= 0.0 && curr < 0.0 => MacdCross::Bearish,
            _ => MacdCross::None,
        }
    }
}

/// Histogram zero-line crossover at the most recent bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MacdCross {
    None,
    Bullish,
    Bearish,
}

/// Price/histogram divergence over a trailing window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Divergence {
    None,
    Bullish,
    Bearish,
}

/// MACD over a close series.
pub fn macd(closes: &[f64], fast: usize, slow: usize, signal_period: usize) -> MacdSeries {
    let n = closes.len();
    let ema_fast = ema(closes, fast);
    let ema_slow = ema(closes, slow);

    let mut line = vec![None; n];
    for i in 0..n {
        if let (Some(f), Some(s)) = (ema_fast[i], ema_slow[i]) {
            line[i] = Some(f - s);
        }
    }

    // Signal line: EMA of the valid portion of the MACD line.
    let first_valid = slow.saturating_sub(1);
    let mut signal = vec![None; n];
    if first_valid < n {
        let valid: Vec<f64> = line[first_valid..].iter().map(|v| v.unwrap_or(0.0)).collect();
        let signal_tail = ema(&valid, signal_period);
        for (offset, value) in signal_tail.into_iter().enumerate() {
            signal[first_valid + offset] = value;
        }
    }

    let mut histogram = vec![None; n];
    for i in 0..n {
        if let (Some(l), Some(s)) = (line[i], signal[i]) {
            histogram[i] = Some(l - s);
        }
    }

    MacdSeries {
        line,
        signal,
        histogram,
    }
}

/// Detect regular divergence over the trailing `window` bars.
///
/// The window is split in half. Bearish: the later half makes a higher price
/// high than the earlier half while its histogram high is lower (the move is
/// unconfirmed). Bullish is the mirror on lows. Bars whose histogram is still
/// warming up are ignored.
pub fn macd_divergence(bars: &[Bar], series: &MacdSeries, window: usize) -> Divergence {
    if bars.len() != series.histogram.len() || bars.len() < window || window < 4 {
        return Divergence::None;
    }

    let start = bars.len() - window;
    let points: Vec<(f64, f64, f64)> = (start..bars.len())
        .filter_map(|i| {
            series.histogram[i].map(|h| (bars[i].high_f64(), bars[i].low_f64(), h))
        })
        .collect();
    if points.len() < 4 {
        return Divergence::None;
    }

    let mid = points.len() / 2;
    let (early, late) = points.split_at(mid);

    let max_by = |xs: &[(f64, f64, f64)], f: fn(&(f64, f64, f64)) -> f64| {
        xs.iter().map(f).fold(f64::MIN, f64::max)
    };
    let min_by = |xs: &[(f64, f64, f64)], f: fn(&(f64, f64, f64)) -> f64| {
        xs.iter().map(f).fold(f64::MAX, f64::min)
    };

    let early_high = max_by(early, |p| p.0);
    let late_high = max_by(late, |p| p.0);
    let early_hist_high = max_by(early, |p| p.2);
    let late_hist_high = max_by(late, |p| p.2);

    if late_high > early_high && late_hist_high < early_hist_high {
        return Divergence::Bearish;
    }

    let early_low = min_by(early, |p| p.1);
    let late_low = min_by(late, |p| p.1);
    let early_hist_low = min_by(early, |p| p.2);
    let late_hist_low = min_by(late, |p| p.2);

    if late_low < early_low && late_hist_low > early_hist_low {
        return Divergence::Bullish;
    }

    Divergence::None
}
