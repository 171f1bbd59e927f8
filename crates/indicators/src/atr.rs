//! Average True Range with Wilder's smoothing.
//!
//! TR(i) = max(high - low, |high - prev_close|, |low - prev_close|), defined
//! from index 1. The first ATR is the simple mean of the first `period` true
//! ranges; after that avg = (prev * (period - 1) + tr) / period.
//! First valid index: `period`.

use model::Bar;

/// ATR over a bar series.
pub fn atr(bars: &[Bar], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; bars.len()];
    if period == 0 || bars.len() <= period {
        return out;
    }

    let mut trs = Vec::with_capacity(bars.len() - 1);
    for w in bars.windows(2) {
        let prev_close = w[0].close_f64();
        let high = w[1].high_f64();
        let low = w[1].low_f64();
        let tr = (high - low)
            .max((high - prev_close).abs())
            .max((low - prev_close).abs());
        trs.push(tr);
    }

    let mut current = trs[..period].iter().sum::<f64>() / period as f64;
    out[period] = Some(current);

    for i in (period + 1)..bars.len() {
        current = (current * (period as f64 - 1.0) + trs[i - 1]) / period as f64;
        out[i] = Some(current);
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_bars::closes;
    use rust_decimal_macros::dec;

    #[test]
    fn flat_bars_have_zero_atr() {
        let bars = closes(&[10.0; 20]);
        let out = atr(&bars, 14);
        assert!(out[13].is_none());
        assert_eq!(out[14], Some(0.0));
    }

    #[test]
    fn constant_range_bars() {
        let mut bars = closes(&[100.0; 20]);
        for bar in &mut bars {
            bar.high = dec!(101);
            bar.low = dec!(100);
        }
        let out = atr(&bars, 14);
        // Every TR = high - low = 1.
        assert_eq!(out[14], Some(1.0));
        assert_eq!(out[19], Some(1.0));
    }

    #[test]
    fn gap_counts_via_prev_close() {
        // A close-to-close jump larger than the bar range dominates TR.
        let mut bars = closes(&[100.0; 16]);
        bars[15].open = dec!(110);
        bars[15].high = dec!(110);
        bars[15].low = dec!(110);
        bars[15].close = dec!(110);
        let out = atr(&bars, 14);
        // 13 zero TRs + one TR of 10, averaged over 14.
        let expected = 10.0 / 14.0;
        assert!((out[15].unwrap() - expected).abs() < 1e-9);
    }

    #[test]
    fn undefined_before_period() {
        let bars = closes(&[10.0; 14]);
        assert!(atr(&bars, 14).iter().all(Option::is_none));
    }
}
