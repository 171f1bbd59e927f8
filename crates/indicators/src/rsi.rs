//! Relative Strength Index with Wilder's smoothing.
//!
//! First average gain/loss is the simple mean over the first `period` price
//! changes; subsequent averages use avg = (prev * (period - 1) + current) / period.
//! First valid index: `period` (one change per bar after the first).
//! Values lie in [0, 100]; RSI = 100 when the average loss is zero.

/// RSI over a close series.
pub fn rsi(closes: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; closes.len()];
    if period == 0 || closes.len() <= period {
        return out;
    }

    let mut gains = Vec::with_capacity(closes.len() - 1);
    let mut losses = Vec::with_capacity(closes.len() - 1);
    for w in closes.windows(2) {
        let change = w[1] - w[0];
        gains.push(change.max(0.0));
        losses.push((-change).max(0.0));
    }

    let mut avg_gain = gains[..period].iter().sum::<f64>() / period as f64;
    let mut avg_loss = losses[..period].iter().sum::<f64>() / period as f64;
    out[period] = Some(rsi_value(avg_gain, avg_loss));

    for i in (period + 1)..closes.len() {
        let idx = i - 1;
        avg_gain = (avg_gain * (period as f64 - 1.0) + gains[idx]) / period as f64;
        avg_loss = (avg_loss * (period as f64 - 1.0) + losses[idx]) / period as f64;
        out[i] = Some(rsi_value(avg_gain, avg_loss));
    }

    out
}

fn rsi_value(avg_gain: f64, avg_loss: f64) -> f64 {
    if avg_loss == 0.0 {
        100.0
    } else {
        100.0 - 100.0 / (1.0 + avg_gain / avg_loss)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_valid_index_is_period() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let out = rsi(&closes, 14);
        assert!(out[13].is_none());
        assert!(out[14].is_some());
    }

    #[test]
    fn all_gains_is_100() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 + i as f64).collect();
        let out = rsi(&closes, 14);
        assert_eq!(out[14], Some(100.0));
    }

    #[test]
    fn all_losses_is_0() {
        let closes: Vec<f64> = (0..20).map(|i| 100.0 - i as f64).collect();
        let out = rsi(&closes, 14);
        let v = out[14].unwrap();
        assert!(v.abs() < 1e-9, "rsi was {}", v);
    }

    #[test]
    fn alternating_series_stays_in_band() {
        let closes: Vec<f64> = (0..40)
            .map(|i| if i % 2 == 0 { 100.0 } else { 101.0 })
            .collect();
        let out = rsi(&closes, 14);
        for v in out.iter().flatten() {
            assert!((0.0..=100.0).contains(v));
        }
    }

    #[test]
    fn too_short_series_is_invalid() {
        let out = rsi(&[1.0; 14], 14);
        assert!(out.iter().all(Option::is_none));
    }
}
