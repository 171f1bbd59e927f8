//! Rolling support/resistance levels.

use model::Bar;
use rust_decimal::Decimal;

/// Lowest low over the trailing `window` bars.
pub fn rolling_low(bars: &[Bar], window: usize) -> Option<Decimal> {
    tail(bars, window)?.iter().map(|b| b.low).min()
}

/// Highest high over the trailing `window` bars.
pub fn rolling_high(bars: &[Bar], window: usize) -> Option<Decimal> {
    tail(bars, window)?.iter().map(|b| b.high).max()
}

fn tail(bars: &[Bar], window: usize) -> Option<&[Bar]> {
    if window == 0 || bars.len() < window {
        None
    } else {
        Some(&bars[bars.len() - window..])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_bars::closes;
    use rust_decimal_macros::dec;

    #[test]
    fn window_bounds() {
        let bars = closes(&[5.0, 1.0, 3.0, 4.0]);
        // Window of 3 excludes the first bar's low of 5 / includes 1.
        assert_eq!(rolling_low(&bars, 3), Some(dec!(1)));
        assert_eq!(rolling_high(&bars, 3), Some(dec!(4)));
    }

    #[test]
    fn window_excludes_older_extremes() {
        let bars = closes(&[9.0, 2.0, 3.0]);
        assert_eq!(rolling_low(&bars, 2), Some(dec!(2)));
        assert_eq!(rolling_high(&bars, 2), Some(dec!(3)));
    }

    #[test]
    fn short_series_is_none() {
        let bars = closes(&[1.0]);
        assert_eq!(rolling_low(&bars, 20), None);
        assert_eq!(rolling_high(&bars, 20), None);
    }
}
