//! Session-cumulative volume-weighted average price.

use model::Bar;
use rust_decimal::Decimal;

/// VWAP over the given bars: Σ(typical × volume) / Σ(volume).
///
/// The caller supplies bars since the session open; `None` when total volume
/// is zero.
pub fn vwap(bars: &[Bar]) -> Option<Decimal> {
    let mut pv = Decimal::ZERO;
    let mut volume = Decimal::ZERO;

    for bar in bars {
        let v = Decimal::from(bar.volume);
        pv += bar.typical_price() * v;
        volume += v;
    }

    if volume.is_zero() {
        None
    } else {
        Some(pv / volume)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_bars::closes;
    use rust_decimal_macros::dec;

    #[test]
    fn equal_volume_is_mean_of_typical_prices() {
        let bars = closes(&[10.0, 20.0]);
        assert_eq!(vwap(&bars), Some(dec!(15)));
    }

    #[test]
    fn weighted_by_volume() {
        let mut bars = closes(&[10.0, 20.0]);
        bars[0].volume = 3_000;
        bars[1].volume = 1_000;
        // (10*3000 + 20*1000) / 4000 = 12.5
        assert_eq!(vwap(&bars), Some(dec!(12.5)));
    }

    #[test]
    fn zero_volume_is_none() {
        let mut bars = closes(&[10.0]);
        bars[0].volume = 0;
        assert_eq!(vwap(&bars), None);
    }
}
