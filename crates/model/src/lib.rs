//! Market-data value types shared across the workspace.

use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;

/// One OHLCV bar. Immutable once observed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    /// Bar start time (UTC).
    pub timestamp: DateTime<Utc>,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: u64,
}

impl Bar {
    /// Close as `f64` for indicator math. NaN if out of range.
    pub fn close_f64(&self) -> f64 {
        self.close.to_f64().unwrap_or(f64::NAN)
    }

    pub fn high_f64(&self) -> f64 {
        self.high.to_f64().unwrap_or(f64::NAN)
    }

    pub fn low_f64(&self) -> f64 {
        self.low.to_f64().unwrap_or(f64::NAN)
    }

    /// Typical price (H+L+C)/3, used by VWAP.
    pub fn typical_price(&self) -> Decimal {
        (self.high + self.low + self.close) / Decimal::from(3)
    }
}

/// Latest trade price for a symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub last: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// Bar aggregation interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Timeframe {
    Min1,
    Min5,
    Day,
}

impl Timeframe {
    /// Wire representation used by the brokerage data API.
    pub fn as_api_str(&self) -> &'static str {
        match self {
            Self::Min1 => "1Min",
            Self::Min5 => "5Min",
            Self::Day => "1Day",
        }
    }

    /// Length of one bar. Also used as the cache TTL for this timeframe.
    pub fn bar_length(&self) -> Duration {
        match self {
            Self::Min1 => Duration::from_secs(60),
            Self::Min5 => Duration::from_secs(300),
            Self::Day => Duration::from_secs(24 * 3600),
        }
    }

    /// Whether bars of this timeframe are intraday.
    pub fn is_intraday(&self) -> bool {
        !matches!(self, Self::Day)
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_api_str())
    }
}

/// Direction of a trade.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// Sign applied to price moves when computing dollar profit.
    pub fn sign(&self) -> Decimal {
        match self {
            Self::Long => Decimal::ONE,
            Self::Short => Decimal::NEGATIVE_ONE,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Long => write!(f, "long"),
            Self::Short => write!(f, "short"),
        }
    }
}

/// Direction of an opening gap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GapDirection {
    Up,
    Down,
}

/// The opening gap for one symbol, computed once per trading day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GapObservation {
    pub symbol: String,
    pub prev_close: Decimal,
    pub today_open: Decimal,
    /// Percent gap, signed (positive = gap up).
    pub gap_pct: Decimal,
    pub direction: GapDirection,
}

impl GapObservation {
    /// Compute the gap from the prior session close and today's open.
    ///
    /// Returns `None` when `prev_close` is not a usable denominator.
    pub fn compute(symbol: &str, prev_close: Decimal, today_open: Decimal) -> Option<Self> {
        if prev_close <= Decimal::ZERO {
            return None;
        }
        let gap_pct = (today_open - prev_close) / prev_close * Decimal::ONE_HUNDRED;
        let direction = if gap_pct >= Decimal::ZERO {
            GapDirection::Up
        } else {
            GapDirection::Down
        };
        Some(Self {
            symbol: symbol.to_string(),
            prev_close,
            today_open,
            gap_pct,
            direction,
        })
    }

    /// Absolute gap size in percent.
    pub fn magnitude(&self) -> Decimal {
        self.gap_pct.abs()
    }
}
