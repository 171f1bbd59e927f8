//! Pure technical-indicator kit.
//!
//! Every function is side-effect free and operates on an ordered bar or
//! price slice. Outputs align index-for-index with the input; values during
//! an indicator's warmup period are `None`.

mod atr;
mod ema;
mod levels;
mod macd;
mod rsi;
mod vwap;

pub use atr::atr;
pub use ema::ema;
pub use levels::{rolling_high, rolling_low};
pub use macd::{
    macd, macd_divergence, Divergence, MacdCross, MacdSeries, DEFAULT_FAST, DEFAULT_SIGNAL,
    DEFAULT_SLOW,
};
pub use rsi::rsi;
pub use vwap::vwap;
