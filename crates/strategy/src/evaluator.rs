//! Gap-continuation signal scoring and trade construction.

use crate::setup::{Setup, SetupKind};
use market_data::IndicatorSnapshot;
use model::{GapDirection, GapObservation, Quote, Side};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use thiserror::Error;

/// Strategy thresholds and sizing parameters.
#[derive(Debug, Clone)]
pub struct StrategyParams {
    /// Minimum absolute gap, percent.
    pub min_gap_pct: Decimal,
    /// Maximum absolute gap, percent.
    pub max_gap_pct: Decimal,
    /// Mandatory minimum cumulative volume ratio.
    pub min_volume_ratio: f64,
    /// ATR multiple for the stop distance.
    pub atr_stop_mult: Decimal,
    /// Absolute floor on the stop distance, dollars.
    pub min_stop_dollars: Decimal,
    /// Percent-of-entry floor on the stop distance.
    pub min_stop_pct: Decimal,
    /// Target distance as a multiple of the stop distance.
    pub target_mult: Decimal,
    /// Dollars risked per trade for sizing.
    pub risk_per_trade: Decimal,
    /// Cap on entry notional per symbol.
    pub max_symbol_notional: Decimal,
    /// Minimum total score to accept.
    pub accept_threshold: u32,
    /// Pullback tolerance to VWAP, percent.
    pub vwap_pullback_pct: Decimal,
    /// Pullback tolerance to the 20-bar level, percent.
    pub level_pullback_pct: Decimal,
    /// RSI below this scores +2 on longs (mirrored above 100-x for shorts).
    pub rsi_strong: f64,
    /// RSI at or above this rejects longs (mirrored for shorts).
    pub rsi_limit: f64,
}

impl Default for StrategyParams {
    fn default() -> Self {
        Self {
            min_gap_pct: dec!(0.75),
            max_gap_pct: dec!(20.0),
            min_volume_ratio: 1.5,
            atr_stop_mult: dec!(1.5),
            min_stop_dollars: dec!(0.30),
            min_stop_pct: dec!(1.2),
            target_mult: dec!(2.5),
            risk_per_trade: dec!(100),
            max_symbol_notional: dec!(10000),
            accept_threshold: 6,
            vwap_pullback_pct: dec!(1.5),
            level_pullback_pct: dec!(2.0),
            rsi_strong: 35.0,
            rsi_limit: 50.0,
        }
    }
}

/// Why a symbol produced no setup this tick.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum EvalRejection {
    /// Gap magnitude outside the tradable band.
    #[error("gap {gap_pct}% outside [{min}%, {max}%]")]
    GapOutOfBand {
        gap_pct: Decimal,
        min: Decimal,
        max: Decimal,
    },

    /// Cumulative volume pace below the mandatory minimum.
    #[error("volume ratio {ratio:.2} below required {required:.2}")]
    VolumeTooLow { ratio: f64, required: f64 },

    /// RSI disqualifies the direction outright.
    #[error("RSI {rsi:.1} unfavorable for {side}")]
    RsiUnfavorable { rsi: f64, side: model::Side },

    /// Conditions held but the weighted score missed the threshold.
    #[error("signal score {score} below threshold {threshold}")]
    ScoreBelowThreshold { score: u32, threshold: u32 },

    /// Risk budget buys less than one share at this stop distance.
    #[error("position size below one share")]
    SizeTooSmall,

    /// Indicator values were not usable (NaN ATR, zero price).
    #[error("unusable inputs: {0}")]
    UnusableInputs(String),
}

/// Evaluate one symbol. Long setups come from gap-ups, shorts from
/// gap-downs; the scoring is symmetric with RSI thresholds inverted.
pub fn evaluate(
    gap: &GapObservation,
    snapshot: &IndicatorSnapshot,
    quote: &Quote,
    params: &StrategyParams,
) -> Result<Setup, EvalRejection> {
    let magnitude = gap.magnitude();
    if magnitude < params.min_gap_pct || magnitude > params.max_gap_pct {
        return Err(EvalRejection::GapOutOfBand {
            gap_pct: gap.gap_pct,
            min: params.min_gap_pct,
            max: params.max_gap_pct,
        });
    }

    let side = match gap.direction {
        GapDirection::Up => Side::Long,
        GapDirection::Down => Side::Short,
    };
    let entry = quote.last;
    if entry <= Decimal::ZERO {
        return Err(EvalRejection::UnusableInputs("non-positive last price".into()));
    }

    // Mandatory volume pace gate.
    if snapshot.cumulative_volume_ratio < params.min_volume_ratio {
        return Err(EvalRejection::VolumeTooLow {
            ratio: snapshot.cumulative_volume_ratio,
            required: params.min_volume_ratio,
        });
    }

    let mut score = 2u32; // gap in band

    if pulled_back(entry, side, snapshot, params) {
        score += 2;
    }

    if momentum_confirms(side, snapshot) {
        score += 3;
    }

    score += rsi_points(side, snapshot.rsi14, params)?;

    score += 1; // volume ratio at or above the mandatory minimum

    if score < params.accept_threshold {
        return Err(EvalRejection::ScoreBelowThreshold {
            score,
            threshold: params.accept_threshold,
        });
    }

    let stop_distance = stop_distance(entry, snapshot.atr14, params)?;
    let (stop_price, target_price) = match side {
        Side::Long => (
            entry - stop_distance,
            entry + params.target_mult * stop_distance,
        ),
        Side::Short => (
            entry + stop_distance,
            entry - params.target_mult * stop_distance,
        ),
    };

    let size = position_size(entry, stop_distance, params)?;

    tracing::debug!(
        symbol = %gap.symbol,
        side = %side,
        score = score,
        entry = %entry,
        stop = %stop_price,
        target = %target_price,
        size = size,
        "setup accepted"
    );

    Ok(Setup {
        symbol: gap.symbol.clone(),
        side,
        entry_price: entry,
        stop_price: stop_price.round_dp(2),
        target_price: target_price.round_dp(2),
        size_shares: size,
        risk_dollars: (stop_distance * Decimal::from(size)).round_dp(2),
        stop_distance_dollars: stop_distance,
        signal_strength: score,
        setup_kind: SetupKind::GapContinuation,
    })
}

/// Pullback to VWAP or to the 20-bar level appropriate for the side.
fn pulled_back(
    entry: Decimal,
    side: Side,
    snapshot: &IndicatorSnapshot,
    params: &StrategyParams,
) -> bool {
    let near = |price: Decimal, level: Decimal, tolerance_pct: Decimal| -> bool {
        if level <= Decimal::ZERO {
            return false;
        }
        ((price - level).abs() / level * Decimal::ONE_HUNDRED) <= tolerance_pct
    };

    let near_vwap = near(entry, snapshot.vwap, params.vwap_pullback_pct);
    let near_level = match side {
        Side::Long => near(entry, snapshot.support20, params.level_pullback_pct),
        Side::Short => near(entry, snapshot.resistance20, params.level_pullback_pct),
    };
    near_vwap || near_level
}

/// MACD crossover or divergence in the trade direction.
fn momentum_confirms(side: Side, snapshot: &IndicatorSnapshot) -> bool {
    use indicators::{Divergence, MacdCross};
    match side {
        Side::Long => {
            snapshot.macd_cross == MacdCross::Bullish
                || snapshot.macd_divergence == Divergence::Bullish
        }
        Side::Short => {
            snapshot.macd_cross == MacdCross::Bearish
                || snapshot.macd_divergence == Divergence::Bearish
        }
    }
}

/// RSI contribution: +2 near exhaustion, +1 acceptable, reject otherwise.
fn rsi_points(side: Side, rsi: f64, params: &StrategyParams) -> Result<u32, EvalRejection> {
    if rsi.is_nan() {
        return Err(EvalRejection::UnusableInputs("NaN RSI".into()));
    }
    match side {
        Side::Long => {
            if rsi < params.rsi_strong {
                Ok(2)
            } else if rsi < params.rsi_limit {
                Ok(1)
            } else {
                Err(EvalRejection::RsiUnfavorable { rsi, side })
            }
        }
        Side::Short => {
            if rsi > 100.0 - params.rsi_strong {
                Ok(2)
            } else if rsi > 100.0 - params.rsi_limit {
                Ok(1)
            } else {
                Err(EvalRejection::RsiUnfavorable { rsi, side })
            }
        }
    }
}

/// stop_distance = max(atr_mult × ATR, max(min_dollars, min_pct × entry)).
fn stop_distance(
    entry: Decimal,
    atr: f64,
    params: &StrategyParams,
) -> Result<Decimal, EvalRejection> {
    let atr = Decimal::from_f64(atr)
        .filter(|a| *a >= Decimal::ZERO)
        .ok_or_else(|| EvalRejection::UnusableInputs("unusable ATR".into()))?;

    let atr_component = params.atr_stop_mult * atr;
    let pct_floor = params.min_stop_pct / Decimal::ONE_HUNDRED * entry;
    let min_component = params.min_stop_dollars.max(pct_floor);
    Ok(atr_component.max(min_component).round_dp(2))
}

/// size = floor(risk / stop_distance), clamped to the per-symbol notional cap.
fn position_size(
    entry: Decimal,
    stop_distance: Decimal,
    params: &StrategyParams,
) -> Result<u32, EvalRejection> {
    use rust_decimal::prelude::ToPrimitive;

    if stop_distance <= Decimal::ZERO {
        return Err(EvalRejection::UnusableInputs("zero stop distance".into()));
    }

    let by_risk = (params.risk_per_trade / stop_distance).floor();
    let by_notional = (params.max_symbol_notional / entry).floor();
    let size = by_risk.min(by_notional).to_u32().unwrap_or(0);

    if size < 1 {
        return Err(EvalRejection::SizeTooSmall);
    }
    Ok(size)
}
