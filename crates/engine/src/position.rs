//! Managed-position record and the pure tier arithmetic.
//!
//! Everything price-related here is a total function so the tier ladder and
//! monotonicity rules can be tested without a broker in the loop.

use crate::config::EngineConfig;
use chrono::{DateTime, Utc};
use model::Side;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use strategy::Setup;

/// Lifecycle of one managed position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionState {
    /// Bracket submitted; entry leg not yet filled.
    AwaitingFill,
    /// Filled; stop still at the initial protective distance.
    OpenInitial,
    /// Stop relocated to entry.
    OpenBreakeven,
    /// Stop locking a positive dollar tier.
    OpenTierLocked,
    /// Exit in flight; no further stop replacements.
    Closing,
    /// Exit confirmed and recorded.
    Closed,
}

/// How a position exited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitKind {
    Target,
    Stop,
    ForceClose,
    Manual,
}

/// The exit order being waited on while `Closing`.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingExit {
    pub order_id: String,
    pub kind: ExitKind,
}

/// One bot-managed position.
#[derive(Debug, Clone)]
pub struct ManagedPosition {
    pub symbol: String,
    pub side: Side,
    pub size_shares: u32,
    /// Planned entry until the fill is observed, then the fill price.
    pub entry_price: Decimal,
    pub entry_time: Option<DateTime<Utc>>,
    pub parent_order_id: String,
    pub current_stop_price: Decimal,
    pub current_stop_order_id: Option<String>,
    pub target_order_id: Option<String>,
    pub target_price: Decimal,
    pub state: PositionState,
    /// Dollar profit locked by the stop. `None` until breakeven.
    pub locked_profit: Option<Decimal>,
    pub highest_profit_seen: Decimal,
    pub last_stop_replace_time: Option<DateTime<Utc>>,
    /// Consecutive transient stop-replace failures.
    pub replace_failures: u32,
    pub pending_exit: Option<PendingExit>,
    pub created_at: DateTime<Utc>,
}

impl ManagedPosition {
    /// A freshly-submitted bracket waiting for its entry fill.
    pub fn awaiting_fill(setup: &Setup, parent_order_id: String, now: DateTime<Utc>) -> Self {
        Self {
            symbol: setup.symbol.clone(),
            side: setup.side,
            size_shares: setup.size_shares,
            entry_price: setup.entry_price,
            entry_time: None,
            parent_order_id,
            current_stop_price: setup.stop_price,
            current_stop_order_id: None,
            target_order_id: None,
            target_price: setup.target_price,
            state: PositionState::AwaitingFill,
            locked_profit: None,
            highest_profit_seen: Decimal::ZERO,
            last_stop_replace_time: None,
            replace_failures: 0,
            pending_exit: None,
            created_at: now,
        }
    }

    /// Time since the entry fill, zero before it.
    pub fn elapsed_since_entry(&self, now: DateTime<Utc>) -> Duration {
        self.entry_time
            .and_then(|t| (now - t).to_std().ok())
            .unwrap_or(Duration::ZERO)
    }

    pub fn is_open(&self) -> bool {
        matches!(
            self.state,
            PositionState::OpenInitial | PositionState::OpenBreakeven | PositionState::OpenTierLocked
        )
    }
}

/// Signed dollar profit of the position at `last`.
pub fn dollar_profit(side: Side, entry: Decimal, last: Decimal, size: u32) -> Decimal {
    (last - entry) * Decimal::from(size) * side.sign()
}

/// The dollar amount the stop should lock for a given peak profit.
///
/// - below the breakeven threshold: `None` (initial stop stays);
/// - then `$0` (breakeven) until the first full tier is earned;
/// - then `tier_increment × floor((peak − tier_buffer) / tier_increment)`.
///
/// The quick-profit override promotes to at least breakeven when current
/// profit reaches the threshold inside the window, regardless of peak.
pub fn desired_lock(
    peak: Decimal,
    profit: Decimal,
    elapsed: Duration,
    config: &EngineConfig,
) -> Option<Decimal> {
    let quick = elapsed <= config.quick_profit_window && profit >= config.quick_profit_threshold;

    if peak < config.breakeven_threshold && !quick {
        return None;
    }

    let tier = (config.tier_increment
        * ((peak - config.tier_buffer) / config.tier_increment).floor())
    .max(Decimal::ZERO);

    Some(tier)
}

/// Stop price that locks `lock` dollars of profit.
pub fn candidate_stop(side: Side, entry: Decimal, lock: Decimal, size: u32) -> Decimal {
    let per_share = lock / Decimal::from(size.max(1));
    let raw = entry + per_share * side.sign();
    // Round toward entry so the replacement never promises more than earned.
    match side {
        Side::Long => raw.round_dp_with_strategy(
            2,
            rust_decimal::RoundingStrategy::ToNegativeInfinity,
        ),
        Side::Short => raw.round_dp_with_strategy(
            2,
            rust_decimal::RoundingStrategy::ToPositiveInfinity,
        ),
    }
}

/// Stop monotonicity: a replacement must strictly improve protection.
pub fn is_improvement(side: Side, candidate: Decimal, current: Decimal) -> bool {
    match side {
        Side::Long => candidate > current,
        Side::Short => candidate < current,
    }
}
