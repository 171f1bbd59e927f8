//! Engine configuration.

use common::SessionConfig;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use strategy::StrategyParams;
use std::time::Duration;

/// All recognized engine options with their defaults.
///
/// Time-of-day gates live in `session`; strategy thresholds in `strategy`.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Market session timing (open, entry window, cutoff, force-close).
    pub session: SessionConfig,
    /// Signal scoring and sizing parameters.
    pub strategy: StrategyParams,

    // === Position management tiers ===
    /// Peak profit required before the stop moves to breakeven.
    pub breakeven_threshold: Decimal,
    /// Profit that triggers the quick-profit override inside the window.
    pub quick_profit_threshold: Decimal,
    /// Window after entry during which the quick-profit override applies.
    pub quick_profit_window: Duration,
    /// Locked-profit tier size.
    pub tier_increment: Decimal,
    /// Buffer preserved above the locked amount before the next tier.
    pub tier_buffer: Decimal,

    // === Risk gate ===
    /// Cooldown after a stop-out before the symbol is eligible again.
    pub stop_out_cooldown: Duration,
    /// Dedup window after an entry submit.
    pub pending_entry_lock: Duration,
    /// Maximum concurrent bot-managed positions.
    pub max_concurrent: usize,
    /// Daily trade cap while realized PnL is flat or negative.
    pub trade_cap_losing: u32,
    /// Daily trade cap once realized PnL is positive.
    pub trade_cap_winning: u32,
    /// Daily realized-loss circuit breaker, dollars.
    pub daily_loss_limit: Decimal,

    // === Scheduling ===
    pub scanner_period: Duration,
    pub monitor_period: Duration,
    /// Global broker request budget.
    pub broker_rate_limit_per_min: u32,

    // === Entry hygiene ===
    /// Drop an admitted setup if the price drifted more than this percent.
    pub entry_drift_pct: Decimal,
    /// Cancel a bracket whose entry has not filled within this window.
    pub awaiting_fill_timeout: Duration,
    /// Skip a symbol for the day after this many consecutive data failures.
    pub max_data_failures: u32,
    /// Prefix for generated client order IDs.
    pub order_id_prefix: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            session: SessionConfig::default(),
            strategy: StrategyParams::default(),
            breakeven_threshold: dec!(15),
            quick_profit_threshold: dec!(20),
            quick_profit_window: Duration::from_secs(600),
            tier_increment: dec!(50),
            tier_buffer: dec!(30),
            stop_out_cooldown: Duration::from_secs(1200),
            pending_entry_lock: Duration::from_secs(300),
            max_concurrent: 5,
            trade_cap_losing: 10,
            trade_cap_winning: 20,
            daily_loss_limit: dec!(600),
            scanner_period: Duration::from_secs(3),
            monitor_period: Duration::from_secs(1),
            broker_rate_limit_per_min: 200,
            entry_drift_pct: dec!(3),
            awaiting_fill_timeout: Duration::from_secs(120),
            max_data_failures: 5,
            order_id_prefix: "gap".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the daily loss limit.
    pub fn with_daily_loss_limit(mut self, limit: Decimal) -> Self {
        self.daily_loss_limit = limit;
        self
    }

    /// Builder method to set the concurrent position cap.
    pub fn with_max_concurrent(mut self, max: usize) -> Self {
        self.max_concurrent = max;
        self
    }

    /// Builder method to set the stop-out cooldown.
    pub fn with_stop_out_cooldown(mut self, cooldown: Duration) -> Self {
        self.stop_out_cooldown = cooldown;
        self
    }

    /// Builder method to set scanner/monitor cadences.
    pub fn with_cadences(mut self, scanner: Duration, monitor: Duration) -> Self {
        self.scanner_period = scanner;
        self.monitor_period = monitor;
        self
    }

    /// Builder method to set the per-trade risk budget.
    pub fn with_risk_per_trade(mut self, risk: Decimal) -> Self {
        self.strategy.risk_per_trade = risk;
        self
    }
}
