//! The day ledger: the engine's single shared mutable object.
//!
//! Every method is one invariant-preserving transition under one mutex.
//! The mutex is held only for counter/map access — never across a broker
//! call — so concurrent admission decisions observe a consistent snapshot.

use crate::config::EngineConfig;
use broker::AccountSnapshot;
use chrono::{DateTime, NaiveDate, Utc};
use common::TradingSession;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use strategy::Setup;
use thiserror::Error;

/// Why the risk gate refused a setup. First failing check wins.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RiskRejection {
    /// Outside the entry window (pre-delay, post-cutoff, weekend).
    #[error("entry window closed")]
    EntryWindowClosed,

    /// The force-close time has been reached.
    #[error("position close cutoff active")]
    CutoffActive,

    /// Managed-position cap reached.
    #[error("max concurrent positions reached: {current}/{max}")]
    MaxConcurrent { current: usize, max: usize },

    /// Daily trade cap reached (dynamic: widens when the day is green).
    #[error("daily trade cap reached: {count}/{cap}")]
    TradeCapReached { count: u32, cap: u32 },

    /// Daily loss circuit breaker tripped.
    #[error("daily loss limit hit: realized {realized}, limit -{limit}")]
    DailyLossLimit { realized: Decimal, limit: Decimal },

    /// Symbol stopped out recently.
    #[error("{symbol} in cooldown for {remaining_s}s more")]
    SymbolCooldown { symbol: String, remaining_s: i64 },

    /// An entry on this symbol was submitted within the dedup window.
    #[error("pending entry lock on {symbol}")]
    PendingEntryLock { symbol: String },

    /// A managed position already exists for the symbol.
    #[error("{symbol} already managed")]
    AlreadyManaged { symbol: String },

    /// Entry notional exceeds the per-symbol cap.
    #[error("notional {notional} exceeds per-symbol cap {cap}")]
    NotionalExceeded { notional: Decimal, cap: Decimal },

    /// Entry notional exceeds available buying power.
    #[error("notional {notional} exceeds buying power {buying_power}")]
    InsufficientBuyingPower {
        notional: Decimal,
        buying_power: Decimal,
    },
}

/// Read-only view of the ledger counters.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerSnapshot {
    pub trading_date: NaiveDate,
    pub realized_pnl: Decimal,
    pub filled_trade_count: u32,
    pub open_managed: usize,
    pub managed_symbols: Vec<String>,
}

struct LedgerState {
    trading_date: NaiveDate,
    realized_pnl: Decimal,
    filled_trade_count: u32,
    /// Symbol -> stop-out instant (cooldown anchor).
    stop_out_times: HashMap<String, DateTime<Utc>>,
    /// Symbol -> lock expiry instant.
    pending_entry_locks: HashMap<String, DateTime<Utc>>,
    managed_symbols: HashSet<String>,
}

impl LedgerState {
    fn fresh(date: NaiveDate) -> Self {
        Self {
            trading_date: date,
            realized_pnl: Decimal::ZERO,
            filled_trade_count: 0,
            stop_out_times: HashMap::new(),
            pending_entry_locks: HashMap::new(),
            managed_symbols: HashSet::new(),
        }
    }
}

/// Daily trading tallies and admission gate.
pub struct DayLedger {
    config: Arc<EngineConfig>,
    state: Mutex<LedgerState>,
}

impl DayLedger {
    pub fn new(config: Arc<EngineConfig>, date: NaiveDate) -> Self {
        Self {
            config,
            state: Mutex::new(LedgerState::fresh(date)),
        }
    }

    pub fn trading_date(&self) -> NaiveDate {
        self.state.lock().trading_date
    }

    /// Reset for a new trading date, dropping all per-day state.
    pub fn rollover(&self, date: NaiveDate) {
        let mut state = self.state.lock();
        if state.trading_date != date {
            tracing::info!(
                old_date = %state.trading_date,
                new_date = %date,
                realized_pnl = %state.realized_pnl,
                trades = state.filled_trade_count,
                "day ledger rollover"
            );
            *state = LedgerState::fresh(date);
        }
    }

    /// Seed tallies recovered from the trade store at startup.
    pub fn recover(&self, realized_pnl: Decimal, filled_trade_count: u32) {
        let mut state = self.state.lock();
        state.realized_pnl = realized_pnl;
        state.filled_trade_count = filled_trade_count;
    }

    /// The eight ordered risk-gate checks. First failure wins.
    pub fn try_admit(
        &self,
        setup: &Setup,
        now: DateTime<Utc>,
        session: &TradingSession,
        account: &AccountSnapshot,
    ) -> Result<(), RiskRejection> {
        // 1. Entry window.
        if !session.in_entry_window(now) {
            return Err(RiskRejection::EntryWindowClosed);
        }

        // 2. No cutoff active.
        if session.past_position_close(now) {
            return Err(RiskRejection::CutoffActive);
        }

        let mut state = self.state.lock();
        purge_expired_locks(&mut state, now);

        // 3. Concurrent cap; at most one managed position per symbol.
        if state.managed_symbols.contains(&setup.symbol) {
            return Err(RiskRejection::AlreadyManaged {
                symbol: setup.symbol.clone(),
            });
        }
        if state.managed_symbols.len() >= self.config.max_concurrent {
            return Err(RiskRejection::MaxConcurrent {
                current: state.managed_symbols.len(),
                max: self.config.max_concurrent,
            });
        }

        // 4. Dynamic trade cap.
        let cap = dynamic_cap(&self.config, state.realized_pnl);
        if state.filled_trade_count >= cap {
            return Err(RiskRejection::TradeCapReached {
                count: state.filled_trade_count,
                cap,
            });
        }

        // 5. Daily loss circuit breaker.
        if state.realized_pnl <= -self.config.daily_loss_limit {
            return Err(RiskRejection::DailyLossLimit {
                realized: state.realized_pnl,
                limit: self.config.daily_loss_limit,
            });
        }

        // 6. Stop-out cooldown.
        if let Some(stopped_at) = state.stop_out_times.get(&setup.symbol) {
            let elapsed = now - *stopped_at;
            let cooldown = chrono::Duration::from_std(self.config.stop_out_cooldown)
                .unwrap_or_else(|_| chrono::Duration::seconds(0));
            if elapsed < cooldown {
                return Err(RiskRejection::SymbolCooldown {
                    symbol: setup.symbol.clone(),
                    remaining_s: (cooldown - elapsed).num_seconds(),
                });
            }
        }

        // 7. Pending entry lock.
        if state.pending_entry_locks.contains_key(&setup.symbol) {
            return Err(RiskRejection::PendingEntryLock {
                symbol: setup.symbol.clone(),
            });
        }

        // 8. Notional caps.
        let notional = setup.notional();
        if notional > self.config.strategy.max_symbol_notional {
            return Err(RiskRejection::NotionalExceeded {
                notional,
                cap: self.config.strategy.max_symbol_notional,
            });
        }
        if notional > account.buying_power {
            return Err(RiskRejection::InsufficientBuyingPower {
                notional,
                buying_power: account.buying_power,
            });
        }

        Ok(())
    }

    /// Write the dedup lock for a symbol at submit time.
    pub fn lock_entry(&self, symbol: &str, now: DateTime<Utc>) {
        let expiry = now
            + chrono::Duration::from_std(self.config.pending_entry_lock)
                .unwrap_or_else(|_| chrono::Duration::seconds(300));
        self.state
            .lock()
            .pending_entry_locks
            .insert(symbol.to_string(), expiry);
    }

    /// Release the dedup lock early (broker rejected the entry).
    pub fn release_entry_lock(&self, symbol: &str) {
        self.state.lock().pending_entry_locks.remove(symbol);
    }

    /// Move a symbol into the managed set, enforcing uniqueness and the
    /// concurrent cap.
    pub fn register_open(&self, symbol: &str) -> Result<(), RiskRejection> {
        let mut state = self.state.lock();
        if state.managed_symbols.contains(symbol) {
            return Err(RiskRejection::AlreadyManaged {
                symbol: symbol.to_string(),
            });
        }
        if state.managed_symbols.len() >= self.config.max_concurrent {
            return Err(RiskRejection::MaxConcurrent {
                current: state.managed_symbols.len(),
                max: self.config.max_concurrent,
            });
        }
        state.managed_symbols.insert(symbol.to_string());
        Ok(())
    }

    /// Drop a symbol from the managed set once its position is closed.
    pub fn remove_managed(&self, symbol: &str) {
        self.state.lock().managed_symbols.remove(symbol);
    }

    /// Count one entry fill toward the daily trade cap.
    pub fn record_entry_fill(&self) {
        self.state.lock().filled_trade_count += 1;
    }

    /// Fold an exit's realized PnL into the day.
    pub fn record_exit(&self, realized_pnl: Decimal) {
        let mut state = self.state.lock();
        state.realized_pnl += realized_pnl;
    }

    /// Start the whipsaw cooldown for a stop-fill exit.
    pub fn record_stop_out(&self, symbol: &str, now: DateTime<Utc>) {
        self.state
            .lock()
            .stop_out_times
            .insert(symbol.to_string(), now);
    }

    pub fn is_managed(&self, symbol: &str) -> bool {
        self.state.lock().managed_symbols.contains(symbol)
    }

    pub fn managed_count(&self) -> usize {
        self.state.lock().managed_symbols.len()
    }

    /// Whether a scanner pre-filter should skip the symbol.
    pub fn symbol_blocked(&self, symbol: &str, now: DateTime<Utc>) -> bool {
        let mut state = self.state.lock();
        purge_expired_locks(&mut state, now);
        if state.managed_symbols.contains(symbol) {
            return true;
        }
        if state.pending_entry_locks.contains_key(symbol) {
            return true;
        }
        if let Some(stopped_at) = state.stop_out_times.get(symbol) {
            let cooldown = chrono::Duration::from_std(self.config.stop_out_cooldown)
                .unwrap_or_else(|_| chrono::Duration::seconds(0));
            if now - *stopped_at < cooldown {
                return true;
            }
        }
        false
    }

    /// Whether the daily loss circuit is tripped (entries halt; open
    /// positions continue to be managed).
    pub fn circuit_tripped(&self) -> bool {
        let state = self.state.lock();
        state.realized_pnl <= -self.config.daily_loss_limit
    }

    pub fn snapshot(&self) -> LedgerSnapshot {
        let state = self.state.lock();
        LedgerSnapshot {
            trading_date: state.trading_date,
            realized_pnl: state.realized_pnl,
            filled_trade_count: state.filled_trade_count,
            open_managed: state.managed_symbols.len(),
            managed_symbols: state.managed_symbols.iter().cloned().collect(),
        }
    }
}

fn dynamic_cap(config: &EngineConfig, realized_pnl: Decimal) -> u32 {
    if realized_pnl > Decimal::ZERO {
        config.trade_cap_winning
    } else {
        config.trade_cap_losing
    }
}

fn purge_expired_locks(state: &mut LedgerState, now: DateTime<Utc>) {
    state.pending_entry_locks.retain(|_, expiry| *expiry > now);
}
