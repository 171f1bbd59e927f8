//! Per-position state machine stepping.
//!
//! One `tick` per monitor cadence per symbol. Steps for distinct symbols may
//! run concurrently; the coordinator serializes steps for the same symbol by
//! holding the position's own mutex across the call.

use crate::config::EngineConfig;
use crate::ledger::DayLedger;
use crate::position::{
    candidate_stop, desired_lock, dollar_profit, is_improvement, ExitKind, ManagedPosition,
    PendingExit, PositionState,
};
use crate::store::{SharedStore, TradeEvent, TradeEventKind};
use broker::{BrokerError, CancelOutcome, OrderSide, SharedBroker};
use chrono::{DateTime, Utc};
use common::RetryPolicy;
use metrics::SharedMetrics;
use model::Side;
use rust_decimal::Decimal;
use std::sync::Arc;

/// Steps managed positions through their lifecycle.
pub struct PositionMonitor {
    broker: SharedBroker,
    ledger: Arc<DayLedger>,
    store: SharedStore,
    metrics: SharedMetrics,
    config: Arc<EngineConfig>,
    replace_retry: RetryPolicy,
}

impl PositionMonitor {
    pub fn new(
        broker: SharedBroker,
        ledger: Arc<DayLedger>,
        store: SharedStore,
        metrics: SharedMetrics,
        config: Arc<EngineConfig>,
    ) -> Self {
        Self {
            broker,
            ledger,
            store,
            metrics,
            config,
            replace_retry: RetryPolicy::default(),
        }
    }

    /// Advance one position by one tick.
    ///
    /// `last` may be absent when the quote fetch failed; fill observation
    /// and close confirmation still proceed, open-state management waits
    /// for the next tick. Recoverable errors are absorbed here.
    pub async fn tick(&self, pos: &mut ManagedPosition, last: Option<Decimal>, now: DateTime<Utc>) {
        match pos.state {
            PositionState::AwaitingFill => self.check_fill(pos, now).await,
            PositionState::OpenInitial
            | PositionState::OpenBreakeven
            | PositionState::OpenTierLocked => {
                if let Some(last) = last {
                    self.manage_open(pos, last, now).await;
                }
                // A fill may have raced the tick into Closing; confirm then.
                if pos.state == PositionState::Closing {
                    self.confirm_close(pos, now).await;
                }
            }
            PositionState::Closing => self.confirm_close(pos, now).await,
            PositionState::Closed => {}
        }
    }

    /// Observe the entry fill and arm the protective legs.
    async fn check_fill(&self, pos: &mut ManagedPosition, now: DateTime<Utc>) {
        let parent = match self.broker.order(&pos.parent_order_id).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(symbol = %pos.symbol, error = %e, "entry fill check failed");
                return;
            }
        };

        if parent.is_filled() {
            if let Some(fill_price) = parent.filled_avg_price {
                pos.entry_price = fill_price;
            }
            pos.entry_time = Some(now);

            match self.broker.children_of(&pos.parent_order_id).await {
                Ok(children) => {
                    pos.current_stop_order_id = children.stop_leg_id;
                    pos.target_order_id = children.target_leg_id;
                }
                Err(e) => {
                    tracing::warn!(symbol = %pos.symbol, error = %e, "child leg lookup failed");
                }
            }

            pos.state = PositionState::OpenInitial;
            self.ledger.record_entry_fill();
            self.record(pos, pos.entry_price, TradeEventKind::EntryFilled, None, now)
                .await;

            tracing::info!(
                symbol = %pos.symbol,
                side = %pos.side,
                size = pos.size_shares,
                fill = %pos.entry_price,
                stop = %pos.current_stop_price,
                "entry filled, position open"
            );
            return;
        }

        if parent.status.is_terminal() {
            // Canceled/rejected before filling: nothing to manage.
            tracing::warn!(symbol = %pos.symbol, status = ?parent.status, "entry died unfilled");
            pos.state = PositionState::Closed;
            self.ledger.release_entry_lock(&pos.symbol);
            return;
        }

        let waited = now - pos.created_at;
        if waited.to_std().unwrap_or_default() > self.config.awaiting_fill_timeout {
            tracing::warn!(symbol = %pos.symbol, "entry unfilled past timeout, cancelling");
            match self.broker.cancel(&pos.parent_order_id).await {
                Ok(_) => pos.state = PositionState::Closed,
                Err(e) => {
                    tracing::warn!(symbol = %pos.symbol, error = %e, "stale entry cancel failed")
                }
            }
        }
    }

    /// Open-state step: exits first, then the tier ladder.
    async fn manage_open(&self, pos: &mut ManagedPosition, last: Decimal, now: DateTime<Utc>) {
        if self.detect_exit(pos, last).await {
            return;
        }

        let profit = dollar_profit(pos.side, pos.entry_price, last, pos.size_shares);
        if profit > pos.highest_profit_seen {
            pos.highest_profit_seen = profit;
        }

        let elapsed = pos.elapsed_since_entry(now);
        let Some(lock) = desired_lock(pos.highest_profit_seen, profit, elapsed, &self.config)
        else {
            return;
        };

        // Locked profit never decreases: a lower tier cannot walk it back.
        let lock = pos.locked_profit.map_or(lock, |held| held.max(lock));

        let candidate = candidate_stop(pos.side, pos.entry_price, lock, pos.size_shares);
        if !is_improvement(pos.side, candidate, pos.current_stop_price) {
            return;
        }

        self.replace_stop(pos, candidate, lock, now).await;
    }

    /// Price has crossed a protective level: confirm with the broker before
    /// acting, so wicks and stale prints do not flip the state machine.
    async fn detect_exit(&self, pos: &mut ManagedPosition, last: Decimal) -> bool {
        let stop_crossed = match pos.side {
            Side::Long => last <= pos.current_stop_price,
            Side::Short => last >= pos.current_stop_price,
        };
        if stop_crossed {
            if let Some(stop_id) = pos.current_stop_order_id.clone() {
                if self.order_has_fill(&stop_id).await {
                    pos.pending_exit = Some(PendingExit {
                        order_id: stop_id,
                        kind: ExitKind::Stop,
                    });
                    pos.state = PositionState::Closing;
                    return true;
                }
            }
        }

        let target_crossed = match pos.side {
            Side::Long => last >= pos.target_price,
            Side::Short => last <= pos.target_price,
        };
        if target_crossed {
            if let Some(target_id) = pos.target_order_id.clone() {
                if self.order_has_fill(&target_id).await {
                    pos.pending_exit = Some(PendingExit {
                        order_id: target_id,
                        kind: ExitKind::Target,
                    });
                    pos.state = PositionState::Closing;
                    return true;
                }
            }
        }

        false
    }

    async fn order_has_fill(&self, order_id: &str) -> bool {
        match self.broker.order(order_id).await {
            Ok(snapshot) => snapshot.filled_qty > 0,
            Err(e) => {
                tracing::warn!(order_id = %order_id, error = %e, "exit confirmation failed");
                false
            }
        }
    }

    /// The stop-replace protocol.
    async fn replace_stop(
        &self,
        pos: &mut ManagedPosition,
        new_stop: Decimal,
        lock: Decimal,
        now: DateTime<Utc>,
    ) {
        let Some(stop_id) = pos.current_stop_order_id.clone() else {
            tracing::warn!(symbol = %pos.symbol, "no stop leg to replace");
            return;
        };

        let mut attempt = 0u32;
        loop {
            match self.broker.replace_stop(&stop_id, new_stop).await {
                Ok(new_id) => {
                    pos.current_stop_order_id = Some(new_id);
                    pos.current_stop_price = new_stop;
                    pos.last_stop_replace_time = Some(now);
                    pos.locked_profit = Some(lock);
                    pos.replace_failures = 0;
                    pos.state = if lock > Decimal::ZERO {
                        PositionState::OpenTierLocked
                    } else {
                        PositionState::OpenBreakeven
                    };
                    self.metrics.inc_stop_replacements();
                    self.record(pos, new_stop, TradeEventKind::StopReplaced, None, now)
                        .await;
                    tracing::info!(
                        symbol = %pos.symbol,
                        new_stop = %new_stop,
                        locked = %lock,
                        state = ?pos.state,
                        "stop raised"
                    );
                    return;
                }
                // The stop filled while we were moving it.
                Err(BrokerError::AlreadyTerminal) => {
                    pos.pending_exit = Some(PendingExit {
                        order_id: stop_id,
                        kind: ExitKind::Stop,
                    });
                    pos.state = PositionState::Closing;
                    return;
                }
                Err(e @ BrokerError::Transient(_)) | Err(e @ BrokerError::RateLimited { .. }) => {
                    if !self.replace_retry.should_retry(attempt) {
                        pos.replace_failures += 1;
                        tracing::warn!(
                            symbol = %pos.symbol,
                            failures = pos.replace_failures,
                            error = %e,
                            "stop replace exhausted retries, keeping prior stop"
                        );
                        return;
                    }
                    tokio::time::sleep(self.replace_retry.delay(attempt)).await;
                    attempt += 1;
                }
                Err(e) => {
                    // Rejected or worse: keep the prior stop, flag for the
                    // operator, and do not touch the stored price.
                    pos.replace_failures += 1;
                    tracing::error!(
                        symbol = %pos.symbol,
                        error = %e,
                        "stop replace refused, prior stop remains"
                    );
                    return;
                }
            }
        }
    }

    /// Waits for the in-flight exit order to reach a terminal state, then
    /// books the result.
    async fn confirm_close(&self, pos: &mut ManagedPosition, now: DateTime<Utc>) {
        let Some(pending) = pos.pending_exit.clone() else {
            // Nothing in flight (entry canceled before fill): just finish.
            pos.state = PositionState::Closed;
            return;
        };

        let snapshot = match self.broker.order(&pending.order_id).await {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(symbol = %pos.symbol, error = %e, "close confirmation failed");
                return;
            }
        };

        if !snapshot.status.is_terminal() {
            return;
        }

        if snapshot.filled_qty == 0 || snapshot.filled_avg_price.is_none() {
            tracing::error!(
                symbol = %pos.symbol,
                status = ?snapshot.status,
                "exit order terminal without a fill; position needs operator attention"
            );
            return;
        }

        let exit_price = snapshot.filled_avg_price.unwrap_or(pos.entry_price);
        let realized =
            dollar_profit(pos.side, pos.entry_price, exit_price, pos.size_shares).round_dp(2);

        self.ledger.record_exit(realized);
        if pending.kind == ExitKind::Stop {
            self.ledger.record_stop_out(&pos.symbol, now);
        }

        self.record(
            pos,
            exit_price,
            TradeEventKind::Exit(pending.kind),
            Some(realized),
            now,
        )
        .await;

        pos.state = PositionState::Closed;
        tracing::info!(
            symbol = %pos.symbol,
            exit = %exit_price,
            realized = %realized,
            kind = ?pending.kind,
            "position closed"
        );
    }

    /// Cutoff/manual closure: cancel protection, market out, stop managing.
    pub async fn force_close(&self, pos: &mut ManagedPosition, kind: ExitKind, now: DateTime<Utc>) {
        match pos.state {
            PositionState::Closing | PositionState::Closed => return,
            PositionState::AwaitingFill => {
                // Never filled: cancel the whole bracket and walk away.
                match self.broker.cancel(&pos.parent_order_id).await {
                    Ok(_) => pos.state = PositionState::Closed,
                    Err(e) => {
                        tracing::warn!(symbol = %pos.symbol, error = %e, "bracket cancel failed")
                    }
                }
                return;
            }
            _ => {}
        }

        for leg in [pos.target_order_id.clone(), pos.current_stop_order_id.clone()]
            .into_iter()
            .flatten()
        {
            match self.broker.cancel(&leg).await {
                Ok(CancelOutcome::Canceled) | Ok(CancelOutcome::AlreadyTerminal) => {}
                Err(e) => {
                    tracing::warn!(symbol = %pos.symbol, order_id = %leg, error = %e, "leg cancel failed");
                }
            }
        }

        let exit_side = OrderSide::exit_for(pos.side);
        match self
            .broker
            .submit_market(&pos.symbol, exit_side, pos.size_shares)
            .await
        {
            Ok(order_id) => {
                pos.pending_exit = Some(PendingExit { order_id, kind });
                pos.state = PositionState::Closing;
                self.metrics.inc_force_closes();
                self.record(
                    pos,
                    pos.current_stop_price,
                    TradeEventKind::ForceCloseIssued,
                    None,
                    now,
                )
                .await;
                tracing::info!(symbol = %pos.symbol, kind = ?kind, "force close issued");
            }
            Err(e) => {
                // The position is unprotected only if the cancels landed and
                // the market order did not; keep Closing out of reach so the
                // next sweep retries.
                tracing::error!(symbol = %pos.symbol, error = %e, "force close market order failed");
            }
        }
    }

    async fn record(
        &self,
        pos: &ManagedPosition,
        price: Decimal,
        kind: TradeEventKind,
        realized_pnl: Option<Decimal>,
        now: DateTime<Utc>,
    ) {
        self.store
            .record(TradeEvent {
                ts: now,
                symbol: pos.symbol.clone(),
                side: pos.side,
                size: pos.size_shares,
                price,
                fees: Decimal::ZERO,
                realized_pnl,
                kind,
                parent_order_id: Some(pos.parent_order_id.clone()),
            })
            .await;
    }
}
