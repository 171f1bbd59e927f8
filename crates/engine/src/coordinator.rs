//! The scheduling loop.
//!
//! Two cadences and one daily sweep: the scanner evaluates the watchlist
//! during the entry window, the monitor steps every managed position, and
//! the cutoff sweep force-closes everything at the configured local time.
//! Symbol work is dispatched onto a bounded pool; a symbol's position mutex
//! doubles as its in-flight-exclusion token.

use crate::commands::{EngineCommand, EngineStatus, PositionSummary};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::ledger::DayLedger;
use crate::monitor::PositionMonitor;
use crate::position::{ExitKind, ManagedPosition, PositionState};
use crate::store::{SharedStore, TradeEvent, TradeEventKind};
use broker::{
    generate_client_order_id, BracketOrderRequest, BrokerError, EntryType, OrderSide, SharedBroker,
};
use chrono::{DateTime, NaiveDate, Utc};
use common::TradingSession;
use dashmap::{DashMap, DashSet};
use market_data::{build_snapshot, gap_from_daily, MarketDataProvider};
use metrics::SharedMetrics;
use model::{GapObservation, Timeframe};
use rust_decimal::Decimal;
use std::sync::Arc;
use strategy::{evaluate, Setup};
use tokio::sync::{mpsc, watch, Mutex, Semaphore};
use tokio::task::JoinSet;

/// Bars fetched per evaluation.
const EVAL_BARS_5M: usize = 80;
const EVAL_BARS_DAILY: usize = 25;
/// Concurrent symbol evaluations per scan tick.
const EVAL_POOL: usize = 8;
/// Health log cadence, in scanner ticks.
const HEALTH_EVERY_TICKS: u64 = 100;

type SharedPosition = Arc<Mutex<ManagedPosition>>;

/// The global trading coordinator.
pub struct Coordinator {
    config: Arc<EngineConfig>,
    session: TradingSession,
    broker: SharedBroker,
    provider: Arc<MarketDataProvider>,
    ledger: Arc<DayLedger>,
    store: SharedStore,
    metrics: SharedMetrics,
    monitor: Arc<PositionMonitor>,
    positions: Arc<DashMap<String, SharedPosition>>,
    evals_in_flight: Arc<DashSet<String>>,
    eval_pool: Arc<Semaphore>,
    watchlist: Vec<String>,
    gap_cache: DashMap<String, (NaiveDate, GapObservation)>,
    data_failures: Arc<DashMap<String, u32>>,
    paused: bool,
    cutoff_done_for: Option<NaiveDate>,
    scan_ticks: u64,
}

impl Coordinator {
    pub fn new(
        config: EngineConfig,
        broker: SharedBroker,
        provider: Arc<MarketDataProvider>,
        store: SharedStore,
        metrics: SharedMetrics,
        watchlist: Vec<String>,
    ) -> Self {
        let config = Arc::new(config);
        let session = TradingSession::new(config.session.clone());
        let ledger = Arc::new(DayLedger::new(
            Arc::clone(&config),
            session.trading_date(Utc::now()),
        ));
        let monitor = Arc::new(PositionMonitor::new(
            Arc::clone(&broker),
            Arc::clone(&ledger),
            Arc::clone(&store),
            Arc::clone(&metrics),
            Arc::clone(&config),
        ));

        Self {
            config,
            session,
            broker,
            provider,
            ledger,
            store,
            metrics,
            monitor,
            positions: Arc::new(DashMap::new()),
            evals_in_flight: Arc::new(DashSet::new()),
            eval_pool: Arc::new(Semaphore::new(EVAL_POOL)),
            watchlist,
            gap_cache: DashMap::new(),
            data_failures: Arc::new(DashMap::new()),
            paused: false,
            cutoff_done_for: None,
            scan_ticks: 0,
        }
    }

    /// Ledger handle (tests, status endpoints).
    pub fn ledger(&self) -> Arc<DayLedger> {
        Arc::clone(&self.ledger)
    }

    /// Rebuild today's tallies from the store and log unmanaged broker
    /// positions. Positions opened outside the coordinator are never
    /// counted toward the managed cap.
    pub async fn reconcile_on_start(&self) {
        let today = self.session.trading_date(Utc::now());
        let tallies = self.store.day_tallies(today).await;
        self.ledger
            .recover(tallies.realized_pnl, tallies.filled_trade_count);
        tracing::info!(
            realized_pnl = %tallies.realized_pnl,
            trades = tallies.filled_trade_count,
            "recovered day tallies from store"
        );

        match self.broker.positions().await {
            Ok(existing) if !existing.is_empty() => {
                for p in existing {
                    tracing::warn!(
                        symbol = %p.symbol,
                        qty = p.qty,
                        "existing broker position is unmanaged (opened outside this engine)"
                    );
                }
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "startup position reconciliation failed"),
        }
    }

    /// Run until shutdown is signaled.
    pub async fn run(
        mut self,
        mut commands: mpsc::Receiver<EngineCommand>,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), EngineError> {
        tracing::info!(
            watchlist = self.watchlist.len(),
            scanner_period_s = self.config.scanner_period.as_secs(),
            monitor_period_s = self.config.monitor_period.as_secs(),
            "coordinator starting"
        );

        self.reconcile_on_start().await;

        let mut scan_timer = tokio::time::interval(self.config.scanner_period);
        scan_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        let mut monitor_timer = tokio::time::interval(self.config.monitor_period);
        monitor_timer.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                biased;

                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        tracing::info!("shutdown signal received");
                        break;
                    }
                }

                cmd = commands.recv() => {
                    match cmd {
                        Some(cmd) => self.handle_command(cmd).await,
                        None => {
                            tracing::warn!("command channel closed");
                            return Err(EngineError::ChannelClosed);
                        }
                    }
                }

                _ = monitor_timer.tick() => {
                    let now = Utc::now();
                    self.housekeeping(now).await;
                    self.monitor_tick(now).await;
                }

                _ = scan_timer.tick() => {
                    let now = Utc::now();
                    self.scan_tick(now).await;
                }
            }
        }

        tracing::info!("coordinator stopped");
        Ok(())
    }

    /// Day rollover and the cutoff sweep. Runs ahead of monitor work so the
    /// sweep is never starved by per-symbol steps.
    async fn housekeeping(&mut self, now: DateTime<Utc>) {
        let today = self.session.trading_date(now);
        if self.ledger.trading_date() != today {
            self.ledger.rollover(today);
            self.gap_cache.clear();
            self.data_failures.clear();
        }

        if self.session.past_position_close(now) && self.cutoff_done_for != Some(today) {
            self.cutoff_done_for = Some(today);
            self.cutoff_sweep(now).await;
        }
    }

    /// The unconditional closure of all managed positions. Not cancellable:
    /// runs inline to completion.
    async fn cutoff_sweep(&self, now: DateTime<Utc>) {
        let symbols: Vec<String> = self.positions.iter().map(|e| e.key().clone()).collect();
        tracing::info!(count = symbols.len(), "cutoff sweep starting");

        for symbol in symbols {
            let Some(entry) = self.positions.get(&symbol) else {
                continue;
            };
            let pos = Arc::clone(entry.value());
            drop(entry);

            // Waiting (not try_lock): the sweep must observe the prior
            // step's broker effects, then run.
            let mut guard = pos.lock().await;
            self.monitor
                .force_close(&mut guard, ExitKind::ForceClose, now)
                .await;
        }

        tracing::info!("cutoff sweep complete");
    }

    /// Step every managed position; distinct symbols in parallel, each
    /// symbol serialized by its own mutex.
    async fn monitor_tick(&mut self, now: DateTime<Utc>) {
        if self.positions.is_empty() {
            return;
        }

        let mut steps: JoinSet<()> = JoinSet::new();

        let snapshot: Vec<(String, SharedPosition)> = self
            .positions
            .iter()
            .map(|entry| (entry.key().clone(), Arc::clone(entry.value())))
            .collect();

        for (symbol, pos) in snapshot {
            let provider = Arc::clone(&self.provider);
            let monitor = Arc::clone(&self.monitor);
            let metrics = Arc::clone(&self.metrics);
            let positions = Arc::clone(&self.positions);
            let ledger = self.ledger();

            steps.spawn(async move {
                // A still-running step from a prior tick owns the symbol.
                let Ok(mut guard) = pos.try_lock() else {
                    return;
                };

                let last = match provider.last(&symbol).await {
                    Ok(quote) => Some(quote.last),
                    Err(e) => {
                        metrics.inc_data_errors();
                        tracing::debug!(symbol = %symbol, error = %e, "no quote this tick");
                        None
                    }
                };

                monitor.tick(&mut guard, last, now).await;

                if guard.state == PositionState::Closed {
                    drop(guard);
                    positions.remove(&symbol);
                    ledger.remove_managed(&symbol);
                }
            });
        }

        while steps.join_next().await.is_some() {}
    }

    /// One scanner pass: pre-filter, evaluate in parallel, admit in
    /// descending signal strength, submit.
    async fn scan_tick(&mut self, now: DateTime<Utc>) {
        self.scan_ticks += 1;
        if self.scan_ticks % HEALTH_EVERY_TICKS == 0 {
            let snap = self.metrics.snapshot();
            tracing::info!(
                scanned = snap.symbols_scanned,
                setups = snap.setups_found,
                admissions = snap.admissions,
                data_errors = snap.data_errors,
                "engine health"
            );
        }

        if self.paused || !self.session.in_entry_window(now) || self.ledger.circuit_tripped() {
            return;
        }

        // Account once per tick, outside any lock.
        let account = match self.broker.account().await {
            Ok(a) => a,
            Err(e) => {
                tracing::warn!(error = %e, "account fetch failed, skipping scan tick");
                return;
            }
        };

        let candidates: Vec<String> = self
            .watchlist
            .iter()
            .filter(|s| !self.ledger.symbol_blocked(s, now))
            .filter(|s| {
                self.data_failures
                    .get(*s)
                    .map(|f| *f < self.config.max_data_failures)
                    .unwrap_or(true)
            })
            .filter(|s| !self.evals_in_flight.contains(*s))
            .cloned()
            .collect();

        if candidates.is_empty() {
            return;
        }
        self.metrics.inc_symbols_scanned(candidates.len() as u64);

        // Strongest gappers evaluate first when the pool is contended.
        let mut ranked: Vec<(String, Option<GapObservation>)> = Vec::new();
        for symbol in candidates {
            let gap = self.cached_gap(&symbol, now).await;
            ranked.push((symbol, gap));
        }
        ranked.sort_by(|a, b| {
            let magnitude = |g: &Option<GapObservation>| {
                g.as_ref().map(|g| g.magnitude()).unwrap_or_default()
            };
            magnitude(&b.1).cmp(&magnitude(&a.1))
        });

        let mut evals: JoinSet<(String, Option<Setup>)> = JoinSet::new();
        for (symbol, gap) in ranked {
            self.evals_in_flight.insert(symbol.clone());
            let provider = Arc::clone(&self.provider);
            let config = Arc::clone(&self.config);
            let session = self.session.clone();
            let metrics = Arc::clone(&self.metrics);
            let in_flight = Arc::clone(&self.evals_in_flight);
            let pool = Arc::clone(&self.eval_pool);
            let failures = Arc::clone(&self.data_failures);

            evals.spawn(async move {
                let _permit = pool.acquire().await.ok();
                let result =
                    evaluate_symbol(&symbol, gap, &provider, &session, &config, now).await;
                in_flight.remove(&symbol);

                match result {
                    Ok(setup) => {
                        failures.remove(&symbol);
                        if setup.is_some() {
                            metrics.inc_setups_found();
                        }
                        (symbol, setup)
                    }
                    Err(reason) => {
                        metrics.inc_data_errors();
                        *failures.entry(symbol.clone()).or_insert(0) += 1;
                        tracing::debug!(symbol = %symbol, reason = %reason, "symbol skipped");
                        (symbol, None)
                    }
                }
            });
        }

        let mut setups: Vec<Setup> = Vec::new();
        while let Some(joined) = evals.join_next().await {
            if let Ok((_, Some(setup))) = joined {
                setups.push(setup);
            }
        }

        // Strongest signals claim the remaining position slots.
        setups.sort_by(|a, b| b.signal_strength.cmp(&a.signal_strength));

        for setup in setups {
            match self.ledger.try_admit(&setup, now, &self.session, &account) {
                Ok(()) => {}
                Err(reason) => {
                    self.metrics.inc_rejections();
                    tracing::debug!(symbol = %setup.symbol, reason = %reason, "setup rejected");
                    continue;
                }
            }

            if !self.entry_price_still_sane(&setup).await {
                self.metrics.inc_rejections();
                continue;
            }

            self.submit_entry(setup, now).await;
        }
    }

    /// Re-read the cached quote and drop the entry if it drifted.
    async fn entry_price_still_sane(&self, setup: &Setup) -> bool {
        match self.provider.last(&setup.symbol).await {
            Ok(quote) => {
                let drift =
                    (quote.last - setup.entry_price).abs() / setup.entry_price * Decimal::ONE_HUNDRED;
                if drift > self.config.entry_drift_pct {
                    tracing::info!(
                        symbol = %setup.symbol,
                        planned = %setup.entry_price,
                        now = %quote.last,
                        "entry dropped, price drifted"
                    );
                    return false;
                }
                true
            }
            Err(_) => false,
        }
    }

    /// Submit the bracket and register the managed position.
    async fn submit_entry(&self, setup: Setup, now: DateTime<Utc>) {
        // Dedup lock is written at submit time, before the wire call.
        self.ledger.lock_entry(&setup.symbol, now);

        let request = BracketOrderRequest {
            symbol: setup.symbol.clone(),
            side: OrderSide::entry_for(setup.side),
            qty: setup.size_shares,
            entry: EntryType::Market,
            stop_price: setup.stop_price,
            target_price: setup.target_price,
            client_order_id: generate_client_order_id(&self.config.order_id_prefix),
        };

        match self.broker.submit_bracket(request).await {
            Ok(parent_id) => {
                if let Err(reason) = self.ledger.register_open(&setup.symbol) {
                    // Cap raced away between admit and submit; close out.
                    tracing::error!(symbol = %setup.symbol, reason = %reason, "post-submit registration failed");
                    let _ = self.broker.cancel(&parent_id).await;
                    self.ledger.release_entry_lock(&setup.symbol);
                    return;
                }

                self.metrics.inc_admissions();
                self.metrics.inc_orders_submitted();
                self.store
                    .record(TradeEvent {
                        ts: now,
                        symbol: setup.symbol.clone(),
                        side: setup.side,
                        size: setup.size_shares,
                        price: setup.entry_price,
                        fees: Decimal::ZERO,
                        realized_pnl: None,
                        kind: TradeEventKind::SetupAdmitted,
                        parent_order_id: Some(parent_id.clone()),
                    })
                    .await;

                let position = ManagedPosition::awaiting_fill(&setup, parent_id, now);
                self.positions
                    .insert(setup.symbol.clone(), Arc::new(Mutex::new(position)));

                tracing::info!(
                    symbol = %setup.symbol,
                    side = %setup.side,
                    size = setup.size_shares,
                    strength = setup.signal_strength,
                    "entry submitted"
                );
            }
            Err(e @ BrokerError::Rejected(_))
            | Err(e @ BrokerError::InsufficientBuyingPower)
            | Err(e @ BrokerError::UnknownSymbol(_)) => {
                // Definitive refusal: release the dedup lock immediately.
                self.ledger.release_entry_lock(&setup.symbol);
                tracing::warn!(symbol = %setup.symbol, error = %e, "entry refused by broker");
            }
            Err(e) => {
                // Ambiguous failure: keep the lock so a duplicate cannot
                // slip in before the dedup window lapses.
                tracing::warn!(symbol = %setup.symbol, error = %e, "entry submit failed");
            }
        }
    }

    /// Gap is computed once per day per symbol.
    async fn cached_gap(&self, symbol: &str, now: DateTime<Utc>) -> Option<GapObservation> {
        let today = self.session.trading_date(now);
        if let Some(entry) = self.gap_cache.get(symbol) {
            let (date, gap) = entry.value();
            if *date == today {
                return Some(gap.clone());
            }
        }

        let daily = self
            .provider
            .bars(symbol, Timeframe::Day, EVAL_BARS_DAILY)
            .await
            .ok()?;
        let gap = gap_from_daily(symbol, &daily)?;
        self.gap_cache
            .insert(symbol.to_string(), (today, gap.clone()));
        Some(gap)
    }

    async fn handle_command(&mut self, command: EngineCommand) {
        match command {
            EngineCommand::Pause => {
                self.paused = true;
                tracing::info!("entries paused");
            }
            EngineCommand::Resume => {
                self.paused = false;
                tracing::info!("entries resumed");
            }
            EngineCommand::ClosePosition { symbol } => {
                let now = Utc::now();
                if let Some(entry) = self.positions.get(&symbol) {
                    let pos = Arc::clone(entry.value());
                    drop(entry);
                    let mut guard = pos.lock().await;
                    self.monitor
                        .force_close(&mut guard, ExitKind::Manual, now)
                        .await;
                } else {
                    tracing::warn!(symbol = %symbol, "close requested for unmanaged symbol");
                }
            }
            EngineCommand::CloseAllPositions => {
                self.cutoff_sweep(Utc::now()).await;
            }
            EngineCommand::SetWatchlist(symbols) => {
                tracing::info!(count = symbols.len(), "watchlist replaced");
                self.watchlist = symbols;
            }
            EngineCommand::Status(reply) => {
                let status = self.status().await;
                let _ = reply.send(status);
            }
        }
    }

    async fn status(&self) -> EngineStatus {
        let ledger = self.ledger.snapshot();
        let handles: Vec<SharedPosition> = self
            .positions
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();
        let mut open_positions = Vec::new();
        for handle in handles {
            let pos = handle.lock().await;
            open_positions.push(PositionSummary {
                symbol: pos.symbol.clone(),
                side: pos.side,
                size_shares: pos.size_shares,
                entry_price: pos.entry_price,
                current_stop_price: pos.current_stop_price,
                state: pos.state,
            });
        }

        EngineStatus {
            paused: self.paused,
            trading_date: ledger.trading_date,
            watchlist_size: self.watchlist.len(),
            open_positions,
            trades_today: ledger.filled_trade_count,
            realized_pnl: ledger.realized_pnl,
            circuit_tripped: self.ledger.circuit_tripped(),
            metrics: self.metrics.snapshot(),
        }
    }
}

/// Fetch bars, build the snapshot, and evaluate one symbol.
///
/// `Err` is a data problem (skip + count); `Ok(None)` is a strategy
/// rejection (normal).
async fn evaluate_symbol(
    symbol: &str,
    gap: Option<GapObservation>,
    provider: &MarketDataProvider,
    session: &TradingSession,
    config: &EngineConfig,
    now: DateTime<Utc>,
) -> Result<Option<Setup>, String> {
    let Some(gap) = gap else {
        return Err("no gap observation".to_string());
    };

    let bars_5m = provider
        .bars(symbol, Timeframe::Min5, EVAL_BARS_5M)
        .await
        .map_err(|e| e.to_string())?;
    let daily = provider
        .bars(symbol, Timeframe::Day, EVAL_BARS_DAILY)
        .await
        .map_err(|e| e.to_string())?;
    let quote = provider.last(symbol).await.map_err(|e| e.to_string())?;

    let session_open = session.session_open_instant(now);
    let fraction = session.session_fraction_elapsed(now);
    let Some(snapshot) = build_snapshot(&bars_5m, &daily, session_open, fraction) else {
        return Err("indicators warming up".to_string());
    };

    match evaluate(&gap, &snapshot, &quote, &config.strategy) {
        Ok(setup) => Ok(Some(setup)),
        Err(rejection) => {
            tracing::trace!(symbol = %symbol, reason = %rejection, "no setup");
            Ok(None)
        }
    }
}
