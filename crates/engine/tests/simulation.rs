//! End-to-end state-machine scenarios against a scripted broker.

use async_trait::async_trait;
use broker::{
    AccountSnapshot, BracketChildren, BracketOrderRequest, BrokerApi, BrokerError, BrokerPosition,
    CancelOutcome, OrderSide, OrderSnapshot, OrderStatus, SharedBroker, TrailSpec,
};
use chrono::{DateTime, TimeZone, Utc};
use engine::{
    DayLedger, EngineConfig, ExitKind, ManagedPosition, MemoryStore, PositionMonitor,
    PositionState, SharedStore, TradeEventKind,
};
use metrics::{create_metrics, SharedMetrics};
use model::{Bar, Quote, Side, Timeframe};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use strategy::{Setup, SetupKind};

// ---------------------------------------------------------------------------
// Scripted broker
// ---------------------------------------------------------------------------

#[derive(Default)]
struct MockState {
    orders: HashMap<String, OrderSnapshot>,
    children: HashMap<String, BracketChildren>,
    scripted_replace_errors: VecDeque<BrokerError>,
    next_id: u32,
}

struct MockBroker {
    state: Mutex<MockState>,
    replace_calls: AtomicU32,
    cancel_calls: AtomicU32,
    market_orders: AtomicU32,
}

impl MockBroker {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            state: Mutex::new(MockState::default()),
            replace_calls: AtomicU32::new(0),
            cancel_calls: AtomicU32::new(0),
            market_orders: AtomicU32::new(0),
        })
    }

    fn alloc_id(state: &mut MockState, prefix: &str) -> String {
        state.next_id += 1;
        format!("{prefix}-{}", state.next_id)
    }

    fn insert_order(
        state: &mut MockState,
        id: &str,
        symbol: &str,
        side: OrderSide,
        qty: u32,
        status: OrderStatus,
        stop_price: Option<Decimal>,
    ) {
        state.orders.insert(
            id.to_string(),
            OrderSnapshot {
                order_id: id.to_string(),
                client_order_id: format!("c-{id}"),
                symbol: symbol.to_string(),
                side,
                status,
                qty,
                filled_qty: 0,
                filled_avg_price: None,
                stop_price,
                limit_price: None,
            },
        );
    }

    /// Open a filled long/short bracket: parent filled at `fill`, protective
    /// legs held. Returns (parent, stop, target) ids.
    fn open_bracket(
        &self,
        symbol: &str,
        side: Side,
        qty: u32,
        fill: Decimal,
        stop: Decimal,
    ) -> (String, String, String) {
        let mut state = self.state.lock();
        let parent = Self::alloc_id(&mut state, "parent");
        let stop_id = Self::alloc_id(&mut state, "stop");
        let target_id = Self::alloc_id(&mut state, "target");

        Self::insert_order(
            &mut state,
            &parent,
            symbol,
            OrderSide::entry_for(side),
            qty,
            OrderStatus::Filled,
            None,
        );
        if let Some(order) = state.orders.get_mut(&parent) {
            order.filled_qty = qty;
            order.filled_avg_price = Some(fill);
        }
        Self::insert_order(
            &mut state,
            &stop_id,
            symbol,
            OrderSide::exit_for(side),
            qty,
            OrderStatus::Held,
            Some(stop),
        );
        Self::insert_order(
            &mut state,
            &target_id,
            symbol,
            OrderSide::exit_for(side),
            qty,
            OrderStatus::Held,
            None,
        );
        state.children.insert(
            parent.clone(),
            BracketChildren {
                stop_leg_id: Some(stop_id.clone()),
                target_leg_id: Some(target_id.clone()),
            },
        );
        (parent, stop_id, target_id)
    }

    fn fill_order(&self, id: &str, price: Decimal) {
        let mut state = self.state.lock();
        if let Some(order) = state.orders.get_mut(id) {
            order.status = OrderStatus::Filled;
            order.filled_qty = order.qty;
            order.filled_avg_price = Some(price);
        }
    }

    fn order_status(&self, id: &str) -> OrderStatus {
        self.state.lock().orders.get(id).map(|o| o.status).unwrap()
    }

    fn script_replace_error(&self, err: BrokerError) {
        self.state.lock().scripted_replace_errors.push_back(err);
    }

    fn replace_calls(&self) -> u32 {
        self.replace_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BrokerApi for MockBroker {
    async fn submit_bracket(&self, req: BracketOrderRequest) -> Result<String, BrokerError> {
        let mut state = self.state.lock();
        let parent = Self::alloc_id(&mut state, "parent");
        Self::insert_order(
            &mut state,
            &parent,
            &req.symbol,
            req.side,
            req.qty,
            OrderStatus::New,
            None,
        );
        Ok(parent)
    }

    async fn submit_trailing_stop(
        &self,
        _symbol: &str,
        _exit_side: OrderSide,
        _qty: u32,
        _trail: TrailSpec,
    ) -> Result<String, BrokerError> {
        Err(BrokerError::Rejected("not scripted".into()))
    }

    async fn submit_market(
        &self,
        symbol: &str,
        side: OrderSide,
        qty: u32,
    ) -> Result<String, BrokerError> {
        self.market_orders.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock();
        let id = Self::alloc_id(&mut state, "mkt");
        Self::insert_order(&mut state, &id, symbol, side, qty, OrderStatus::New, None);
        Ok(id)
    }

    async fn cancel(&self, order_id: &str) -> Result<CancelOutcome, BrokerError> {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock();
        match state.orders.get_mut(order_id) {
            Some(order) if order.status.is_terminal() => Ok(CancelOutcome::AlreadyTerminal),
            Some(order) => {
                order.status = OrderStatus::Canceled;
                Ok(CancelOutcome::Canceled)
            }
            None => Err(BrokerError::Rejected(format!("unknown order {order_id}"))),
        }
    }

    async fn replace_stop(
        &self,
        order_id: &str,
        new_stop: Decimal,
    ) -> Result<String, BrokerError> {
        self.replace_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock();

        if let Some(err) = state.scripted_replace_errors.pop_front() {
            return Err(err);
        }

        let (symbol, side, qty) = match state.orders.get(order_id) {
            Some(order) if order.status.is_terminal() => {
                return Err(BrokerError::AlreadyTerminal)
            }
            Some(order) => (order.symbol.clone(), order.side, order.qty),
            None => return Err(BrokerError::Rejected(format!("unknown order {order_id}"))),
        };

        if let Some(order) = state.orders.get_mut(order_id) {
            order.status = OrderStatus::Replaced;
        }
        let new_id = Self::alloc_id(&mut state, "stop");
        Self::insert_order(
            &mut state,
            &new_id,
            &symbol,
            side,
            qty,
            OrderStatus::Held,
            Some(new_stop),
        );
        Ok(new_id)
    }

    async fn children_of(&self, parent_id: &str) -> Result<BracketChildren, BrokerError> {
        Ok(self
            .state
            .lock()
            .children
            .get(parent_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn order(&self, order_id: &str) -> Result<OrderSnapshot, BrokerError> {
        self.state
            .lock()
            .orders
            .get(order_id)
            .cloned()
            .ok_or_else(|| BrokerError::Rejected(format!("unknown order {order_id}")))
    }

    async fn positions(&self) -> Result<Vec<BrokerPosition>, BrokerError> {
        Ok(Vec::new())
    }

    async fn account(&self) -> Result<AccountSnapshot, BrokerError> {
        Ok(AccountSnapshot {
            equity: dec!(100000),
            buying_power: dec!(200000),
            cash: dec!(50000),
        })
    }

    async fn bars(
        &self,
        _symbol: &str,
        _timeframe: Timeframe,
        _limit: usize,
    ) -> Result<Vec<Bar>, BrokerError> {
        Ok(Vec::new())
    }

    async fn last_trade(&self, symbol: &str) -> Result<Quote, BrokerError> {
        Ok(Quote {
            symbol: symbol.to_string(),
            last: dec!(100),
            timestamp: Utc::now(),
        })
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

struct Harness {
    broker: Arc<MockBroker>,
    ledger: Arc<DayLedger>,
    store: Arc<MemoryStore>,
    metrics: SharedMetrics,
    monitor: PositionMonitor,
}

impl Harness {
    fn new() -> Self {
        let config = Arc::new(EngineConfig::default());
        let broker = MockBroker::new();
        let ledger = Arc::new(DayLedger::new(
            Arc::clone(&config),
            eastern(11, 0, 0).date_naive(),
        ));
        let store = Arc::new(MemoryStore::new());
        let metrics = create_metrics();
        let monitor = PositionMonitor::new(
            Arc::clone(&broker) as SharedBroker,
            Arc::clone(&ledger),
            Arc::clone(&store) as SharedStore,
            Arc::clone(&metrics),
            Arc::clone(&config),
        );
        Self {
            broker,
            ledger,
            store,
            metrics,
            monitor,
        }
    }

    /// Open a managed position directly in `OpenInitial`.
    fn open_position(
        &self,
        symbol: &str,
        side: Side,
        qty: u32,
        entry: Decimal,
        stop: Decimal,
        target: Decimal,
        entry_time: DateTime<Utc>,
    ) -> (ManagedPosition, String, String) {
        let (parent, stop_id, target_id) =
            self.broker.open_bracket(symbol, side, qty, entry, stop);

        let setup = Setup {
            symbol: symbol.to_string(),
            side,
            entry_price: entry,
            stop_price: stop,
            target_price: target,
            size_shares: qty,
            risk_dollars: dec!(100),
            stop_distance_dollars: (entry - stop).abs(),
            signal_strength: 8,
            setup_kind: SetupKind::GapContinuation,
        };
        let mut pos = ManagedPosition::awaiting_fill(&setup, parent, entry_time);
        pos.state = PositionState::OpenInitial;
        pos.entry_time = Some(entry_time);
        pos.current_stop_order_id = Some(stop_id.clone());
        pos.target_order_id = Some(target_id.clone());
        self.ledger.register_open(symbol).unwrap();
        (pos, stop_id, target_id)
    }
}

/// A UTC instant at the given Eastern wall-clock time on a trading Tuesday.
fn eastern(h: u32, m: u32, s: u32) -> DateTime<Utc> {
    chrono_tz::America::New_York
        .with_ymd_and_hms(2024, 6, 4, h, m, s)
        .unwrap()
        .with_timezone(&Utc)
}

// ---------------------------------------------------------------------------
// A clean winner walks the tier ladder
// ---------------------------------------------------------------------------

#[tokio::test]
async fn winner_walks_the_tier_ladder() {
    let h = Harness::new();
    let t0 = eastern(10, 30, 0);
    let (mut pos, _stop0, _target) = h.open_position(
        "AAPL",
        Side::Long,
        50,
        dec!(100.00),
        dec!(98.50),
        dec!(103.75),
        t0,
    );

    // 100 -> 101: profit $50, peak >= $15 -> breakeven.
    h.monitor
        .tick(&mut pos, Some(dec!(101)), t0 + chrono::Duration::seconds(60))
        .await;
    assert_eq!(pos.state, PositionState::OpenBreakeven);
    assert_eq!(pos.current_stop_price, dec!(100.00));
    assert_eq!(pos.locked_profit, Some(dec!(0)));

    // 102: profit $100, tier lock $50 -> stop 101.00.
    h.monitor
        .tick(&mut pos, Some(dec!(102)), t0 + chrono::Duration::seconds(120))
        .await;
    assert_eq!(pos.state, PositionState::OpenTierLocked);
    assert_eq!(pos.current_stop_price, dec!(101.00));
    assert_eq!(pos.locked_profit, Some(dec!(50)));

    // 103: profit $150, lock 50*floor(120/50) = $100 -> stop 102.00.
    h.monitor
        .tick(&mut pos, Some(dec!(103)), t0 + chrono::Duration::seconds(180))
        .await;
    assert_eq!(pos.current_stop_price, dec!(102.00));
    assert_eq!(pos.locked_profit, Some(dec!(100)));

    // Retrace to 102.80: stop at 102 untouched, no new replacement.
    let replaces = h.broker.replace_calls();
    h.monitor
        .tick(&mut pos, Some(dec!(102.80)), t0 + chrono::Duration::seconds(240))
        .await;
    assert_eq!(pos.current_stop_price, dec!(102.00));
    assert_eq!(h.broker.replace_calls(), replaces);
    assert_eq!(pos.state, PositionState::OpenTierLocked);

    // Retrace to 102.00: the stop leg fills there and the exit books $100.
    let stop_id = pos.current_stop_order_id.clone().unwrap();
    h.broker.fill_order(&stop_id, dec!(102.00));
    h.monitor
        .tick(&mut pos, Some(dec!(102.00)), t0 + chrono::Duration::seconds(300))
        .await;
    assert_eq!(pos.state, PositionState::Closed);
    assert_eq!(h.ledger.snapshot().realized_pnl, dec!(100.00));

    // Stop-fill exits arm the cooldown even once the symbol is unmanaged.
    h.ledger.remove_managed("AAPL");
    assert!(h
        .ledger
        .symbol_blocked("AAPL", t0 + chrono::Duration::seconds(360)));
}

// ---------------------------------------------------------------------------
// Quick-profit override
// ---------------------------------------------------------------------------

#[tokio::test]
async fn quick_profit_moves_stop_to_breakeven() {
    let h = Harness::new();
    let t0 = eastern(10, 0, 0);
    let (mut pos, _, _) = h.open_position(
        "TSLA",
        Side::Long,
        40,
        dec!(250.00),
        dec!(247.00),
        dec!(257.50),
        t0,
    );

    // t=120s, last 250.55: profit $22 within the 600 s window.
    h.monitor
        .tick(
            &mut pos,
            Some(dec!(250.55)),
            t0 + chrono::Duration::seconds(120),
        )
        .await;
    assert_eq!(pos.state, PositionState::OpenBreakeven);
    assert_eq!(pos.current_stop_price, dec!(250.00));
}

// ---------------------------------------------------------------------------
// A noise-protected loser exits only at the stop
// ---------------------------------------------------------------------------

#[tokio::test]
async fn loser_rides_noise_until_the_stop() {
    let h = Harness::new();
    let t0 = eastern(10, 30, 0);
    let (mut pos, stop_id, _) = h.open_position(
        "PFE",
        Side::Long,
        400,
        dec!(24.65),
        dec!(24.35),
        dec!(25.40),
        t0,
    );

    // Dip to 24.55: above the stop, nothing moves.
    h.monitor
        .tick(&mut pos, Some(dec!(24.55)), t0 + chrono::Duration::seconds(60))
        .await;
    assert_eq!(pos.state, PositionState::OpenInitial);
    assert_eq!(pos.current_stop_price, dec!(24.35));
    assert_eq!(h.broker.replace_calls(), 0);

    // 24.35: stop fills, loss books.
    h.broker.fill_order(&stop_id, dec!(24.35));
    h.monitor
        .tick(&mut pos, Some(dec!(24.35)), t0 + chrono::Duration::seconds(120))
        .await;
    assert_eq!(pos.state, PositionState::Closed);
    assert_eq!(h.ledger.snapshot().realized_pnl, dec!(-120.00));
}

// ---------------------------------------------------------------------------
// Force-close at cutoff
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cutoff_force_closes_all_positions() {
    let h = Harness::new();
    let t0 = eastern(13, 0, 0);
    let (mut aapl, aapl_stop, aapl_target) = h.open_position(
        "AAPL",
        Side::Long,
        50,
        dec!(100),
        dec!(98.50),
        dec!(103.75),
        t0,
    );
    let (mut tsla, _tsla_stop, tsla_target) = h.open_position(
        "TSLA",
        Side::Long,
        40,
        dec!(250),
        dec!(247),
        dec!(257.50),
        t0,
    );

    // One target leg is already terminal: cancel must be a no-op success.
    h.broker.fill_order(&tsla_target, dec!(257.50));

    let cutoff = eastern(13, 50, 0);
    h.monitor
        .force_close(&mut aapl, ExitKind::ForceClose, cutoff)
        .await;
    h.monitor
        .force_close(&mut tsla, ExitKind::ForceClose, cutoff)
        .await;

    assert_eq!(aapl.state, PositionState::Closing);
    assert_eq!(tsla.state, PositionState::Closing);
    assert_eq!(h.broker.market_orders.load(Ordering::SeqCst), 2);
    // Both legs of both brackets saw a cancel attempt.
    assert_eq!(h.broker.cancel_calls.load(Ordering::SeqCst), 4);
    assert_eq!(h.broker.order_status(&aapl_stop), OrderStatus::Canceled);
    assert_eq!(h.broker.order_status(&aapl_target), OrderStatus::Canceled);
    // The already-filled target stayed filled; the cancel was a no-op.
    assert_eq!(h.broker.order_status(&tsla_target), OrderStatus::Filled);

    // No monitor tick after cutoff issues further replaces.
    let replaces = h.broker.replace_calls();
    h.monitor
        .tick(&mut aapl, Some(dec!(105)), cutoff + chrono::Duration::seconds(5))
        .await;
    assert_eq!(h.broker.replace_calls(), replaces);

    // Market fills confirm the close.
    let exit_id = aapl.pending_exit.clone().unwrap().order_id;
    h.broker.fill_order(&exit_id, dec!(101.25));
    h.monitor
        .tick(&mut aapl, Some(dec!(101.25)), cutoff + chrono::Duration::seconds(10))
        .await;
    assert_eq!(aapl.state, PositionState::Closed);
    assert_eq!(h.ledger.snapshot().realized_pnl, dec!(62.50));

    // Force-closed exits do not arm the stop-out cooldown.
    h.ledger.remove_managed("AAPL");
    assert!(!h
        .ledger
        .symbol_blocked("AAPL", cutoff + chrono::Duration::seconds(30)));

    let force_events = h.store.events_of(TradeEventKind::ForceCloseIssued);
    assert_eq!(force_events.len(), 2);
    assert_eq!(h.metrics.force_closes(), 2);
}

// ---------------------------------------------------------------------------
// Replace-protocol edges (cooldown and trade-cap behavior are covered by
// the ledger unit tests).
// ---------------------------------------------------------------------------

#[tokio::test]
async fn replace_already_terminal_means_stop_filled() {
    let h = Harness::new();
    let t0 = eastern(10, 30, 0);
    let (mut pos, stop_id, _) = h.open_position(
        "AAPL",
        Side::Long,
        50,
        dec!(100),
        dec!(98.50),
        dec!(103.75),
        t0,
    );

    // The stop fills a moment before the breakeven replace lands.
    h.broker.fill_order(&stop_id, dec!(98.50));
    h.monitor
        .tick(&mut pos, Some(dec!(101)), t0 + chrono::Duration::seconds(60))
        .await;

    // AlreadyTerminal routes into Closing, then the booked exit closes it.
    assert_eq!(pos.state, PositionState::Closed);
    assert_eq!(h.ledger.snapshot().realized_pnl, dec!(-75.00));
}

#[tokio::test]
async fn replace_transient_failures_keep_prior_stop() {
    let h = Harness::new();
    let t0 = eastern(10, 30, 0);
    let (mut pos, _, _) = h.open_position(
        "AAPL",
        Side::Long,
        50,
        dec!(100),
        dec!(98.50),
        dec!(103.75),
        t0,
    );

    // Four transients exhaust the 3-retry budget.
    for _ in 0..4 {
        h.broker
            .script_replace_error(BrokerError::Transient("flaky".into()));
    }

    h.monitor
        .tick(&mut pos, Some(dec!(101)), t0 + chrono::Duration::seconds(60))
        .await;

    // Prior stop remains; position still open and retriable next tick.
    assert_eq!(pos.current_stop_price, dec!(98.50));
    assert_eq!(pos.state, PositionState::OpenInitial);
    assert_eq!(pos.replace_failures, 1);

    // Next tick succeeds and promotes to breakeven.
    h.monitor
        .tick(&mut pos, Some(dec!(101)), t0 + chrono::Duration::seconds(120))
        .await;
    assert_eq!(pos.state, PositionState::OpenBreakeven);
    assert_eq!(pos.current_stop_price, dec!(100.00));
}

#[tokio::test]
async fn replace_rejected_keeps_prior_stop_and_price() {
    let h = Harness::new();
    let t0 = eastern(10, 30, 0);
    let (mut pos, stop_id, _) = h.open_position(
        "AAPL",
        Side::Long,
        50,
        dec!(100),
        dec!(98.50),
        dec!(103.75),
        t0,
    );

    h.broker
        .script_replace_error(BrokerError::Rejected("no".into()));

    h.monitor
        .tick(&mut pos, Some(dec!(101)), t0 + chrono::Duration::seconds(60))
        .await;

    assert_eq!(pos.current_stop_price, dec!(98.50));
    assert_eq!(pos.current_stop_order_id, Some(stop_id));
    assert_eq!(pos.state, PositionState::OpenInitial);
}

// ---------------------------------------------------------------------------
// Stop monotonicity over a random walk
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stop_never_retreats_under_random_walk() {
    let h = Harness::new();
    let t0 = eastern(10, 30, 0);
    let (mut pos, _, _) = h.open_position(
        "AAPL",
        Side::Long,
        50,
        dec!(100),
        dec!(98.50),
        dec!(199.00),
        t0,
    );

    // Deterministic pseudo-random walk.
    let mut price = dec!(100);
    let mut seed: u64 = 0x5DEECE66D;
    let mut prev_stop = pos.current_stop_price;

    for i in 0..300 {
        seed = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        let step = ((seed >> 33) % 41) as i64 - 20; // [-20, +20] cents
        price += Decimal::new(step, 2);
        if price < dec!(90) {
            price = dec!(90);
        }

        h.monitor
            .tick(
                &mut pos,
                Some(price),
                t0 + chrono::Duration::seconds(60 + i),
            )
            .await;

        if !pos.is_open() {
            break;
        }
        assert!(
            pos.current_stop_price >= prev_stop,
            "stop moved down: {} -> {} at tick {}",
            prev_stop,
            pos.current_stop_price,
            i
        );
        // The machine never leaves OpenInitial below the peak threshold.
        if pos.state != PositionState::OpenInitial {
            assert!(pos.highest_profit_seen >= dec!(15));
        }
        prev_stop = pos.current_stop_price;
    }
}

// ---------------------------------------------------------------------------
// Awaiting-fill edges
// ---------------------------------------------------------------------------

#[tokio::test]
async fn awaiting_fill_promotes_on_parent_fill() {
    let h = Harness::new();
    let t0 = eastern(10, 30, 0);

    // Simulate the coordinator's submit: bracket accepted, not yet filled.
    let (parent, stop_id, target_id) =
        h.broker
            .open_bracket("NVDA", Side::Long, 10, dec!(500), dec!(495));
    // Rewind parent to working state for the awaiting-fill path.
    {
        let mut state = h.broker.state.lock();
        let order = state.orders.get_mut(&parent).unwrap();
        order.status = OrderStatus::New;
        order.filled_qty = 0;
        order.filled_avg_price = None;
    }

    let setup = Setup {
        symbol: "NVDA".into(),
        side: Side::Long,
        entry_price: dec!(500),
        stop_price: dec!(495),
        target_price: dec!(512.50),
        size_shares: 10,
        risk_dollars: dec!(50),
        stop_distance_dollars: dec!(5),
        signal_strength: 7,
        setup_kind: SetupKind::GapContinuation,
    };
    let mut pos = ManagedPosition::awaiting_fill(&setup, parent.clone(), t0);

    // Not filled yet: still waiting.
    h.monitor.tick(&mut pos, None, t0 + chrono::Duration::seconds(5)).await;
    assert_eq!(pos.state, PositionState::AwaitingFill);

    // Fill at 500.10: position opens at the actual fill price.
    h.broker.fill_order(&parent, dec!(500.10));
    h.monitor.tick(&mut pos, None, t0 + chrono::Duration::seconds(10)).await;
    assert_eq!(pos.state, PositionState::OpenInitial);
    assert_eq!(pos.entry_price, dec!(500.10));
    assert_eq!(pos.current_stop_order_id, Some(stop_id));
    assert_eq!(pos.target_order_id, Some(target_id));
    assert_eq!(h.ledger.snapshot().filled_trade_count, 1);
}

#[tokio::test]
async fn awaiting_fill_times_out_and_cancels() {
    let h = Harness::new();
    let t0 = eastern(10, 30, 0);

    let broker: SharedBroker = Arc::clone(&h.broker) as SharedBroker;
    let parent = broker
        .submit_bracket(BracketOrderRequest {
            symbol: "IWM".into(),
            side: OrderSide::Buy,
            qty: 5,
            entry: broker::EntryType::Market,
            stop_price: dec!(195),
            target_price: dec!(205),
            client_order_id: "c-1".into(),
        })
        .await
        .unwrap();

    let setup = Setup {
        symbol: "IWM".into(),
        side: Side::Long,
        entry_price: dec!(200),
        stop_price: dec!(195),
        target_price: dec!(205),
        size_shares: 5,
        risk_dollars: dec!(25),
        stop_distance_dollars: dec!(5),
        signal_strength: 6,
        setup_kind: SetupKind::GapContinuation,
    };
    let mut pos = ManagedPosition::awaiting_fill(&setup, parent.clone(), t0);

    // Beyond the 120 s fill window: the bracket is cancelled and dropped.
    h.monitor
        .tick(&mut pos, None, t0 + chrono::Duration::seconds(180))
        .await;
    assert_eq!(pos.state, PositionState::Closed);
    assert_eq!(h.broker.order_status(&parent), OrderStatus::Canceled);
}

// ---------------------------------------------------------------------------
// Target-side exit
// ---------------------------------------------------------------------------

#[tokio::test]
async fn target_fill_books_win_without_cooldown() {
    let h = Harness::new();
    let t0 = eastern(10, 30, 0);
    let (mut pos, _, target_id) = h.open_position(
        "AAPL",
        Side::Long,
        50,
        dec!(100),
        dec!(98.50),
        dec!(103.75),
        t0,
    );

    h.broker.fill_order(&target_id, dec!(103.75));
    h.monitor
        .tick(&mut pos, Some(dec!(103.80)), t0 + chrono::Duration::seconds(60))
        .await;

    assert_eq!(pos.state, PositionState::Closed);
    assert_eq!(h.ledger.snapshot().realized_pnl, dec!(187.50));
    // Target exits leave the symbol immediately eligible (no cooldown).
    h.ledger.remove_managed("AAPL");
    assert!(!h
        .ledger
        .symbol_blocked("AAPL", t0 + chrono::Duration::seconds(120)));
}

// ---------------------------------------------------------------------------
// Short side mirrors
// ---------------------------------------------------------------------------

#[tokio::test]
async fn short_position_tiers_downward() {
    let h = Harness::new();
    let t0 = eastern(10, 30, 0);
    let (mut pos, _, _) = h.open_position(
        "TSLA",
        Side::Short,
        40,
        dec!(250.00),
        dec!(253.00),
        dec!(242.50),
        t0,
    );

    // 249: profit $40 -> breakeven at 250.
    h.monitor
        .tick(&mut pos, Some(dec!(249)), t0 + chrono::Duration::seconds(660))
        .await;
    assert_eq!(pos.state, PositionState::OpenBreakeven);
    assert_eq!(pos.current_stop_price, dec!(250.00));

    // 247: profit $120 -> lock 50*floor(90/50) = $50 -> stop 248.75.
    h.monitor
        .tick(&mut pos, Some(dec!(247)), t0 + chrono::Duration::seconds(720))
        .await;
    assert_eq!(pos.state, PositionState::OpenTierLocked);
    assert_eq!(pos.current_stop_price, dec!(248.75));

    // Stops never move up for a short.
    h.monitor
        .tick(&mut pos, Some(dec!(249.50)), t0 + chrono::Duration::seconds(780))
        .await;
    assert_eq!(pos.current_stop_price, dec!(248.75));
}
