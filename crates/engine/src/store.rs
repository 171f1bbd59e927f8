//! Append-only trade event log.
//!
//! The engine emits a record for every observable event; the store behind
//! the trait is opaque (database, file, memory). The engine reads back only
//! at startup, to rebuild the day's tallies.

use crate::position::ExitKind;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use model::Side;
use parking_lot::Mutex;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeEventKind {
    SetupAdmitted,
    EntryFilled,
    StopReplaced,
    Exit(ExitKind),
    ForceCloseIssued,
}

/// One observable engine event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeEvent {
    /// UTC event time.
    pub ts: DateTime<Utc>,
    pub symbol: String,
    pub side: Side,
    pub size: u32,
    /// Price relevant to the event (entry fill, new stop, exit fill).
    pub price: Decimal,
    pub fees: Decimal,
    /// Realized PnL, present on exits.
    pub realized_pnl: Option<Decimal>,
    pub kind: TradeEventKind,
    pub parent_order_id: Option<String>,
}

/// Tallies recovered at startup.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DayTallies {
    pub realized_pnl: Decimal,
    pub filled_trade_count: u32,
}

/// Shared store handle.
pub type SharedStore = Arc<dyn TradeStore>;

/// Opaque append/update log for trade records.
#[async_trait]
pub trait TradeStore: Send + Sync {
    /// Append one event. Implementations absorb their own failures; the
    /// engine never blocks trading on the store.
    async fn record(&self, event: TradeEvent);

    /// Today's realized PnL and filled trade count, for restart recovery.
    async fn day_tallies(&self, date: NaiveDate) -> DayTallies;
}

/// In-memory store used by tests and dry runs.
#[derive(Default)]
pub struct MemoryStore {
    events: Mutex<Vec<TradeEvent>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded events, oldest first.
    pub fn events(&self) -> Vec<TradeEvent> {
        self.events.lock().clone()
    }

    /// Events of one kind, oldest first.
    pub fn events_of(&self, kind: TradeEventKind) -> Vec<TradeEvent> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.kind == kind)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl TradeStore for MemoryStore {
    async fn record(&self, event: TradeEvent) {
        self.events.lock().push(event);
    }

    async fn day_tallies(&self, date: NaiveDate) -> DayTallies {
        let events = self.events.lock();
        let mut tallies = DayTallies::default();
        for event in events.iter().filter(|e| e.ts.date_naive() == date) {
            match event.kind {
                TradeEventKind::EntryFilled => tallies.filled_trade_count += 1,
                TradeEventKind::Exit(_) => {
                    tallies.realized_pnl += event.realized_pnl.unwrap_or(Decimal::ZERO);
                }
                _ => {}
            }
        }
        tallies
    }
}
