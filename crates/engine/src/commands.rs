//! Control-surface contracts.
//!
//! The HTTP layer (out of scope here) drives the engine exclusively through
//! these commands and reads state back through [`EngineStatus`].

use crate::position::PositionState;
use chrono::NaiveDate;
use metrics::MetricsSnapshot;
use model::Side;
use rust_decimal::Decimal;
use tokio::sync::oneshot;

/// Commands accepted by the coordinator while running.
#[derive(Debug)]
pub enum EngineCommand {
    /// Stop admitting new entries; open positions stay managed.
    Pause,
    /// Resume admitting entries.
    Resume,
    /// Force-close one managed position.
    ClosePosition { symbol: String },
    /// Force-close every managed position.
    CloseAllPositions,
    /// Replace the scan universe.
    SetWatchlist(Vec<String>),
    /// Snapshot current state.
    Status(oneshot::Sender<EngineStatus>),
}

/// Point-in-time engine state for the control surface.
#[derive(Debug, Clone)]
pub struct EngineStatus {
    pub paused: bool,
    pub trading_date: NaiveDate,
    pub watchlist_size: usize,
    pub open_positions: Vec<PositionSummary>,
    pub trades_today: u32,
    pub realized_pnl: Decimal,
    pub circuit_tripped: bool,
    pub metrics: MetricsSnapshot,
}

/// One managed position as shown to operators.
#[derive(Debug, Clone)]
pub struct PositionSummary {
    pub symbol: String,
    pub side: Side,
    pub size_shares: u32,
    pub entry_price: Decimal,
    pub current_stop_price: Decimal,
    pub state: PositionState,
}
