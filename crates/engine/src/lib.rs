//! The trading engine runtime.
//!
//! Three subsystems around one shared object:
//!
//! - **`DayLedger`**: the only shared mutable state — daily tallies, symbol
//!   cooldowns, pending entry locks, and the managed-symbol set, behind a
//!   narrow interface of invariant-preserving transitions (`try_admit`,
//!   `register_open`, `record_exit`, `record_stop_out`, ...).
//! - **`PositionMonitor`**: the per-position tiered trailing-stop state
//!   machine, stepped once per monitor tick per symbol.
//! - **`Coordinator`**: the scheduling loop — scanner cadence, monitor
//!   cadence, and the daily force-close sweep — plus the command surface
//!   (`pause`, `resume`, `close_position`, `status`).
//!
//! Trade activity is emitted as [`TradeEvent`]s to a pluggable
//! [`TradeStore`].

mod commands;
mod config;
mod coordinator;
mod error;
mod ledger;
mod monitor;
mod position;
mod store;

pub use commands::{EngineCommand, EngineStatus, PositionSummary};
pub use config::EngineConfig;
pub use coordinator::Coordinator;
pub use error::EngineError;
pub use ledger::{DayLedger, LedgerSnapshot, RiskRejection};
pub use monitor::PositionMonitor;
pub use position::{
    candidate_stop, desired_lock, dollar_profit, is_improvement, ExitKind, ManagedPosition,
    PendingExit, PositionState,
};
pub use store::{DayTallies, MemoryStore, SharedStore, TradeEvent, TradeEventKind, TradeStore};
