//! Shared utilities for the trading engine workspace.

mod logging;
mod retry;
mod session;

pub use logging::init_logging;
pub use retry::RetryPolicy;
pub use session::{SessionConfig, TradingSession};
