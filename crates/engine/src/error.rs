//! Engine error types.
//!
//! Recoverable conditions (data gaps, broker rejections, risk rejections)
//! never surface here; they are handled inside the component that raised
//! them. `EngineError` covers only failures that stop the engine.

use thiserror::Error;

/// Fatal engine failures.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Invalid configuration.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Control channel closed while the engine was running.
    #[error("command channel closed")]
    ChannelClosed,
}
