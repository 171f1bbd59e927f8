//! The injectable broker interface.

use crate::error::BrokerError;
use crate::order::{
    AccountSnapshot, BracketChildren, BracketOrderRequest, BrokerPosition, CancelOutcome,
    OrderSide, OrderSnapshot, TrailSpec,
};
use async_trait::async_trait;
use model::{Bar, Quote, Timeframe};
use rust_decimal::Decimal;
use std::sync::Arc;

/// Shared broker handle.
pub type SharedBroker = Arc<dyn BrokerApi>;

/// Typed, normalized facade over the brokerage REST API.
///
/// Implementations must make `cancel` idempotent (terminal orders report
/// `CancelOutcome::AlreadyTerminal`, not an error) and surface every failure
/// as a `BrokerError` variant.
#[async_trait]
pub trait BrokerApi: Send + Sync {
    /// Submit an entry with attached stop and target legs.
    /// Returns the parent order id.
    async fn submit_bracket(&self, req: BracketOrderRequest) -> Result<String, BrokerError>;

    /// Submit a broker-native trailing stop for an exit.
    async fn submit_trailing_stop(
        &self,
        symbol: &str,
        exit_side: OrderSide,
        qty: u32,
        trail: TrailSpec,
    ) -> Result<String, BrokerError>;

    /// Submit a plain market order.
    async fn submit_market(
        &self,
        symbol: &str,
        side: OrderSide,
        qty: u32,
    ) -> Result<String, BrokerError>;

    /// Cancel an order. Cancelling an already-terminal order is success.
    async fn cancel(&self, order_id: &str) -> Result<CancelOutcome, BrokerError>;

    /// Move a stop order to a new trigger price.
    ///
    /// Returns the id of the order now carrying the stop (a replacement may
    /// be issued under a new id). `AlreadyTerminal` means the stop filled
    /// before the replace landed.
    async fn replace_stop(&self, order_id: &str, new_stop: Decimal)
        -> Result<String, BrokerError>;

    /// Child legs (stop/target) of a bracket parent.
    async fn children_of(&self, parent_id: &str) -> Result<BracketChildren, BrokerError>;

    /// Current view of one order.
    async fn order(&self, order_id: &str) -> Result<OrderSnapshot, BrokerError>;

    /// All open positions on the account, managed or not.
    async fn positions(&self) -> Result<Vec<BrokerPosition>, BrokerError>;

    /// Account equity and buying power.
    async fn account(&self) -> Result<AccountSnapshot, BrokerError>;

    /// Most recent `limit` bars for a symbol, ascending by timestamp.
    async fn bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Bar>, BrokerError>;

    /// Latest trade for a symbol.
    async fn last_trade(&self, symbol: &str) -> Result<Quote, BrokerError>;
}
