//! Order model shared between the adapter and the engine.

use model::Side;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Generate a unique client order ID with a prefix.
///
/// Format: `{prefix}_{uuid}` with a simple (hyphen-free) v4 UUID.
pub fn generate_client_order_id(prefix: &str) -> String {
    format!("{}_{}", prefix, Uuid::new_v4().as_simple())
}

/// Order side on the wire (buy or sell).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    /// Entry side for a position direction.
    pub fn entry_for(side: Side) -> Self {
        match side {
            Side::Long => Self::Buy,
            Side::Short => Self::Sell,
        }
    }

    /// Exit side for a position direction.
    pub fn exit_for(side: Side) -> Self {
        match side {
            Side::Long => Self::Sell,
            Side::Short => Self::Buy,
        }
    }

    /// Wire string for the brokerage API.
    pub fn as_api_str(&self) -> &'static str {
        match self {
            Self::Buy => "buy",
            Self::Sell => "sell",
        }
    }

    pub fn from_api_str(s: &str) -> Option<Self> {
        match s {
            "buy" => Some(Self::Buy),
            "sell" => Some(Self::Sell),
            _ => None,
        }
    }
}

/// How the entry leg of a bracket is priced.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum EntryType {
    Market,
    Limit(Decimal),
}

/// Trailing-stop distance specification.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum TrailSpec {
    /// Trail by a percentage of the best price seen.
    Percent(Decimal),
    /// Trail by an absolute dollar amount.
    Absolute(Decimal),
}

/// Normalized order status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderStatus {
    /// Accepted by the broker, not yet working.
    Accepted,
    /// Working at the exchange.
    New,
    /// Held until its trigger condition (bracket child legs).
    Held,
    PartiallyFilled,
    Filled,
    Canceled,
    Rejected,
    Expired,
    /// Superseded by a replacement order.
    Replaced,
    PendingCancel,
}

impl OrderStatus {
    pub fn from_api_str(s: &str) -> Option<Self> {
        match s {
            "accepted" | "pending_new" => Some(Self::Accepted),
            "new" => Some(Self::New),
            "held" => Some(Self::Held),
            "partially_filled" => Some(Self::PartiallyFilled),
            "filled" => Some(Self::Filled),
            "canceled" => Some(Self::Canceled),
            "rejected" => Some(Self::Rejected),
            "expired" => Some(Self::Expired),
            "replaced" => Some(Self::Replaced),
            "pending_cancel" => Some(Self::PendingCancel),
            _ => None,
        }
    }

    /// Check if the order is done (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Filled | Self::Canceled | Self::Rejected | Self::Expired | Self::Replaced
        )
    }

    /// Check if the order is still working or waiting.
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }
}

/// Point-in-time view of one order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSnapshot {
    pub order_id: String,
    pub client_order_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub status: OrderStatus,
    pub qty: u32,
    pub filled_qty: u32,
    /// Volume-weighted fill price, if any quantity has filled.
    pub filled_avg_price: Option<Decimal>,
    /// Stop trigger price for stop orders.
    pub stop_price: Option<Decimal>,
    /// Limit price for limit orders.
    pub limit_price: Option<Decimal>,
}

impl OrderSnapshot {
    pub fn is_filled(&self) -> bool {
        self.status == OrderStatus::Filled
    }
}

/// Bracket submission request: entry plus attached protection.
#[derive(Debug, Clone, PartialEq)]
pub struct BracketOrderRequest {
    pub symbol: String,
    pub side: OrderSide,
    pub qty: u32,
    pub entry: EntryType,
    pub stop_price: Decimal,
    pub target_price: Decimal,
    pub client_order_id: String,
}

/// Child legs of a bracket, discovered after submission.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BracketChildren {
    pub stop_leg_id: Option<String>,
    pub target_leg_id: Option<String>,
}

/// Result of an idempotent cancel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    /// The order was live and is now canceled.
    Canceled,
    /// The order had already reached a terminal state; nothing to do.
    AlreadyTerminal,
}

/// Account-level buying power snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountSnapshot {
    pub equity: Decimal,
    pub buying_power: Decimal,
    pub cash: Decimal,
}

/// A position as the broker reports it (managed by us or not).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerPosition {
    pub symbol: String,
    /// Signed quantity: positive long, negative short.
    pub qty: i64,
    pub avg_entry_price: Decimal,
}

#[cfg(test)]
mod tests {
    use super::*;
    use model::Side;

    #[test]
    fn entry_and_exit_sides() {
        assert_eq!(OrderSide::entry_for(Side::Long), OrderSide::Buy);
        assert_eq!(OrderSide::exit_for(Side::Long), OrderSide::Sell);
        assert_eq!(OrderSide::entry_for(Side::Short), OrderSide::Sell);
        assert_eq!(OrderSide::exit_for(Side::Short), OrderSide::Buy);
    }

    #[test]
    fn terminal_statuses() {
        assert!(OrderStatus::Filled.is_terminal());
        assert!(OrderStatus::Canceled.is_terminal());
        assert!(OrderStatus::Replaced.is_terminal());
        assert!(!OrderStatus::New.is_terminal());
        assert!(!OrderStatus::Held.is_terminal());
        assert!(OrderStatus::PartiallyFilled.is_active());
    }

    #[test]
    fn status_round_trip_from_wire() {
        assert_eq!(OrderStatus::from_api_str("filled"), Some(OrderStatus::Filled));
        assert_eq!(OrderStatus::from_api_str("held"), Some(OrderStatus::Held));
        assert_eq!(OrderStatus::from_api_str("bogus"), None);
    }

    #[test]
    fn client_order_ids_are_unique() {
        let a = generate_client_order_id("bot");
        let b = generate_client_order_id("bot");
        assert_ne!(a, b);
        assert!(a.starts_with("bot_"));
    }
}
