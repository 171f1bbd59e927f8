//! Wire payloads for the brokerage REST API.

use crate::order::{OrderSide, OrderSnapshot, OrderStatus};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Order record as returned by the orders endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct OrderResponse {
    pub id: String,
    pub client_order_id: String,
    pub symbol: String,
    pub side: String,
    pub status: String,
    #[serde(default, with = "decimal_str_opt")]
    pub qty: Option<Decimal>,
    #[serde(default, with = "decimal_str_opt")]
    pub filled_qty: Option<Decimal>,
    #[serde(default, with = "decimal_str_opt")]
    pub filled_avg_price: Option<Decimal>,
    #[serde(default, with = "decimal_str_opt")]
    pub stop_price: Option<Decimal>,
    #[serde(default, with = "decimal_str_opt")]
    pub limit_price: Option<Decimal>,
    /// Child legs when queried with nesting.
    #[serde(default)]
    pub legs: Vec<OrderResponse>,
}

impl OrderResponse {
    /// Normalize into the adapter's order snapshot.
    pub fn into_snapshot(self) -> Option<OrderSnapshot> {
        let side = OrderSide::from_api_str(&self.side)?;
        let status = OrderStatus::from_api_str(&self.status)?;
        let to_u32 = |d: Option<Decimal>| -> u32 {
            use rust_decimal::prelude::ToPrimitive;
            d.and_then(|v| v.trunc().to_u32()).unwrap_or(0)
        };
        Some(OrderSnapshot {
            order_id: self.id,
            client_order_id: self.client_order_id,
            symbol: self.symbol,
            side,
            status,
            qty: to_u32(self.qty),
            filled_qty: to_u32(self.filled_qty),
            filled_avg_price: self.filled_avg_price,
            stop_price: self.stop_price,
            limit_price: self.limit_price,
        })
    }
}

/// Body for POST /v2/orders.
#[derive(Debug, Clone, Serialize)]
pub struct NewOrderBody {
    pub symbol: String,
    pub qty: String,
    pub side: &'static str,
    #[serde(rename = "type")]
    pub order_type: &'static str,
    pub time_in_force: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit_price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trail_percent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trail_price: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order_class: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<StopLossBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub take_profit: Option<TakeProfitBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_order_id: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StopLossBody {
    pub stop_price: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct TakeProfitBody {
    pub limit_price: String,
}

/// Body for PATCH /v2/orders/{id}.
#[derive(Debug, Clone, Serialize)]
pub struct ReplaceOrderBody {
    pub stop_price: String,
}

/// GET /v2/account.
#[derive(Debug, Clone, Deserialize)]
pub struct AccountResponse {
    #[serde(with = "decimal_str")]
    pub equity: Decimal,
    #[serde(with = "decimal_str")]
    pub buying_power: Decimal,
    #[serde(with = "decimal_str")]
    pub cash: Decimal,
}

/// GET /v2/positions entry.
#[derive(Debug, Clone, Deserialize)]
pub struct PositionResponse {
    pub symbol: String,
    #[serde(with = "decimal_str")]
    pub qty: Decimal,
    #[serde(with = "decimal_str")]
    pub avg_entry_price: Decimal,
}

/// GET /v2/stocks/{symbol}/bars.
#[derive(Debug, Clone, Deserialize)]
pub struct BarsResponse {
    #[serde(default)]
    pub bars: Vec<BarResponse>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BarResponse {
    #[serde(rename = "t")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "o")]
    pub open: Decimal,
    #[serde(rename = "h")]
    pub high: Decimal,
    #[serde(rename = "l")]
    pub low: Decimal,
    #[serde(rename = "c")]
    pub close: Decimal,
    #[serde(rename = "v")]
    pub volume: u64,
}

/// GET /v2/stocks/{symbol}/trades/latest.
#[derive(Debug, Clone, Deserialize)]
pub struct LatestTradeResponse {
    pub symbol: String,
    pub trade: TradeResponse,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TradeResponse {
    #[serde(rename = "t")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "p")]
    pub price: Decimal,
}

/// Decimals arrive as JSON strings on the trading API.
mod decimal_str {
    use rust_decimal::Decimal;
    use serde::{Deserialize, Deserializer};
    use std::str::FromStr;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Decimal::from_str(&s).map_err(serde::de::Error::custom)
    }
}

mod decimal_str_opt {
    use rust_decimal::Decimal;
    use serde::{Deserialize, Deserializer};
    use std::str::FromStr;

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: Option<String> = Option::deserialize(deserializer)?;
        match s {
            None => Ok(None),
            Some(s) if s.is_empty() => Ok(None),
            Some(s) => Decimal::from_str(&s)
                .map(Some)
                .map_err(serde::de::Error::custom),
        }
    }
}
