//! Typed brokerage adapter.
//!
//! This crate normalizes a brokerage REST API into the small set of typed
//! calls the engine needs:
//!
//! - **`BrokerApi`**: the injectable trait — bracket/market/trailing-stop
//!   submission, idempotent cancel, stop replace, order/position/account
//!   queries, and the market-data endpoints (bars, latest trade).
//! - **Order model**: sides, entry types, trail specs, statuses with
//!   terminal-state checks.
//! - **`BrokerError`**: the normalized error taxonomy every call returns.
//! - **`TokenBucket`**: the global request rate limiter (default 200/min).
//! - **`BrokerHttpClient`**: the REST implementation.
//!
//! All prices are `rust_decimal::Decimal`; quantities are whole shares.

mod api;
mod error;
mod order;
mod rate_limit;
mod responses;
mod rest;

pub use api::{BrokerApi, SharedBroker};
pub use error::BrokerError;
pub use order::{
    generate_client_order_id, AccountSnapshot, BracketChildren, BracketOrderRequest,
    BrokerPosition, CancelOutcome, EntryType, OrderSide, OrderSnapshot, OrderStatus, TrailSpec,
};
pub use rate_limit::TokenBucket;
pub use rest::{BrokerEndpoints, BrokerHttpClient};
