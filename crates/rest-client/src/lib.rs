//! Generic REST client infrastructure.
//!
//! A thin wrapper around `reqwest` with:
//!
//! - Consistent error handling via `RestError`
//! - GET/POST/PATCH/DELETE with JSON bodies and responses
//! - Header injection for authentication
//! - Rate-limit detection (429 + Retry-After)
//!
//! # Example
//!
//! ```rust,ignore
//! use rest_client::RestClient;
//! use serde::Deserialize;
//!
//! #[derive(Deserialize)]
//! struct Clock {
//!     is_open: bool,
//! }
//!
//! let client = RestClient::with_default_timeout("https://api.broker.example")?;
//! let clock: Clock = client.get("/v2/clock", None, &headers).await?;
//! ```

mod client;
mod error;

pub use client::RestClient;
pub use error::RestError;
