//! REST implementation of [`BrokerApi`].
//!
//! Every call acquires a rate-limit token, then runs with a bounded retry
//! loop: `Transient` failures back off and retry up to the policy budget,
//! `RateLimited` honors the server's suggested wait once per attempt, and
//! everything else returns immediately.

use crate::api::BrokerApi;
use crate::error::BrokerError;
use crate::order::{
    AccountSnapshot, BracketChildren, BracketOrderRequest, BrokerPosition, CancelOutcome,
    EntryType, OrderSide, OrderSnapshot, TrailSpec,
};
use crate::rate_limit::TokenBucket;
use crate::responses::{
    AccountResponse, BarsResponse, LatestTradeResponse, NewOrderBody, OrderResponse,
    PositionResponse, ReplaceOrderBody, StopLossBody, TakeProfitBody,
};
use async_trait::async_trait;
use auth::ApiCredentials;
use common::RetryPolicy;
use model::{Bar, Quote, Timeframe};
use rest_client::{RestClient, RestError};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::future::Future;
use std::time::Duration;

/// Trading and data API endpoints.
#[derive(Debug, Clone)]
pub struct BrokerEndpoints {
    pub trading_base_url: String,
    pub data_base_url: String,
}

impl BrokerEndpoints {
    /// Paper-trading endpoints (fake money).
    pub fn paper() -> Self {
        Self {
            trading_base_url: "https://paper-api.alpaca.markets".into(),
            data_base_url: "https://data.alpaca.markets".into(),
        }
    }

    /// Live-trading endpoints (real money).
    pub fn live() -> Self {
        Self {
            trading_base_url: "https://api.alpaca.markets".into(),
            data_base_url: "https://data.alpaca.markets".into(),
        }
    }
}

/// Per-call deadline for broker requests.
const CALL_TIMEOUT: Duration = Duration::from_secs(10);

/// REST-backed broker adapter.
pub struct BrokerHttpClient {
    trading: RestClient,
    data: RestClient,
    credentials: ApiCredentials,
    bucket: TokenBucket,
    retry: RetryPolicy,
}

impl BrokerHttpClient {
    /// Build a client against the given endpoints.
    ///
    /// `rate_limit_per_min` bounds all outbound calls (trading + data).
    pub fn new(
        endpoints: BrokerEndpoints,
        credentials: ApiCredentials,
        rate_limit_per_min: u32,
    ) -> Result<Self, BrokerError> {
        let trading = RestClient::new(&endpoints.trading_base_url, CALL_TIMEOUT)
            .map_err(|e| BrokerError::Transient(e.to_string()))?;
        let data = RestClient::new(&endpoints.data_base_url, CALL_TIMEOUT)
            .map_err(|e| BrokerError::Transient(e.to_string()))?;

        Ok(Self {
            trading,
            data,
            credentials,
            bucket: TokenBucket::per_minute(rate_limit_per_min),
            retry: RetryPolicy::default(),
        })
    }

    /// Run one logical call with rate limiting and bounded retries.
    async fn call<T, F, Fut>(&self, symbol: &str, mut op: F) -> Result<T, BrokerError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, RestError>>,
    {
        let mut attempt = 0u32;
        loop {
            self.bucket.acquire().await;

            match op().await {
                Ok(value) => return Ok(value),
                Err(rest_err) => {
                    let err = BrokerError::classify(rest_err, symbol);
                    match &err {
                        BrokerError::RateLimited { retry_after_ms }
                            if self.retry.should_retry(attempt) =>
                        {
                            tracing::warn!(
                                symbol = %symbol,
                                retry_after_ms = retry_after_ms,
                                "rate limited, honoring suggested backoff"
                            );
                            tokio::time::sleep(Duration::from_millis(*retry_after_ms)).await;
                        }
                        BrokerError::Transient(reason) if self.retry.should_retry(attempt) => {
                            let delay = self.retry.delay(attempt);
                            tracing::warn!(
                                symbol = %symbol,
                                attempt = attempt,
                                delay_ms = delay.as_millis() as u64,
                                reason = %reason,
                                "transient broker error, retrying"
                            );
                            tokio::time::sleep(delay).await;
                        }
                        _ => return Err(err),
                    }
                    attempt += 1;
                }
            }
        }
    }

    fn snapshot_from(&self, resp: OrderResponse) -> Result<OrderSnapshot, BrokerError> {
        resp.into_snapshot()
            .ok_or_else(|| BrokerError::Rejected("unrecognized order payload".into()))
    }
}

fn price_str(p: Decimal) -> String {
    p.round_dp(2).to_string()
}

#[async_trait]
impl BrokerApi for BrokerHttpClient {
    async fn submit_bracket(&self, req: BracketOrderRequest) -> Result<String, BrokerError> {
        let (order_type, limit_price) = match req.entry {
            EntryType::Market => ("market", None),
            EntryType::Limit(p) => ("limit", Some(price_str(p))),
        };

        let body = NewOrderBody {
            symbol: req.symbol.clone(),
            qty: req.qty.to_string(),
            side: req.side.as_api_str(),
            order_type,
            time_in_force: "day",
            limit_price,
            trail_percent: None,
            trail_price: None,
            order_class: Some("bracket"),
            stop_loss: Some(StopLossBody {
                stop_price: price_str(req.stop_price),
            }),
            take_profit: Some(TakeProfitBody {
                limit_price: price_str(req.target_price),
            }),
            client_order_id: Some(req.client_order_id.clone()),
        };

        let headers = self.credentials.header_pairs();
        let resp: OrderResponse = self
            .call(&req.symbol, || {
                self.trading.post_json("/v2/orders", &body, &headers)
            })
            .await?;

        tracing::info!(
            symbol = %req.symbol,
            parent_id = %resp.id,
            qty = req.qty,
            stop = %req.stop_price,
            target = %req.target_price,
            "bracket submitted"
        );
        Ok(resp.id)
    }

    async fn submit_trailing_stop(
        &self,
        symbol: &str,
        exit_side: OrderSide,
        qty: u32,
        trail: TrailSpec,
    ) -> Result<String, BrokerError> {
        let (trail_percent, trail_price) = match trail {
            TrailSpec::Percent(p) => (Some(p.to_string()), None),
            TrailSpec::Absolute(d) => (None, Some(price_str(d))),
        };

        let body = NewOrderBody {
            symbol: symbol.to_string(),
            qty: qty.to_string(),
            side: exit_side.as_api_str(),
            order_type: "trailing_stop",
            time_in_force: "gtc",
            limit_price: None,
            trail_percent,
            trail_price,
            order_class: None,
            stop_loss: None,
            take_profit: None,
            client_order_id: None,
        };

        let headers = self.credentials.header_pairs();
        let resp: OrderResponse = self
            .call(symbol, || {
                self.trading.post_json("/v2/orders", &body, &headers)
            })
            .await?;
        Ok(resp.id)
    }

    async fn submit_market(
        &self,
        symbol: &str,
        side: OrderSide,
        qty: u32,
    ) -> Result<String, BrokerError> {
        let body = NewOrderBody {
            symbol: symbol.to_string(),
            qty: qty.to_string(),
            side: side.as_api_str(),
            order_type: "market",
            time_in_force: "day",
            limit_price: None,
            trail_percent: None,
            trail_price: None,
            order_class: None,
            stop_loss: None,
            take_profit: None,
            client_order_id: None,
        };

        let headers = self.credentials.header_pairs();
        let resp: OrderResponse = self
            .call(symbol, || {
                self.trading.post_json("/v2/orders", &body, &headers)
            })
            .await?;
        Ok(resp.id)
    }

    async fn cancel(&self, order_id: &str) -> Result<CancelOutcome, BrokerError> {
        let headers = self.credentials.header_pairs();
        let path = format!("/v2/orders/{order_id}");
        let result = self
            .call(order_id, || self.trading.delete(&path, &headers))
            .await;

        match result {
            Ok(()) => Ok(CancelOutcome::Canceled),
            Err(BrokerError::AlreadyTerminal) => Ok(CancelOutcome::AlreadyTerminal),
            Err(other) => Err(other),
        }
    }

    async fn replace_stop(
        &self,
        order_id: &str,
        new_stop: Decimal,
    ) -> Result<String, BrokerError> {
        let headers = self.credentials.header_pairs();
        let path = format!("/v2/orders/{order_id}");
        let body = ReplaceOrderBody {
            stop_price: price_str(new_stop),
        };
        let resp: OrderResponse = self
            .call(order_id, || {
                self.trading.patch_json(&path, &body, &headers)
            })
            .await?;
        Ok(resp.id)
    }

    async fn children_of(&self, parent_id: &str) -> Result<BracketChildren, BrokerError> {
        let headers = self.credentials.header_pairs();
        let path = format!("/v2/orders/{parent_id}");
        let resp: OrderResponse = self
            .call(parent_id, || {
                self.trading.get(&path, Some("nested=true"), &headers)
            })
            .await?;

        let mut children = BracketChildren::default();
        for leg in resp.legs {
            // Stop legs carry a stop trigger; the remaining leg is the target.
            if leg.stop_price.is_some() {
                children.stop_leg_id = Some(leg.id);
            } else {
                children.target_leg_id = Some(leg.id);
            }
        }
        Ok(children)
    }

    async fn order(&self, order_id: &str) -> Result<OrderSnapshot, BrokerError> {
        let headers = self.credentials.header_pairs();
        let path = format!("/v2/orders/{order_id}");
        let resp: OrderResponse = self
            .call(order_id, || self.trading.get(&path, None, &headers))
            .await?;
        self.snapshot_from(resp)
    }

    async fn positions(&self) -> Result<Vec<BrokerPosition>, BrokerError> {
        let headers = self.credentials.header_pairs();
        let resp: Vec<PositionResponse> = self
            .call("positions", || {
                self.trading.get("/v2/positions", None, &headers)
            })
            .await?;

        Ok(resp
            .into_iter()
            .map(|p| BrokerPosition {
                symbol: p.symbol,
                qty: p.qty.trunc().to_i64().unwrap_or(0),
                avg_entry_price: p.avg_entry_price,
            })
            .collect())
    }

    async fn account(&self) -> Result<AccountSnapshot, BrokerError> {
        let headers = self.credentials.header_pairs();
        let resp: AccountResponse = self
            .call("account", || self.trading.get("/v2/account", None, &headers))
            .await?;
        Ok(AccountSnapshot {
            equity: resp.equity,
            buying_power: resp.buying_power,
            cash: resp.cash,
        })
    }

    async fn bars(
        &self,
        symbol: &str,
        timeframe: Timeframe,
        limit: usize,
    ) -> Result<Vec<Bar>, BrokerError> {
        let headers = self.credentials.header_pairs();
        let path = format!("/v2/stocks/{symbol}/bars");
        let query = format!("timeframe={}&limit={}", timeframe.as_api_str(), limit);
        let resp: BarsResponse = self
            .call(symbol, || self.data.get(&path, Some(&query), &headers))
            .await?;

        Ok(resp
            .bars
            .into_iter()
            .map(|b| Bar {
                timestamp: b.timestamp,
                open: b.open,
                high: b.high,
                low: b.low,
                close: b.close,
                volume: b.volume,
            })
            .collect())
    }

    async fn last_trade(&self, symbol: &str) -> Result<Quote, BrokerError> {
        let headers = self.credentials.header_pairs();
        let path = format!("/v2/stocks/{symbol}/trades/latest");
        let resp: LatestTradeResponse = self
            .call(symbol, || self.data.get(&path, None, &headers))
            .await?;
        Ok(Quote {
            symbol: resp.symbol,
            last: resp.trade.price,
            timestamp: resp.trade.timestamp,
        })
    }
}
