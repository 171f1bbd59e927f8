//! Generic REST client wrapper around reqwest.

use crate::error::RestError;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

/// Default per-request deadline.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Fallback wait when a 429 carries no usable Retry-After header.
const DEFAULT_RETRY_AFTER_MS: u64 = 30_000;

/// Generic JSON REST client.
pub struct RestClient {
    client: Client,
    base_url: String,
}

impl RestClient {
    /// Create a new REST client with the given base URL and per-request
    /// deadline.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, RestError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| RestError::RequestBuild(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Create a new REST client with the default deadline.
    pub fn with_default_timeout(base_url: &str) -> Result<Self, RestError> {
        Self::new(base_url, DEFAULT_TIMEOUT)
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// GET a JSON resource.
    ///
    /// # Arguments
    /// * `path` - Request path (e.g., "/v2/account")
    /// * `query` - Optional query string (without leading '?')
    /// * `headers` - Headers to attach (auth)
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: Option<&str>,
        headers: &[(&str, &str)],
    ) -> Result<T, RestError> {
        let url = self.build_url(path, query);
        tracing::debug!(url = %url, "GET request");

        let request = Self::attach_headers(self.client.get(&url), headers);
        let response = request.send().await?;
        self.parse_json(response).await
    }

    /// POST a JSON body, expect a JSON response.
    pub async fn post_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        headers: &[(&str, &str)],
    ) -> Result<T, RestError> {
        let url = self.build_url(path, None);
        tracing::debug!(url = %url, "POST request");

        let request = Self::attach_headers(self.client.post(&url), headers).json(body);
        let response = request.send().await?;
        self.parse_json(response).await
    }

    /// PATCH a JSON body, expect a JSON response.
    pub async fn patch_json<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        headers: &[(&str, &str)],
    ) -> Result<T, RestError> {
        let url = self.build_url(path, None);
        tracing::debug!(url = %url, "PATCH request");

        let request = Self::attach_headers(self.client.patch(&url), headers).json(body);
        let response = request.send().await?;
        self.parse_json(response).await
    }

    /// DELETE a resource; the response body is ignored.
    pub async fn delete(
        &self,
        path: &str,
        headers: &[(&str, &str)],
    ) -> Result<(), RestError> {
        let url = self.build_url(path, None);
        tracing::debug!(url = %url, "DELETE request");

        let request = Self::attach_headers(self.client.delete(&url), headers);
        let response = request.send().await?;
        self.check_status(response).await.map(|_| ())
    }

    fn attach_headers(
        mut request: reqwest::RequestBuilder,
        headers: &[(&str, &str)],
    ) -> reqwest::RequestBuilder {
        for (key, value) in headers {
            request = request.header(*key, *value);
        }
        request
    }

    /// Build a full URL from path and optional query string.
    fn build_url(&self, path: &str, query: Option<&str>) -> String {
        match query {
            Some(q) if !q.is_empty() => format!("{}{}?{}", self.base_url, path, q),
            _ => format!("{}{}", self.base_url, path),
        }
    }

    /// Check the status and return the successful response.
    async fn check_status(&self, response: Response) -> Result<Response, RestError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        if status.as_u16() == 429 {
            let retry_after_ms = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(|secs| secs * 1000)
                .unwrap_or(DEFAULT_RETRY_AFTER_MS);
            return Err(RestError::RateLimited { retry_after_ms });
        }

        let body = response.text().await.unwrap_or_default();
        Err(RestError::Http {
            status: status.as_u16(),
            body,
        })
    }

    /// Check the status and deserialize the JSON body.
    async fn parse_json<T: DeserializeOwned>(&self, response: Response) -> Result<T, RestError> {
        let response = self.check_status(response).await?;
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| {
            tracing::warn!(body = %body, error = %e, "failed to parse response");
            RestError::Parse(e.to_string())
        })
    }
}
