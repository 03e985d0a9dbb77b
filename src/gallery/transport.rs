//! GraphQL transport to the token API.
//!
//! The fetcher only sees [`GraphqlTransport`]; the HTTP implementation
//! posts `{query, variables}` and hands back the raw status and body so
//! retry and GraphQL error handling stay in one place.

use crate::gallery::error::GalleryError;
use crate::gallery::rate_limit::{RateLimitStats, RequestLimiter};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};

/// GraphQL request body.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphqlRequest {
    pub query: &'static str,
    pub variables: Value,
}

/// Raw HTTP outcome of a GraphQL request.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportResponse {
    pub status: u16,
    /// Parsed JSON body, `Value::Null` when the body was not JSON
    pub body: Value,
}

impl TransportResponse {
    pub fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    pub fn status(status: u16) -> Self {
        Self {
            status,
            body: Value::Null,
        }
    }

    /// Interpret the response as a GraphQL envelope and decode its `data`.
    ///
    /// A non-empty `errors` array fails even on HTTP success.
    pub fn into_data<T: DeserializeOwned>(self) -> Result<T, GalleryError> {
        match self.status {
            429 => return Err(GalleryError::RateLimited { status: 429 }),
            status if !(200..300).contains(&status) => {
                return Err(GalleryError::Http { status })
            }
            _ => {}
        }

        let envelope: GraphqlEnvelope = serde_json::from_value(self.body)
            .map_err(|e| GalleryError::Decode(e.to_string()))?;

        if let Some(first) = envelope.errors.as_ref().and_then(|errors| errors.first()) {
            return Err(GalleryError::GraphQl {
                message: first
                    .message
                    .clone()
                    .unwrap_or_else(|| "GraphQL error".to_string()),
            });
        }

        let data = envelope
            .data
            .ok_or_else(|| GalleryError::Decode("response has no data".to_string()))?;
        serde_json::from_value(data).map_err(|e| GalleryError::Decode(e.to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct GraphqlEnvelope {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Option<Vec<GraphqlErrorEntry>>,
}

#[derive(Debug, Deserialize)]
struct GraphqlErrorEntry {
    #[serde(default)]
    message: Option<String>,
}

/// Sends GraphQL requests to the token API.
#[async_trait]
pub trait GraphqlTransport: Send + Sync {
    /// Send one request. Errors only for failures below HTTP (connect, timeout).
    async fn post(&self, request: &GraphqlRequest) -> Result<TransportResponse, GalleryError>;

    /// Request statistics, when the transport tracks them.
    fn stats(&self) -> Option<RateLimitStats> {
        None
    }
}

/// reqwest-backed transport with outbound rate limiting.
pub struct HttpTransport {
    http_client: Client,
    endpoint: String,
    limiter: RequestLimiter,
    timeout: Duration,
}

impl HttpTransport {
    pub fn new(http_client: Client, endpoint: String, requests_per_second: u32, timeout: Duration) -> Self {
        Self {
            http_client,
            endpoint,
            limiter: RequestLimiter::new(requests_per_second),
            timeout,
        }
    }
}

#[async_trait]
impl GraphqlTransport for HttpTransport {
    #[instrument(skip(self, request), fields(endpoint = %self.endpoint))]
    async fn post(&self, request: &GraphqlRequest) -> Result<TransportResponse, GalleryError> {
        self.limiter.acquire().await;

        let response = self
            .http_client
            .post(&self.endpoint)
            .timeout(self.timeout)
            .json(request)
            .send()
            .await
            .map_err(|e| GalleryError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        if status == 429 {
            self.limiter.record_rate_limited();
        }

        let text = response
            .text()
            .await
            .map_err(|e| GalleryError::Transport(e.to_string()))?;
        let body = serde_json::from_str(&text).unwrap_or(Value::Null);

        debug!("Token API responded with status {} ({} bytes)", status, text.len());
        Ok(TransportResponse { status, body })
    }

    fn stats(&self) -> Option<RateLimitStats> {
        Some(self.limiter.stats())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, PartialEq, Deserialize)]
    struct Rows {
        rows: Vec<u32>,
    }

    #[test]
    fn test_into_data_decodes() {
        let response = TransportResponse::ok(json!({ "data": { "rows": [1, 2, 3] } }));
        let rows: Rows = response.into_data().unwrap();
        assert_eq!(rows.rows, vec![1, 2, 3]);
    }

    #[test]
    fn test_errors_array_fails_on_success_status() {
        let response = TransportResponse::ok(json!({
            "data": null,
            "errors": [{ "message": "field 'tokens_metadata' not found" }]
        }));
        assert_eq!(
            response.into_data::<Rows>(),
            Err(GalleryError::GraphQl {
                message: "field 'tokens_metadata' not found".to_string()
            })
        );
    }

    #[test]
    fn test_errors_without_message() {
        let response = TransportResponse::ok(json!({ "errors": [{}] }));
        assert_eq!(
            response.into_data::<Rows>(),
            Err(GalleryError::GraphQl { message: "GraphQL error".to_string() })
        );
    }

    #[test]
    fn test_empty_errors_array_is_success() {
        let response = TransportResponse::ok(json!({ "data": { "rows": [] }, "errors": [] }));
        assert!(response.into_data::<Rows>().is_ok());
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            TransportResponse::status(429).into_data::<Rows>(),
            Err(GalleryError::RateLimited { status: 429 })
        );
        assert_eq!(
            TransportResponse::status(502).into_data::<Rows>(),
            Err(GalleryError::Http { status: 502 })
        );
    }
}
