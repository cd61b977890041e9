//! HTTP rate provider.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::error::{FxError, FxResult};
use crate::provider::RateProvider;
use crate::table::RawRates;

/// Accepted response bodies: a bare code → rate object, or one nested
/// under `rates` alongside other metadata.
#[derive(Deserialize)]
#[serde(untagged)]
enum RatePayload {
    Wrapped { rates: RawRates },
    Flat(RawRates),
}

/// Parse a rate-provider response body.
pub fn parse_rate_payload(body: &[u8]) -> FxResult<RawRates> {
    let payload: RatePayload = serde_json::from_slice(body)
        .map_err(|e| FxError::RateFetch(format!("malformed rate payload: {e}")))?;

    let rates = match payload {
        RatePayload::Wrapped { rates } => rates,
        RatePayload::Flat(rates) => rates,
    };

    if rates.is_empty() {
        return Err(FxError::RateFetch("rate payload is empty".into()));
    }
    Ok(rates)
}

/// Fetches the rate table from a REST endpoint.
pub struct HttpRateProvider {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpRateProvider {
    /// Create a provider for `endpoint`, bounding each request by `timeout`.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> FxResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| FxError::Configuration(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl RateProvider for HttpRateProvider {
    fn name(&self) -> &str {
        "HTTP"
    }

    #[instrument(skip(self), fields(endpoint = %self.endpoint))]
    async fn fetch_rates(&self) -> FxResult<RawRates> {
        let response = self
            .client
            .get(&self.endpoint)
            .send()
            .await
            .map_err(|e| FxError::RateFetch(format!("request failed: {e}")))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(FxError::RateFetch(format!("unexpected status {status}")));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FxError::RateFetch(format!("failed to read body: {e}")))?;

        let rates = parse_rate_payload(&body)?;
        debug!(currencies = rates.len(), "Received rate payload");
        Ok(rates)
    }
}
