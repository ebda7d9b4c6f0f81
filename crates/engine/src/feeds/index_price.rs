use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::Value;
use tracing::{debug, warn};

use common::{Error, PriceSource, Result};

/// The aggregate endpoint rejects requests without a browser-like agent.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Polls the public index aggregate endpoint for the latest print.
pub struct IndexPriceClient {
    url: String,
    field: String,
    http: Client,
}

impl IndexPriceClient {
    /// `field` is the key holding the price in each datapoint (`spx`).
    pub fn new(url: impl Into<String>, field: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .use_rustls_tls()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(BROWSER_USER_AGENT)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            url: url.into(),
            field: field.into(),
            http,
        })
    }
}

#[async_trait]
impl PriceSource for IndexPriceClient {
    async fn latest_price(&self) -> Result<Option<f64>> {
        debug!(url = %self.url, "Fetching index price");
        let resp = self
            .http
            .get(&self.url)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = resp.status();
        if status == StatusCode::NO_CONTENT {
            debug!("Index endpoint returned 204, no data");
            return Ok(None);
        }
        let body = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;
        if !status.is_success() {
            let snippet: String = body.chars().take(200).collect();
            return Err(Error::Api(format!("HTTP {status}: {snippet}")));
        }
        parse_index_payload(&body, &self.field)
    }
}

/// Extract the price from the last datapoint of the endpoint's JSON array.
/// An empty body or empty array means no data; a number or numeric string is
/// accepted in `field`.
pub fn parse_index_payload(body: &str, field: &str) -> Result<Option<f64>> {
    if body.trim().is_empty() {
        return Ok(None);
    }
    let value: Value = serde_json::from_str(body)?;
    let points = value
        .as_array()
        .ok_or_else(|| Error::Api("index payload is not an array".to_string()))?;
    let Some(latest) = points.last() else {
        debug!("Index endpoint returned an empty list");
        return Ok(None);
    };

    let raw = match latest.get(field) {
        Some(v) if !v.is_null() => v,
        _ => {
            let keys: Vec<&str> = latest
                .as_object()
                .map(|o| o.keys().map(String::as_str).collect())
                .unwrap_or_default();
            warn!(field, ?keys, "Price field missing from latest datapoint");
            return Ok(None);
        }
    };

    let price = match raw {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .ok_or_else(|| Error::Api(format!("{field} is not numeric: {raw}")))?;

    common::ensure_finite(field, price).map(Some)
}
