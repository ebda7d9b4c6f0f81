use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use reqwest::Client;
use serde::Deserialize;
use tracing::debug;

use common::{Bar, BarSource, Error, Result, BAR_TIMESTAMP_FORMAT};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Alpha Vantage `TIME_SERIES_INTRADAY` client for a single symbol at 1-minute
/// resolution.
pub struct QuoteClient {
    base_url: String,
    api_key: String,
    symbol: String,
    http: Client,
}

impl QuoteClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        symbol: impl Into<String>,
    ) -> Result<Self> {
        let http = Client::builder()
            .use_rustls_tls()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into(),
            api_key: api_key.into(),
            symbol: symbol.into(),
            http,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }
}

#[async_trait]
impl BarSource for QuoteClient {
    async fn intraday_bars(&self) -> Result<Vec<Bar>> {
        debug!(symbol = %self.symbol, "Fetching intraday series");
        let resp = self
            .http
            .get(&self.base_url)
            .query(&[
                ("function", "TIME_SERIES_INTRADAY"),
                ("symbol", self.symbol.as_str()),
                ("interval", "1min"),
                ("apikey", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| Error::Http(e.to_string()))?;
        if !status.is_success() {
            return Err(Error::Api(format!("HTTP {status}")));
        }
        parse_intraday(&body)
    }
}

#[derive(Deserialize)]
struct IntradayResponse {
    #[serde(rename = "Time Series (1min)")]
    series: Option<BTreeMap<String, RawBar>>,
    #[serde(rename = "Error Message")]
    error: Option<String>,
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
}

#[derive(Deserialize)]
struct RawBar {
    #[serde(rename = "1. open")]
    open: String,
    #[serde(rename = "2. high")]
    high: String,
    #[serde(rename = "3. low")]
    low: String,
    #[serde(rename = "4. close")]
    close: String,
    #[serde(rename = "5. volume")]
    volume: String,
}

/// Decode an intraday response into bars, oldest first. Error, rate-limit and
/// informational bodies (which come back with HTTP 200) are `Error::Api`.
pub fn parse_intraday(body: &str) -> Result<Vec<Bar>> {
    let resp: IntradayResponse = serde_json::from_str(body)?;
    if let Some(msg) = resp.error.or(resp.note).or(resp.information) {
        return Err(Error::Api(msg));
    }
    let series = resp
        .series
        .ok_or_else(|| Error::Api("response has no 1min time series".to_string()))?;

    // Keys sort lexicographically in chronological order.
    series
        .into_iter()
        .map(|(ts, raw)| {
            let timestamp = NaiveDateTime::parse_from_str(&ts, BAR_TIMESTAMP_FORMAT)
                .map_err(|e| Error::InvalidInput(format!("bar timestamp '{ts}': {e}")))?;
            Ok(Bar {
                timestamp,
                open: number(&ts, "open", &raw.open)?,
                high: number(&ts, "high", &raw.high)?,
                low: number(&ts, "low", &raw.low)?,
                close: number(&ts, "close", &raw.close)?,
                volume: raw
                    .volume
                    .trim()
                    .parse()
                    .map_err(|e| Error::InvalidInput(format!("{ts} volume '{}': {e}", raw.volume)))?,
            })
        })
        .collect()
}

fn number(ts: &str, what: &str, raw: &str) -> Result<f64> {
    let value: f64 = raw
        .trim()
        .parse()
        .map_err(|e| Error::InvalidInput(format!("{ts} {what} '{raw}': {e}")))?;
    common::ensure_finite(what, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "Meta Data": {"2. Symbol": "SPY", "4. Interval": "1min"},
        "Time Series (1min)": {
            "2025-08-21 15:59:00": {"1. open": "635.10", "2. high": "635.30", "3. low": "634.95", "4. close": "635.22", "5. volume": "812345"},
            "2025-08-21 15:58:00": {"1. open": "635.00", "2. high": "635.15", "3. low": "634.90", "4. close": "635.11", "5. volume": "401200"}
        }
    }"#;

    #[test]
    fn bars_are_sorted_oldest_first() {
        let bars = parse_intraday(SAMPLE).unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].timestamp.format("%H:%M").to_string(), "15:58");
        assert_eq!(bars[1].close, 635.22);
        assert_eq!(bars[1].volume, 812_345);
    }

    #[test]
    fn rate_limit_note_is_an_api_error() {
        let body = r#"{"Note": "Thank you for using Alpha Vantage! Our standard API call frequency is 5 calls per minute."}"#;
        let err = parse_intraday(body).unwrap_err();
        assert!(matches!(err, Error::Api(ref m) if m.contains("call frequency")));
    }

    #[test]
    fn error_message_is_an_api_error() {
        let body = r#"{"Error Message": "Invalid API call."}"#;
        assert!(matches!(parse_intraday(body), Err(Error::Api(_))));
    }

    #[test]
    fn missing_series_is_an_api_error() {
        assert!(matches!(parse_intraday("{}"), Err(Error::Api(_))));
    }

    #[test]
    fn unparseable_fields_are_invalid_input() {
        let body = r#"{"Time Series (1min)": {
            "2025-08-21 15:59:00": {"1. open": "x", "2. high": "1", "3. low": "1", "4. close": "1", "5. volume": "1"}
        }}"#;
        assert!(matches!(parse_intraday(body), Err(Error::InvalidInput(_))));
    }
}
