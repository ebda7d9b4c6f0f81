//! Discord webhook delivery. Every alert is posted as a single embed whose
//! color follows the alert's tone, with the sending host appended so several
//! deployments can share a channel.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, warn};

use common::{Alert, Error, Notifier, Result, Tone};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

pub fn tone_color(tone: Tone) -> u32 {
    match tone {
        Tone::Bullish => 0x00ff00,
        Tone::Bearish => 0xff0000,
        Tone::Caution => 0xffaa00,
        Tone::Info => 0x0099ff,
        Tone::Warning => 0xff9900,
        Tone::Muted => 0x666666,
    }
}

#[derive(Debug, Serialize)]
pub struct Embed {
    pub title: String,
    pub description: String,
    pub color: u32,
    pub timestamp: String,
}

#[derive(Debug, Serialize)]
pub struct WebhookPayload {
    pub embeds: Vec<Embed>,
}

impl WebhookPayload {
    pub fn new(title: &str, alert: &Alert, host: &str, at: DateTime<Utc>) -> Self {
        Self {
            embeds: vec![Embed {
                title: title.to_string(),
                description: format!("{}\n\n🏠 **Host**: {host}", alert.message),
                color: tone_color(alert.tone),
                timestamp: at.to_rfc3339_opts(SecondsFormat::Millis, true),
            }],
        }
    }
}

pub struct DiscordWebhook {
    url: String,
    title: String,
    host: String,
    http: Client,
}

impl DiscordWebhook {
    /// `title` heads every embed, e.g. "SPX Trading Alert".
    pub fn new(url: impl Into<String>, title: impl Into<String>) -> Result<Self> {
        let http = Client::builder()
            .use_rustls_tls()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self {
            url: url.into(),
            title: title.into(),
            host: host_name(),
            http,
        })
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }
}

#[async_trait]
impl Notifier for DiscordWebhook {
    async fn notify(&self, alert: &Alert) -> Result<()> {
        let payload = WebhookPayload::new(&self.title, alert, &self.host, Utc::now());
        let resp = self
            .http
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(%status, "Discord rejected webhook post");
            return Err(Error::Notify(format!("HTTP {status}: {body}")));
        }
        debug!(message = %alert.message, "Posted to Discord");
        Ok(())
    }
}

/// Best-effort machine name for the embed footer.
fn host_name() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .filter(|h| !h.trim().is_empty())
        .or_else(|| {
            std::fs::read_to_string("/etc/hostname")
                .ok()
                .map(|h| h.trim().to_string())
                .filter(|h| !h.is_empty())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn payload_has_one_embed_with_host_footer() {
        let at = Utc.with_ymd_and_hms(2025, 8, 21, 17, 3, 15).unwrap();
        let alert = Alert::new("🔴 **SPX Support Test**: 603.00 testing S1 at 600", Tone::Bullish);
        let payload = WebhookPayload::new("SPX Trading Alert", &alert, "render-1", at);

        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "embeds": [{
                    "title": "SPX Trading Alert",
                    "description": "🔴 **SPX Support Test**: 603.00 testing S1 at 600\n\n🏠 **Host**: render-1",
                    "color": 0x00ff00,
                    "timestamp": "2025-08-21T17:03:15.000Z"
                }]
            })
        );
    }

    #[test]
    fn tones_map_to_distinct_colors() {
        let tones = [
            Tone::Bullish,
            Tone::Bearish,
            Tone::Caution,
            Tone::Info,
            Tone::Warning,
            Tone::Muted,
        ];
        let mut colors: Vec<u32> = tones.iter().map(|t| tone_color(*t)).collect();
        colors.sort_unstable();
        colors.dedup();
        assert_eq!(colors.len(), tones.len());
        assert_eq!(tone_color(Tone::Muted), 0x666666);
    }

    #[tokio::test]
    async fn unreachable_webhook_is_an_error() {
        let hook = DiscordWebhook::new("http://127.0.0.1:9/webhook", "SPX Trading Alert")
            .unwrap()
            .with_host("test");
        let err = hook.notify(&Alert::new("hello", Tone::Info)).await.unwrap_err();
        assert!(matches!(err, Error::Http(_)));
    }
}
