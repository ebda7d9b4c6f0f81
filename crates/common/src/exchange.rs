use async_trait::async_trait;

use crate::{Alert, Bar, Result};

/// Source of the current index price, polled once per watcher tick.
///
/// `Ok(None)` means the upstream had nothing to report (market closed, empty
/// payload). The watcher treats it as a no-op tick, never as engine input.
#[async_trait]
pub trait PriceSource: Send + Sync {
    async fn latest_price(&self) -> Result<Option<f64>>;
}

/// Source of intraday 1-minute bars for the trend bot.
#[async_trait]
pub trait BarSource: Send + Sync {
    /// All bars currently offered by the upstream, oldest first.
    async fn intraday_bars(&self) -> Result<Vec<Bar>>;
}

/// Delivers alerts to an external channel. Delivery failures are returned to
/// the caller, which logs them; they never reach the signal engine.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, alert: &Alert) -> Result<()>;
}
