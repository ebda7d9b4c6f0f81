use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};

use common::{Alert, MonitorStatus, Notifier, PriceSource, Result, Tone};
use storage::LevelStore;
use strategy::{ObservationState, SignalEngine, WatchSchedule};

use crate::session::{on_cadence, MarketHours};

/// What a single watcher tick did. Drives the pause before the next tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TickOutcome {
    /// No levels file for today, or it is empty.
    NoLevels,
    Closed,
    /// Market open but the price endpoint had nothing.
    Unavailable,
    Evaluated { price: f64, signals: usize },
}

/// Polls the index price during market hours and posts an alert for every
/// signal the engine emits against today's levels.
pub struct LevelWatcher {
    symbol: String,
    source: Arc<dyn PriceSource>,
    notifier: Arc<dyn Notifier>,
    store: LevelStore,
    engine: SignalEngine,
    hours: MarketHours,
    schedule: WatchSchedule,
    status: Arc<RwLock<MonitorStatus>>,
    observed: ObservationState,
    session: Option<NaiveDate>,
}

impl LevelWatcher {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        symbol: impl Into<String>,
        source: Arc<dyn PriceSource>,
        notifier: Arc<dyn Notifier>,
        store: LevelStore,
        engine: SignalEngine,
        hours: MarketHours,
        schedule: WatchSchedule,
        status: Arc<RwLock<MonitorStatus>>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            source,
            notifier,
            store,
            engine,
            hours,
            schedule,
            status,
            observed: ObservationState::new(),
            session: None,
        }
    }

    pub fn observed(&self) -> &ObservationState {
        &self.observed
    }

    /// Announce, then tick until `shutdown` resolves. Fails only when the
    /// startup announcement cannot be delivered.
    pub async fn run(mut self, shutdown: impl Future<Output = ()>) -> Result<()> {
        self.store.ensure_dir()?;
        self.notifier
            .notify(&Alert::new(
                format!("🤖 {} level watcher is now online and monitoring!", self.symbol),
                Tone::Bullish,
            ))
            .await
            .map_err(|e| {
                error!(error = %e, "Startup notification failed");
                e
            })?;

        *self.status.write().await = MonitorStatus::Running;
        info!(symbol = %self.symbol, hours = %self.hours.describe(), "Level watcher running");

        tokio::pin!(shutdown);
        loop {
            let pause = match self.tick(Utc::now()).await {
                Ok(TickOutcome::NoLevels) => Duration::from_secs(self.schedule.idle_retry_secs),
                Ok(_) => Duration::from_secs(self.schedule.poll_interval_secs),
                Err(e) => {
                    error!(error = %e, "Watcher tick failed");
                    Duration::from_secs(self.schedule.error_backoff_secs)
                }
            };
            tokio::select! {
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(pause) => {}
            }
        }

        *self.status.write().await = MonitorStatus::Stopped;
        info!("Level watcher stopping");
        self.deliver(Alert::new(
            format!("🛑 {} level watcher is shutting down.", self.symbol),
            Tone::Warning,
        ))
        .await;
        Ok(())
    }

    /// One poll cycle at wall-clock time `now`.
    pub async fn tick(&mut self, now: DateTime<Utc>) -> Result<TickOutcome> {
        let local = self.hours.local(&now);
        let today = self.hours.session_date(&now);

        let levels = match self.store.load(today)? {
            Some(levels) if !levels.is_empty() => levels,
            _ => {
                warn!(path = %self.store.path_for(today).display(), "No levels loaded, waiting for levels file");
                return Ok(TickOutcome::NoLevels);
            }
        };

        if self.session != Some(today) {
            if self.session.is_some() {
                info!(%today, cleared = self.observed.len(), "New session, resetting observed signals");
            }
            self.observed.clear();
            self.session = Some(today);
        }

        if !self.hours.is_open_at(&now) {
            info!(at = %local.format("%A, %H:%M:%S %Z"), "Outside market hours, waiting for open");
            if on_cadence(&local, 60) {
                self.deliver(Alert::new(
                    format!(
                        "🌙 **Market Closed**: Outside trading hours ({}). Market opens {}.",
                        local.format("%A, %H:%M %Z"),
                        self.hours.describe()
                    ),
                    Tone::Muted,
                ))
                .await;
            }
            return Ok(TickOutcome::Closed);
        }

        let fetched = match self.source.latest_price().await {
            Ok(price) => price,
            Err(e) => {
                warn!(error = %e, "Price fetch failed");
                None
            }
        };

        let Some(price) = fetched else {
            if on_cadence(&local, self.schedule.api_warning_every_mins) {
                self.deliver(Alert::new(
                    format!(
                        "⚠️ **API Status**: {} data temporarily unavailable. Market might be closed \
                         or API experiencing issues. | Time: {}",
                        self.symbol,
                        local.format("%H:%M:%S")
                    ),
                    Tone::Warning,
                ))
                .await;
            }
            return Ok(TickOutcome::Unavailable);
        };
        let price = common::ensure_finite("price", price)?;

        info!(symbol = %self.symbol, price, "Current price");
        let signals = self.engine.evaluate(price, &levels, &mut self.observed);
        let gap = Duration::from_millis(self.schedule.alert_gap_ms);
        for (i, signal) in signals.iter().enumerate() {
            info!(kind = %signal.kind, level = signal.level, price, "Signal");
            if i > 0 && !gap.is_zero() {
                tokio::time::sleep(gap).await;
            }
            self.deliver(Alert::from(signal)).await;
        }

        if on_cadence(&local, self.schedule.status_every_mins) {
            self.deliver(Alert::new(
                format!(
                    "📊 **{} Status Update**: {price:.2} | Time: {}",
                    self.symbol,
                    local.format("%H:%M:%S")
                ),
                Tone::Info,
            ))
            .await;
        }

        Ok(TickOutcome::Evaluated {
            price,
            signals: signals.len(),
        })
    }

    /// Delivery failures are logged and dropped.
    async fn deliver(&self, alert: Alert) -> bool {
        match self.notifier.notify(&alert).await {
            Ok(()) => {
                debug!(tone = ?alert.tone, "Alert delivered");
                true
            }
            Err(e) => {
                warn!(error = %e, "Failed to deliver alert");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::TimeZone;
    use chrono_tz::US::Pacific;

    use common::{Error, Importance, Level};
    use strategy::LevelRules;

    use super::*;

    struct ScriptedPrices(Mutex<VecDeque<Result<Option<f64>>>>);

    impl ScriptedPrices {
        fn new(prices: Vec<Result<Option<f64>>>) -> Arc<Self> {
            Arc::new(Self(Mutex::new(prices.into())))
        }
    }

    #[async_trait]
    impl PriceSource for ScriptedPrices {
        async fn latest_price(&self) -> Result<Option<f64>> {
            self.0.lock().unwrap().pop_front().unwrap_or(Ok(None))
        }
    }

    #[derive(Default)]
    struct Recorder {
        sent: Mutex<Vec<Alert>>,
        fail: bool,
    }

    impl Recorder {
        fn messages(&self) -> Vec<String> {
            self.sent.lock().unwrap().iter().map(|a| a.message.clone()).collect()
        }
    }

    #[async_trait]
    impl Notifier for Recorder {
        async fn notify(&self, alert: &Alert) -> Result<()> {
            if self.fail {
                return Err(Error::Notify("webhook down".into()));
            }
            self.sent.lock().unwrap().push(alert.clone());
            Ok(())
        }
    }

    fn pt(d: u32, h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Pacific
            .with_ymd_and_hms(2025, 8, d, h, m, s)
            .unwrap()
            .with_timezone(&Utc)
    }

    fn write_levels(store: &LevelStore, day: u32) {
        let date = NaiveDate::from_ymd_opt(2025, 8, day).unwrap();
        store
            .write(
                date,
                &[
                    Level::support(600.0, "S1", Importance::High).unwrap(),
                    Level::resistance(620.0, "R1", Importance::High).unwrap(),
                ],
            )
            .unwrap();
    }

    fn watcher(
        dir: &std::path::Path,
        prices: Arc<ScriptedPrices>,
        recorder: Arc<Recorder>,
    ) -> LevelWatcher {
        let schedule = WatchSchedule {
            alert_gap_ms: 0,
            ..WatchSchedule::default()
        };
        LevelWatcher::new(
            "SPX",
            prices,
            recorder,
            LevelStore::new(dir),
            SignalEngine::new(LevelRules::default(), "SPX"),
            MarketHours::from_schedule(&schedule).unwrap(),
            schedule,
            Arc::new(RwLock::new(MonitorStatus::Starting)),
        )
    }

    #[tokio::test]
    async fn missing_levels_file_waits() {
        let dir = tempfile::tempdir().unwrap();
        let rec = Arc::new(Recorder::default());
        let mut w = watcher(dir.path(), ScriptedPrices::new(vec![Ok(Some(603.0))]), rec.clone());

        let out = w.tick(pt(21, 10, 3, 15)).await.unwrap();
        assert_eq!(out, TickOutcome::NoLevels);
        assert!(rec.messages().is_empty());
    }

    #[tokio::test]
    async fn crossing_scenario_emits_each_signal_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = LevelStore::new(dir.path());
        write_levels(&store, 21);
        let rec = Arc::new(Recorder::default());
        let prices = ScriptedPrices::new(vec![
            Ok(Some(603.0)),
            Ok(Some(603.0)),
            Ok(Some(627.0)),
            Ok(Some(660.0)),
        ]);
        let mut w = watcher(dir.path(), prices, rec.clone());

        let out = w.tick(pt(21, 10, 3, 15)).await.unwrap();
        assert_eq!(out, TickOutcome::Evaluated { price: 603.0, signals: 1 });
        assert!(rec.messages()[0].contains("SPX Support Test"));

        let out = w.tick(pt(21, 10, 3, 45)).await.unwrap();
        assert_eq!(out, TickOutcome::Evaluated { price: 603.0, signals: 0 });

        let out = w.tick(pt(21, 10, 4, 15)).await.unwrap();
        assert_eq!(out, TickOutcome::Evaluated { price: 627.0, signals: 1 });
        assert!(rec.messages()[1].contains("SPX Breakout"));

        w.tick(pt(21, 10, 4, 45)).await.unwrap();
        assert!(!w.observed().contains(common::SignalKind::SupportTest, 600.0));
        assert_eq!(rec.messages().len(), 2);
    }

    #[tokio::test]
    async fn new_session_forgets_yesterdays_signals() {
        let dir = tempfile::tempdir().unwrap();
        let store = LevelStore::new(dir.path());
        write_levels(&store, 21);
        write_levels(&store, 22);
        let rec = Arc::new(Recorder::default());
        let prices = ScriptedPrices::new(vec![Ok(Some(603.0)), Ok(Some(603.0))]);
        let mut w = watcher(dir.path(), prices, rec.clone());

        w.tick(pt(21, 12, 3, 0)).await.unwrap();
        let out = w.tick(pt(22, 7, 3, 0)).await.unwrap();
        assert_eq!(out, TickOutcome::Evaluated { price: 603.0, signals: 1 });
        assert_eq!(rec.messages().len(), 2);
    }

    #[tokio::test]
    async fn status_update_on_the_ten_minute_mark() {
        let dir = tempfile::tempdir().unwrap();
        write_levels(&LevelStore::new(dir.path()), 21);
        let rec = Arc::new(Recorder::default());
        let mut w = watcher(dir.path(), ScriptedPrices::new(vec![Ok(Some(640.0))]), rec.clone());

        w.tick(pt(21, 10, 20, 10)).await.unwrap();
        let msgs = rec.messages();
        assert_eq!(msgs.len(), 2);
        assert!(msgs[1].starts_with("📊 **SPX Status Update**: 640.00 | Time: 10:20:10"));
    }

    #[tokio::test]
    async fn unavailable_price_warns_every_five_minutes() {
        let dir = tempfile::tempdir().unwrap();
        write_levels(&LevelStore::new(dir.path()), 21);
        let rec = Arc::new(Recorder::default());
        let prices = ScriptedPrices::new(vec![
            Ok(None),
            Err(Error::Http("timed out".into())),
        ]);
        let mut w = watcher(dir.path(), prices, rec.clone());

        assert_eq!(w.tick(pt(21, 10, 3, 0)).await.unwrap(), TickOutcome::Unavailable);
        assert!(rec.messages().is_empty());
        assert_eq!(w.tick(pt(21, 10, 5, 0)).await.unwrap(), TickOutcome::Unavailable);
        assert!(rec.messages()[0].starts_with("⚠️ **API Status**"));
    }

    #[tokio::test]
    async fn closed_market_posts_hourly() {
        let dir = tempfile::tempdir().unwrap();
        write_levels(&LevelStore::new(dir.path()), 23);
        let rec = Arc::new(Recorder::default());
        let mut w = watcher(dir.path(), ScriptedPrices::new(vec![]), rec.clone());

        // Saturday
        assert_eq!(w.tick(pt(23, 9, 30, 0)).await.unwrap(), TickOutcome::Closed);
        assert!(rec.messages().is_empty());
        assert_eq!(w.tick(pt(23, 10, 0, 5)).await.unwrap(), TickOutcome::Closed);
        assert!(rec.messages()[0].contains("Market Closed"));
    }

    #[tokio::test]
    async fn delivery_failure_does_not_fail_the_tick() {
        let dir = tempfile::tempdir().unwrap();
        write_levels(&LevelStore::new(dir.path()), 21);
        let rec = Arc::new(Recorder {
            fail: true,
            ..Recorder::default()
        });
        let mut w = watcher(dir.path(), ScriptedPrices::new(vec![Ok(Some(603.0))]), rec);

        let out = w.tick(pt(21, 10, 3, 15)).await.unwrap();
        assert_eq!(out, TickOutcome::Evaluated { price: 603.0, signals: 1 });
        assert!(w.observed().contains(common::SignalKind::SupportTest, 600.0));
    }

    #[tokio::test]
    async fn run_fails_when_startup_notice_fails() {
        let dir = tempfile::tempdir().unwrap();
        let rec = Arc::new(Recorder {
            fail: true,
            ..Recorder::default()
        });
        let w = watcher(dir.path(), ScriptedPrices::new(vec![]), rec);
        let err = w.run(std::future::pending()).await.unwrap_err();
        assert!(matches!(err, Error::Notify(_)));
    }

    #[tokio::test]
    async fn run_announces_and_stops_on_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let rec = Arc::new(Recorder::default());
        let w = watcher(dir.path(), ScriptedPrices::new(vec![]), rec.clone());
        let status = w.status.clone();

        w.run(async {}).await.unwrap();
        let msgs = rec.messages();
        assert!(msgs[0].contains("now online"));
        assert!(msgs.last().unwrap().contains("shutting down"));
        assert_eq!(*status.read().await, MonitorStatus::Stopped);
    }
}
