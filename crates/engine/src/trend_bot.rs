use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use common::{Alert, BarSource, Notifier, Result, Trend, BAR_TIMESTAMP_FORMAT};
use storage::{GitSync, MarketDataStore, TrendSignalRecord};
use strategy::{TrendAnalyzer, TrendReport, TrendTracker};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CycleOutcome {
    /// Upstream returned no bars.
    NoData,
    /// Not enough stored history to classify yet.
    Warming { points: usize },
    Analyzed { trend: Trend, changed: bool },
}

/// Polls 1-minute bars, keeps the CSV history growing and alerts whenever
/// the moving-average trend classification changes.
pub struct TrendBot {
    symbol: String,
    source: Arc<dyn BarSource>,
    notifier: Arc<dyn Notifier>,
    store: MarketDataStore,
    analyzer: TrendAnalyzer,
    tracker: TrendTracker,
    git: Option<GitSync>,
    last_commit: Option<DateTime<Utc>>,
}

impl TrendBot {
    pub fn new(
        symbol: impl Into<String>,
        source: Arc<dyn BarSource>,
        notifier: Arc<dyn Notifier>,
        store: MarketDataStore,
        analyzer: TrendAnalyzer,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            source,
            notifier,
            store,
            analyzer,
            tracker: TrendTracker::new(),
            git: None,
            last_commit: None,
        }
    }

    /// Commit the data files through `git` at most every
    /// `commit_every_mins` minutes.
    pub fn with_git(mut self, git: GitSync) -> Self {
        self.git = Some(git);
        self
    }

    pub fn last_trend(&self) -> Option<Trend> {
        self.tracker.last()
    }

    pub async fn run(mut self, shutdown: impl Future<Output = ()>) {
        info!(symbol = %self.symbol, "Trend bot running");
        let pause = Duration::from_secs(self.analyzer.rules().poll_interval_secs);

        tokio::pin!(shutdown);
        loop {
            match self.cycle(Utc::now()).await {
                Ok(outcome) => debug!(?outcome, "Trend cycle complete"),
                Err(e) => error!(error = %e, "Trend cycle failed"),
            }
            tokio::select! {
                _ = &mut shutdown => break,
                _ = tokio::time::sleep(pause) => {}
            }
        }
        info!("Trend bot stopping");
    }

    pub async fn cycle(&mut self, now: DateTime<Utc>) -> Result<CycleOutcome> {
        let bars = self.source.intraday_bars().await?;
        let Some(latest) = bars.last() else {
            warn!(symbol = %self.symbol, "No bars received");
            return Ok(CycleOutcome::NoData);
        };

        if self.store.last_bar_timestamp()? == Some(latest.timestamp) {
            debug!(timestamp = %latest.timestamp, "Latest bar already stored");
        } else {
            self.store.append_bar(latest)?;
        }

        let rules = self.analyzer.rules().clone();
        let history = self.store.history(rules.history_days)?;
        let closes: Vec<f64> = history.iter().map(|b| b.close).collect();
        let Some(report) = self.analyzer.analyze(&closes) else {
            warn!(
                points = closes.len(),
                required = rules.min_points,
                "Not enough history to classify trend"
            );
            return Ok(CycleOutcome::Warming {
                points: closes.len(),
            });
        };

        info!(price = report.price, trend = %report.trend, signal = %report.description, "Trend classified");
        let a = &report.averages;
        self.store.append_signal(&TrendSignalRecord {
            timestamp: latest.timestamp.format(BAR_TIMESTAMP_FORMAT).to_string(),
            price: report.price,
            trend: report.trend,
            signal: report.description.clone(),
            ma_50_ema: a.ema_short,
            ma_50_sma: a.sma_short,
            ma_200_ema: a.ema_long,
            ma_200_sma: a.sma_long,
        })?;

        let changed = self.tracker.observe(report.trend);
        if changed {
            let alert = Alert::new(report.alert_message(&self.symbol, &rules), report.trend.tone());
            if let Err(e) = self.notifier.notify(&alert).await {
                warn!(error = %e, "Failed to deliver trend alert");
            }
        }

        self.maybe_commit(now, rules.commit_every_mins).await;

        Ok(CycleOutcome::Analyzed {
            trend: report.trend,
            changed,
        })
    }

    async fn maybe_commit(&mut self, now: DateTime<Utc>, every_mins: i64) {
        let Some(git) = &self.git else {
            return;
        };
        let due = self
            .last_commit
            .map_or(true, |last| now - last > chrono::Duration::minutes(every_mins));
        if !due {
            return;
        }
        let message = format!("Auto-commit: Update {} data and MA signals", self.symbol);
        match git.commit_and_push(&message).await {
            Ok(_) => self.last_commit = Some(now),
            Err(e) => error!(error = %e, "Data commit failed"),
        }
    }
}

/// Result of a one-shot analysis.
#[derive(Debug, Clone)]
pub enum Report {
    Ready(TrendReport),
    /// Fewer bars than the analyzer's minimum.
    TooFewBars { got: usize },
}

/// One-shot analysis of whatever the upstream currently offers, for the
/// console.
pub async fn report(source: &dyn BarSource, analyzer: &TrendAnalyzer) -> Result<Report> {
    let bars = source.intraday_bars().await?;
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
    Ok(match analyzer.analyze(&closes) {
        Some(report) => Report::Ready(report),
        None => Report::TooFewBars { got: closes.len() },
    })
}
