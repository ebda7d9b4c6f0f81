//! Append-only CSV logs for the trend bot: 1-minute bars and classified trend
//! signals. Headers are written once, when a file is first created.

use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use common::{Bar, Result, Trend, BAR_TIMESTAMP_FORMAT};

const BAR_HEADER: [&str; 6] = ["timestamp", "open", "high", "low", "close", "volume"];
const SIGNAL_HEADER: [&str; 8] = [
    "timestamp",
    "price",
    "trend",
    "signal",
    "ma_50_ema",
    "ma_50_sma",
    "ma_200_ema",
    "ma_200_sma",
];

#[derive(Debug, Serialize, Deserialize)]
struct BarRow {
    timestamp: String,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: u64,
}

impl From<&Bar> for BarRow {
    fn from(bar: &Bar) -> Self {
        Self {
            timestamp: bar.timestamp.format(BAR_TIMESTAMP_FORMAT).to_string(),
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
        }
    }
}

/// One row of `ma_signals.csv`. Averages that could not be computed are empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSignalRecord {
    pub timestamp: String,
    pub price: f64,
    pub trend: Trend,
    pub signal: String,
    pub ma_50_ema: Option<f64>,
    pub ma_50_sma: Option<f64>,
    pub ma_200_ema: Option<f64>,
    pub ma_200_sma: Option<f64>,
}

/// Row counts and first/last timestamps of both logs.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FileStats {
    pub bar_count: usize,
    pub first_bar: Option<String>,
    pub last_bar: Option<String>,
    pub signal_count: usize,
    pub first_signal: Option<String>,
    pub last_signal: Option<String>,
}

impl std::fmt::Display for FileStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} bars", self.bar_count)?;
        if let (Some(first), Some(last)) = (&self.first_bar, &self.last_bar) {
            write!(f, " ({first} to {last})")?;
        }
        write!(f, ", {} signals", self.signal_count)?;
        if let Some(last) = &self.last_signal {
            write!(f, " (last {last})")?;
        }
        Ok(())
    }
}

pub struct MarketDataStore {
    dir: PathBuf,
    bars_path: PathBuf,
    signals_path: PathBuf,
}

impl MarketDataStore {
    /// Open (and if needed create) the data directory and both logs.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        let store = Self {
            bars_path: dir.join("spy_1min.csv"),
            signals_path: dir.join("ma_signals.csv"),
            dir,
        };
        init_with_header(&store.bars_path, &BAR_HEADER)?;
        init_with_header(&store.signals_path, &SIGNAL_HEADER)?;
        Ok(store)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn bars_path(&self) -> &Path {
        &self.bars_path
    }

    pub fn signals_path(&self) -> &Path {
        &self.signals_path
    }

    pub fn append_bar(&self, bar: &Bar) -> Result<()> {
        append_row(&self.bars_path, &BarRow::from(bar))?;
        debug!(timestamp = %bar.timestamp, close = bar.close, "Appended bar");
        Ok(())
    }

    pub fn append_signal(&self, record: &TrendSignalRecord) -> Result<()> {
        append_row(&self.signals_path, record)?;
        debug!(trend = %record.trend, "Appended trend signal");
        Ok(())
    }

    /// All stored bars, oldest first. Rows that fail to parse are skipped.
    pub fn bars(&self) -> Result<Vec<Bar>> {
        let mut reader = csv::Reader::from_path(&self.bars_path)?;
        let mut bars = Vec::new();
        for (i, row) in reader.deserialize::<BarRow>().enumerate() {
            let parsed = row
                .map_err(|e| e.to_string())
                .and_then(|r| parse_bar_row(r).map_err(|e| e.to_string()));
            match parsed {
                Ok(bar) => bars.push(bar),
                Err(e) => warn!(line = i + 2, error = %e, "Skipping malformed bar row"),
            }
        }
        bars.sort_by_key(|b| b.timestamp);
        Ok(bars)
    }

    /// Bars within `days` of the newest stored bar.
    pub fn history(&self, days: i64) -> Result<Vec<Bar>> {
        let bars = self.bars()?;
        let Some(newest) = bars.last().map(|b| b.timestamp) else {
            return Ok(bars);
        };
        let cutoff = newest - Duration::days(days);
        Ok(bars.into_iter().filter(|b| b.timestamp >= cutoff).collect())
    }

    pub fn last_bar_timestamp(&self) -> Result<Option<NaiveDateTime>> {
        Ok(self.bars()?.last().map(|b| b.timestamp))
    }

    pub fn stats(&self) -> Result<FileStats> {
        let (bar_count, first_bar, last_bar) = first_column_summary(&self.bars_path)?;
        let (signal_count, first_signal, last_signal) = first_column_summary(&self.signals_path)?;
        Ok(FileStats {
            bar_count,
            first_bar,
            last_bar,
            signal_count,
            first_signal,
            last_signal,
        })
    }
}

fn init_with_header(path: &Path, header: &[&str]) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(header)?;
    writer.flush()?;
    Ok(())
}

fn append_row<T: Serialize>(path: &Path, row: &T) -> Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_writer(file);
    writer.serialize(row)?;
    writer.flush()?;
    Ok(())
}

fn parse_bar_row(row: BarRow) -> std::result::Result<Bar, chrono::ParseError> {
    let timestamp = NaiveDateTime::parse_from_str(&row.timestamp, BAR_TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(&row.timestamp, "%Y-%m-%dT%H:%M:%S%.f"))?;
    Ok(Bar {
        timestamp,
        open: row.open,
        high: row.high,
        low: row.low,
        close: row.close,
        volume: row.volume,
    })
}

fn first_column_summary(path: &Path) -> Result<(usize, Option<String>, Option<String>)> {
    if !path.exists() {
        return Ok((0, None, None));
    }
    let mut reader = csv::Reader::from_path(path)?;
    let mut count = 0;
    let mut first = None;
    let mut last = None;
    for record in reader.records() {
        let record = record?;
        let ts = record.get(0).unwrap_or_default().to_string();
        if first.is_none() {
            first = Some(ts.clone());
        }
        last = Some(ts);
        count += 1;
    }
    Ok((count, first, last))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, BAR_TIMESTAMP_FORMAT).unwrap()
    }

    fn bar(at: &str, close: f64) -> Bar {
        Bar {
            timestamp: ts(at),
            open: close - 0.1,
            high: close + 0.4,
            low: close - 0.3,
            close,
            volume: 1_000_000,
        }
    }

    #[test]
    fn open_writes_headers_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = MarketDataStore::open(dir.path()).unwrap();
        store.append_bar(&bar("2025-08-21 09:31:00", 647.10)).unwrap();

        let reopened = MarketDataStore::open(dir.path()).unwrap();
        let text = std::fs::read_to_string(reopened.bars_path()).unwrap();
        assert_eq!(text.matches("timestamp,open").count(), 1);
        assert!(text.contains("\n2025-08-21 09:31:00,"));

        let signals = std::fs::read_to_string(store.signals_path()).unwrap();
        assert_eq!(
            signals,
            "timestamp,price,trend,signal,ma_50_ema,ma_50_sma,ma_200_ema,ma_200_sma\n"
        );
    }

    #[test]
    fn bars_come_back_sorted_and_history_is_windowed() {
        let dir = tempfile::tempdir().unwrap();
        let store = MarketDataStore::open(dir.path()).unwrap();
        store.append_bar(&bar("2025-08-21 09:32:00", 647.3)).unwrap();
        store.append_bar(&bar("2025-07-01 09:31:00", 610.0)).unwrap();
        store.append_bar(&bar("2025-08-21 09:31:00", 647.1)).unwrap();

        let all = store.bars().unwrap();
        assert_eq!(all.len(), 3);
        assert_eq!(all[0].close, 610.0);
        assert_eq!(all[2].close, 647.3);

        let recent = store.history(30).unwrap();
        let closes: Vec<f64> = recent.iter().map(|b| b.close).collect();
        assert_eq!(closes, vec![647.1, 647.3]);
        assert_eq!(
            store.last_bar_timestamp().unwrap(),
            Some(ts("2025-08-21 09:32:00"))
        );
    }

    #[test]
    fn iso_timestamps_and_bad_rows_are_handled() {
        let dir = tempfile::tempdir().unwrap();
        let store = MarketDataStore::open(dir.path()).unwrap();
        let mut f = OpenOptions::new().append(true).open(store.bars_path()).unwrap();
        writeln!(f, "2025-08-21T09:30:00.123456,647.24,647.5,646.8,647.1,1000000").unwrap();
        writeln!(f, "yesterday,1,2,3,4,5").unwrap();
        writeln!(f, "2025-08-21 09:31:00,647.1,647.6,647.0,647.4,900000").unwrap();

        let bars = store.bars().unwrap();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[1].volume, 900_000);
    }

    #[test]
    fn empty_history_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = MarketDataStore::open(dir.path()).unwrap();
        assert!(store.history(30).unwrap().is_empty());
        assert_eq!(store.last_bar_timestamp().unwrap(), None);
    }

    #[test]
    fn signal_rows_and_stats() {
        let dir = tempfile::tempdir().unwrap();
        let store = MarketDataStore::open(dir.path()).unwrap();
        store.append_bar(&bar("2025-08-21 09:31:00", 647.1)).unwrap();
        store.append_bar(&bar("2025-08-21 09:32:00", 647.2)).unwrap();
        store
            .append_signal(&TrendSignalRecord {
                timestamp: "2025-08-21 09:32:00".into(),
                price: 647.2,
                trend: Trend::Bullish,
                signal: "Price above all 4 MAs - Strong uptrend".into(),
                ma_50_ema: Some(646.5),
                ma_50_sma: Some(646.3),
                ma_200_ema: Some(645.8),
                ma_200_sma: None,
            })
            .unwrap();

        let text = std::fs::read_to_string(store.signals_path()).unwrap();
        assert!(text.ends_with(
            "2025-08-21 09:32:00,647.2,BULLISH,Price above all 4 MAs - Strong uptrend,646.5,646.3,645.8,\n"
        ));

        let stats = store.stats().unwrap();
        assert_eq!(stats.bar_count, 2);
        assert_eq!(stats.first_bar.as_deref(), Some("2025-08-21 09:31:00"));
        assert_eq!(stats.last_bar.as_deref(), Some("2025-08-21 09:32:00"));
        assert_eq!(stats.signal_count, 1);
        assert_eq!(
            stats.to_string(),
            "2 bars (2025-08-21 09:31:00 to 2025-08-21 09:32:00), 1 signals (last 2025-08-21 09:32:00)"
        );
    }

    #[test]
    fn empty_stats_summary() {
        let dir = tempfile::tempdir().unwrap();
        let store = MarketDataStore::open(dir.path()).unwrap();
        assert_eq!(store.stats().unwrap().to_string(), "0 bars, 0 signals");
    }
}
