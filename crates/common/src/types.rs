use std::str::FromStr;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::error::{ensure_finite, Error, Result};

/// Timestamp layout used by the quote API and by the bar / signal CSV files.
pub const BAR_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Whether a level acts as a floor or a ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LevelKind {
    Support,
    Resistance,
}

impl std::fmt::Display for LevelKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LevelKind::Support => write!(f, "support"),
            LevelKind::Resistance => write!(f, "resistance"),
        }
    }
}

impl FromStr for LevelKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "support" => Ok(LevelKind::Support),
            "resistance" => Ok(LevelKind::Resistance),
            other => Err(Error::InvalidInput(format!(
                "level type must be 'support' or 'resistance', got '{other}'"
            ))),
        }
    }
}

/// Importance tier of a level. Anything unrecognised is treated as `Medium`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    High,
    #[default]
    Medium,
    Low,
}

impl Importance {
    /// Marker shown next to a level in alert text.
    pub fn marker(&self) -> &'static str {
        match self {
            Importance::High => "🔴",
            Importance::Medium | Importance::Low => "🟡",
        }
    }
}

impl std::fmt::Display for Importance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Importance::High => write!(f, "high"),
            Importance::Medium => write!(f, "medium"),
            Importance::Low => write!(f, "low"),
        }
    }
}

impl FromStr for Importance {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "high" => Ok(Importance::High),
            "medium" => Ok(Importance::Medium),
            "low" => Ok(Importance::Low),
            other => Err(Error::InvalidInput(format!("unknown importance '{other}'"))),
        }
    }
}

/// A labelled support or resistance price. Immutable for the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Level {
    pub kind: LevelKind,
    pub value: f64,
    pub description: String,
    pub importance: Importance,
}

impl Level {
    /// Build a level, rejecting NaN and infinite values.
    pub fn new(
        kind: LevelKind,
        value: f64,
        description: impl Into<String>,
        importance: Importance,
    ) -> Result<Self> {
        let value = ensure_finite("level value", value)?;
        Ok(Self {
            kind,
            value,
            description: description.into(),
            importance,
        })
    }

    pub fn support(value: f64, description: impl Into<String>, importance: Importance) -> Result<Self> {
        Self::new(LevelKind::Support, value, description, importance)
    }

    pub fn resistance(
        value: f64,
        description: impl Into<String>,
        importance: Importance,
    ) -> Result<Self> {
        Self::new(LevelKind::Resistance, value, description, importance)
    }
}

/// All levels for one trading session, in the order they were supplied.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LevelSet {
    pub supports: Vec<Level>,
    pub resistances: Vec<Level>,
}

impl LevelSet {
    /// Split a flat list of levels by kind, keeping input order within each kind.
    pub fn from_levels(levels: impl IntoIterator<Item = Level>) -> Self {
        let mut set = LevelSet::default();
        for level in levels {
            set.push(level);
        }
        set
    }

    pub fn push(&mut self, level: Level) {
        match level.kind {
            LevelKind::Support => self.supports.push(level),
            LevelKind::Resistance => self.resistances.push(level),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.supports.is_empty() && self.resistances.is_empty()
    }

    pub fn len(&self) -> usize {
        self.supports.len() + self.resistances.len()
    }

    /// Supports first, then resistances.
    pub fn iter(&self) -> impl Iterator<Item = &Level> {
        self.supports.iter().chain(self.resistances.iter())
    }
}

/// Event type emitted by the signal engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalKind {
    SupportTest,
    ResistanceTest,
    BreakoutUp,
    BreakoutDown,
}

impl std::fmt::Display for SignalKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignalKind::SupportTest => write!(f, "support_test"),
            SignalKind::ResistanceTest => write!(f, "resistance_test"),
            SignalKind::BreakoutUp => write!(f, "breakout_up"),
            SignalKind::BreakoutDown => write!(f, "breakout_down"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Medium,
}

impl From<Importance> for Severity {
    fn from(importance: Importance) -> Self {
        match importance {
            Importance::High => Severity::High,
            Importance::Medium | Importance::Low => Severity::Medium,
        }
    }
}

/// A neighbouring level attached to a signal for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextLevel {
    pub value: f64,
    pub description: String,
    pub importance: Importance,
    /// Absolute distance from the evaluation price.
    pub distance: f64,
}

/// One level event produced by a single evaluation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    pub kind: SignalKind,
    pub level: f64,
    pub description: String,
    pub price: f64,
    pub severity: Severity,
    pub message: String,
    pub context: Vec<ContextLevel>,
}

/// Colour family of an outgoing alert. Notifiers map it to their own palette.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Bullish,
    Bearish,
    Caution,
    Info,
    Warning,
    Muted,
}

/// A message ready for delivery by a [`crate::Notifier`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub message: String,
    pub tone: Tone,
}

impl Alert {
    pub fn new(message: impl Into<String>, tone: Tone) -> Self {
        Self {
            message: message.into(),
            tone,
        }
    }
}

impl From<&Signal> for Alert {
    fn from(signal: &Signal) -> Self {
        let tone = match signal.kind {
            SignalKind::SupportTest | SignalKind::BreakoutUp => Tone::Bullish,
            SignalKind::ResistanceTest | SignalKind::BreakoutDown => Tone::Bearish,
        };
        Alert::new(signal.message.clone(), tone)
    }
}

/// One OHLCV bar from the quote API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: NaiveDateTime,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// Trend classification relative to the four moving averages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    #[serde(rename = "BULLISH")]
    Bullish,
    #[serde(rename = "BEARISH")]
    Bearish,
    #[serde(rename = "CHOP")]
    Chop,
    #[serde(rename = "Insufficient Data")]
    InsufficientData,
}

impl Trend {
    pub fn tone(&self) -> Tone {
        match self {
            Trend::Bullish => Tone::Bullish,
            Trend::Bearish => Tone::Bearish,
            Trend::Chop | Trend::InsufficientData => Tone::Caution,
        }
    }

    pub fn marker(&self) -> &'static str {
        match self {
            Trend::Bullish => "🟢",
            Trend::Bearish => "🔴",
            Trend::Chop | Trend::InsufficientData => "🟡",
        }
    }
}

impl std::fmt::Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trend::Bullish => write!(f, "BULLISH"),
            Trend::Bearish => write!(f, "BEARISH"),
            Trend::Chop => write!(f, "CHOP"),
            Trend::InsufficientData => write!(f, "Insufficient Data"),
        }
    }
}

/// Lifecycle of the background level watcher, reported by the health API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MonitorStatus {
    #[default]
    Starting,
    Running,
    Stopped,
}

impl std::fmt::Display for MonitorStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MonitorStatus::Starting => write!(f, "starting"),
            MonitorStatus::Running => write!(f, "running"),
            MonitorStatus::Stopped => write!(f, "stopped"),
        }
    }
}
