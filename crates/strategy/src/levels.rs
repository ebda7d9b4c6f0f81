//! Level-crossing signal engine.
//!
//! Given the current price and the session's support/resistance levels, the
//! engine reports which levels are being tested and which have been broken,
//! and suppresses repeats through an [`ObservationState`] owned by the caller.
//!
//! One evaluation runs, in order:
//! 1. the hysteresis pass, which forgets levels price has moved far away from;
//! 2. support tests, resistance tests, breakouts up, breakdowns.
//!
//! Band checks are inclusive (`>=` / `<=`), breakout checks strict, so one
//! price never tests and breaks the same level at once.

use std::collections::HashSet;

use common::{ContextLevel, Level, LevelSet, Severity, Signal, SignalKind};

use crate::config::LevelRules;

/// De-duplication key: event type plus the level's value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SignalKey {
    kind: SignalKind,
    level_bits: u64,
}

impl SignalKey {
    pub fn new(kind: SignalKind, level: f64) -> Self {
        // -0.0 and 0.0 must map to the same key
        let level = if level == 0.0 { 0.0 } else { level };
        Self {
            kind,
            level_bits: level.to_bits(),
        }
    }

    pub fn kind(&self) -> SignalKind {
        self.kind
    }

    pub fn level(&self) -> f64 {
        f64::from_bits(self.level_bits)
    }
}

/// Signals already reported this session.
#[derive(Debug, Clone, Default)]
pub struct ObservationState {
    seen: HashSet<SignalKey>,
}

impl ObservationState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, kind: SignalKind, level: f64) -> bool {
        self.seen.contains(&SignalKey::new(kind, level))
    }

    /// Returns `true` if the key was not recorded before.
    pub fn record(&mut self, kind: SignalKind, level: f64) -> bool {
        self.seen.insert(SignalKey::new(kind, level))
    }

    pub fn forget(&mut self, kind: SignalKind, level: f64) -> bool {
        self.seen.remove(&SignalKey::new(kind, level))
    }

    pub fn clear(&mut self) {
        self.seen.clear();
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &SignalKey> {
        self.seen.iter()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Up,
    Down,
}

fn direction_of(kind: SignalKind) -> Direction {
    match kind {
        SignalKind::SupportTest | SignalKind::ResistanceTest | SignalKind::BreakoutUp => Direction::Up,
        SignalKind::BreakoutDown => Direction::Down,
    }
}

/// Stateless rule engine; the mutable part lives in [`ObservationState`].
#[derive(Debug, Clone)]
pub struct SignalEngine {
    rules: LevelRules,
    /// Instrument label used in alert text, e.g. "SPX".
    label: String,
}

impl SignalEngine {
    pub fn new(rules: LevelRules, label: impl Into<String>) -> Self {
        Self {
            rules,
            label: label.into(),
        }
    }

    pub fn rules(&self) -> &LevelRules {
        &self.rules
    }

    /// Evaluate one price tick. `price` and all level values must be finite;
    /// callers validate at the boundary.
    pub fn evaluate(&self, price: f64, levels: &LevelSet, state: &mut ObservationState) -> Vec<Signal> {
        debug_assert!(price.is_finite(), "price must be validated before evaluation");

        self.clear_stale(price, levels, state);

        let t = self.rules.tolerance;
        let in_band = |level: &Level| price >= level.value - t && price <= level.value + t;

        let mut signals = Vec::new();

        for level in levels.supports.iter().filter(|l| in_band(l)) {
            self.emit(SignalKind::SupportTest, level, price, levels, state, &mut signals);
        }
        for level in levels.resistances.iter().filter(|l| in_band(l)) {
            self.emit(SignalKind::ResistanceTest, level, price, levels, state, &mut signals);
        }
        for level in levels.resistances.iter().filter(|l| price > l.value + t) {
            self.emit(SignalKind::BreakoutUp, level, price, levels, state, &mut signals);
        }
        for level in levels.supports.iter().filter(|l| price < l.value - t) {
            self.emit(SignalKind::BreakoutDown, level, price, levels, state, &mut signals);
        }

        signals
    }

    /// Hysteresis: forget a level's entries once price is far enough away.
    fn clear_stale(&self, price: f64, levels: &LevelSet, state: &mut ObservationState) {
        let h = self.rules.hysteresis;
        for level in levels.supports.iter().filter(|l| price > l.value + h) {
            state.forget(SignalKind::SupportTest, level.value);
            state.forget(SignalKind::BreakoutDown, level.value);
        }
        for level in levels.resistances.iter().filter(|l| price < l.value - h) {
            state.forget(SignalKind::ResistanceTest, level.value);
            state.forget(SignalKind::BreakoutUp, level.value);
        }
    }

    fn emit(
        &self,
        kind: SignalKind,
        level: &Level,
        price: f64,
        levels: &LevelSet,
        state: &mut ObservationState,
        out: &mut Vec<Signal>,
    ) {
        if !state.record(kind, level.value) {
            return;
        }
        let context = self.context(price, levels, direction_of(kind));
        let message = self.render(kind, level, price, &context);
        out.push(Signal {
            kind,
            level: level.value,
            description: level.description.clone(),
            price,
            severity: Severity::from(level.importance),
            message,
            context,
        });
    }

    /// Nearest levels beyond `price` in `direction`, closest first.
    /// `sort_by` is stable, so equal distances keep input order.
    fn context(&self, price: f64, levels: &LevelSet, direction: Direction) -> Vec<ContextLevel> {
        let mut nearby: Vec<ContextLevel> = match direction {
            Direction::Up => levels
                .resistances
                .iter()
                .filter(|l| l.value > price)
                .map(|l| context_level(l, l.value - price))
                .collect(),
            Direction::Down => levels
                .supports
                .iter()
                .filter(|l| l.value < price)
                .map(|l| context_level(l, price - l.value))
                .collect(),
        };
        nearby.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        nearby.truncate(self.rules.context_levels);
        nearby
    }

    fn render(&self, kind: SignalKind, level: &Level, price: f64, context: &[ContextLevel]) -> String {
        let label = &self.label;
        let marker = level.importance.marker();
        let desc = &level.description;
        let value = level.value;

        let mut message = match kind {
            SignalKind::SupportTest => {
                format!("{marker} **{label} Support Test**: {price:.2} testing {desc} at {value}")
            }
            SignalKind::ResistanceTest => {
                format!("{marker} **{label} Resistance Test**: {price:.2} testing {desc} at {value}")
            }
            SignalKind::BreakoutUp => {
                format!("🚀 **{label} Breakout**: {price:.2} broke above {desc} at {value}!")
            }
            SignalKind::BreakoutDown => {
                format!("📉 **{label} Breakdown**: {price:.2} broke below {desc} at {value}!")
            }
        };

        if !context.is_empty() {
            let heading = match direction_of(kind) {
                Direction::Up => "📈 **Next Upside Levels**",
                Direction::Down => "📉 **Next Downside Levels**",
            };
            let lines: Vec<String> = context
                .iter()
                .map(|c| format!("{} {} at {:.1}", c.importance.marker(), c.description, c.value))
                .collect();
            message.push_str(&format!("\n\n{heading}:\n{}", lines.join("\n")));
        }
        message
    }
}

fn context_level(level: &Level, distance: f64) -> ContextLevel {
    ContextLevel {
        value: level.value,
        description: level.description.clone(),
        importance: level.importance,
        distance,
    }
}
