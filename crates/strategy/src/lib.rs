pub mod config;
pub mod indicators;
pub mod levels;
pub mod trend;

pub use config::{LevelRules, MonitorFileConfig, TrendRules, WatchSchedule};
pub use levels::{ObservationState, SignalEngine, SignalKey};
pub use trend::{classify, Crossover, MovingAverages, TrendAnalyzer, TrendReport, TrendTracker};
