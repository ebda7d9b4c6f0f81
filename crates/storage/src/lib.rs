//! Flat-file persistence: daily level sheets, the bar log and the trend
//! signal log, plus an optional git sync of the data directory.

pub mod git;
pub mod levels;
pub mod market_data;

pub use git::GitSync;
pub use levels::LevelStore;
pub use market_data::{FileStats, MarketDataStore, TrendSignalRecord};
