pub mod feeds;
pub mod session;
pub mod trend_bot;
pub mod watcher;

pub use feeds::{IndexPriceClient, QuoteClient};
pub use session::MarketHours;
pub use trend_bot::{CycleOutcome, Report, TrendBot};
pub use watcher::{LevelWatcher, TickOutcome};
