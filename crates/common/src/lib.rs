pub mod config;
pub mod error;
pub mod exchange;
pub mod types;

pub use config::Config;
pub use error::{ensure_finite, Error, Result};
pub use exchange::{BarSource, Notifier, PriceSource};
pub use types::*;
