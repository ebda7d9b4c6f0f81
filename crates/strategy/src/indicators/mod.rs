pub mod ema;
pub mod sma;

pub use ema::EmaIndicator;
pub use sma::SmaIndicator;
