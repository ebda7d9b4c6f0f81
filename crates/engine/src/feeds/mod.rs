pub mod alpha_vantage;
pub mod index_price;

pub use alpha_vantage::QuoteClient;
pub use index_price::IndexPriceClient;
