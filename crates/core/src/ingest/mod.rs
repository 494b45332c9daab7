pub mod provider;
pub mod types;
pub mod universe;

pub use provider::{MarketDataClient, YahooChartProvider};
pub use types::{PriceSeries, PriceTable};
