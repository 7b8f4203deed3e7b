//! Multi-provider price discovery: the aggregator, provider seams, and the
//! concrete adapters the binary wires up.

pub mod aggregator;
pub mod http;
pub mod provider;
pub mod synthetic;

pub use aggregator::PriceAggregator;
pub use http::HttpSpotSource;
pub use provider::{ProviderQuote, QuoteProvider, SpotPriceSource};
pub use synthetic::SyntheticMarket;
