use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::domain::OrderSide;
use crate::error::Result;

/// Raw quote as returned by a single provider, before impact verification.
#[derive(Debug, Clone)]
pub struct ProviderQuote {
    pub price: Decimal,
    pub liquidity_usd: Option<Decimal>,
}

/// One swap/market quote source, queried in priority order by the aggregator.
#[async_trait]
pub trait QuoteProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn quote(&self, symbol: &str, side: OrderSide, amount: Decimal)
        -> Result<ProviderQuote>;
}

/// Independent low-latency spot source used as the price-impact reference.
///
/// Queried in parallel with the provider chain so it never adds its own
/// latency to the critical path.
#[async_trait]
pub trait SpotPriceSource: Send + Sync {
    fn name(&self) -> &str;

    async fn spot(&self, symbol: &str) -> Result<Decimal>;
}
