use async_trait::async_trait;
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::OrderSide;
use crate::error::Result;
use crate::pricing::provider::{ProviderQuote, QuoteProvider, SpotPriceSource};

/// Shared in-process market price used by the paper demo and tests.
///
/// One handle backs both a [`QuoteProvider`] and a [`SpotPriceSource`], so
/// synthetic quotes carry zero price impact unless a spread is configured.
#[derive(Clone)]
pub struct SyntheticMarket {
    price: Arc<RwLock<Decimal>>,
    /// Half-spread applied per side on quotes, as a fraction of spot
    spread_pct: Decimal,
}

impl SyntheticMarket {
    pub fn new(initial_price: Decimal) -> Self {
        Self {
            price: Arc::new(RwLock::new(initial_price)),
            spread_pct: Decimal::ZERO,
        }
    }

    pub fn with_spread(mut self, spread_pct: Decimal) -> Self {
        self.spread_pct = spread_pct;
        self
    }

    pub async fn set_price(&self, price: Decimal) {
        *self.price.write().await = price;
    }

    pub async fn price(&self) -> Decimal {
        *self.price.read().await
    }

    pub fn provider(&self, name: &str) -> Arc<dyn QuoteProvider> {
        Arc::new(SyntheticProvider {
            name: name.to_string(),
            market: self.clone(),
        })
    }

    pub fn spot_source(&self) -> Arc<dyn SpotPriceSource> {
        Arc::new(SyntheticSpot {
            market: self.clone(),
        })
    }
}

struct SyntheticProvider {
    name: String,
    market: SyntheticMarket,
}

#[async_trait]
impl QuoteProvider for SyntheticProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn quote(
        &self,
        _symbol: &str,
        side: OrderSide,
        _amount: Decimal,
    ) -> Result<ProviderQuote> {
        let spot = self.market.price().await;
        // Buys pay the half-spread above spot, sells receive below it
        let price = match side {
            OrderSide::Buy => spot * (Decimal::ONE + self.market.spread_pct),
            OrderSide::Sell => spot * (Decimal::ONE - self.market.spread_pct),
        };
        Ok(ProviderQuote {
            price,
            liquidity_usd: None,
        })
    }
}

struct SyntheticSpot {
    market: SyntheticMarket,
}

#[async_trait]
impl SpotPriceSource for SyntheticSpot {
    fn name(&self) -> &str {
        "synthetic-spot"
    }

    async fn spot(&self, _symbol: &str) -> Result<Decimal> {
        Ok(self.market.price().await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn quotes_follow_shared_price_with_spread() {
        let market = SyntheticMarket::new(dec!(100)).with_spread(dec!(0.01));
        let provider = market.provider("synthetic");

        let buy = provider
            .quote("BTC/USD", OrderSide::Buy, dec!(1))
            .await
            .unwrap();
        let sell = provider
            .quote("BTC/USD", OrderSide::Sell, dec!(1))
            .await
            .unwrap();
        assert_eq!(buy.price, dec!(101.00));
        assert_eq!(sell.price, dec!(99.00));

        market.set_price(dec!(200)).await;
        let spot = market.spot_source().spot("BTC/USD").await.unwrap();
        assert_eq!(spot, dec!(200));
    }
}
