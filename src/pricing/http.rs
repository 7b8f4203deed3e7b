use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;

use crate::error::{OrdexError, Result};
use crate::pricing::provider::SpotPriceSource;

/// JSON spot-price endpoint response: `{"symbol": "...", "price": "..."}`
#[derive(Debug, Deserialize)]
struct SpotResponse {
    price: Decimal,
}

/// Spot source backed by a plain HTTP JSON endpoint.
///
/// Used as the independent price-impact reference; the aggregator bounds the
/// call with its own timeout on top of the client's.
pub struct HttpSpotSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSpotSource {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }
}

#[async_trait]
impl SpotPriceSource for HttpSpotSource {
    fn name(&self) -> &str {
        "http-spot"
    }

    async fn spot(&self, symbol: &str) -> Result<Decimal> {
        let url = format!("{}/price", self.base_url.trim_end_matches('/'));
        let resp = self
            .client
            .get(&url)
            .query(&[("symbol", symbol)])
            .send()
            .await?
            .error_for_status()?;

        let body: SpotResponse = resp.json().await?;
        if body.price <= Decimal::ZERO {
            return Err(OrdexError::InvalidMarketData(format!(
                "non-positive spot price {} for {}",
                body.price, symbol
            )));
        }
        Ok(body.price)
    }
}
