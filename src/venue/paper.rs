use async_trait::async_trait;
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use crate::error::Result;
use crate::venue::traits::{ExecutionVenue, FillReport, SubmitRequest};

/// Simulated venue: fills immediately at the submitted limit price.
///
/// `fill_ratio` below 1 produces partial fills, which exercises the
/// `PartiallyFilled` path in tests.
pub struct PaperVenue {
    fill_ratio: Decimal,
}

impl PaperVenue {
    pub fn new() -> Self {
        Self {
            fill_ratio: Decimal::ONE,
        }
    }

    pub fn with_fill_ratio(fill_ratio: Decimal) -> Self {
        Self { fill_ratio }
    }
}

impl Default for PaperVenue {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExecutionVenue for PaperVenue {
    fn name(&self) -> &str {
        "paper"
    }

    fn is_paper(&self) -> bool {
        true
    }

    async fn submit(&self, request: &SubmitRequest) -> Result<FillReport> {
        let filled = request.amount * self.fill_ratio;
        info!(
            client_order_id = %request.client_order_id,
            symbol = %request.symbol,
            side = %request.side,
            amount = %filled,
            price = %request.limit_price,
            "paper fill"
        );
        Ok(FillReport {
            venue_order_id: Uuid::new_v4().to_string(),
            filled_amount: filled,
            average_price: request.limit_price,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OrderSide;
    use rust_decimal_macros::dec;

    fn request(amount: Decimal) -> SubmitRequest {
        SubmitRequest {
            client_order_id: "test".to_string(),
            symbol: "BTC/USD".to_string(),
            side: OrderSide::Sell,
            amount,
            limit_price: dec!(100),
        }
    }

    #[tokio::test]
    async fn fills_fully_at_limit_price() {
        let venue = PaperVenue::new();
        let fill = venue.submit(&request(dec!(10))).await.unwrap();
        assert_eq!(fill.filled_amount, dec!(10));
        assert_eq!(fill.average_price, dec!(100));
    }

    #[tokio::test]
    async fn partial_fill_ratio() {
        let venue = PaperVenue::with_fill_ratio(dec!(0.4));
        let fill = venue.submit(&request(dec!(10))).await.unwrap();
        assert_eq!(fill.filled_amount, dec!(4.0));
    }
}
