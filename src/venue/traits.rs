use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::domain::OrderSide;
use crate::error::Result;

/// Settlement request handed to the venue.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    pub client_order_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub amount: Decimal,
    pub limit_price: Decimal,
}

/// Fill outcome reported by the venue.
#[derive(Debug, Clone)]
pub struct FillReport {
    pub venue_order_id: String,
    pub filled_amount: Decimal,
    pub average_price: Decimal,
}

/// Venue-specific settlement seam. Retried by the caller only up to a
/// bounded attempt count.
#[async_trait]
pub trait ExecutionVenue: Send + Sync {
    fn name(&self) -> &str;

    fn is_paper(&self) -> bool;

    async fn submit(&self, request: &SubmitRequest) -> Result<FillReport>;
}
