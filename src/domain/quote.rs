use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One price observation for a symbol delivered to the evaluation pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceTick {
    pub symbol: String,
    pub price: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl PriceTick {
    pub fn new(symbol: impl Into<String>, price: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            price,
            timestamp: Utc::now(),
        }
    }
}

/// A verified, executable quote from one provider (ephemeral, not persisted).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceQuote {
    /// Provider identifier the price came from
    pub provider: String,
    pub price: Decimal,
    /// Signed deviation from the independent reference spot price
    pub price_impact_pct: Decimal,
    pub liquidity_usd: Option<Decimal>,
    pub fetched_at: DateTime<Utc>,
    /// Freshness window in milliseconds
    pub ttl_ms: i64,
}

impl PriceQuote {
    /// Still usable within the same evaluation burst?
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        now - self.fetched_at < Duration::milliseconds(self.ttl_ms)
    }

    #[cfg(test)]
    pub fn test_quote(provider: &str, price: Decimal) -> Self {
        Self {
            provider: provider.to_string(),
            price,
            price_impact_pct: Decimal::ZERO,
            liquidity_usd: None,
            fetched_at: Utc::now(),
            ttl_ms: 2_000,
        }
    }
}
