use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::config::AggregatorConfig;
use crate::domain::{OrderSide, PriceQuote};
use crate::error::QuoteError;
use crate::pricing::provider::{QuoteProvider, SpotPriceSource};

/// Multi-provider price discovery with fallback and slippage protection.
///
/// Providers are called sequentially in priority order, each bounded by a
/// per-provider timeout. A failed provider is never retried within the same
/// call; the chain simply advances. The reference spot price is fetched in
/// parallel so the impact computation adds no latency of its own.
pub struct PriceAggregator {
    providers: Vec<Arc<dyn QuoteProvider>>,
    spot_source: Arc<dyn SpotPriceSource>,
    config: AggregatorConfig,
    /// Successful quotes only; failures are never cached
    cache: dashmap::DashMap<(String, OrderSide), PriceQuote>,
}

impl PriceAggregator {
    pub fn new(
        providers: Vec<Arc<dyn QuoteProvider>>,
        spot_source: Arc<dyn SpotPriceSource>,
        config: AggregatorConfig,
    ) -> Self {
        Self {
            providers,
            spot_source,
            config,
            cache: dashmap::DashMap::new(),
        }
    }

    /// Fetch a verified, executable quote.
    ///
    /// `max_slippage_pct` is the effective ceiling for this call (per-order
    /// override or the global default). A quote whose absolute price impact
    /// exceeds it is returned inside [`QuoteError::SlippageExceeded`] so the
    /// caller can decide whether to reject or wait for better liquidity.
    pub async fn get_quote(
        &self,
        symbol: &str,
        side: OrderSide,
        amount: Decimal,
        max_slippage_pct: Decimal,
    ) -> Result<PriceQuote, QuoteError> {
        let now = Utc::now();
        if let Some(cached) = self.cache.get(&(symbol.to_string(), side)) {
            if cached.is_fresh(now) {
                debug!(symbol, provider = %cached.provider, "quote cache hit");
                return Self::check_slippage(cached.clone(), max_slippage_pct);
            }
        }

        let per_call = Duration::from_millis(self.config.provider_timeout_ms);

        // Reference spot runs concurrently with the provider chain
        let spot_source = Arc::clone(&self.spot_source);
        let spot_symbol = symbol.to_string();
        let spot_handle =
            tokio::spawn(async move { timeout(per_call, spot_source.spot(&spot_symbol)).await });

        let mut winner = None;
        for provider in &self.providers {
            match timeout(per_call, provider.quote(symbol, side, amount)).await {
                Ok(Ok(quote)) => {
                    debug!(symbol, provider = provider.name(), price = %quote.price, "quote obtained");
                    winner = Some((provider.name().to_string(), quote));
                    break;
                }
                Ok(Err(e)) => {
                    warn!(symbol, provider = provider.name(), error = %e, "provider failed, advancing");
                }
                Err(_) => {
                    warn!(
                        symbol,
                        provider = provider.name(),
                        timeout_ms = self.config.provider_timeout_ms,
                        "provider timed out, advancing"
                    );
                }
            }
        }

        let Some((provider, raw)) = winner else {
            // Surfaced distinctly: the order must stay open and be retried on
            // the next tick, never silently skipped.
            return Err(QuoteError::AllProvidersUnavailable {
                symbol: symbol.to_string(),
                attempted: self.providers.len(),
            });
        };

        let price_impact_pct = match spot_handle.await {
            Ok(Ok(Ok(spot))) if spot > Decimal::ZERO => (raw.price - spot) / spot,
            Ok(Ok(Ok(_))) | Ok(Ok(Err(_))) | Ok(Err(_)) | Err(_) => {
                warn!(symbol, "reference spot unavailable, impact unknown");
                Decimal::ZERO
            }
        };

        let quote = PriceQuote {
            provider,
            price: raw.price,
            price_impact_pct,
            liquidity_usd: raw.liquidity_usd,
            fetched_at: Utc::now(),
            ttl_ms: self.config.quote_ttl_ms as i64,
        };

        self.cache
            .insert((symbol.to_string(), side), quote.clone());

        Self::check_slippage(quote, max_slippage_pct)
    }

    fn check_slippage(
        quote: PriceQuote,
        max_slippage_pct: Decimal,
    ) -> Result<PriceQuote, QuoteError> {
        let actual = quote.price_impact_pct.abs();
        if actual > max_slippage_pct {
            return Err(QuoteError::SlippageExceeded {
                actual_pct: actual * rust_decimal_macros::dec!(100),
                limit_pct: max_slippage_pct * rust_decimal_macros::dec!(100),
                quote,
            });
        }
        Ok(quote)
    }

    pub fn provider_names(&self) -> Vec<&str> {
        self.providers.iter().map(|p| p.name()).collect()
    }
}
