use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::PriceQuote;

/// Main error type for the execution core
#[derive(Error, Debug)]
pub enum OrdexError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    // Network errors
    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    // Serialization errors
    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    // Price discovery errors
    #[error(transparent)]
    Quote(#[from] QuoteError),

    #[error("Invalid market data: {0}")]
    InvalidMarketData(String),

    // Order errors
    #[error(transparent)]
    Order(#[from] OrderError),

    // State machine errors
    #[error("Invalid state transition: from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    // Data/programming errors: raised loudly, never swallowed
    #[error("Invalid order {order_id}: {reason}")]
    InvalidOrder { order_id: i64, reason: String },

    #[error("Idempotency conflict on key {key}: record owned by user {record_user}, caller {caller_user}")]
    IdempotencyConflict {
        key: String,
        record_user: i64,
        caller_user: i64,
    },

    // Validation errors
    #[error("Validation failed: {0}")]
    Validation(String),

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // Generic errors
    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

/// Result type alias for OrdexError
pub type Result<T> = std::result::Result<T, OrdexError>;

/// Errors surfaced by the price aggregator.
///
/// The coordinator branches on these variants, so they stay a separate enum
/// rather than strings inside [`OrdexError`].
#[derive(Error, Debug, Clone)]
pub enum QuoteError {
    #[error("Provider {provider} failed: {reason}")]
    ProviderFailed { provider: String, reason: String },

    #[error("Provider {provider} timed out after {timeout_ms}ms")]
    ProviderTimeout { provider: String, timeout_ms: u64 },

    #[error("All {attempted} price providers unavailable for {symbol}")]
    AllProvidersUnavailable { symbol: String, attempted: usize },

    #[error("Slippage {actual_pct}% exceeds {limit_pct}% limit")]
    SlippageExceeded {
        quote: PriceQuote,
        actual_pct: Decimal,
        limit_pct: Decimal,
    },
}

/// Specific error types for order execution
#[derive(Error, Debug, Clone)]
pub enum OrderError {
    #[error("Order not found: {order_id}")]
    NotFound { order_id: i64 },

    #[error("Order submission failed: {0}")]
    SubmissionFailed(String),

    #[error("Venue rejected order: {0}")]
    Rejected(String),

    #[error("Max retries exceeded: {attempts}")]
    MaxRetriesExceeded { attempts: u8 },
}
