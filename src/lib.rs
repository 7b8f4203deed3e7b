pub mod config;
pub mod domain;
pub mod engine;
pub mod error;
pub mod pricing;
pub mod services;
pub mod store;
pub mod venue;

pub use config::AppConfig;
pub use domain::{
    Order, OrderSide, OrderStatus, OrderType, PriceQuote, PriceTick, StateTransition,
    TimeInForce, TradeMode,
};
pub use engine::{
    Evaluation, ExecutionCoordinator, ExecutionOutcome, IdempotencyGuard, OcoResolver,
    OrderLockTable,
};
pub use error::{OrderError, OrdexError, QuoteError, Result};
pub use pricing::{PriceAggregator, QuoteProvider, SpotPriceSource, SyntheticMarket};
pub use services::{AuditEvent, AuditSink, ChannelAuditSink, TickMonitor, TracingAuditSink};
pub use store::{MemoryOrderStore, OrderStore};
pub use venue::{ExecutionVenue, FillReport, PaperVenue, RetryingSubmitter, SubmitRequest};
