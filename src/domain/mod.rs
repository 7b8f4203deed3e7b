//! Domain model: orders, lifecycle states, quotes and ticks.

pub mod order;
pub mod quote;
pub mod state;

pub use order::{Order, OrderSide, OrderType, TimeInForce, TradeMode};
pub use quote::{PriceQuote, PriceTick};
pub use state::{OrderStatus, StateTransition};
