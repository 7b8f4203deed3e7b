use serde::{Deserialize, Serialize};
use std::fmt;

/// Order lifecycle states
///
/// `Pending` and `Open` are functionally equivalent; `Pending` denotes "not
/// yet acknowledged by the venue" for limit/market orders. Trigger-type
/// orders (stop/trailing) open directly since there is nothing to
/// acknowledge until triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Created, not yet acknowledged by the venue
    Pending,
    /// Standing, evaluated against price ticks
    Open,
    /// Trigger condition crossed, execution in flight or withheld
    Triggered,
    /// Partially executed, remainder still working
    PartiallyFilled,
    /// Fully executed
    Filled,
    /// Cancelled (user action or OCO sibling fill)
    Cancelled,
    /// Lapsed via time_in_force / expires_at
    Expired,
    /// Execution failed after exhausting retries
    Failed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pending => "PENDING",
            OrderStatus::Open => "OPEN",
            OrderStatus::Triggered => "TRIGGERED",
            OrderStatus::PartiallyFilled => "PARTIALLY_FILLED",
            OrderStatus::Filled => "FILLED",
            OrderStatus::Cancelled => "CANCELLED",
            OrderStatus::Expired => "EXPIRED",
            OrderStatus::Failed => "FAILED",
        }
    }

    /// Static transition table; everything not listed here is illegal.
    ///
    /// `Failed` is terminal for the trigger event: `Failed -> Open` is not
    /// permitted (manual reopen is an operator action outside this core).
    pub fn can_transition_to(&self, target: OrderStatus) -> bool {
        use OrderStatus::*;

        match (self, target) {
            // From Pending (venue ack, direct trigger, or early exit)
            (Pending, Open) => true,
            (Pending, Triggered) => true,
            (Pending, Cancelled) => true,
            (Pending, Expired) => true,

            // From Open
            (Open, Triggered) => true,
            (Open, Cancelled) => true,
            (Open, Expired) => true,

            // From Triggered
            (Triggered, PartiallyFilled) => true,
            (Triggered, Filled) => true,
            (Triggered, Failed) => true,
            (Triggered, Cancelled) => true, // OCO sibling filled first
            (Triggered, Expired) => true,   // slippage never cleared

            // From PartiallyFilled (repeated partial fills accumulate)
            (PartiallyFilled, PartiallyFilled) => true,
            (PartiallyFilled, Filled) => true,
            (PartiallyFilled, Failed) => true,
            (PartiallyFilled, Cancelled) => true,

            // All other transitions are invalid
            _ => false,
        }
    }

    /// Get valid next states from current state
    pub fn valid_transitions(&self) -> Vec<OrderStatus> {
        use OrderStatus::*;

        match self {
            Pending => vec![Open, Triggered, Cancelled, Expired],
            Open => vec![Triggered, Cancelled, Expired],
            Triggered => vec![PartiallyFilled, Filled, Failed, Cancelled, Expired],
            PartiallyFilled => vec![PartiallyFilled, Filled, Failed, Cancelled],
            Filled | Cancelled | Expired | Failed => vec![],
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            OrderStatus::Filled | OrderStatus::Cancelled | OrderStatus::Expired | OrderStatus::Failed
        )
    }

    /// Still standing and waiting for its trigger condition?
    pub fn is_evaluatable(&self) -> bool {
        matches!(self, OrderStatus::Pending | OrderStatus::Open)
    }

    /// Can this order still be cancelled (e.g. by an OCO sibling fill)?
    pub fn is_cancellable(&self) -> bool {
        matches!(
            self,
            OrderStatus::Pending
                | OrderStatus::Open
                | OrderStatus::Triggered
                | OrderStatus::PartiallyFilled
        )
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl TryFrom<&str> for OrderStatus {
    type Error = String;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        match s.to_uppercase().as_str() {
            "PENDING" => Ok(OrderStatus::Pending),
            "OPEN" => Ok(OrderStatus::Open),
            "TRIGGERED" => Ok(OrderStatus::Triggered),
            "PARTIALLY_FILLED" => Ok(OrderStatus::PartiallyFilled),
            "FILLED" => Ok(OrderStatus::Filled),
            "CANCELLED" => Ok(OrderStatus::Cancelled),
            "EXPIRED" => Ok(OrderStatus::Expired),
            "FAILED" => Ok(OrderStatus::Failed),
            _ => Err(format!("Unknown status: {}", s)),
        }
    }
}

/// State transition event, published to the audit sink
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateTransition {
    pub order_id: i64,
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub reason: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl StateTransition {
    pub fn new(order_id: i64, from: OrderStatus, to: OrderStatus, reason: impl Into<String>) -> Self {
        Self {
            order_id,
            from,
            to,
            reason: reason.into(),
            timestamp: chrono::Utc::now(),
        }
    }
}
