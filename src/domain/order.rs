use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::state::{OrderStatus, StateTransition};
use crate::error::{OrdexError, Result};

/// Order side (buy or sell)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderSide {
    Buy,
    Sell,
}

impl std::fmt::Display for OrderSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderSide::Buy => write!(f, "buy"),
            OrderSide::Sell => write!(f, "sell"),
        }
    }
}

/// Order type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    Market,
    Limit,
    StopLoss,
    TakeProfit,
    TrailingStop,
    /// Combined stop + take-profit legs in a single standing order
    Oco,
}

/// Time in force
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimeInForce {
    /// Good Till Cancelled
    GTC,
    /// Immediate Or Cancel
    IOC,
    /// Fill Or Kill
    FOK,
}

/// Trading mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TradeMode {
    Paper,
    Real,
}

/// The central entity: a standing advanced order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub user_id: i64,
    pub bot_id: Option<String>,
    /// OCO sibling; pairing is symmetric
    pub linked_order_id: Option<i64>,
    pub chain_id: u64,
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub limit_price: Option<Decimal>,
    pub stop_price: Option<Decimal>,
    pub take_profit_price: Option<Decimal>,
    pub trailing_percent: Option<Decimal>,
    pub trailing_amount: Option<Decimal>,
    /// Sell-side trailing watermark, non-decreasing while open
    pub highest_price: Option<Decimal>,
    /// Buy-side trailing watermark, non-increasing while open
    pub lowest_price: Option<Decimal>,
    pub requested_amount: Decimal,
    pub filled_amount: Decimal,
    pub average_fill_price: Option<Decimal>,
    /// Per-order override of the global slippage ceiling
    pub max_slippage_pct: Option<Decimal>,
    pub time_in_force: TimeInForce,
    pub expires_at: Option<DateTime<Utc>>,
    pub mode: TradeMode,
    pub status: OrderStatus,
    /// Why execution is currently withheld or failed, queryable at any time
    pub status_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    fn base(
        user_id: i64,
        symbol: impl Into<String>,
        side: OrderSide,
        order_type: OrderType,
        amount: Decimal,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            user_id,
            bot_id: None,
            linked_order_id: None,
            chain_id: 1,
            symbol: symbol.into(),
            side,
            order_type,
            limit_price: None,
            stop_price: None,
            take_profit_price: None,
            trailing_percent: None,
            trailing_amount: None,
            highest_price: None,
            lowest_price: None,
            requested_amount: amount,
            filled_amount: Decimal::ZERO,
            average_fill_price: None,
            max_slippage_pct: None,
            time_in_force: TimeInForce::GTC,
            expires_at: None,
            mode: TradeMode::Paper,
            // Trigger-type orders open directly; nothing to acknowledge
            // until triggered.
            status: OrderStatus::Open,
            status_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn limit(
        user_id: i64,
        symbol: impl Into<String>,
        side: OrderSide,
        amount: Decimal,
        limit_price: Decimal,
    ) -> Self {
        let mut order = Self::base(user_id, symbol, side, OrderType::Limit, amount);
        order.limit_price = Some(limit_price);
        order.status = OrderStatus::Pending;
        order
    }

    pub fn stop_loss(
        user_id: i64,
        symbol: impl Into<String>,
        side: OrderSide,
        amount: Decimal,
        stop_price: Decimal,
    ) -> Self {
        let mut order = Self::base(user_id, symbol, side, OrderType::StopLoss, amount);
        order.stop_price = Some(stop_price);
        order
    }

    pub fn take_profit(
        user_id: i64,
        symbol: impl Into<String>,
        side: OrderSide,
        amount: Decimal,
        take_profit_price: Decimal,
    ) -> Self {
        let mut order = Self::base(user_id, symbol, side, OrderType::TakeProfit, amount);
        order.take_profit_price = Some(take_profit_price);
        order
    }

    /// Exactly one of `trailing_percent` / `trailing_amount` must be given;
    /// `validate` enforces it.
    pub fn trailing_stop(
        user_id: i64,
        symbol: impl Into<String>,
        side: OrderSide,
        amount: Decimal,
        trailing_percent: Option<Decimal>,
        trailing_amount: Option<Decimal>,
    ) -> Self {
        let mut order = Self::base(user_id, symbol, side, OrderType::TrailingStop, amount);
        order.trailing_percent = trailing_percent;
        order.trailing_amount = trailing_amount;
        order
    }

    /// Build a linked stop-loss / take-profit pair. Link back-pointers are
    /// filled in once the store has assigned ids, via [`Order::link_pair`].
    pub fn oco_pair(
        user_id: i64,
        symbol: impl Into<String>,
        side: OrderSide,
        amount: Decimal,
        stop_price: Decimal,
        take_profit_price: Decimal,
    ) -> (Self, Self) {
        let symbol = symbol.into();
        let stop = Self::stop_loss(user_id, symbol.clone(), side, amount, stop_price);
        let tp = Self::take_profit(user_id, symbol, side, amount, take_profit_price);
        (stop, tp)
    }

    /// Establish the symmetric OCO linkage between two persisted orders.
    pub fn link_pair(a: &mut Order, b: &mut Order) {
        a.linked_order_id = Some(b.id);
        b.linked_order_id = Some(a.id);
    }

    pub fn remaining_amount(&self) -> Decimal {
        self.requested_amount - self.filled_amount
    }

    pub fn is_fully_filled(&self) -> bool {
        self.filled_amount >= self.requested_amount
    }

    /// Accumulate a (possibly partial) fill into the running totals.
    pub fn apply_fill(&mut self, filled: Decimal, price: Decimal) {
        let prior_value = self
            .average_fill_price
            .map(|p| p * self.filled_amount)
            .unwrap_or(Decimal::ZERO);
        let new_total = self.filled_amount + filled;
        if new_total > Decimal::ZERO {
            self.average_fill_price = Some((prior_value + price * filled) / new_total);
        }
        self.filled_amount = new_total;
        self.touch();
    }

    /// Validated state transition; illegal targets are rejected and never
    /// silently ignored.
    pub fn transition(
        &mut self,
        to: OrderStatus,
        reason: impl Into<String>,
    ) -> Result<StateTransition> {
        if !self.status.can_transition_to(to) {
            return Err(OrdexError::InvalidStateTransition {
                from: self.status.to_string(),
                to: to.to_string(),
            });
        }
        let event = StateTransition::new(self.id, self.status, to, reason);
        self.status = to;
        self.touch();
        Ok(event)
    }

    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Enforce the data-model invariants. A violation is a data error, not a
    /// runtime condition: the caller must exclude the order from further
    /// automatic evaluation.
    pub fn validate(&self) -> Result<()> {
        let fail = |reason: &str| {
            Err(OrdexError::InvalidOrder {
                order_id: self.id,
                reason: reason.to_string(),
            })
        };

        if self.requested_amount <= Decimal::ZERO {
            return fail("requested_amount must be positive");
        }
        if self.filled_amount < Decimal::ZERO || self.filled_amount > self.requested_amount {
            return fail("filled_amount out of [0, requested_amount]");
        }

        let has_limit = self.limit_price.is_some();
        let has_stop = self.stop_price.is_some();
        let has_tp = self.take_profit_price.is_some();
        let has_trailing = self.trailing_percent.is_some() || self.trailing_amount.is_some();

        if self.trailing_percent.is_some() && self.trailing_amount.is_some() {
            return fail("trailing_percent and trailing_amount are mutually exclusive");
        }

        // Exactly the parameter family the type calls for, nothing else
        let consistent = match self.order_type {
            OrderType::Market => !has_limit && !has_stop && !has_tp && !has_trailing,
            OrderType::Limit => has_limit && !has_stop && !has_tp && !has_trailing,
            OrderType::StopLoss => has_stop && !has_limit && !has_tp && !has_trailing,
            OrderType::TakeProfit => has_tp && !has_limit && !has_stop && !has_trailing,
            OrderType::TrailingStop => has_trailing && !has_limit && !has_stop && !has_tp,
            OrderType::Oco => has_stop && has_tp && !has_limit && !has_trailing,
        };
        if !consistent {
            return fail("trigger parameters inconsistent with order type");
        }

        if let Some(pct) = self.trailing_percent {
            if pct <= Decimal::ZERO || pct >= Decimal::ONE {
                return fail("trailing_percent must be a fraction in (0, 1)");
            }
        }
        if let Some(amt) = self.trailing_amount {
            if amt <= Decimal::ZERO {
                return fail("trailing_amount must be positive");
            }
        }

        Ok(())
    }
}
