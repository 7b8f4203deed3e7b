use rust_decimal::Decimal;

use crate::domain::{Order, OrderSide, OrderType};
use crate::engine::watermark::update_watermark;
use crate::error::{OrdexError, Result};

/// Result of evaluating one tick against an order's trigger condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerDecision {
    NotTriggered,
    Triggered { trigger_price: Decimal },
}

/// Single dispatch over the closed set of order types.
///
/// For trailing stops this also advances the order's watermark (the update
/// is applied before the crossing check); all other arms leave the order
/// untouched. Missing trigger parameters are data errors, not "no trigger".
pub fn evaluate_trigger(order: &mut Order, price: Decimal) -> Result<TriggerDecision> {
    let missing = |field: &str| OrdexError::InvalidOrder {
        order_id: order.id,
        reason: format!("{} required for {:?} order", field, order.order_type),
    };

    let decision = match order.order_type {
        // Market orders execute on the next tick unconditionally
        OrderType::Market => TriggerDecision::Triggered {
            trigger_price: price,
        },

        OrderType::Limit => {
            let limit = order.limit_price.ok_or_else(|| missing("limit_price"))?;
            let crossed = match order.side {
                OrderSide::Buy => price <= limit,
                OrderSide::Sell => price >= limit,
            };
            if crossed {
                TriggerDecision::Triggered {
                    trigger_price: limit,
                }
            } else {
                TriggerDecision::NotTriggered
            }
        }

        OrderType::StopLoss => {
            let stop = order.stop_price.ok_or_else(|| missing("stop_price"))?;
            if stop_crossed(order.side, stop, price) {
                TriggerDecision::Triggered {
                    trigger_price: stop,
                }
            } else {
                TriggerDecision::NotTriggered
            }
        }

        OrderType::TakeProfit => {
            let tp = order
                .take_profit_price
                .ok_or_else(|| missing("take_profit_price"))?;
            if take_profit_crossed(order.side, tp, price) {
                TriggerDecision::Triggered { trigger_price: tp }
            } else {
                TriggerDecision::NotTriggered
            }
        }

        OrderType::TrailingStop => {
            let update = update_watermark(order, price)?;
            match order.side {
                OrderSide::Sell => order.highest_price = Some(update.watermark),
                OrderSide::Buy => order.lowest_price = Some(update.watermark),
            }
            if update.crossed {
                TriggerDecision::Triggered {
                    trigger_price: update.trigger_price,
                }
            } else {
                TriggerDecision::NotTriggered
            }
        }

        // Combined order: either leg crossing fires the whole order
        OrderType::Oco => {
            let stop = order.stop_price.ok_or_else(|| missing("stop_price"))?;
            let tp = order
                .take_profit_price
                .ok_or_else(|| missing("take_profit_price"))?;
            if stop_crossed(order.side, stop, price) {
                TriggerDecision::Triggered {
                    trigger_price: stop,
                }
            } else if take_profit_crossed(order.side, tp, price) {
                TriggerDecision::Triggered { trigger_price: tp }
            } else {
                TriggerDecision::NotTriggered
            }
        }
    };

    Ok(decision)
}

fn stop_crossed(side: OrderSide, stop: Decimal, price: Decimal) -> bool {
    match side {
        OrderSide::Sell => price <= stop,
        OrderSide::Buy => price >= stop,
    }
}

fn take_profit_crossed(side: OrderSide, tp: Decimal, price: Decimal) -> bool {
    match side {
        OrderSide::Sell => price >= tp,
        OrderSide::Buy => price <= tp,
    }
}
