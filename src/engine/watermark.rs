use rust_decimal::Decimal;

use crate::domain::{Order, OrderSide};
use crate::error::{OrdexError, Result};

/// Outcome of applying one tick to a trailing stop's watermark.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatermarkUpdate {
    /// The post-update watermark (highest seen for sells, lowest for buys)
    pub watermark: Decimal,
    /// Dynamic trigger computed from the watermark
    pub trigger_price: Decimal,
    pub crossed: bool,
}

/// Compute the new watermark and trailing trigger for one tick.
///
/// Pure given `(order watermark, current_price)`. The watermark is applied
/// before the crossing check and can never move backward: out-of-order ticks
/// degrade to no-ops via max/min, not assignment.
pub fn update_watermark(order: &Order, current_price: Decimal) -> Result<WatermarkUpdate> {
    let invalid = |reason: &str| OrdexError::InvalidOrder {
        order_id: order.id,
        reason: reason.to_string(),
    };

    let offset = |reference: Decimal| -> Result<Decimal> {
        if let Some(pct) = order.trailing_percent {
            Ok(reference * pct)
        } else if let Some(amount) = order.trailing_amount {
            Ok(amount)
        } else {
            Err(invalid("trailing order without percent or amount"))
        }
    };

    match order.side {
        OrderSide::Sell => {
            let watermark = order
                .highest_price
                .map_or(current_price, |h| h.max(current_price));
            let trigger_price = watermark - offset(watermark)?;
            Ok(WatermarkUpdate {
                watermark,
                trigger_price,
                crossed: current_price <= trigger_price,
            })
        }
        OrderSide::Buy => {
            let watermark = order
                .lowest_price
                .map_or(current_price, |l| l.min(current_price));
            let trigger_price = watermark + offset(watermark)?;
            Ok(WatermarkUpdate {
                watermark,
                trigger_price,
                crossed: current_price >= trigger_price,
            })
        }
    }
}
