//! Order persistence seam.
//!
//! Real deployments put a database behind [`OrderStore`]; the core only
//! requires that `save` observed under the per-order exclusive section is
//! atomic with respect to other evaluations of the same order.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use crate::domain::Order;
use crate::error::{OrderError, Result};

#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn load(&self, order_id: i64) -> Result<Order>;

    async fn save(&self, order: &Order) -> Result<()>;

    /// Persist a new order, assigning its id.
    async fn insert(&self, order: Order) -> Result<Order>;

    /// Ids of non-terminal orders standing on a symbol, for tick fan-out.
    async fn active_order_ids(&self, symbol: &str) -> Result<Vec<i64>>;
}

/// In-memory store for tests and the paper demo.
pub struct MemoryOrderStore {
    orders: DashMap<i64, Order>,
    next_id: AtomicI64,
}

impl MemoryOrderStore {
    pub fn new() -> Self {
        Self {
            orders: DashMap::new(),
            next_id: AtomicI64::new(1),
        }
    }
}

impl Default for MemoryOrderStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn load(&self, order_id: i64) -> Result<Order> {
        self.orders
            .get(&order_id)
            .map(|o| o.clone())
            .ok_or_else(|| OrderError::NotFound { order_id }.into())
    }

    async fn save(&self, order: &Order) -> Result<()> {
        if !self.orders.contains_key(&order.id) {
            return Err(OrderError::NotFound { order_id: order.id }.into());
        }
        self.orders.insert(order.id, order.clone());
        Ok(())
    }

    async fn insert(&self, mut order: Order) -> Result<Order> {
        if order.id == 0 {
            order.id = self.next_id.fetch_add(1, Ordering::SeqCst);
        }
        self.orders.insert(order.id, order.clone());
        Ok(order)
    }

    async fn active_order_ids(&self, symbol: &str) -> Result<Vec<i64>> {
        let mut ids: Vec<i64> = self
            .orders
            .iter()
            .filter(|entry| entry.symbol == symbol && !entry.status.is_terminal())
            .map(|entry| entry.id)
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::OrderSide;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn insert_assigns_ids_and_load_round_trips() {
        let store = MemoryOrderStore::new();
        let order = Order::stop_loss(1, "BTC/USD", OrderSide::Sell, dec!(10), dec!(95));
        let order = store.insert(order).await.unwrap();
        assert!(order.id > 0);

        let loaded = store.load(order.id).await.unwrap();
        assert_eq!(loaded.stop_price, Some(dec!(95)));
    }

    #[tokio::test]
    async fn active_ids_skip_terminal_orders() {
        let store = MemoryOrderStore::new();
        let open = store
            .insert(Order::stop_loss(1, "BTC/USD", OrderSide::Sell, dec!(1), dec!(95)))
            .await
            .unwrap();
        let mut done = Order::stop_loss(1, "BTC/USD", OrderSide::Sell, dec!(1), dec!(95));
        done.status = crate::domain::OrderStatus::Cancelled;
        store.insert(done).await.unwrap();
        store
            .insert(Order::stop_loss(1, "ETH/USD", OrderSide::Sell, dec!(1), dec!(95)))
            .await
            .unwrap();

        let ids = store.active_order_ids("BTC/USD").await.unwrap();
        assert_eq!(ids, vec![open.id]);
    }

    #[tokio::test]
    async fn save_unknown_order_errors() {
        let store = MemoryOrderStore::new();
        let mut order = Order::stop_loss(1, "BTC/USD", OrderSide::Sell, dec!(1), dec!(95));
        order.id = 999;
        assert!(store.save(&order).await.is_err());
    }
}
