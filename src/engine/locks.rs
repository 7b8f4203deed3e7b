use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};

/// Per-order exclusion table.
///
/// Each order's evaluation must be serialized with respect to itself; OCO
/// pairs need joint exclusion. Pair acquisition always locks the lower order
/// id first, which is what prevents both the deadlock and the "both siblings
/// filled" race.
#[derive(Default)]
pub struct OrderLockTable {
    locks: DashMap<i64, Arc<Mutex<()>>>,
}

/// Guards held for the duration of one evaluation.
pub struct OrderGuard {
    _guards: Vec<OwnedMutexGuard<()>>,
}

impl OrderLockTable {
    pub fn new() -> Self {
        Self::default()
    }

    fn entry(&self, order_id: i64) -> Arc<Mutex<()>> {
        self.locks
            .entry(order_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Exclusive section for a single order.
    pub async fn acquire(&self, order_id: i64) -> OrderGuard {
        let guard = self.entry(order_id).lock_owned().await;
        OrderGuard {
            _guards: vec![guard],
        }
    }

    /// Joint exclusive section for an OCO pair, acquired in ascending-id
    /// order regardless of which sibling is being evaluated.
    pub async fn acquire_pair(&self, a: i64, b: i64) -> OrderGuard {
        if a == b {
            return self.acquire(a).await;
        }
        let (first, second) = if a < b { (a, b) } else { (b, a) };
        let g1 = self.entry(first).lock_owned().await;
        let g2 = self.entry(second).lock_owned().await;
        OrderGuard {
            _guards: vec![g1, g2],
        }
    }
}
