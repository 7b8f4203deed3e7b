use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::domain::PriceTick;
use crate::engine::{Evaluation, ExecutionCoordinator, IdempotencyGuard};
use crate::error::OrdexError;
use crate::store::OrderStore;

/// Drives order evaluation: consumes price ticks and evaluates every
/// active order on the tick's symbol through the coordinator.
///
/// Orders whose stored data fails validation are quarantined and skipped on
/// later ticks; their state is never mutated automatically.
pub struct TickMonitor {
    coordinator: Arc<ExecutionCoordinator>,
    store: Arc<dyn OrderStore>,
    idempotency: Arc<IdempotencyGuard>,
    quarantined: DashMap<i64, String>,
    sweep_interval: Duration,
    running: AtomicBool,
    ticks_processed: AtomicU64,
    executions: AtomicU64,
}

/// Point-in-time monitor counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorStats {
    pub ticks_processed: u64,
    pub executions: u64,
    pub quarantined: usize,
}

impl TickMonitor {
    pub fn new(
        coordinator: Arc<ExecutionCoordinator>,
        store: Arc<dyn OrderStore>,
        idempotency: Arc<IdempotencyGuard>,
        sweep_interval: Duration,
    ) -> Self {
        Self {
            coordinator,
            store,
            idempotency,
            quarantined: DashMap::new(),
            sweep_interval,
            running: AtomicBool::new(false),
            ticks_processed: AtomicU64::new(0),
            executions: AtomicU64::new(0),
        }
    }

    pub fn stats(&self) -> MonitorStats {
        MonitorStats {
            ticks_processed: self.ticks_processed.load(Ordering::Relaxed),
            executions: self.executions.load(Ordering::Relaxed),
            quarantined: self.quarantined.len(),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub fn shutdown(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn quarantined_ids(&self) -> Vec<i64> {
        self.quarantined.iter().map(|e| *e.key()).collect()
    }

    /// Run until the tick channel closes or [`TickMonitor::shutdown`] is
    /// called. Expired idempotency records are swept on a fixed interval.
    pub async fn run(&self, mut ticks: mpsc::Receiver<PriceTick>) {
        self.running.store(true, Ordering::SeqCst);
        let mut sweep = tokio::time::interval(self.sweep_interval);
        sweep.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        info!("tick monitor started");

        while self.is_running() {
            tokio::select! {
                maybe_tick = ticks.recv() => match maybe_tick {
                    Some(tick) => self.process_tick(&tick).await,
                    None => break,
                },
                _ = sweep.tick() => {
                    self.idempotency.sweep_expired();
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        info!("tick monitor stopped");
    }

    pub async fn process_tick(&self, tick: &PriceTick) {
        self.ticks_processed.fetch_add(1, Ordering::Relaxed);
        let ids = match self.store.active_order_ids(&tick.symbol).await {
            Ok(ids) => ids,
            Err(e) => {
                error!(symbol = %tick.symbol, error = %e, "failed to list active orders");
                return;
            }
        };

        for order_id in ids {
            if self.quarantined.contains_key(&order_id) {
                continue;
            }

            match self.coordinator.evaluate(order_id, tick).await {
                Ok(Evaluation::Executed(outcome)) => {
                    self.executions.fetch_add(1, Ordering::Relaxed);
                    info!(
                        order_id,
                        execution_id = %outcome.execution_id,
                        filled = %outcome.filled_amount,
                        "order executed"
                    );
                }
                Ok(Evaluation::Withheld { actual_pct, limit_pct }) => {
                    warn!(
                        order_id,
                        actual_pct = %actual_pct,
                        limit_pct = %limit_pct,
                        "execution withheld on slippage"
                    );
                }
                Ok(evaluation) => {
                    debug!(order_id, ?evaluation, "order evaluated");
                }
                Err(OrdexError::InvalidOrder { reason, .. }) => {
                    // Data error, not a runtime condition: exclude from
                    // further automatic evaluation, never mutate state.
                    warn!(order_id, %reason, "invalid order quarantined");
                    self.quarantined.insert(order_id, reason);
                }
                Err(e) => {
                    error!(order_id, error = %e, "order evaluation failed");
                }
            }
        }
    }
}
