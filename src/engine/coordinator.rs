use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::ExecutionConfig;
use crate::domain::{Order, OrderStatus, PriceTick};
use crate::engine::idempotency::IdempotencyGuard;
use crate::engine::locks::OrderLockTable;
use crate::engine::oco::OcoResolver;
use crate::engine::trigger::{evaluate_trigger, TriggerDecision};
use crate::error::{QuoteError, Result};
use crate::pricing::PriceAggregator;
use crate::services::audit::{AuditEvent, AuditSink};
use crate::store::OrderStore;
use crate::venue::{RetryingSubmitter, SubmitRequest};

/// Terminal record of one execution attempt; serialized into the
/// idempotency store so replays can reproduce the exact outcome.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    pub execution_id: String,
    pub venue_order_id: Option<String>,
    pub status: OrderStatus,
    pub filled_amount: Decimal,
    pub average_fill_price: Option<Decimal>,
    pub quote_price: Decimal,
    pub executed_at: DateTime<Utc>,
}

/// What one tick evaluation did to an order.
#[derive(Debug, Clone, PartialEq)]
pub enum Evaluation {
    /// Order is not in an evaluatable state (or tick is irrelevant)
    Skipped { status: OrderStatus },
    Expired,
    NotTriggered,
    /// Transient condition; state unchanged, re-evaluated next tick
    Deferred { reason: String },
    /// Triggered but execution withheld until slippage clears or expiry
    Withheld {
        actual_pct: Decimal,
        limit_pct: Decimal,
    },
    Executed(ExecutionOutcome),
    /// Idempotency hit: cached outcome applied, nothing resubmitted
    Replayed(ExecutionOutcome),
    Failed { reason: String },
}

/// Orchestrates one order evaluation per tick: trigger check, verified
/// quote, idempotency, submission, state commit, OCO resolution.
///
/// Every evaluation runs inside the order's exclusive section (the joint
/// pair section for OCO-linked orders), so the state transition and the
/// idempotency write commit together before any concurrent evaluation of
/// the same order can observe them.
pub struct ExecutionCoordinator {
    store: Arc<dyn OrderStore>,
    aggregator: Arc<PriceAggregator>,
    idempotency: Arc<IdempotencyGuard>,
    submitter: RetryingSubmitter,
    oco: OcoResolver,
    audit: Arc<dyn AuditSink>,
    locks: Arc<OrderLockTable>,
    config: ExecutionConfig,
}

impl ExecutionCoordinator {
    pub fn new(
        store: Arc<dyn OrderStore>,
        aggregator: Arc<PriceAggregator>,
        idempotency: Arc<IdempotencyGuard>,
        submitter: RetryingSubmitter,
        audit: Arc<dyn AuditSink>,
        config: ExecutionConfig,
    ) -> Self {
        let oco = OcoResolver::new(Arc::clone(&store), Arc::clone(&audit));
        Self {
            store,
            aggregator,
            idempotency,
            submitter,
            oco,
            audit,
            locks: Arc::new(OrderLockTable::new()),
            config,
        }
    }

    /// Evaluate one tick against one order, bounded by the tick budget.
    ///
    /// Exhausting the budget abandons the evaluation for this tick with the
    /// order state unchanged; it is re-evaluated on the next tick.
    pub async fn evaluate(&self, order_id: i64, tick: &PriceTick) -> Result<Evaluation> {
        let budget = Duration::from_millis(self.config.tick_budget_ms);
        match timeout(budget, self.evaluate_locked(order_id, tick)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(
                    order_id,
                    budget_ms = self.config.tick_budget_ms,
                    "tick budget exceeded, abandoning evaluation"
                );
                Ok(Evaluation::Deferred {
                    reason: "tick budget exceeded".to_string(),
                })
            }
        }
    }

    async fn evaluate_locked(&self, order_id: i64, tick: &PriceTick) -> Result<Evaluation> {
        // Probe for OCO linkage before taking locks; the pair section is
        // always acquired in ascending-id order.
        let probe = self.store.load(order_id).await?;
        let _guard = match probe.linked_order_id {
            Some(sibling_id) => self.locks.acquire_pair(order_id, sibling_id).await,
            None => self.locks.acquire(order_id).await,
        };

        // Reload under the lock; a concurrent evaluation may have moved it.
        let mut order = self.store.load(order_id).await?;
        order.validate()?;

        if tick.symbol != order.symbol {
            debug!(order_id, tick_symbol = %tick.symbol, "tick symbol mismatch");
            return Ok(Evaluation::Skipped {
                status: order.status,
            });
        }

        match order.status {
            OrderStatus::Pending | OrderStatus::Open => {
                self.evaluate_standing(&mut order, tick).await
            }
            // Withheld/partial executions resume without re-checking the
            // trigger: the order already crossed.
            OrderStatus::Triggered => {
                if self.expire_if_due(&mut order).await? {
                    return Ok(Evaluation::Expired);
                }
                let epoch = order.updated_at;
                self.run_execution(&mut order, tick, epoch, false).await
            }
            OrderStatus::PartiallyFilled => {
                let epoch = order.updated_at;
                self.run_execution(&mut order, tick, epoch, false).await
            }
            status => Ok(Evaluation::Skipped { status }),
        }
    }

    async fn evaluate_standing(
        &self,
        order: &mut Order,
        tick: &PriceTick,
    ) -> Result<Evaluation> {
        if self.expire_if_due(order).await? {
            return Ok(Evaluation::Expired);
        }

        // Epoch captured before any mutation in this evaluation, so a
        // replayed evaluation of the same persisted state derives the same
        // idempotency key.
        let trigger_epoch = order.updated_at;

        let watermark_before = (order.highest_price, order.lowest_price);
        let decision = evaluate_trigger(order, tick.price)?;
        let watermark_moved = (order.highest_price, order.lowest_price) != watermark_before;

        match decision {
            TriggerDecision::NotTriggered => {
                if watermark_moved {
                    order.touch();
                    self.store.save(order).await?;
                }
                Ok(Evaluation::NotTriggered)
            }
            TriggerDecision::Triggered { trigger_price } => {
                debug!(
                    order_id = order.id,
                    trigger_price = %trigger_price,
                    tick_price = %tick.price,
                    "trigger condition crossed"
                );
                self.run_execution(order, tick, trigger_epoch, true).await
            }
        }
    }

    /// Quote, dedup, submit, commit. `fresh` marks a trigger crossed on this
    /// very tick: the `open -> triggered` transition is only persisted once
    /// a quote (or an actionable slippage rejection) exists, so an
    /// all-providers outage leaves the order open with nothing written.
    async fn run_execution(
        &self,
        order: &mut Order,
        tick: &PriceTick,
        trigger_epoch: DateTime<Utc>,
        fresh: bool,
    ) -> Result<Evaluation> {
        let slippage_limit = order
            .max_slippage_pct
            .unwrap_or(self.config.max_slippage_pct);

        let quote = match self
            .aggregator
            .get_quote(
                &order.symbol,
                order.side,
                order.remaining_amount(),
                slippage_limit,
            )
            .await
        {
            Ok(quote) => quote,
            Err(e @ QuoteError::AllProvidersUnavailable { .. }) => {
                // Distinct, retryable: the order stays standing and is
                // evaluated again on the next tick.
                warn!(order_id = order.id, error = %e, "price discovery unavailable");
                return Ok(Evaluation::Deferred {
                    reason: e.to_string(),
                });
            }
            Err(QuoteError::SlippageExceeded {
                actual_pct,
                limit_pct,
                ..
            }) => {
                if fresh {
                    let event = order.transition(
                        OrderStatus::Triggered,
                        format!("trigger crossed at {}", tick.price),
                    )?;
                    self.audit.publish(AuditEvent::Transition(event));
                }
                let reason = format!("slippage {actual_pct}% exceeds {limit_pct}% limit");
                order.status_reason = Some(reason.clone());
                order.touch();
                self.store.save(order).await?;
                self.audit.publish(AuditEvent::ExecutionWithheld {
                    order_id: order.id,
                    reason,
                });
                return Ok(Evaluation::Withheld {
                    actual_pct,
                    limit_pct,
                });
            }
            Err(e) => return Err(e.into()),
        };

        if fresh {
            let event = order.transition(
                OrderStatus::Triggered,
                format!("trigger crossed at {}", tick.price),
            )?;
            order.status_reason = None;
            self.store.save(order).await?;
            self.audit.publish(AuditEvent::Transition(event));
        }

        // One key per trigger event: a retried evaluation of the same event
        // collapses, a genuinely new event (new epoch or new quote) does not.
        let key = IdempotencyGuard::key(
            order.user_id,
            "execute_order",
            &[
                ("order_id", order.id.to_string()),
                (
                    "trigger_epoch",
                    trigger_epoch.to_rfc3339_opts(SecondsFormat::Micros, true),
                ),
                ("quote_price", quote.price.to_string()),
            ],
        );

        if let Some(record) = self.idempotency.check(&key, order.user_id)? {
            let outcome: ExecutionOutcome = serde_json::from_value(record.result)?;
            info!(
                order_id = order.id,
                execution_id = %outcome.execution_id,
                "replaying cached execution outcome"
            );
            self.apply_outcome(order, &outcome).await?;
            return Ok(Evaluation::Replayed(outcome));
        }

        let request = SubmitRequest {
            client_order_id: Uuid::new_v4().to_string(),
            symbol: order.symbol.clone(),
            side: order.side,
            amount: order.remaining_amount(),
            limit_price: quote.price,
        };

        match self.submitter.execute(&request).await {
            Ok(fill) => {
                order.apply_fill(fill.filled_amount, fill.average_price);
                let target = if order.is_fully_filled() {
                    OrderStatus::Filled
                } else {
                    OrderStatus::PartiallyFilled
                };
                let event = order.transition(
                    target,
                    format!("filled {} @ {}", fill.filled_amount, fill.average_price),
                )?;
                order.status_reason = None;

                let outcome = ExecutionOutcome {
                    execution_id: request.client_order_id.clone(),
                    venue_order_id: Some(fill.venue_order_id.clone()),
                    status: target,
                    filled_amount: order.filled_amount,
                    average_fill_price: order.average_fill_price,
                    quote_price: quote.price,
                    executed_at: Utc::now(),
                };

                // Transition and idempotency record commit together inside
                // the order's exclusive section.
                self.store.save(order).await?;
                self.idempotency.store(
                    &key,
                    order.user_id,
                    serde_json::to_value(&outcome)?,
                    "completed",
                    None,
                );

                self.audit.publish(AuditEvent::ExecutionSubmitted {
                    order_id: order.id,
                    venue_order_id: fill.venue_order_id,
                });
                self.audit.publish(AuditEvent::Transition(event));

                if target == OrderStatus::Filled && order.linked_order_id.is_some() {
                    self.oco.resolve_link(order).await?;
                }

                Ok(Evaluation::Executed(outcome))
            }
            Err(e) => {
                let reason = format!("execution failed: {e}");
                let event = order.transition(OrderStatus::Failed, reason.clone())?;
                order.status_reason = Some(reason.clone());

                let outcome = ExecutionOutcome {
                    execution_id: request.client_order_id,
                    venue_order_id: None,
                    status: OrderStatus::Failed,
                    filled_amount: order.filled_amount,
                    average_fill_price: order.average_fill_price,
                    quote_price: quote.price,
                    executed_at: Utc::now(),
                };

                self.store.save(order).await?;
                self.idempotency.store(
                    &key,
                    order.user_id,
                    serde_json::to_value(&outcome)?,
                    "failed",
                    None,
                );
                self.audit.publish(AuditEvent::Transition(event));

                Ok(Evaluation::Failed { reason })
            }
        }
    }

    /// Re-apply a cached outcome without resubmitting.
    async fn apply_outcome(&self, order: &mut Order, outcome: &ExecutionOutcome) -> Result<()> {
        order.filled_amount = outcome.filled_amount;
        order.average_fill_price = outcome.average_fill_price;
        if order.status != outcome.status {
            let event = order.transition(outcome.status, "replayed cached execution result")?;
            self.audit.publish(AuditEvent::Transition(event));
        } else {
            order.touch();
        }
        self.store.save(order).await?;

        if outcome.status == OrderStatus::Filled && order.linked_order_id.is_some() {
            self.oco.resolve_link(order).await?;
        }
        Ok(())
    }

    async fn expire_if_due(&self, order: &mut Order) -> Result<bool> {
        let Some(expires_at) = order.expires_at else {
            return Ok(false);
        };
        if Utc::now() < expires_at {
            return Ok(false);
        }
        let event = order.transition(OrderStatus::Expired, "expires_at elapsed")?;
        order.status_reason = Some("expires_at elapsed".to_string());
        self.store.save(order).await?;
        self.audit.publish(AuditEvent::Transition(event));
        Ok(true)
    }
}
