use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::domain::{Order, OrderStatus};
use crate::error::Result;
use crate::services::audit::{AuditEvent, AuditSink};
use crate::store::OrderStore;

/// On fill of one order in a linked pair, cancels its sibling.
///
/// Callers must already hold the joint (pair) exclusive section; the
/// resolver itself takes no locks.
pub struct OcoResolver {
    store: Arc<dyn OrderStore>,
    audit: Arc<dyn AuditSink>,
}

impl OcoResolver {
    pub fn new(store: Arc<dyn OrderStore>, audit: Arc<dyn AuditSink>) -> Self {
        Self { store, audit }
    }

    pub async fn resolve_link(&self, filled_order: &Order) -> Result<()> {
        let Some(sibling_id) = filled_order.linked_order_id else {
            return Ok(());
        };

        let mut sibling = self.store.load(sibling_id).await?;

        if sibling.status == OrderStatus::Cancelled {
            // Already resolved, e.g. a replayed execution of the same fill
            debug!(order_id = filled_order.id, sibling_id, "OCO sibling already cancelled");
            return Ok(());
        }

        if sibling.status.is_terminal() {
            // Both siblings reached a terminal state: the pair-lock
            // discipline upstream should make this unreachable, so surface
            // it as an anomaly and leave both states untouched.
            warn!(
                order_id = filled_order.id,
                sibling_id,
                sibling_status = %sibling.status,
                "OCO sibling already terminal, leaving as-is"
            );
            self.audit.publish(AuditEvent::OcoAnomaly {
                order_id: filled_order.id,
                sibling_id,
                sibling_status: sibling.status.to_string(),
            });
            return Ok(());
        }

        let event = sibling.transition(OrderStatus::Cancelled, "OCO sibling filled")?;
        sibling.status_reason = Some(format!("OCO sibling {} filled", filled_order.id));
        self.store.save(&sibling).await?;
        self.audit.publish(AuditEvent::Transition(event));

        info!(
            order_id = filled_order.id,
            sibling_id, "cancelled OCO sibling"
        );
        Ok(())
    }
}
