use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::domain::StateTransition;

/// Events delivered to the notification/audit boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AuditEvent {
    Transition(StateTransition),
    ExecutionWithheld {
        order_id: i64,
        reason: String,
    },
    ExecutionSubmitted {
        order_id: i64,
        venue_order_id: String,
    },
    OcoAnomaly {
        order_id: i64,
        sibling_id: i64,
        sibling_status: String,
    },
}

/// Fire-and-forget sink: delivery failure must never block or roll back an
/// order transition, so `publish` is infallible from the caller's view.
pub trait AuditSink: Send + Sync {
    fn publish(&self, event: AuditEvent);
}

/// Default sink: structured log lines.
pub struct TracingAuditSink;

impl AuditSink for TracingAuditSink {
    fn publish(&self, event: AuditEvent) {
        match &event {
            AuditEvent::Transition(t) => {
                info!(
                    order_id = t.order_id,
                    from = %t.from,
                    to = %t.to,
                    reason = %t.reason,
                    "order transition"
                );
            }
            AuditEvent::ExecutionWithheld { order_id, reason } => {
                info!(order_id, reason = %reason, "execution withheld");
            }
            AuditEvent::ExecutionSubmitted {
                order_id,
                venue_order_id,
            } => {
                info!(order_id, venue_order_id = %venue_order_id, "execution submitted");
            }
            AuditEvent::OcoAnomaly {
                order_id,
                sibling_id,
                sibling_status,
            } => {
                warn!(
                    order_id,
                    sibling_id,
                    sibling_status = %sibling_status,
                    "OCO sibling already terminal"
                );
            }
        }
    }
}

/// Channel-backed sink for tests; a dropped receiver is ignored.
pub struct ChannelAuditSink {
    tx: mpsc::UnboundedSender<AuditEvent>,
}

impl ChannelAuditSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<AuditEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl AuditSink for ChannelAuditSink {
    fn publish(&self, event: AuditEvent) {
        let _ = self.tx.send(event);
    }
}
