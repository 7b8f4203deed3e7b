pub mod coordinator;
pub mod idempotency;
pub mod locks;
pub mod oco;
pub mod trigger;
pub mod watermark;

pub use coordinator::{Evaluation, ExecutionCoordinator, ExecutionOutcome};
pub use idempotency::{IdempotencyGuard, IdempotencyRecord};
pub use locks::OrderLockTable;
pub use oco::OcoResolver;
pub use trigger::{evaluate_trigger, TriggerDecision};
pub use watermark::{update_watermark, WatermarkUpdate};
