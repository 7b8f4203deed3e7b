pub mod audit;
pub mod monitor;

pub use audit::{AuditEvent, AuditSink, ChannelAuditSink, TracingAuditSink};
pub use monitor::{MonitorStats, TickMonitor};
