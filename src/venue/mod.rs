//! Execution venue seam: the settlement trait, a paper implementation, and
//! the bounded-retry submitter the coordinator uses.

pub mod paper;
pub mod submitter;
pub mod traits;

pub use paper::PaperVenue;
pub use submitter::RetryingSubmitter;
pub use traits::{ExecutionVenue, FillReport, SubmitRequest};
