use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{error, warn};

use crate::config::ExecutionConfig;
use crate::error::{OrderError, Result};
use crate::venue::traits::{ExecutionVenue, FillReport, SubmitRequest};

/// Wraps a venue with bounded retries and jittered exponential backoff.
pub struct RetryingSubmitter {
    venue: Arc<dyn ExecutionVenue>,
    max_retries: u8,
}

impl RetryingSubmitter {
    pub fn new(venue: Arc<dyn ExecutionVenue>, config: &ExecutionConfig) -> Self {
        Self {
            venue,
            max_retries: config.max_retries,
        }
    }

    pub fn venue_name(&self) -> &str {
        self.venue.name()
    }

    /// Submit with retry; exhausting the attempt budget is the signal for
    /// the coordinator to move the order to `failed`.
    pub async fn execute(&self, request: &SubmitRequest) -> Result<FillReport> {
        let mut attempts: u8 = 0;

        loop {
            attempts += 1;

            match self.venue.submit(request).await {
                Ok(fill) => return Ok(fill),
                Err(e) => {
                    if attempts >= self.max_retries {
                        error!(
                            client_order_id = %request.client_order_id,
                            attempts,
                            error = %e,
                            "submission failed after exhausting retries"
                        );
                        return Err(OrderError::MaxRetriesExceeded { attempts }.into());
                    }

                    warn!(
                        client_order_id = %request.client_order_id,
                        attempt = attempts,
                        error = %e,
                        "submission attempt failed, retrying"
                    );

                    let base = 100u64 * (1 << attempts.min(6));
                    let jitter = rand::thread_rng().gen_range(0..base / 2 + 1);
                    sleep(Duration::from_millis(base + jitter)).await;
                }
            }
        }
    }
}
