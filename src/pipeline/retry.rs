//! Opt-in retry layer around any [`PartitionApi`].
//!
//! A partition call only reads the document it is given, so repeating it is
//! harmless. Only failures classified by [`IngestError::is_retryable`] are
//! repeated: network errors, timeouts, HTTP 429 and 5xx. Waits double after
//! each attempt (`backoff_ms * 2^(attempt-1)`); with a 500 ms base and 3
//! retries that is 500 ms → 1 s → 2 s.
//!
//! The processor only installs this layer when `max_retries > 0`.

use crate::error::IngestError;
use crate::output::PartitionResponse;
use crate::pipeline::client::{PartitionApi, PartitionRequest};
use async_trait::async_trait;
use tokio::time::{sleep, Duration};
use tracing::warn;

/// Wraps a [`PartitionApi`] and retries transient failures.
#[derive(Debug, Clone)]
pub struct RetryingClient<A> {
    inner: A,
    max_retries: u32,
    backoff_ms: u64,
}

impl<A: PartitionApi> RetryingClient<A> {
    pub fn new(inner: A, max_retries: u32, backoff_ms: u64) -> Self {
        Self {
            inner,
            max_retries,
            backoff_ms,
        }
    }

    pub fn inner(&self) -> &A {
        &self.inner
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(self.backoff_ms.saturating_mul(factor))
    }
}

#[async_trait]
impl<A: PartitionApi> PartitionApi for RetryingClient<A> {
    async fn partition(&self, request: &PartitionRequest) -> Result<PartitionResponse, IngestError> {
        let mut attempt = 0;
        loop {
            match self.inner.partition(request).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    let wait = self.backoff(attempt);
                    warn!(
                        "Partition attempt {} failed ({}); retry {}/{} after {}ms",
                        attempt,
                        e,
                        attempt,
                        self.max_retries,
                        wait.as_millis()
                    );
                    sleep(wait).await;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
