//! Bounded retry with a fixed inter-attempt delay.

use crate::bulk::{BulkOperation, OperationError, Payload};
use std::time::Duration;

/// Retry knobs for a single identity's attempts.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Additional attempts after the first. Zero disables retry entirely.
    pub max_retries: u32,
    /// Fixed wait between attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            delay: Duration::from_secs(2),
        }
    }
}

impl RetryPolicy {
    pub fn max_attempts(&self) -> u32 {
        1 + self.max_retries
    }
}

/// What a bounded-retry sequence ended in, and how many calls it took.
#[derive(Debug)]
pub struct AttemptOutcome {
    pub attempts: u32,
    pub outcome: std::result::Result<Payload, OperationError>,
}

/// Invoke `op` for `identity`, retrying only transient failures.
///
/// Makes at most `1 + max_retries` adapter calls. `NotFound` and `Permanent`
/// failures return after the attempt that produced them; a transient failure
/// on the final attempt is returned as-is.
pub async fn run_with_retry<O: BulkOperation>(
    op: &O,
    identity: &str,
    policy: RetryPolicy,
) -> AttemptOutcome {
    let max_attempts = policy.max_attempts();
    let mut attempt = 0;

    loop {
        attempt += 1;

        match op.invoke(identity).await {
            Ok(payload) => {
                return AttemptOutcome {
                    attempts: attempt,
                    outcome: Ok(payload),
                };
            }
            Err(err) if err.is_transient() && attempt < max_attempts => {
                tracing::debug!(
                    identity,
                    attempt,
                    max_attempts,
                    error = %err.message,
                    "transient failure, retrying"
                );
                if !policy.delay.is_zero() {
                    tokio::time::sleep(policy.delay).await;
                }
            }
            Err(err) => {
                tracing::debug!(identity, attempt, kind = %err.kind, "giving up");
                return AttemptOutcome {
                    attempts: attempt,
                    outcome: Err(err),
                };
            }
        }
    }
}
