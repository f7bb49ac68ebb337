//! Sequential driver: retry wrapper per identity, pacing in between.

use crate::bulk::result::RunSummaryBuilder;
use crate::bulk::retry::{self, RetryPolicy};
use crate::bulk::{BulkOperation, OperationResult, RunSummary};
use crate::config::RunDefaults;
use crate::error::{Ops365Error, Result};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Full configuration for one bulk run.
#[derive(Debug, Clone, Copy)]
pub struct RunConfig {
    pub max_retries: u32,
    pub retry_delay: Duration,
    /// Pacing between consecutive identities. Deliberate backpressure: the
    /// upstream services rate-limit, so we slow down instead of parallelize.
    pub pacing: Duration,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self::from(RunDefaults::default())
    }
}

impl From<RunDefaults> for RunConfig {
    fn from(defaults: RunDefaults) -> Self {
        Self {
            max_retries: defaults.max_retries,
            retry_delay: Duration::from_secs(defaults.retry_delay_secs),
            pacing: Duration::from_secs(defaults.pacing_secs),
        }
    }
}

impl RunConfig {
    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.max_retries,
            delay: self.retry_delay,
        }
    }
}

/// Cooperative cancellation signal, checked before each identity begins.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Drives a [`BulkOperation`] across an ordered identity list.
///
/// Strictly sequential; results come back in input order, duplicates are
/// processed independently, and one identity's failure never stops the run.
pub struct BulkRunner<O: BulkOperation> {
    op: O,
    config: RunConfig,
    cancel: CancelFlag,
}

impl<O: BulkOperation> BulkRunner<O> {
    pub fn new(op: O, config: RunConfig) -> Self {
        Self {
            op,
            config,
            cancel: CancelFlag::new(),
        }
    }

    /// Attach an external cancellation flag. Identities not yet started when
    /// the flag flips are recorded as skipped.
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn operation(&self) -> &O {
        &self.op
    }

    pub async fn run(&self, identities: &[String]) -> Result<RunSummary> {
        self.run_with_observer(identities, |_| {}).await
    }

    /// Run, calling `observe` with each finalized result as it lands. Used
    /// by the commands to tick progress bars.
    pub async fn run_with_observer<F>(
        &self,
        identities: &[String],
        mut observe: F,
    ) -> Result<RunSummary>
    where
        F: FnMut(&OperationResult),
    {
        if identities.is_empty() {
            return Err(Ops365Error::InvalidArgument(
                "no identities to process".into(),
            ));
        }

        let policy = self.config.retry_policy();
        let mut summary = RunSummaryBuilder::new();
        let mut any_attempted = false;

        for identity in identities {
            if self.cancel.is_cancelled() {
                let result = OperationResult::skipped(identity.clone());
                observe(&result);
                summary.push(result);
                continue;
            }

            // Pacing goes strictly between attempted items, never before the
            // first or after the last.
            if any_attempted && !self.config.pacing.is_zero() {
                tokio::time::sleep(self.config.pacing).await;
            }
            any_attempted = true;

            tracing::debug!(identity = identity.as_str(), op = self.op.describe(), "processing");
            let attempt = retry::run_with_retry(&self.op, identity, policy).await;

            let result = match attempt.outcome {
                Ok(payload) => OperationResult::succeeded(identity.clone(), attempt.attempts, payload),
                Err(err) => OperationResult::failed(identity.clone(), attempt.attempts, err),
            };

            observe(&result);
            summary.push(result);
        }

        Ok(summary.finish())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bulk::{OperationError, Payload};
    use crate::error::FailureKind;
    use std::sync::Mutex;

    /// Fails identities in `fail` with a permanent error, succeeds the rest.
    struct SelectiveOp {
        fail: Vec<String>,
        seen: Mutex<Vec<String>>,
    }

    impl SelectiveOp {
        fn failing(fail: &[&str]) -> Self {
            Self {
                fail: fail.iter().map(|s| s.to_string()).collect(),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl BulkOperation for SelectiveOp {
        fn describe(&self) -> &str {
            "selective test op"
        }

        async fn invoke(&self, identity: &str) -> std::result::Result<Payload, OperationError> {
            self.seen.lock().unwrap().push(identity.to_string());
            if self.fail.iter().any(|f| f == identity) {
                Err(OperationError::new(FailureKind::Permanent, "denied"))
            } else {
                Ok(Payload::new())
            }
        }
    }

    fn fast_config() -> RunConfig {
        RunConfig {
            max_retries: 2,
            retry_delay: Duration::ZERO,
            pacing: Duration::ZERO,
        }
    }

    fn ids(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn empty_input_is_invalid_argument() {
        let runner = BulkRunner::new(SelectiveOp::failing(&[]), fast_config());
        let err = runner.run(&[]).await.unwrap_err();
        assert!(matches!(err, Ops365Error::InvalidArgument(_)));
    }

    #[tokio::test]
    async fn results_preserve_input_order_and_duplicates() {
        let runner = BulkRunner::new(SelectiveOp::failing(&[]), fast_config());
        let input = ids(&["a@x.com", "b@x.com", "a@x.com"]);
        let summary = runner.run(&input).await.unwrap();

        assert_eq!(summary.total, 3);
        let identities: Vec<&str> = summary.results.iter().map(|r| r.identity.as_str()).collect();
        assert_eq!(identities, ["a@x.com", "b@x.com", "a@x.com"]);
        assert_eq!(runner.operation().seen.lock().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn one_failure_does_not_abort_the_run() {
        let runner = BulkRunner::new(SelectiveOp::failing(&["b@x.com"]), fast_config());
        let summary = runner
            .run(&ids(&["a@x.com", "b@x.com", "c@x.com"]))
            .await
            .unwrap();

        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.results[1].identity, "b@x.com");
        assert_eq!(summary.results[1].attempts, 1);
        assert!(!summary.results[1].is_success());
    }

    #[tokio::test]
    async fn cancellation_skips_everything() {
        let cancel = CancelFlag::new();
        cancel.cancel();

        let runner =
            BulkRunner::new(SelectiveOp::failing(&[]), fast_config()).with_cancel(cancel);
        let summary = runner.run(&ids(&["a@x.com", "b@x.com"])).await.unwrap();

        assert_eq!(summary.skipped, 2);
        assert_eq!(summary.succeeded + summary.failed, 0);
        assert!(runner.operation().seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn pacing_runs_between_items_only() {
        let config = RunConfig {
            max_retries: 0,
            retry_delay: Duration::ZERO,
            pacing: Duration::from_millis(20),
        };
        let runner = BulkRunner::new(SelectiveOp::failing(&[]), config);

        let start = std::time::Instant::now();
        let summary = runner
            .run(&ids(&["a@x.com", "b@x.com", "c@x.com"]))
            .await
            .unwrap();

        // Two gaps for three items.
        assert!(start.elapsed() >= Duration::from_millis(40));
        assert_eq!(summary.succeeded, 3);

        let start = std::time::Instant::now();
        runner.run(&ids(&["solo@x.com"])).await.unwrap();
        assert!(start.elapsed() < Duration::from_millis(20));
    }

    #[tokio::test]
    async fn observer_sees_every_result_in_order() {
        let runner = BulkRunner::new(SelectiveOp::failing(&["b@x.com"]), fast_config());
        let mut observed = Vec::new();
        runner
            .run_with_observer(&ids(&["a@x.com", "b@x.com"]), |r| {
                observed.push((r.identity.clone(), r.outcome));
            })
            .await
            .unwrap();

        assert_eq!(observed.len(), 2);
        assert_eq!(observed[0].1, crate::bulk::Outcome::Succeeded);
        assert_eq!(observed[1].1, crate::bulk::Outcome::Failed);
    }
}
