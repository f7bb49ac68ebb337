//! Per-item results and the finalized run summary.

use crate::bulk::{OperationError, Payload};
use crate::error::FailureKind;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Outcome {
    Succeeded,
    Failed,
    /// Never attempted because the run was cancelled first.
    Skipped,
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Outcome::Succeeded => write!(f, "succeeded"),
            Outcome::Failed => write!(f, "failed"),
            Outcome::Skipped => write!(f, "skipped"),
        }
    }
}

/// Final status of one identity.
///
/// `error` is present iff the outcome is `Failed`; `attempts` is zero only
/// for `Skipped` and otherwise between 1 and `1 + max_retries`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationResult {
    pub identity: String,
    pub outcome: Outcome,
    pub attempts: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub failure_kind: Option<FailureKind>,
    #[serde(skip_serializing_if = "Payload::is_empty")]
    pub payload: Payload,
    pub finished_at: DateTime<Utc>,
}

impl OperationResult {
    pub fn succeeded(identity: impl Into<String>, attempts: u32, payload: Payload) -> Self {
        Self {
            identity: identity.into(),
            outcome: Outcome::Succeeded,
            attempts,
            error: None,
            failure_kind: None,
            payload,
            finished_at: Utc::now(),
        }
    }

    pub fn failed(identity: impl Into<String>, attempts: u32, error: OperationError) -> Self {
        Self {
            identity: identity.into(),
            outcome: Outcome::Failed,
            attempts,
            error: Some(error.message),
            failure_kind: Some(error.kind),
            payload: Payload::new(),
            finished_at: Utc::now(),
        }
    }

    pub fn skipped(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            outcome: Outcome::Skipped,
            attempts: 0,
            error: None,
            failure_kind: None,
            payload: Payload::new(),
            finished_at: Utc::now(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Succeeded
    }
}

/// The immutable record of one bulk run. Counts are derived from `results`;
/// there is no other tally anywhere.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub skipped: usize,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub results: Vec<OperationResult>,
}

impl RunSummary {
    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

/// Accumulates results in input order; `finish` closes the timestamps and
/// folds the counts.
pub(crate) struct RunSummaryBuilder {
    started_at: DateTime<Utc>,
    results: Vec<OperationResult>,
}

impl RunSummaryBuilder {
    pub(crate) fn new() -> Self {
        Self {
            started_at: Utc::now(),
            results: Vec::new(),
        }
    }

    pub(crate) fn push(&mut self, result: OperationResult) {
        self.results.push(result);
    }

    pub(crate) fn finish(self) -> RunSummary {
        let (succeeded, failed, skipped) =
            self.results
                .iter()
                .fold((0, 0, 0), |(s, f, k), r| match r.outcome {
                    Outcome::Succeeded => (s + 1, f, k),
                    Outcome::Failed => (s, f + 1, k),
                    Outcome::Skipped => (s, f, k + 1),
                });

        RunSummary {
            total: self.results.len(),
            succeeded,
            failed,
            skipped,
            started_at: self.started_at,
            finished_at: Utc::now(),
            results: self.results,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_present_iff_failed() {
        let ok = OperationResult::succeeded("a@x.com", 1, Payload::new());
        assert!(ok.error.is_none() && ok.failure_kind.is_none());

        let failed = OperationResult::failed(
            "b@x.com",
            3,
            OperationError::new(FailureKind::Transient, "throttled"),
        );
        assert_eq!(failed.error.as_deref(), Some("throttled"));
        assert_eq!(failed.failure_kind, Some(FailureKind::Transient));

        let skipped = OperationResult::skipped("c@x.com");
        assert!(skipped.error.is_none());
        assert_eq!(skipped.attempts, 0);
    }

    #[test]
    fn counts_fold_from_results() {
        let mut builder = RunSummaryBuilder::new();
        builder.push(OperationResult::succeeded("a", 1, Payload::new()));
        builder.push(OperationResult::failed(
            "b",
            1,
            OperationError::new(FailureKind::Permanent, "denied"),
        ));
        builder.push(OperationResult::succeeded("c", 2, Payload::new()));
        builder.push(OperationResult::skipped("d"));

        let summary = builder.finish();
        assert_eq!(summary.total, 4);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(summary.failed, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(
            summary.succeeded + summary.failed + summary.skipped,
            summary.total
        );
        assert!(summary.finished_at >= summary.started_at);
    }

    #[test]
    fn failed_results_serialize_without_payload_key() {
        let failed = OperationResult::failed(
            "b@x.com",
            1,
            OperationError::new(FailureKind::NotFound, "no such user"),
        );
        let json = serde_json::to_value(&failed).unwrap();
        assert!(json.get("payload").is_none());
        assert_eq!(json["failureKind"], "notFound");
    }
}
