//! Bulk-operation engine: one remote call per identity, bounded retry with a
//! fixed delay, pacing between identities, and a structured run summary.
//!
//! Every per-identity command (BitLocker backup, mailbox rule audit, OneDrive
//! provisioning) is an adapter implementing [`BulkOperation`] driven by
//! [`runner::BulkRunner`].

pub mod report;
pub mod result;
pub mod retry;
pub mod runner;

pub use result::{OperationResult, Outcome, RunSummary};
pub use retry::RetryPolicy;
pub use runner::{BulkRunner, CancelFlag, RunConfig};

use crate::error::{FailureKind, Ops365Error};
use std::collections::BTreeMap;

/// Operation-specific output carried on a successful result, flattened into
/// report columns by the exporter.
pub type Payload = BTreeMap<String, String>;

/// A classified per-item failure. The kind decides whether the retry wrapper
/// tries again.
#[derive(Debug, Clone)]
pub struct OperationError {
    pub kind: FailureKind,
    pub message: String,
}

impl OperationError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind == FailureKind::Transient
    }
}

impl std::fmt::Display for OperationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.message, self.kind)
    }
}

impl From<Ops365Error> for OperationError {
    fn from(err: Ops365Error) -> Self {
        Self {
            kind: err.failure_kind(),
            message: err.to_string(),
        }
    }
}

/// One unit of remote work per identity.
///
/// Implementations hold the authenticated session; the runner never creates
/// or recreates it mid-run. Failures must be classified into exactly one
/// [`FailureKind`], since the retry wrapper's behavior depends on it.
#[allow(async_fn_in_trait)]
pub trait BulkOperation {
    /// Short verb phrase shown in progress output, e.g. "fetching recovery key".
    fn describe(&self) -> &str;

    async fn invoke(&self, identity: &str) -> std::result::Result<Payload, OperationError>;
}
