use serde::Serialize;
use thiserror::Error;

/// How a failed operation should be treated by the bulk retry layer.
///
/// Every failure that reaches the runner carries exactly one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FailureKind {
    /// The target does not exist upstream. Never retried.
    NotFound,
    /// Throttling, timeouts, connection faults. Safe to retry.
    Transient,
    /// Authorization or validation failure. Retrying cannot help.
    Permanent,
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::NotFound => write!(f, "not found"),
            FailureKind::Transient => write!(f, "transient"),
            FailureKind::Permanent => write!(f, "permanent"),
        }
    }
}

#[derive(Error, Debug)]
pub enum Ops365Error {
    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Graph API error ({kind}): {message}")]
    GraphApiError { kind: FailureKind, message: String },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Directory walk error: {0}")]
    WalkDirError(#[from] walkdir::Error),

    #[error("Interactive prompt error: {0}")]
    DialoguerError(#[from] dialoguer::Error),

    #[error("Token not found. Please run 'ops365 login' first")]
    TokenNotFound,

    #[error("Tenant '{0}' not found")]
    TenantNotFound(String),

    #[error("azcopy failed: {0}")]
    AzCopyError(String),
}

pub type Result<T> = std::result::Result<T, Ops365Error>;

pub use Ops365Error as Error;

impl Ops365Error {
    /// Classify this error for the bulk retry layer.
    ///
    /// Graph errors carry their kind from HTTP classification; raw transport
    /// errors (connect failures, timeouts) are transient. Everything else,
    /// config and IO included, is permanent from the runner's point of view.
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            Ops365Error::GraphApiError { kind, .. } => *kind,
            Ops365Error::HttpError(_) => FailureKind::Transient,
            _ => FailureKind::Permanent,
        }
    }
}

/// A Graph API error body, reduced to the parts we act on.
#[derive(Debug, Default)]
pub struct GraphErrorBody {
    pub code: Option<String>,
    pub message: Option<String>,
}

impl GraphErrorBody {
    /// Extract `error.code` and `error.message` from a Graph error response.
    /// Unparseable bodies yield an empty result; the caller falls back to the
    /// raw text.
    pub fn parse(body: &str) -> Self {
        let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
            return Self::default();
        };
        let Some(error) = value.get("error") else {
            return Self::default();
        };
        Self {
            code: error
                .get("code")
                .and_then(|c| c.as_str())
                .map(str::to_string),
            message: error
                .get("message")
                .and_then(|m| m.as_str())
                .map(str::to_string),
        }
    }

    pub fn render(&self, raw: &str) -> String {
        match (&self.code, &self.message) {
            (Some(code), Some(message)) => format!("{}: {}", code, message),
            (Some(code), None) => code.clone(),
            (None, Some(message)) => message.clone(),
            (None, None) => raw.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_graph_error_body() {
        let body =
            r#"{"error":{"code":"Request_ResourceNotFound","message":"Resource not found."}}"#;
        let parsed = GraphErrorBody::parse(body);
        assert_eq!(parsed.code.as_deref(), Some("Request_ResourceNotFound"));
        assert_eq!(
            parsed.render(body),
            "Request_ResourceNotFound: Resource not found."
        );
    }

    #[test]
    fn falls_back_to_raw_text() {
        let parsed = GraphErrorBody::parse("gateway exploded");
        assert!(parsed.code.is_none());
        assert_eq!(parsed.render("gateway exploded"), "gateway exploded");
    }

    #[test]
    fn graph_errors_keep_their_kind() {
        let err = Ops365Error::GraphApiError {
            kind: FailureKind::NotFound,
            message: "HTTP 404".into(),
        };
        assert_eq!(err.failure_kind(), FailureKind::NotFound);

        let err = Ops365Error::ConfigError("bad".into());
        assert_eq!(err.failure_kind(), FailureKind::Permanent);
    }
}
