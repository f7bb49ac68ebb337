//! Parser for free-form readiness status strings.
//!
//! Migration readiness exports carry a status column of the shape
//! `State: Ready; Files: 1204; Blocked: invalid characters`, i.e. `key:
//! value` pairs separated by `;`. This module gives that text an explicit
//! grammar and a typed result; a malformed row is a recoverable error the
//! caller records, never a crash.

use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum StatusParseError {
    #[error("segment '{0}' has no ':' delimiter")]
    MissingDelimiter(String),

    #[error("segment '{0}' has an empty key")]
    EmptyKey(String),

    #[error("status string is empty")]
    Empty,
}

/// Migration state distilled from the status fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadinessState {
    Ready,
    Blocked,
    NeedsReview,
    /// A state value we don't recognize, preserved verbatim.
    Other(String),
}

impl ReadinessState {
    fn parse(raw: &str) -> Self {
        match raw.to_ascii_lowercase().as_str() {
            "ready" => ReadinessState::Ready,
            "blocked" => ReadinessState::Blocked,
            "needs review" | "needsreview" | "review" => ReadinessState::NeedsReview,
            _ => ReadinessState::Other(raw.to_string()),
        }
    }
}

impl std::fmt::Display for ReadinessState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReadinessState::Ready => write!(f, "ready"),
            ReadinessState::Blocked => write!(f, "blocked"),
            ReadinessState::NeedsReview => write!(f, "needs review"),
            ReadinessState::Other(raw) => write!(f, "{}", raw),
        }
    }
}

/// One parsed readiness row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadinessRecord {
    pub identity: String,
    pub state: ReadinessState,
    pub fields: BTreeMap<String, String>,
}

/// Parse a status string into its fields.
///
/// Grammar: `pair (';' pair)*` where `pair` is `key ':' value`; whitespace
/// around keys, values, and separators is insignificant, empty segments
/// (trailing `;`) are allowed, and a repeated key keeps its last value.
pub fn parse_status_fields(raw: &str) -> Result<BTreeMap<String, String>, StatusParseError> {
    if raw.trim().is_empty() {
        return Err(StatusParseError::Empty);
    }

    let mut fields = BTreeMap::new();

    for segment in raw.split(';') {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }

        let Some(pos) = segment.find(':') else {
            return Err(StatusParseError::MissingDelimiter(segment.to_string()));
        };

        let key = segment[..pos].trim();
        if key.is_empty() {
            return Err(StatusParseError::EmptyKey(segment.to_string()));
        }
        let value = segment[pos + 1..].trim();

        fields.insert(key.to_string(), value.to_string());
    }

    Ok(fields)
}

/// Parse a full row: the identity plus its status string. The state is read
/// from a `State` (or `Status`) field; rows without one are `Other("")`.
pub fn parse_record(identity: &str, raw: &str) -> Result<ReadinessRecord, StatusParseError> {
    let fields = parse_status_fields(raw)?;

    let state = fields
        .get("State")
        .or_else(|| fields.get("Status"))
        .map(|v| ReadinessState::parse(v))
        .unwrap_or_else(|| ReadinessState::Other(String::new()));

    Ok(ReadinessRecord {
        identity: identity.to_string(),
        state,
        fields,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_key_value_pairs() {
        let fields = parse_status_fields("State: Ready; Files: 1204; Size: 3.2 GB").unwrap();
        assert_eq!(fields.get("State").map(String::as_str), Some("Ready"));
        assert_eq!(fields.get("Files").map(String::as_str), Some("1204"));
        assert_eq!(fields.len(), 3);
    }

    #[test]
    fn trailing_separator_and_whitespace_are_fine() {
        let fields = parse_status_fields("  State :Blocked ;  Reason: invalid characters ; ").unwrap();
        assert_eq!(fields.get("State").map(String::as_str), Some("Blocked"));
        assert_eq!(
            fields.get("Reason").map(String::as_str),
            Some("invalid characters")
        );
    }

    #[test]
    fn value_may_contain_colons() {
        let fields = parse_status_fields("Url: https://contoso.test/path").unwrap();
        assert_eq!(
            fields.get("Url").map(String::as_str),
            Some("https://contoso.test/path")
        );
    }

    #[test]
    fn repeated_key_keeps_last_value() {
        let fields = parse_status_fields("State: Ready; State: Blocked").unwrap();
        assert_eq!(fields.get("State").map(String::as_str), Some("Blocked"));
    }

    #[test]
    fn segment_without_delimiter_is_an_error() {
        let err = parse_status_fields("State: Ready; garbage").unwrap_err();
        assert_eq!(err, StatusParseError::MissingDelimiter("garbage".into()));
    }

    #[test]
    fn empty_key_is_an_error() {
        let err = parse_status_fields(": Ready").unwrap_err();
        assert_eq!(err, StatusParseError::EmptyKey(": Ready".into()));
    }

    #[test]
    fn empty_status_is_an_error() {
        assert_eq!(parse_status_fields("   ").unwrap_err(), StatusParseError::Empty);
    }

    #[test]
    fn record_reads_state_field() {
        let record = parse_record("a@x.com", "State: Needs Review; Files: 3").unwrap();
        assert_eq!(record.state, ReadinessState::NeedsReview);
        assert_eq!(record.identity, "a@x.com");

        let record = parse_record("b@x.com", "Status: Migrating; Files: 9").unwrap();
        assert_eq!(record.state, ReadinessState::Other("Migrating".into()));
    }
}
