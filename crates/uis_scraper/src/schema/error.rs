//! Rejection type for the validation boundary.

use thiserror::Error;

use super::RecordKind;

/// A record failed its schema. Carries enough context to find it again.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind} record `{key}` rejected: {}", issues.join("; "))]
pub struct ValidationError {
    pub kind: RecordKind,
    /// Natural key of the record (subject code, person id, ...), or `?` if unknown
    pub key: String,
    pub issues: Vec<String>,
}

impl ValidationError {
    pub fn new(kind: RecordKind, key: impl Into<String>, issues: Vec<String>) -> Self {
        Self {
            kind,
            key: key.into(),
            issues,
        }
    }

    /// Rejection for input that could not even be decoded into the record shape.
    pub fn malformed(kind: RecordKind, err: impl std::fmt::Display) -> Self {
        Self::new(kind, "?", vec![format!("malformed record: {err}")])
    }
}
