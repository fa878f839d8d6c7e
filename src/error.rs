//! Error types shared by the window, clustering and interaction stages.

use crate::collector::file::CollectorError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io;
use thiserror::Error;

/// Which kind of field failed to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseErrorKind {
    Timestamp,
    GeoKey,
    Coordinate,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseErrorKind::Timestamp => write!(f, "timestamp"),
            ParseErrorKind::GeoKey => write!(f, "geokey"),
            ParseErrorKind::Coordinate => write!(f, "coordinate"),
        }
    }
}

/// A single field of a single record could not be interpreted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed {kind} field at position {index} ({value:?}): {reason}")]
pub struct ParseError {
    pub kind: ParseErrorKind,
    pub index: usize,
    pub value: String,
    pub reason: String,
}

impl ParseError {
    pub fn new(
        kind: ParseErrorKind,
        index: usize,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            index,
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// The record is shorter than the field position being read.
    pub fn missing(kind: ParseErrorKind, index: usize) -> Self {
        Self::new(kind, index, "", "record has no field at this position")
    }
}

/// Error type for the analysis pipeline.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("malformed row at line {line}: {reason}")]
    MalformedRow { line: usize, reason: String },
    #[error(transparent)]
    Collector(#[from] CollectorError),
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Serialization(String),
}

/// How a batch operation treats a record whose fields fail to parse.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    /// Report the offending record and carry on with the rest of the batch.
    #[default]
    Skip,
    /// Fail the whole batch and leave the container untouched.
    Abort,
}

impl ErrorPolicy {
    /// Parse a policy name as given on the command line.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "skip" => Some(ErrorPolicy::Skip),
            "abort" => Some(ErrorPolicy::Abort),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display() {
        let err = ParseError::new(ParseErrorKind::GeoKey, 16, "0xZZ", "invalid digit");
        let msg = err.to_string();
        assert!(msg.contains("geokey"));
        assert!(msg.contains("16"));
        assert!(msg.contains("0xZZ"));
    }

    #[test]
    fn test_parse_error_converts() {
        let err: AnalysisError = ParseError::missing(ParseErrorKind::Timestamp, 3).into();
        assert!(matches!(err, AnalysisError::Parse(_)));
    }

    #[test]
    fn test_policy_names() {
        assert_eq!(ErrorPolicy::from_name("skip"), Some(ErrorPolicy::Skip));
        assert_eq!(ErrorPolicy::from_name(" ABORT "), Some(ErrorPolicy::Abort));
        assert_eq!(ErrorPolicy::from_name("retry"), None);
        assert_eq!(ErrorPolicy::default(), ErrorPolicy::Skip);
    }
}
