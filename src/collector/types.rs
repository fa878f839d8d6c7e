//! Position report types.
//!
//! A record is kept exactly as it was read: an ordered list of text fields,
//! addressed by position through the header registry.

use crate::core::fingerprint::Fnv1a64;
use crate::error::{ParseError, ParseErrorKind};
use std::fmt;
use std::hash::Hasher;
use std::sync::Arc;

/// Separator fed to the hasher between fields so that `["ab", "c"]` and
/// `["a", "bc"]` hash differently.
const FIELD_SEPARATOR: u8 = 0x1f;

/// One observation: a fixed-arity row of text fields.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Record {
    fields: Vec<String>,
}

/// Records are shared between the window, clusters and retained pairs.
pub type SharedRecord = Arc<Record>;

impl Record {
    pub fn new(fields: Vec<String>) -> Self {
        Self { fields }
    }

    /// Field text at `index`, if the record has that many fields.
    pub fn field(&self, index: usize) -> Option<&str> {
        self.fields.get(index).map(String::as_str)
    }

    /// Field text at `index`, or a parse error of the given kind.
    pub fn require(&self, index: usize, kind: ParseErrorKind) -> Result<&str, ParseError> {
        self.field(index)
            .ok_or_else(|| ParseError::missing(kind, index))
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Content hash used as the storage key in a window.
    ///
    /// Structurally equal records always hash identically.
    pub fn content_hash(&self) -> u64 {
        let mut hasher = Fnv1a64::new();
        for (i, field) in self.fields.iter().enumerate() {
            if i > 0 {
                hasher.write_u8(FIELD_SEPARATOR);
            }
            hasher.write(field.as_bytes());
        }
        hasher.finish()
    }
}

impl From<Vec<String>> for Record {
    fn from(fields: Vec<String>) -> Self {
        Self::new(fields)
    }
}

impl From<&[&str]> for Record {
    fn from(fields: &[&str]) -> Self {
        Self::new(fields.iter().map(|s| s.to_string()).collect())
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.fields.join(","))
    }
}
