//! Timestamp parsing for report fields.
//!
//! Reports carry naive timestamps (no offset). The parser interprets them in a
//! configured time zone and converts to UTC.

use crate::collector::types::Record;
use crate::error::{AnalysisError, ParseError, ParseErrorKind};
use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Default layout of the timestamp field, e.g. `2017-12-01T00:00:03`.
pub const DEFAULT_TIME_LAYOUT: &str = "%Y-%m-%dT%H:%M:%S";

/// Parses the timestamp field of a record.
#[derive(Debug, Clone)]
pub struct TimestampParser {
    layout: String,
    zone: Tz,
}

impl TimestampParser {
    /// Create a parser for the given layout and IANA time zone name.
    pub fn new(layout: impl Into<String>, zone: &str) -> Result<Self, AnalysisError> {
        let zone: Tz = zone
            .parse()
            .map_err(|e| AnalysisError::Configuration(format!("unknown time zone {zone:?}: {e}")))?;
        Ok(Self {
            layout: layout.into(),
            zone,
        })
    }

    pub fn layout(&self) -> &str {
        &self.layout
    }

    pub fn zone(&self) -> Tz {
        self.zone
    }

    /// Parse raw text. `index` is only used for error reporting.
    pub fn parse_text(&self, text: &str, index: usize) -> Result<DateTime<Utc>, ParseError> {
        let naive = NaiveDateTime::parse_from_str(text.trim(), &self.layout).map_err(|e| {
            ParseError::new(ParseErrorKind::Timestamp, index, text, e.to_string())
        })?;

        // Ambiguous local times (DST fall-back) resolve to the earlier instant.
        let local = self
            .zone
            .from_local_datetime(&naive)
            .earliest()
            .ok_or_else(|| {
                ParseError::new(
                    ParseErrorKind::Timestamp,
                    index,
                    text,
                    format!("local time does not exist in {}", self.zone),
                )
            })?;

        Ok(local.with_timezone(&Utc))
    }

    /// Parse the timestamp stored at `index` in `record`.
    pub fn parse(&self, record: &Record, index: usize) -> Result<DateTime<Utc>, ParseError> {
        let text = record.require(index, ParseErrorKind::Timestamp)?;
        self.parse_text(text, index)
    }
}

impl Default for TimestampParser {
    fn default() -> Self {
        Self {
            layout: DEFAULT_TIME_LAYOUT.to_string(),
            zone: Tz::UTC,
        }
    }
}
