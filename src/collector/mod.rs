//! Record collection for the proximity scanner.
//!
//! This module holds the boundary pieces the scan core relies on: the record
//! type, the header registry, timestamp and distance helpers, and a
//! file-backed collector that streams rows from a background thread.

pub mod delimited;
pub mod file;
pub mod geo;
pub mod headers;
pub mod time;
pub mod types;

// Re-export commonly used types
pub use delimited::{split_line, DelimitedWriter};
pub use file::{CollectorError, CollectorEvent, FileCollector};
pub use geo::{distance_nm, haversine_nm, EARTH_RADIUS_NM};
pub use headers::{FieldIndices, Headers, IdentityIndices};
pub use time::{TimestampParser, DEFAULT_TIME_LAYOUT};
pub use types::{Record, SharedRecord};
