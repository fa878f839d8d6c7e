//! Statistics for scan sessions.
//!
//! Tracks how many records were read, rejected and clustered, and how many
//! interactions were retained, so a run can be audited afterwards.

pub mod log;

// Re-export commonly used types
pub use log::{
    create_shared_log, create_shared_log_with_persistence, PersistedStats, ScanLog, ScanStats,
    SharedScanLog,
};
