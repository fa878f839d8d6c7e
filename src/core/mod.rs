//! Core functionality of the proximity scanner.
//!
//! This module contains:
//! - The time-bounded record window
//! - Grouping of window contents into geokey clusters
//! - Pair fingerprints and the deduplicated interaction set
//! - The scan loop tying them together
//! - Distance statistics over the result

pub mod cluster;
pub mod fingerprint;
pub mod interaction;
pub mod scan;
pub mod summary;
pub mod windowing;

// Re-export commonly used types
pub use cluster::{parse_geokey, Cluster, ClusterIndex, GeoKey, SkippedRecord};
pub use fingerprint::{canonical_fingerprint, pair_fingerprint, FingerprintMode, Fnv1a64};
pub use interaction::{InteractionRow, InteractionSet, RecordPair, SaveReport};
pub use scan::{run_scan, scan_file, InteractionScanner};
pub use summary::{summarize_distances, DistanceSummary};
pub use windowing::{RecordWindow, RejectedRecord, SlideReport};
