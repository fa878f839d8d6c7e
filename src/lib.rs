//! Vessel Proximity - find pairs of vessels reported close together in space
//! and time.
//!
//! Position reports are read from a delimited file, held in a sliding time
//! window, grouped by a pre-computed spatial bucket (the geokey), and every
//! pair of distinct vessels sharing a bucket is recorded once as an
//! interaction together with its great-circle distance.
//!
//! # Guarantees
//!
//! - **Bounded window**: after every slide each stored record lies in `[left, right)`
//! - **No duplicates**: a pair seen in several window positions is kept once
//! - **Deterministic output**: interactions are written in fingerprint order
//! - **No silent loss**: malformed records are either reported or abort the scan
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Vessel Proximity                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ┌─────────────┐   ┌─────────────┐   ┌─────────────┐       │
//! │  │  Collector  │──▶│  Windowing  │──▶│  Clusters   │       │
//! │  │   (file)    │   │ (width/step)│   │  (geokey)   │       │
//! │  └─────────────┘   └─────────────┘   └─────────────┘       │
//! │         │                                    │              │
//! │         ▼                                    ▼              │
//! │  ┌─────────────┐                     ┌─────────────┐       │
//! │  │  Scan Log   │                     │Interactions │       │
//! │  │   (stats)   │                     │   (CSV)     │       │
//! │  └─────────────┘                     └─────────────┘       │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use vessel_proximity::{config::Config, core, stats, ErrorPolicy};
//!
//! let config = Config::default();
//! let log = stats::create_shared_log();
//!
//! let interactions = core::scan_file("positions.csv", &config, log).expect("scan failed");
//! interactions
//!     .save("interactions.csv", ErrorPolicy::Skip)
//!     .expect("save failed");
//! ```

pub mod collector;
pub mod config;
pub mod core;
pub mod error;
pub mod stats;

// Re-export key types at crate root for convenience
pub use collector::{CollectorError, CollectorEvent, FileCollector, Headers, Record};
pub use config::{Config, FieldNames, TimestampConfig};
pub use core::{
    scan_file, ClusterIndex, DistanceSummary, FingerprintMode, InteractionScanner, InteractionSet,
    RecordWindow,
};
pub use error::{AnalysisError, ErrorPolicy, ParseError, ParseErrorKind};
pub use stats::{ScanLog, ScanStats, SharedScanLog};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
