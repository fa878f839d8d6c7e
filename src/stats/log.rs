//! Scan session statistics.
//!
//! Counters are atomic so the log can be shared with the Ctrl+C handler and
//! read while a scan is running.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

/// Statistics for the current scan session.
#[derive(Debug)]
pub struct ScanLog {
    /// Unique identifier of this session
    session_id: Uuid,
    /// Rows delivered by the collector
    records_read: AtomicU64,
    /// Rows rejected as malformed (bad arity, timestamp, geokey)
    records_rejected: AtomicU64,
    /// Rows older than the window's left bound when they arrived
    records_out_of_window: AtomicU64,
    /// Number of window slides
    slides: AtomicU64,
    /// Multi-member clusters handed to the interaction set
    clusters_examined: AtomicU64,
    /// Interactions newly retained
    interactions_retained: AtomicU64,
    /// Session start time
    session_start: DateTime<Utc>,
    /// Path for persisting stats
    persist_path: Option<PathBuf>,
}

impl ScanLog {
    /// Create a new scan log.
    pub fn new() -> Self {
        Self {
            session_id: Uuid::new_v4(),
            records_read: AtomicU64::new(0),
            records_rejected: AtomicU64::new(0),
            records_out_of_window: AtomicU64::new(0),
            slides: AtomicU64::new(0),
            clusters_examined: AtomicU64::new(0),
            interactions_retained: AtomicU64::new(0),
            session_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create a scan log that `save` writes to `path`.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut log = Self::new();
        log.persist_path = Some(path);
        log
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn record_read(&self) {
        self.records_read.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected(&self) {
        self.records_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn records_rejected(&self, count: u64) {
        self.records_rejected.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_out_of_window(&self) {
        self.records_out_of_window.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_slide(&self) {
        self.slides.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_clusters(&self, count: u64) {
        self.clusters_examined.fetch_add(count, Ordering::Relaxed);
    }

    pub fn record_interactions(&self, count: u64) {
        self.interactions_retained.fetch_add(count, Ordering::Relaxed);
    }

    /// Get the current statistics.
    pub fn stats(&self) -> ScanStats {
        ScanStats {
            session_id: self.session_id,
            records_read: self.records_read.load(Ordering::Relaxed),
            records_rejected: self.records_rejected.load(Ordering::Relaxed),
            records_out_of_window: self.records_out_of_window.load(Ordering::Relaxed),
            slides: self.slides.load(Ordering::Relaxed),
            clusters_examined: self.clusters_examined.load(Ordering::Relaxed),
            interactions_retained: self.interactions_retained.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Get a summary string for display.
    pub fn summary(&self) -> String {
        let stats = self.stats();
        format!(
            "Scan Statistics ({}):\n\
             - Records read: {}\n\
             - Records rejected: {}\n\
             - Records behind the window: {}\n\
             - Window slides: {}\n\
             - Clusters examined: {}\n\
             - Interactions retained: {}\n\
             - Session duration: {} seconds",
            stats.session_id,
            stats.records_read,
            stats.records_rejected,
            stats.records_out_of_window,
            stats.slides,
            stats.clusters_examined,
            stats.interactions_retained,
            stats.session_duration_secs
        )
    }

    /// Save stats to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let persisted = PersistedStats {
                stats: self.stats(),
                last_updated: Utc::now(),
            };
            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;
            std::fs::write(path, json)?;
        }
        Ok(())
    }

    /// Load the stats of the last saved session.
    pub fn load_last(path: &std::path::Path) -> Result<Option<PersistedStats>, std::io::Error> {
        if !path.exists() {
            return Ok(None);
        }
        let content = std::fs::read_to_string(path)?;
        let persisted = serde_json::from_str(&content).map_err(std::io::Error::other)?;
        Ok(Some(persisted))
    }
}

impl Default for ScanLog {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of scan statistics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanStats {
    pub session_id: Uuid,
    pub records_read: u64,
    pub records_rejected: u64,
    pub records_out_of_window: u64,
    pub slides: u64,
    pub clusters_examined: u64,
    pub interactions_retained: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

/// Stats format for persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedStats {
    #[serde(flatten)]
    pub stats: ScanStats,
    pub last_updated: DateTime<Utc>,
}

/// Thread-safe shared scan log.
pub type SharedScanLog = Arc<ScanLog>;

/// Create a new shared scan log.
pub fn create_shared_log() -> SharedScanLog {
    Arc::new(ScanLog::new())
}

/// Create a new shared scan log with persistence.
pub fn create_shared_log_with_persistence(path: PathBuf) -> SharedScanLog {
    Arc::new(ScanLog::with_persistence(path))
}
