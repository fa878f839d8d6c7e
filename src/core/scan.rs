//! The scan loop: window, cluster, collect interactions, slide.
//!
//! Records must arrive in roughly ascending time order. A record at or past
//! the window's right bound first triggers a clustering pass over the current
//! window, then the window slides forward by the configured step until the
//! record fits. A record older than the left bound is dropped.

use crate::collector::file::{CollectorEvent, FileCollector};
use crate::collector::headers::{FieldIndices, Headers};
use crate::collector::time::TimestampParser;
use crate::collector::types::Record;
use crate::config::Config;
use crate::core::cluster::{parse_geokey, ClusterIndex};
use crate::core::interaction::InteractionSet;
use crate::core::windowing::RecordWindow;
use crate::error::{AnalysisError, ErrorPolicy, ParseErrorKind};
use crate::stats::{ScanLog, SharedScanLog};
use chrono::{DateTime, Duration, Utc};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info, warn};

/// Drives records through the window, cluster index and interaction set.
pub struct InteractionScanner {
    indices: FieldIndices,
    width: Duration,
    step: Duration,
    parser: TimestampParser,
    policy: ErrorPolicy,
    window: Option<RecordWindow>,
    interactions: InteractionSet,
    log: SharedScanLog,
}

impl InteractionScanner {
    /// Set up a scan over records described by `headers`.
    ///
    /// Fails if the configuration is invalid or a required field is missing
    /// from the headers.
    pub fn new(
        headers: &Headers,
        config: &Config,
        log: SharedScanLog,
    ) -> Result<Self, AnalysisError> {
        config.validate()?;
        let indices = headers.resolve(&config.fields)?;
        let interactions =
            InteractionSet::new(indices.identity, config.fingerprint).with_record_headers(headers);

        Ok(Self {
            indices,
            width: config.window_width()?,
            step: config.slide_step()?,
            parser: config.timestamp.parser()?,
            policy: config.error_policy,
            window: None,
            interactions,
            log,
        })
    }

    /// The window, once the first record has been seen.
    pub fn window(&self) -> Option<&RecordWindow> {
        self.window.as_ref()
    }

    /// Interactions retained so far.
    pub fn interactions(&self) -> &InteractionSet {
        &self.interactions
    }

    pub fn log(&self) -> &ScanLog {
        &self.log
    }

    /// Feed one record into the scan.
    pub fn process(&mut self, record: Record) -> Result<(), AnalysisError> {
        self.log.record_read();

        let t = match self.check(&record) {
            Ok(t) => t,
            Err(error) if self.policy == ErrorPolicy::Abort => return Err(error),
            Err(error) => {
                warn!(error = %error, record = %record, "skipping record");
                self.log.record_rejected();
                return Ok(());
            }
        };

        if self.window.is_none() {
            let window = RecordWindow::new(t, self.width, self.indices.identity.timestamp)?
                .with_parser(self.parser.clone())
                .with_policy(self.policy);
            debug!(left = %window.left(), right = %window.right(), "window opened");
            self.window = Some(window);
        }

        self.advance_to(t)?;

        if let Some(window) = self.window.as_mut() {
            if t < window.left() {
                debug!(timestamp = %t, left = %window.left(), "record behind window");
                self.log.record_out_of_window();
            } else {
                window.add_record(record);
            }
        }
        Ok(())
    }

    /// Cluster the final window position and hand back the interactions.
    pub fn finish(mut self) -> Result<InteractionSet, AnalysisError> {
        if let Some(window) = self.window.as_ref() {
            if !window.is_empty() {
                cluster_window(
                    window,
                    self.indices.geokey,
                    self.policy,
                    &mut self.interactions,
                    &self.log,
                )?;
            }
        }
        info!(interactions = self.interactions.len(), "scan finished");
        Ok(self.interactions)
    }

    /// Parse the fields every record needs before it can enter the window.
    fn check(&self, record: &Record) -> Result<DateTime<Utc>, AnalysisError> {
        let t = self.parser.parse(record, self.indices.identity.timestamp)?;
        let geokey = self.indices.geokey;
        parse_geokey(record.require(geokey, ParseErrorKind::GeoKey)?, geokey)?;
        Ok(t)
    }

    /// Slide until `t` is before the right bound, clustering each occupied
    /// window position on the way.
    fn advance_to(&mut self, t: DateTime<Utc>) -> Result<(), AnalysisError> {
        let step_ms = self.step.num_milliseconds().max(1);

        while let Some(window) = self.window.as_mut() {
            if t < window.right() {
                break;
            }

            if window.is_empty() {
                // Nothing to cluster: jump to the first position that covers t.
                let steps = (t - window.right()).num_milliseconds() / step_ms + 1;
                window.slide(Duration::milliseconds(step_ms * steps))?;
            } else {
                cluster_window(
                    window,
                    self.indices.geokey,
                    self.policy,
                    &mut self.interactions,
                    &self.log,
                )?;
                let report = window.slide(self.step)?;
                self.log.records_rejected(report.rejected.len() as u64);
            }
            self.log.record_slide();
        }
        Ok(())
    }
}

fn cluster_window(
    window: &RecordWindow,
    geokey_index: usize,
    policy: ErrorPolicy,
    interactions: &mut InteractionSet,
    log: &ScanLog,
) -> Result<(), AnalysisError> {
    let snapshot = window.snapshot();
    let index = ClusterIndex::build(&snapshot, geokey_index, policy)?;

    let mut clusters = 0u64;
    let mut added = 0usize;
    for (_, cluster) in index.multi_member() {
        clusters += 1;
        added += interactions.add_cluster(cluster);
    }
    log.record_clusters(clusters);
    log.record_interactions(added as u64);

    debug!(
        left = %window.left(),
        records = snapshot.len(),
        geokeys = index.len(),
        clusters,
        added,
        "window clustered"
    );
    Ok(())
}

/// Run a scan over every record `collector` delivers.
///
/// The scan stops early, keeping what it found so far, once `running` is
/// cleared.
pub fn run_scan(
    collector: &mut FileCollector,
    config: &Config,
    log: SharedScanLog,
    running: &AtomicBool,
) -> Result<InteractionSet, AnalysisError> {
    let mut scanner = InteractionScanner::new(collector.headers(), config, log)?;
    collector.start()?;

    let receiver = collector.receiver().clone();
    while running.load(Ordering::SeqCst) {
        match receiver.recv_timeout(std::time::Duration::from_millis(100)) {
            Ok(CollectorEvent::Record(record)) => scanner.process(record)?,
            Ok(CollectorEvent::Malformed { line, reason }) => {
                if config.error_policy == ErrorPolicy::Abort {
                    return Err(AnalysisError::MalformedRow { line, reason });
                }
                warn!(line, reason = %reason, "skipping malformed row");
                scanner.log.record_read();
                scanner.log.record_rejected();
            }
            Ok(CollectorEvent::Finished) => break,
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => continue,
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => break,
        }
    }

    collector.stop();
    scanner.finish()
}

/// Scan a delimited file to completion.
pub fn scan_file(
    path: impl AsRef<Path>,
    config: &Config,
    log: SharedScanLog,
) -> Result<InteractionSet, AnalysisError> {
    let mut collector = FileCollector::open(path)?;
    let running = AtomicBool::new(true);
    run_scan(&mut collector, config, log, &running)
}
