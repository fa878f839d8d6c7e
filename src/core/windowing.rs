//! Time-bounded record window.
//!
//! The window covers the half-open interval `[left, right)` with a fixed
//! width. Records are keyed by content hash, so re-adding an identical report
//! overwrites rather than duplicates. Membership is not checked on insert; it
//! is enforced by `validate` and `slide`.

use crate::collector::time::TimestampParser;
use crate::collector::types::{Record, SharedRecord};
use crate::error::{AnalysisError, ErrorPolicy, ParseError};
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// A stored record whose timestamp could not be parsed during validation.
#[derive(Debug, Clone)]
pub struct RejectedRecord {
    pub record: SharedRecord,
    pub error: ParseError,
}

/// Outcome of a validation pass.
#[derive(Debug, Clone, Default)]
pub struct SlideReport {
    /// Records removed because they fell outside the bounds
    pub evicted: usize,
    /// Records removed because their timestamp was malformed
    pub rejected: Vec<RejectedRecord>,
}

impl SlideReport {
    /// Total records removed from the window.
    pub fn removed(&self) -> usize {
        self.evicted + self.rejected.len()
    }
}

/// Keyed, time-bounded container of records.
#[derive(Debug, Clone)]
pub struct RecordWindow {
    left: DateTime<Utc>,
    right: DateTime<Utc>,
    width: Duration,
    time_index: usize,
    parser: TimestampParser,
    policy: ErrorPolicy,
    data: HashMap<u64, SharedRecord>,
}

impl RecordWindow {
    /// Create a window starting at `left` covering `width`.
    ///
    /// A zero or negative width, or one that carries `right` past the
    /// representable date range, is a configuration error.
    pub fn new(
        left: DateTime<Utc>,
        width: Duration,
        time_index: usize,
    ) -> Result<Self, AnalysisError> {
        if width <= Duration::zero() {
            return Err(AnalysisError::Configuration(format!(
                "window width must be positive, got {width}"
            )));
        }
        let right = bound_after(left, width)?;
        Ok(Self {
            left,
            right,
            width,
            time_index,
            parser: TimestampParser::default(),
            policy: ErrorPolicy::default(),
            data: HashMap::new(),
        })
    }

    /// Create a window whose left bound is the timestamp of `first`.
    ///
    /// `first` is not added to the window.
    pub fn from_first_record(
        first: &Record,
        width: Duration,
        time_index: usize,
        parser: TimestampParser,
    ) -> Result<Self, AnalysisError> {
        let left = parser.parse(first, time_index)?;
        Ok(Self::new(left, width, time_index)?.with_parser(parser))
    }

    /// Use `parser` for the timestamp field.
    pub fn with_parser(mut self, parser: TimestampParser) -> Self {
        self.parser = parser;
        self
    }

    /// Choose how validation treats malformed timestamps.
    pub fn with_policy(mut self, policy: ErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Get the inclusive lower bound.
    pub fn left(&self) -> DateTime<Utc> {
        self.left
    }

    /// Get the exclusive upper bound, always `left + width`.
    pub fn right(&self) -> DateTime<Utc> {
        self.right
    }

    /// Get the fixed width of the window.
    pub fn width(&self) -> Duration {
        self.width
    }

    /// Get the position of the timestamp field in stored records.
    pub fn time_index(&self) -> usize {
        self.time_index
    }

    /// Get how malformed timestamps are treated during validation.
    pub fn policy(&self) -> ErrorPolicy {
        self.policy
    }

    /// Store `record`, replacing any structurally equal record. Returns its
    /// content hash.
    pub fn add_record(&mut self, record: impl Into<SharedRecord>) -> u64 {
        let record: SharedRecord = record.into();
        let hash = record.content_hash();
        self.data.insert(hash, record);
        hash
    }

    /// Check if a timestamp falls within `[left, right)`.
    pub fn in_window(&self, t: DateTime<Utc>) -> bool {
        t >= self.left && t < self.right
    }

    /// Parse the record's timestamp and check it against the bounds.
    pub fn record_in_window(&self, record: &Record) -> Result<bool, ParseError> {
        let t = self.parser.parse(record, self.time_index)?;
        Ok(self.in_window(t))
    }

    /// Move the window by `delta` and evict records that fall outside.
    ///
    /// `right` is recomputed from `left` and the width rather than
    /// incremented. `delta` may be zero or negative.
    ///
    /// Under [`ErrorPolicy::Abort`] a malformed timestamp fails the slide and
    /// leaves both bounds and contents unchanged. Under
    /// [`ErrorPolicy::Skip`] the malformed record is removed and reported.
    /// A delta that moves either bound out of the representable date range
    /// fails without touching the window.
    pub fn slide(&mut self, delta: Duration) -> Result<SlideReport, AnalysisError> {
        let left = bound_after(self.left, delta)?;
        let right = bound_after(left, self.width)?;
        let report = self.evict_outside(left, right)?;
        debug!(
            left = %self.left,
            right = %self.right,
            evicted = report.evicted,
            rejected = report.rejected.len(),
            remaining = self.data.len(),
            "window slid"
        );
        Ok(report)
    }

    /// Evict records outside the current bounds.
    pub fn validate(&mut self) -> Result<SlideReport, AnalysisError> {
        self.evict_outside(self.left, self.right)
    }

    /// Plan every removal first, then apply the plan together with the new
    /// bounds. Nothing is mutated when the plan fails.
    fn evict_outside(
        &mut self,
        left: DateTime<Utc>,
        right: DateTime<Utc>,
    ) -> Result<SlideReport, AnalysisError> {
        let mut outside = Vec::new();
        let mut rejected = Vec::new();

        for (&hash, record) in &self.data {
            match self.parser.parse(record, self.time_index) {
                Ok(t) if t >= left && t < right => {}
                Ok(_) => outside.push(hash),
                Err(error) => {
                    if self.policy == ErrorPolicy::Abort {
                        return Err(error.into());
                    }
                    rejected.push((hash, error));
                }
            }
        }

        self.left = left;
        self.right = right;

        for hash in &outside {
            self.data.remove(hash);
        }

        let mut report = SlideReport {
            evicted: outside.len(),
            rejected: Vec::with_capacity(rejected.len()),
        };
        for (hash, error) in rejected {
            if let Some(record) = self.data.remove(&hash) {
                warn!(error = %error, record = %record, "dropping record with malformed timestamp");
                report.rejected.push(RejectedRecord { record, error });
            }
        }
        Ok(report)
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Check if a structurally equal record is stored.
    pub fn contains(&self, record: &Record) -> bool {
        self.data.contains_key(&record.content_hash())
    }

    /// Stored records ordered by content hash.
    pub fn snapshot(&self) -> Vec<SharedRecord> {
        let mut entries: Vec<(&u64, &SharedRecord)> = self.data.iter().collect();
        entries.sort_unstable_by_key(|(hash, _)| **hash);
        entries.into_iter().map(|(_, r)| Arc::clone(r)).collect()
    }
}

fn bound_after(t: DateTime<Utc>, delta: Duration) -> Result<DateTime<Utc>, AnalysisError> {
    t.checked_add_signed(delta).ok_or_else(|| {
        AnalysisError::Configuration(format!(
            "window bound {t} moved by {delta} leaves the supported date range"
        ))
    })
}

impl fmt::Display for RecordWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for record in self.snapshot() {
            writeln!(f, "{record}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2017, 12, 1, 0, 0, 1).unwrap()
    }

    fn report_at(mmsi: &str, t: DateTime<Utc>) -> Record {
        let stamp = t.format("%Y-%m-%dT%H:%M:%S").to_string();
        Record::from(&[mmsi, stamp.as_str(), "30.28963", "-116.73522"][..])
    }

    fn window(width_secs: i64) -> RecordWindow {
        RecordWindow::new(t0(), Duration::seconds(width_secs), 1).unwrap()
    }

    #[test]
    fn test_window_creation() {
        let win = window(5);
        assert_eq!(win.left(), t0());
        assert_eq!(win.right(), t0() + Duration::seconds(5));
        assert!(win.is_empty());
    }

    #[test]
    fn test_non_positive_width_rejected() {
        assert!(matches!(
            RecordWindow::new(t0(), Duration::zero(), 1),
            Err(AnalysisError::Configuration(_))
        ));
        assert!(RecordWindow::new(t0(), Duration::seconds(-5), 1).is_err());
    }

    #[test]
    fn test_from_first_record() {
        let first = report_at("1", t0());
        let win = RecordWindow::from_first_record(
            &first,
            Duration::seconds(5),
            1,
            TimestampParser::default(),
        )
        .unwrap();
        assert_eq!(win.left(), t0());
        assert!(win.is_empty());
    }

    #[test]
    fn test_window_contains() {
        let win = window(5);
        assert!(win.in_window(t0()));
        assert!(win.in_window(t0() + Duration::seconds(4)));
        assert!(!win.in_window(t0() + Duration::seconds(5)));
        assert!(!win.in_window(t0() - Duration::seconds(1)));
    }

    #[test]
    fn test_add_record_overwrites_equal_records() {
        let mut win = window(5);
        let h1 = win.add_record(report_at("1", t0()));
        let h2 = win.add_record(report_at("1", t0()));
        assert_eq!(h1, h2);
        assert_eq!(win.len(), 1);
        win.add_record(report_at("2", t0()));
        assert_eq!(win.len(), 2);
    }

    #[test]
    fn test_record_in_window() {
        let win = window(5);
        assert!(win.record_in_window(&report_at("1", t0())).unwrap());
        assert!(!win
            .record_in_window(&report_at("1", t0() + Duration::seconds(6)))
            .unwrap());
        let bad = Record::from(&["1", "2017-12-01Txx:00:02", "30.1", "-116.7"][..]);
        assert!(win.record_in_window(&bad).is_err());
    }

    #[test]
    fn test_eviction_example() {
        let mut win = window(5);
        win.add_record(report_at("1", t0() - Duration::seconds(1)));
        let inside = report_at("2", t0() + Duration::seconds(1));
        win.add_record(inside.clone());
        assert_eq!(win.len(), 2);

        let report = win.validate().unwrap();
        assert_eq!(report.evicted, 1);
        assert_eq!(win.len(), 1);
        assert!(win.contains(&inside));

        win.slide(Duration::seconds(6)).unwrap();
        assert_eq!(win.left(), t0() + Duration::seconds(6));
        assert_eq!(win.right(), t0() + Duration::seconds(11));
        assert_eq!(win.len(), 0);
    }

    #[test]
    fn test_width_past_date_range_rejected() {
        let result = RecordWindow::new(t0(), Duration::seconds(9_000_000_000_000), 1);
        assert!(matches!(result, Err(AnalysisError::Configuration(_))));
    }

    #[test]
    fn test_slide_past_date_range_leaves_window_untouched() {
        let mut win = window(5);
        win.add_record(report_at("1", t0() + Duration::seconds(1)));

        for delta in [Duration::seconds(9_000_000_000_000), Duration::seconds(-9_000_000_000_000)] {
            let err = win.slide(delta).unwrap_err();
            assert!(matches!(err, AnalysisError::Configuration(_)));
            assert_eq!(win.left(), t0());
            assert_eq!(win.right(), t0() + Duration::seconds(5));
            assert_eq!(win.len(), 1);
        }
    }

    #[test]
    fn test_negative_and_zero_slide() {
        let mut win = window(5);
        win.add_record(report_at("1", t0() + Duration::seconds(1)));
        win.slide(Duration::zero()).unwrap();
        assert_eq!(win.len(), 1);

        win.slide(Duration::seconds(-3)).unwrap();
        assert_eq!(win.left(), t0() - Duration::seconds(3));
        assert_eq!(win.right(), t0() + Duration::seconds(2));
        assert_eq!(win.len(), 1);

        win.slide(Duration::seconds(-2)).unwrap();
        assert_eq!(win.len(), 0);
    }

    #[test]
    fn test_slide_skip_reports_malformed_and_finishes_eviction() {
        let mut win = window(5);
        let bad = Record::from(&["9", "2017-12-01Txx:00:02", "30.1", "-116.7"][..]);
        win.add_record(bad.clone());
        win.add_record(report_at("1", t0()));
        win.add_record(report_at("2", t0() + Duration::seconds(4)));
        win.add_record(report_at("3", t0() + Duration::seconds(6)));

        let report = win.slide(Duration::seconds(2)).unwrap();
        assert_eq!(report.evicted, 1);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(*report.rejected[0].record, bad);
        assert_eq!(report.removed(), 2);
        assert_eq!(win.len(), 2);
    }

    #[test]
    fn test_slide_abort_leaves_window_untouched() {
        let mut win = window(5).with_policy(ErrorPolicy::Abort);
        win.add_record(Record::from(&["9", "garbage", "30.1", "-116.7"][..]));
        win.add_record(report_at("1", t0()));
        win.add_record(report_at("2", t0() + Duration::seconds(4)));

        let err = win.slide(Duration::seconds(2)).unwrap_err();
        assert!(matches!(err, AnalysisError::Parse(_)));
        assert_eq!(win.left(), t0());
        assert_eq!(win.right(), t0() + Duration::seconds(5));
        assert_eq!(win.len(), 3);
    }

    #[test]
    fn test_snapshot_sorted_by_content_hash() {
        let mut win = window(5);
        for i in 0..10 {
            win.add_record(report_at(&i.to_string(), t0()));
        }
        let hashes: Vec<u64> = win.snapshot().iter().map(|r| r.content_hash()).collect();
        let mut sorted = hashes.clone();
        sorted.sort_unstable();
        assert_eq!(hashes, sorted);
        assert_eq!(win.to_string().lines().count(), 10);
    }

    proptest! {
        #[test]
        fn test_slide_keeps_only_records_in_bounds(
            width in 1i64..120,
            offsets in proptest::collection::vec(-200i64..200, 0..40),
            delta in -150i64..150,
        ) {
            let mut win = window(width);
            for (i, offset) in offsets.iter().enumerate() {
                win.add_record(report_at(&i.to_string(), t0() + Duration::seconds(*offset)));
            }
            win.slide(Duration::seconds(delta)).unwrap();

            prop_assert_eq!(win.right(), win.left() + Duration::seconds(width));
            let expected = offsets
                .iter()
                .filter(|&&o| o >= delta && o < delta + width)
                .count();
            prop_assert_eq!(win.len(), expected);
            for record in win.snapshot() {
                prop_assert!(win.record_in_window(&record).unwrap());
            }
        }
    }
}
