//! Grouping of window contents by geokey.
//!
//! The geokey field carries a pre-encoded spatial bucket written as an
//! unsigned integer with an optional radix prefix (`0x`, `0o`, `0b`, or a
//! leading `0` for octal). It is only ever compared for equality here.

use crate::collector::types::SharedRecord;
use crate::error::{AnalysisError, ErrorPolicy, ParseError, ParseErrorKind};
use std::collections::HashMap;
use std::fmt;
use tracing::warn;

/// Discretized location bucket.
pub type GeoKey = u64;

/// Decode a geokey field. The prefix picks the base, otherwise decimal.
pub fn parse_geokey(text: &str, index: usize) -> Result<GeoKey, ParseError> {
    let err = |reason: &str| ParseError::new(ParseErrorKind::GeoKey, index, text, reason);

    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(err("empty geokey"));
    }

    let lower = trimmed.to_ascii_lowercase();
    let (digits, radix) = if let Some(rest) = lower.strip_prefix("0x") {
        (rest, 16)
    } else if let Some(rest) = lower.strip_prefix("0o") {
        (rest, 8)
    } else if let Some(rest) = lower.strip_prefix("0b") {
        (rest, 2)
    } else if lower.len() > 1 && lower.starts_with('0') {
        (&lower[1..], 8)
    } else {
        (lower.as_str(), 10)
    };

    // from_str_radix accepts a leading '+', which a geokey never carries.
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return Err(err("invalid digit for radix"));
    }
    u64::from_str_radix(digits, radix).map_err(|e| err(&e.to_string()))
}

/// Records sharing one geokey, in the order they were encountered.
#[derive(Debug, Clone, Default)]
pub struct Cluster {
    records: Vec<SharedRecord>,
}

impl Cluster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, record: SharedRecord) {
        self.records.push(record);
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[SharedRecord] {
        &self.records
    }

    /// The same members in reverse order.
    pub fn reversed(&self) -> Self {
        Self {
            records: self.records.iter().rev().cloned().collect(),
        }
    }
}

impl FromIterator<SharedRecord> for Cluster {
    fn from_iter<I: IntoIterator<Item = SharedRecord>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

impl fmt::Display for Cluster {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for record in &self.records {
            writeln!(f, "{record}")?;
        }
        Ok(())
    }
}

/// A record skipped because its geokey could not be decoded.
#[derive(Debug, Clone)]
pub struct SkippedRecord {
    pub record: SharedRecord,
    pub error: ParseError,
}

/// Partition of a record sequence into clusters keyed by geokey.
#[derive(Debug, Clone, Default)]
pub struct ClusterIndex {
    clusters: HashMap<GeoKey, Cluster>,
    skipped: Vec<SkippedRecord>,
}

impl ClusterIndex {
    /// Group `records` by the geokey stored at `geokey_index`.
    ///
    /// Under [`ErrorPolicy::Abort`] the first malformed geokey fails the
    /// whole grouping; under [`ErrorPolicy::Skip`] it is recorded in
    /// [`ClusterIndex::skipped`] and the remaining records are grouped.
    pub fn build<'a, I>(
        records: I,
        geokey_index: usize,
        policy: ErrorPolicy,
    ) -> Result<Self, AnalysisError>
    where
        I: IntoIterator<Item = &'a SharedRecord>,
    {
        let mut index = Self::default();

        for record in records {
            let key = record
                .require(geokey_index, ParseErrorKind::GeoKey)
                .and_then(|text| parse_geokey(text, geokey_index));

            match key {
                Ok(key) => index
                    .clusters
                    .entry(key)
                    .or_default()
                    .append(SharedRecord::clone(record)),
                Err(error) if policy == ErrorPolicy::Abort => return Err(error.into()),
                Err(error) => {
                    warn!(error = %error, record = %record, "skipping record with malformed geokey");
                    index.skipped.push(SkippedRecord {
                        record: SharedRecord::clone(record),
                        error,
                    });
                }
            }
        }

        Ok(index)
    }

    /// Number of distinct geokeys.
    pub fn len(&self) -> usize {
        self.clusters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clusters.is_empty()
    }

    pub fn get(&self, key: GeoKey) -> Option<&Cluster> {
        self.clusters.get(&key)
    }

    /// All clusters, ordered by geokey.
    pub fn clusters(&self) -> Vec<(GeoKey, &Cluster)> {
        let mut entries: Vec<(GeoKey, &Cluster)> =
            self.clusters.iter().map(|(k, c)| (*k, c)).collect();
        entries.sort_unstable_by_key(|(k, _)| *k);
        entries
    }

    /// Clusters with at least two members, ordered by geokey. Only these can
    /// produce interactions.
    pub fn multi_member(&self) -> impl Iterator<Item = (GeoKey, &Cluster)> + '_ {
        self.clusters().into_iter().filter(|(_, c)| c.len() > 1)
    }

    /// Records left out because of a malformed geokey.
    pub fn skipped(&self) -> &[SkippedRecord] {
        &self.skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::types::Record;
    use std::sync::Arc;

    fn rec(mmsi: &str, geokey: &str) -> SharedRecord {
        Arc::new(Record::from(
            &[mmsi, "2017-12-01T00:00:03", "30.28963", "-116.73522", geokey][..],
        ))
    }

    #[test]
    fn test_parse_geokey_radix_prefixes() {
        assert_eq!(parse_geokey("0xdf3ff00000000000", 4).unwrap(), 0xdf3f_f000_0000_0000);
        assert_eq!(parse_geokey("0XFF", 4).unwrap(), 255);
        assert_eq!(parse_geokey("0o17", 4).unwrap(), 15);
        assert_eq!(parse_geokey("017", 4).unwrap(), 15);
        assert_eq!(parse_geokey("0b101", 4).unwrap(), 5);
        assert_eq!(parse_geokey("1234", 4).unwrap(), 1234);
        assert_eq!(parse_geokey("0", 4).unwrap(), 0);
    }

    #[test]
    fn test_parse_geokey_rejects() {
        for bad in ["", "0x", "+12", "-1", "0xZZ", "089", "18446744073709551616", "abc"] {
            let err = parse_geokey(bad, 4).unwrap_err();
            assert_eq!(err.kind, ParseErrorKind::GeoKey, "input {bad:?}");
        }
    }

    #[test]
    fn test_cluster_append_and_len() {
        let mut cluster = Cluster::new();
        assert!(cluster.is_empty());
        cluster.append(rec("1", "0x1"));
        cluster.append(rec("2", "0x1"));
        assert_eq!(cluster.len(), 2);
        assert_eq!(cluster.reversed().records()[0].field(0), Some("2"));
        assert_eq!(cluster.to_string().lines().count(), 2);
    }

    #[test]
    fn test_build_groups_by_key_preserving_order() {
        let records = vec![
            rec("1", "0x10"),
            rec("2", "0x20"),
            rec("3", "16"),
            rec("4", "0x10"),
        ];
        let index = ClusterIndex::build(&records, 4, ErrorPolicy::Skip).unwrap();
        assert_eq!(index.len(), 2);

        let sixteen = index.get(16).unwrap();
        let members: Vec<_> = sixteen.records().iter().map(|r| r.field(0).unwrap()).collect();
        assert_eq!(members, vec!["1", "3", "4"]);
        assert_eq!(index.get(32).unwrap().len(), 1);

        let multi: Vec<GeoKey> = index.multi_member().map(|(k, _)| k).collect();
        assert_eq!(multi, vec![16]);
        let keys: Vec<GeoKey> = index.clusters().iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec![16, 32]);
    }

    #[test]
    fn test_build_skip_isolates_malformed_record() {
        let records = vec![rec("1", "0x10"), rec("2", "north"), rec("3", "0x10")];
        let index = ClusterIndex::build(&records, 4, ErrorPolicy::Skip).unwrap();
        assert_eq!(index.len(), 1);
        assert_eq!(index.get(16).unwrap().len(), 2);
        assert_eq!(index.skipped().len(), 1);
        assert_eq!(index.skipped()[0].record.field(0), Some("2"));
    }

    #[test]
    fn test_build_abort_fails_batch() {
        let records = vec![rec("1", "0x10"), rec("2", "north")];
        let err = ClusterIndex::build(&records, 4, ErrorPolicy::Abort).unwrap_err();
        assert!(matches!(err, AnalysisError::Parse(_)));
    }

    #[test]
    fn test_build_missing_field() {
        let short = vec![Arc::new(Record::from(&["1", "t"][..]))];
        let index = ClusterIndex::build(&short, 4, ErrorPolicy::Skip).unwrap();
        assert!(index.is_empty());
        assert_eq!(index.skipped().len(), 1);
    }
}
