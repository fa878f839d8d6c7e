//! Two-entity proximity interactions.
//!
//! Every unordered pair of distinct entities found in a cluster is a
//! candidate. Retained pairs are keyed by fingerprint so that the same pair
//! seen again, from an overlapping window position or in the other order, is
//! stored once.

use crate::collector::delimited::DelimitedWriter;
use crate::collector::geo::distance_nm;
use crate::collector::headers::{Headers, IdentityIndices};
use crate::collector::types::SharedRecord;
use crate::config::FieldNames;
use crate::core::cluster::Cluster;
use crate::core::fingerprint::{canonical_order, pair_fingerprint, FingerprintMode};
use crate::error::{AnalysisError, ErrorPolicy, ParseError};
use std::collections::HashMap;
use std::fs::File;
use std::io::BufWriter;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Leading output columns ahead of the two records' fields.
pub const INTERACTION_HASH_FIELD: &str = "InteractionHash";
pub const DISTANCE_FIELD: &str = "Distance(nm)";

/// Two records that were close to each other.
#[derive(Debug, Clone)]
pub struct RecordPair {
    pub first: SharedRecord,
    pub second: SharedRecord,
}

/// One emitted interaction.
#[derive(Debug, Clone)]
pub struct InteractionRow {
    pub fingerprint: u64,
    pub distance_nm: f64,
    pub first: SharedRecord,
    pub second: SharedRecord,
}

impl InteractionRow {
    /// Hex fingerprint with a `0x` prefix and sixteen digits.
    pub fn fingerprint_hex(&self) -> String {
        format!("{:#018x}", self.fingerprint)
    }

    /// Output fields: fingerprint, distance, record one, record two.
    pub fn to_fields(&self) -> Vec<String> {
        let mut fields = Vec::with_capacity(2 + self.first.len() + self.second.len());
        fields.push(self.fingerprint_hex());
        fields.push(format!("{:.1}", self.distance_nm));
        fields.extend(self.first.fields().iter().cloned());
        fields.extend(self.second.fields().iter().cloned());
        fields
    }
}

/// Result of saving an interaction set.
#[derive(Debug, Clone, Default)]
pub struct SaveReport {
    /// Interaction rows written, excluding the header row
    pub written: usize,
    /// Pairs left out because a distance could not be computed
    pub skipped: Vec<(u64, ParseError)>,
}

/// Accumulated, deduplicated interactions for a scan session.
#[derive(Debug, Clone)]
pub struct InteractionSet {
    indices: IdentityIndices,
    mode: FingerprintMode,
    output_headers: Vec<String>,
    data: HashMap<u64, RecordPair>,
}

impl InteractionSet {
    /// Create a set for records whose identity fields sit at `indices`.
    ///
    /// The output header is generic (`Field1_1`, ...) until one is supplied
    /// with [`InteractionSet::with_record_headers`]. Prefer
    /// [`InteractionSet::from_headers`], which checks the positions exist; a
    /// pair whose records lack any of these positions is never retained.
    pub fn new(indices: IdentityIndices, mode: FingerprintMode) -> Self {
        Self {
            indices,
            mode,
            output_headers: Vec::new(),
            data: HashMap::new(),
        }
    }

    /// Create a set from a header registry. Fails if any identity field is
    /// missing.
    pub fn from_headers(
        headers: &Headers,
        names: &FieldNames,
        mode: FingerprintMode,
    ) -> Result<Self, AnalysisError> {
        let indices = headers.resolve_identity(names)?;
        Ok(Self::new(indices, mode).with_record_headers(headers))
    }

    /// Derive output column names from the source record headers.
    pub fn with_record_headers(mut self, headers: &Headers) -> Self {
        self.output_headers = output_headers(headers.fields());
        self
    }

    pub fn indices(&self) -> &IdentityIndices {
        &self.indices
    }

    pub fn mode(&self) -> FingerprintMode {
        self.mode
    }

    /// Add every pair of distinct entities in `cluster`. Returns the number of
    /// pairs newly retained.
    pub fn add_cluster(&mut self, cluster: &Cluster) -> usize {
        let records = cluster.records();
        let mut added = 0;
        for (i, head) in records.iter().enumerate() {
            for other in &records[i + 1..] {
                if self.insert_pair(head, other) {
                    added += 1;
                }
            }
        }
        added
    }

    fn insert_pair(&mut self, rec1: &SharedRecord, rec2: &SharedRecord) -> bool {
        // Both records carry every identity field once this succeeds.
        let Some(forward) = pair_fingerprint(rec1, rec2, &self.indices) else {
            warn!(
                first = %rec1,
                second = %rec2,
                positions = ?self.indices.positions(),
                "pair lacks an identity field, not retained"
            );
            return false;
        };

        let entity = self.indices.entity_id;
        if rec1.field(entity) == rec2.field(entity) {
            return false;
        }

        match self.mode {
            FingerprintMode::Ordered => {
                let backward = pair_fingerprint(rec2, rec1, &self.indices);
                if self.data.contains_key(&forward)
                    || backward.is_some_and(|key| self.data.contains_key(&key))
                {
                    return false;
                }
                self.data.insert(forward, pair(rec1, rec2));
                true
            }
            FingerprintMode::Canonical => {
                let (first, second) = if std::ptr::eq(
                    canonical_order(rec1, rec2, &self.indices).0,
                    rec1.as_ref(),
                ) {
                    (rec1, rec2)
                } else {
                    (rec2, rec1)
                };
                let Some(key) = pair_fingerprint(first, second, &self.indices) else {
                    return false;
                };
                if self.data.contains_key(&key) {
                    return false;
                }
                self.data.insert(key, pair(first, second));
                true
            }
        }
    }

    /// Number of retained pairs.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn contains(&self, fingerprint: u64) -> bool {
        self.data.contains_key(&fingerprint)
    }

    /// Retained pairs ordered by fingerprint.
    pub fn pairs(&self) -> Vec<(u64, &RecordPair)> {
        let mut entries: Vec<(u64, &RecordPair)> = self.data.iter().map(|(k, p)| (*k, p)).collect();
        entries.sort_unstable_by_key(|(k, _)| *k);
        entries
    }

    /// One row per retained pair, ordered by fingerprint. A pair whose
    /// coordinates cannot be read yields an error in its place.
    pub fn emit(&self) -> Vec<Result<InteractionRow, ParseError>> {
        self.pairs()
            .into_iter()
            .map(|(fingerprint, pair)| {
                let distance = distance_nm(
                    &pair.first,
                    &pair.second,
                    self.indices.latitude,
                    self.indices.longitude,
                )?;
                Ok(InteractionRow {
                    fingerprint,
                    distance_nm: distance,
                    first: Arc::clone(&pair.first),
                    second: Arc::clone(&pair.second),
                })
            })
            .collect()
    }

    /// Output header row for `save`.
    pub fn output_headers(&self) -> Vec<String> {
        if !self.output_headers.is_empty() {
            return self.output_headers.clone();
        }
        let arity = self
            .data
            .values()
            .next()
            .map(|p| p.first.len())
            .unwrap_or(0);
        let generic: Vec<String> = (1..=arity).map(|i| format!("Field{i}")).collect();
        output_headers(&generic)
    }

    /// Write the retained interactions as comma-delimited text.
    ///
    /// Under [`ErrorPolicy::Abort`] every row is computed before the file is
    /// created, so a distance failure leaves nothing on disk.
    pub fn save(
        &self,
        path: impl AsRef<Path>,
        policy: ErrorPolicy,
    ) -> Result<SaveReport, AnalysisError> {
        let path = path.as_ref();
        let mut report = SaveReport::default();
        let mut rows = Vec::with_capacity(self.data.len());

        for (row, (fingerprint, _)) in self.emit().into_iter().zip(self.pairs()) {
            match row {
                Ok(row) => rows.push(row),
                Err(error) if policy == ErrorPolicy::Abort => return Err(error.into()),
                Err(error) => {
                    warn!(
                        fingerprint = %format!("{fingerprint:#018x}"),
                        error = %error,
                        "leaving out interaction"
                    );
                    report.skipped.push((fingerprint, error));
                }
            }
        }

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let mut writer = DelimitedWriter::new(BufWriter::new(File::create(path)?));
        writer.write_row(&self.output_headers())?;
        for row in &rows {
            writer.write_row(&row.to_fields())?;
        }
        writer.flush()?;

        report.written = rows.len();
        info!(
            path = %path.display(),
            written = report.written,
            skipped = report.skipped.len(),
            "saved interactions"
        );
        Ok(report)
    }
}

fn pair(rec1: &SharedRecord, rec2: &SharedRecord) -> RecordPair {
    RecordPair {
        first: Arc::clone(rec1),
        second: Arc::clone(rec2),
    }
}

/// `InteractionHash`, `Distance(nm)`, then each field suffixed `_1`, then `_2`.
fn output_headers<S: AsRef<str>>(fields: &[S]) -> Vec<String> {
    let mut out = Vec::with_capacity(2 + 2 * fields.len());
    out.push(INTERACTION_HASH_FIELD.to_string());
    out.push(DISTANCE_FIELD.to_string());
    for side in 1..=2 {
        out.extend(fields.iter().map(|f| format!("{}_{side}", f.as_ref())));
    }
    out
}
