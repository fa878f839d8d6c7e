//! Distance statistics over emitted interactions.

use crate::core::interaction::InteractionRow;
use crate::error::AnalysisError;
use serde::{Deserialize, Serialize};
use std::path::Path;
use statrs::statistics::{Data, Median, Statistics};

/// Distribution of interaction distances in nautical miles.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DistanceSummary {
    pub count: usize,
    pub min_nm: f64,
    pub max_nm: f64,
    pub mean_nm: f64,
    pub median_nm: f64,
    /// Sample standard deviation; zero for fewer than two interactions
    pub std_dev_nm: f64,
}

impl DistanceSummary {
    /// Write the summary as pretty-printed JSON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), AnalysisError> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| AnalysisError::Serialization(e.to_string()))?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Summarize the distances of `rows`. Returns `None` when there are none.
pub fn summarize_distances(rows: &[InteractionRow]) -> Option<DistanceSummary> {
    if rows.is_empty() {
        return None;
    }

    let distances: Vec<f64> = rows.iter().map(|r| r.distance_nm).collect();
    let min_nm = distances.iter().copied().fold(f64::INFINITY, f64::min);
    let max_nm = distances.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mean_nm = (&distances).mean();
    let std_dev_nm = if distances.len() < 2 {
        0.0
    } else {
        (&distances).std_dev()
    };
    let median_nm = Data::new(distances.clone()).median();

    Some(DistanceSummary {
        count: distances.len(),
        min_nm,
        max_nm,
        mean_nm,
        median_nm,
        std_dev_nm,
    })
}
