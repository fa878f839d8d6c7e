//! Header registry: maps field names to positions in a record.
//!
//! Positions are resolved once, when a scan is set up, and then injected into
//! the window, cluster index and interaction set.

use crate::config::FieldNames;
use crate::error::AnalysisError;
use std::collections::HashMap;

/// The ordered field names of a record file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Headers {
    fields: Vec<String>,
}

impl Headers {
    pub fn new(fields: Vec<String>) -> Self {
        Self { fields }
    }

    /// Parse a comma-separated header line.
    pub fn from_csv(line: &str) -> Self {
        Self::new(line.split(',').map(|s| s.trim().to_string()).collect())
    }

    /// Position of the field named `name`. Names are case sensitive.
    pub fn contains(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f == name)
    }

    /// Positions of every name in `names`, or the list of names not found.
    pub fn contains_multi<'a>(
        &self,
        names: &[&'a str],
    ) -> Result<HashMap<&'a str, usize>, Vec<&'a str>> {
        let mut found = HashMap::with_capacity(names.len());
        let mut missing = Vec::new();
        for &name in names {
            match self.contains(name) {
                Some(index) => {
                    found.insert(name, index);
                }
                None => missing.push(name),
            }
        }
        if missing.is_empty() {
            Ok(found)
        } else {
            Err(missing)
        }
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Resolve the identity fields plus the geokey field.
    pub fn resolve(&self, names: &FieldNames) -> Result<FieldIndices, AnalysisError> {
        let wanted = [
            names.entity_id.as_str(),
            names.timestamp.as_str(),
            names.latitude.as_str(),
            names.longitude.as_str(),
            names.geokey.as_str(),
        ];
        let found = self.contains_multi(&wanted).map_err(|missing| {
            AnalysisError::Configuration(format!(
                "headers do not contain required field(s): {}",
                missing.join(", ")
            ))
        })?;

        Ok(FieldIndices {
            identity: IdentityIndices {
                entity_id: found[wanted[0]],
                timestamp: found[wanted[1]],
                latitude: found[wanted[2]],
                longitude: found[wanted[3]],
            },
            geokey: found[wanted[4]],
        })
    }

    /// Resolve only the identity fields needed to fingerprint a pair.
    pub fn resolve_identity(&self, names: &FieldNames) -> Result<IdentityIndices, AnalysisError> {
        let wanted = [
            names.entity_id.as_str(),
            names.timestamp.as_str(),
            names.latitude.as_str(),
            names.longitude.as_str(),
        ];
        let found = self.contains_multi(&wanted).map_err(|missing| {
            AnalysisError::Configuration(format!(
                "headers do not contain required field(s): {}",
                missing.join(", ")
            ))
        })?;

        Ok(IdentityIndices {
            entity_id: found[wanted[0]],
            timestamp: found[wanted[1]],
            latitude: found[wanted[2]],
            longitude: found[wanted[3]],
        })
    }
}

/// Positions of the fields that identify an observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IdentityIndices {
    pub entity_id: usize,
    pub timestamp: usize,
    pub latitude: usize,
    pub longitude: usize,
}

impl IdentityIndices {
    /// Positions in fingerprint order: entity, timestamp, latitude, longitude.
    pub fn positions(&self) -> [usize; 4] {
        [self.entity_id, self.timestamp, self.latitude, self.longitude]
    }
}

/// Every field position a scan needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldIndices {
    pub identity: IdentityIndices,
    pub geokey: usize,
}
