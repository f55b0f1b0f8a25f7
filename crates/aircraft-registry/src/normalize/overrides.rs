//! Manual corrections layered over the source data.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Partial record fields supplied by an override.
///
/// Fields left out keep the value from the source feed. Unknown keys are
/// ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AircraftOverride {
    /// Replacement ICAO type designator.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icao_aircraft_type: Option<String>,

    /// Replacement aircraft category.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aircraft_type: Option<String>,

    /// Replacement maximum take-off mass.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mtom: Option<u32>,
}

/// Overrides keyed by registration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverrideSet {
    entries: BTreeMap<String, AircraftOverride>,
}

impl OverrideSet {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load overrides from a JSON file.
    ///
    /// A missing file yields an empty set.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Overrides`] if the file exists but cannot be read or
    /// does not hold a valid override object.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!(path = %path.display(), "No override file, continuing without overrides");
            return Ok(Self::new());
        }

        let overrides_error = |message: String| Error::Overrides {
            path: path.to_path_buf(),
            message,
        };

        let text = std::fs::read_to_string(path).map_err(|e| overrides_error(e.to_string()))?;
        let set = Self::from_json(&text).map_err(overrides_error)?;
        info!(path = %path.display(), count = set.len(), "Loaded overrides");
        Ok(set)
    }

    /// Parse overrides from JSON text.
    ///
    /// Top-level keys starting with `_` are comments and are skipped.
    ///
    /// # Errors
    ///
    /// Returns a description of the first malformed entry, or of two keys
    /// that name the same registration once whitespace is trimmed.
    pub fn from_json(text: &str) -> std::result::Result<Self, String> {
        let raw: BTreeMap<String, serde_json::Value> =
            serde_json::from_str(text).map_err(|e| e.to_string())?;

        let mut entries = BTreeMap::new();
        for (registration, value) in raw {
            if registration.starts_with('_') {
                continue;
            }
            let entry: AircraftOverride = serde_json::from_value(value)
                .map_err(|e| format!("entry {registration}: {e}"))?;
            let key = registration.trim().to_string();
            if entries.insert(key.clone(), entry).is_some() {
                return Err(format!("duplicate entry {key} after trimming whitespace"));
            }
        }
        Ok(Self { entries })
    }

    /// Add or replace the override for `registration`.
    pub fn insert(&mut self, registration: impl Into<String>, entry: AircraftOverride) {
        self.entries.insert(registration.into(), entry);
    }

    /// Look up the override for a registration.
    #[must_use]
    pub fn get(&self, registration: &str) -> Option<&AircraftOverride> {
        self.entries.get(registration)
    }

    /// Iterate over overrides in registration order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &AircraftOverride)> {
        self.entries.iter()
    }

    /// Number of overrides.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check whether there are no overrides.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
