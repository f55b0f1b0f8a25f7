//! Core registry types.
//!
//! This module defines the records and snapshot documents that make up the
//! published aircraft registry, plus the per-record rules every snapshot
//! must satisfy.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::version::Version;

/// A single registered aircraft.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AircraftRecord {
    /// Registration mark, e.g. `HB-1000`. Unique within a snapshot.
    pub registration: String,

    /// ICAO type designator, e.g. `B738` or `GLID`.
    pub icao_aircraft_type: String,

    /// Free-text aircraft category, e.g. `Aeroplane`.
    pub aircraft_type: String,

    /// Maximum take-off mass in kilograms.
    pub mtom: u32,
}

impl AircraftRecord {
    /// Create a new record.
    #[must_use]
    pub fn new(
        registration: impl Into<String>,
        icao_aircraft_type: impl Into<String>,
        aircraft_type: impl Into<String>,
        mtom: u32,
    ) -> Self {
        Self {
            registration: registration.into(),
            icao_aircraft_type: icao_aircraft_type.into(),
            aircraft_type: aircraft_type.into(),
            mtom,
        }
    }

    /// Check this record against the registry rules.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] naming the registration if any field is
    /// empty, the registration does not match `pattern`, or `mtom` is zero.
    pub fn validate(&self, pattern: &Regex) -> Result<()> {
        if self.registration.trim().is_empty() {
            return Err(Error::validation("<empty>", "registration must not be empty"));
        }
        if !pattern.is_match(&self.registration) {
            return Err(Error::validation(
                &self.registration,
                format!("registration does not match pattern {}", pattern.as_str()),
            ));
        }
        if self.icao_aircraft_type.trim().is_empty() {
            return Err(Error::validation(
                &self.registration,
                "icao_aircraft_type must not be empty",
            ));
        }
        if self.aircraft_type.trim().is_empty() {
            return Err(Error::validation(
                &self.registration,
                "aircraft_type must not be empty",
            ));
        }
        if self.mtom == 0 {
            return Err(Error::validation(
                &self.registration,
                "mtom must be a positive integer",
            ));
        }
        Ok(())
    }
}

/// A versioned registry document, as published or staged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    /// Semantic version of the document.
    pub version: Version,

    /// When the document was last produced.
    pub last_updated: DateTime<Utc>,

    /// Number of entries in `aircraft`.
    pub total_count: usize,

    /// Aircraft, ordered by registration.
    pub aircraft: Vec<AircraftRecord>,
}

impl RegistrySnapshot {
    /// Create a snapshot of the given records stamped with the current time.
    ///
    /// `total_count` is derived from the records, so a snapshot built this
    /// way is always consistent.
    #[must_use]
    pub fn new(version: Version, aircraft: Vec<AircraftRecord>) -> Self {
        Self {
            version,
            last_updated: Utc::now(),
            total_count: aircraft.len(),
            aircraft,
        }
    }

    /// The snapshot that stands in for a registry that was never released.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            version: Version::ZERO,
            last_updated: DateTime::<Utc>::UNIX_EPOCH,
            total_count: 0,
            aircraft: Vec::new(),
        }
    }

    /// Build the snapshot that results from publishing these aircraft as
    /// `version`, refreshing `last_updated`.
    #[must_use]
    pub fn republished(&self, version: Version) -> Self {
        Self::new(version, self.aircraft.clone())
    }

    /// Check that `total_count` matches the number of aircraft.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.total_count == self.aircraft.len()
    }

    /// Look up an aircraft by registration.
    #[must_use]
    pub fn get(&self, registration: &str) -> Option<&AircraftRecord> {
        self.aircraft
            .iter()
            .find(|record| record.registration == registration)
    }

    /// Check every collection-level and record-level invariant.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for the first record that breaks a rule
    /// or that repeats an earlier registration. A count mismatch is reported
    /// against the pseudo-registration `<snapshot>`.
    pub fn validate(&self, pattern: &Regex) -> Result<()> {
        if !self.is_consistent() {
            return Err(Error::validation(
                "<snapshot>",
                format!(
                    "total_count is {} but {} aircraft are listed",
                    self.total_count,
                    self.aircraft.len()
                ),
            ));
        }

        let mut seen = HashSet::with_capacity(self.aircraft.len());
        for record in &self.aircraft {
            record.validate(pattern)?;
            if !seen.insert(record.registration.as_str()) {
                return Err(Error::validation(
                    &record.registration,
                    "duplicate registration",
                ));
            }
        }
        Ok(())
    }

    /// Serialize to the published on-disk form.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String> {
        let mut json = serde_json::to_string_pretty(self)?;
        json.push('\n');
        Ok(json)
    }
}
