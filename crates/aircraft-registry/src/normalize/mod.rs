//! Normalization of raw feed rows into registry records.
//!
//! The normalizer turns the raw dataset into the sorted, validated aircraft
//! list that goes into a staging snapshot:
//!
//! - **Status filtering**: only rows whose status is in the allowed set are
//!   kept.
//! - **Projection**: registration, ICAO type, aircraft type and MTOM are
//!   extracted; every other column is dropped.
//! - **Overrides**: manual corrections replace source fields and may add
//!   aircraft that the feed lacks or filtered out.
//! - **Validation**: every resulting record must pass the registry rules.
//!
//! # Example
//!
//! ```
//! use aircraft_registry::fetch::parse_csv;
//! use aircraft_registry::normalize::{Normalizer, OverrideSet};
//! use aircraft_registry::Config;
//!
//! let dataset = parse_csv(
//!     "Registration;ICAO Aircraft Type;Aircraft Type;MTOM;Status\n\
//!      HB-1000;GLID;Glider;340;Registered\n\
//!      HB-2000;B738;Aeroplane;79000;Deregistered\n",
//!     b';',
//! )
//! .unwrap();
//!
//! let normalizer = Normalizer::from_config(&Config::default()).unwrap();
//! let normalized = normalizer.normalize(&dataset, &OverrideSet::new()).unwrap();
//! assert_eq!(normalized.records.len(), 1);
//! assert_eq!(normalized.records[0].registration, "HB-1000");
//! ```

mod overrides;

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;

use regex::Regex;
use tracing::{debug, trace, warn};

use crate::config::{ColumnConfig, Config};
use crate::error::{Error, Result};
use crate::fetch::{RawDataset, RawRecord};
use crate::registry::AircraftRecord;

pub use overrides::{AircraftOverride, OverrideSet};

/// What happened to a single feed row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    /// The row became a registry candidate.
    Kept(Candidate),

    /// The row's status is not one the registry publishes.
    Filtered {
        /// The status found in the row.
        status: String,
    },

    /// The row cannot identify an aircraft or its type.
    Skipped {
        /// Why the row was skipped.
        reason: String,
    },
}

/// A projected row whose MTOM may still be unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Candidate {
    /// Registration mark.
    pub registration: String,
    /// ICAO type designator.
    pub icao_aircraft_type: String,
    /// Aircraft category.
    pub aircraft_type: String,
    /// Maximum take-off mass, if the feed supplied a usable number.
    pub mtom: Option<u32>,
}

impl Candidate {
    fn apply(&mut self, entry: &AircraftOverride) {
        if let Some(icao) = &entry.icao_aircraft_type {
            self.icao_aircraft_type.clone_from(icao);
        }
        if let Some(aircraft_type) = &entry.aircraft_type {
            self.aircraft_type.clone_from(aircraft_type);
        }
        if let Some(mtom) = entry.mtom {
            self.mtom = Some(mtom);
        }
    }

    fn into_record(self, pattern: &Regex) -> Result<AircraftRecord> {
        let mtom = match self.mtom {
            Some(mtom) if mtom > 0 => mtom,
            _ => {
                return Err(Error::validation(
                    &self.registration,
                    "mtom is missing or not a positive integer",
                ))
            }
        };
        let record = AircraftRecord {
            registration: self.registration,
            icao_aircraft_type: self.icao_aircraft_type,
            aircraft_type: self.aircraft_type,
            mtom,
        };
        record.validate(pattern)?;
        Ok(record)
    }
}

/// Counters describing one normalization run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizeStats {
    /// Rows read from the feed.
    pub rows_seen: usize,
    /// Rows dropped because of their status.
    pub filtered_by_status: usize,
    /// Rows that became candidates before overrides were applied.
    pub kept: usize,
    /// Rows dropped because they lack a registration or an aircraft type.
    pub skipped: usize,
    /// Overrides applied, including those that added aircraft.
    pub overrides_applied: usize,
    /// Aircraft that exist only because of an override.
    pub added_by_overrides: usize,
}

/// The result of normalizing a dataset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    /// Validated records, sorted by registration.
    pub records: Vec<AircraftRecord>,
    /// Run statistics.
    pub stats: NormalizeStats,
}

/// Maps raw rows to registry records.
#[derive(Debug, Clone)]
pub struct Normalizer {
    columns: ColumnConfig,
    allowed_statuses: Vec<String>,
    pattern: Regex,
}

impl Normalizer {
    /// Create a normalizer.
    #[must_use]
    pub fn new(columns: ColumnConfig, allowed_statuses: Vec<String>, pattern: Regex) -> Self {
        Self {
            columns,
            allowed_statuses,
            pattern,
        }
    }

    /// Create a normalizer from the `[source]` and `[registry]` configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the registration pattern does not compile.
    pub fn from_config(config: &Config) -> Result<Self> {
        Ok(Self::new(
            config.source.columns.clone(),
            config.source.allowed_statuses.clone(),
            config.registration_regex()?,
        ))
    }

    /// Check whether a status is published.
    #[must_use]
    pub fn is_status_allowed(&self, status: &str) -> bool {
        let status = status.trim();
        self.allowed_statuses
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(status))
    }

    /// Classify and project a single row.
    #[must_use]
    pub fn classify(&self, row: &RawRecord) -> RowOutcome {
        let status = cell(row, &self.columns.status);
        if !self.is_status_allowed(status) {
            return RowOutcome::Filtered {
                status: status.to_string(),
            };
        }

        let registration = cell(row, &self.columns.registration);
        if registration.is_empty() {
            return RowOutcome::Skipped {
                reason: "empty registration".to_string(),
            };
        }

        let icao_aircraft_type = cell(row, &self.columns.icao_aircraft_type);
        let aircraft_type = cell(row, &self.columns.aircraft_type);
        if icao_aircraft_type.is_empty() || aircraft_type.is_empty() {
            return RowOutcome::Skipped {
                reason: format!("{registration} has no aircraft type"),
            };
        }

        let raw_mtom = cell(row, &self.columns.mtom);
        let mtom = raw_mtom.parse::<u32>().ok();
        if mtom.is_none() {
            trace!(registration, mtom = raw_mtom, "Unusable MTOM in feed");
        }

        RowOutcome::Kept(Candidate {
            registration: registration.to_string(),
            icao_aircraft_type: icao_aircraft_type.to_string(),
            aircraft_type: aircraft_type.to_string(),
            mtom,
        })
    }

    /// Normalize a dataset and apply overrides.
    ///
    /// # Errors
    ///
    /// Returns a feed error if a required column is missing from the header,
    /// and [`Error::Validation`] for a duplicate registration or a record
    /// that breaks the registry rules once overrides are applied.
    pub fn normalize(&self, dataset: &RawDataset, overrides: &OverrideSet) -> Result<Normalized> {
        self.check_columns(dataset)?;

        let mut stats = NormalizeStats {
            rows_seen: dataset.len(),
            ..NormalizeStats::default()
        };
        let mut candidates: BTreeMap<String, Candidate> = BTreeMap::new();

        for row in &dataset.records {
            match self.classify(row) {
                RowOutcome::Kept(candidate) => match candidates.entry(candidate.registration.clone()) {
                    Entry::Vacant(slot) => {
                        slot.insert(candidate);
                        stats.kept += 1;
                    }
                    Entry::Occupied(slot) => {
                        return Err(Error::validation(
                            slot.key().as_str(),
                            "duplicate registration in source data",
                        ));
                    }
                },
                RowOutcome::Filtered { status } => {
                    trace!(status = %status, "Filtered row by status");
                    stats.filtered_by_status += 1;
                }
                RowOutcome::Skipped { reason } => {
                    warn!(reason = %reason, "Skipping feed row");
                    stats.skipped += 1;
                }
            }
        }

        for (registration, entry) in overrides.iter() {
            let candidate = candidates.entry(registration.clone()).or_insert_with(|| {
                debug!(registration = %registration, "Adding aircraft from overrides");
                stats.added_by_overrides += 1;
                Candidate {
                    registration: registration.clone(),
                    ..Candidate::default()
                }
            });
            candidate.apply(entry);
            stats.overrides_applied += 1;
        }

        let records = candidates
            .into_values()
            .map(|candidate| candidate.into_record(&self.pattern))
            .collect::<Result<Vec<_>>>()?;

        Ok(Normalized { records, stats })
    }

    fn check_columns(&self, dataset: &RawDataset) -> Result<()> {
        let required = [
            &self.columns.registration,
            &self.columns.icao_aircraft_type,
            &self.columns.aircraft_type,
            &self.columns.mtom,
            &self.columns.status,
        ];
        match required.into_iter().find(|c| !dataset.has_column(c)) {
            Some(missing) => Err(Error::feed(format!("missing column '{missing}'"))),
            None => Ok(()),
        }
    }
}

/// Trimmed cell value, empty when the row lacks the column.
fn cell<'a>(row: &'a RawRecord, column: &str) -> &'a str {
    row.get(column).map_or("", |value| value.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::parse_csv;

    const HEADER: &str = "Registration;ICAO Aircraft Type;Aircraft Type;MTOM;Status\n";

    fn dataset(rows: &str) -> RawDataset {
        parse_csv(&format!("{HEADER}{rows}"), b';').unwrap()
    }

    fn normalizer() -> Normalizer {
        Normalizer::from_config(&Config::default()).unwrap()
    }

    fn registrations(normalized: &Normalized) -> Vec<&str> {
        normalized
            .records
            .iter()
            .map(|r| r.registration.as_str())
            .collect()
    }

    #[test]
    fn test_filters_disallowed_statuses() {
        let data = dataset(
            "HB-1000;GLID;Glider;340;Registered\n\
             HB-2000;B738;Aeroplane;79000;Deregistered\n\
             HB-3000;C172;Aeroplane;1111;Reserved\n\
             HB-4000;C152;Aeroplane;757;Reservation Expired\n\
             HB-5000;PA28;Aeroplane;1157;Registration in Progress\n",
        );
        let normalized = normalizer().normalize(&data, &OverrideSet::new()).unwrap();

        assert_eq!(
            registrations(&normalized),
            vec!["HB-1000", "HB-3000", "HB-4000", "HB-5000"]
        );
        assert_eq!(normalized.stats.filtered_by_status, 1);
        assert_eq!(normalized.stats.rows_seen, 5);
    }

    #[test]
    fn test_deregistered_never_appears_even_if_valid() {
        let data = dataset("HB-2000;B738;Aeroplane;79000;Deregistered\n");
        let normalized = normalizer().normalize(&data, &OverrideSet::new()).unwrap();
        assert!(normalized.records.is_empty());
    }

    #[test]
    fn test_output_sorted_by_registration() {
        let data = dataset(
            "HB-ZZZ;C172;Aeroplane;1111;Registered\n\
             HB-1000;GLID;Glider;340;Registered\n\
             HB-ABC;PA28;Aeroplane;1157;Registered\n",
        );
        let normalized = normalizer().normalize(&data, &OverrideSet::new()).unwrap();
        assert_eq!(
            registrations(&normalized),
            vec!["HB-1000", "HB-ABC", "HB-ZZZ"]
        );
    }

    #[test]
    fn test_projection_drops_extra_columns() {
        let data = parse_csv(
            "Registration;ICAO Aircraft Type;Aircraft Type;MTOM;Status;Owner\n\
             HB-1000;GLID;Glider;340;Registered;Segelfluggruppe\n",
            b';',
        )
        .unwrap();
        let normalized = normalizer().normalize(&data, &OverrideSet::new()).unwrap();
        assert_eq!(
            normalized.records,
            vec![AircraftRecord::new("HB-1000", "GLID", "Glider", 340)]
        );
    }

    #[test]
    fn test_duplicate_registration_fails() {
        let data = dataset(
            "HB-1000;GLID;Glider;340;Registered\n\
             HB-1000;GLID;Glider;350;Reserved\n",
        );
        let err = normalizer()
            .normalize(&data, &OverrideSet::new())
            .unwrap_err();
        assert!(err.is_validation_error());
        assert!(err.to_string().contains("HB-1000"));
    }

    #[test]
    fn test_missing_mtom_fails_without_override() {
        let data = dataset("HB-1000;GLID;Glider;;Registered\n");
        let err = normalizer()
            .normalize(&data, &OverrideSet::new())
            .unwrap_err();
        assert!(err.is_validation_error());
        assert!(err.to_string().contains("HB-1000"));
    }

    #[test]
    fn test_zero_mtom_fails() {
        let data = dataset("HB-1000;GLID;Glider;0;Registered\n");
        assert!(normalizer().normalize(&data, &OverrideSet::new()).is_err());
    }

    #[test]
    fn test_override_fills_missing_mtom() {
        let data = dataset("HB-1000;GLID;Glider;n/a;Registered\n");
        let mut overrides = OverrideSet::new();
        overrides.insert(
            "HB-1000",
            AircraftOverride {
                mtom: Some(340),
                ..AircraftOverride::default()
            },
        );

        let normalized = normalizer().normalize(&data, &overrides).unwrap();
        assert_eq!(normalized.records[0].mtom, 340);
        assert_eq!(normalized.stats.overrides_applied, 1);
        assert_eq!(normalized.stats.added_by_overrides, 0);
    }

    #[test]
    fn test_override_adds_absent_aircraft() {
        let data = dataset("HB-1000;GLID;Glider;340;Registered\n");
        let mut overrides = OverrideSet::new();
        overrides.insert(
            "HB-ZEC",
            AircraftOverride {
                icao_aircraft_type: Some("EC35".to_string()),
                aircraft_type: Some("Helicopter".to_string()),
                mtom: Some(2910),
            },
        );

        let normalized = normalizer().normalize(&data, &overrides).unwrap();
        assert_eq!(registrations(&normalized), vec!["HB-1000", "HB-ZEC"]);
        assert_eq!(
            normalized.records[1],
            AircraftRecord::new("HB-ZEC", "EC35", "Helicopter", 2910)
        );
        assert_eq!(normalized.stats.added_by_overrides, 1);
    }

    #[test]
    fn test_override_resurrects_filtered_aircraft() {
        let data = dataset("HB-2000;B738;Aeroplane;79000;Deregistered\n");
        let mut overrides = OverrideSet::new();
        overrides.insert(
            "HB-2000",
            AircraftOverride {
                icao_aircraft_type: Some("B738".to_string()),
                aircraft_type: Some("Aeroplane".to_string()),
                mtom: Some(79_000),
            },
        );

        let normalized = normalizer().normalize(&data, &overrides).unwrap();
        assert_eq!(registrations(&normalized), vec!["HB-2000"]);
    }

    #[test]
    fn test_incomplete_added_override_fails() {
        let mut overrides = OverrideSet::new();
        overrides.insert(
            "HB-NEW",
            AircraftOverride {
                mtom: Some(500),
                ..AircraftOverride::default()
            },
        );

        let err = normalizer()
            .normalize(&dataset(""), &overrides)
            .unwrap_err();
        assert!(err.to_string().contains("HB-NEW"));
    }

    #[test]
    fn test_missing_column_is_feed_error() {
        let data = parse_csv("Registration;MTOM\nHB-1000;340\n", b';').unwrap();
        let err = normalizer()
            .normalize(&data, &OverrideSet::new())
            .unwrap_err();
        assert!(err.is_fetch_error());
        assert!(err.to_string().contains("ICAO Aircraft Type"));
    }

    #[test]
    fn test_empty_registration_skipped() {
        let data = dataset(";GLID;Glider;340;Registered\n");
        let normalized = normalizer().normalize(&data, &OverrideSet::new()).unwrap();
        assert!(normalized.records.is_empty());
        assert_eq!(normalized.stats.skipped, 1);
    }

    #[test]
    fn test_reserved_row_without_type_skipped() {
        let data = dataset(
            "HB-ABC;;;;Reserved\n\
             HB-1000;GLID;Glider;340;Registered\n",
        );
        let normalized = normalizer().normalize(&data, &OverrideSet::new()).unwrap();
        assert_eq!(registrations(&normalized), vec!["HB-1000"]);
        assert_eq!(normalized.stats.skipped, 1);
        assert_eq!(normalized.stats.kept, 1);
    }

    #[test]
    fn test_missing_icao_type_alone_skips_row() {
        let data = dataset("HB-ABC;;Glider;340;Reserved\n");
        assert!(matches!(
            normalizer().classify(&data.records[0]),
            RowOutcome::Skipped { .. }
        ));
    }

    #[test]
    fn test_override_completes_untyped_reservation() {
        let data = dataset("HB-ABC;;;;Reserved\n");
        let overrides = OverrideSet::from_json(
            r#"{"HB-ABC": {"icao_aircraft_type": "GLID", "aircraft_type": "Glider", "mtom": 340}}"#,
        )
        .unwrap();
        let normalized = normalizer().normalize(&data, &overrides).unwrap();
        assert_eq!(registrations(&normalized), vec!["HB-ABC"]);
        assert_eq!(normalized.stats.kept, 0);
        assert_eq!(normalized.stats.added_by_overrides, 1);
    }

    #[test]
    fn test_status_match_ignores_case_and_whitespace() {
        let normalizer = normalizer();
        assert!(normalizer.is_status_allowed(" registered "));
        assert!(!normalizer.is_status_allowed("Deregistered"));
        assert!(!normalizer.is_status_allowed(""));
    }

    #[test]
    fn test_classify_outcomes() {
        let normalizer = normalizer();
        let data = dataset(
            "HB-1000;GLID;Glider;340;Registered\n\
             HB-2000;B738;Aeroplane;79000;Deregistered\n",
        );

        assert!(matches!(
            normalizer.classify(&data.records[0]),
            RowOutcome::Kept(Candidate { mtom: Some(340), .. })
        ));
        assert_eq!(
            normalizer.classify(&data.records[1]),
            RowOutcome::Filtered {
                status: "Deregistered".to_string()
            }
        );
    }

    #[test]
    fn test_normalize_is_deterministic() {
        let data = dataset(
            "HB-ZZZ;C172;Aeroplane;1111;Registered\n\
             HB-1000;GLID;Glider;340;Registered\n",
        );
        let first = normalizer().normalize(&data, &OverrideSet::new()).unwrap();
        let second = normalizer().normalize(&data, &OverrideSet::new()).unwrap();
        assert_eq!(first, second);
    }
}
