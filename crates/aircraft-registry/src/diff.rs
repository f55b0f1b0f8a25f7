//! Structured comparison of two registry snapshots.
//!
//! Snapshots are compared by registration. The result is sorted throughout,
//! so diffing the same pair twice yields identical output.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Write as _};

use serde::{Deserialize, Serialize};

use crate::registry::{AircraftRecord, RegistrySnapshot};

/// A record field that can differ between snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    /// `icao_aircraft_type`
    IcaoAircraftType,
    /// `aircraft_type`
    AircraftType,
    /// `mtom`
    Mtom,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::IcaoAircraftType => write!(f, "icao_aircraft_type"),
            Self::AircraftType => write!(f, "aircraft_type"),
            Self::Mtom => write!(f, "mtom"),
        }
    }
}

/// The value of a field on one side of a change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    /// A text field.
    Text(String),
    /// A mass in kilograms.
    Mass(u32),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(text) => write!(f, "{text}"),
            Self::Mass(kg) => write!(f, "{kg}"),
        }
    }
}

/// Old and new value of one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldChange {
    /// Value in the old snapshot.
    pub old: FieldValue,
    /// Value in the new snapshot.
    pub new: FieldValue,
}

/// Differences between an old and a new snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffResult {
    /// Registrations only in the new snapshot.
    pub added: BTreeSet<String>,
    /// Registrations only in the old snapshot.
    pub removed: BTreeSet<String>,
    /// Per-field changes for registrations in both.
    pub changed: BTreeMap<String, BTreeMap<Field, FieldChange>>,
}

/// Change counts, as stored alongside a pending review.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    /// Number of added aircraft.
    pub added: usize,
    /// Number of removed aircraft.
    pub removed: usize,
    /// Number of modified aircraft.
    pub changed: usize,
}

impl DiffSummary {
    /// Total number of affected aircraft.
    #[must_use]
    pub fn total(&self) -> usize {
        self.added + self.removed + self.changed
    }
}

impl fmt::Display for DiffSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} added, {} removed, {} modified",
            self.added, self.removed, self.changed
        )
    }
}

impl DiffResult {
    /// Check whether the snapshots hold the same aircraft.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }

    /// Count the changes.
    #[must_use]
    pub fn summary(&self) -> DiffSummary {
        DiffSummary {
            added: self.added.len(),
            removed: self.removed.len(),
            changed: self.changed.len(),
        }
    }
}

/// Compare `old` (production) with `new` (staging).
#[must_use]
pub fn diff(old: &RegistrySnapshot, new: &RegistrySnapshot) -> DiffResult {
    let old_index = index(old);
    let new_index = index(new);

    let mut result = DiffResult::default();

    for (registration, new_record) in &new_index {
        match old_index.get(registration) {
            None => {
                result.added.insert((*registration).to_string());
            }
            Some(old_record) => {
                let changes = compare(old_record, new_record);
                if !changes.is_empty() {
                    result.changed.insert((*registration).to_string(), changes);
                }
            }
        }
    }

    result.removed = old_index
        .keys()
        .filter(|registration| !new_index.contains_key(*registration))
        .map(|registration| (*registration).to_string())
        .collect();

    result
}

fn index(snapshot: &RegistrySnapshot) -> BTreeMap<&str, &AircraftRecord> {
    snapshot
        .aircraft
        .iter()
        .map(|record| (record.registration.as_str(), record))
        .collect()
}

fn compare(old: &AircraftRecord, new: &AircraftRecord) -> BTreeMap<Field, FieldChange> {
    let mut changes = BTreeMap::new();
    let mut text = |field, old: &String, new: &String| {
        if old != new {
            changes.insert(
                field,
                FieldChange {
                    old: FieldValue::Text(old.clone()),
                    new: FieldValue::Text(new.clone()),
                },
            );
        }
    };
    text(
        Field::IcaoAircraftType,
        &old.icao_aircraft_type,
        &new.icao_aircraft_type,
    );
    text(Field::AircraftType, &old.aircraft_type, &new.aircraft_type);

    if old.mtom != new.mtom {
        changes.insert(
            Field::Mtom,
            FieldChange {
                old: FieldValue::Mass(old.mtom),
                new: FieldValue::Mass(new.mtom),
            },
        );
    }
    changes
}

/// Render a human-readable change report.
///
/// At most `limit` entries are listed per category.
#[must_use]
pub fn render_report(
    production: &RegistrySnapshot,
    staging: &RegistrySnapshot,
    result: &DiffResult,
    limit: usize,
) -> String {
    let rule = "=".repeat(70);
    let thin = "-".repeat(70);
    let mut out = String::new();

    let _ = writeln!(out, "{rule}");
    let _ = writeln!(out, "AIRCRAFT REGISTRY CHANGE SUMMARY");
    let _ = writeln!(out, "{rule}");
    for (label, snapshot) in [("Staging", staging), ("Production", production)] {
        let _ = writeln!(out);
        let _ = writeln!(out, "{label:<12}Version: {}", snapshot.version);
        let _ = writeln!(out, "{:<12}Updated: {}", "", snapshot.last_updated.to_rfc3339());
        let _ = writeln!(out, "{:<12}Count:   {}", "", snapshot.total_count);
    }

    let summary = result.summary();
    let _ = writeln!(out);
    let _ = writeln!(out, "CHANGE STATISTICS:");
    let _ = writeln!(out, "  Added aircraft:    {:>6}", summary.added);
    let _ = writeln!(out, "  Removed aircraft:  {:>6}", summary.removed);
    let _ = writeln!(out, "  Modified aircraft: {:>6}", summary.changed);
    let _ = writeln!(out, "  Total changes:     {:>6}", summary.total());

    if result.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "No changes detected - registries are identical");
        return out;
    }

    let mut listing = |title: &str, registrations: &BTreeSet<String>, side: &RegistrySnapshot| {
        if registrations.is_empty() {
            return;
        }
        let _ = writeln!(out);
        let _ = writeln!(out, "{title} ({})", registrations.len());
        let _ = writeln!(out, "{thin}");
        for registration in registrations.iter().take(limit) {
            match side.get(registration) {
                Some(record) => {
                    let _ = writeln!(
                        out,
                        "  {:<12} | {:<8} | {}",
                        record.registration, record.icao_aircraft_type, record.aircraft_type
                    );
                }
                None => {
                    let _ = writeln!(out, "  {registration}");
                }
            }
        }
        if registrations.len() > limit {
            let _ = writeln!(out, "  ... and {} more", registrations.len() - limit);
        }
    };
    listing("ADDED AIRCRAFT", &result.added, staging);
    listing("REMOVED AIRCRAFT", &result.removed, production);

    if !result.changed.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "MODIFIED AIRCRAFT ({})", result.changed.len());
        let _ = writeln!(out, "{thin}");
        for (registration, fields) in result.changed.iter().take(limit) {
            let _ = writeln!(out, "  {registration}:");
            for (field, change) in fields {
                let _ = writeln!(out, "    {field}: {} -> {}", change.old, change.new);
            }
        }
        if result.changed.len() > limit {
            let _ = writeln!(out, "  ... and {} more", result.changed.len() - limit);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::Version;

    fn snapshot(records: Vec<AircraftRecord>) -> RegistrySnapshot {
        RegistrySnapshot::new(Version::new(1, 0, 0), records)
    }

    fn glider(mtom: u32) -> AircraftRecord {
        AircraftRecord::new("HB-1000", "GLID", "Glider", mtom)
    }

    fn boeing() -> AircraftRecord {
        AircraftRecord::new("HB-2000", "B738", "Aeroplane", 79_000)
    }

    #[test]
    fn test_diff_with_itself_is_empty() {
        let s = snapshot(vec![glider(340), boeing()]);
        let result = diff(&s, &s);
        assert!(result.is_empty());
        assert_eq!(result.summary().total(), 0);
    }

    #[test]
    fn test_diff_scenario() {
        let production = snapshot(vec![glider(340)]);
        let staging = snapshot(vec![glider(350), boeing()]);

        let result = diff(&production, &staging);

        assert_eq!(result.added, BTreeSet::from(["HB-2000".to_string()]));
        assert!(result.removed.is_empty());
        assert_eq!(result.changed.len(), 1);
        let fields = &result.changed["HB-1000"];
        assert_eq!(fields.len(), 1);
        assert_eq!(
            fields[&Field::Mtom],
            FieldChange {
                old: FieldValue::Mass(340),
                new: FieldValue::Mass(350),
            }
        );
    }

    #[test]
    fn test_diff_removed() {
        let result = diff(&snapshot(vec![glider(340), boeing()]), &snapshot(vec![boeing()]));
        assert_eq!(result.removed, BTreeSet::from(["HB-1000".to_string()]));
        assert!(result.added.is_empty());
        assert!(result.changed.is_empty());
    }

    #[test]
    fn test_diff_text_fields() {
        let old = snapshot(vec![glider(340)]);
        let new = snapshot(vec![AircraftRecord::new("HB-1000", "GLD2", "Motor Glider", 340)]);

        let result = diff(&old, &new);
        let fields = &result.changed["HB-1000"];
        assert_eq!(
            fields.keys().copied().collect::<Vec<_>>(),
            vec![Field::IcaoAircraftType, Field::AircraftType]
        );
    }

    #[test]
    fn test_diff_ignores_snapshot_metadata() {
        let old = snapshot(vec![glider(340)]);
        let new = RegistrySnapshot::new(Version::new(9, 9, 9), vec![glider(340)]);
        assert!(diff(&old, &new).is_empty());
    }

    #[test]
    fn test_diff_is_deterministic() {
        let old = snapshot(vec![glider(340)]);
        let new = snapshot(vec![boeing(), glider(350)]);
        assert_eq!(diff(&old, &new), diff(&old, &new));
    }

    #[test]
    fn test_diff_against_empty() {
        let result = diff(&RegistrySnapshot::empty(), &snapshot(vec![glider(340), boeing()]));
        assert_eq!(result.summary().added, 2);
    }

    #[test]
    fn test_diff_json_shape() {
        let result = diff(&snapshot(vec![glider(340)]), &snapshot(vec![glider(350)]));
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["changed"]["HB-1000"]["mtom"]["old"], 340);
        assert_eq!(json["changed"]["HB-1000"]["mtom"]["new"], 350);
    }

    #[test]
    fn test_summary_display() {
        let summary = DiffSummary {
            added: 1,
            removed: 0,
            changed: 2,
        };
        assert_eq!(summary.to_string(), "1 added, 0 removed, 2 modified");
    }

    #[test]
    fn test_report_lists_changes() {
        let production = snapshot(vec![glider(340)]);
        let staging = snapshot(vec![glider(350), boeing()]);
        let report = render_report(&production, &staging, &diff(&production, &staging), 10);

        assert!(report.contains("ADDED AIRCRAFT (1)"));
        assert!(report.contains("HB-2000"));
        assert!(report.contains("mtom: 340 -> 350"));
        assert!(!report.contains("REMOVED AIRCRAFT"));
    }

    #[test]
    fn test_report_truncates() {
        let staging = snapshot(
            (0..15)
                .map(|n| AircraftRecord::new(format!("HB-{:04}", 1000 + n), "GLID", "Glider", 340))
                .collect(),
        );
        let production = RegistrySnapshot::empty();
        let report = render_report(&production, &staging, &diff(&production, &staging), 10);
        assert!(report.contains("... and 5 more"));
    }

    #[test]
    fn test_report_no_changes() {
        let s = snapshot(vec![glider(340)]);
        let report = render_report(&s, &s, &diff(&s, &s), 10);
        assert!(report.contains("No changes detected"));
    }
}
