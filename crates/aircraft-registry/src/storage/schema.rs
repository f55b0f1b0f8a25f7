//! Schema checks for registry documents.
//!
//! Consumers depend on the published JSON shape, so documents are checked
//! field by field before they are trusted. Every failure names the path
//! inside the document.

use std::path::Path;

use chrono::DateTime;
use regex::Regex;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::registry::RegistrySnapshot;
use crate::version::Version;

/// Top-level fields every snapshot carries.
pub const SNAPSHOT_FIELDS: &[&str] = &["version", "last_updated", "total_count", "aircraft"];

/// Fields every aircraft entry carries.
pub const AIRCRAFT_FIELDS: &[&str] = &["registration", "icao_aircraft_type", "aircraft_type", "mtom"];

/// Check raw document bytes and return the parsed snapshot.
///
/// # Errors
///
/// Returns [`Error::Schema`] if the bytes are not JSON or the document does
/// not conform to the registry schema.
pub fn validate_bytes(path: &Path, bytes: &[u8], pattern: &Regex) -> Result<RegistrySnapshot> {
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|e| Error::schema(path, format!("invalid JSON: {e}")))?;
    validate_value(path, &value, pattern)
}

/// Check a parsed JSON document and return the typed snapshot.
///
/// # Errors
///
/// Returns [`Error::Schema`] describing the first violation found.
pub fn validate_value(path: &Path, value: &Value, pattern: &Regex) -> Result<RegistrySnapshot> {
    let fail = |message: String| Error::schema(path, message);

    let root = value
        .as_object()
        .ok_or_else(|| fail("document must be a JSON object".to_string()))?;

    for field in SNAPSHOT_FIELDS {
        if !root.contains_key(*field) {
            return Err(fail(format!("missing required field '{field}'")));
        }
    }

    let version = root["version"]
        .as_str()
        .ok_or_else(|| fail("'version' must be a string".to_string()))?;
    version
        .parse::<Version>()
        .map_err(|_| fail(format!("'version' is not MAJOR.MINOR.PATCH: {version}")))?;

    let last_updated = root["last_updated"]
        .as_str()
        .ok_or_else(|| fail("'last_updated' must be a string".to_string()))?;
    DateTime::parse_from_rfc3339(last_updated)
        .map_err(|_| fail(format!("'last_updated' is not an RFC 3339 timestamp: {last_updated}")))?;

    let total_count = root["total_count"]
        .as_u64()
        .ok_or_else(|| fail("'total_count' must be a non-negative integer".to_string()))?;

    let aircraft = root["aircraft"]
        .as_array()
        .ok_or_else(|| fail("'aircraft' must be an array".to_string()))?;

    if usize::try_from(total_count).ok() != Some(aircraft.len()) {
        return Err(fail(format!(
            "count mismatch: total_count={total_count}, actual={}",
            aircraft.len()
        )));
    }

    for (index, entry) in aircraft.iter().enumerate() {
        check_aircraft(index, entry).map_err(fail)?;
    }

    let snapshot: RegistrySnapshot =
        serde_json::from_value(value.clone()).map_err(|e| fail(e.to_string()))?;

    snapshot.validate(pattern).map_err(|e| match e {
        Error::Validation {
            registration,
            message,
        } => fail(format!("aircraft {registration}: {message}")),
        other => other,
    })?;

    Ok(snapshot)
}

fn check_aircraft(index: usize, entry: &Value) -> std::result::Result<(), String> {
    let object = entry
        .as_object()
        .ok_or_else(|| format!("aircraft[{index}] is not an object"))?;

    for field in AIRCRAFT_FIELDS {
        let Some(value) = object.get(*field) else {
            return Err(format!("aircraft[{index}] missing required field '{field}'"));
        };
        let well_typed = if *field == "mtom" {
            value.as_u64().is_some_and(|mtom| mtom > 0 && mtom <= u64::from(u32::MAX))
        } else {
            value.as_str().is_some_and(|s| !s.trim().is_empty())
        };
        if !well_typed {
            return Err(format!("aircraft[{index}].{field} has an invalid value: {value}"));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn pattern() -> Regex {
        Regex::new(crate::config::DEFAULT_REGISTRATION_PATTERN).unwrap()
    }

    fn valid() -> Value {
        json!({
            "version": "1.0.0",
            "last_updated": "2026-10-16T08:00:00+00:00",
            "total_count": 2,
            "aircraft": [
                {"registration": "HB-1000", "icao_aircraft_type": "GLID", "aircraft_type": "Glider", "mtom": 340},
                {"registration": "HB-2000", "icao_aircraft_type": "B738", "aircraft_type": "Aeroplane", "mtom": 79000}
            ]
        })
    }

    fn check(value: &Value) -> Result<RegistrySnapshot> {
        validate_value(Path::new("aircraft-staging.json"), value, &pattern())
    }

    fn message(value: &Value) -> String {
        let err = check(value).unwrap_err();
        assert!(err.is_schema_error(), "unexpected error kind: {err}");
        err.to_string()
    }

    #[test]
    fn test_valid_document() {
        let snapshot = check(&valid()).unwrap();
        assert_eq!(snapshot.total_count, 2);
        assert_eq!(snapshot.version, Version::new(1, 0, 0));
    }

    #[test]
    fn test_missing_top_level_field() {
        let mut doc = valid();
        doc.as_object_mut().unwrap().remove("last_updated");
        assert!(message(&doc).contains("missing required field 'last_updated'"));
    }

    #[test]
    fn test_count_mismatch() {
        let mut doc = valid();
        doc["total_count"] = json!(3);
        assert!(message(&doc).contains("count mismatch"));
    }

    #[test]
    fn test_bad_version() {
        let mut doc = valid();
        doc["version"] = json!("v2");
        assert!(message(&doc).contains("MAJOR.MINOR.PATCH"));
    }

    #[test]
    fn test_bad_timestamp() {
        let mut doc = valid();
        doc["last_updated"] = json!("yesterday");
        assert!(message(&doc).contains("RFC 3339"));
    }

    #[test]
    fn test_aircraft_not_array() {
        let mut doc = valid();
        doc["aircraft"] = json!({});
        assert!(message(&doc).contains("must be an array"));
    }

    #[test]
    fn test_aircraft_missing_field() {
        let mut doc = valid();
        doc["aircraft"][1].as_object_mut().unwrap().remove("mtom");
        assert!(message(&doc).contains("aircraft[1] missing required field 'mtom'"));
    }

    #[test]
    fn test_aircraft_non_positive_mtom() {
        let mut doc = valid();
        doc["aircraft"][0]["mtom"] = json!(0);
        assert!(message(&doc).contains("aircraft[0].mtom"));
    }

    #[test]
    fn test_aircraft_string_mtom() {
        let mut doc = valid();
        doc["aircraft"][0]["mtom"] = json!("340");
        assert!(message(&doc).contains("aircraft[0].mtom"));
    }

    #[test]
    fn test_duplicate_registration() {
        let mut doc = valid();
        doc["aircraft"][1]["registration"] = json!("HB-1000");
        let msg = message(&doc);
        assert!(msg.contains("HB-1000"));
        assert!(msg.contains("duplicate"));
    }

    #[test]
    fn test_registration_pattern() {
        let mut doc = valid();
        doc["aircraft"][1]["registration"] = json!("N12345");
        assert!(message(&doc).contains("N12345"));
    }

    #[test]
    fn test_invalid_json_bytes() {
        let err = validate_bytes(Path::new("x.json"), b"{", &pattern()).unwrap_err();
        assert!(err.is_schema_error());
        assert!(err.to_string().contains("invalid JSON"));
    }

    #[test]
    fn test_not_an_object() {
        assert!(message(&json!([1, 2])).contains("JSON object"));
    }
}
