//! File storage for registry snapshots.
//!
//! This module owns every write the registry performs on disk:
//! - Atomic replacement of snapshot documents (temp file + rename)
//! - Content fingerprints used to bind approvals to reviewed staging data
//! - Version-tagged production backups and their lookup for rollback

pub mod schema;

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use regex::Regex;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::registry::RegistrySnapshot;
use crate::version::Version;

/// File name prefix of production backups.
const BACKUP_PREFIX: &str = "aircraft-v";

/// Atomically replace `target` with `content`.
///
/// The bytes are written to a sibling temp file which is then renamed over
/// the target, so readers observe either the old or the new document.
/// Parent directories are created as needed.
///
/// # Errors
///
/// Returns an error if the directory, temp file or rename fails. The target
/// is unchanged in that case.
pub fn atomic_write(target: &Path, content: &[u8]) -> Result<()> {
    if let Some(parent) = target.parent().filter(|p| !p.as_os_str().is_empty()) {
        if !parent.exists() {
            fs::create_dir_all(parent).map_err(|source| Error::DirectoryCreate {
                path: parent.to_path_buf(),
                source,
            })?;
        }
    }

    let mut temp_name = target.file_name().unwrap_or_default().to_os_string();
    temp_name.push(".tmp");
    let temp_path = target.with_file_name(temp_name);

    fs::write(&temp_path, content).map_err(|source| Error::FileWrite {
        path: temp_path.clone(),
        source,
    })?;

    if let Err(source) = fs::rename(&temp_path, target) {
        let _ = fs::remove_file(&temp_path);
        return Err(Error::FileWrite {
            path: target.to_path_buf(),
            source,
        });
    }

    debug!(path = %target.display(), bytes = content.len(), "Wrote file atomically");
    Ok(())
}

/// BLAKE3 fingerprint of document bytes, as lowercase hex.
#[must_use]
pub fn fingerprint(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}

/// A single snapshot document on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotStore {
    path: PathBuf,
}

impl SnapshotStore {
    /// Create a store for the document at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Get the path of the document.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Check whether the document exists.
    #[must_use]
    pub fn exists(&self) -> bool {
        self.path.is_file()
    }

    /// Read the raw document bytes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::SnapshotMissing`] if the document does not exist.
    pub fn read_bytes(&self) -> Result<Vec<u8>> {
        fs::read(&self.path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::SnapshotMissing {
                    path: self.path.clone(),
                }
            } else {
                Error::Io(e)
            }
        })
    }

    /// Load and deserialize the document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is missing or is not a snapshot.
    pub fn load(&self) -> Result<RegistrySnapshot> {
        let bytes = self.read_bytes()?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    /// Load the document, or the empty snapshot if it does not exist yet.
    ///
    /// # Errors
    ///
    /// Returns an error if the document exists but cannot be read or parsed.
    pub fn load_or_empty(&self) -> Result<RegistrySnapshot> {
        match self.load() {
            Err(Error::SnapshotMissing { .. }) => Ok(RegistrySnapshot::empty()),
            other => other,
        }
    }

    /// Load the document after a full schema check.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Schema`] if the document does not conform.
    pub fn load_validated(&self, pattern: &Regex) -> Result<RegistrySnapshot> {
        let bytes = self.read_bytes()?;
        schema::validate_bytes(&self.path, &bytes, pattern)
    }

    /// Fingerprint of the current document, if it exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the document exists but cannot be read.
    pub fn fingerprint(&self) -> Result<Option<String>> {
        match self.read_bytes() {
            Ok(bytes) => Ok(Some(fingerprint(&bytes))),
            Err(Error::SnapshotMissing { .. }) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Persist a snapshot atomically and return the fingerprint written.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Schema`] if `total_count` disagrees with the aircraft
    /// list, or an I/O error if the write fails.
    pub fn write(&self, snapshot: &RegistrySnapshot) -> Result<String> {
        if !snapshot.is_consistent() {
            return Err(Error::schema(
                &self.path,
                format!(
                    "refusing to write: total_count={}, actual={}",
                    snapshot.total_count,
                    snapshot.aircraft.len()
                ),
            ));
        }

        let json = snapshot.to_json_pretty()?;
        atomic_write(&self.path, json.as_bytes())?;
        info!(
            path = %self.path.display(),
            version = %snapshot.version,
            count = snapshot.total_count,
            "Saved registry snapshot"
        );
        Ok(fingerprint(json.as_bytes()))
    }

    /// Replace the document with raw bytes, atomically.
    ///
    /// # Errors
    ///
    /// Returns an error if the write fails.
    pub fn write_bytes(&self, bytes: &[u8]) -> Result<String> {
        atomic_write(&self.path, bytes)?;
        Ok(fingerprint(bytes))
    }
}

/// A production backup on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Backup {
    /// Location of the backup file.
    pub path: PathBuf,
    /// Version of the backed-up snapshot, parsed from the file name.
    pub version: Option<Version>,
    /// When the backup file was written.
    pub created: DateTime<Utc>,
}

impl Backup {
    fn from_path(path: PathBuf) -> Result<Self> {
        let created = fs::metadata(&path)?.modified()?.into();
        let version = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(parse_backup_version);
        Ok(Self {
            path,
            version,
            created,
        })
    }
}

/// Extract the version from `aircraft-v{version}[-{stamp}].json`.
fn parse_backup_version(file_name: &str) -> Option<Version> {
    let tagged = file_name.strip_prefix(BACKUP_PREFIX)?.strip_suffix(".json")?;
    let version = tagged.split_once('-').map_or(tagged, |(version, _)| version);
    version.parse().ok()
}

/// Directory of version-tagged production backups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupStore {
    dir: PathBuf,
}

impl BackupStore {
    /// Create a backup store rooted at `dir`.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Copy the current document of `store` into the backup directory.
    ///
    /// The backup is named after the snapshot's version. If that name is
    /// taken, a UTC timestamp is appended. Returns `None` when there is
    /// nothing to back up.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be read or the copy fails.
    pub fn backup(&self, store: &SnapshotStore) -> Result<Option<Backup>> {
        let bytes = match store.read_bytes() {
            Ok(bytes) => bytes,
            Err(Error::SnapshotMissing { .. }) => return Ok(None),
            Err(e) => return Err(e),
        };

        let version = serde_json::from_slice::<serde_json::Value>(&bytes)
            .ok()
            .and_then(|doc| doc.get("version").and_then(|v| v.as_str()).map(str::to_string))
            .and_then(|raw| raw.parse::<Version>().ok());
        let tag = version.map_or_else(|| "unknown".to_string(), |v| v.to_string());

        let path = self.free_path(&tag);
        atomic_write(&path, &bytes)?;
        info!(
            source = %store.path().display(),
            backup = %path.display(),
            "Production backup created"
        );
        Backup::from_path(path).map(Some)
    }

    fn free_path(&self, tag: &str) -> PathBuf {
        let plain = self.dir.join(format!("{BACKUP_PREFIX}{tag}.json"));
        if !plain.exists() {
            return plain;
        }

        let stamp = Utc::now().format("%Y%m%dT%H%M%SZ");
        let stamped = self.dir.join(format!("{BACKUP_PREFIX}{tag}-{stamp}.json"));
        if !stamped.exists() {
            return stamped;
        }

        (1u32..)
            .map(|n| self.dir.join(format!("{BACKUP_PREFIX}{tag}-{stamp}-{n}.json")))
            .find(|candidate| !candidate.exists())
            .unwrap_or(stamped)
    }

    /// List backups, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read.
    pub fn list(&self) -> Result<Vec<Backup>> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut backups = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            let is_backup = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(BACKUP_PREFIX) && name.ends_with(".json"));
            if is_backup && path.is_file() {
                backups.push(Backup::from_path(path)?);
            }
        }

        backups.sort_by(|a, b| b.created.cmp(&a.created).then_with(|| b.path.cmp(&a.path)));
        Ok(backups)
    }

    /// Find the newest backup, optionally restricted to one version.
    ///
    /// # Errors
    ///
    /// Returns [`Error::BackupMissing`] if nothing matches.
    pub fn latest(&self, version: Option<Version>) -> Result<Backup> {
        self.list()?
            .into_iter()
            .find(|backup| version.is_none() || backup.version == version)
            .ok_or_else(|| Error::BackupMissing {
                version: version.map(|v| v.to_string()),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::AircraftRecord;

    fn sample(version: Version) -> RegistrySnapshot {
        RegistrySnapshot::new(
            version,
            vec![AircraftRecord::new("HB-1000", "GLID", "Glider", 340)],
        )
    }

    #[test]
    fn test_atomic_write_creates_parent() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested").join("aircraft.json");

        atomic_write(&target, b"{}").unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"{}");
    }

    #[test]
    fn test_atomic_write_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("aircraft.json");

        atomic_write(&target, b"one").unwrap();
        atomic_write(&target, b"two").unwrap();

        let leftovers = fs::read_dir(dir.path())
            .unwrap()
            .filter_map(std::result::Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .count();
        assert_eq!(leftovers, 0);
        assert_eq!(fs::read(&target).unwrap(), b"two");
    }

    #[test]
    fn test_fingerprint_stable() {
        assert_eq!(fingerprint(b"abc"), fingerprint(b"abc"));
        assert_ne!(fingerprint(b"abc"), fingerprint(b"abd"));
        assert_eq!(fingerprint(b"abc").len(), 64);
    }

    #[test]
    fn test_write_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("aircraft.json"));
        let snapshot = sample(Version::new(1, 0, 0));

        let written = store.write(&snapshot).unwrap();
        assert_eq!(store.fingerprint().unwrap(), Some(written));
        assert_eq!(store.load().unwrap(), snapshot);
    }

    #[test]
    fn test_write_rejects_inconsistent_count() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("aircraft.json"));
        let mut snapshot = sample(Version::new(1, 0, 0));
        snapshot.total_count = 7;

        let err = store.write(&snapshot).unwrap_err();
        assert!(err.is_schema_error());
        assert!(!store.exists());
    }

    #[test]
    fn test_load_missing() {
        let store = SnapshotStore::new("/nonexistent/aircraft.json");
        assert!(matches!(store.load(), Err(Error::SnapshotMissing { .. })));
        assert_eq!(store.load_or_empty().unwrap(), RegistrySnapshot::empty());
        assert_eq!(store.fingerprint().unwrap(), None);
    }

    #[test]
    fn test_load_validated_reports_schema_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("aircraft-staging.json"));
        store.write_bytes(br#"{"version": "1.0.0"}"#).unwrap();

        let pattern = Regex::new(crate::config::DEFAULT_REGISTRATION_PATTERN).unwrap();
        let err = store.load_validated(&pattern).unwrap_err();
        assert!(err.is_schema_error());
    }

    #[test]
    fn test_parse_backup_version() {
        assert_eq!(
            parse_backup_version("aircraft-v1.2.3.json"),
            Some(Version::new(1, 2, 3))
        );
        assert_eq!(
            parse_backup_version("aircraft-v1.2.3-20261016T120000Z.json"),
            Some(Version::new(1, 2, 3))
        );
        assert_eq!(parse_backup_version("aircraft-vunknown.json"), None);
        assert_eq!(parse_backup_version("notes.txt"), None);
    }

    #[test]
    fn test_backup_missing_production_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let backups = BackupStore::new(dir.path().join("backups"));
        let store = SnapshotStore::new(dir.path().join("aircraft.json"));

        assert!(backups.backup(&store).unwrap().is_none());
        assert!(backups.list().unwrap().is_empty());
    }

    #[test]
    fn test_backup_tagged_with_version() {
        let dir = tempfile::tempdir().unwrap();
        let backups = BackupStore::new(dir.path().join("backups"));
        let store = SnapshotStore::new(dir.path().join("aircraft.json"));
        store.write(&sample(Version::new(1, 0, 0))).unwrap();

        let backup = backups.backup(&store).unwrap().unwrap();
        assert!(backup.path.ends_with("aircraft-v1.0.0.json"));
        assert_eq!(backup.version, Some(Version::new(1, 0, 0)));
        assert_eq!(fs::read(&backup.path).unwrap(), store.read_bytes().unwrap());
    }

    #[test]
    fn test_backup_same_version_twice_keeps_both() {
        let dir = tempfile::tempdir().unwrap();
        let backups = BackupStore::new(dir.path().join("backups"));
        let store = SnapshotStore::new(dir.path().join("aircraft.json"));
        store.write(&sample(Version::new(1, 0, 0))).unwrap();

        let first = backups.backup(&store).unwrap().unwrap();
        let second = backups.backup(&store).unwrap().unwrap();
        assert_ne!(first.path, second.path);
        assert_eq!(backups.list().unwrap().len(), 2);
        assert_eq!(second.version, Some(Version::new(1, 0, 0)));
    }

    #[test]
    fn test_latest_by_version() {
        let dir = tempfile::tempdir().unwrap();
        let backups = BackupStore::new(dir.path().join("backups"));
        let store = SnapshotStore::new(dir.path().join("aircraft.json"));

        store.write(&sample(Version::new(1, 0, 0))).unwrap();
        backups.backup(&store).unwrap();
        store.write(&sample(Version::new(1, 0, 1))).unwrap();
        backups.backup(&store).unwrap();

        let found = backups.latest(Some(Version::new(1, 0, 0))).unwrap();
        assert_eq!(found.version, Some(Version::new(1, 0, 0)));

        let err = backups.latest(Some(Version::new(9, 9, 9))).unwrap_err();
        assert!(matches!(err, Error::BackupMissing { .. }));
    }

    #[test]
    fn test_latest_without_backups() {
        let dir = tempfile::tempdir().unwrap();
        let backups = BackupStore::new(dir.path().join("none"));
        assert!(matches!(
            backups.latest(None),
            Err(Error::BackupMissing { version: None })
        ));
    }
}
