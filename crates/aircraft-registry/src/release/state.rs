//! Persisted release workflow state.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::diff::DiffSummary;
use crate::error::Result;
use crate::storage::atomic_write;
use crate::version::{Severity, Version};

/// Where the registry is in the review/release cycle.
///
/// `Rejected` and `Released` are transient: both fold back to `Idle` as
/// soon as they are reached, so they are never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum Stage {
    /// Nothing awaits review.
    #[default]
    Idle,

    /// A sync wrote staging; it has not been compared yet.
    StagingReady {
        /// Fingerprint of the staging file written.
        fingerprint: String,
    },

    /// Staging differs from production and awaits a decision.
    PendingReview {
        /// Fingerprint of the staging file that was reviewed.
        fingerprint: String,
        /// Size of the reviewed change.
        summary: DiffSummary,
    },

    /// A reviewer approved the change; promotion may proceed.
    Approved {
        /// Fingerprint of the staging file that was approved.
        fingerprint: String,
        /// Size of the reviewed change.
        summary: DiffSummary,
        /// Requested version bump.
        severity: Severity,
        /// Free-text release note.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        note: Option<String>,
    },

    /// Promotion started; production may already carry `version`.
    Releasing {
        /// Fingerprint of the staging file being released.
        fingerprint: String,
        /// Size of the released change.
        summary: DiffSummary,
        /// Bump being applied.
        severity: Severity,
        /// Free-text release note.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        note: Option<String>,
        /// Version production is being moved to.
        version: Version,
        /// Version being replaced, if production existed.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        previous: Option<Version>,
    },
}

impl Stage {
    /// Fingerprint of the staging file this stage refers to.
    #[must_use]
    pub fn fingerprint(&self) -> Option<&str> {
        match self {
            Self::Idle => None,
            Self::StagingReady { fingerprint }
            | Self::PendingReview { fingerprint, .. }
            | Self::Approved { fingerprint, .. }
            | Self::Releasing { fingerprint, .. } => Some(fingerprint),
        }
    }

    /// Check whether this stage carries a reviewer's pending or given decision.
    #[must_use]
    pub fn awaits_decision(&self) -> bool {
        matches!(
            self,
            Self::PendingReview { .. } | Self::Approved { .. } | Self::Releasing { .. }
        )
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::StagingReady { .. } => write!(f, "staging ready"),
            Self::PendingReview { .. } => write!(f, "pending review"),
            Self::Approved { severity, .. } => write!(f, "approved ({severity})"),
            Self::Releasing { version, .. } => write!(f, "releasing {version}"),
        }
    }
}

/// The stage together with when it was entered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReleaseState {
    /// Current stage.
    pub stage: Stage,
    /// When the stage was entered.
    pub updated_at: DateTime<Utc>,
}

impl ReleaseState {
    /// Enter `stage` now.
    #[must_use]
    pub fn new(stage: Stage) -> Self {
        Self {
            stage,
            updated_at: Utc::now(),
        }
    }
}

impl Default for ReleaseState {
    fn default() -> Self {
        Self {
            stage: Stage::Idle,
            updated_at: DateTime::<Utc>::UNIX_EPOCH,
        }
    }
}

/// JSON file holding the [`ReleaseState`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    /// Create a store for the state file at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Load the state; a missing file means `Idle`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(&self) -> Result<ReleaseState> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(ReleaseState::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Persist a transition to `stage`.
    ///
    /// # Errors
    ///
    /// Returns an error if the state file cannot be written.
    pub fn enter(&self, stage: Stage) -> Result<ReleaseState> {
        let state = ReleaseState::new(stage);
        let mut json = serde_json::to_string_pretty(&state)?;
        json.push('\n');
        atomic_write(&self.path, json.as_bytes())?;
        debug!(stage = %state.stage, "Release state updated");
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_state_is_idle() {
        let store = StateStore::new("/nonexistent/.acreg-state.json");
        assert_eq!(store.load().unwrap().stage, Stage::Idle);
    }

    #[test]
    fn test_enter_persists_stage() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));

        let stage = Stage::Approved {
            fingerprint: "abc".to_string(),
            summary: DiffSummary {
                added: 1,
                removed: 0,
                changed: 1,
            },
            severity: Severity::Minor,
            note: Some("new helicopters".to_string()),
        };
        let entered = store.enter(stage.clone()).unwrap();

        assert_eq!(store.load().unwrap(), entered);
        assert_eq!(entered.stage, stage);
    }

    #[test]
    fn test_stage_json_is_tagged() {
        let json = serde_json::to_value(Stage::StagingReady {
            fingerprint: "abc".to_string(),
        })
        .unwrap();
        assert_eq!(json["stage"], "staging_ready");
        assert_eq!(json["fingerprint"], "abc");
    }

    #[test]
    fn test_stage_fingerprint() {
        assert_eq!(Stage::Idle.fingerprint(), None);
        assert_eq!(
            Stage::PendingReview {
                fingerprint: "f".to_string(),
                summary: DiffSummary::default(),
            }
            .fingerprint(),
            Some("f")
        );
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::Idle.to_string(), "idle");
        let approved = Stage::Approved {
            fingerprint: String::new(),
            summary: DiffSummary::default(),
            severity: Severity::Patch,
            note: None,
        };
        assert_eq!(approved.to_string(), "approved (patch)");
        assert!(approved.awaits_decision());
    }

    #[test]
    fn test_releasing_round_trips_with_target_version() {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("state.json"));
        let stage = Stage::Releasing {
            fingerprint: "abc".to_string(),
            summary: DiffSummary::default(),
            severity: Severity::Patch,
            note: None,
            version: Version::new(1, 0, 1),
            previous: Some(Version::new(1, 0, 0)),
        };

        store.enter(stage.clone()).unwrap();

        let loaded = store.load().unwrap().stage;
        assert_eq!(loaded, stage);
        assert_eq!(loaded.to_string(), "releasing 1.0.1");
        assert_eq!(loaded.fingerprint(), Some("abc"));
        assert!(loaded.awaits_decision());
    }

    #[test]
    fn test_corrupt_state_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, "garbage").unwrap();
        assert!(StateStore::new(&path).load().is_err());
    }
}
