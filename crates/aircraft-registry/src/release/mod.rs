//! Review and release workflow.
//!
//! The [`ReleaseManager`] is the only writer of the production document.
//! It moves staging data through review, approval and promotion, keeping
//! the current [`Stage`] in a small state file so each step can run as a
//! separate invocation:
//!
//! ```text
//! Idle ─sync─▶ StagingReady ─review─▶ PendingReview ─approve─▶ Approved ─promote─▶ Releasing ─▶ Idle
//!                    │                      │                     │
//!                    └─(no changes)─▶ Idle  └──────reject─────────┴──▶ Idle
//! ```
//!
//! Every approval is bound to the BLAKE3 fingerprint of the staging file
//! that was reviewed, so a staging file edited after review cannot be
//! promoted. `Releasing` records the target version before production is
//! written, so a promotion cut short can be finished by promoting again.

pub mod command;
pub mod state;

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::diff::{self, DiffResult, DiffSummary};
use crate::error::{Error, Result};
use crate::registry::{AircraftRecord, RegistrySnapshot};
use crate::storage::{self, Backup, BackupStore, SnapshotStore};
use crate::version::{Severity, Version};

pub use command::ReviewCommand;
pub use state::{ReleaseState, Stage, StateStore};

/// A freshly written staging snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Staged {
    /// Location of the staging document.
    pub path: PathBuf,
    /// Version carried by the staging document.
    pub version: Version,
    /// Number of aircraft written.
    pub total_count: usize,
    /// Fingerprint of the written bytes.
    pub fingerprint: String,
}

/// Whether a review found anything to decide on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReviewOutcome {
    /// Staging equals production; nothing to release.
    DiffEmpty,
    /// Staging differs and awaits a decision.
    PendingReview(DiffSummary),
}

/// The result of comparing staging with production.
#[derive(Debug, Clone)]
pub struct Review {
    /// Current production (empty when none has been published).
    pub production: RegistrySnapshot,
    /// Current staging.
    pub staging: RegistrySnapshot,
    /// Detailed differences.
    pub diff: DiffResult,
    /// What the review led to.
    pub outcome: ReviewOutcome,
}

impl Review {
    /// Render the human-readable change report.
    #[must_use]
    pub fn report(&self, limit: usize) -> String {
        diff::render_report(&self.production, &self.staging, &self.diff, limit)
    }
}

/// A published release.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Release {
    /// Version now in production.
    pub version: Version,
    /// Version that was replaced, if production existed.
    pub previous: Option<Version>,
    /// Bump that was applied.
    pub severity: Severity,
    /// Release note given at approval.
    pub note: Option<String>,
    /// Number of aircraft published.
    pub total_count: usize,
    /// Size of the released change.
    pub summary: DiffSummary,
    /// Backup of the replaced production document.
    pub backup: Option<Backup>,
}

/// A discarded change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    /// Reason given by the reviewer.
    pub reason: Option<String>,
    /// Size of the discarded change.
    pub summary: DiffSummary,
}

/// The result of applying a [`ReviewCommand`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// The change was approved and promoted.
    Released(Release),
    /// The change was discarded.
    Rejected(Rejection),
}

/// A production document restored from backup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rollback {
    /// The backup that was restored.
    pub restored: Backup,
    /// Version now in production.
    pub version: Version,
    /// Backup of the production document that was replaced.
    pub safety_backup: Option<Backup>,
}

/// Summary of one snapshot document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotInfo {
    /// Location of the document.
    pub path: PathBuf,
    /// Version it carries.
    pub version: Version,
    /// Number of aircraft.
    pub total_count: usize,
    /// Its `last_updated` timestamp.
    pub last_updated: DateTime<Utc>,
}

impl SnapshotInfo {
    fn of(path: &Path, snapshot: &RegistrySnapshot) -> Self {
        Self {
            path: path.to_path_buf(),
            version: snapshot.version,
            total_count: snapshot.total_count,
            last_updated: snapshot.last_updated,
        }
    }
}

/// Workflow status report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Status {
    /// Current stage.
    pub stage: Stage,
    /// When the stage was entered.
    pub updated_at: DateTime<Utc>,
    /// Production document, if published.
    pub production: Option<SnapshotInfo>,
    /// Staging document, if present.
    pub staging: Option<SnapshotInfo>,
    /// Number of backups on disk.
    pub backups: usize,
}

/// Drives staging data through review into production.
#[derive(Debug, Clone)]
pub struct ReleaseManager {
    staging: SnapshotStore,
    production: SnapshotStore,
    backups: BackupStore,
    state: StateStore,
    pattern: Regex,
    initial_version: Version,
}

impl ReleaseManager {
    /// Create a manager over explicit locations.
    #[must_use]
    pub fn new(
        staging: SnapshotStore,
        production: SnapshotStore,
        backups: BackupStore,
        state: StateStore,
        pattern: Regex,
        initial_version: Version,
    ) -> Self {
        Self {
            staging,
            production,
            backups,
            state,
            pattern,
            initial_version,
        }
    }

    /// Create a manager from the `[registry]` configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the registration pattern or initial version is invalid.
    pub fn from_config(config: &Config) -> Result<Self> {
        let registry = &config.registry;
        Ok(Self::new(
            SnapshotStore::new(&registry.staging_path),
            SnapshotStore::new(&registry.production_path),
            BackupStore::new(&registry.backup_dir),
            StateStore::new(&registry.state_path),
            config.registration_regex()?,
            config.initial_version()?,
        ))
    }

    /// Get the staging document store.
    #[must_use]
    pub fn staging(&self) -> &SnapshotStore {
        &self.staging
    }

    /// Get the path of the production document.
    #[must_use]
    pub fn production_path(&self) -> &Path {
        self.production.path()
    }

    /// Get the registration pattern every snapshot must satisfy.
    #[must_use]
    pub fn pattern(&self) -> &Regex {
        &self.pattern
    }

    /// Load the persisted workflow state.
    ///
    /// # Errors
    ///
    /// Returns an error if the state file is unreadable.
    pub fn state(&self) -> Result<ReleaseState> {
        self.state.load()
    }

    /// Load production, if it has been published.
    ///
    /// # Errors
    ///
    /// Returns an error if the production document exists but cannot be parsed.
    pub fn production(&self) -> Result<Option<RegistrySnapshot>> {
        if self.production.exists() {
            self.production.load().map(Some)
        } else {
            Ok(None)
        }
    }

    /// Version a new staging snapshot should carry.
    fn staging_version(&self) -> Result<Version> {
        Ok(self
            .production()?
            .map_or(self.initial_version, |production| production.version))
    }

    /// Write a new staging snapshot and record it for review.
    ///
    /// Any pending review or approval is discarded.
    ///
    /// # Errors
    ///
    /// Returns a validation error if the records do not form a valid
    /// snapshot, or an I/O error if staging cannot be written.
    pub fn write_staging(&self, records: Vec<AircraftRecord>) -> Result<Staged> {
        let snapshot = RegistrySnapshot::new(self.staging_version()?, records);
        snapshot.validate(&self.pattern)?;

        let fingerprint = self.staging.write(&snapshot)?;
        info!(
            path = %self.staging.path().display(),
            version = %snapshot.version,
            count = snapshot.total_count,
            "Staging snapshot written"
        );

        let previous = self.state.load()?.stage;
        if previous.awaits_decision() {
            warn!(stage = %previous, "Discarding earlier review decision for new staging data");
        }
        self.state.enter(Stage::StagingReady {
            fingerprint: fingerprint.clone(),
        })?;

        Ok(Staged {
            path: self.staging.path().to_path_buf(),
            version: snapshot.version,
            total_count: snapshot.total_count,
            fingerprint,
        })
    }

    /// Fingerprint of the staging document on disk.
    fn staging_fingerprint(&self) -> Result<String> {
        self.staging
            .fingerprint()?
            .ok_or_else(|| Error::SnapshotMissing {
                path: self.staging.path().to_path_buf(),
            })
    }

    /// Compare staging with production.
    ///
    /// A review from `Idle` picks up a staging file corrected by hand after
    /// a rejection. A missing production compares as an empty registry.
    ///
    /// # Errors
    ///
    /// Returns an error if the workflow is `Approved` or `Releasing`, or if
    /// staging is missing or unreadable.
    pub fn review(&self) -> Result<Review> {
        let stage = self.state.load()?.stage;
        if matches!(stage, Stage::Approved { .. } | Stage::Releasing { .. }) {
            return Err(Error::invalid_transition("review", &stage));
        }

        let actual = self.staging_fingerprint()?;
        match stage.fingerprint() {
            Some(recorded) if recorded != actual => {
                warn!(
                    recorded,
                    actual = %actual,
                    "Staging changed since it was recorded; reviewing the file on disk"
                );
            }
            _ => {}
        }

        let staging = self.staging.load()?;
        let production = self.production.load_or_empty()?;
        let diff = diff::diff(&production, &staging);

        let outcome = if diff.is_empty() {
            info!("Staging matches production; nothing to release");
            self.state.enter(Stage::Idle)?;
            ReviewOutcome::DiffEmpty
        } else {
            let summary = diff.summary();
            info!(%summary, "Changes pending review");
            self.state.enter(Stage::PendingReview {
                fingerprint: actual,
                summary,
            })?;
            ReviewOutcome::PendingReview(summary)
        };

        Ok(Review {
            production,
            staging,
            diff,
            outcome,
        })
    }

    /// Approve the pending change with the given version bump.
    ///
    /// # Errors
    ///
    /// Returns an error unless the workflow is `PendingReview` and staging
    /// is unchanged since the review.
    pub fn approve(&self, severity: Severity, note: Option<String>) -> Result<ReleaseState> {
        let (fingerprint, summary) = match self.state.load()?.stage {
            Stage::PendingReview {
                fingerprint,
                summary,
            } => (fingerprint, summary),
            stage => return Err(Error::invalid_transition("approve", stage)),
        };

        let actual = self.staging_fingerprint()?;
        if actual != fingerprint {
            return Err(Error::StagingChanged {
                expected: fingerprint,
                actual,
            });
        }

        info!(%severity, %summary, "Change approved");
        self.state.enter(Stage::Approved {
            fingerprint,
            summary,
            severity,
            note,
        })
    }

    /// Discard the pending or approved change.
    ///
    /// Production and staging are left as they are.
    ///
    /// # Errors
    ///
    /// Returns an error unless the workflow is `PendingReview` or `Approved`.
    pub fn reject(&self, reason: Option<String>) -> Result<Rejection> {
        let summary = match self.state.load()?.stage {
            Stage::PendingReview { summary, .. } | Stage::Approved { summary, .. } => summary,
            stage => return Err(Error::invalid_transition("reject", stage)),
        };

        info!(reason = reason.as_deref().unwrap_or("none"), %summary, "Change rejected");
        self.state.enter(Stage::Idle)?;
        Ok(Rejection { reason, summary })
    }

    /// Publish the approved staging snapshot to production.
    ///
    /// Staging is fingerprint-checked and schema-validated before anything
    /// is written. The target version is then recorded as `Releasing`, the
    /// current production is backed up, and the new document is written
    /// atomically.
    ///
    /// From `Releasing`, promotion resumes with the recorded version. If
    /// production already carries that release, only the stage is
    /// completed, so an interrupted promotion never bumps twice.
    ///
    /// # Errors
    ///
    /// Returns an error unless the workflow is `Approved` or `Releasing`,
    /// or if staging changed, fails validation, the version cannot be
    /// bumped, or the backup or write fails.
    pub fn promote(&self) -> Result<Release> {
        let (fingerprint, summary, severity, note, resumed) = match self.state.load()?.stage {
            Stage::Approved {
                fingerprint,
                summary,
                severity,
                note,
            } => (fingerprint, summary, severity, note, None),
            Stage::Releasing {
                fingerprint,
                summary,
                severity,
                note,
                version,
                previous,
            } => (fingerprint, summary, severity, note, Some((version, previous))),
            stage => return Err(Error::invalid_transition("promote", stage)),
        };

        let bytes = self.staging.read_bytes()?;
        let actual = storage::fingerprint(&bytes);
        if actual != fingerprint {
            return Err(Error::StagingChanged {
                expected: fingerprint,
                actual,
            });
        }

        let staging = storage::schema::validate_bytes(self.staging.path(), &bytes, &self.pattern)?;
        debug!(count = staging.total_count, "Staging passed schema validation");

        let production = self.production()?;
        let (version, previous) = match resumed {
            Some(target) => target,
            None => {
                let previous = production.as_ref().map(|current| current.version);
                let version = match previous {
                    Some(previous) => previous.bump(severity)?,
                    None => self.initial_version,
                };
                self.state.enter(Stage::Releasing {
                    fingerprint,
                    summary,
                    severity,
                    note: note.clone(),
                    version,
                    previous,
                })?;
                (version, previous)
            }
        };

        let already_released = resumed.is_some()
            && production.as_ref().is_some_and(|current| {
                current.version == version && current.aircraft == staging.aircraft
            });

        let (total_count, backup) = if already_released {
            info!(%version, "Production already carries this release; completing it");
            let backup = match previous {
                Some(previous) => self
                    .backups
                    .list()?
                    .into_iter()
                    .find(|backup| backup.version == Some(previous)),
                None => None,
            };
            (staging.total_count, backup)
        } else {
            let backup = self.backups.backup(&self.production)?;
            let released = staging.republished(version);
            self.production.write(&released)?;
            (released.total_count, backup)
        };
        self.state.enter(Stage::Idle)?;

        info!(
            %version,
            previous = %previous.map_or_else(|| "none".to_string(), |v| v.to_string()),
            count = total_count,
            "Released to production"
        );

        Ok(Release {
            version,
            previous,
            severity,
            note,
            total_count,
            summary,
            backup,
        })
    }

    /// Approve and promote in one step.
    ///
    /// # Errors
    ///
    /// Returns any error from [`approve`](Self::approve) or
    /// [`promote`](Self::promote).
    pub fn release(&self, severity: Severity, note: Option<String>) -> Result<Release> {
        self.approve(severity, note)?;
        self.promote()
    }

    /// Apply a reviewer's command.
    ///
    /// # Errors
    ///
    /// Returns any error from [`release`](Self::release) or
    /// [`reject`](Self::reject).
    pub fn apply(&self, command: ReviewCommand) -> Result<Decision> {
        match command {
            ReviewCommand::Release { severity, note } => {
                self.release(severity, note).map(Decision::Released)
            }
            ReviewCommand::Reject { reason } => self.reject(reason).map(Decision::Rejected),
        }
    }

    /// Restore production from a backup.
    ///
    /// Picks the newest backup, or the newest one for `version`. The
    /// current production is backed up before it is replaced.
    ///
    /// # Errors
    ///
    /// Returns an error if no backup matches, the backup fails validation,
    /// or the write fails.
    pub fn rollback(&self, version: Option<Version>) -> Result<Rollback> {
        let restored = self.backups.latest(version)?;
        let bytes = std::fs::read(&restored.path)?;
        let snapshot = storage::schema::validate_bytes(&restored.path, &bytes, &self.pattern)?;

        let safety_backup = self.backups.backup(&self.production)?;
        self.production.write_bytes(&bytes)?;

        let stage = self.state.load()?.stage;
        if stage.awaits_decision() {
            warn!(stage = %stage, "Discarding review decision after rollback");
        }
        self.state.enter(Stage::Idle)?;

        info!(
            version = %snapshot.version,
            backup = %restored.path.display(),
            "Production rolled back"
        );

        Ok(Rollback {
            restored,
            version: snapshot.version,
            safety_backup,
        })
    }

    /// List backups, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the backup directory cannot be read.
    pub fn backups(&self) -> Result<Vec<Backup>> {
        self.backups.list()
    }

    /// Report the workflow stage and both documents.
    ///
    /// # Errors
    ///
    /// Returns an error if a document or the state file cannot be read.
    pub fn status(&self) -> Result<Status> {
        let state = self.state.load()?;
        let production = self
            .production()?
            .map(|snapshot| SnapshotInfo::of(self.production.path(), &snapshot));
        let staging = if self.staging.exists() {
            Some(SnapshotInfo::of(self.staging.path(), &self.staging.load()?))
        } else {
            None
        };

        Ok(Status {
            stage: state.stage,
            updated_at: state.updated_at,
            production,
            staging,
            backups: self.backups.list()?.len(),
        })
    }
}
