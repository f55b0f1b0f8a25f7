//! Error types for the aircraft registry.
//!
//! This module defines all error types used throughout the crate. The
//! pipeline-level taxonomy is fetch, validation and schema errors. Workflow,
//! configuration and I/O failures sit alongside them.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for aircraft registry operations.
#[derive(Error, Debug)]
pub enum Error {
    // === Fetch Errors ===
    /// The source could not be reached or the request failed in transit.
    #[error("failed to fetch aircraft data from {endpoint}: {source}")]
    Fetch {
        /// Endpoint that was queried.
        endpoint: String,
        /// The underlying error.
        #[source]
        source: reqwest::Error,
    },

    /// The source answered with a non-success HTTP status.
    #[error("aircraft source {endpoint} returned HTTP {status}")]
    FetchStatus {
        /// Endpoint that was queried.
        endpoint: String,
        /// The HTTP status code.
        status: u16,
    },

    /// A local export could not be read.
    #[error("failed to read aircraft data from {path}: {source}")]
    SourceRead {
        /// Path of the export.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// The source payload was unusable (bad encoding, missing columns, empty).
    #[error("malformed aircraft feed: {message}")]
    Feed {
        /// Description of what was wrong with the feed.
        message: String,
    },

    /// The CSV payload could not be parsed.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    // === Validation Errors ===
    /// A normalized record violated the registry rules.
    #[error("invalid aircraft {registration}: {message}")]
    Validation {
        /// Registration of the offending record.
        registration: String,
        /// Description of the violation.
        message: String,
    },

    /// A snapshot document does not conform to the registry schema.
    #[error("schema violation in {path}: {message}")]
    Schema {
        /// Document that failed the check.
        path: PathBuf,
        /// Description of the violation.
        message: String,
    },

    // === Workflow Errors ===
    /// The requested action is not allowed from the current stage.
    #[error("cannot {action} while registry is {stage}")]
    InvalidTransition {
        /// The action that was attempted.
        action: &'static str,
        /// The stage the workflow was in.
        stage: String,
    },

    /// Staging no longer matches the content that was reviewed or approved.
    #[error("staging changed since it was reviewed (expected {expected}, found {actual})")]
    StagingChanged {
        /// Fingerprint recorded at review/approval time.
        expected: String,
        /// Fingerprint of the file on disk.
        actual: String,
    },

    /// A snapshot that the operation needs does not exist.
    #[error("snapshot not found: {path}")]
    SnapshotMissing {
        /// Expected location of the snapshot.
        path: PathBuf,
    },

    /// No backup matched the rollback request.
    #[error("no backup available{}", .version.as_ref().map(|v| format!(" for version {v}")).unwrap_or_default())]
    BackupMissing {
        /// Requested version, if any.
        version: Option<String>,
    },

    /// A version is not `MAJOR.MINOR.PATCH` or cannot be bumped.
    #[error("invalid version '{version}': {message}")]
    InvalidVersion {
        /// The offending version text.
        version: String,
        /// Description of the problem.
        message: String,
    },

    /// A review command could not be understood.
    #[error("invalid review command '{input}': {message}")]
    InvalidCommand {
        /// The raw command text.
        input: String,
        /// Why it was rejected.
        message: String,
    },

    // === Configuration Errors ===
    /// Failed to load configuration.
    #[error("failed to load configuration: {0}")]
    ConfigLoad(Box<figment::Error>),

    /// Configuration validation failed.
    #[error("invalid configuration: {message}")]
    ConfigValidation {
        /// Description of the validation failure.
        message: String,
    },

    /// The override file could not be read or parsed.
    #[error("failed to load overrides from {path}: {message}")]
    Overrides {
        /// Path of the override file.
        path: PathBuf,
        /// Description of what went wrong.
        message: String,
    },

    // === I/O Errors ===
    /// File system operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Failed to create a required directory.
    #[error("failed to create directory {path}: {source}")]
    DirectoryCreate {
        /// Path that couldn't be created.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to write a file.
    #[error("failed to write {path}: {source}")]
    FileWrite {
        /// Path that couldn't be written.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    // === Serialization Errors ===
    /// JSON serialization/deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A specialized Result type for aircraft registry operations.
pub type Result<T> = std::result::Result<T, Error>;

impl From<figment::Error> for Error {
    fn from(err: figment::Error) -> Self {
        Self::ConfigLoad(Box::new(err))
    }
}

impl Error {
    /// Create a new feed error.
    #[must_use]
    pub fn feed(message: impl Into<String>) -> Self {
        Self::Feed {
            message: message.into(),
        }
    }

    /// Create a validation error for the given registration.
    #[must_use]
    pub fn validation(registration: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            registration: registration.into(),
            message: message.into(),
        }
    }

    /// Create a schema error for the given document.
    #[must_use]
    pub fn schema(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Schema {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an invalid transition error.
    #[must_use]
    pub fn invalid_transition(action: &'static str, stage: impl ToString) -> Self {
        Self::InvalidTransition {
            action,
            stage: stage.to_string(),
        }
    }

    /// Create an invalid command error.
    #[must_use]
    pub fn invalid_command(input: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidCommand {
            input: input.into(),
            message: message.into(),
        }
    }

    /// Check if this error means the source data could not be obtained.
    #[must_use]
    pub fn is_fetch_error(&self) -> bool {
        matches!(
            self,
            Self::Fetch { .. }
                | Self::FetchStatus { .. }
                | Self::SourceRead { .. }
                | Self::Feed { .. }
                | Self::Csv(_)
        )
    }

    /// Check if this error is a record validation failure.
    #[must_use]
    pub fn is_validation_error(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Check if this error is a schema failure.
    #[must_use]
    pub fn is_schema_error(&self) -> bool {
        matches!(self, Self::Schema { .. })
    }
}
