//! Semantic versions for published snapshots.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// How large a release is, which decides the version component to bump.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Data updates, new aircraft, corrections.
    Patch,
    /// New fields or other backward-compatible changes.
    Minor,
    /// Breaking changes to the published schema.
    Major,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Patch => write!(f, "patch"),
            Self::Minor => write!(f, "minor"),
            Self::Major => write!(f, "major"),
        }
    }
}

impl FromStr for Severity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "patch" => Ok(Self::Patch),
            "minor" => Ok(Self::Minor),
            "major" => Ok(Self::Major),
            _ => Err(Error::invalid_command(
                s,
                "severity must be one of patch, minor, major",
            )),
        }
    }
}

/// A `MAJOR.MINOR.PATCH` version.
///
/// Serialized as its dotted string form so snapshot documents keep the
/// plain `"1.2.3"` representation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Version {
    /// Incremented for breaking changes.
    pub major: u64,
    /// Incremented for backward-compatible additions.
    pub minor: u64,
    /// Incremented for data updates.
    pub patch: u64,
}

impl Version {
    /// The version reported for a registry that has never been released.
    pub const ZERO: Self = Self::new(0, 0, 0);

    /// Create a version from its components.
    #[must_use]
    pub const fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    /// Return the next version for a release of the given severity.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidVersion`] if the bumped component would
    /// overflow.
    pub fn bump(self, severity: Severity) -> Result<Self> {
        let next = match severity {
            Severity::Patch => self
                .patch
                .checked_add(1)
                .map(|patch| Self::new(self.major, self.minor, patch)),
            Severity::Minor => self
                .minor
                .checked_add(1)
                .map(|minor| Self::new(self.major, minor, 0)),
            Severity::Major => self.major.checked_add(1).map(|major| Self::new(major, 0, 0)),
        };
        next.ok_or_else(|| Error::InvalidVersion {
            version: self.to_string(),
            message: format!("a {severity} bump overflows"),
        })
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || Error::InvalidVersion {
            version: s.to_string(),
            message: "expected MAJOR.MINOR.PATCH".to_string(),
        };
        let mut parts = s.trim().split('.');
        let mut next = || -> Result<u64> {
            let part = parts.next().ok_or_else(invalid)?;
            if part.is_empty() || !part.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid());
            }
            part.parse().map_err(|_| invalid())
        };
        let version = Self::new(next()?, next()?, next()?);
        if parts.next().is_some() {
            return Err(invalid());
        }
        Ok(version)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Version {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
