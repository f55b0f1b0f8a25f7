//! Configuration management for the aircraft registry.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::version::Version;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default configuration directory name.
const CONFIG_DIR_NAME: &str = "aircraft-registry";

/// Project-local configuration file, looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = "acreg.toml";

/// Prefix for configuration environment variables.
const ENV_PREFIX: &str = "ACREG_";

/// BAZL aircraft register CSV export.
pub const DEFAULT_ENDPOINT: &str = "https://app02.bazl.admin.ch/web/bazl-backend/lfr/csv";

/// Swiss registration marks: `HB-` followed by three or four characters.
pub const DEFAULT_REGISTRATION_PATTERN: &str = r"^HB-[A-Z0-9]{3,4}$";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `ACREG_`, `__` between sections)
/// 2. `acreg.toml` in the working directory
/// 3. TOML config file at `~/.config/aircraft-registry/config.toml`
/// 4. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Source feed configuration.
    pub source: SourceConfig,
    /// Registry file layout and rules.
    pub registry: RegistryConfig,
    /// Review report configuration.
    pub review: ReviewConfig,
}

/// Source feed configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// URL of the CSV export.
    pub endpoint: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    /// CSV field delimiter.
    pub delimiter: String,
    /// Language requested from the feed.
    pub language: String,
    /// Aircraft statuses that are kept in the registry.
    pub allowed_statuses: Vec<String>,
    /// Names of the CSV columns that are read.
    pub columns: ColumnConfig,
}

/// CSV column names, compared after trimming whitespace.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColumnConfig {
    /// Registration mark column.
    pub registration: String,
    /// ICAO type designator column.
    pub icao_aircraft_type: String,
    /// Aircraft category column.
    pub aircraft_type: String,
    /// Maximum take-off mass column.
    pub mtom: String,
    /// Registration status column.
    pub status: String,
}

/// Registry file layout and rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Staging snapshot written by every sync.
    pub staging_path: PathBuf,
    /// Published production snapshot.
    pub production_path: PathBuf,
    /// Manual override file.
    pub overrides_path: PathBuf,
    /// Directory holding production backups.
    pub backup_dir: PathBuf,
    /// Persisted release workflow state.
    pub state_path: PathBuf,
    /// Regex every registration must match.
    pub registration_pattern: String,
    /// Version used before anything has been released.
    pub initial_version: String,
}

/// Review report configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReviewConfig {
    /// Maximum entries listed per change category.
    pub report_limit: usize,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout_secs: 30,
            delimiter: ";".to_string(),
            language: "en".to_string(),
            allowed_statuses: default_allowed_statuses(),
            columns: ColumnConfig::default(),
        }
    }
}

impl Default for ColumnConfig {
    fn default() -> Self {
        Self {
            registration: "Registration".to_string(),
            icao_aircraft_type: "ICAO Aircraft Type".to_string(),
            aircraft_type: "Aircraft Type".to_string(),
            mtom: "MTOM".to_string(),
            status: "Status".to_string(),
        }
    }
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            staging_path: PathBuf::from("aircraft-staging.json"),
            production_path: PathBuf::from("aircraft.json"),
            overrides_path: PathBuf::from("aircraft-overrides.json"),
            backup_dir: PathBuf::from("backups"),
            state_path: PathBuf::from(".acreg-state.json"),
            registration_pattern: DEFAULT_REGISTRATION_PATTERN.to_string(),
            initial_version: "1.0.0".to_string(),
        }
    }
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self { report_limit: 10 }
    }
}

/// Statuses under which an aircraft belongs in the registry.
fn default_allowed_statuses() -> Vec<String> {
    vec![
        "Registered".to_string(),
        "Reserved".to_string(),
        "Reservation Expired".to_string(),
        "Registration in Progress".to_string(),
    ]
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);
        Self::from_figment(Self::figment(&config_file, Path::new(LOCAL_CONFIG_FILE)))
    }

    fn figment(config_file: &Path, local_file: &Path) -> Figment {
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(config_file))
            .merge(Toml::file(local_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    fn from_figment(figment: Figment) -> Result<Self> {
        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.source.timeout_secs == 0 {
            return Err(Error::ConfigValidation {
                message: "timeout_secs must be greater than 0".to_string(),
            });
        }

        if self.source.delimiter.len() != 1 || !self.source.delimiter.is_ascii() {
            return Err(Error::ConfigValidation {
                message: format!(
                    "delimiter must be a single ASCII character, got {:?}",
                    self.source.delimiter
                ),
            });
        }

        if self.source.allowed_statuses.is_empty() {
            return Err(Error::ConfigValidation {
                message: "allowed_statuses must not be empty".to_string(),
            });
        }

        if Regex::new(&self.registry.registration_pattern).is_err() {
            return Err(Error::ConfigValidation {
                message: format!(
                    "invalid regex pattern: {}",
                    self.registry.registration_pattern
                ),
            });
        }

        if self.registry.initial_version.parse::<Version>().is_err() {
            return Err(Error::ConfigValidation {
                message: format!(
                    "initial_version is not MAJOR.MINOR.PATCH: {}",
                    self.registry.initial_version
                ),
            });
        }

        Ok(())
    }

    /// Get the request timeout as a Duration.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.source.timeout_secs)
    }

    /// Get the CSV delimiter byte.
    #[must_use]
    pub fn delimiter(&self) -> u8 {
        self.source.delimiter.as_bytes().first().copied().unwrap_or(b';')
    }

    /// Compile the registration pattern.
    ///
    /// # Errors
    ///
    /// Returns an error if the pattern is not a valid regex.
    pub fn registration_regex(&self) -> Result<Regex> {
        Regex::new(&self.registry.registration_pattern).map_err(|e| Error::ConfigValidation {
            message: format!("invalid regex pattern: {e}"),
        })
    }

    /// Get the version used before the first release.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured version is malformed.
    pub fn initial_version(&self) -> Result<Version> {
        self.registry.initial_version.parse()
    }
}
