//! CLI command definitions.
//!
//! This module defines the structure of all CLI subcommands.

use std::path::PathBuf;

use clap::{Args, Subcommand, ValueEnum};

use crate::version::{Severity, Version};

/// Sync command arguments.
#[derive(Debug, Args)]
pub struct SyncCommand {
    /// Read the CSV export from a local file instead of the endpoint
    #[arg(short, long, value_name = "CSV")]
    pub from_file: Option<PathBuf>,

    /// Override file to apply (defaults to registry.overrides_path)
    #[arg(short, long, value_name = "FILE")]
    pub overrides: Option<PathBuf>,
}

/// Review command arguments.
#[derive(Debug, Args)]
pub struct ReviewCommand {
    /// Output the diff as JSON
    #[arg(short, long)]
    pub json: bool,

    /// Maximum entries listed per change category
    #[arg(short, long)]
    pub limit: Option<usize>,
}

/// Arguments for commands that approve a change.
#[derive(Debug, Args)]
pub struct ApproveCommand {
    /// Version bump to apply
    #[arg(value_enum)]
    pub severity: SeverityArg,

    /// Release note
    pub note: Option<String>,
}

/// Reject command arguments.
#[derive(Debug, Args)]
pub struct RejectCommand {
    /// Why the change is rejected
    pub reason: Option<String>,
}

/// Decide command arguments.
#[derive(Debug, Args)]
pub struct DecideCommand {
    /// Reviewer comment, e.g. "release patch fixed MTOM" or "reject"
    pub text: String,
}

/// Validate command arguments.
#[derive(Debug, Args)]
pub struct ValidateCommand {
    /// Snapshot to validate (defaults to the staging file)
    pub file: Option<PathBuf>,
}

/// Rollback command arguments.
#[derive(Debug, Args)]
pub struct RollbackCommand {
    /// Restore the newest backup of this version
    #[arg(long, value_parser = parse_version)]
    pub version: Option<Version>,
}

/// Status command arguments.
#[derive(Debug, Args)]
pub struct StatusCommand {
    /// Output as JSON
    #[arg(short, long)]
    pub json: bool,
}

/// Configuration commands.
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(short, long)]
        json: bool,
    },

    /// Show the configuration file path
    Path,

    /// Validate configuration
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        file: Option<PathBuf>,
    },
}

/// Version bump argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SeverityArg {
    /// Corrections to existing entries
    Patch,
    /// Added aircraft or backward-compatible additions
    Minor,
    /// Breaking changes
    Major,
}

impl From<SeverityArg> for Severity {
    fn from(arg: SeverityArg) -> Self {
        match arg {
            SeverityArg::Patch => Self::Patch,
            SeverityArg::Minor => Self::Minor,
            SeverityArg::Major => Self::Major,
        }
    }
}

fn parse_version(raw: &str) -> Result<Version, String> {
    raw.parse().map_err(|e: crate::Error| e.to_string())
}
