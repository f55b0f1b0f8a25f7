//! Command-line interface for the aircraft registry.
//!
//! This module provides the CLI structure for the `acreg` binary.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

pub use commands::{
    ApproveCommand, ConfigCommand, DecideCommand, RejectCommand, ReviewCommand, RollbackCommand,
    SeverityArg, StatusCommand, SyncCommand, ValidateCommand,
};

/// acreg - Maintain a reviewed, versioned aircraft registry
///
/// Fetches the civil aircraft register, stages a normalized snapshot, and
/// publishes it to production only after a reviewer approves the change.
#[derive(Debug, Parser)]
#[command(name = "acreg")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Path to custom configuration file
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// The command to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch the register and write a staging snapshot
    Sync(SyncCommand),

    /// Compare staging with production
    Review(ReviewCommand),

    /// Approve the reviewed change
    Approve(ApproveCommand),

    /// Reject the reviewed change
    Reject(RejectCommand),

    /// Approve the reviewed change and publish it
    Release(ApproveCommand),

    /// Publish an approved change
    Promote,

    /// Apply a reviewer comment such as "release minor new gliders"
    Decide(DecideCommand),

    /// Check a snapshot against the registry schema
    Validate(ValidateCommand),

    /// Restore production from a backup
    #[command(disable_version_flag = true)]
    Rollback(RollbackCommand),

    /// List production backups
    Backups,

    /// Show workflow status
    Status(StatusCommand),

    /// View or check configuration
    #[command(subcommand)]
    Config(ConfigCommand),
}

impl Cli {
    /// Get the verbosity level based on flags.
    #[must_use]
    pub fn verbosity(&self) -> crate::logging::Verbosity {
        crate::logging::Verbosity::from_flags(self.quiet, self.verbose)
    }
}
