//! `acreg` - CLI for the aircraft registry
//!
//! This binary syncs the register into staging, reports changes for review,
//! and publishes approved snapshots to production.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use anyhow::Context;
use clap::Parser;

use aircraft_registry::cli::{Cli, Command, ConfigCommand, SyncCommand, ValidateCommand};
use aircraft_registry::fetch::{FileSource, HttpSource, RecordSource};
use aircraft_registry::normalize::{Normalizer, OverrideSet};
use aircraft_registry::release::{Decision, Release, ReleaseManager, ReviewOutcome};
use aircraft_registry::storage::SnapshotStore;
use aircraft_registry::sync::run_sync;
use aircraft_registry::{init_logging, Config};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    let config = Config::load_from(cli.config.clone()).context("failed to load configuration")?;

    if let Command::Config(config_cmd) = cli.command {
        return handle_config(&config, config_cmd);
    }

    let manager = ReleaseManager::from_config(&config)?;

    match cli.command {
        Command::Sync(cmd) => handle_sync(&config, &manager, cmd),
        Command::Review(cmd) => {
            handle_review(&manager, cmd.json, cmd.limit.unwrap_or(config.review.report_limit))
        }
        Command::Approve(cmd) => {
            let state = manager.approve(cmd.severity.into(), cmd.note)?;
            println!("Approved: {}", state.stage);
            println!("Run 'acreg promote' to publish.");
            Ok(())
        }
        Command::Reject(cmd) => {
            let rejection = manager.reject(cmd.reason)?;
            println!("Rejected ({}). Production is unchanged.", rejection.summary);
            Ok(())
        }
        Command::Release(cmd) => {
            let release = manager.release(cmd.severity.into(), cmd.note)?;
            print_release(&release);
            Ok(())
        }
        Command::Promote => {
            let release = manager.promote()?;
            print_release(&release);
            Ok(())
        }
        Command::Decide(cmd) => handle_decide(&manager, &cmd.text),
        Command::Validate(cmd) => handle_validate(&manager, cmd),
        Command::Rollback(cmd) => {
            let rollback = manager.rollback(cmd.version)?;
            if let Some(safety) = &rollback.safety_backup {
                println!("Backed up current production to {}", safety.path.display());
            }
            println!(
                "Restored {} (version {})",
                rollback.restored.path.display(),
                rollback.version
            );
            Ok(())
        }
        Command::Backups => handle_backups(&manager),
        Command::Status(cmd) => handle_status(&manager, cmd.json),
        Command::Config(_) => Ok(()),
    }
}

fn handle_sync(config: &Config, manager: &ReleaseManager, cmd: SyncCommand) -> anyhow::Result<()> {
    let overrides_path = cmd
        .overrides
        .unwrap_or_else(|| config.registry.overrides_path.clone());
    let overrides = OverrideSet::load(&overrides_path)?;

    let source: Box<dyn RecordSource> = match cmd.from_file {
        Some(path) => Box::new(FileSource::new(path, config.delimiter())),
        None => Box::new(HttpSource::from_config(config)?),
    };
    let normalizer = Normalizer::from_config(config)?;

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;
    let report = runtime
        .block_on(run_sync(source.as_ref(), &normalizer, &overrides, manager))
        .with_context(|| format!("sync from {} failed", source.describe()))?;

    println!(
        "Staged {} aircraft (version {}) to {}",
        report.staged.total_count,
        report.staged.version,
        report.staged.path.display()
    );
    println!(
        "  {} rows fetched, {} kept, {} filtered by status, {} skipped, {} overrides applied",
        report.rows_fetched,
        report.stats.kept,
        report.stats.filtered_by_status,
        report.stats.skipped,
        report.stats.overrides_applied
    );
    println!("Run 'acreg review' to compare with production.");
    Ok(())
}

fn handle_review(manager: &ReleaseManager, json: bool, limit: usize) -> anyhow::Result<()> {
    let review = manager.review()?;

    if json {
        let outcome = match review.outcome {
            ReviewOutcome::DiffEmpty => "diff_empty",
            ReviewOutcome::PendingReview(_) => "pending_review",
        };
        let report = serde_json::json!({
            "outcome": outcome,
            "production_version": review.production.version,
            "staging_version": review.staging.version,
            "summary": review.diff.summary(),
            "diff": review.diff,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    match review.outcome {
        ReviewOutcome::DiffEmpty => {
            println!("No changes between staging and production.");
        }
        ReviewOutcome::PendingReview(summary) => {
            print!("{}", review.report(limit));
            println!();
            println!("{summary}. Awaiting decision:");
            println!("  acreg release <patch|minor|major> [note]");
            println!("  acreg reject [reason]");
        }
    }
    Ok(())
}

fn handle_decide(manager: &ReleaseManager, text: &str) -> anyhow::Result<()> {
    let command: aircraft_registry::release::ReviewCommand = text.parse()?;
    match manager.apply(command)? {
        Decision::Released(release) => print_release(&release),
        Decision::Rejected(rejection) => {
            println!(
                "Rejected: {} ({}). Production is unchanged.",
                rejection.reason.as_deref().unwrap_or("no reason given"),
                rejection.summary
            );
        }
    }
    Ok(())
}

fn handle_validate(manager: &ReleaseManager, cmd: ValidateCommand) -> anyhow::Result<()> {
    let store = match cmd.file {
        Some(path) => SnapshotStore::new(path),
        None => manager.staging().clone(),
    };
    let snapshot = store
        .load_validated(manager.pattern())
        .with_context(|| format!("{} failed validation", store.path().display()))?;

    println!(
        "{} is valid: version {}, {} aircraft",
        store.path().display(),
        snapshot.version,
        snapshot.total_count
    );
    Ok(())
}

fn handle_backups(manager: &ReleaseManager) -> anyhow::Result<()> {
    let backups = manager.backups()?;
    if backups.is_empty() {
        println!("No backups found.");
        return Ok(());
    }

    println!("{:<10} {:<22} PATH", "VERSION", "CREATED");
    for backup in backups {
        let version = backup
            .version
            .map_or_else(|| "unknown".to_string(), |v| v.to_string());
        println!(
            "{:<10} {:<22} {}",
            version,
            backup.created.format("%Y-%m-%d %H:%M:%S"),
            backup.path.display()
        );
    }
    Ok(())
}

fn handle_status(manager: &ReleaseManager, json: bool) -> anyhow::Result<()> {
    let status = manager.status()?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!("acreg status");
    println!("------------");
    println!("Stage:       {} (since {})", status.stage, status.updated_at.to_rfc3339());
    for (label, info) in [("Production:", &status.production), ("Staging:", &status.staging)] {
        match info {
            Some(info) => println!(
                "{label:<12} v{} with {} aircraft ({})",
                info.version,
                info.total_count,
                info.path.display()
            ),
            None => println!("{label:<12} none"),
        }
    }
    println!("Backups:     {}", status.backups);
    Ok(())
}

fn print_release(release: &Release) {
    let previous = release
        .previous
        .map_or_else(|| "none".to_string(), |v| v.to_string());
    println!(
        "Released version {} ({} bump from {previous}): {} aircraft, {}",
        release.version, release.severity, release.total_count, release.summary
    );
    if let Some(note) = &release.note {
        println!("  Note: {note}");
    }
    if let Some(backup) = &release.backup {
        println!("  Previous production backed up to {}", backup.path.display());
    }
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Source]");
                println!("  Endpoint:           {}", config.source.endpoint);
                println!("  Timeout (secs):     {}", config.source.timeout_secs);
                println!("  Delimiter:          {:?}", config.source.delimiter);
                println!(
                    "  Allowed statuses:   {}",
                    config.source.allowed_statuses.join(", ")
                );
                println!();
                println!("[Registry]");
                println!(
                    "  Production:         {}",
                    config.registry.production_path.display()
                );
                println!(
                    "  Staging:            {}",
                    config.registry.staging_path.display()
                );
                println!(
                    "  Overrides:          {}",
                    config.registry.overrides_path.display()
                );
                println!("  Backups:            {}", config.registry.backup_dir.display());
                println!(
                    "  Registration regex: {}",
                    config.registry.registration_pattern
                );
                println!();
                println!("[Review]");
                println!("  Report limit:       {}", config.review.report_limit);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            Config::load_from(Some(path)).context("configuration is invalid")?;
            println!("Configuration is valid.");
        }
    }
    Ok(())
}
