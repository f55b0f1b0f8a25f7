//! Fetch, normalize and stage one registry snapshot.

use tracing::{info, instrument};

use crate::error::{Error, Result};
use crate::fetch::RecordSource;
use crate::normalize::{NormalizeStats, Normalizer, OverrideSet};
use crate::release::{ReleaseManager, Staged};

/// What a sync produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// Rows received from the source.
    pub rows_fetched: usize,
    /// Normalization counters.
    pub stats: NormalizeStats,
    /// The staging snapshot written.
    pub staged: Staged,
}

/// Run one sync: fetch from `source`, normalize with `overrides`, and
/// write the result to staging for review.
///
/// Production is never touched. A source that yields no rows, or none
/// that survive status filtering, aborts the sync before staging is written.
///
/// # Errors
///
/// Returns a fetch error if the source fails or is empty, a validation
/// error if a record is invalid, or an I/O error if staging cannot be written.
#[instrument(skip_all, fields(source = %source.describe()))]
pub async fn run_sync(
    source: &dyn RecordSource,
    normalizer: &Normalizer,
    overrides: &OverrideSet,
    manager: &ReleaseManager,
) -> Result<SyncReport> {
    let dataset = source.fetch().await?;
    if dataset.is_empty() {
        return Err(Error::feed(format!(
            "{} contained 0 aircraft",
            source.describe()
        )));
    }
    info!(rows = dataset.len(), "Fetched registry data");

    let normalized = normalizer.normalize(&dataset, overrides)?;
    let stats = normalized.stats;
    info!(
        kept = stats.kept,
        records = normalized.records.len(),
        filtered = stats.filtered_by_status,
        skipped = stats.skipped,
        overrides = stats.overrides_applied,
        "Normalized registry data"
    );

    // Overrides alone must not stand in for a feed with nothing publishable.
    if stats.kept == 0 {
        return Err(Error::feed(format!(
            "{} contained 0 aircraft with a published status",
            source.describe()
        )));
    }

    let staged = manager.write_staging(normalized.records)?;

    Ok(SyncReport {
        rows_fetched: dataset.len(),
        stats,
        staged,
    })
}
