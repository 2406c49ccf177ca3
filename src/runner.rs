//! Exporting many cafeterias in one run.

use crate::config::Registry;
use crate::error::ExportError;
use crate::export::{ExportReport, Exporter};
use crate::transport::Transport;
use crate::utils::ensure_writable_dir;
use futures::stream::{self, StreamExt};
use std::path::Path;
use tracing::{error, info, instrument};

pub const DEFAULT_CONCURRENCY: usize = 4;

/// Export every cafeteria of `registry` below `base_dir`, with at most
/// `concurrency` cafeterias in flight.
///
/// Each cafeteria writes into its own sanitized subdirectory, and a failing
/// cafeteria never affects the others. Reports come back sorted by
/// cafeteria id.
///
/// # Arguments
///
/// * `exporter` - Exporter shared by all cafeterias
/// * `registry` - The cafeterias to export
/// * `base_dir` - Parent directory of the per-cafeteria directories
/// * `concurrency` - Cafeterias in flight at once (at least one)
///
/// # Errors
///
/// Returns [`ExportError::OutputUnavailable`] if `base_dir` cannot be
/// created or written. Everything else ends up in the reports.
#[instrument(level = "info", skip_all, fields(base_dir = %base_dir.display(), cafeterias = registry.len()))]
pub async fn run_all<T: Transport>(
    exporter: &Exporter<T>,
    registry: &Registry,
    base_dir: &Path,
    concurrency: usize,
) -> Result<Vec<ExportReport>, ExportError> {
    if let Err(e) = ensure_writable_dir(base_dir).await {
        error!(error = %e, "Base directory is not writable");
        return Err(ExportError::output_unavailable(base_dir, e));
    }

    info!(concurrency, "Starting export");
    let mut reports: Vec<ExportReport> = stream::iter(registry.iter())
        .map(|cafeteria| async move {
            let output_dir = base_dir.join(cafeteria.output_dir_name());
            exporter.export(cafeteria, &output_dir).await
        })
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    reports.sort_by(|a, b| a.cafeteria.cmp(&b.cafeteria));

    let succeeded = reports.iter().filter(|r| r.is_success()).count();
    info!(
        total = reports.len(),
        succeeded,
        failed = reports.len() - succeeded,
        "Completed export run"
    );
    Ok(reports)
}

/// Whether the run exported everything it found.
///
/// Only the reports count: a deadline that passes after the last day was
/// written does not turn a complete run into a failed one.
pub fn all_succeeded(reports: &[ExportReport]) -> bool {
    reports.iter().all(ExportReport::is_success)
}
