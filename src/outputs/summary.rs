//! End-of-run summary.
//!
//! One line per cafeteria with its day counts, followed by one indented line
//! per failed day and, if the cafeteria was aborted, the reason.

use crate::export::{DayOutcome, ExportReport};
use std::fmt::Write;
use tracing::{debug, info, warn};

pub fn render_summary(reports: &[ExportReport]) -> String {
    let width = reports.iter().map(|r| r.cafeteria.len()).max().unwrap_or(0);
    let mut out = String::new();

    for report in reports {
        let _ = writeln!(
            out,
            "{:<width$}  written {:>2}  no-data {:>2}  failed {:>2}  cancelled {:>2}",
            report.cafeteria,
            report.written(),
            report.no_data(),
            report.failed(),
            report.cancelled(),
        );
        for (date, cause) in report.failures() {
            let _ = writeln!(out, "  {date}: {cause}");
        }
        if let Some(reason) = &report.aborted {
            let _ = writeln!(out, "  aborted: {reason}");
        }
    }

    let failed = reports.iter().filter(|r| !r.is_success()).count();
    let _ = writeln!(out, "{} cafeterias, {} with problems", reports.len(), failed);
    out
}

/// Log one event per report, plus one debug event per written file.
pub fn log_reports(reports: &[ExportReport]) {
    for report in reports {
        for day in &report.days {
            if let DayOutcome::Written { path } = &day.outcome {
                debug!(cafeteria = %report.cafeteria, date = %day.date, path = %path.display(), "Day file");
            }
        }
        let aborted = report.aborted.as_ref().map(ToString::to_string);
        if report.is_success() {
            info!(
                cafeteria = %report.cafeteria,
                output_dir = %report.output_dir.display(),
                written = report.written(),
                no_data = report.no_data(),
                "Cafeteria exported"
            );
        } else {
            warn!(
                cafeteria = %report.cafeteria,
                output_dir = %report.output_dir.display(),
                written = report.written(),
                no_data = report.no_data(),
                failed = report.failed(),
                cancelled = report.cancelled(),
                ?aborted,
                "Cafeteria export incomplete"
            );
        }
    }
}
