//! Exporting one cafeteria: every available day becomes a JSON file.
//!
//! Days are processed sequentially in ascending order. A day that cannot be
//! fetched or parsed is recorded in the [`ExportReport`] and skipped; only a
//! filesystem failure aborts the cafeteria.

use crate::config::Cafeteria;
use crate::error::{ExportError, FetchError, ParseError};
use crate::fetch::Fetcher;
use crate::models::DailyMenu;
use crate::outputs::json::write_daily_menu;
use crate::parse;
use crate::transport::Transport;
use crate::utils::ensure_writable_dir;
use chrono::NaiveDate;
use std::path::{Path, PathBuf};
use tracing::{debug, error, info, instrument, warn};

/// What happened to one day of an export.
#[derive(Debug)]
pub enum DayOutcome {
    Written { path: PathBuf },
    /// The provider has nothing for the day. No file is written.
    NoData,
    Failed { cause: ExportError },
    /// The run was stopped before the day was fetched.
    Cancelled,
}

#[derive(Debug)]
pub struct DayReport {
    pub date: NaiveDate,
    pub outcome: DayOutcome,
}

#[derive(Debug)]
pub struct ExportReport {
    pub cafeteria: String,
    pub output_dir: PathBuf,
    pub days: Vec<DayReport>,
    /// Set when the cafeteria could not be exported at all, or stopped
    /// part way because output could not be written.
    pub aborted: Option<ExportError>,
}

impl ExportReport {
    pub fn new(cafeteria: &str, output_dir: &Path) -> Self {
        Self {
            cafeteria: cafeteria.to_string(),
            output_dir: output_dir.to_path_buf(),
            days: Vec::new(),
            aborted: None,
        }
    }

    fn count(&self, matches: impl Fn(&DayOutcome) -> bool) -> usize {
        self.days.iter().filter(|d| matches(&d.outcome)).count()
    }

    pub fn written(&self) -> usize {
        self.count(|o| matches!(o, DayOutcome::Written { .. }))
    }

    pub fn no_data(&self) -> usize {
        self.count(|o| matches!(o, DayOutcome::NoData))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, DayOutcome::Failed { .. }))
    }

    pub fn cancelled(&self) -> usize {
        self.count(|o| matches!(o, DayOutcome::Cancelled))
    }

    /// No day failed or was cancelled and the cafeteria was not aborted.
    pub fn is_success(&self) -> bool {
        self.aborted.is_none() && self.failed() == 0 && self.cancelled() == 0
    }

    pub fn failures(&self) -> impl Iterator<Item = (NaiveDate, &ExportError)> {
        self.days.iter().filter_map(|d| match &d.outcome {
            DayOutcome::Failed { cause } => Some((d.date, cause)),
            _ => None,
        })
    }
}

pub struct Exporter<T> {
    fetcher: Fetcher<T>,
}

impl<T: Transport> Exporter<T> {
    pub fn new(fetcher: Fetcher<T>) -> Self {
        Self { fetcher }
    }

    pub fn fetcher(&self) -> &Fetcher<T> {
        &self.fetcher
    }

    /// Export every available day of `cafeteria` into `output_dir`.
    ///
    /// Days are fetched, parsed and written one after another in ascending
    /// order. Once the run is stopped no further day is fetched.
    ///
    /// # Arguments
    ///
    /// * `cafeteria` - Registry entry to export
    /// * `output_dir` - Directory for the day files, created if missing
    ///
    /// # Returns
    ///
    /// An [`ExportReport`] with one [`DayReport`] per available day. Nothing is
    /// raised: a day that cannot be fetched or parsed is recorded as failed,
    /// and a listing or filesystem failure is recorded in
    /// [`ExportReport::aborted`].
    #[instrument(level = "info", skip_all, fields(cafeteria = %cafeteria.id, output_dir = %output_dir.display()))]
    pub async fn export(&self, cafeteria: &Cafeteria, output_dir: &Path) -> ExportReport {
        let mut report = ExportReport::new(&cafeteria.id, output_dir);
        if let Err(e) = self.export_days(cafeteria, output_dir, &mut report).await {
            error!(error = %e, "Export aborted");
            report.aborted = Some(e);
        }
        info!(
            written = report.written(),
            no_data = report.no_data(),
            failed = report.failed(),
            cancelled = report.cancelled(),
            "Export finished"
        );
        report
    }

    /// Fetch and parse one day without writing anything.
    #[instrument(level = "info", skip(self))]
    pub async fn menu_for_day(&self, cafeteria_id: &str, date: NaiveDate) -> Result<DailyMenu, ExportError> {
        let cafeteria = self.fetcher.registry().get(cafeteria_id)?;
        self.fetch_menu(cafeteria, date).await
    }

    async fn export_days(
        &self,
        cafeteria: &Cafeteria,
        output_dir: &Path,
        report: &mut ExportReport,
    ) -> Result<(), ExportError> {
        ensure_writable_dir(output_dir)
            .await
            .map_err(|e| ExportError::output_unavailable(output_dir, e))?;

        let days = self.fetcher.fetch_available_days(&cafeteria.id).await?;
        let control = self.fetcher.control();

        for date in days {
            if control.is_stopped() {
                report.days.push(DayReport {
                    date,
                    outcome: DayOutcome::Cancelled,
                });
                continue;
            }

            let outcome = match self.export_day(cafeteria, date, output_dir).await {
                Ok(path) => {
                    info!(%date, path = %path.display(), "Exported day");
                    DayOutcome::Written { path }
                }
                Err(ExportError::Fetch(FetchError::NoDataForDate { .. })) => {
                    debug!(%date, "No data");
                    DayOutcome::NoData
                }
                Err(ExportError::Fetch(FetchError::Cancelled(_))) => DayOutcome::Cancelled,
                Err(e @ ExportError::OutputUnavailable { .. }) => return Err(e),
                Err(cause) => {
                    warn!(%date, error = %cause, "Skipping day");
                    DayOutcome::Failed { cause }
                }
            };
            report.days.push(DayReport { date, outcome });
        }
        Ok(())
    }

    async fn export_day(&self, cafeteria: &Cafeteria, date: NaiveDate, output_dir: &Path) -> Result<PathBuf, ExportError> {
        let menu = self.fetch_menu(cafeteria, date).await?;
        if menu.is_closed() {
            info!(%date, "Closed; exporting an empty menu");
        }
        write_daily_menu(&menu, output_dir)
            .await
            .map_err(|e| ExportError::output_unavailable(output_dir, e))
    }

    async fn fetch_menu(&self, cafeteria: &Cafeteria, date: NaiveDate) -> Result<DailyMenu, ExportError> {
        let raw = self.fetcher.fetch(&cafeteria.id, date).await?;
        let menu = parse::parse(cafeteria.provider.kind(), &raw)?;
        if menu.date != date {
            return Err(ParseError::malformed(
                &cafeteria.id,
                date,
                format!("payload describes {} instead", menu.date),
            )
            .into());
        }
        debug!(%date, meals = menu.meals.len(), fetched_at = %menu.fetched_at, "Parsed menu");
        Ok(menu)
    }
}
