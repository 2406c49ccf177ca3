//! Fetching raw menu payloads from upstream providers.
//!
//! The [`Fetcher`] resolves a cafeteria id through the [`Registry`], builds
//! the provider's URLs and hands them to a retrying [`Transport`]. It knows
//! two things per provider: which dates are available, and which document
//! holds a given date.
//!
//! # Providers
//!
//! - **Studierendenwerk Aachen** publishes a page for the current and one for
//!   the next week, each covering Monday to Friday. Both pages are fetched at
//!   most once per run; every date of a week is served from the same body.
//! - **OpenMensa** lists open days under `canteens/<id>/days` and serves one
//!   document per day under `canteens/<id>/days/<date>/meals`.
//!
//! HTTP 404 always means "nothing published", reported as
//! [`FetchError::NoDataForDate`] rather than as a transport failure.

use crate::config::{Cafeteria, Provider, Registry};
use crate::error::{FetchError, TransportError};
use crate::models::RawPayload;
use crate::parse::stw_aachen::OPEN_DAYS;
use crate::transport::{RetryTransport, RunControl, Transport};
use chrono::{Datelike, Days, Local, NaiveDate};
use itertools::Itertools;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument};
use url::Url;

const STW_MENU_PATH: &str = "files/content/Downloads/Gastronomie/Speiseplaene/";

/// Which of the two published week pages a date lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Week {
    This,
    Next,
}

impl Week {
    fn path_word(self) -> &'static str {
        match self {
            Week::This => "diese",
            Week::Next => "naechste",
        }
    }

    fn offset_days(self) -> u64 {
        match self {
            Week::This => 0,
            Week::Next => 7,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenMensaDay {
    date: NaiveDate,
    #[serde(default)]
    closed: bool,
}

pub struct Fetcher<T> {
    transport: RetryTransport<T>,
    registry: Arc<Registry>,
    today: NaiveDate,
    week_pages: Mutex<HashMap<Url, Arc<str>>>,
}

impl<T: Transport> Fetcher<T> {
    pub fn new(transport: RetryTransport<T>, registry: Arc<Registry>) -> Self {
        Self::with_today(transport, registry, Local::now().date_naive())
    }

    /// Fetcher whose notion of "today" is fixed, which decides the
    /// publication window of week-based providers.
    pub fn with_today(transport: RetryTransport<T>, registry: Arc<Registry>, today: NaiveDate) -> Self {
        Self {
            transport,
            registry,
            today,
            week_pages: Mutex::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn control(&self) -> &RunControl {
        self.transport.control()
    }

    /// Dates the provider currently publishes for `cafeteria_id`, ascending.
    #[instrument(level = "info", skip(self))]
    pub async fn fetch_available_days(&self, cafeteria_id: &str) -> Result<Vec<NaiveDate>, FetchError> {
        let cafeteria = self.registry.get(cafeteria_id)?;
        let days = match &cafeteria.provider {
            Provider::StwAachen { base_url, page } => {
                let mut days = Vec::new();
                for week in [Week::This, Week::Next] {
                    let url = stw_week_url(base_url, page, week, cafeteria)?;
                    match self.week_page(&url).await {
                        Ok(_) => days.extend(self.week_dates(week)),
                        Err(e) if e.is_not_found() => {
                            debug!(%url, ?week, "Week page not published");
                        }
                        Err(e) => return Err(fetch_failed(cafeteria, None, e)),
                    }
                }
                days
            }
            Provider::OpenMensa { base_url, canteen_id } => {
                let url = join(base_url, &format!("canteens/{canteen_id}/days"), cafeteria)?;
                let body = self
                    .transport
                    .get(&url)
                    .await
                    .map_err(|e| fetch_failed(cafeteria, None, e))?;
                let listed: Vec<OpenMensaDay> = serde_json::from_str(&body).map_err(|e| {
                    fetch_failed(cafeteria, None, TransportError::Decode(e.to_string()))
                })?;
                let closed = listed.iter().filter(|d| d.closed).count();
                debug!(listed = listed.len(), closed, "OpenMensa day listing");
                listed.into_iter().map(|d| d.date).collect()
            }
        };

        let days: Vec<NaiveDate> = days.into_iter().sorted().dedup().collect();
        info!(count = days.len(), first = ?days.first(), last = ?days.last(), "Available days");
        Ok(days)
    }

    /// Raw payload holding `cafeteria_id`'s menu for `date`.
    #[instrument(level = "debug", skip(self))]
    pub async fn fetch(&self, cafeteria_id: &str, date: NaiveDate) -> Result<RawPayload, FetchError> {
        let cafeteria = self.registry.get(cafeteria_id)?;
        let no_data = || FetchError::NoDataForDate {
            cafeteria: cafeteria.id.clone(),
            date,
        };

        let result = match &cafeteria.provider {
            Provider::StwAachen { base_url, page } => {
                let week = self.week_of(date).ok_or_else(no_data)?;
                let url = stw_week_url(base_url, page, week, cafeteria)?;
                self.week_page(&url).await
            }
            Provider::OpenMensa { base_url, canteen_id } => {
                let path = format!("canteens/{canteen_id}/days/{}/meals", date.format("%Y-%m-%d"));
                let url = join(base_url, &path, cafeteria)?;
                self.transport.get(&url).await.map(Arc::from)
            }
        };

        match result {
            Ok(body) => Ok(RawPayload {
                cafeteria: cafeteria.id.clone(),
                date,
                body,
            }),
            Err(e) if e.is_not_found() => Err(no_data()),
            Err(e) => Err(fetch_failed(cafeteria, Some(date), e)),
        }
    }

    /// Monday of the current week.
    fn this_monday(&self) -> NaiveDate {
        let since_monday = self.today.weekday().num_days_from_monday() as u64;
        self.today - Days::new(since_monday)
    }

    fn week_dates(&self, week: Week) -> impl Iterator<Item = NaiveDate> {
        let monday = self.this_monday() + Days::new(week.offset_days());
        (0..OPEN_DAYS as u64).map(move |d| monday + Days::new(d))
    }

    /// The week page covering `date`, if `date` is a weekday in the window.
    fn week_of(&self, date: NaiveDate) -> Option<Week> {
        let offset = (date - self.this_monday()).num_days();
        let open = OPEN_DAYS as i64;
        match offset {
            o if (0..open).contains(&o) => Some(Week::This),
            o if (7..7 + open).contains(&o) => Some(Week::Next),
            _ => None,
        }
    }

    /// Week pages are downloaded once per run and shared between dates.
    ///
    /// The lock is not held during the download so other cafeterias are not
    /// blocked; each page belongs to one cafeteria, whose days are fetched
    /// one after another.
    async fn week_page(&self, url: &Url) -> Result<Arc<str>, TransportError> {
        if let Some(body) = self.week_pages.lock().await.get(url) {
            debug!(%url, "Week page from memo");
            return Ok(Arc::clone(body));
        }
        let body: Arc<str> = Arc::from(self.transport.get(url).await?);
        self.week_pages
            .lock()
            .await
            .insert(url.clone(), Arc::clone(&body));
        Ok(body)
    }
}

fn fetch_failed(cafeteria: &Cafeteria, date: Option<NaiveDate>, cause: TransportError) -> FetchError {
    match cause {
        TransportError::Cancelled => FetchError::Cancelled(cafeteria.id.clone()),
        cause => FetchError::FetchFailed {
            cafeteria: cafeteria.id.clone(),
            date,
            cause,
        },
    }
}

fn join(base_url: &Url, path: &str, cafeteria: &Cafeteria) -> Result<Url, FetchError> {
    base_url
        .join(path)
        .map_err(|e| fetch_failed(cafeteria, None, TransportError::Network(format!("bad endpoint: {e}"))))
}

fn stw_week_url(base_url: &Url, page: &str, week: Week, cafeteria: &Cafeteria) -> Result<Url, FetchError> {
    let path = format!(
        "{STW_MENU_PATH}speiseplan_mensa_{page}_{}_woche.html",
        week.path_word()
    );
    join(base_url, &path, cafeteria)
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::transport::RetryPolicy;

    pub const STW_BASE: &str = "https://stw.example/";
    pub const OPEN_MENSA_BASE: &str = "https://openmensa.example/api/v2/";

    pub fn stw_url(page: &str, week: &str) -> String {
        format!("{STW_BASE}{STW_MENU_PATH}speiseplan_mensa_{page}_{week}_woche.html")
    }

    pub fn registry(yaml_entries: &str) -> Arc<Registry> {
        Arc::new(Registry::from_yaml_str(&format!("cafeterias:\n{yaml_entries}")).unwrap())
    }

    pub fn stw_entry(id: &str, page: &str) -> String {
        format!(
            "  - id: {id}\n    name: {id}\n    provider:\n      kind: stw-aachen\n      base_url: {STW_BASE}\n      page: {page}\n"
        )
    }

    pub fn open_mensa_entry(id: &str, canteen_id: u32) -> String {
        format!(
            "  - id: {id}\n    name: {id}\n    provider:\n      kind: open-mensa\n      base_url: {OPEN_MENSA_BASE}\n      canteen_id: {canteen_id}\n"
        )
    }

    pub fn fetcher<T: Transport>(
        inner: T,
        registry: Arc<Registry>,
        control: RunControl,
        today: NaiveDate,
    ) -> Fetcher<T> {
        let transport = RetryTransport::new(inner, RetryPolicy::immediate(3), control);
        Fetcher::with_today(transport, registry, today)
    }
}
