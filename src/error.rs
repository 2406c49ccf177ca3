//! Error taxonomy for the export pipeline.
//!
//! Every failure the pipeline can hit is one of a small set of typed errors.
//! Only [`ConfigError`] and an unwritable base directory are meant to end the
//! process; everything else is captured per day or per cafeteria inside an
//! [`ExportReport`](crate::export::ExportReport).
//!
//! | Error | Meaning | Effect |
//! |-------|---------|--------|
//! | [`FetchError::UnknownSource`] | id not in the registry | fatal to that invocation |
//! | [`FetchError::NoDataForDate`] | provider has nothing for the date | day skipped, no file |
//! | [`FetchError::FetchFailed`] | transport failure after retries | day skipped, reported |
//! | [`ParseError::MalformedPayload`] | provider format drift | day skipped, reported |
//! | [`ExportError::OutputUnavailable`] | filesystem problem | cafeteria aborted |

use chrono::NaiveDate;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Failure of a single request against an upstream endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("HTTP status {0}")]
    Status(u16),
    #[error("network error: {0}")]
    Network(String),
    #[error("undecodable response: {0}")]
    Decode(String),
    #[error("run stopped before the request was sent")]
    Cancelled,
}

impl TransportError {
    /// Whether retrying the same request could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            TransportError::Status(code) => *code == 408 || *code == 429 || *code >= 500,
            TransportError::Network(_) => true,
            TransportError::Decode(_) | TransportError::Cancelled => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, TransportError::Status(404))
    }
}

#[derive(Debug, Clone, Error)]
pub enum FetchError {
    #[error("unknown cafeteria `{0}`")]
    UnknownSource(String),
    #[error("no data for `{cafeteria}` on {date}")]
    NoDataForDate { cafeteria: String, date: NaiveDate },
    #[error("fetching `{cafeteria}`{} failed: {cause}", .date.map(|d| format!(" for {d}")).unwrap_or_default())]
    FetchFailed {
        cafeteria: String,
        date: Option<NaiveDate>,
        cause: TransportError,
    },
    #[error("run stopped before `{0}` could be fetched")]
    Cancelled(String),
}

#[derive(Debug, Clone, Error)]
pub enum ParseError {
    #[error("malformed payload from `{cafeteria}` for {date}: {reason}")]
    MalformedPayload {
        cafeteria: String,
        date: NaiveDate,
        reason: String,
    },
}

impl ParseError {
    pub fn malformed(cafeteria: &str, date: NaiveDate, reason: impl Into<String>) -> Self {
        ParseError::MalformedPayload {
            cafeteria: cafeteria.to_string(),
            date,
            reason: reason.into(),
        }
    }
}

/// Errors raised while exporting one cafeteria.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("output directory {} unavailable: {source}", .path.display())]
    OutputUnavailable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl ExportError {
    pub fn output_unavailable(path: impl Into<PathBuf>, source: io::Error) -> Self {
        ExportError::OutputUnavailable {
            path: path.into(),
            source,
        }
    }
}

/// Problems with the cafeteria registry or the requested selection.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read registry {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid registry: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("registry contains no cafeterias")]
    Empty,
    #[error("cafeteria id must not be empty")]
    EmptyId,
    #[error("cafeteria `{0}` is defined more than once")]
    DuplicateId(String),
    #[error("cafeterias `{first}` and `{second}` would share the output directory `{dir}`")]
    OutputCollision {
        first: String,
        second: String,
        dir: String,
    },
    #[error(transparent)]
    UnknownSource(#[from] FetchError),
}
