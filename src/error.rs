// src/error.rs
//! Failure taxonomy of the pipeline. Every variant is caught at the nearest
//! boundary; none of them terminates the process.

use std::path::PathBuf;

/// Adapter-local failure. Excludes that source from the current cycle only.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("http request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },
    #[error("no fixture body registered for {0}")]
    MissingFixture(String),
    #[error("parsing {what}: {reason}")]
    Parse { what: String, reason: String },
    #[error("reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("all {failed} targets of {adapter} failed")]
    AllTargetsFailed { adapter: &'static str, failed: usize },
}

impl FetchError {
    pub fn parse(what: impl Into<String>, reason: impl ToString) -> Self {
        Self::Parse {
            what: what.into(),
            reason: reason.to_string(),
        }
    }
}

/// The dedup store could not be persisted. Fatal to the current cycle.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("dedup store at {path} unavailable: {source}")]
    Unavailable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("encoding dedup store: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Per-posting delivery failure. The posting is skipped, the batch goes on.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("{sink} request failed: {reason}")]
    Transport { sink: &'static str, reason: String },
    #[error("{sink} rejected the message with status {status}")]
    Rejected { sink: &'static str, status: u16 },
}

/// Cycle-level failure. Anything below the aggregation run is absorbed before this.
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("cycle aborted after claiming {claimed} postings: {source}")]
    Store {
        claimed: usize,
        #[source]
        source: StoreError,
    },
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum SchedulerError {
    #[error("unknown timer `{0}`")]
    UnknownTimer(String),
    #[error("invalid cron expression `{expr}` for {timer}: {reason}")]
    InvalidCron {
        timer: String,
        expr: String,
        reason: String,
    },
}
