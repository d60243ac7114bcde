// src/error.rs
//! Error taxonomy for the ingestion side.
//!
//! `Fetch` and `Parse` are recoverable: they are logged at the fetcher or
//! orchestrator boundary and the source simply yields no items. `Persistence`
//! is fatal for a run.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IngestError {
    /// Network failure, timeout or HTTP error status.
    #[error("fetch failed for {url}: {reason}")]
    Fetch { url: String, reason: String },

    /// Malformed feed/HTML or a missing structural marker.
    #[error("could not parse {what}: {reason}")]
    Parse { what: String, reason: String },

    /// The catalog could not be read or written.
    #[error("catalog persistence failed: {0}")]
    Persistence(#[from] PersistenceError),
}

#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

impl IngestError {
    pub fn fetch(url: impl Into<String>, reason: impl ToString) -> Self {
        Self::Fetch {
            url: url.into(),
            reason: reason.to_string(),
        }
    }

    pub fn parse(what: impl Into<String>, reason: impl ToString) -> Self {
        Self::Parse {
            what: what.into(),
            reason: reason.to_string(),
        }
    }

    /// True for errors a source can recover from by yielding nothing.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Persistence(_))
    }
}

impl From<std::io::Error> for IngestError {
    fn from(e: std::io::Error) -> Self {
        Self::Persistence(PersistenceError::Io(e))
    }
}

impl From<csv::Error> for IngestError {
    fn from(e: csv::Error) -> Self {
        Self::Persistence(PersistenceError::Csv(e))
    }
}
