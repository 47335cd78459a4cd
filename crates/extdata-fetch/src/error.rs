//! Error types for extdata-fetch.

use std::io;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    #[error("{url}: file not found")]
    NotFound { url: String },

    #[error("no backend servers are up ({candidates} candidates)")]
    NoServersUp { candidates: usize },

    #[error("checking staged copy on {server}: {source}")]
    StagedCheck {
        server: String,
        #[source]
        source: Box<Error>,
    },

    #[error("staging {url} on {server} failed after {attempts} attempts: {source}")]
    StagingFailed {
        server:   String,
        url:      String,
        attempts: u32,
        #[source]
        source:   Box<Error>,
    },

    #[error("HTTP {status} from {url}: {message}")]
    Http {
        status:  u16,
        url:     String,
        message: String,
    },

    #[error("network error: {0}")]
    Network(String),

    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        operation: String,
        timeout:   Duration,
    },

    #[error(transparent)]
    Io(#[from] io::Error),
}

#[cfg(feature = "reqwest")]
impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self { Error::Network(e.to_string()) }
}

pub type Result<T> = std::result::Result<T, Error>;
