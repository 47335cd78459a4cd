//! Error types for extdata.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

use crate::link::LinkKind;

/// Problems with a single link sidecar. Fatal to that artifact only.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("failed to read {path}: {source}")]
    Read {
        path:   PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed link: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid {kind} link: {reason}")]
    Invalid { kind: LinkKind, reason: String },

    /// No build artifacts location is known, as is usual for developer
    /// builds. Callers may choose to skip such artifacts instead of failing.
    #[error("build artifact {name} requested, but the build artifacts URL is unknown")]
    NoArtifactsUrl { name: String },
}

/// Structural failures that abort a whole manager operation.
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("failed to scan {path}: {source}")]
    Walk {
        path:   PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Why one download job did not produce its destinations.
#[derive(Debug, Error)]
pub enum DownloadError {
    #[error(transparent)]
    Fetch(#[from] extdata_fetch::Error),

    #[error("downloaded data failed verification: {0}")]
    Verify(#[from] extdata_verify::VerifyError),

    #[error(transparent)]
    Fs(#[from] extdata_fs::Error),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("verification task failed: {0}")]
    Join(#[from] tokio::task::JoinError),

    #[error("download task panicked: {0}")]
    Panicked(String),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error(transparent)]
    Figment(#[from] Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(e: figment::Error) -> Self { Self::Figment(Box::new(e)) }
}
