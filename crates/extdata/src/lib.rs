//! External data cache for test bundles.
//!
//! Large test inputs are not checked in. Instead, each data file `foo` may
//! be accompanied by a `foo.external` link sidecar that says where the real
//! bytes live and how to check them. This crate:
//!
//! - parses and resolves link sidecars ([`link`])
//! - checks local copies against them ([`verify()`])
//! - works out which files a batch of entities needs fetched, and keeps
//!   reference counts so unused files can be purged ([`Manager`])
//! - fetches the jobs in parallel, verifies them and links them into place
//!   ([`run_downloads`])
//!
//! Problems with individual files never fail a batch. They leave a
//! `foo.external-error` sidecar, which [`Manager::failures`] reports.
//!
//! ```no_run
//! use std::sync::Arc;
//! use extdata::{DataEntity, DownloadOptions, Manager, run_downloads};
//! use extdata_fetch::StorageClient;
//!
//! # async fn demo() -> anyhow::Result<()> {
//! let manager = Manager::new("/srv/data", "")?;
//! let entities: Vec<DataEntity> = vec!["net:capture.pcap".parse().map_err(anyhow::Error::msg)?];
//! let (jobs, release) = manager.prepare_downloads(&entities);
//! let client = Arc::new(StorageClient::new()?);
//! let report = run_downloads(manager.data_root(), jobs, client, &DownloadOptions::new()).await;
//! // ... use the files ...
//! release.release();
//! # let _ = report;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod download;
pub mod entity;
pub mod error;
pub mod link;
pub mod manager;
pub mod verify;

pub use config::Config;
pub use download::{DownloadOptions, DownloadReport, run_downloads};
pub use entity::{DataEntity, Entity};
pub use error::{ConfigError, DownloadError, LinkError, ManagerError};
pub use link::{LinkData, LinkKind, ResolvedLink};
pub use manager::{DownloadJob, Manager, Release};
pub use verify::verify;
