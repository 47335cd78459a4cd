//! Backend clients for external data.
//!
//! Every backend implements [`Client`]: open an object URL, get a byte stream.
//!
//! - [`FakeClient`] - in-memory objects for deterministic tests
//! - [`StorageClient`] - direct downloads from a public object-storage endpoint
//! - [`PoolClient`] - a pool of redundant servers with health checks, stable
//!   per-object routing, staging and retry
//!
//! Cancellation is by drop: wrap any call in `tokio::time::timeout` to bound
//! it. The pool additionally bounds its own health checks and staged-copy
//! lookups, see [`PoolOptions`].

mod client;
mod error;
mod fake;
mod object;
pub mod pool;
#[cfg(feature = "reqwest")]
mod storage;

pub use client::{BoxStream, ByteStream, Client, fetch_to};
pub use error::{Error, Result};
pub use fake::FakeClient;
pub use object::ObjectUrl;
pub use pool::{FakeTransport, PoolClient, PoolOptions, ServerStatus, Transport};

#[cfg(feature = "reqwest")]
pub use pool::HttpTransport;
#[cfg(feature = "reqwest")]
pub use storage::{DEFAULT_STORAGE_ENDPOINT, StorageClient};
