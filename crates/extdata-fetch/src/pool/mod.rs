//! A staging-aware client over a pool of redundant backend servers.
//!
//! Construction health-checks every candidate in parallel. Each fetch then:
//!
//! 1. fails fast if no server is up,
//! 2. asks every up server whether the object is already staged, and streams
//!    from a random one of those that say yes,
//! 3. otherwise picks one server with [`select::select_server`], asks it to
//!    stage the object (retrying a bounded number of times), and streams from it.

mod fake;
mod options;
pub mod scrape;
pub mod select;
mod transport;

use futures_util::future::join_all;
use rand::seq::SliceRandom;
use tracing::{debug, info, warn};

use crate::client::{ByteStream, Client};
use crate::error::{Error, Result};
use crate::object::ObjectUrl;

pub use fake::{Call, FakeTransport};
pub use options::PoolOptions;
#[cfg(feature = "reqwest")]
pub use transport::HttpTransport;
pub use transport::Transport;

/// Health of one candidate server, as observed at construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerStatus {
    pub url:   String,
    /// Why the health check failed; `None` means the server is up.
    pub error: Option<String>,
}

impl ServerStatus {
    pub fn is_up(&self) -> bool { self.error.is_none() }
}

pub struct PoolClient<T> {
    transport: T,
    servers:   Vec<ServerStatus>,
    options:   PoolOptions,
}

#[cfg(feature = "reqwest")]
impl PoolClient<HttpTransport> {
    /// Builds a pool that talks HTTP to `servers`.
    pub async fn connect<I, S>(servers: I, options: PoolOptions) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Ok(Self::new(servers, HttpTransport::new()?, options).await)
    }
}

impl<T: Transport> PoolClient<T> {
    /// Health-checks every candidate concurrently.
    ///
    /// Servers that fail are kept, marked down, so [`status`](Self::status)
    /// can report on the whole pool.
    pub async fn new<I, S>(servers: I, transport: T, options: PoolOptions) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let urls: Vec<String> = servers
            .into_iter()
            .map(|s| s.into().trim_end_matches('/').to_string())
            .collect();

        let checks = urls.iter().map(|url| {
            let transport = &transport;
            async move {
                match tokio::time::timeout(options.health_timeout, transport.check_health(url))
                    .await
                {
                    Ok(Ok(())) => None,
                    Ok(Err(e)) => Some(e.to_string()),
                    Err(_) => Some(
                        Error::Timeout {
                            operation: format!("health check of {url}"),
                            timeout:   options.health_timeout,
                        }
                        .to_string(),
                    ),
                }
            }
        });
        let errors = join_all(checks).await;

        let servers: Vec<ServerStatus> = urls
            .into_iter()
            .zip(errors)
            .map(|(url, error)| ServerStatus { url, error })
            .collect();
        for server in &servers {
            match &server.error {
                None => info!(server = %server.url, "backend server is up"),
                Some(e) => warn!(server = %server.url, error = %e, "backend server is down"),
            }
        }

        Self {
            transport,
            servers,
            options,
        }
    }

    pub fn servers(&self) -> &[ServerStatus] { &self.servers }

    pub fn up_servers(&self) -> Vec<&str> {
        self.servers
            .iter()
            .filter(|s| s.is_up())
            .map(|s| s.url.as_str())
            .collect()
    }

    pub fn options(&self) -> &PoolOptions { &self.options }

    /// Human-readable summary of every candidate and its state.
    pub fn status(&self) -> String {
        let up = self.servers.iter().filter(|s| s.is_up()).count();
        let mut out = format!("{up} of {} backend servers up", self.servers.len());
        for server in &self.servers {
            let line = match &server.error {
                None => format!("\n  {}: UP", server.url),
                Some(e) => format!("\n  {}: DOWN ({e})", server.url),
            };
            out.push_str(&line);
        }
        out
    }

    /// Finds an up server that already has `object` staged.
    ///
    /// All up servers are asked at once. The first error among the answers
    /// aborts the lookup even if another server said yes; a server that does
    /// not answer within the lookup timeout just counts as "not staged".
    async fn find_staged<'a>(
        &self,
        up: &[&'a str],
        object: &ObjectUrl,
    ) -> Result<Option<&'a str>> {
        let timeout = self.options.staged_lookup_timeout;
        let checks = up.iter().map(|&server| async move {
            let answer = tokio::time::timeout(timeout, self.transport.is_staged(server, object))
                .await
                .unwrap_or_else(|_| {
                    debug!(%server, %object, "staged check timed out");
                    Ok(false)
                });
            (server, answer)
        });

        let mut staged = Vec::new();
        for (server, answer) in join_all(checks).await {
            match answer {
                Ok(true) => staged.push(server),
                Ok(false) => {}
                Err(e) => {
                    return Err(Error::StagedCheck {
                        server: server.to_string(),
                        source: Box::new(e),
                    });
                }
            }
        }
        Ok(staged.choose(&mut rand::thread_rng()).copied())
    }

    async fn stage_with_retry(&self, server: &str, object: &ObjectUrl) -> Result<()> {
        let attempts = self.options.stage_attempts.max(1);
        let mut attempt = 1;
        loop {
            match self.transport.stage(server, object).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt >= attempts => {
                    return Err(Error::StagingFailed {
                        server: server.to_string(),
                        url: object.to_string(),
                        attempts,
                        source: Box::new(e),
                    });
                }
                Err(e) => {
                    warn!(%server, %object, attempt, error = %e, "staging failed; retrying");
                    tokio::time::sleep(self.options.stage_retry_delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

impl<T: Transport> Client for PoolClient<T> {
    async fn open(&self, url: &str) -> Result<ByteStream> {
        let object = ObjectUrl::parse(url)?;
        let up = self.up_servers();
        if up.is_empty() {
            return Err(Error::NoServersUp {
                candidates: self.servers.len(),
            });
        }

        if let Some(server) = self.find_staged(&up, &object).await? {
            debug!(%server, %object, "using server with staged copy");
            return self.transport.open_static(server, &object).await;
        }

        let server = select::select_server(&up, url).ok_or(Error::NoServersUp {
            candidates: self.servers.len(),
        })?;
        debug!(%server, %object, "staging on selected server");
        self.stage_with_retry(server, &object).await?;
        self.transport.open_static(server, &object).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_status_reports_every_server() {
        let transport = FakeTransport::new().with_down("http://b");
        let pool = PoolClient::new(["http://a/", "http://b"], transport, PoolOptions::new()).await;

        assert_eq!(pool.up_servers(), vec!["http://a"]);
        let status = pool.status();
        assert!(status.starts_with("1 of 2 backend servers up"));
        assert!(status.contains("http://a: UP"));
        assert!(status.contains("http://b: DOWN (network error: http://b: connection refused)"));
    }

    #[tokio::test]
    async fn test_no_servers_up() {
        let transport = FakeTransport::new().with_down("http://a");
        let pool = PoolClient::new(["http://a"], transport.clone(), PoolOptions::new()).await;

        let err = pool.open("gs://b/f").await.err().unwrap();
        assert!(matches!(err, Error::NoServersUp { candidates: 1 }));
        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_object_url() {
        let pool = PoolClient::new(["http://a"], FakeTransport::new(), PoolOptions::new()).await;
        assert!(matches!(pool.open("https://x/y").await, Err(Error::InvalidUrl(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stage_retries_then_succeeds() {
        let transport = FakeTransport::new()
            .with_object("gs://b/f", &b"data"[..])
            .with_stage_failures("http://a", 2);
        let options = PoolOptions::new()
            .stage_attempts(3)
            .stage_retry_delay(Duration::from_secs(2));
        let pool = PoolClient::new(["http://a"], transport.clone(), options).await;

        let mut out = Vec::new();
        crate::fetch_to(&pool, "gs://b/f", &mut out).await.unwrap();
        assert_eq!(out, b"data");
        assert_eq!(transport.staged_on().len(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stage_retries_exhausted() {
        let transport = FakeTransport::new()
            .with_object("gs://b/f", &b"data"[..])
            .with_stage_failures("http://a", 5);
        let options = PoolOptions::new()
            .stage_attempts(2)
            .stage_retry_delay(Duration::from_millis(10));
        let pool = PoolClient::new(["http://a"], transport.clone(), options).await;

        let err = pool.open("gs://b/f").await.err().unwrap();
        assert!(matches!(err, Error::StagingFailed { attempts: 2, .. }));
        assert_eq!(transport.staged_on().len(), 2);
        assert!(transport.served_by().is_empty());
    }
}
