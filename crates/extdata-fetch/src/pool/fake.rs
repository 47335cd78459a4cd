use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use bytes::Bytes;

use super::transport::Transport;
use crate::client::ByteStream;
use crate::error::{Error, Result};
use crate::object::ObjectUrl;

/// A request observed by [`FakeTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    CheckHealth { server: String },
    IsStaged { server: String, url: String },
    Stage { server: String, url: String },
    OpenStatic { server: String, url: String },
}

#[derive(Debug, Default)]
struct State {
    down:           HashSet<String>,
    broken_lookup:  HashSet<String>,
    stage_failures: HashMap<String, u32>,
    staged:         HashSet<(String, String)>,
    objects:        HashMap<String, Bytes>,
    calls:          Vec<Call>,
}

/// In-memory stand-in for a set of backend servers.
///
/// Objects live in one shared cold store; a server can only serve an object
/// after it has been staged there. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct FakeTransport {
    state: Arc<Mutex<State>>,
}

impl FakeTransport {
    pub fn new() -> Self { Self::default() }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn with_object(self, url: impl Into<String>, data: impl Into<Bytes>) -> Self {
        self.lock().objects.insert(url.into(), data.into());
        self
    }

    /// Health checks against `server` fail.
    pub fn with_down(self, server: impl Into<String>) -> Self {
        self.lock().down.insert(server.into());
        self
    }

    pub fn with_staged(self, server: impl Into<String>, url: impl Into<String>) -> Self {
        self.lock().staged.insert((server.into(), url.into()));
        self
    }

    /// Staged-copy checks on `server` return an error instead of an answer.
    pub fn with_broken_lookup(self, server: impl Into<String>) -> Self {
        self.lock().broken_lookup.insert(server.into());
        self
    }

    /// The next `times` stage requests to `server` fail.
    pub fn with_stage_failures(self, server: impl Into<String>, times: u32) -> Self {
        self.lock().stage_failures.insert(server.into(), times);
        self
    }

    pub fn calls(&self) -> Vec<Call> { self.lock().calls.clone() }

    /// Servers that received a stage request, in order.
    pub fn staged_on(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Stage { server, .. } => Some(server),
                _ => None,
            })
            .collect()
    }

    /// Servers that streamed an object, in order.
    pub fn served_by(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::OpenStatic { server, .. } => Some(server),
                _ => None,
            })
            .collect()
    }
}

impl Transport for FakeTransport {
    async fn check_health(&self, server: &str) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(Call::CheckHealth {
            server: server.to_string(),
        });
        if state.down.contains(server) {
            return Err(Error::Network(format!("{server}: connection refused")));
        }
        Ok(())
    }

    async fn is_staged(&self, server: &str, object: &ObjectUrl) -> Result<bool> {
        let url = object.to_string();
        let mut state = self.lock();
        state.calls.push(Call::IsStaged {
            server: server.to_string(),
            url:    url.clone(),
        });
        if state.broken_lookup.contains(server) {
            return Err(Error::Http {
                status:  500,
                url:     format!("{server}/static/{}", object.path()),
                message: "internal error".to_string(),
            });
        }
        Ok(state.staged.contains(&(server.to_string(), url)))
    }

    async fn stage(&self, server: &str, object: &ObjectUrl) -> Result<()> {
        let url = object.to_string();
        let mut state = self.lock();
        state.calls.push(Call::Stage {
            server: server.to_string(),
            url:    url.clone(),
        });
        if let Some(remaining) = state.stage_failures.get_mut(server)
            && *remaining > 0
        {
            *remaining -= 1;
            return Err(Error::Http {
                status:  500,
                url:     format!("{server}/stage"),
                message: "staging temporarily unavailable".to_string(),
            });
        }
        if !state.objects.contains_key(&url) {
            return Err(Error::Http {
                status:  500,
                url:     format!("{server}/stage"),
                message: format!("{url}: file not found"),
            });
        }
        state.staged.insert((server.to_string(), url));
        Ok(())
    }

    async fn open_static(&self, server: &str, object: &ObjectUrl) -> Result<ByteStream> {
        let url = object.to_string();
        let mut state = self.lock();
        state.calls.push(Call::OpenStatic {
            server: server.to_string(),
            url:    url.clone(),
        });
        let data = state
            .staged
            .contains(&(server.to_string(), url.clone()))
            .then(|| state.objects.get(&url).cloned())
            .flatten()
            .ok_or_else(|| Error::Http {
                status:  404,
                url:     format!("{server}/static/{}", object.path()),
                message: "unknown error".to_string(),
            })?;
        Ok(Box::pin(futures_util::stream::iter([Ok(data)])))
    }
}
