use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use bytes::Bytes;

use crate::client::{ByteStream, Client};
use crate::error::{Error, Result};

/// In-memory backend keyed by URL.
///
/// Objects are served as a few chunks so consumers exercise their streaming
/// path. Every call to [`open`](Client::open) is recorded.
#[derive(Debug, Clone, Default)]
pub struct FakeClient {
    objects: Arc<HashMap<String, Bytes>>,
    opened:  Arc<Mutex<Vec<String>>>,
}

impl FakeClient {
    pub fn new<I, K, V>(objects: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Bytes>,
    {
        Self {
            objects: Arc::new(
                objects
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
            opened:  Arc::default(),
        }
    }

    /// URLs passed to `open`, in call order.
    pub fn opened(&self) -> Vec<String> {
        self.opened
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

impl Client for FakeClient {
    async fn open(&self, url: &str) -> Result<ByteStream> {
        self.opened
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(url.to_string());

        let data = self.objects.get(url).cloned().ok_or_else(|| Error::NotFound {
            url: url.to_string(),
        })?;
        let chunk = data.len().div_ceil(3).max(1);
        let chunks: Vec<Result<Bytes>> = (0..data.len())
            .step_by(chunk)
            .map(|start| Ok(data.slice(start..(start + chunk).min(data.len()))))
            .collect();
        Ok(Box::pin(futures_util::stream::iter(chunks)))
    }
}
