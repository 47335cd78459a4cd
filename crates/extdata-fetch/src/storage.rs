use futures_util::TryStreamExt;

use crate::client::{ByteStream, Client};
use crate::error::{Error, Result};
use crate::object::ObjectUrl;

pub const DEFAULT_STORAGE_ENDPOINT: &str = "https://storage.googleapis.com";

/// Downloads objects straight from a public object-storage HTTP endpoint.
///
/// `gs://bucket/path` becomes `GET <endpoint>/bucket/path`.
#[derive(Debug, Clone)]
pub struct StorageClient {
    client:   reqwest::Client,
    endpoint: String,
}

impl StorageClient {
    pub fn new() -> Result<Self> { Self::with_endpoint(DEFAULT_STORAGE_ENDPOINT) }

    pub fn with_endpoint(endpoint: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder().build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn http_url(&self, url: &str) -> Result<String> {
        let object = ObjectUrl::parse(url)?;
        Ok(format!("{}/{}/{}", self.endpoint, object.bucket(), object.path()))
    }
}

impl Client for StorageClient {
    async fn open(&self, url: &str) -> Result<ByteStream> {
        let http_url = self.http_url(url)?;
        let response = self.client.get(&http_url).send().await?;
        match response.status() {
            reqwest::StatusCode::OK => Ok(Box::pin(response.bytes_stream().map_err(Error::from))),
            reqwest::StatusCode::NOT_FOUND => Err(Error::NotFound {
                url: url.to_string(),
            }),
            status => Err(Error::Http {
                status:  status.as_u16(),
                url:     http_url,
                message: status.canonical_reason().unwrap_or("unknown error").to_string(),
            }),
        }
    }
}
