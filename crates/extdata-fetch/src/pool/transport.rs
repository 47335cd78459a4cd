use std::future::Future;

use crate::client::ByteStream;
use crate::error::Result;
use crate::object::ObjectUrl;

/// The backend server protocol, one call per endpoint.
///
/// `server` is a base URL such as `http://host:8082` without a trailing slash.
pub trait Transport: Send + Sync {
    /// `GET /check_health`; success means the server is up.
    fn check_health(&self, server: &str) -> impl Future<Output = Result<()>> + Send;

    /// `HEAD /static/<path>`; `Ok(false)` only for a definite "not staged".
    fn is_staged(
        &self,
        server: &str,
        object: &ObjectUrl,
    ) -> impl Future<Output = Result<bool>> + Send;

    /// `GET /stage?archive_url=...&files=...`
    fn stage(&self, server: &str, object: &ObjectUrl) -> impl Future<Output = Result<()>> + Send;

    /// `GET /static/<path>`, streaming the object body.
    fn open_static(
        &self,
        server: &str,
        object: &ObjectUrl,
    ) -> impl Future<Output = Result<ByteStream>> + Send;
}

#[cfg(feature = "reqwest")]
mod http {
    use futures_util::TryStreamExt;
    use reqwest::{Response, StatusCode};

    use super::*;
    use crate::error::Error;
    use crate::pool::scrape::scrape_error;

    /// [`Transport`] over HTTP using `reqwest`.
    #[derive(Debug, Clone)]
    pub struct HttpTransport {
        client: reqwest::Client,
    }

    impl HttpTransport {
        pub fn new() -> Result<Self> {
            Ok(Self {
                client: reqwest::Client::builder().build()?,
            })
        }

        fn static_url(server: &str, object: &ObjectUrl) -> String {
            format!("{server}/static/{}", object.path())
        }

        async fn expect_ok(response: Response) -> Result<Response> {
            let status = response.status();
            if status == StatusCode::OK {
                return Ok(response);
            }
            let url = response.url().to_string();
            let body = response.text().await.unwrap_or_default();
            Err(Error::Http {
                status: status.as_u16(),
                url,
                message: scrape_error(&body),
            })
        }
    }

    impl Transport for HttpTransport {
        async fn check_health(&self, server: &str) -> Result<()> {
            let response = self
                .client
                .get(format!("{server}/check_health"))
                .send()
                .await?;
            Self::expect_ok(response).await.map(drop)
        }

        async fn is_staged(&self, server: &str, object: &ObjectUrl) -> Result<bool> {
            let response = self
                .client
                .head(Self::static_url(server, object))
                .query(&[("gs_bucket", object.bucket())])
                .send()
                .await?;
            match response.status() {
                StatusCode::OK => Ok(true),
                StatusCode::NOT_FOUND => Ok(false),
                _ => Self::expect_ok(response).await.map(|_| true),
            }
        }

        async fn stage(&self, server: &str, object: &ObjectUrl) -> Result<()> {
            let response = self
                .client
                .get(format!("{server}/stage"))
                .query(&[
                    ("archive_url", object.archive_url().as_str()),
                    ("files", object.file()),
                ])
                .send()
                .await?;
            Self::expect_ok(response).await.map(drop)
        }

        async fn open_static(&self, server: &str, object: &ObjectUrl) -> Result<ByteStream> {
            let response = self
                .client
                .get(Self::static_url(server, object))
                .query(&[("gs_bucket", object.bucket())])
                .send()
                .await?;
            let response = Self::expect_ok(response).await?;
            Ok(Box::pin(response.bytes_stream().map_err(Error::from)))
        }
    }
}

#[cfg(feature = "reqwest")]
pub use http::HttpTransport;
