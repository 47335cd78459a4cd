use std::future::Future;
use std::pin::Pin;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::error::Result;

/// A boxed stream type for response bodies.
pub type BoxStream<'a, T> = Pin<Box<dyn Stream<Item = T> + Send + 'a>>;

/// Object bytes as they arrive from a backend.
pub type ByteStream = BoxStream<'static, Result<Bytes>>;

/// Capability to open an object by URL as a byte stream.
///
/// # Implementations
///
/// - [`FakeClient`](crate::FakeClient): in-memory map, for tests
/// - [`StorageClient`](crate::StorageClient): direct object storage over HTTP
/// - [`PoolClient`](crate::PoolClient): staging-aware pool of redundant servers
///
/// Dropping the returned future (or the stream) aborts the transfer.
pub trait Client: Send + Sync {
    fn open(&self, url: &str) -> impl Future<Output = Result<ByteStream>> + Send;
}

/// Opens `url` on `client` and drains the object into `writer`.
///
/// Returns the number of bytes consumed. The writer is flushed but not synced.
pub async fn fetch_to<C, W>(client: &C, url: &str, writer: &mut W) -> Result<u64>
where
    C: Client + ?Sized,
    W: AsyncWrite + Unpin + Send,
{
    let mut stream = client.open(url).await?;
    let mut written = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        writer.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    writer.flush().await?;
    Ok(written)
}
