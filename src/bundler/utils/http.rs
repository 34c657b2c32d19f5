//! HTTP utilities for downloading runtime releases.
//!
//! Provides the [`ReleaseFetcher`] seam used by the bundler and its
//! production implementation backed by `reqwest`.

use crate::bundler::error::{Error, ErrorExt, Result};
use futures_lite::StreamExt;
use std::future::Future;
use std::path::Path;
use tokio::io::AsyncWriteExt;
use url::Url;

/// Default host for runtime releases.
pub const DEFAULT_RELEASE_BASE_URL: &str = "https://nodejs.org/download/release";

/// Retrieves a remote file into a local path.
///
/// Implementations must create the destination's parent directories and must
/// treat any non-2xx response as an error instead of writing the body.
pub trait ReleaseFetcher: Send + Sync {
    /// Downloads `url` into `dest`.
    fn fetch(&self, url: &Url, dest: &Path) -> impl Future<Output = Result<()>> + Send;
}

/// [`ReleaseFetcher`] over HTTPS.
#[derive(Debug, Clone, Default)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    /// Creates a fetcher with a default client.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a fetcher around an existing client (proxies, timeouts).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl ReleaseFetcher for HttpFetcher {
    async fn fetch(&self, url: &Url, dest: &Path) -> Result<()> {
        log::info!("Downloading {}", url);

        let response = self.client.get(url.clone()).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::HttpStatus {
                url: url.to_string(),
                status,
            });
        }

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .fs_context("creating download directory", parent)?;
        }

        let mut file = tokio::fs::File::create(dest)
            .await
            .fs_context("creating download file", dest)?;

        let mut written = 0u64;
        let mut stream = std::pin::pin!(response.bytes_stream());
        while let Some(chunk) = stream.next().await {
            let chunk = chunk?;
            file.write_all(&chunk)
                .await
                .fs_context("writing download file", dest)?;
            written += chunk.len() as u64;
        }
        file.flush().await.fs_context("flushing download file", dest)?;

        log::debug!("Downloaded {} bytes to {}", written, dest.display());
        Ok(())
    }
}

/// Builds `<base>/<version>/<archive_name>`.
///
/// A trailing slash on `base` is optional.
pub fn release_url(base: &str, version: &str, archive_name: &str) -> Result<Url> {
    let mut url = Url::parse(base)?;
    url.path_segments_mut()
        .map_err(|_| Error::GenericError(format!("{base} cannot be used as a release base URL")))?
        .pop_if_empty()
        .push(version)
        .push(archive_name);
    Ok(url)
}
