//! Artifact fetcher: download a release archive and expand it onto a directory.

mod archive;
mod verify;

pub use archive::ArchiveFormat;
pub use verify::verify_sha256;

use crate::error::{FetchError, Result};
use bytes::{Bytes, BytesMut};
use std::future::Future;
use std::path::Path;

/// Source of release archives
pub trait ArtifactSource {
    /// Download `url`, optionally verify it, and expand it into `target_dir`
    fn fetch_and_expand(
        &self,
        url: &str,
        expected_sha256: Option<&str>,
        target_dir: &Path,
    ) -> impl Future<Output = Result<ExpandedArtifact>>;
}

/// Summary of an expanded archive
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExpandedArtifact {
    /// Detected archive encoding
    pub format: ArchiveFormat,
    /// Downloaded size
    pub size_bytes: u64,
    /// Entries written to the target directory
    pub entries: usize,
}

/// Fetches archives over HTTP(S)
#[derive(Debug, Clone)]
pub struct HttpArtifactFetcher {
    client: reqwest::Client,
}

impl HttpArtifactFetcher {
    /// Create a fetcher with the crate's user agent
    pub fn new() -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(crate::USER_AGENT)
            .build()
            .map_err(|source| FetchError::Request {
                url: String::new(),
                source,
            })?;
        Ok(Self { client })
    }

    /// Use a preconfigured client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    /// Downloads `url` and returns the complete body.
    ///
    /// Fails on non-success status and on bodies shorter than `Content-Length`.
    pub async fn download(&self, url: &str) -> std::result::Result<Bytes, FetchError> {
        let parsed = url::Url::parse(url).map_err(|source| FetchError::InvalidUrl {
            url: url.to_string(),
            source,
        })?;

        log::info!("Downloading {}", url);

        let mut response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|source| FetchError::Request {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::HttpStatus {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let expected = response.content_length();
        let mut body = BytesMut::with_capacity(expected.unwrap_or(0).min(64 * 1024 * 1024) as usize);
        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => body.extend_from_slice(&chunk),
                Ok(None) => break,
                Err(source) => {
                    if let Some(expected) = expected
                        && ends_early(&source)
                    {
                        return Err(FetchError::Truncated {
                            url: url.to_string(),
                            expected,
                            received: body.len() as u64,
                        });
                    }
                    return Err(FetchError::Request {
                        url: url.to_string(),
                        source,
                    });
                }
            }
        }

        Ok(body.freeze())
    }
}

/// Whether a body error means the connection closed before the announced length
fn ends_early(err: &reqwest::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = std::error::Error::source(err);
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<std::io::Error>()
            && io.kind() == std::io::ErrorKind::UnexpectedEof
        {
            return true;
        }
        source = cause.source();
    }
    false
}

impl ArtifactSource for HttpArtifactFetcher {
    async fn fetch_and_expand(
        &self,
        url: &str,
        expected_sha256: Option<&str>,
        target_dir: &Path,
    ) -> Result<ExpandedArtifact> {
        let data = self.download(url).await?;
        let size_bytes = data.len() as u64;

        if let Some(expected) = expected_sha256 {
            log::info!("Validating sha256");
            verify_sha256(data.clone(), expected).await?;
        }

        let format = ArchiveFormat::detect(&data).ok_or_else(|| FetchError::UnsupportedFormat {
            url: url.to_string(),
        })?;

        let entries = archive::expand(format, data, target_dir).await?;
        log::info!(
            "Expanded {} {} entries ({} bytes) into {}",
            entries,
            format,
            size_bytes,
            target_dir.display()
        );

        Ok(ExpandedArtifact {
            format,
            size_bytes,
            entries,
        })
    }
}
