use base64::Engine;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const ONEDRIVE_SHARES_API: &str = "https://api.onedrive.com/v1.0/shares";

/// Errors raised while fetching a remote archive
#[derive(Debug, Error)]
pub enum FetchError {
    /// Transport-level failure (DNS, TLS, connection reset, ...)
    #[error("request to {url} failed: {source}")]
    Request {
        /// URL that was requested
        url: String,
        /// Underlying error
        source: reqwest::Error,
    },

    /// Server answered with a non-success status
    #[error("download failed with status {status}: {url}")]
    Status {
        /// URL that was requested
        url: String,
        /// HTTP status returned
        status: reqwest::StatusCode,
    },

    /// Local filesystem failure while staging the archive
    #[error("failed to write {}: {source}", path.display())]
    Io {
        /// Path being written
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },
}

/// Retrieves a remote archive onto local disk
#[cfg_attr(test, mockall::automock)]
pub trait ArchiveFetcher {
    /// Download `url` to `dest`, returning the number of bytes written
    ///
    /// # Errors
    /// Returns error on transport failure, non-success status or local I/O failure
    fn fetch(&self, url: &str, dest: &Path) -> Result<u64, FetchError>;
}

/// Resolve a OneDrive share link to its direct-content URL.
///
/// Share links point at an HTML viewer; the shares API serves the raw bytes
/// for `u!` + unpadded URL-safe base64 of the link. Other URLs are returned as is.
#[must_use]
pub fn direct_download_url(url: &str) -> String {
    if !is_onedrive_share(url) {
        return url.to_owned();
    }
    let share_id = base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(url);
    format!("{ONEDRIVE_SHARES_API}/u!{share_id}/root/content")
}

fn is_onedrive_share(url: &str) -> bool {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);
    rest.starts_with("1drv.ms/") || rest.starts_with("onedrive.live.com/")
}

/// Blocking HTTP fetcher
#[derive(Debug)]
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
}

impl HttpFetcher {
    /// Build a client without a request timeout; checkpoints are large
    ///
    /// # Errors
    /// Returns error if the TLS backend cannot be initialised
    pub fn new() -> Result<Self, reqwest::Error> {
        let client = reqwest::blocking::Client::builder()
            .timeout(None::<Duration>)
            .build()?;
        Ok(Self { client })
    }
}

impl ArchiveFetcher for HttpFetcher {
    fn fetch(&self, url: &str, dest: &Path) -> Result<u64, FetchError> {
        let resolved = direct_download_url(url);

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent).map_err(|source| FetchError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        tracing::info!(url = %url, resolved = %resolved, "downloading archive");

        let mut response = self
            .client
            .get(&resolved)
            .send()
            .map_err(|source| FetchError::Request {
                url: resolved.clone(),
                source,
            })?;

        if !response.status().is_success() {
            return Err(FetchError::Status {
                url: resolved,
                status: response.status(),
            });
        }

        // Stream to a .part file, renamed once complete
        let temp_path = dest.with_extension("part");
        let mut file = fs::File::create(&temp_path).map_err(|source| FetchError::Io {
            path: temp_path.clone(),
            source,
        })?;

        let copied = response.copy_to(&mut file);
        drop(file);

        let size = match copied {
            Ok(size) => size,
            Err(source) => {
                if let Err(e) = fs::remove_file(&temp_path) {
                    tracing::warn!("failed to remove {}: {}", temp_path.display(), e);
                }
                return Err(FetchError::Request {
                    url: resolved,
                    source,
                });
            }
        };

        fs::rename(&temp_path, dest).map_err(|source| FetchError::Io {
            path: dest.to_path_buf(),
            source,
        })?;

        tracing::info!(path = %dest.display(), size, "archive downloaded");

        Ok(size)
    }
}
