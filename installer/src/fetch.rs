//! Retrieval of formula source resources.
//!
//! Provides a trait-based abstraction for fetching the resource a formula's
//! URL names, enabling dependency injection for testing. The production
//! [`HttpFetcher`] speaks HTTP(S) through `ureq` and copies `file://` URLs
//! from the local filesystem.

use keg::formula::SourceUrl;
use log::debug;
use std::path::Path;
use std::time::Duration;

/// Default network timeout for a whole download.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Trait for fetching a formula's source resource.
///
/// Abstractions allow tests to mock network behaviour without network access.
///
/// # Examples
///
/// ```
/// use keg_installer::fetch::HttpFetcher;
/// use std::time::Duration;
///
/// let fetcher = HttpFetcher::new(Duration::from_secs(10));
/// // Use fetcher.fetch(formula.url(), dest) in production
/// # let _ = fetcher;
/// ```
#[cfg_attr(test, mockall::automock)]
pub trait Fetcher {
    /// Fetch the resource at `url` and write its bytes to `dest`.
    ///
    /// # Errors
    ///
    /// Returns an error if the resource is unreachable, missing, or the
    /// file write fails.
    fn fetch(&self, url: &SourceUrl, dest: &Path) -> Result<(), FetchError>;
}

/// Errors arising from fetch operations.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    /// The request failed.
    #[error("download failed for {url}: {reason}")]
    HttpError {
        /// The URL that was requested.
        url: String,
        /// A human-readable description of the failure.
        reason: String,
    },

    /// The requested resource does not exist.
    #[error("resource not found: {url}")]
    NotFound {
        /// The URL that returned 404 or named a missing file.
        url: String,
    },

    /// A `file://` URL does not name a local path.
    #[error("file URL does not name a local path: {url}")]
    InvalidFileUrl {
        /// The offending URL.
        url: String,
    },

    /// I/O error writing the fetched file.
    #[error("I/O error writing download: {0}")]
    Io(#[from] std::io::Error),
}

/// Fetcher backed by a `ureq` agent with a global request timeout.
pub struct HttpFetcher {
    agent: ureq::Agent,
}

impl HttpFetcher {
    /// Build a fetcher whose requests give up after `timeout`.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .build();
        Self {
            agent: ureq::Agent::new_with_config(config),
        }
    }
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT)
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, url: &SourceUrl, dest: &Path) -> Result<(), FetchError> {
        if url.scheme() == "file" {
            return copy_local(url, dest);
        }
        debug!("downloading {url}");
        download_to_file(&self.agent, url.as_str(), dest)
    }
}

/// Download a URL and write the body to a file.
fn download_to_file(agent: &ureq::Agent, url: &str, dest: &Path) -> Result<(), FetchError> {
    let response = agent
        .get(url)
        .call()
        .map_err(|e| map_ureq_error(url, &e))?;
    let mut file = std::fs::File::create(dest)?;
    std::io::copy(&mut response.into_body().as_reader(), &mut file).map_err(|e| {
        FetchError::HttpError {
            url: url.to_owned(),
            reason: e.to_string(),
        }
    })?;
    Ok(())
}

/// Copy the file a `file://` URL points at.
fn copy_local(url: &SourceUrl, dest: &Path) -> Result<(), FetchError> {
    let source = url
        .as_url()
        .to_file_path()
        .map_err(|()| FetchError::InvalidFileUrl {
            url: url.to_string(),
        })?;
    debug!("copying local resource {}", source.display());
    match std::fs::copy(&source, dest) {
        Ok(_) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(FetchError::NotFound {
            url: url.to_string(),
        }),
        Err(e) => Err(FetchError::Io(e)),
    }
}

/// Map a ureq error to a [`FetchError`].
fn map_ureq_error(url: &str, err: &ureq::Error) -> FetchError {
    match err {
        ureq::Error::StatusCode(404) => FetchError::NotFound {
            url: url.to_owned(),
        },
        other => FetchError::HttpError {
            url: url.to_owned(),
            reason: other.to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_url(path: &Path) -> SourceUrl {
        let url = url::Url::from_file_path(path).expect("absolute path");
        SourceUrl::try_from(url.as_str()).expect("valid file URL")
    }

    #[test]
    fn map_ureq_error_maps_404_to_not_found() {
        let err = ureq::Error::StatusCode(404);
        let mapped = map_ureq_error("https://example.test/unity3d", &err);
        assert!(matches!(mapped, FetchError::NotFound { .. }));
    }

    #[test]
    fn map_ureq_error_maps_other_status_to_http_error() {
        let err = ureq::Error::StatusCode(500);
        let mapped = map_ureq_error("https://example.test/unity3d", &err);
        assert!(matches!(mapped, FetchError::HttpError { .. }));
        assert!(mapped.to_string().contains("example.test"));
    }

    #[test]
    fn copies_file_urls() {
        let dir = tempfile::tempdir().expect("temp dir");
        let source = dir.path().join("unity3d");
        std::fs::write(&source, b"#!/bin/sh\n").expect("write source");
        let dest = dir.path().join("fetched");

        HttpFetcher::default()
            .fetch(&file_url(&source), &dest)
            .expect("fetch local file");

        assert_eq!(std::fs::read(&dest).expect("read"), b"#!/bin/sh\n");
    }

    #[test]
    fn missing_local_file_is_not_found() {
        let dir = tempfile::tempdir().expect("temp dir");
        let source = dir.path().join("absent");
        let dest = dir.path().join("fetched");

        let err = HttpFetcher::default()
            .fetch(&file_url(&source), &dest)
            .expect_err("missing file must fail");

        assert!(matches!(err, FetchError::NotFound { .. }));
        assert!(!dest.exists());
    }
}
