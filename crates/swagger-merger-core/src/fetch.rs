//! Byte retrieval for reference targets.
//!
//! The merger never touches the filesystem or the network directly. It asks a
//! [`ResourceFetcher`] for the bytes of a local file, or to materialize a
//! remote resource under a local path. [`NativeFetcher`] is the default
//! implementation; tests substitute their own.
//!
//! Remote downloads are staged below the system temporary directory, in one
//! subdirectory per merge tag, so independent runs do not see each other's
//! files. Downloading requires the `remote` cargo feature.

use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for fetch operations.
pub type FetchResult<T> = Result<T, FetchError>;

/// Errors reported by a fetcher.
#[derive(Debug, Error)]
pub enum FetchError {
    /// The file does not exist.
    #[error("{} does not exist", .0.display())]
    NotFound(PathBuf),

    /// The file exists but could not be read.
    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// A remote resource could not be downloaded.
    #[error("network error for {url}: {message}")]
    Network { url: String, message: String },

    /// The operation is not available in this build or environment.
    #[error("operation not supported: {0}")]
    NotSupported(String),
}

/// Source of document bytes.
pub trait ResourceFetcher {
    /// Read the entire contents of a local file.
    fn read_file(&self, path: &Path) -> FetchResult<Vec<u8>>;

    /// Materialize a remote resource locally and return the local path.
    ///
    /// `tag` separates the downloads of independent merge runs.
    fn download(&self, tag: &str, url: &str) -> FetchResult<PathBuf>;
}

impl<F: ResourceFetcher + ?Sized> ResourceFetcher for &F {
    fn read_file(&self, path: &Path) -> FetchResult<Vec<u8>> {
        (**self).read_file(path)
    }

    fn download(&self, tag: &str, url: &str) -> FetchResult<PathBuf> {
        (**self).download(tag, url)
    }
}

const STAGING_DIR: &str = "swagger-merger";

/// Fetcher backed by the local filesystem (and the network, with the
/// `remote` feature).
#[derive(Debug, Clone)]
pub struct NativeFetcher {
    staging_root: PathBuf,
}

impl Default for NativeFetcher {
    fn default() -> Self {
        Self::new()
    }
}

impl NativeFetcher {
    /// Create a fetcher staging downloads under the system temp directory.
    pub fn new() -> Self {
        Self {
            staging_root: std::env::temp_dir().join(STAGING_DIR),
        }
    }

    /// Create a fetcher staging downloads under `root`.
    pub fn with_staging_root(root: impl Into<PathBuf>) -> Self {
        Self {
            staging_root: root.into(),
        }
    }

    /// Local path a download of `url` under `tag` is written to.
    pub fn staging_path(&self, tag: &str, url: &str) -> PathBuf {
        let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
        let without_fragment = without_scheme.split('#').next().unwrap_or_default();
        self.staging_root
            .join(sanitize_component(tag))
            .join(sanitize_component(without_fragment))
    }
}

impl ResourceFetcher for NativeFetcher {
    fn read_file(&self, path: &Path) -> FetchResult<Vec<u8>> {
        std::fs::read(path).map_err(|source| {
            if source.kind() == io::ErrorKind::NotFound {
                FetchError::NotFound(path.to_path_buf())
            } else {
                FetchError::Io {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })
    }

    #[cfg(feature = "remote")]
    fn download(&self, tag: &str, url: &str) -> FetchResult<PathBuf> {
        let network = |message: String| FetchError::Network {
            url: url.to_string(),
            message,
        };

        let target = self.staging_path(tag, url);
        tracing::debug!(url, target = %target.display(), "Downloading remote reference");

        let response = reqwest::blocking::get(url)
            .and_then(|r| r.error_for_status())
            .map_err(|e| network(e.to_string()))?;
        let bytes = response.bytes().map_err(|e| network(e.to_string()))?;

        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|source| FetchError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(&target, &bytes).map_err(|source| FetchError::Io {
            path: target.clone(),
            source,
        })?;

        Ok(target)
    }

    #[cfg(not(feature = "remote"))]
    fn download(&self, _tag: &str, url: &str) -> FetchResult<PathBuf> {
        Err(FetchError::NotSupported(format!(
            "downloading {} requires the `remote` feature",
            url
        )))
    }
}

/// Check if a path lies in the system temporary directory.
///
/// Such paths are machine-generated staging files (for example downloads
/// rewritten into references) and are never rebased onto a base directory.
pub fn is_temp_path(path: &str) -> bool {
    let temp = std::env::temp_dir();
    !temp.as_os_str().is_empty() && Path::new(path).starts_with(&temp)
}

/// Flatten an arbitrary string into a single safe file name, keeping the
/// extension so the staged file decodes with the right format.
fn sanitize_component(raw: &str) -> String {
    let sanitized: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    if sanitized.is_empty() {
        "_".to_string()
    } else {
        sanitized
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.yaml");
        std::fs::write(&path, b"a: 1").unwrap();

        let fetcher = NativeFetcher::new();
        assert_eq!(fetcher.read_file(&path).unwrap(), b"a: 1");
    }

    #[test]
    fn test_read_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = NativeFetcher::new();
        let err = fetcher.read_file(&dir.path().join("nope.yaml")).unwrap_err();
        assert!(matches!(err, FetchError::NotFound(_)));
    }

    #[test]
    fn test_staging_path_is_per_tag() {
        let fetcher = NativeFetcher::with_staging_root("/stage");
        let a = fetcher.staging_path("run-1", "https://host/specs/a.yaml#/x");
        let b = fetcher.staging_path("run-2", "https://host/specs/a.yaml");
        assert_eq!(a, PathBuf::from("/stage/run-1/host_specs_a.yaml"));
        assert_eq!(b, PathBuf::from("/stage/run-2/host_specs_a.yaml"));
    }

    #[test]
    fn test_is_temp_path() {
        let inside = std::env::temp_dir().join("x.yaml");
        assert!(is_temp_path(&inside.to_string_lossy()));
        assert!(!is_temp_path("relative/x.yaml"));

        let temp = std::env::temp_dir();
        let sibling = format!("{}data/x.yaml", temp.to_string_lossy().trim_end_matches('/'));
        assert!(!is_temp_path(&sibling));
    }

    #[cfg(not(feature = "remote"))]
    #[test]
    fn test_download_without_remote_feature() {
        let fetcher = NativeFetcher::new();
        let err = fetcher.download("tag", "https://host/a.yaml").unwrap_err();
        assert!(matches!(err, FetchError::NotSupported(_)));
    }
}
