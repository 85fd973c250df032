//! Bundle fetch, verification, and local caching.

use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::Bytes;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use gatesync_core::{HttpClient, HttpResult};
use gatesync_state::{DataDeployment, DeployStatus};

use crate::checksum::ChecksumType;
use crate::error::BundleError;

/// Where a bundle can be fetched from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BundleLocation {
    /// https://bundles.example.com/proxies/orders.zip (or plain http)
    Http { url: String },
    /// file:///srv/bundles/orders.zip
    File { path: PathBuf },
}

impl BundleLocation {
    pub fn parse(uri: &str) -> Result<Self, BundleError> {
        let uri = uri.trim();
        if uri.is_empty() {
            return Err(BundleError::InvalidDescriptor("bundle URI is empty".to_string()));
        }
        if uri.starts_with("http://") || uri.starts_with("https://") {
            Ok(BundleLocation::Http { url: uri.to_string() })
        } else if let Some(path) = uri.strip_prefix("file://") {
            Ok(BundleLocation::File { path: PathBuf::from(path) })
        } else {
            Err(BundleError::Download(format!("unsupported bundle URI: {uri}")))
        }
    }
}

/// Resolves deployment bundles into the local cache.
#[derive(Debug, Clone)]
pub struct BundleResolver {
    client: HttpClient,
    cache_dir: PathBuf,
}

impl BundleResolver {
    /// `timeout` bounds each HTTP fetch.
    pub fn new(cache_dir: impl Into<PathBuf>, timeout: Duration) -> HttpResult<Self> {
        Ok(Self {
            client: HttpClient::new(timeout)?,
            cache_dir: cache_dir.into(),
        })
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Resolve `dep` in place and return its new status.
    ///
    /// Any previous outcome on the row is discarded first.
    pub async fn resolve(&self, dep: &mut DataDeployment) -> DeployStatus {
        dep.reset_resolution();
        match self.try_resolve(dep).await {
            Ok(local_uri) => {
                debug!(deployment = %dep.id, %local_uri, "bundle resolved");
                dep.mark_success(local_uri);
            }
            Err(e) => {
                warn!(deployment = %dep.id, uri = %dep.bundle_uri, code = e.code(), error = %e, "bundle resolution failed");
                dep.mark_failed(e.code(), e.to_string());
            }
        }
        dep.deploy_status
    }

    /// Fetch and verify the bundle for `dep`, returning the local URI.
    pub async fn try_resolve(&self, dep: &DataDeployment) -> Result<String, BundleError> {
        let location = BundleLocation::parse(&dep.bundle_uri)?;
        if dep.bundle_checksum_type.trim().is_empty() {
            return Err(BundleError::InvalidDescriptor("checksum type is empty".to_string()));
        }
        let algorithm: ChecksumType = dep.bundle_checksum_type.parse()?;
        if dep.bundle_checksum.trim().is_empty() {
            return Err(BundleError::InvalidDescriptor("checksum is empty".to_string()));
        }

        let data = self.fetch(&location).await?;
        algorithm.verify(&data, &dep.bundle_checksum)?;

        let path = self.store_local(dep, &data).await?;
        Ok(format!("file://{}", path.display()))
    }

    async fn fetch(&self, location: &BundleLocation) -> Result<Bytes, BundleError> {
        match location {
            BundleLocation::Http { url } => {
                let resp = self
                    .client
                    .get(url)
                    .await
                    .map_err(|e| BundleError::Download(format!("{url}: {e}")))?;
                if !resp.status.is_success() {
                    return Err(BundleError::Download(format!(
                        "{url}: server responded {}",
                        resp.status
                    )));
                }
                Ok(resp.body)
            }
            BundleLocation::File { path } => tokio::fs::read(path)
                .await
                .map(Bytes::from)
                .map_err(|e| BundleError::Download(format!("{}: {e}", path.display()))),
        }
    }

    /// Remove a cached bundle given its `file://` local URI.
    ///
    /// Only files inside the cache directory are touched. Returns whether a
    /// file was removed; a file that is already gone is not an error.
    pub async fn evict(&self, local_bundle_uri: &str) -> bool {
        let Some(path) = local_bundle_uri.strip_prefix("file://").map(Path::new) else {
            return false;
        };
        if !path.starts_with(&self.cache_dir) {
            warn!(path = %path.display(), "refusing to evict bundle outside the cache");
            return false;
        }
        match tokio::fs::remove_file(path).await {
            Ok(()) => {
                debug!(path = %path.display(), "cached bundle evicted");
                true
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => false,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to evict cached bundle");
                false
            }
        }
    }

    /// Write verified bytes into the cache via a temporary file + rename.
    async fn store_local(&self, dep: &DataDeployment, data: &[u8]) -> Result<PathBuf, BundleError> {
        tokio::fs::create_dir_all(&self.cache_dir)
            .await
            .map_err(|e| BundleError::Cache(format!("{}: {e}", self.cache_dir.display())))?;

        let name = cache_name(&dep.bundle_uri, &dep.bundle_checksum);
        let final_path = self.cache_dir.join(format!("{name}.zip"));
        let tmp_path = self.cache_dir.join(format!("{name}.tmp"));

        if let Err(e) = tokio::fs::write(&tmp_path, data).await {
            discard_tmp(&tmp_path).await;
            return Err(BundleError::Cache(format!("{}: {e}", tmp_path.display())));
        }
        if let Err(e) = tokio::fs::rename(&tmp_path, &final_path).await {
            discard_tmp(&tmp_path).await;
            return Err(BundleError::Cache(format!("{}: {e}", final_path.display())));
        }

        debug!(path = %final_path.display(), bytes = data.len(), "bundle cached");
        Ok(final_path)
    }
}

async fn discard_tmp(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(path = %path.display(), error = %e, "failed to remove partial bundle");
        }
    }
}

/// Cache file stem derived from the bundle URI and its declared checksum.
fn cache_name(uri: &str, checksum: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(uri.as_bytes());
    hasher.update(b"\n");
    hasher.update(checksum.trim().to_ascii_lowercase().as_bytes());
    hex::encode(&hasher.finalize()[..16])
}
