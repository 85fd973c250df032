//! Per-deployment bundle resolution failures.

use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum BundleError {
    #[error("bundle download failed: {0}")]
    Download(String),

    #[error("bundle checksum mismatch: expected {expected}, computed {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    #[error("unsupported checksum type: {0:?}")]
    UnsupportedChecksum(String),

    #[error("invalid bundle descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("failed to write bundle to local cache: {0}")]
    Cache(String),
}

impl BundleError {
    /// Stable code recorded as the deployment's error code.
    pub fn code(&self) -> i32 {
        match self {
            BundleError::Download(_) => 1,
            BundleError::ChecksumMismatch { .. } => 2,
            BundleError::UnsupportedChecksum(_) => 3,
            BundleError::InvalidDescriptor(_) => 4,
            BundleError::Cache(_) => 5,
        }
    }
}
