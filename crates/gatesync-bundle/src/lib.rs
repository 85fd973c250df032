//! gatesync-bundle — bundle resolution for deployments.
//!
//! Fetches the artifact a deployment points at, verifies it against the
//! declared checksum, and places it in the local bundle cache.
//!
//! # Outcomes
//!
//! Resolution never fails the caller. Every problem (unreachable URI,
//! non-2xx response, checksum mismatch, unknown algorithm, cache write
//! failure) is recorded on the deployment row as `Fail` plus a
//! [`BundleError::code`] and message. A verified bundle sets `Success` and
//! the `file://` URI of the cached copy.

pub mod checksum;
pub mod error;
pub mod resolver;

pub use checksum::ChecksumType;
pub use error::BundleError;
pub use resolver::{BundleLocation, BundleResolver};
