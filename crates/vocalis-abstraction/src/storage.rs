//! Remote object storage capability.

use async_trait::async_trait;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// User metadata attached to a stored object.
pub type ObjectMetadata = BTreeMap<String, String>;

/// Metadata key under which the hex SHA-256 digest of an object is stored.
pub const DIGEST_METADATA_KEY: &str = "sha256";

/// Errors returned by an [`ObjectStore`].
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum StoreError {
    /// A network failure, timeout, or server-side error that may succeed on retry.
    #[error("Transient storage error: {0}")]
    Transient(String),

    /// The store asked the caller to slow down.
    #[error("Storage throttled: {0}")]
    Throttled(String),

    /// Credentials were rejected or lack permission for the operation.
    #[error("Storage permission denied: {0}")]
    PermissionDenied(String),

    /// The container or object does not exist.
    #[error("Storage object not found: {0}")]
    NotFound(String),

    /// The store rejected the request (4xx other than auth/not-found).
    #[error("Storage rejected request ({status}): {message}")]
    Rejected {
        /// HTTP-like status code reported by the store.
        status: u16,
        /// Error detail reported by the store.
        message: String,
    },

    /// The store client is not usable with the supplied settings.
    #[error("Storage configuration error: {0}")]
    Configuration(String),

    /// Other unexpected errors.
    #[error("Storage error: {0}")]
    Other(String),
}

impl StoreError {
    /// Whether retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_) | Self::Throttled(_))
    }
}

/// Outcome of an idempotent container creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContainerStatus {
    Created,
    AlreadyExists,
}

/// A remote object store holding dataset artifacts.
///
/// Writes use replace semantics: a successful `put_object` atomically replaces
/// any previous object stored under the same key.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Name of the container/bucket this store writes into.
    fn container(&self) -> &str;

    /// Creates the container. An already existing container is not an error.
    async fn create_container(&self) -> Result<ContainerStatus, StoreError>;

    /// Stores `body` under `key` with the given user metadata.
    async fn put_object(
        &self,
        key: &str,
        body: Bytes,
        metadata: &ObjectMetadata,
    ) -> Result<(), StoreError>;

    /// Fetches the user metadata of a stored object.
    async fn object_metadata(&self, key: &str) -> Result<ObjectMetadata, StoreError>;

    /// A reference to the stored object that external services can resolve.
    fn object_url(&self, key: &str) -> String;
}
