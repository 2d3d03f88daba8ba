use anyhow::Result;
use async_trait::async_trait;
use dyn_clone::DynClone;

use crate::config::Config;
use crate::types::FailedKey;

pub mod s3;

/// Type alias for a boxed Storage trait object.
pub type Storage = Box<dyn StorageTrait + Send + Sync>;

/// Remote object-store operations needed by the deletion pipeline.
///
/// Implementations must be cheap to clone: every delete task carries its
/// own clone.
#[async_trait]
pub trait StorageTrait: DynClone {
    /// Fetch one page of keys under `prefix`, starting after `marker`.
    ///
    /// An empty page means the listing is exhausted.
    async fn list_objects(
        &self,
        prefix: &str,
        marker: Option<String>,
        max_keys: i32,
    ) -> Result<Vec<String>>;

    /// Delete a batch of keys in a single quiet DeleteObjects request.
    ///
    /// Returns the keys the store refused to delete. A request-level
    /// failure is returned as an error; throttling is reported as
    /// [`S3pruneError::Throttled`](crate::types::error::S3pruneError::Throttled).
    async fn delete_objects(&self, keys: &[String]) -> Result<Vec<FailedKey>>;
}

dyn_clone::clone_trait_object!(StorageTrait);

/// Create the S3 storage for the configured bucket.
pub async fn create_storage(config: &Config) -> Result<Storage> {
    s3::S3StorageFactory::create(config.bucket.clone(), config.target_client_config.clone()).await
}
