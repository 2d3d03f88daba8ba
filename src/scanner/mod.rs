//! Producers of delete-candidate batches.
//!
//! A scanner yields successive batches of keys. It is forward-only: a batch
//! is never revisited. After `scan` returns false, `err` tells a clean end of
//! input apart from a failure.

use anyhow::Result;
use async_trait::async_trait;

use crate::config::Config;
use crate::storage::Storage;
use crate::types::ObjectSource;

pub mod file;
pub mod listing;

pub use file::FileScanner;
pub use listing::ListingScanner;

#[async_trait]
pub trait ObjectScanner: Send {
    /// Load the next batch of at most `batch_size` keys.
    ///
    /// Returns false when the input is exhausted or an error occurred.
    async fn scan(&mut self, batch_size: usize) -> bool;

    /// The batch loaded by the last successful `scan`.
    fn objects(&self) -> &[String];

    fn err(&self) -> Option<&anyhow::Error>;

    fn take_err(&mut self) -> Option<anyhow::Error>;
}

/// Select the scanner for the configured object source.
pub async fn create_scanner(config: &Config, target: Storage) -> Result<Box<dyn ObjectScanner>> {
    match config.source {
        ObjectSource::File(ref path) => Ok(Box::new(FileScanner::open(path).await?)),
        ObjectSource::Prefix(ref prefix) => Ok(Box::new(ListingScanner::new(target, prefix))),
    }
}
