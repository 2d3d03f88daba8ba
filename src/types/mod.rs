pub mod error;
pub mod token;

/// A batch of keys that a worker finished with, sent on the deleted-batch queue.
///
/// In dry-run mode the keys were not actually deleted; they are reported
/// exactly as a real deletion would be.
#[derive(Debug, Clone, PartialEq)]
pub struct DeletedBatch {
    pub keys: Vec<String>,
}

impl DeletedBatch {
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// A key that the store refused to delete inside an otherwise successful
/// `DeleteObjects` call.
#[derive(Debug, Clone, PartialEq)]
pub struct FailedKey {
    pub key: String,
    pub error_code: String,
    pub error_message: String,
}

/// Where delete candidates come from.
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectSource {
    /// A local file with one key per line.
    File(std::path::PathBuf),
    /// Every object under a prefix of the target bucket.
    Prefix(String),
}

/// AWS credential sources supported by s3prune.
#[derive(Debug, Clone, PartialEq)]
pub enum S3Credentials {
    Profile(String),
    FromEnvironment,
}

/// Final numbers of a pipeline run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeletionSummary {
    pub seen: u64,
    pub completed: u64,
    pub errors: u64,
    pub final_pool_size: usize,
}
