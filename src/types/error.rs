use anyhow::Error;
use thiserror::Error;

pub const EXIT_CODE_OK: i32 = 0;
pub const EXIT_CODE_ERROR: i32 = 1;
pub const EXIT_CODE_FLAG_PARSE_ERROR: i32 = 12;
pub const EXIT_CODE_AWS_ERROR: i32 = 13;

/// S3 error codes that signal the caller to slow down.
const THROTTLING_ERROR_CODES: &[&str] = &["SlowDown"];

/// Application-level error types for s3prune.
///
/// ## Exit Codes
///
/// Each variant maps to an exit code (via `exit_code()`):
/// - 1: Runtime errors (Throttled, PartialFailure, PoolClosed, Io)
/// - 12: Invalid pool size
/// - 13: AWS client configuration errors (AwsConfig)
#[derive(Error, Debug, PartialEq)]
pub enum S3pruneError {
    /// The store asked us to slow down. Retryable.
    #[error("throttled by S3 ({code}): {message}")]
    Throttled { code: String, message: String },

    /// Some keys of a batch could not be deleted.
    #[error("partial failure: {deleted} deleted, {failed} failed (first failure: {first_key}: {first_code})")]
    PartialFailure {
        deleted: u64,
        failed: u64,
        first_key: String,
        first_code: String,
    },

    /// The AWS client could not be configured.
    #[error("AWS configuration error: {0}")]
    AwsConfig(String),

    /// A task was submitted after the pool was closed.
    #[error("worker pool has been closed")]
    PoolClosed,

    /// The pool cannot run with fewer than one worker.
    #[error("invalid worker pool size: {0} (must be at least 1)")]
    InvalidPoolSize(usize),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(String),
}

impl S3pruneError {
    pub fn exit_code(&self) -> i32 {
        match self {
            S3pruneError::InvalidPoolSize(_) => EXIT_CODE_FLAG_PARSE_ERROR,
            S3pruneError::AwsConfig(_) => EXIT_CODE_AWS_ERROR,
            _ => EXIT_CODE_ERROR,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, S3pruneError::Throttled { .. })
    }
}

/// Whether an S3 error code is a throttling signal.
pub fn is_throttling_error_code(code: &str) -> bool {
    THROTTLING_ERROR_CODES.contains(&code)
}

/// Check if an anyhow::Error wraps a throttling error.
pub fn is_throttling_error(e: &Error) -> bool {
    if let Some(err) = e.downcast_ref::<S3pruneError>() {
        return err.is_retryable();
    }
    false
}

/// Extract the exit code from an anyhow::Error, defaulting to 1.
pub fn exit_code_from_error(e: &Error) -> i32 {
    if let Some(err) = e.downcast_ref::<S3pruneError>() {
        return err.exit_code();
    }
    EXIT_CODE_ERROR
}
