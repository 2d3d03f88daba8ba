pub mod args;

use std::path::PathBuf;
use std::time::Duration;

use crate::types::{ObjectSource, S3Credentials};

pub const DEFAULT_POOL_SIZE: u16 = 10;
pub const DEFAULT_BATCH_SIZE: u16 = 1000;
pub const DEFAULT_THROTTLE_QUIET_PERIOD_MILLISECONDS: u64 = 1000;
pub const DEFAULT_INITIAL_BACKOFF_MILLISECONDS: u64 = 500;
pub const DEFAULT_MAX_BACKOFF_MILLISECONDS: u64 = 60_000;
pub const DEFAULT_BACKOFF_MULTIPLIER: f64 = 1.5;

/// Main configuration for the s3prune deletion pipeline.
///
/// Holds everything needed to run a [`DeletionPipeline`](crate::DeletionPipeline):
/// target bucket, where delete candidates come from, pool sizing, backoff
/// policy, the optional output file and the AWS client settings.
///
/// # Quick Start
///
/// ```
/// use s3prune::Config;
///
/// let config = Config::for_prefix("my-bucket", "logs/2024/");
/// assert_eq!(config.pool_size, 10);
/// assert_eq!(config.batch_size, 1000);
/// ```
///
/// ```
/// use s3prune::Config;
///
/// let mut config = Config::for_file("my-bucket", "keys.txt");
/// config.dry_run = true;
/// config.pool_size = 32;
/// config.output = Some("deleted.txt".into());
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    pub bucket: String,
    pub source: ObjectSource,
    pub dry_run: bool,
    pub pool_size: u16,
    pub batch_size: u16,
    pub output: Option<PathBuf>,
    pub show_no_progress: bool,
    pub throttle_quiet_period_milliseconds: u64,
    pub backoff_config: BackoffConfig,
    pub target_client_config: Option<ClientConfig>,
    pub tracing_config: Option<TracingConfig>,
}

impl Config {
    /// Delete every object under `prefix` in `bucket`.
    pub fn for_prefix(bucket: &str, prefix: &str) -> Self {
        Config {
            bucket: bucket.to_string(),
            source: ObjectSource::Prefix(prefix.to_string()),
            ..Config::default()
        }
    }

    /// Delete the keys listed (one per line) in `path` from `bucket`.
    pub fn for_file(bucket: &str, path: impl Into<PathBuf>) -> Self {
        Config {
            bucket: bucket.to_string(),
            source: ObjectSource::File(path.into()),
            ..Config::default()
        }
    }

    pub fn throttle_quiet_period(&self) -> Duration {
        Duration::from_millis(self.throttle_quiet_period_milliseconds)
    }
}

impl Default for Config {
    /// The `bucket` defaults to empty and the source to the empty prefix;
    /// set both before running a pipeline.
    fn default() -> Self {
        Config {
            bucket: String::new(),
            source: ObjectSource::Prefix(String::new()),
            dry_run: false,
            pool_size: DEFAULT_POOL_SIZE,
            batch_size: DEFAULT_BATCH_SIZE,
            output: None,
            show_no_progress: false,
            throttle_quiet_period_milliseconds: DEFAULT_THROTTLE_QUIET_PERIOD_MILLISECONDS,
            backoff_config: BackoffConfig::default(),
            target_client_config: None,
            tracing_config: None,
        }
    }
}

/// Exponential backoff policy applied to a throttled batch.
///
/// There is no attempt limit: a throttled batch is retried until it
/// succeeds or fails with a non-throttling error.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffConfig {
    pub initial_interval_milliseconds: u64,
    pub max_interval_milliseconds: u64,
    pub multiplier: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        BackoffConfig {
            initial_interval_milliseconds: DEFAULT_INITIAL_BACKOFF_MILLISECONDS,
            max_interval_milliseconds: DEFAULT_MAX_BACKOFF_MILLISECONDS,
            multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }
}

/// AWS S3 client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub credential: S3Credentials,
    pub region: Option<String>,
    pub endpoint_url: Option<String>,
    pub force_path_style: bool,
    pub retry_config: RetryConfig,
}

/// Retry configuration handed to the AWS SDK itself.
///
/// The SDK retries below the pipeline; throttling that survives these
/// attempts reaches the task-level backoff.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub aws_max_attempts: u32,
    pub initial_backoff_milliseconds: u64,
}

/// Tracing (logging) configuration.
#[derive(Debug, Clone, Copy)]
pub struct TracingConfig {
    pub tracing_level: log::Level,
    pub json_tracing: bool,
    pub aws_sdk_tracing: bool,
    pub disable_color_tracing: bool,
}
