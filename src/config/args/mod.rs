use crate::config::{
    BackoffConfig, ClientConfig, Config, DEFAULT_BACKOFF_MULTIPLIER, DEFAULT_BATCH_SIZE,
    DEFAULT_INITIAL_BACKOFF_MILLISECONDS, DEFAULT_MAX_BACKOFF_MILLISECONDS, DEFAULT_POOL_SIZE,
    DEFAULT_THROTTLE_QUIET_PERIOD_MILLISECONDS, RetryConfig, TracingConfig,
};
use crate::types::{ObjectSource, S3Credentials};
use clap::Parser;
use clap::builder::NonEmptyStringValueParser;
use clap_verbosity_flag::{Verbosity, WarnLevel};
use std::ffi::OsString;
use std::path::PathBuf;


// ---------------------------------------------------------------------------
// Default constants
// ---------------------------------------------------------------------------

/// S3 DeleteObjects accepts at most this many keys per request.
pub const MAX_BATCH_SIZE: u16 = 1000;

const DEFAULT_AWS_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_AWS_INITIAL_BACKOFF_MILLISECONDS: u64 = 100;
const DEFAULT_DRY_RUN: bool = false;
const DEFAULT_FORCE_PATH_STYLE: bool = false;
const DEFAULT_SHOW_NO_PROGRESS: bool = false;
const DEFAULT_JSON_TRACING: bool = false;
const DEFAULT_AWS_SDK_TRACING: bool = false;
const DEFAULT_DISABLE_COLOR_TRACING: bool = false;

// ---------------------------------------------------------------------------
// Error messages
// ---------------------------------------------------------------------------

const ERROR_MESSAGE_BUCKET_REQUIRED: &str = "Please provide a bucket name.";
const ERROR_MESSAGE_SOURCE_REQUIRED: &str = "Please provide an s3 prefix or an objects file.";
const ERROR_MESSAGE_POOL_SIZE_ZERO: &str = "Pool size must be at least 1.";
const ERROR_MESSAGE_BATCH_SIZE_ZERO: &str = "Batch size must be at least 1.";
const ERROR_MESSAGE_BATCH_SIZE_TOO_LARGE: &str = "Batch size must be at most 1000 (S3 API limit).";
const ERROR_MESSAGE_INITIAL_BACKOFF_ZERO: &str = "Initial backoff must be at least 1 millisecond.";
const ERROR_MESSAGE_MAX_BACKOFF_TOO_SMALL: &str =
    "Max backoff must be greater than or equal to the initial backoff.";

// ---------------------------------------------------------------------------
// CLIArgs (clap-derived argument struct)
// ---------------------------------------------------------------------------

/// s3prune - bulk Amazon S3 object deletion.
///
/// Deletes every object under a prefix, or every key listed in a file,
/// using batched DeleteObjects requests driven by an elastic worker pool
/// that shrinks itself when S3 asks it to slow down.
///
/// Example:
///   s3prune --bucket my-bucket --prefix logs/2023/ --dryrun
///   s3prune --bucket my-bucket --file keys.txt --pool 32 --output deleted.txt
#[derive(Parser, Clone, Debug)]
#[command(name = "s3prune", version, about, long_about = None)]
pub struct CLIArgs {
    /// The target S3 bucket name.
    #[arg(long, env = "S3PRUNE_BUCKET", value_parser = NonEmptyStringValueParser::new(), help_heading = "General")]
    pub bucket: Option<String>,

    /// A file containing the object keys to be deleted, one per line.
    #[arg(long, env = "S3PRUNE_FILE", conflicts_with = "prefix", help_heading = "General")]
    pub file: Option<PathBuf>,

    /// List and delete all objects with this prefix.
    #[arg(long, env = "S3PRUNE_PREFIX", conflicts_with = "file", help_heading = "General")]
    pub prefix: Option<String>,

    /// Run through the object list without actually deleting anything.
    #[arg(short = 'd', long, visible_alias = "dry-run", env = "S3PRUNE_DRYRUN", default_value_t = DEFAULT_DRY_RUN, help_heading = "General")]
    pub dryrun: bool,

    /// A file to append deleted object keys to.
    #[arg(long, env = "S3PRUNE_OUTPUT", help_heading = "General")]
    pub output: Option<PathBuf>,

    /// Don't show the progress line.
    #[arg(long, env = "S3PRUNE_SHOW_NO_PROGRESS", default_value_t = DEFAULT_SHOW_NO_PROGRESS, help_heading = "General")]
    pub show_no_progress: bool,

    // -----------------------------------------------------------------------
    // Performance options
    // -----------------------------------------------------------------------
    /// Initial worker pool size. The pool shrinks by one worker each time S3 throttles.
    #[arg(long, env = "S3PRUNE_POOL", default_value_t = DEFAULT_POOL_SIZE, help_heading = "Performance")]
    pub pool: u16,

    /// Number of keys per DeleteObjects request (1-1000).
    #[arg(long, env = "S3PRUNE_BATCH_SIZE", default_value_t = DEFAULT_BATCH_SIZE, help_heading = "Performance")]
    pub batch_size: u16,

    /// Minimum time between two throttle-driven pool shrinks, in milliseconds.
    #[arg(long, env = "S3PRUNE_THROTTLE_QUIET_PERIOD_MILLISECONDS", default_value_t = DEFAULT_THROTTLE_QUIET_PERIOD_MILLISECONDS, help_heading = "Performance")]
    pub throttle_quiet_period_milliseconds: u64,

    // -----------------------------------------------------------------------
    // Retry options
    // -----------------------------------------------------------------------
    /// First delay before retrying a throttled batch, in milliseconds.
    #[arg(long, env = "S3PRUNE_INITIAL_BACKOFF_MILLISECONDS", default_value_t = DEFAULT_INITIAL_BACKOFF_MILLISECONDS, help_heading = "Retry")]
    pub initial_backoff_milliseconds: u64,

    /// Upper bound of the delay between retries of a throttled batch, in milliseconds.
    #[arg(long, env = "S3PRUNE_MAX_BACKOFF_MILLISECONDS", default_value_t = DEFAULT_MAX_BACKOFF_MILLISECONDS, help_heading = "Retry")]
    pub max_backoff_milliseconds: u64,

    /// Maximum attempts the AWS SDK makes before a request error reaches s3prune.
    #[arg(long, env = "S3PRUNE_AWS_MAX_ATTEMPTS", default_value_t = DEFAULT_AWS_MAX_ATTEMPTS, help_heading = "Retry")]
    pub aws_max_attempts: u32,

    /// Initial backoff of the AWS SDK's own retries, in milliseconds.
    #[arg(long, env = "S3PRUNE_AWS_INITIAL_BACKOFF_MILLISECONDS", default_value_t = DEFAULT_AWS_INITIAL_BACKOFF_MILLISECONDS, help_heading = "Retry")]
    pub aws_initial_backoff_milliseconds: u64,

    // -----------------------------------------------------------------------
    // Logging options
    // -----------------------------------------------------------------------
    /// Verbosity level. -q (quiet), default (warn), -v, -vv, -vvv.
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Output logs in JSON format.
    #[arg(long, env = "S3PRUNE_JSON_TRACING", default_value_t = DEFAULT_JSON_TRACING, help_heading = "Logging")]
    pub json_tracing: bool,

    /// Enable AWS SDK tracing.
    #[arg(long, env = "S3PRUNE_AWS_SDK_TRACING", default_value_t = DEFAULT_AWS_SDK_TRACING, help_heading = "Logging")]
    pub aws_sdk_tracing: bool,

    /// Disable colored output in logs.
    #[arg(long, env = "S3PRUNE_DISABLE_COLOR_TRACING", default_value_t = DEFAULT_DISABLE_COLOR_TRACING, help_heading = "Logging")]
    pub disable_color_tracing: bool,

    // -----------------------------------------------------------------------
    // AWS configuration
    // -----------------------------------------------------------------------
    /// The AWS region of the target bucket.
    #[arg(long, env = "S3PRUNE_REGION", value_parser = NonEmptyStringValueParser::new(), help_heading = "AWS")]
    pub region: Option<String>,

    /// AWS profile. If not set, credentials come from the environment.
    #[arg(long, env = "S3PRUNE_PROFILE", value_parser = NonEmptyStringValueParser::new(), help_heading = "AWS")]
    pub profile: Option<String>,

    /// Custom S3-compatible endpoint URL (e.g. MinIO).
    #[arg(long, env = "S3PRUNE_ENDPOINT_URL", value_parser = NonEmptyStringValueParser::new(), help_heading = "AWS")]
    pub endpoint_url: Option<String>,

    /// Force path-style access (required for some S3-compatible services).
    #[arg(long, env = "S3PRUNE_FORCE_PATH_STYLE", default_value_t = DEFAULT_FORCE_PATH_STYLE, help_heading = "AWS")]
    pub force_path_style: bool,
}

// ---------------------------------------------------------------------------
// parse_from_args (public API)
// ---------------------------------------------------------------------------

/// Parse command-line arguments into a `CLIArgs` struct.
///
/// # Example
///
/// ```
/// use s3prune::config::args::parse_from_args;
///
/// let args = vec!["s3prune", "--bucket", "my-bucket", "--prefix", "logs/", "--dryrun"];
/// let cli_args = parse_from_args(args).unwrap();
/// assert!(cli_args.dryrun);
/// ```
pub fn parse_from_args<I, T>(args: I) -> Result<CLIArgs, clap::Error>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    CLIArgs::try_parse_from(args)
}

/// Parse arguments and build a Config in one step.
pub fn build_config_from_args<I, T>(args: I) -> Result<Config, String>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli_args = CLIArgs::try_parse_from(args).map_err(|e| e.to_string())?;
    Config::try_from(cli_args)
}

// ---------------------------------------------------------------------------
// Validation and Config conversion
// ---------------------------------------------------------------------------

impl CLIArgs {
    fn validate(&self) -> Result<(), String> {
        if self.pool == 0 {
            return Err(ERROR_MESSAGE_POOL_SIZE_ZERO.to_string());
        }
        if self.batch_size == 0 {
            return Err(ERROR_MESSAGE_BATCH_SIZE_ZERO.to_string());
        }
        if self.batch_size > MAX_BATCH_SIZE {
            return Err(ERROR_MESSAGE_BATCH_SIZE_TOO_LARGE.to_string());
        }
        if self.initial_backoff_milliseconds == 0 {
            return Err(ERROR_MESSAGE_INITIAL_BACKOFF_ZERO.to_string());
        }
        if self.max_backoff_milliseconds < self.initial_backoff_milliseconds {
            return Err(ERROR_MESSAGE_MAX_BACKOFF_TOO_SMALL.to_string());
        }
        Ok(())
    }

    fn parse_bucket(&self) -> Result<String, String> {
        match self.bucket.as_deref() {
            Some(bucket) if !bucket.is_empty() => Ok(bucket.to_string()),
            _ => Err(ERROR_MESSAGE_BUCKET_REQUIRED.to_string()),
        }
    }

    fn parse_source(&self) -> Result<ObjectSource, String> {
        if let Some(ref file) = self.file {
            return Ok(ObjectSource::File(file.clone()));
        }
        match self.prefix.as_deref() {
            Some(prefix) if !prefix.is_empty() => Ok(ObjectSource::Prefix(prefix.to_string())),
            _ => Err(ERROR_MESSAGE_SOURCE_REQUIRED.to_string()),
        }
    }

    fn build_client_config(&self) -> ClientConfig {
        let credential = if let Some(ref profile) = self.profile {
            S3Credentials::Profile(profile.clone())
        } else {
            S3Credentials::FromEnvironment
        };

        ClientConfig {
            credential,
            region: self.region.clone(),
            endpoint_url: self.endpoint_url.clone(),
            force_path_style: self.force_path_style,
            retry_config: RetryConfig {
                aws_max_attempts: self.aws_max_attempts,
                initial_backoff_milliseconds: self.aws_initial_backoff_milliseconds,
            },
        }
    }

    fn build_tracing_config(&self) -> Option<TracingConfig> {
        let log_level = self.verbosity.log_level()?;

        Some(TracingConfig {
            tracing_level: log_level,
            json_tracing: self.json_tracing,
            aws_sdk_tracing: self.aws_sdk_tracing,
            disable_color_tracing: self.disable_color_tracing,
        })
    }
}

impl TryFrom<CLIArgs> for Config {
    type Error = String;

    fn try_from(args: CLIArgs) -> Result<Self, Self::Error> {
        args.validate()?;

        let bucket = args.parse_bucket()?;
        let source = args.parse_source()?;

        Ok(Config {
            bucket,
            source,
            dry_run: args.dryrun,
            pool_size: args.pool,
            batch_size: args.batch_size,
            output: args.output.clone(),
            show_no_progress: args.show_no_progress,
            throttle_quiet_period_milliseconds: args.throttle_quiet_period_milliseconds,
            backoff_config: BackoffConfig {
                initial_interval_milliseconds: args.initial_backoff_milliseconds,
                max_interval_milliseconds: args.max_backoff_milliseconds,
                multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            },
            target_client_config: Some(args.build_client_config()),
            tracing_config: args.build_tracing_config(),
        })
    }
}
