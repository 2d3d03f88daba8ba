/*!
# Overview
s3prune bulk-deletes objects from Amazon S3 (or an S3-compatible service)
with batched `DeleteObjects` requests.

## Features
- **Batched deletion**: up to 1000 keys per request
- **Elastic worker pool**: workers are added or removed while the run is in flight
- **Self-throttling**: every `SlowDown` response is retried with exponential
  backoff and removes one worker from the pool
- **Two key sources**: a newline-delimited key file, or everything under a prefix
- **Dry-run mode** and an append-only log of deleted keys
- **Library-First**: the s3prune CLI is a thin wrapper over this crate

Example usage
=============

```toml
[dependencies]
s3prune = "0.1"
tokio = { version = "1", features = ["full"] }
```

```no_run
use s3prune::config::args::build_config_from_args;
use s3prune::{DeletionPipeline, create_scanner, create_storage};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = vec![
        "s3prune",
        "--bucket",
        "my-bucket",
        "--prefix",
        "logs/2023/",
        "--dryrun",
    ];

    let config = build_config_from_args(args).map_err(anyhow::Error::msg)?;
    let target = create_storage(&config).await?;
    let scanner = create_scanner(&config, target.clone()).await?;

    let summary = DeletionPipeline::new(config, target).run(scanner).await?;
    println!("{} of {} objects, {} errors", summary.completed, summary.seen, summary.errors);

    Ok(())
}
```
*/

#![allow(clippy::collapsible_if)]

pub mod aggregator;
pub mod config;
pub mod deleter;
pub mod pipeline;
pub mod pool;
pub mod progress;
pub mod scanner;
pub mod storage;
pub mod throttle;
pub mod types;

#[cfg(test)]
pub(crate) mod test_utils;

pub use config::Config;
pub use deleter::DeleteTask;
pub use pipeline::DeletionPipeline;
pub use pool::{Task, WorkerPool};
pub use progress::{DeletionProgress, ProgressReporter, ProgressSnapshot};
pub use scanner::{ObjectScanner, create_scanner};
pub use storage::{Storage, StorageTrait, create_storage};
pub use types::DeletionSummary;
pub use types::error::S3pruneError;
pub use types::token::{PipelineCancellationToken, create_pipeline_cancellation_token};
