//! Deletion pipeline orchestrator.
//!
//! Wires the scanner to the elastic worker pool and owns the lifecycle of
//! every concurrent part of a run:
//!
//! ```text
//! Scanner → DeleteTask → WorkerPool ─┬→ deleted-batch queue → ResultAggregator
//!                                    ├→ error queue         → ResultAggregator
//!                                    └→ throttle signals    → ThrottleFeedbackLoop → WorkerPool::shrink
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Result, anyhow};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info};

use crate::aggregator::{OutputFile, ResultAggregator};
use crate::config::Config;
use crate::deleter::DeleteTask;
use crate::pool::WorkerPool;
use crate::progress::{DeletionProgress, ProgressReporter, ProgressSnapshot};
use crate::scanner::ObjectScanner;
use crate::storage::Storage;
use crate::throttle::{THROTTLE_SIGNAL_QUEUE_CAPACITY, ThrottleFeedbackLoop};
use crate::types::DeletionSummary;
use crate::types::token::{PipelineCancellationToken, create_pipeline_cancellation_token};

pub const DELETED_BATCH_QUEUE_CAPACITY: usize = 128;
pub const PROGRESS_REFRESH_INTERVAL: Duration = Duration::from_millis(100);

/// The core deletion pipeline orchestrator.
///
/// ## Usage
///
/// ```no_run
/// # async fn example() -> anyhow::Result<()> {
/// use s3prune::{Config, DeletionPipeline, create_scanner, create_storage};
///
/// let config = Config::for_prefix("my-bucket", "logs/2023/");
/// let target = create_storage(&config).await?;
/// let scanner = create_scanner(&config, target.clone()).await?;
///
/// let pipeline = DeletionPipeline::new(config, target);
/// let summary = pipeline.run(scanner).await?;
/// println!("deleted {} of {} objects", summary.completed, summary.seen);
/// # Ok(())
/// # }
/// ```
pub struct DeletionPipeline {
    config: Config,
    target: Storage,
    progress: Arc<DeletionProgress>,
    reporter: Option<Arc<dyn ProgressReporter>>,
    cancellation_token: PipelineCancellationToken,
}

impl DeletionPipeline {
    pub fn new(config: Config, target: Storage) -> Self {
        Self {
            config,
            target,
            progress: Arc::new(DeletionProgress::new()),
            reporter: None,
            cancellation_token: create_pipeline_cancellation_token(),
        }
    }

    /// Report progress every [`PROGRESS_REFRESH_INTERVAL`] while running,
    /// and once more when the run has drained.
    pub fn with_progress_reporter(mut self, reporter: Box<dyn ProgressReporter>) -> Self {
        self.reporter = Some(Arc::from(reporter));
        self
    }

    pub fn progress(&self) -> Arc<DeletionProgress> {
        self.progress.clone()
    }

    /// Delete every batch the scanner yields.
    ///
    /// Per-batch failures are logged and counted in the summary; they do not
    /// fail the run. A scanner failure or an output-file failure stops the
    /// scan loop, lets the pool drain, and is returned.
    pub async fn run(&self, mut scanner: Box<dyn ObjectScanner>) -> Result<DeletionSummary> {
        let started = Instant::now();

        let output = match self.config.output {
            Some(ref path) => Some(OutputFile::open(path).await?),
            None => None,
        };

        let pool = Arc::new(WorkerPool::new(self.config.pool_size as usize)?);
        let (deleted_sender, deleted_receiver) =
            async_channel::bounded(DELETED_BATCH_QUEUE_CAPACITY);
        let (throttle_sender, throttle_receiver) =
            async_channel::bounded(THROTTLE_SIGNAL_QUEUE_CAPACITY);

        let feedback_loop = tokio::spawn(
            ThrottleFeedbackLoop::new(
                pool.clone(),
                throttle_receiver,
                self.config.throttle_quiet_period(),
            )
            .run(),
        );

        let aggregator = tokio::spawn(
            ResultAggregator::new(
                deleted_receiver,
                pool.error_receiver(),
                self.progress.clone(),
                output,
                self.cancellation_token.clone(),
            )
            .aggregate(),
        );

        let ticker_stop = create_pipeline_cancellation_token();
        let ticker = self
            .reporter
            .clone()
            .map(|reporter| self.spawn_ticker(reporter, pool.clone(), started, ticker_stop.clone()));

        info!(
            bucket = self.config.bucket,
            pool_size = self.config.pool_size,
            batch_size = self.config.batch_size,
            dry_run = self.config.dry_run,
            "deletion pipeline has started."
        );

        let batch_size = self.config.batch_size as usize;
        let mut submit_error = None;

        loop {
            let has_batch = tokio::select! {
                biased;
                _ = self.cancellation_token.cancelled() => false,
                has_batch = scanner.scan(batch_size) => has_batch,
            };
            if !has_batch {
                break;
            }

            let objects = scanner.objects().to_vec();
            self.progress.add_seen(objects.len() as u64);

            let task = DeleteTask::new(
                self.target.clone(),
                objects,
                self.config.dry_run,
                self.config.backoff_config,
                deleted_sender.clone(),
                throttle_sender.clone(),
                self.cancellation_token.clone(),
            );

            let submitted = tokio::select! {
                biased;
                _ = self.cancellation_token.cancelled() => break,
                submitted = pool.submit(Box::new(task)) => submitted,
            };
            if let Err(e) = submitted {
                submit_error = Some(e);
                break;
            }
        }

        if self.cancellation_token.is_cancelled() {
            debug!("scan loop stopped by cancellation.");
        }

        drop(deleted_sender);
        drop(throttle_sender);
        pool.close();
        pool.wait().await;

        let shrinks = feedback_loop.await.unwrap_or_else(|e| {
            error!("throttle feedback loop panicked: {}", e);
            0
        });
        let aggregate_result = match aggregator.await {
            Ok(result) => result,
            Err(e) => Err(anyhow!("result aggregator panicked: {}", e)),
        };

        ticker_stop.cancel();
        if let Some(ticker) = ticker {
            let _ = ticker.await;
        }
        if let Some(ref reporter) = self.reporter {
            reporter.finish(&self.snapshot(&pool, started));
        }

        let summary = DeletionSummary {
            seen: self.progress.seen(),
            completed: self.progress.completed(),
            errors: *aggregate_result.as_ref().unwrap_or(&0),
            final_pool_size: pool.size(),
        };

        info!(
            seen = summary.seen,
            completed = summary.completed,
            errors = summary.errors,
            final_pool_size = summary.final_pool_size,
            shrinks = shrinks,
            elapsed_milliseconds = started.elapsed().as_millis() as u64,
            "deletion pipeline has been completed."
        );

        if let Some(e) = scanner.take_err() {
            return Err(e);
        }
        if let Some(e) = submit_error {
            return Err(e);
        }
        aggregate_result?;

        Ok(summary)
    }

    fn snapshot(&self, pool: &WorkerPool, started: Instant) -> ProgressSnapshot {
        ProgressSnapshot {
            seen: self.progress.seen(),
            completed: self.progress.completed(),
            workers: pool.size(),
            elapsed: started.elapsed(),
            dry_run: self.config.dry_run,
        }
    }

    fn spawn_ticker(
        &self,
        reporter: Arc<dyn ProgressReporter>,
        pool: Arc<WorkerPool>,
        started: Instant,
        stop: PipelineCancellationToken,
    ) -> JoinHandle<()> {
        let progress = self.progress.clone();
        let dry_run = self.config.dry_run;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(PROGRESS_REFRESH_INTERVAL);
            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = interval.tick() => {
                        reporter.report(&ProgressSnapshot {
                            seen: progress.seen(),
                            completed: progress.completed(),
                            workers: pool.size(),
                            elapsed: started.elapsed(),
                            dry_run,
                        });
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{
        MockDeleteResponse, MockStorage, init_dummy_tracing_subscriber, make_keys,
        make_test_config,
    };
    use crate::types::error::S3pruneError;
    use async_trait::async_trait;
    use std::collections::{HashSet, VecDeque};
    use std::sync::Mutex;

    /// Yields preset batches, then optionally fails.
    struct VecScanner {
        batches: VecDeque<Vec<String>>,
        current: Vec<String>,
        fail_at_end: Option<String>,
        err: Option<anyhow::Error>,
    }

    impl VecScanner {
        fn new(keys: Vec<String>, batch_size: usize) -> Self {
            VecScanner {
                batches: keys.chunks(batch_size).map(|c| c.to_vec()).collect(),
                current: vec![],
                fail_at_end: None,
                err: None,
            }
        }

        fn failing_at_end(mut self, message: &str) -> Self {
            self.fail_at_end = Some(message.to_string());
            self
        }
    }

    #[async_trait]
    impl ObjectScanner for VecScanner {
        async fn scan(&mut self, _batch_size: usize) -> bool {
            match self.batches.pop_front() {
                Some(batch) => {
                    self.current = batch;
                    true
                }
                None => {
                    self.current.clear();
                    if let Some(message) = self.fail_at_end.take() {
                        self.err = Some(anyhow!(message));
                    }
                    false
                }
            }
        }

        fn objects(&self) -> &[String] {
            &self.current
        }

        fn err(&self) -> Option<&anyhow::Error> {
            self.err.as_ref()
        }

        fn take_err(&mut self) -> Option<anyhow::Error> {
            self.err.take()
        }
    }

    #[derive(Default)]
    struct RecordingReporter {
        finished: Mutex<Vec<ProgressSnapshot>>,
    }

    impl ProgressReporter for Arc<RecordingReporter> {
        fn report(&self, _snapshot: &ProgressSnapshot) {}

        fn finish(&self, snapshot: &ProgressSnapshot) {
            self.finished.lock().unwrap().push(*snapshot);
        }
    }

    #[tokio::test]
    async fn every_key_is_deleted_exactly_once() {
        init_dummy_tracing_subscriber();

        let keys = make_keys("prefix/", 2500);
        let storage = MockStorage::new();
        let pipeline = DeletionPipeline::new(make_test_config(), storage.boxed());

        let summary = pipeline
            .run(Box::new(VecScanner::new(keys.clone(), 1000)))
            .await
            .unwrap();

        assert_eq!(summary.seen, 2500);
        assert_eq!(summary.completed, 2500);
        assert_eq!(summary.errors, 0);
        assert_eq!(summary.final_pool_size, 4);
        assert_eq!(storage.delete_calls(), 3);

        let deleted = storage.deleted_keys();
        assert_eq!(deleted.len(), 2500);
        let unique: HashSet<_> = deleted.into_iter().collect();
        assert_eq!(unique, keys.into_iter().collect::<HashSet<_>>());
    }

    #[tokio::test]
    async fn dry_run_completes_without_delete_calls() {
        let mut config = make_test_config();
        config.dry_run = true;
        let storage = MockStorage::new();
        let reporter = Arc::new(RecordingReporter::default());

        let pipeline = DeletionPipeline::new(config, storage.boxed())
            .with_progress_reporter(Box::new(reporter.clone()));
        let summary = pipeline
            .run(Box::new(VecScanner::new(make_keys("prefix/", 1500), 1000)))
            .await
            .unwrap();

        assert_eq!(storage.delete_calls(), 0);
        assert_eq!(summary.seen, 1500);
        assert_eq!(summary.completed, 1500);

        let finished = reporter.finished.lock().unwrap();
        assert_eq!(finished.len(), 1);
        assert!(finished[0].dry_run);
        assert_eq!(finished[0].completed, 1500);
        assert!(finished[0].to_string().starts_with("[dryrun] delete: 1500 of 1500 objects"));
    }

    #[tokio::test]
    async fn throttling_shrinks_the_pool_and_still_deletes_everything() {
        init_dummy_tracing_subscriber();

        let storage = MockStorage::with_delete_responses(vec![
            MockDeleteResponse::Throttle,
            MockDeleteResponse::Throttle,
            MockDeleteResponse::Throttle,
        ]);
        let pipeline = DeletionPipeline::new(make_test_config(), storage.boxed());

        let summary = pipeline
            .run(Box::new(VecScanner::new(make_keys("prefix/", 100), 10)))
            .await
            .unwrap();

        assert_eq!(summary.completed, 100);
        assert_eq!(summary.errors, 0);
        assert!(summary.final_pool_size < 4);
        assert!(summary.final_pool_size >= 1);
        assert_eq!(storage.delete_calls(), 13);
    }

    #[tokio::test]
    async fn permanent_failures_are_counted_not_fatal() {
        init_dummy_tracing_subscriber();

        let storage = MockStorage::with_delete_responses(vec![
            MockDeleteResponse::Fail("AccessDenied".to_string()),
            MockDeleteResponse::Fail("AccessDenied".to_string()),
        ]);
        let mut config = make_test_config();
        config.pool_size = 1;
        let pipeline = DeletionPipeline::new(config, storage.boxed());

        let summary = pipeline
            .run(Box::new(VecScanner::new(make_keys("prefix/", 50), 10)))
            .await
            .unwrap();

        assert_eq!(summary.seen, 50);
        assert_eq!(summary.completed, 30);
        assert_eq!(summary.errors, 2);
    }

    #[tokio::test]
    async fn partial_failure_counts_surviving_keys() {
        let keys = make_keys("prefix/", 10);
        let storage = MockStorage::with_delete_responses(vec![MockDeleteResponse::PartialFailure(
            vec![keys[0].clone()],
        )]);
        let pipeline = DeletionPipeline::new(make_test_config(), storage.boxed());

        let summary = pipeline
            .run(Box::new(VecScanner::new(keys, 10)))
            .await
            .unwrap();

        assert_eq!(summary.completed, 9);
        assert_eq!(summary.errors, 1);
    }

    #[tokio::test]
    async fn scanner_error_is_returned_after_draining() {
        let storage = MockStorage::new();
        let pipeline = DeletionPipeline::new(make_test_config(), storage.boxed());
        let progress = pipeline.progress();

        let e = pipeline
            .run(Box::new(
                VecScanner::new(make_keys("prefix/", 20), 10).failing_at_end("AccessDenied"),
            ))
            .await
            .unwrap_err();

        assert_eq!(e.to_string(), "AccessDenied");
        assert_eq!(progress.completed(), 20);
        assert_eq!(storage.deleted_keys().len(), 20);
    }

    #[tokio::test]
    async fn output_file_receives_deleted_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deleted.txt");
        let mut config = make_test_config();
        config.output = Some(path.clone());
        config.pool_size = 1;

        let pipeline = DeletionPipeline::new(config, MockStorage::new().boxed());
        pipeline
            .run(Box::new(VecScanner::new(make_keys("prefix/", 3), 10)))
            .await
            .unwrap();

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "delete: prefix/00000\ndelete: prefix/00001\ndelete: prefix/00002\n"
        );
    }

    #[tokio::test]
    async fn unopenable_output_file_fails_before_starting() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = make_test_config();
        config.output = Some(dir.path().join("missing").join("deleted.txt"));
        let storage = MockStorage::new();

        let pipeline = DeletionPipeline::new(config, storage.boxed());
        let result = pipeline
            .run(Box::new(VecScanner::new(make_keys("prefix/", 3), 10)))
            .await;

        assert!(result.is_err());
        assert_eq!(storage.delete_calls(), 0);
    }

    #[cfg(target_os = "linux")]
    #[tokio::test]
    async fn output_write_failure_stops_the_run() {
        init_dummy_tracing_subscriber();

        let mut config = make_test_config();
        config.output = Some("/dev/full".into());
        config.pool_size = 1;
        let storage = MockStorage::with_delete_latency(Duration::from_millis(20));

        let pipeline = DeletionPipeline::new(config, storage.boxed());
        let e = pipeline
            .run(Box::new(VecScanner::new(make_keys("prefix/", 5000), 10)))
            .await
            .unwrap_err();

        assert!(matches!(
            e.downcast_ref::<S3pruneError>(),
            Some(S3pruneError::Io(_))
        ));
        // Queued batches are skipped once the output file has failed.
        assert!(storage.delete_calls() <= 3);
        assert!(storage.deleted_keys().len() <= 30);
    }
}
