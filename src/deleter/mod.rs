//! Batch deletion task.
//!
//! A [`DeleteTask`] owns one batch of keys and deletes it with a single
//! DeleteObjects request. Throttled requests are retried with exponential
//! backoff and each throttle emits one signal for the feedback loop.
//! A task that finds the pipeline cancelled skips its remote call.

use std::collections::HashSet;

use anyhow::{Context, Result, anyhow};
use async_channel::Sender;
use async_trait::async_trait;
use tracing::{debug, trace, warn};

use crate::config::BackoffConfig;
use crate::pool::Task;
use crate::storage::Storage;
use crate::types::error::{S3pruneError, is_throttling_error};
use crate::types::token::PipelineCancellationToken;
use crate::types::{DeletedBatch, FailedKey};

pub mod backoff;

use backoff::ExponentialBackoff;

pub struct DeleteTask {
    target: Storage,
    objects: Vec<String>,
    dry_run: bool,
    backoff_config: BackoffConfig,
    deleted_sender: Sender<DeletedBatch>,
    throttle_sender: Sender<()>,
    cancellation_token: PipelineCancellationToken,
}

impl DeleteTask {
    pub fn new(
        target: Storage,
        objects: Vec<String>,
        dry_run: bool,
        backoff_config: BackoffConfig,
        deleted_sender: Sender<DeletedBatch>,
        throttle_sender: Sender<()>,
        cancellation_token: PipelineCancellationToken,
    ) -> Self {
        Self {
            target,
            objects,
            dry_run,
            backoff_config,
            deleted_sender,
            throttle_sender,
            cancellation_token,
        }
    }

    fn skip_if_cancelled(&self) -> bool {
        if self.cancellation_token.is_cancelled() {
            debug!(
                object_count = self.objects.len(),
                "pipeline has been cancelled. batch skipped."
            );
            return true;
        }
        false
    }

    async fn report_deleted(&self, keys: Vec<String>) -> Result<()> {
        self.deleted_sender
            .send(DeletedBatch { keys })
            .await
            .context("deleted-batch queue has been closed.")
    }

    fn signal_throttle(&self) {
        // One signal per throttled attempt. A full queue already holds a
        // pending signal for the feedback loop.
        if self.throttle_sender.try_send(()).is_err() {
            trace!("throttle signal dropped.");
        }
    }

    async fn handle_partial_failure(&self, failed: Vec<FailedKey>) -> Result<()> {
        let refused: HashSet<&str> = failed.iter().map(|f| f.key.as_str()).collect();
        let deleted: Vec<String> = self
            .objects
            .iter()
            .filter(|key| !refused.contains(key.as_str()))
            .cloned()
            .collect();

        for failed_key in &failed {
            warn!(
                key = failed_key.key,
                error_code = failed_key.error_code,
                error_message = failed_key.error_message,
                "failed to delete object."
            );
        }

        let deleted_count = deleted.len() as u64;
        if !deleted.is_empty() {
            self.report_deleted(deleted).await?;
        }

        let first = &failed[0];
        Err(anyhow!(S3pruneError::PartialFailure {
            deleted: deleted_count,
            failed: failed.len() as u64,
            first_key: first.key.clone(),
            first_code: first.error_code.clone(),
        }))
    }
}

#[async_trait]
impl Task for DeleteTask {
    async fn execute(self: Box<Self>) -> Result<()> {
        if self.objects.is_empty() || self.skip_if_cancelled() {
            return Ok(());
        }

        if self.dry_run {
            trace!(object_count = self.objects.len(), "[dry-run] batch skipped.");
            return self.report_deleted(self.objects.clone()).await;
        }

        let mut backoff = ExponentialBackoff::new(&self.backoff_config);
        let mut attempt: u64 = 1;

        loop {
            match self.target.delete_objects(&self.objects).await {
                Ok(failed) if failed.is_empty() => {
                    debug!(
                        object_count = self.objects.len(),
                        attempt = attempt,
                        "batch deleted."
                    );
                    return self.report_deleted(self.objects.clone()).await;
                }
                Ok(failed) => return self.handle_partial_failure(failed).await,
                Err(e) if is_throttling_error(&e) => {
                    self.signal_throttle();

                    let delay = backoff.next_delay();
                    debug!(
                        object_count = self.objects.len(),
                        attempt = attempt,
                        delay_milliseconds = delay.as_millis() as u64,
                        "batch throttled. retrying after backoff."
                    );
                    tokio::select! {
                        _ = self.cancellation_token.cancelled() => {}
                        _ = tokio::time::sleep(delay) => {}
                    }
                    if self.skip_if_cancelled() {
                        return Ok(());
                    }
                    attempt += 1;
                }
                Err(e) => {
                    return Err(e.context(format!(
                        "failed to delete a batch of {} objects (first key: {}).",
                        self.objects.len(),
                        self.objects[0]
                    )));
                }
            }
        }
    }
}
