use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use async_channel::Receiver;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tracing::{error, trace};

use crate::progress::DeletionProgress;
use crate::types::DeletedBatch;
use crate::types::error::S3pruneError;
use crate::types::token::PipelineCancellationToken;

/// Append-only log of deleted keys, one `delete: <key>` line per object.
pub struct OutputFile {
    writer: BufWriter<File>,
}

impl OutputFile {
    pub async fn open(path: &Path) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .with_context(|| format!("failed to open output file: {}", path.display()))?;

        Ok(OutputFile {
            writer: BufWriter::new(file),
        })
    }

    /// Write the batch and flush it.
    pub async fn write_batch(&mut self, batch: &DeletedBatch) -> std::io::Result<()> {
        for key in &batch.keys {
            self.writer.write_all(b"delete: ").await?;
            self.writer.write_all(key.as_bytes()).await?;
            self.writer.write_all(b"\n").await?;
        }
        self.writer.flush().await
    }
}

/// Consumes deleted batches and pool errors while the pipeline runs.
///
/// Ends when both queues are closed and drained. A failed write to the
/// output file is fatal: the pipeline token is cancelled and the error is
/// returned.
pub struct ResultAggregator {
    deleted: Receiver<DeletedBatch>,
    errors: Receiver<anyhow::Error>,
    progress: Arc<DeletionProgress>,
    output: Option<OutputFile>,
    cancellation_token: PipelineCancellationToken,
}

impl ResultAggregator {
    pub fn new(
        deleted: Receiver<DeletedBatch>,
        errors: Receiver<anyhow::Error>,
        progress: Arc<DeletionProgress>,
        output: Option<OutputFile>,
        cancellation_token: PipelineCancellationToken,
    ) -> Self {
        Self {
            deleted,
            errors,
            progress,
            output,
            cancellation_token,
        }
    }

    /// Returns the number of pool errors observed.
    pub async fn aggregate(mut self) -> Result<u64> {
        let mut error_count: u64 = 0;
        let mut deleted_open = true;
        let mut errors_open = true;

        while deleted_open || errors_open {
            tokio::select! {
                batch = self.deleted.recv(), if deleted_open => match batch {
                    Ok(batch) => self.record_batch(batch).await?,
                    Err(_) => deleted_open = false,
                },
                e = self.errors.recv(), if errors_open => match e {
                    Ok(e) => {
                        error_count += 1;
                        error!("{:#}", e);
                    }
                    Err(_) => errors_open = false,
                },
            }
        }

        trace!(error_count, "result aggregator has been completed.");
        Ok(error_count)
    }

    async fn record_batch(&mut self, batch: DeletedBatch) -> Result<()> {
        self.progress.add_completed(batch.len() as u64);

        if let Some(ref mut output) = self.output {
            if let Err(e) = output.write_batch(&batch).await {
                self.cancellation_token.cancel();
                return Err(anyhow!(S3pruneError::Io(e.to_string()))
                    .context("failed to write to output file."));
            }
        }

        Ok(())
    }
}
