use std::sync::Arc;
use std::time::Duration;

use async_channel::Receiver;
use tracing::{debug, info};

use crate::pool::WorkerPool;

/// Capacity of the throttle signal queue.
pub const THROTTLE_SIGNAL_QUEUE_CAPACITY: usize = 128;

/// The pool never shrinks below this many workers.
pub const MIN_POOL_SIZE: usize = 1;

/// Shrinks the worker pool in response to throttle signals.
///
/// Each signal removes one worker (floor [`MIN_POOL_SIZE`]). After a shrink
/// the loop sleeps for the quiet period and then discards the signals that
/// piled up meanwhile, so a burst from many workers throttled at once costs
/// a single worker. The pool is never grown back.
pub struct ThrottleFeedbackLoop {
    pool: Arc<WorkerPool>,
    signals: Receiver<()>,
    quiet_period: Duration,
}

impl ThrottleFeedbackLoop {
    pub fn new(pool: Arc<WorkerPool>, signals: Receiver<()>, quiet_period: Duration) -> Self {
        Self {
            pool,
            signals,
            quiet_period,
        }
    }

    /// Run until every signal sender is dropped. Returns the number of shrinks.
    pub async fn run(self) -> usize {
        let mut shrinks = 0;

        while self.signals.recv().await.is_ok() {
            match self.pool.shrink(MIN_POOL_SIZE) {
                Some(new_size) => {
                    shrinks += 1;
                    info!(pool_size = new_size, "throttled by S3. reduced worker pool size.");
                }
                None => {
                    debug!("throttled by S3. worker pool is already at its minimum size.");
                }
            }

            tokio::time::sleep(self.quiet_period).await;

            let mut discarded = 0;
            while self.signals.try_recv().is_ok() {
                discarded += 1;
            }
            if discarded > 0 {
                debug!(discarded, "discarded throttle signals received during quiet period.");
            }
        }

        debug!(shrinks, "throttle feedback loop has been completed.");
        shrinks
    }
}
