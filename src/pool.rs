//! Elastic worker pool.
//!
//! A [`WorkerPool`] runs a resizable set of tokio workers that pull boxed
//! [`Task`]s from a shared bounded queue. Growth is immediate; a shrink sends
//! one kill signal per removed worker and takes effect when a worker is next
//! idle, so a dequeued task always runs to completion.
//!
//! Task failures (including panics) are forwarded to the pool's error queue.
//! The queue is closed by [`WorkerPool::wait`] once every worker has exited.

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use anyhow::{Result, anyhow};
use async_channel::{Receiver, Sender, TrySendError};
use async_trait::async_trait;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, trace, warn};

use crate::types::error::S3pruneError;

pub const TASK_QUEUE_CAPACITY: usize = 128;
pub const ERROR_QUEUE_CAPACITY: usize = 128;

/// A unit of work executed by exactly one pool worker.
///
/// The task is consumed by `execute`; it reports its own results through
/// whatever handles it carries and returns only its error.
#[async_trait]
pub trait Task: Send {
    async fn execute(self: Box<Self>) -> Result<()>;
}

pub type BoxedTask = Box<dyn Task>;

pub struct WorkerPool {
    size: Mutex<usize>,
    task_sender: Sender<BoxedTask>,
    task_receiver: Receiver<BoxedTask>,
    error_sender: Sender<anyhow::Error>,
    error_receiver: Receiver<anyhow::Error>,
    kill_sender: Sender<()>,
    kill_receiver: Receiver<()>,
    tracker: TaskTracker,
    next_worker_index: AtomicUsize,
}

impl WorkerPool {
    /// Create a pool and start `initial_size` workers.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(initial_size: usize) -> Result<Self> {
        if initial_size == 0 {
            return Err(anyhow!(S3pruneError::InvalidPoolSize(initial_size)));
        }

        let (task_sender, task_receiver) = async_channel::bounded(TASK_QUEUE_CAPACITY);
        let (error_sender, error_receiver) = async_channel::bounded(ERROR_QUEUE_CAPACITY);
        // Kill signals must never block resize, which runs under the size lock.
        let (kill_sender, kill_receiver) = async_channel::unbounded();

        let pool = WorkerPool {
            size: Mutex::new(0),
            task_sender,
            task_receiver,
            error_sender,
            error_receiver,
            kill_sender,
            kill_receiver,
            tracker: TaskTracker::new(),
            next_worker_index: AtomicUsize::new(0),
        };
        pool.resize(initial_size)?;

        Ok(pool)
    }

    /// Change the target number of workers.
    ///
    /// Calling it with the current size is a no-op.
    pub fn resize(&self, new_size: usize) -> Result<()> {
        if new_size == 0 {
            return Err(anyhow!(S3pruneError::InvalidPoolSize(new_size)));
        }

        let mut size = self.size.lock().unwrap();
        self.resize_locked(&mut size, new_size);

        Ok(())
    }

    /// Remove one worker unless the pool is already at `floor`.
    ///
    /// Returns the new size when the pool shrank. The check and the resize
    /// happen under the same lock.
    pub fn shrink(&self, floor: usize) -> Option<usize> {
        let mut size = self.size.lock().unwrap();
        if *size <= floor.max(1) {
            return None;
        }

        let new_size = *size - 1;
        self.resize_locked(&mut size, new_size);

        Some(new_size)
    }

    fn resize_locked(&self, size: &mut usize, new_size: usize) {
        let current = *size;

        if new_size > current {
            for _ in current..new_size {
                self.spawn_worker();
            }
        } else {
            for _ in new_size..current {
                // The pool owns a receiver, so the unbounded channel is never closed here.
                let _ = self.kill_sender.try_send(());
            }
        }

        if new_size != current {
            debug!(from = current, to = new_size, "worker pool resized.");
        }
        *size = new_size;
    }

    fn spawn_worker(&self) {
        let worker_index = self.next_worker_index.fetch_add(1, Ordering::Relaxed);
        let tasks = self.task_receiver.clone();
        let kill = self.kill_receiver.clone();
        let errors = self.error_sender.clone();

        self.tracker
            .spawn(async move { run_worker(worker_index, tasks, kill, errors).await });
    }

    /// Target number of workers.
    pub fn size(&self) -> usize {
        *self.size.lock().unwrap()
    }

    /// Number of worker tasks that have not exited yet.
    pub fn live_workers(&self) -> usize {
        self.tracker.len()
    }

    /// Enqueue a task, waiting while the queue is full.
    pub async fn submit(&self, task: BoxedTask) -> Result<()> {
        self.task_sender
            .send(task)
            .await
            .map_err(|_| anyhow!(S3pruneError::PoolClosed))
    }

    /// Stop accepting tasks. Queued tasks are still executed.
    pub fn close(&self) {
        self.task_sender.close();
        self.tracker.close();
    }

    /// Wait until every worker has exited, then close the error queue.
    ///
    /// Only returns after [`close`](Self::close) has been called.
    pub async fn wait(&self) {
        self.tracker.wait().await;
        self.error_sender.close();
    }

    pub fn error_receiver(&self) -> Receiver<anyhow::Error> {
        self.error_receiver.clone()
    }
}

async fn run_worker(
    worker_index: usize,
    tasks: Receiver<BoxedTask>,
    kill: Receiver<()>,
    errors: Sender<anyhow::Error>,
) {
    trace!(worker_index, "worker started.");

    loop {
        let task = tokio::select! {
            biased;

            Ok(()) = kill.recv() => {
                debug!(worker_index, "worker received a kill signal.");
                return;
            }
            task = tasks.recv() => match task {
                Ok(task) => task,
                Err(_) => {
                    trace!(worker_index, "task queue closed. worker exits.");
                    return;
                }
            },
        };

        // Run in a separate task so that a panic is captured as a JoinError.
        let result = match tokio::spawn(task.execute()).await {
            Ok(result) => result,
            Err(e) => {
                error!(worker_index, "task panicked: {}", e);
                Err(anyhow!("task panicked: {}", e))
            }
        };

        if let Err(e) = result {
            match errors.try_send(e) {
                Ok(()) => {}
                Err(TrySendError::Full(e)) => {
                    warn!(worker_index, "error queue is full. dropping error: {:#}", e);
                }
                Err(TrySendError::Closed(_)) => {}
            }
        }
    }
}
