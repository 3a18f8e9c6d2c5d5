//! Background execution for fire-and-forget sends.

use async_trait::async_trait;
use futures::future::BoxFuture;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// A unit of background work.
pub type Task = BoxFuture<'static, ()>;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitError {
    #[error("worker queue is full")]
    QueueFull,

    #[error("executor is shut down")]
    Closed,
}

/// Runs submitted tasks.
#[async_trait]
pub trait TaskExecutor: Send + Sync {
    /// Hand a task over for execution.
    async fn submit(&self, task: Task) -> Result<(), SubmitError>;

    /// Stop accepting tasks and wait for accepted ones to finish.
    async fn shutdown(&self);
}

/// Fixed set of worker tasks draining a bounded queue.
///
/// `submit` never waits for queue space: a full queue rejects the task.
/// Tasks run in no particular order relative to each other.
pub struct WorkerPool {
    sender: Mutex<Option<mpsc::Sender<Task>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerPool {
    /// Spawn `size` workers on the current tokio runtime.
    pub fn new(size: usize, queue_capacity: usize) -> Self {
        let size = size.max(1);
        let (sender, receiver) = mpsc::channel::<Task>(queue_capacity.max(1));
        let receiver = Arc::new(Mutex::new(receiver));

        let workers = (0..size)
            .map(|id| tokio::spawn(worker_loop(id, receiver.clone())))
            .collect();

        info!("Worker pool started ({} workers, queue {})", size, queue_capacity);
        Self {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(workers),
        }
    }
}

async fn worker_loop(id: usize, receiver: Arc<Mutex<mpsc::Receiver<Task>>>) {
    loop {
        let task = receiver.lock().await.recv().await;
        let Some(task) = task else {
            break;
        };
        // Run on its own task so a panic does not take the worker down.
        if let Err(e) = tokio::spawn(task).await {
            warn!(worker = id, "Background task failed: {}", e);
        }
    }
    debug!(worker = id, "Worker stopped");
}

#[async_trait]
impl TaskExecutor for WorkerPool {
    async fn submit(&self, task: Task) -> Result<(), SubmitError> {
        let sender = self.sender.lock().await;
        let sender = sender.as_ref().ok_or(SubmitError::Closed)?;
        sender.try_send(task).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SubmitError::QueueFull,
            mpsc::error::TrySendError::Closed(_) => SubmitError::Closed,
        })
    }

    async fn shutdown(&self) {
        // Dropping the sender lets workers drain the queue and exit.
        self.sender.lock().await.take();

        let workers: Vec<_> = self.workers.lock().await.drain(..).collect();
        for worker in workers {
            if let Err(e) = worker.await {
                warn!("Worker exited abnormally: {}", e);
            }
        }
        info!("Worker pool stopped");
    }
}

/// Runs each task to completion inside `submit`. Useful in tests to make
/// background side effects deterministic.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineExecutor;

#[async_trait]
impl TaskExecutor for InlineExecutor {
    async fn submit(&self, task: Task) -> Result<(), SubmitError> {
        task.await;
        Ok(())
    }

    async fn shutdown(&self) {}
}
