//! Serial write queue (spec §4.1): every memory-mutating operation runs through a
//! single FIFO so newline-delimited JSON corruption and races on temp-file rename
//! are structurally impossible. Generalizes the teacher's "one `Mutex<Connection>`
//! per writer" discipline (`storage/sqlite.rs`) from a single SQLite writer to a
//! task queue spanning the working log, the short-term store, and the tone cache.

use std::future::Future;
use std::pin::Pin;
use tokio::sync::{mpsc, oneshot, Mutex};

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type Job = Box<dyn FnOnce() -> BoxFuture<()> + Send>;

/// A FIFO serializer for async tasks. Failures inside a task do not poison the
/// queue — the next enqueued task still runs.
pub struct SerialWriteQueue {
    tx: mpsc::UnboundedSender<Job>,
}

impl SerialWriteQueue {
    pub fn new() -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                job().await;
            }
        });
        Self { tx }
    }

    /// Enqueue `task`, returning its result once it has run in FIFO order relative
    /// to every other `enqueue` call issued so far.
    pub async fn enqueue<F, T>(&self, task: F) -> T
    where
        F: FnOnce() -> BoxFuture<T> + Send + 'static,
        T: Send + 'static,
    {
        let (result_tx, result_rx) = oneshot::channel();
        let job: Job = Box::new(move || {
            Box::pin(async move {
                let result = task().await;
                let _ = result_tx.send(result);
            })
        });
        // An unbounded channel send only fails if the consumer task has been
        // dropped, which only happens if this queue itself was dropped.
        self.tx
            .send(job)
            .expect("serial write queue consumer task is alive for the queue's lifetime");
        result_rx
            .await
            .expect("serial write queue never drops a job without completing it")
    }
}

impl Default for SerialWriteQueue {
    fn default() -> Self {
        Self::new()
    }
}
