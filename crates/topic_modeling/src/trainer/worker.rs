//! Worker pool for the parallel expectation phase.
//!
//! Manages worker lifecycle and communication through channels:
//! - Task channel: orchestrator -> workers (document indices)
//! - Output channel: workers -> orchestrator (expectation results)
//! - Shutdown flag: enables early termination when an epoch aborts
//!
//! Both channels are unbounded: the orchestrator enqueues a whole epoch up
//! front and then closes the task side, and workers never block when pushing
//! results. A worker exits once the task channel is empty and closed, or
//! once the shutdown flag is raised.
//!
//! Dropping the pool closes the task channel, raises the shutdown flag, and
//! joins every thread, so a pool never outlives the model and corpus
//! references its workers hold.

use anyhow::{anyhow, Context, Result};
use crossbeam_channel::{unbounded, Receiver, Sender};
use log::debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;

/// Fixed-size thread pool, generic over task and output payloads.
pub(crate) struct WorkerPool<Task, Output> {
    workers: Vec<thread::JoinHandle<()>>,
    task_tx: Option<Sender<Task>>,
    output_rx: Receiver<Output>,
    shutdown: Arc<AtomicBool>,
}

impl<Task, Output> WorkerPool<Task, Output>
where
    Task: Send + 'static,
    Output: Send + 'static,
{
    /// Spawns exactly `num_workers` threads running `worker_fn`.
    ///
    /// Workers pull from a single shared task queue and push to a single
    /// output queue drained by the orchestrator.
    pub(crate) fn new<F>(num_workers: usize, worker_fn: F) -> Result<Self>
    where
        F: Fn(Receiver<Task>, Sender<Output>, Arc<AtomicBool>) + Send + Sync + 'static,
    {
        if num_workers == 0 {
            return Err(anyhow!(
                "cannot create a worker pool with 0 workers; configure at least one"
            ));
        }

        let (task_tx, task_rx) = unbounded();
        let (output_tx, output_rx) = unbounded();
        let shutdown = Arc::new(AtomicBool::new(false));
        let worker_fn = Arc::new(worker_fn);
        let mut workers = Vec::with_capacity(num_workers);

        for worker_id in 0..num_workers {
            let task_rx = task_rx.clone();
            let output_tx = output_tx.clone();
            let shutdown = shutdown.clone();
            let worker_fn = worker_fn.clone();

            let handle = thread::Builder::new()
                .name(format!("em-worker-{}", worker_id))
                .spawn(move || worker_fn(task_rx, output_tx, shutdown))
                .with_context(|| format!("failed to spawn worker thread {}", worker_id))?;
            workers.push(handle);
        }
        debug!("spawned {} expectation workers", num_workers);

        Ok(Self {
            workers,
            task_tx: Some(task_tx),
            output_rx,
            shutdown,
        })
    }

    /// Enqueues one task.
    pub(crate) fn send(&self, task: Task) -> Result<()> {
        let tx = self
            .task_tx
            .as_ref()
            .ok_or_else(|| anyhow!("task queue already closed"))?;
        tx.send(task)
            .map_err(|_| anyhow!("all worker threads have exited"))
    }

    /// Closes the task queue. Workers drain what remains and then exit.
    pub(crate) fn close(&mut self) {
        self.task_tx.take();
    }

    /// Blocks until the next result arrives.
    ///
    /// Fails if every worker exited while results were still owed.
    pub(crate) fn recv(&self) -> Result<Output> {
        self.output_rx
            .recv()
            .map_err(|_| anyhow!("worker threads exited before delivering all results"))
    }

    /// Requests early termination; workers stop before their next task.
    pub(crate) fn trigger_shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }
}

impl<Task, Output> Drop for WorkerPool<Task, Output> {
    fn drop(&mut self) {
        self.shutdown.store(true, Ordering::Relaxed);
        self.task_tx.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}
