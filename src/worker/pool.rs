//! Fixed-size transform worker pool
//!
//! Each worker is a dedicated OS thread with its own FIFO job queue, so a
//! slow transform never stalls the tokio runtime driving the connections.
//! Jobs are assigned round-robin without looking at how busy a worker is;
//! a busy worker simply queues the job behind its current one.
//!
//! All workers report into one shared results channel. The pool owner
//! consumes that channel and republishes each result.
//!
//! A transform that panics takes its worker down: the panic is logged and
//! the slot is marked dead. Jobs already queued behind the failing one, and
//! any that race in before the slot is seen as dead, are logged and counted
//! as dropped. Later jobs routed to the slot are rejected with
//! `WorkerError::WorkerUnavailable`. Other workers keep running.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use bytes::Bytes;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, error, info, warn};

use crate::protocol::Topic;
use crate::utils::error::{Result, WorkerError};
use crate::worker::transform::Transform;

/// Output of one finished job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransformResult {
    pub topic: Topic,
    pub payload: Bytes,
    /// Index of the worker that produced it.
    pub worker: usize,
}

struct Job {
    topic: Topic,
    payload: Bytes,
}

struct WorkerSlot {
    jobs: Mutex<Option<Sender<Job>>>,
    alive: Arc<AtomicBool>,
    dispatched: AtomicU64,
    dropped: Arc<AtomicU64>,
}

pub struct TransformWorkerPool {
    name: &'static str,
    workers: Vec<WorkerSlot>,
    cursor: AtomicUsize,
    threads: Mutex<Vec<JoinHandle<()>>>,
}

impl TransformWorkerPool {
    /// Start `size` workers all running `transform`.
    pub fn new(
        transform: Arc<dyn Transform>,
        size: usize,
        results: UnboundedSender<TransformResult>,
    ) -> Result<Self> {
        if size == 0 {
            return Err(WorkerError::EmptyPool.into());
        }

        let name = transform.name();
        let mut workers = Vec::with_capacity(size);
        let mut threads = Vec::with_capacity(size);

        for index in 0..size {
            let (tx, rx) = mpsc::channel::<Job>();
            let alive = Arc::new(AtomicBool::new(true));
            let dropped = Arc::new(AtomicU64::new(0));

            let worker = WorkerState {
                index,
                transform: Arc::clone(&transform),
                jobs: rx,
                results: results.clone(),
                alive: Arc::clone(&alive),
                dropped: Arc::clone(&dropped),
            };
            let handle = thread::Builder::new()
                .name(format!("{name}-{index}"))
                .spawn(move || worker.run())?;

            workers.push(WorkerSlot {
                jobs: Mutex::new(Some(tx)),
                alive,
                dispatched: AtomicU64::new(0),
                dropped,
            });
            threads.push(handle);
        }

        info!(transform = name, workers = size, "Worker pool started");

        Ok(Self {
            name,
            workers,
            cursor: AtomicUsize::new(0),
            threads: Mutex::new(threads),
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Hand a job to the worker under the cursor and advance the cursor.
    ///
    /// Returns the index of the chosen worker. Never waits for the job to
    /// run.
    pub fn dispatch(&self, topic: Topic, payload: Bytes) -> std::result::Result<usize, WorkerError> {
        let index = self.advance_cursor();
        let slot = &self.workers[index];
        slot.dispatched.fetch_add(1, Ordering::Relaxed);

        if !slot.alive.load(Ordering::Acquire) {
            return Err(WorkerError::WorkerUnavailable(index));
        }

        let jobs = slot.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(tx) = jobs.as_ref() else {
            return Err(WorkerError::WorkerUnavailable(index));
        };
        tx.send(Job { topic, payload })
            .map_err(|_| WorkerError::WorkerUnavailable(index))?;

        Ok(index)
    }

    /// Jobs assigned to each worker so far, in worker order.
    pub fn jobs_dispatched(&self) -> Vec<u64> {
        self.workers
            .iter()
            .map(|w| w.dispatched.load(Ordering::Relaxed))
            .collect()
    }

    /// Accepted jobs each worker discarded after its transform panicked.
    pub fn jobs_dropped(&self) -> Vec<u64> {
        self.workers
            .iter()
            .map(|w| w.dropped.load(Ordering::Relaxed))
            .collect()
    }

    pub fn is_alive(&self, index: usize) -> bool {
        self.workers
            .get(index)
            .is_some_and(|w| w.alive.load(Ordering::Acquire))
    }

    /// Close every job queue and wait for the workers to finish what they
    /// already accepted. Blocks the calling thread.
    pub fn shutdown(&self) {
        for slot in &self.workers {
            slot.jobs
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
        }

        let threads = std::mem::take(
            &mut *self.threads.lock().unwrap_or_else(PoisonError::into_inner),
        );
        for handle in threads {
            if handle.join().is_err() {
                error!(transform = self.name, "Worker thread exited abnormally");
            }
        }

        debug!(transform = self.name, "Worker pool stopped");
    }

    fn advance_cursor(&self) -> usize {
        let len = self.workers.len();
        match self
            .cursor
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |c| Some((c + 1) % len))
        {
            Ok(prev) | Err(prev) => prev,
        }
    }
}

impl std::fmt::Debug for TransformWorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformWorkerPool")
            .field("name", &self.name)
            .field("size", &self.workers.len())
            .field("cursor", &self.cursor.load(Ordering::Relaxed))
            .finish()
    }
}

struct WorkerState {
    index: usize,
    transform: Arc<dyn Transform>,
    jobs: Receiver<Job>,
    results: UnboundedSender<TransformResult>,
    alive: Arc<AtomicBool>,
    dropped: Arc<AtomicU64>,
}

impl WorkerState {
    fn run(self) {
        let name = self.transform.name();
        let index = self.index;

        while let Ok(job) = self.jobs.recv() {
            let transform = &self.transform;
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| transform.apply(&job.payload)));
            let payload = match outcome {
                Ok(payload) => payload,
                Err(_) => {
                    self.alive.store(false, Ordering::Release);
                    error!(
                        transform = name,
                        worker = index,
                        topic = job.topic,
                        "Transform panicked, worker stopped"
                    );
                    self.drain();
                    return;
                }
            };

            let result = TransformResult {
                topic: job.topic,
                payload: Bytes::from(payload),
                worker: index,
            };
            if self.results.send(result).is_err() {
                debug!(transform = name, worker = index, "Results channel closed");
                break;
            }
        }

        debug!(transform = name, worker = index, "Worker exited");
    }

    /// Discard every job still reaching a dead worker until the pool closes
    /// its queue.
    fn drain(&self) {
        let name = self.transform.name();
        for job in self.jobs.iter() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            warn!(
                transform = name,
                worker = self.index,
                topic = job.topic,
                bytes = job.payload.len(),
                "Dropping job accepted by failed worker"
            );
        }
    }
}
