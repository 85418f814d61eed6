//! A bounded worker pool draining a FIFO task queue.
//!
//! The pool owns a fixed set of workers created at construction; there are
//! no priorities, no work stealing and no affinity. Workers block on a
//! condition variable signaled by [`WorkerPool::submit`]; on shutdown they
//! drain the remaining queue and exit.

use std::{
    collections::VecDeque,
    panic::{catch_unwind, AssertUnwindSafe},
    sync::Arc,
    thread::JoinHandle,
};

use parking_lot::{Condvar, Mutex};
use tracing::debug;

use crate::{
    error::ErrorState,
    task::{Completer, Task},
};

type Job = Box<dyn FnOnce() + Send + 'static>;

struct QueueState {
    jobs: VecDeque<Job>,
    shutdown: bool,
}

struct PoolShared {
    queue: Mutex<QueueState>,
    available: Condvar,
}

/// A fixed-width thread pool executing type-erased units of work in FIFO
/// order.
///
/// Submitting returns a [`Task`] fulfilled with the work's result on some
/// worker thread. Work that panics fails its task with a
/// [`ErrorKind::Computation`] error; submission after shutdown fails with
/// [`ErrorKind::Resource`].
///
/// Dropping the pool shuts it down and joins every worker, after the
/// queued work has drained.
///
/// [`ErrorKind::Computation`]: crate::error::ErrorKind::Computation
/// [`ErrorKind::Resource`]: crate::error::ErrorKind::Resource
pub struct WorkerPool {
    shared: Arc<PoolShared>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl Default for WorkerPool {
    fn default() -> Self { Self::new() }
}

impl WorkerPool {
    /// Creates a pool sized to the machine's available parallelism.
    #[must_use]
    pub fn new() -> Self {
        Self::with_threads(
            std::thread::available_parallelism().map_or(1, usize::from),
        )
    }

    /// Creates a pool with a fixed number of workers (at least one).
    ///
    /// # Panics
    ///
    /// Panics if the operating system refuses to spawn a worker thread.
    #[must_use]
    pub fn with_threads(threads: usize) -> Self {
        let count = threads.max(1);

        let shared = Arc::new(PoolShared {
            queue: Mutex::new(QueueState {
                jobs: VecDeque::new(),
                shutdown: false,
            }),
            available: Condvar::new(),
        });

        let workers = (0..count)
            .map(|index| {
                let shared = shared.clone();
                std::thread::Builder::new()
                    .name(format!("fathom-worker-{index}"))
                    .spawn(move || worker_loop(&shared))
                    .expect("failed to spawn worker thread")
            })
            .collect();

        debug!(threads = count, "worker pool started");

        Self { shared, workers: Mutex::new(workers) }
    }

    /// Number of worker threads.
    #[must_use]
    pub fn thread_count(&self) -> usize { self.workers.lock().len() }

    /// Enqueues a unit of work and returns the task of its result.
    ///
    /// # Errors
    ///
    /// Returns a [`ErrorKind::Resource`] error if the pool is shutting
    /// down.
    ///
    /// [`ErrorKind::Resource`]: crate::error::ErrorKind::Resource
    pub fn submit<R, F>(&self, work: F) -> Result<Task<R>, ErrorState>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        let (task, completer) = Task::pending();
        let job: Job = Box::new(move || run_job(work, completer));

        {
            let mut queue = self.shared.queue.lock();
            if queue.shutdown {
                return Err(ErrorState::resource(
                    "cannot submit work to a worker pool that is shut down",
                ));
            }
            queue.jobs.push_back(job);
        }

        self.shared.available.notify_one();
        Ok(task)
    }

    /// Stops accepting work, drains the queue and joins every worker.
    ///
    /// Idempotent; also invoked by `Drop`.
    pub fn shutdown(&self) {
        {
            let mut queue = self.shared.queue.lock();
            if queue.shutdown {
                return;
            }
            queue.shutdown = true;
        }
        self.shared.available.notify_all();

        let workers = std::mem::take(&mut *self.workers.lock());
        for worker in workers {
            let _ = worker.join();
        }

        debug!("worker pool shut down");
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) { self.shutdown(); }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("threads", &self.thread_count())
            .finish_non_exhaustive()
    }
}

fn worker_loop(shared: &PoolShared) {
    loop {
        let job = {
            let mut queue = shared.queue.lock();
            loop {
                if let Some(job) = queue.jobs.pop_front() {
                    break job;
                }
                if queue.shutdown {
                    return;
                }
                shared.available.wait(&mut queue);
            }
        };

        job();
    }
}

fn run_job<R>(work: impl FnOnce() -> R, completer: Completer<R>) {
    match catch_unwind(AssertUnwindSafe(work)) {
        Ok(value) => completer.complete(value),
        Err(payload) => {
            completer.fail(ErrorState::from_panic(payload.as_ref()));
        }
    }
}
