//! Worker thread management
//!
//! Workers are named OS threads that each drain the scheduler's pending
//! list with their own thread-local coroutine manager.

use costack_core::error::WorkerError;
use costack_core::kdebug;
use std::thread::{self, JoinHandle};

/// Pool of spawned worker threads
pub struct WorkerPool {
    /// (worker index, handle) for every spawned thread
    handles: Vec<(usize, JoinHandle<()>)>,

    /// Index given to the first spawned worker
    first_id: usize,

    /// Number of threads to spawn
    count: usize,
}

impl WorkerPool {
    /// Pool spawning workers `first_id .. first_id + count`
    pub fn new(first_id: usize, count: usize) -> Self {
        Self {
            handles: Vec::with_capacity(count),
            first_id,
            count,
        }
    }

    /// Spawn all worker threads, each running `worker_fn(index)`
    ///
    /// Stops at the first thread that fails to spawn; workers already
    /// started keep running and must still be joined.
    pub fn start<F>(&mut self, worker_fn: F) -> Result<(), WorkerError>
    where
        F: Fn(usize) + Send + Clone + 'static,
    {
        for i in self.first_id..self.first_id + self.count {
            let worker_fn = worker_fn.clone();
            let handle = thread::Builder::new()
                .name(format!("costack-worker-{}", i))
                .spawn(move || worker_fn(i))
                .map_err(|_| WorkerError::SpawnFailed(i))?;

            kdebug!("spawned worker {}", i);
            self.handles.push((i, handle));
        }
        Ok(())
    }

    /// Wait for all workers to finish
    ///
    /// Every thread is joined even if one of them panicked; the first
    /// panicking worker is reported.
    pub fn join(self) -> Result<(), WorkerError> {
        let mut result = Ok(());
        for (i, handle) in self.handles {
            if handle.join().is_err() && result.is_ok() {
                result = Err(WorkerError::Panicked(i));
            }
        }
        result
    }

    /// Number of workers this pool spawns
    #[inline]
    pub fn num_workers(&self) -> usize {
        self.count
    }

    /// Number of threads actually started
    #[inline]
    pub fn started(&self) -> usize {
        self.handles.len()
    }
}
