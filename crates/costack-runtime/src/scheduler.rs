//! Batch scheduler
//!
//! Tasks are enqueued first, then [`Scheduler::run`] drains them across a
//! fixed pool of OS threads. Every worker wraps each task in a coroutine
//! on its own thread-local manager and resumes it once.
//!
//! Worker 0 is the thread calling `run`; workers `1..num_workers` are
//! spawned for the duration of the call. A task may create and resume
//! nested coroutines on its worker; they never leave that thread.

use crate::config::SchedulerConfig;
use crate::tls;
use crate::worker::WorkerPool;

use costack_core::callable::{Callable, LocalCallable};
use costack_core::error::{SchedError, SchedResult};
use costack_core::state::CoStatus;
use costack_core::{kdebug, kerror, kinfo, kwarn};

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Which workers may run a task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Affinity {
    /// First worker to reach it
    Any,
    /// Only this worker index
    Worker(usize),
}

impl Affinity {
    #[inline]
    fn admits(self, worker: usize) -> bool {
        match self {
            Affinity::Any => true,
            Affinity::Worker(w) => w == worker,
        }
    }
}

struct PendingTask {
    task: Callable,
    affinity: Affinity,
}

/// Outcome of one `run`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunReport {
    /// Tasks whose body returned normally
    pub completed: usize,
    /// Tasks whose body panicked
    pub panicked: usize,
    /// Tasks that yielded back to the drain loop without finishing
    pub abandoned: usize,
    /// Tasks taken by each worker index
    pub per_worker: Vec<usize>,
}

impl RunReport {
    /// Total number of tasks taken off the queue
    pub fn total(&self) -> usize {
        self.completed + self.panicked + self.abandoned
    }
}

/// State shared by all workers during a run
struct Shared {
    pending: Mutex<VecDeque<PendingTask>>,
    stack_size: usize,
    debug: bool,
    completed: AtomicUsize,
    panicked: AtomicUsize,
    abandoned: AtomicUsize,
    per_worker: Vec<AtomicUsize>,
    first_error: Mutex<Option<SchedError>>,
}

impl Shared {
    fn lock_pending(&self) -> MutexGuard<'_, VecDeque<PendingTask>> {
        // A panic never happens while the queue is borrowed, but keep
        // draining if it ever does.
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn dequeue(&self, worker: usize) -> Option<Callable> {
        let mut pending = self.lock_pending();
        let pos = pending.iter().position(|p| p.affinity.admits(worker))?;
        let entry = pending.remove(pos)?;
        if self.debug {
            kdebug!(
                "worker {} took entry {} ({:?}), {} left",
                worker,
                pos,
                entry.affinity,
                pending.len()
            );
        }
        Some(entry.task)
    }

    fn record_error(&self, err: SchedError) {
        let mut slot = self.first_error.lock().unwrap_or_else(PoisonError::into_inner);
        slot.get_or_insert(err);
    }

    fn reset_counters(&self) {
        self.completed.store(0, Ordering::Relaxed);
        self.panicked.store(0, Ordering::Relaxed);
        self.abandoned.store(0, Ordering::Relaxed);
        for n in &self.per_worker {
            n.store(0, Ordering::Relaxed);
        }
    }

    fn report(&self) -> RunReport {
        RunReport {
            completed: self.completed.load(Ordering::Acquire),
            panicked: self.panicked.load(Ordering::Acquire),
            abandoned: self.abandoned.load(Ordering::Acquire),
            per_worker: self
                .per_worker
                .iter()
                .map(|n| n.load(Ordering::Acquire))
                .collect(),
        }
    }
}

/// Batch scheduler with keyed affinity
pub struct Scheduler {
    config: SchedulerConfig,
    shared: Arc<Shared>,
}

impl Scheduler {
    /// Create a scheduler; fails if `config` does not validate
    pub fn new(config: SchedulerConfig) -> SchedResult<Self> {
        config.validate()?;

        let shared = Arc::new(Shared {
            pending: Mutex::new(VecDeque::new()),
            stack_size: config.stack_size,
            debug: config.debug_logging,
            completed: AtomicUsize::new(0),
            panicked: AtomicUsize::new(0),
            abandoned: AtomicUsize::new(0),
            per_worker: (0..config.num_workers).map(|_| AtomicUsize::new(0)).collect(),
            first_error: Mutex::new(None),
        });

        Ok(Self { config, shared })
    }

    /// Scheduler configured from the environment
    pub fn from_env() -> SchedResult<Self> {
        Self::new(SchedulerConfig::from_env())
    }

    #[inline]
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    #[inline]
    pub fn num_workers(&self) -> usize {
        self.config.num_workers
    }

    /// Enqueue a task any worker may run
    pub fn schedule<F>(&self, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        self.schedule_callable(Affinity::Any, Callable::new(f));
    }

    /// Enqueue a task pinned to worker `key % num_workers`
    ///
    /// Tasks sharing a key always run on the same worker.
    pub fn schedule_keyed<F>(&self, key: usize, f: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let worker = key % self.config.num_workers;
        self.schedule_callable(Affinity::Worker(worker), Callable::new(f));
    }

    /// Enqueue a prepared call with explicit affinity
    ///
    /// # Panics
    ///
    /// If `affinity` names a worker index outside the pool.
    pub fn schedule_callable(&self, affinity: Affinity, task: Callable) {
        if let Affinity::Worker(w) = affinity {
            assert!(
                w < self.config.num_workers,
                "affinity worker {} out of range (num_workers = {})",
                w,
                self.config.num_workers
            );
        }
        self.shared
            .lock_pending()
            .push_back(PendingTask { task, affinity });
    }

    /// Number of tasks not yet taken
    pub fn pending_len(&self) -> usize {
        self.shared.lock_pending().len()
    }

    /// Remove and return the first entry `worker` may run
    ///
    /// Entries pinned to other workers are skipped, not removed.
    pub fn dequeue(&self, worker: usize) -> Option<Callable> {
        self.shared.dequeue(worker)
    }

    /// Drain the queue on all workers and wait for them
    ///
    /// Returns once every worker found nothing left to take. A task that
    /// panics is logged and counted; the worker moves on. If a stack can't
    /// be allocated the affected worker stops, the others finish, and the
    /// first such error is returned. Tasks pinned to a stopped worker stay
    /// queued.
    pub fn run(&mut self) -> SchedResult<RunReport> {
        let n = self.config.num_workers;
        self.shared.reset_counters();

        kinfo!("scheduler: draining {} tasks on {} workers", self.pending_len(), n);

        let mut pool = WorkerPool::new(1, n - 1);
        let shared = Arc::clone(&self.shared);
        let spawned = pool.start(move |w| drain(&shared, w));

        drain(&self.shared, 0);

        let joined = pool.join();
        let report = self.shared.report();

        kinfo!(
            "scheduler: done, {} completed, {} panicked, {} abandoned",
            report.completed,
            report.panicked,
            report.abandoned
        );

        spawned?;
        joined?;
        let first_error = self
            .shared
            .first_error
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match first_error {
            Some(err) => Err(err),
            None => Ok(report),
        }
    }
}

/// One worker's drain loop
fn drain(shared: &Shared, worker: usize) {
    tls::set_worker_id(worker);
    let manager = tls::manager();
    manager.set_debug_logging(shared.debug);

    while let Some(task) = shared.dequeue(worker) {
        shared.per_worker[worker].fetch_add(1, Ordering::Relaxed);

        let co = match manager.create_local(LocalCallable::from(task), shared.stack_size) {
            Ok(co) => co,
            Err(err) => {
                kerror!("worker {}: cannot create coroutine: {}", worker, err);
                shared.per_worker[worker].fetch_sub(1, Ordering::Relaxed);
                shared.record_error(err);
                break;
            }
        };

        match panic::catch_unwind(AssertUnwindSafe(|| manager.resume(&co))) {
            Ok(()) if co.status() == CoStatus::Dead => {
                shared.completed.fetch_add(1, Ordering::Relaxed);
            }
            Ok(()) => {
                kwarn!(
                    "worker {}: coroutine {} yielded without finishing, abandoning it",
                    worker,
                    co.id()
                );
                manager.delete(co.id());
                shared.abandoned.fetch_add(1, Ordering::Relaxed);
            }
            Err(payload) => {
                kerror!(
                    "worker {}: task in coroutine {} panicked: {}",
                    worker,
                    co.id(),
                    panic_message(&*payload)
                );
                shared.panicked.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    if shared.debug {
        kdebug!("worker {} found no more work", worker);
    }
    tls::clear_worker_id();
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "<non-string panic payload>"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use costack_core::error::{ConfigError, MemoryError};
    use std::sync::atomic::AtomicBool;
    use std::thread;

    fn config(workers: usize) -> SchedulerConfig {
        SchedulerConfig::new()
            .num_workers(workers)
            .stack_size(256 * 1024)
    }

    fn record_worker(log: &Arc<Mutex<Vec<(&'static str, usize)>>>, tag: &'static str) -> impl FnOnce() + Send + 'static {
        let log = log.clone();
        move || {
            let w = tls::current_worker_id().unwrap();
            log.lock().unwrap().push((tag, w));
        }
    }

    #[test]
    fn test_keyed_tasks_stay_on_their_worker() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut sched = Scheduler::new(config(2)).unwrap();

        for _ in 0..2 {
            sched.schedule_keyed(1, record_worker(&log, "f"));
            sched.schedule_keyed(1, record_worker(&log, "g"));
        }
        assert_eq!(sched.pending_len(), 4);

        let report = sched.run().unwrap();

        let log = log.lock().unwrap();
        assert_eq!(log.len(), 4);
        assert!(log.iter().all(|&(_, w)| w == 1));
        assert_eq!(report.completed, 4);
        assert_eq!(report.per_worker, vec![0, 4]);
        assert_eq!(sched.pending_len(), 0);
    }

    #[test]
    fn test_same_key_same_worker() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let mut sched = Scheduler::new(config(3)).unwrap();

        for key in 0..9 {
            sched.schedule_keyed(key, record_worker(&log, if key % 3 == 2 { "two" } else { "other" }));
        }
        sched.run().unwrap();

        let log = log.lock().unwrap();
        assert_eq!(log.len(), 9);
        for &(tag, w) in log.iter() {
            if tag == "two" {
                assert_eq!(w, 2);
            }
        }
    }

    #[test]
    fn test_single_worker_runs_in_submission_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut sched = Scheduler::new(config(1)).unwrap();

        for i in 0..5 {
            let order = order.clone();
            sched.schedule(move || {
                order.lock().unwrap().push((i, thread::current().id()));
            });
        }
        let report = sched.run().unwrap();

        let order = order.lock().unwrap();
        let ids: Vec<_> = order.iter().map(|&(i, _)| i).collect();
        assert_eq!(ids, vec![0, 1, 2, 3, 4]);
        assert!(order.iter().all(|&(_, t)| t == thread::current().id()));
        assert_eq!(report.per_worker, vec![5]);
    }

    #[test]
    fn test_dequeue_skips_foreign_pinned_entries() {
        let sched = Scheduler::new(config(2)).unwrap();
        let hit = Arc::new(Mutex::new(Vec::new()));

        let h = hit.clone();
        sched.schedule_keyed(1, move || h.lock().unwrap().push("pinned"));
        let h = hit.clone();
        sched.schedule(move || h.lock().unwrap().push("any"));

        // Worker 0 passes over the entry pinned to worker 1.
        sched.dequeue(0).unwrap().invoke();
        assert_eq!(*hit.lock().unwrap(), vec!["any"]);
        assert!(sched.dequeue(0).is_none());
        assert_eq!(sched.pending_len(), 1);

        sched.dequeue(1).unwrap().invoke();
        assert_eq!(*hit.lock().unwrap(), vec!["any", "pinned"]);
        assert!(sched.dequeue(1).is_none());
    }

    #[test]
    fn test_any_tasks_spread_and_all_complete() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut sched = Scheduler::new(config(3)).unwrap();

        for _ in 0..64 {
            let count = count.clone();
            sched.schedule(move || {
                count.fetch_add(1, Ordering::SeqCst);
            });
        }
        let report = sched.run().unwrap();

        assert_eq!(count.load(Ordering::SeqCst), 64);
        assert_eq!(report.completed, 64);
        assert_eq!(report.per_worker.iter().sum::<usize>(), 64);
    }

    #[test]
    fn test_task_may_drive_nested_coroutines() {
        let out = Arc::new(Mutex::new(Vec::new()));
        let mut sched = Scheduler::new(config(1)).unwrap();

        let o = out.clone();
        sched.schedule(move || {
            let m = tls::manager();
            let inner_log = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
            let l = inner_log.clone();
            let mm = m.clone();
            let inner = m
                .create(move || {
                    l.borrow_mut().push(1);
                    mm.yield_now();
                    l.borrow_mut().push(2);
                })
                .unwrap();
            m.resume(&inner);
            m.resume(&inner);
            o.lock().unwrap().extend(inner_log.borrow().iter().copied());
        });
        let report = sched.run().unwrap();

        assert_eq!(*out.lock().unwrap(), vec![1, 2]);
        assert_eq!(report.completed, 1);
    }

    #[test]
    fn test_panicking_task_does_not_stop_worker() {
        let after = Arc::new(AtomicBool::new(false));
        let mut sched = Scheduler::new(config(1)).unwrap();

        sched.schedule(|| panic!("bad task"));
        let a = after.clone();
        sched.schedule(move || a.store(true, Ordering::SeqCst));

        let report = sched.run().unwrap();
        assert!(after.load(Ordering::SeqCst));
        assert_eq!(report.panicked, 1);
        assert_eq!(report.completed, 1);
        assert!(tls::manager().is_empty());
    }

    #[test]
    fn test_yielding_task_is_abandoned() {
        let mut sched = Scheduler::new(config(1)).unwrap();
        sched.schedule(|| tls::with_manager(|m| m.yield_now()));
        sched.schedule(|| {});

        let report = sched.run().unwrap();
        assert_eq!(report.abandoned, 1);
        assert_eq!(report.completed, 1);
        assert!(tls::manager().is_empty());
    }

    #[test]
    fn test_run_twice() {
        let count = Arc::new(AtomicUsize::new(0));
        let mut sched = Scheduler::new(config(2)).unwrap();

        for round in 0..2 {
            for _ in 0..4 {
                let count = count.clone();
                sched.schedule(move || {
                    count.fetch_add(1, Ordering::SeqCst);
                });
            }
            let report = sched.run().unwrap();
            assert_eq!(report.total(), 4);
            assert_eq!(count.load(Ordering::SeqCst), 4 * (round + 1));
        }
    }

    #[test]
    fn test_empty_run() {
        let mut sched = Scheduler::new(config(3)).unwrap();
        let report = sched.run().unwrap();
        assert_eq!(report.total(), 0);
        assert_eq!(report.per_worker, vec![0, 0, 0]);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let err = Scheduler::new(config(0)).err().unwrap();
        assert_eq!(
            err,
            SchedError::Config(ConfigError::InvalidValue("num_workers must be > 0"))
        );
        assert!(Scheduler::new(config(1).stack_size(1024)).is_err());
    }

    #[test]
    fn test_stack_failure_is_reported() {
        let mut sched = Scheduler::new(config(1)).unwrap();
        // Force an impossible stack size past validation.
        Arc::get_mut(&mut sched.shared).unwrap().stack_size = usize::MAX;
        sched.schedule(|| {});

        let err = sched.run().unwrap_err();
        assert!(matches!(err, SchedError::Memory(MemoryError::InvalidSize(_))));
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_pinned_to_missing_worker_fails_fast() {
        let sched = Scheduler::new(config(2)).unwrap();
        sched.schedule_callable(Affinity::Worker(2), Callable::new(|| {}));
    }
}
