//! Scheduler example
//!
//! Enqueues a batch of keyed and unkeyed tasks, drains them across the
//! worker pool, and prints which worker ran each key.
//!
//! # Environment Variables
//!
//! - `COSTACK_NUM_WORKERS=4` - Worker count (the main thread is worker 0)
//! - `COSTACK_STACK_SIZE=1048576` - Stack bytes per coroutine
//! - `COSTACK_LOG_LEVEL=debug` - Set log level (off, error, warn, info, debug, trace)
//! - `COSTACK_LOG_TIME=1` - Prefix log lines with a timestamp

use costack::{create, init_logging, resume, worker_id, yield_now, CoStatus};
use costack::{kerror, kinfo, Scheduler, SchedulerConfig};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

const KEYS: usize = 8;
const TASKS_PER_KEY: usize = 4;
const FREE_TASKS: usize = 16;

// COSTACK_LOG_LEVEL=info COSTACK_NUM_WORKERS=4 cargo run -p costack-scheduler
fn main() {
    println!("=== costack Scheduler Example ===\n");

    init_logging();

    let config = SchedulerConfig::from_env();
    config.print();

    let mut sched = match Scheduler::new(config) {
        Ok(s) => s,
        Err(e) => {
            kerror!("bad configuration: {}", e);
            std::process::exit(1);
        }
    };

    let placements: Arc<Mutex<BTreeMap<usize, Vec<usize>>>> = Arc::default();

    for key in 0..KEYS {
        for step in 0..TASKS_PER_KEY {
            let placements = placements.clone();
            sched.schedule_keyed(key, move || {
                let w = worker_id().unwrap_or(usize::MAX);
                placements.lock().unwrap().entry(key).or_default().push(w);
                kinfo!("key {} step {} on worker {}", key, step, w);
            });
        }
    }

    // Unkeyed tasks interleave two coroutines of their own.
    for n in 0..FREE_TASKS {
        sched.schedule(move || {
            let a = create(move || {
                for _ in 0..2 {
                    yield_now();
                }
            })
            .unwrap_or_else(|e| panic!("task {}: {}", n, e));
            let b = create(|| yield_now()).unwrap_or_else(|e| panic!("task {}: {}", n, e));

            let mut switches = 0;
            while a.status() != CoStatus::Dead || b.status() != CoStatus::Dead {
                for co in [&a, &b] {
                    if co.status() == CoStatus::Suspended {
                        resume(co);
                        switches += 1;
                    }
                }
            }
            kinfo!("free task {} done after {} resumes", n, switches);
        });
    }

    let start = std::time::Instant::now();
    let report = match sched.run() {
        Ok(r) => r,
        Err(e) => {
            kerror!("run failed: {}", e);
            std::process::exit(1);
        }
    };
    let elapsed = start.elapsed();

    println!("\nPlacement by key (key -> workers):");
    for (key, workers) in placements.lock().unwrap().iter() {
        println!("  {:>2} -> {:?}", key, workers);
    }

    println!("\nCompleted: {}", report.completed);
    println!("Panicked:  {}", report.panicked);
    println!("Abandoned: {}", report.abandoned);
    println!("Per worker: {:?}", report.per_worker);
    println!("Elapsed:   {:?}", elapsed);
    println!("\n=== Example Complete ===");
}
