//! Basic coroutine example
//!
//! Two coroutines on the main thread take turns through explicit
//! resume/yield, and one drives a nested generator.
//!
//! # Environment Variables
//!
//! - `COSTACK_FLUSH_EPRINT=1` - Flush debug output immediately (useful for crash debugging)
//! - `COSTACK_LOG_LEVEL=debug` - Set log level (off, error, warn, info, debug, trace)
//! - `COSTACK_DEBUG=1` - Log coroutine creation and teardown

use costack::{create, current_id, init_logging, manager, resume, yield_now, CoStatus};
use costack::{kdebug, kinfo};
use std::cell::Cell;
use std::rc::Rc;

// COSTACK_LOG_LEVEL=debug COSTACK_DEBUG=1 cargo run -p costack-basic
fn main() {
    println!("=== costack Basic Example ===\n");

    init_logging();

    let ping = create(|| {
        for i in 0..3 {
            kinfo!("ping {} (coroutine {})", i, current_id());
            yield_now();
        }
    })
    .unwrap_or_else(|e| panic!("create ping: {}", e));

    let pong = create(|| {
        for i in 0..3 {
            kinfo!("pong {} (coroutine {})", i, current_id());
            yield_now();
        }
    })
    .unwrap_or_else(|e| panic!("create pong: {}", e));

    println!("Created coroutines {} and {}", ping.id(), pong.id());

    while ping.status() != CoStatus::Dead || pong.status() != CoStatus::Dead {
        for co in [&ping, &pong] {
            if co.status() == CoStatus::Suspended {
                resume(co);
            }
        }
    }

    // A coroutine that resumes a generator of squares on its own stack.
    let sum = Rc::new(Cell::new(0u64));
    let s = sum.clone();
    let consumer = create(move || {
        let value = Rc::new(Cell::new(0u64));
        let v = value.clone();
        let squares = create(move || {
            for n in 1..=5u64 {
                v.set(n * n);
                yield_now();
            }
        })
        .unwrap_or_else(|e| panic!("create squares: {}", e));

        loop {
            resume(&squares);
            if squares.status() == CoStatus::Dead {
                break;
            }
            kdebug!("got {}", value.get());
            s.set(s.get() + value.get());
        }
    })
    .unwrap_or_else(|e| panic!("create consumer: {}", e));

    resume(&consumer);

    println!("\nSum of squares 1..=5: {}", sum.get());
    println!("Live coroutines left: {}", manager().len());
    println!("\n=== Example Complete ===");
}
