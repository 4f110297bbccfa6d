//! Stress tests for sandpile-logging run contexts
//!
//! Sweep workers install and drop run contexts at a high rate on many
//! threads; contexts must never leak between threads or outlive their guard.

use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Instant;

use sandpile_logging::context::RunContextGuard;

/// Test concurrent run context creation and switching across multiple threads
#[test]
fn test_concurrent_run_contexts() {
    const NUM_THREADS: usize = 32;
    const ITERATIONS: usize = 200;

    let barrier = Arc::new(Barrier::new(NUM_THREADS));
    let mut handles = vec![];

    let start = Instant::now();

    for thread_id in 0..NUM_THREADS {
        let barrier = Arc::clone(&barrier);

        let handle = thread::spawn(move || {
            let label = format!("task-{}", thread_id);

            // Wait for all threads to be ready
            barrier.wait();

            for _ in 0..ITERATIONS {
                let _guard = RunContextGuard::for_task(label.clone(), thread_id);

                let ctx = RunContextGuard::current().unwrap();
                assert_eq!(ctx.label, label);
                assert_eq!(ctx.task_index, Some(thread_id));
            }

            assert!(RunContextGuard::current().is_none());
        });

        handles.push(handle);
    }

    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    println!(
        "{} threads x {} context switches in {:?}",
        NUM_THREADS,
        ITERATIONS,
        start.elapsed()
    );
}

/// Test deeply nested guards unwind in order
#[test]
fn test_deep_nesting_unwinds() {
    const DEPTH: usize = 500;

    let mut guards = Vec::with_capacity(DEPTH);
    for i in 0..DEPTH {
        guards.push(RunContextGuard::for_task(format!("level-{}", i), i));
        assert_eq!(RunContextGuard::current().unwrap().task_index, Some(i));
    }

    while let Some(guard) = guards.pop() {
        drop(guard);
        let expected = guards.len().checked_sub(1);
        assert_eq!(
            RunContextGuard::current().and_then(|ctx| ctx.task_index),
            expected
        );
    }

    assert!(RunContextGuard::current().is_none());
}

/// Test that a context set on one thread is invisible on another
#[test]
fn test_context_is_thread_local() {
    let _guard = RunContextGuard::new("main-thread");

    let seen = thread::spawn(RunContextGuard::current_label)
        .join()
        .expect("Thread panicked");

    assert!(seen.is_none());
    assert_eq!(
        RunContextGuard::current_label(),
        Some("main-thread".to_string())
    );
}
