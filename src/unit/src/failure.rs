//! Non-fatal test failures.
//!
//! A test may record any number of failures and keep running; the test
//! context fails the test afterwards if any were recorded. Failures are
//! kept per thread, so they must be recorded on the thread running the
//! test. A failure recorded on any other thread while a test is running
//! is logged and counted as lost.

use std::cell::{Cell, RefCell};
use std::sync::atomic::{AtomicUsize, Ordering};

use log::error;

static RUNNING: AtomicUsize = AtomicUsize::new(0);
static LOST: AtomicUsize = AtomicUsize::new(0);

thread_local! {
    static FAILURES: RefCell<Vec<String>> = RefCell::new(Vec::new());
    static DEPTH: Cell<usize> = Cell::new(0);
}

/// Marks the current thread as running a test until dropped.
#[derive(Debug)]
pub(crate) struct TestThread {
    _priv: (),
}

impl TestThread {
    pub(crate) fn enter() -> Self {
        DEPTH.with(|depth| depth.set(depth.get() + 1));
        RUNNING.fetch_add(1, Ordering::SeqCst);
        TestThread { _priv: () }
    }
}

impl Drop for TestThread {
    fn drop(&mut self) {
        RUNNING.fetch_sub(1, Ordering::SeqCst);
        DEPTH.with(|depth| depth.set(depth.get() - 1));
    }
}

/// True if the current thread is running a test.
pub fn on_test_thread() -> bool {
    DEPTH.with(|depth| depth.get() > 0)
}

/// Failures recorded off the test thread while a test was running.
pub fn lost_failure_count() -> usize {
    LOST.load(Ordering::SeqCst)
}

/// Records a failure for the currently running test without unwinding.
pub fn record_failure(msg: impl Into<String>) {
    let msg = msg.into();
    if !on_test_thread() && RUNNING.load(Ordering::SeqCst) > 0 {
        LOST.fetch_add(1, Ordering::SeqCst);
        error!(
            "failure recorded on {:?}, not the test thread; it will be lost: {}",
            std::thread::current().name().unwrap_or("<unnamed>"),
            msg,
        );
    }
    FAILURES.with(|failures| failures.borrow_mut().push(msg));
}

/// Drains every failure recorded on this thread.
pub fn take_failures() -> Vec<String> {
    FAILURES.with(|failures| std::mem::take(&mut *failures.borrow_mut()))
}

pub fn failure_count() -> usize {
    FAILURES.with(|failures| failures.borrow().len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record_and_take() {
        assert_eq!(failure_count(), 0);
        record_failure("first");
        record_failure(String::from("second"));
        assert_eq!(failure_count(), 2);
        assert_eq!(take_failures(), vec!["first", "second"]);
        assert_eq!(failure_count(), 0);
    }

    fn other_threads_do_not_leak() {
        assert!(on_test_thread());
        let lost = lost_failure_count();
        let off_thread = std::thread::spawn(|| {
            record_failure("elsewhere");
            on_test_thread()
        }).join().unwrap();
        assert!(!off_thread);
        assert_eq!(failure_count(), 0);
        assert_eq!(lost_failure_count(), lost + 1);
    }

    fn expect_macro_records() {
        let x = 3;
        crate::expect!(x == 3, "unreachable");
        assert_eq!(failure_count(), 0);
        crate::expect!(x == 4, "x was {}", x);
        crate::expect!(x > 10);
        let failures = take_failures();
        assert_eq!(failures.len(), 2);
        assert!(failures[0].contains("x was 3"), "{:?}", failures);
        assert!(failures[1].contains("x > 10"), "{:?}", failures);
    }

    fn recorded_failure_fails_test() {
        record_failure("this test records a failure and keeps going");
    }

    declare_tests![
        record_and_take,
        other_threads_do_not_leak,
        expect_macro_records,
        (#[should_err] recorded_failure_fails_test),
    ];
}

collect_tests![tests];
