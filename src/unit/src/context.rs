use std::io;
use std::panic::{self, AssertUnwindSafe, RefUnwindSafe};
use std::sync::{Arc, Mutex};

use derive_more::*;

use crate::*;

/// Implementors of this trait are responsible for running individual
/// tests which may be caught panicking. It is automatically implemented
/// for most types that implement `Fn(&D)`. If this type uses internal
/// mutability, it must be marked as `RefUnwindSafe`, as it will be
/// referenced from inside `catch_unwind`.
pub trait PanicTestInvoker<D>: RefUnwindSafe + std::fmt::Debug {
    /// Runs the test.
    fn invoke(&self, test: &Test<D>);
}

impl<D, F> PanicTestInvoker<D> for F
    where F: Fn(&D) + RefUnwindSafe + std::fmt::Debug
{
    fn invoke(&self, test: &Test<D>) {
        self(test.data())
    }
}

/// The test type of the vanilla Rust test runner.
pub type PlainTest = Test<fn()>;

#[derive(Debug, Default)]
pub struct PlainTestInvoker;

impl PanicTestInvoker<fn()> for PlainTestInvoker {
    fn invoke(&self, test: &PlainTest) {
        (test.data())()
    }
}

/// Runs tests where failure is signaled either by panicking or by
/// recording a failure with `record_failure`. This type wraps a "test
/// invocation helper", which is at minimum responsible for running the
/// test, but may optionally do things such as setup/teardown.
///
/// The invocation helper is borrowed immutably inside `catch_unwind`,
/// so stateful setup/teardown must rely on internal mutability.
#[derive(Debug)]
pub struct PanicTestContext<F> {
    inner: F,
    capture: bool,
}

impl<F> PanicTestContext<F> {
    pub fn new(inner: F) -> Self {
        PanicTestContext { inner, capture: true }
    }

    pub fn inner(&self) -> &F {
        &self.inner
    }
}

/// Allows writing to a shared buffer as a byte stream.
#[derive(Clone, Constructor, Debug)]
struct Sink {
    inner: Arc<Mutex<Vec<u8>>>,
}

impl Sink {
    fn take_string(&self) -> String {
        let mut buf = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        String::from_utf8_lossy(&std::mem::take(&mut *buf)).into_owned()
    }
}

impl io::Write for Sink {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        let mut buf = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        io::Write::write(&mut *buf, data)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<D, F> TestContext<Test<D>> for PanicTestContext<F>
where
    D: RefUnwindSafe,
    F: PanicTestInvoker<D>,
{
    fn configure(&mut self, config: &RunnerConfig) {
        self.capture = !config.disable_capture;
    }

    fn run(&mut self, test: &Test<D>) -> Result<(), TestFailure> {
        // Stale failures belong to whoever recorded them outside a test
        let _ = take_failures();

        let output = Sink::new(Arc::new(Mutex::new(Vec::new())));
        let old_hook = if self.capture {
            let sink = output.clone();
            let old = panic::take_hook();
            panic::set_hook(Box::new(move |info| {
                let _ = io::Write::write_fmt(
                    &mut sink.clone(),
                    format_args!("{}\n", info),
                );
            }));
            Some(old)
        } else { None };

        let inner = &self.inner;
        let res = {
            let _thread = TestThread::enter();
            panic::catch_unwind(AssertUnwindSafe(|| inner.invoke(test)))
        };

        if let Some(hook) = old_hook {
            panic::set_hook(hook);
        }

        let recorded = take_failures();
        if res.is_ok() && recorded.is_empty() {
            return Ok(());
        }
        let panic = if res.is_err() {
            Some(output.take_string().trim_end().to_owned())
                .filter(|s| !s.is_empty())
        } else { None };
        Err(TestFailure { recorded, panic })
    }
}
