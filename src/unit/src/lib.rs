//! A small test driver for suites whose tests need a shared fixture
//! and may report failures without unwinding.

use enum_map::Enum;

#[cfg(test)]
macro_rules! test_type {
    () => { crate::PlainTest }
}

#[macro_use]
mod macros;

mod config;
mod context;
mod failure;
mod filter;
mod reporter;

pub use config::*;
pub use context::*;
pub use failure::*;
pub use filter::*;
pub use reporter::*;

/// Provides the environment in which tests are run.
pub trait TestContext<T>: std::fmt::Debug {
    /// Called once before any test runs.
    fn configure(&mut self, _config: &RunnerConfig) {}

    fn run(&mut self, test: &T) -> Result<(), TestFailure>;
}

/// What a failed test left behind.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct TestFailure {
    /// Failures recorded with `record_failure`, in order.
    pub recorded: Vec<String>,
    /// The panic message, if the test panicked and output was captured.
    pub panic: Option<String>,
}

impl TestFailure {
    /// All messages joined into one block; recorded failures first.
    pub fn output(&self) -> Option<String> {
        let lines: Vec<&str> = self.recorded.iter()
            .map(|s| &s[..])
            .chain(self.panic.as_deref())
            .collect();
        Some(lines.join("\n")).filter(|s| !s.is_empty())
    }
}

/// The interpretation of the results of an executed test.
#[derive(Clone, Copy, Debug, Enum, Eq, PartialEq)]
pub enum Outcome {
    Passed,
    Failed,
    Xpassed,
    Xfailed,
    Ignored,
    Filtered,
}

impl Outcome {
    pub fn is_critical(&self) -> bool {
        [Outcome::Failed, Outcome::Xpassed].contains(self)
    }
}

/// The output from a test.
#[derive(Clone, Debug)]
pub struct TestResult {
    outcome: Outcome,
    failure: Option<TestFailure>,
}

impl TestResult {
    fn new(outcome: Outcome) -> Self {
        TestResult { outcome, failure: None }
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    /// Only kept when the outcome is critical.
    pub fn failure(&self) -> Option<&TestFailure> {
        self.failure.as_ref()
    }

    pub fn recorded(&self) -> &[String] {
        self.failure.as_ref().map_or(&[], |f| &f.recorded[..])
    }

    pub fn output(&self) -> Option<String> {
        self.failure.as_ref().and_then(TestFailure::output)
    }
}

/// Exports or displays test results.
pub trait TestReporter<T>: std::fmt::Debug {
    /// Called at the beginning of testing.
    fn before_all(&mut self, tests: &[T]);

    /// Called in real time before each selected test is started.
    fn before_each(&mut self, test: &T);

    /// Called in real time after each test is completed or skipped.
    fn after_each(&mut self, test: &T, result: &TestResult);

    /// Called once all tests are finished.
    fn after_all(&mut self, tests: &[T], results: &[TestResult]);
}

#[derive(Clone, Debug, Default)]
pub struct TestAttrs {
    ignore: bool,
    xfail: bool,
    should_err: bool,
}

impl TestAttrs {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn ignore(self) -> Self {
        TestAttrs {
            ignore: true,
            ..self
        }
    }

    pub fn xfail(self) -> Self {
        TestAttrs {
            xfail: true,
            ..self
        }
    }

    /// The test passes only if it fails, whether by panicking or by
    /// recording a failure.
    pub fn should_err(self) -> Self {
        TestAttrs {
            should_err: true,
            ..self
        }
    }

    pub fn build_test<D>(self, name: String, data: D) -> Test<D> {
        Test {
            name,
            attrs: self,
            data,
        }
    }
}

/// The "base" test type used by the driver.
#[derive(Clone, Debug)]
pub struct Test<D> {
    name: String,
    attrs: TestAttrs,
    data: D,
}

impl<D> Test<D> {
    pub fn name(&self) -> &str {
        &self.name[..]
    }

    pub fn ignore(&self) -> bool {
        self.attrs.ignore
    }

    pub fn xfail(&self) -> bool {
        self.attrs.xfail
    }

    pub fn should_err(&self) -> bool {
        self.attrs.should_err
    }

    pub fn data(&self) -> &D {
        &self.data
    }
}

/// Collects tests for execution and allows configuring how tests are
/// processed.
#[derive(Debug)]
pub struct TestDriverBuilder<T> {
    tests: Vec<T>,
    reporter: Option<Box<dyn TestReporter<T>>>,
    config: RunnerConfig,
}

impl<T> Default for TestDriverBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> TestDriverBuilder<T> {
    pub fn new() -> Self {
        TestDriverBuilder {
            tests: Vec::new(),
            reporter: None,
            config: Default::default(),
        }
    }

    /// Creates a builder configured from the process command line.
    pub fn parse_args() -> Self {
        let mut builder = Self::new();
        builder.set_config(RunnerConfig::from_args());
        builder
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub fn set_config(&mut self, config: RunnerConfig) -> &mut Self {
        self.config = config;
        self
    }

    pub fn add_test(&mut self, test: T) -> &mut Self {
        self.tests.push(test);
        self
    }

    pub fn add_tests(&mut self, tests: impl IntoIterator<Item = T>) ->
        &mut Self
    {
        self.tests.extend(tests);
        self
    }

    pub fn set_reporter(&mut self, reporter: Box<dyn TestReporter<T>>) ->
        &mut Self
    {
        self.reporter = Some(reporter);
        self
    }
}

impl<D: 'static> TestDriverBuilder<Test<D>> {
    pub fn build(self, mut context: Box<dyn TestContext<Test<D>>>) ->
        TestDriver<D>
    {
        let reporter = self.reporter
            .unwrap_or_else(|| Box::new(StandardTestReporter::stdout()));
        context.configure(&self.config);
        TestDriver {
            tests: self.tests,
            results: Vec::new(),
            reporter,
            context,
            config: self.config,
        }
    }
}

impl TestDriverBuilder<PlainTest> {
    /// Builds a driver which runs plain `fn()` tests.
    pub fn build_basic(self) -> TestDriver<fn()> {
        self.build(Box::new(PanicTestContext::new(PlainTestInvoker)))
    }
}

/// Executes tests and reports results.
#[derive(Debug)]
pub struct TestDriver<D> {
    tests: Vec<Test<D>>,
    results: Vec<TestResult>,
    reporter: Box<dyn TestReporter<Test<D>>>,
    context: Box<dyn TestContext<Test<D>>>,
    config: RunnerConfig,
}

impl<D> TestDriver<D> {
    fn run_one(&mut self, index: usize) -> TestResult {
        let test = &self.tests[index];
        if !self.config.filter.is_match(test) {
            return TestResult::new(Outcome::Filtered);
        }

        self.reporter.before_each(test);
        if test.ignore() && !self.config.include_ignored {
            return TestResult::new(Outcome::Ignored);
        }

        let outcomes = if test.xfail() {
            [Outcome::Xfailed, Outcome::Xpassed]
        } else {
            [Outcome::Failed, Outcome::Passed]
        };
        let res = self.context.run(test);
        let passed = res.is_ok() ^ test.should_err();
        let outcome = outcomes[passed as usize];
        // Output of an expected failure is noise
        let failure = if outcome.is_critical() { res.err() } else { None };
        TestResult { outcome, failure }
    }

    /// Runs every test and returns true if none failed unexpectedly.
    pub fn run(&mut self) -> bool {
        self.results.clear();
        self.reporter.before_all(&self.tests);
        for i in 0..self.tests.len() {
            let result = self.run_one(i);
            self.reporter.after_each(&self.tests[i], &result);
            self.results.push(result);
        }
        self.reporter.after_all(&self.tests[..], &self.results[..]);
        !self.results.iter().any(|res| res.outcome.is_critical())
    }

    pub fn results(&self) -> &[TestResult] {
        &self.results
    }
}

/// Runs the driver and exits the process with a failing status if any
/// test failed.
pub fn run_and_exit<D>(mut driver: TestDriver<D>) -> ! {
    let passed = driver.run();
    std::process::exit(if passed { 0 } else { 101 })
}

#[cfg(test)]
fn main() {
    let mut builder = TestDriverBuilder::parse_args();
    __collect_tests(&mut builder);
    run_and_exit(builder.build_basic());
}

collect_tests![config, failure, filter];
