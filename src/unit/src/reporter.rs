use std::io;
use std::time;

use enum_map::EnumMap;

use crate::*;

// Reporting is best-effort; a closed pipe must not abort the run.
macro_rules! write {
    ($($args:tt)*) => {
        let _ = std::write!($($args)*);
    }
}

macro_rules! writeln {
    ($($args:tt)*) => {
        let _ = std::writeln!($($args)*);
    }
}

/// Running totals over a whole run.
#[derive(Debug)]
struct Tally {
    started: time::Instant,
    counts: EnumMap<Outcome, usize>,
    /// Non-fatal failures recorded by critical tests.
    recorded: usize,
    /// Critical tests which unwound.
    panicked: usize,
    /// Indices of critical results.
    critical: Vec<usize>,
    seen: usize,
}

impl Tally {
    fn new() -> Self {
        Tally {
            started: time::Instant::now(),
            counts: Default::default(),
            recorded: 0,
            panicked: 0,
            critical: Vec::new(),
            seen: 0,
        }
    }

    fn add(&mut self, result: &TestResult) {
        self.counts[result.outcome()] += 1;
        if result.outcome().is_critical() {
            self.critical.push(self.seen);
        }
        if let Some(failure) = result.failure() {
            self.recorded += failure.recorded.len();
            self.panicked += failure.panic.is_some() as usize;
        }
        self.seen += 1;
    }
}

fn outcome_str(outcome: Outcome) -> &'static str {
    match outcome {
        Outcome::Passed => "ok",
        Outcome::Failed => "FAILED",
        Outcome::Xpassed => "XPASSED",
        Outcome::Xfailed => "xfailed",
        Outcome::Ignored => "ignored",
        Outcome::Filtered => "filtered",
    }
}

/// Writes `msg` with every line indented.
fn write_indented(out: &mut impl io::Write, prefix: &str, msg: &str) {
    let mut lines = msg.lines();
    if let Some(first) = lines.next() {
        writeln!(out, "{}{}", prefix, first);
    }
    let pad = " ".repeat(prefix.len());
    for line in lines {
        writeln!(out, "{}{}", pad, line);
    }
}

/// Prints one line per test and, at the end, every failure message.
/// Failures recorded with `record_failure` are listed one by one, apart
/// from the panic message.
#[derive(Debug)]
pub struct StandardTestReporter<W: io::Write + std::fmt::Debug> {
    out: W,
    tally: Tally,
    name_width: usize,
}

impl StandardTestReporter<io::Stdout> {
    pub fn stdout() -> Self {
        StandardTestReporter::with_output(io::stdout())
    }
}

impl<W: io::Write + std::fmt::Debug> StandardTestReporter<W> {
    pub fn with_output(out: W) -> Self {
        StandardTestReporter { out, tally: Tally::new(), name_width: 0 }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn write_failure<D>(&mut self, test: &Test<D>, result: &TestResult) {
        writeln!(self.out, "---- {} ----", test.name());
        if result.outcome() == Outcome::Xpassed {
            writeln!(self.out, "expected to fail, but passed");
            return;
        }
        let failure = match result.failure() {
            Some(failure) => failure,
            None => return,
        };
        if !failure.recorded.is_empty() {
            writeln!(self.out, "recorded failures ({}):",
                failure.recorded.len());
            for (i, msg) in failure.recorded.iter().enumerate() {
                write_indented(&mut self.out, &format!("  {}. ", i + 1), msg);
            }
        }
        if let Some(ref msg) = failure.panic {
            writeln!(self.out, "panicked:");
            write_indented(&mut self.out, "  ", msg);
        }
    }
}

impl<D, W: io::Write + std::fmt::Debug> TestReporter<Test<D>>
    for StandardTestReporter<W>
{
    fn before_all(&mut self, tests: &[Test<D>]) {
        self.name_width = tests.iter()
            .map(|test| test.name().chars().count())
            .max()
            .unwrap_or(0);
        writeln!(self.out, "running {} tests", tests.len());
        self.tally = Tally::new();
    }

    fn before_each(&mut self, test: &Test<D>) {
        write!(self.out, "test {:width$} ... ", test.name(),
            width = self.name_width);
        let _ = self.out.flush();
    }

    fn after_each(&mut self, _test: &Test<D>, result: &TestResult) {
        self.tally.add(result);
        match (result.outcome(), result.recorded().len()) {
            (Outcome::Filtered, _) => {},
            (outcome, 0) => { writeln!(self.out, "{}", outcome_str(outcome)); },
            (outcome, n) => {
                writeln!(self.out, "{} ({} recorded)", outcome_str(outcome), n);
            },
        }
    }

    fn after_all(&mut self, tests: &[Test<D>], results: &[TestResult]) {
        let elapsed = self.tally.started.elapsed().as_secs_f64();
        let critical = std::mem::take(&mut self.tally.critical);

        writeln!(self.out);
        if !critical.is_empty() {
            writeln!(self.out, "failures:");
            writeln!(self.out);
            for &i in critical.iter() {
                self.write_failure(&tests[i], &results[i]);
            }
            writeln!(self.out);
            writeln!(self.out, "failing tests:");
            for &i in critical.iter() {
                writeln!(self.out, "    {}", tests[i].name());
            }
            writeln!(self.out);
        }

        let status = if critical.is_empty() { "ok" } else { "FAILED" };
        write!(self.out, "test result: {}.", status);
        let pairs = [
            ("passed", Outcome::Passed),
            ("failed", Outcome::Failed),
            ("xpassed", Outcome::Xpassed),
            ("xfailed", Outcome::Xfailed),
            ("ignored", Outcome::Ignored),
            ("filtered", Outcome::Filtered),
        ];
        for &(name, outcome) in pairs.iter() {
            write!(self.out, " {} {};", self.tally.counts[outcome], name);
        }
        writeln!(self.out);
        if !critical.is_empty() {
            writeln!(
                self.out,
                "{} recorded failures; {} panics",
                self.tally.recorded,
                self.tally.panicked,
            );
        }
        writeln!(self.out, "finished {} tests in {:.3}s", tests.len(), elapsed);
    }
}
