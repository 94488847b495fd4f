use log::{debug, info};
use monitor::Severity;

use crate::*;

/// Builds a single object from known-valid defaults. Implementors
/// destroy whatever they created when dropped.
pub trait OneshotHelper<'a>: Sized {
    fn new(ctx: &'a TestContext) -> Self;

    /// Creates the object under test.
    fn create(&mut self) -> FixtureResult<()>;
}

/// Builds an object with one deliberate mutation and checks the
/// diagnostics it produces.
///
/// Each fragment in `errors` must be reported once, at a severity in
/// `mask`. If `positive` is set or `errors` is empty, no diagnostic in
/// `mask` may be reported at all. The object is destroyed before this
/// returns, including when `mutate` panics. Returns whether the check
/// passed; failures are recorded against the running test.
pub fn oneshot<'a, H, F>(
    ctx: &'a TestContext,
    mutate: F,
    mask: Severity,
    errors: &[&str],
    positive: bool,
) -> bool
where
    H: OneshotHelper<'a>,
    F: FnOnce(&mut H),
{
    let monitor = ctx.monitor();
    let mut helper = H::new(ctx);
    mutate(&mut helper);

    let positive = positive || errors.is_empty();
    if positive {
        monitor.expect_success(mask);
    } else {
        monitor.set_desired_failure_msgs(mask, errors.iter().copied());
    }

    if let Err(e) = helper.create() {
        debug!("oneshot create failed: {}", e);
    }

    if positive {
        monitor.verify_not_found()
    } else {
        monitor.verify_found()
    }
}

/// One row of a oneshot table.
pub struct Case<H> {
    pub mutate: fn(&mut H),
    pub errors: Vec<&'static str>,
    pub positive: bool,
}

impl<H> std::fmt::Debug for Case<H> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Case")
            .field("errors", &self.errors)
            .field("positive", &self.positive)
            .finish()
    }
}

impl<H> Case<H> {
    pub fn new(mutate: fn(&mut H), errors: &[&'static str]) -> Self {
        Case { mutate, errors: errors.to_vec(), positive: false }
    }

    /// A mutation which must not produce any diagnostic.
    pub fn positive(mutate: fn(&mut H)) -> Self {
        Case { mutate, errors: Vec::new(), positive: true }
    }
}

/// Runs every case through `oneshot` in order and returns how many
/// passed. A failing case records which row it was.
pub fn oneshot_table<'a, H>(
    ctx: &'a TestContext,
    mask: Severity,
    cases: &[Case<H>],
) -> usize
where
    H: OneshotHelper<'a>,
{
    let mut passed = 0;
    for (i, case) in cases.iter().enumerate() {
        let ok = oneshot(ctx, case.mutate, mask, &case.errors, case.positive);
        if ok {
            passed += 1;
        } else {
            unit::record_failure(format!("oneshot case {} failed: {:?}", i, case));
        }
    }
    info!("{}/{} oneshot cases passed", passed, cases.len());
    passed
}


unit::collect_tests![tests];
