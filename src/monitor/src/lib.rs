//! Verifies that code under test emits exactly the diagnostics a test
//! expects.
//!
//! Tests declare expectations on an `ErrorMonitor`, drive the system
//! under test, and then verify. Diagnostics reach the monitor either
//! directly or through the debug_utils callback installed by a
//! `DebugMessenger`.

#[cfg(test)]
macro_rules! test_type {
    () => { unit::PlainTest }
}

mod debug;
mod error;
mod matcher;
mod monitor;
mod severity;
mod sink;

pub use debug::*;
pub use error::*;
pub use matcher::*;
pub use monitor::*;
pub use severity::*;
pub use sink::*;

#[cfg(test)]
fn main() {
    env_logger::init();
    let mut builder = unit::TestDriverBuilder::parse_args();
    __collect_tests(&mut builder);
    unit::run_and_exit(builder.build_basic());
}

unit::collect_tests![
    debug,
    matcher,
    monitor,
    severity,
    sink,
];
