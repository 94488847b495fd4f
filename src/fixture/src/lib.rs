//! A self-contained validating device and the fixture tests run against
//! it.
//!
//! Each test receives a fresh `TestContext` owning an `ErrorMonitor`, a
//! `ValidationLayer` with the monitor's messenger registered, and a
//! `Device` that reports invalid usage through the layer.

#[cfg(test)]
macro_rules! test_type {
    () => { crate::testing::Test }
}

mod config;
mod context;
mod device;
mod helpers;
mod layer;
mod oneshot;
pub mod testing;

pub use config::*;
pub use context::*;
pub use device::*;
pub use helpers::*;
pub use layer::*;
pub use oneshot::*;

use ash::vk;
use derive_more::Display;

#[derive(Debug, Display)]
#[display(fmt = "{}", _0)]
pub struct Error(anyhow::Error);

impl std::error::Error for Error {}

impl From<vk::Result> for Error {
    fn from(res: vk::Result) -> Self {
        Self(res.into())
    }
}

impl Error {
    /// The API result code, if this error carries one.
    pub fn vk_result(&self) -> Option<vk::Result> {
        self.0.downcast_ref::<vk::Result>().copied()
    }
}

pub type FixtureResult<T> = std::result::Result<T, Error>;

#[cfg(test)]
fn main() {
    env_logger::init();
    testing::run_tests(__collect_tests);
}

unit::collect_tests![
    config,
    context,
    device,
    layer,
    oneshot,
];
