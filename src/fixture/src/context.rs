use std::sync::Arc;

use ash::vk;
use itertools::Itertools;
use log::trace;
use monitor::{DebugMessenger, ErrorMonitor};

use crate::*;

/// Everything a test needs, built fresh for each test.
#[derive(Debug)]
pub struct TestContext {
    // N.B.: Field order is important
    device: Device,
    layer: Arc<ValidationLayer>,
    messenger_handle: vk::DebugUtilsMessengerEXT,
    // Owns the sink the layer calls into
    _messenger: DebugMessenger,
    monitor: Arc<ErrorMonitor>,
    config: FixtureConfig,
}

impl Drop for TestContext {
    fn drop(&mut self) {
        // Leaks must be reported while the messenger is registered
        self.device.report_leaks();
        self.layer.destroy_messenger(self.messenger_handle);
    }
}

impl TestContext {
    pub fn new(config: FixtureConfig) -> FixtureResult<Self> {
        let monitor = Arc::new(ErrorMonitor::new());
        let messenger = DebugMessenger::new(
            config.messenger_severity,
            Arc::clone(&monitor) as _,
        );
        let layer = Arc::new(ValidationLayer::new());
        // The boxed sink stays put when the messenger moves
        let messenger_handle =
            unsafe { layer.create_messenger(&messenger.create_info())? };
        let device = Device::new(Arc::clone(&layer), &config);
        trace!("created test context: {:?}", config);
        Ok(TestContext {
            device,
            layer,
            messenger_handle,
            _messenger: messenger,
            monitor,
            config,
        })
    }

    pub fn monitor(&self) -> &ErrorMonitor {
        &self.monitor
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn layer(&self) -> &Arc<ValidationLayer> {
        &self.layer
    }

    pub fn config(&self) -> &FixtureConfig {
        &self.config
    }

    /// Ends the test: reports leaked objects and records a failure for
    /// any expectation left unverified or any diagnostic nobody looked
    /// at.
    pub fn teardown(self) {
        self.device.report_leaks();
        let remaining = self.monitor.remaining_fragments();
        if !remaining.is_empty() {
            unit::record_failure(format!(
                "expected diagnostics were never verified: {}",
                remaining.iter().format(", "),
            ));
        }
        let other = self.monitor.other_failure_msgs();
        if !other.is_empty() {
            unit::record_failure(format!(
                "unexpected diagnostics at end of test:\n    {}",
                other.iter().format("\n    "),
            ));
        }
        self.monitor.reset();
    }
}


unit::collect_tests![tests];
