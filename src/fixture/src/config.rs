use derivative::Derivative;
use monitor::Severity;

/// Optional device features.
#[derive(Clone, Copy, Debug, Derivative)]
#[derivative(Default)]
pub struct DeviceFeatures {
    #[derivative(Default(value = "true"))]
    pub sampler_anisotropy: bool,
}

#[derive(Clone, Copy, Debug, Derivative)]
#[derivative(Default)]
pub struct DeviceLimits {
    #[derivative(Default(value = "16.0"))]
    pub max_sampler_anisotropy: f32,
    #[derivative(Default(value = "15.0"))]
    pub max_sampler_lod_bias: f32,
    #[derivative(Default(value = "3"))]
    pub queue_family_count: u32,
}

/// Describes the device a test runs against.
#[derive(Clone, Debug, Derivative)]
#[derivative(Default)]
pub struct FixtureConfig {
    pub features: DeviceFeatures,
    pub limits: DeviceLimits,
    /// Run validation on a worker thread, so diagnostics reach the
    /// monitor from a thread other than the test's.
    pub threaded_validation: bool,
    /// Severities forwarded from the layer to the monitor.
    #[derivative(Default(value = "Severity::ERROR | Severity::WARNING"))]
    pub messenger_severity: Severity,
}

impl FixtureConfig {
    /// The default configuration, adjusted by the environment.
    /// `TRIPWIRE_THREADED_VALIDATION=1` turns on threaded validation.
    pub fn from_env() -> Self {
        let threaded_validation = std::env::var("TRIPWIRE_THREADED_VALIDATION")
            .map_or(false, |val| val == "1");
        FixtureConfig {
            threaded_validation,
            ..Default::default()
        }
    }

    pub fn threaded(mut self) -> Self {
        self.threaded_validation = true;
        self
    }

    pub fn without_anisotropy(mut self) -> Self {
        self.features.sampler_anisotropy = false;
        self
    }
}


unit::collect_tests![tests];
