use std::fmt;

use ash::vk;
use bitflags::bitflags;
use itertools::Itertools;

bitflags! {
    /// The severity of a diagnostic, or a mask of severities.
    pub struct Severity: u32 {
        const VERBOSE = 0x01;
        const INFO = 0x02;
        const WARNING = 0x04;
        /// A warning about performance rather than correctness.
        const PERFORMANCE_WARNING = 0x08;
        const ERROR = 0x10;
    }
}

impl Default for Severity {
    fn default() -> Self {
        Severity::ERROR
    }
}

impl Severity {
    /// Classifies a debug_utils message. Performance warnings are
    /// distinguished by message type.
    pub fn from_vk(
        severity: vk::DebugUtilsMessageSeverityFlagsEXT,
        types: vk::DebugUtilsMessageTypeFlagsEXT,
    ) -> Self {
        use vk::DebugUtilsMessageSeverityFlagsEXT as Flags;
        let mut res = Severity::empty();
        if severity.contains(Flags::ERROR) {
            res |= Severity::ERROR;
        }
        if severity.contains(Flags::WARNING) {
            if types.contains(vk::DebugUtilsMessageTypeFlagsEXT::PERFORMANCE) {
                res |= Severity::PERFORMANCE_WARNING;
            } else {
                res |= Severity::WARNING;
            }
        }
        if severity.contains(Flags::INFO) {
            res |= Severity::INFO;
        }
        if severity.contains(Flags::VERBOSE) {
            res |= Severity::VERBOSE;
        }
        res
    }

    /// The debug_utils severity bits needed to receive every message in
    /// this mask.
    pub fn vk_severity(self) -> vk::DebugUtilsMessageSeverityFlagsEXT {
        use vk::DebugUtilsMessageSeverityFlagsEXT as Flags;
        let mut res = Flags::empty();
        if self.contains(Severity::ERROR) {
            res |= Flags::ERROR;
        }
        if self.intersects(Severity::WARNING | Severity::PERFORMANCE_WARNING) {
            res |= Flags::WARNING;
        }
        if self.contains(Severity::INFO) {
            res |= Flags::INFO;
        }
        if self.contains(Severity::VERBOSE) {
            res |= Flags::VERBOSE;
        }
        res
    }

    /// The debug_utils message types needed to receive every message in
    /// this mask.
    pub fn vk_types(self) -> vk::DebugUtilsMessageTypeFlagsEXT {
        use vk::DebugUtilsMessageTypeFlagsEXT as Flags;
        let mut res = Flags::GENERAL | Flags::VALIDATION;
        if self.contains(Severity::PERFORMANCE_WARNING) {
            res |= Flags::PERFORMANCE;
        }
        res
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let pairs = [
            (Severity::VERBOSE, "VERBOSE"),
            (Severity::INFO, "INFO"),
            (Severity::WARNING, "WARNING"),
            (Severity::PERFORMANCE_WARNING, "PERFORMANCE_WARNING"),
            (Severity::ERROR, "ERROR"),
        ];
        if self.is_empty() {
            return write!(f, "NONE");
        }
        let fmt = pairs.iter()
            .filter(|&&(k, _)| self.contains(k))
            .map(|&(_, v)| v)
            .format(" | ");
        write!(f, "{}", fmt)
    }
}


unit::collect_tests![tests];
