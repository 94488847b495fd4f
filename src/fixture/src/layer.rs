use std::ffi::{CString, c_void};
use std::hash::Hasher;
use std::ptr;
use std::sync::atomic::{AtomicU64, Ordering};

use ash::vk::{self, Handle};
use derivative::Derivative;
use fnv::{FnvHashMap, FnvHasher};
use log::{debug, trace};
use parking_lot::Mutex;

use crate::*;

/// One piece of invalid usage detected by the device.
#[derive(Clone, Debug)]
pub struct Violation {
    pub vuid: &'static str,
    pub message: String,
    pub objects: Vec<(vk::ObjectType, u64)>,
}

impl Violation {
    pub fn new(vuid: &'static str, message: impl Into<String>) -> Self {
        Violation { vuid, message: message.into(), objects: Vec::new() }
    }

    pub fn with_object<H: Handle>(mut self, object: H) -> Self {
        self.objects.push((H::TYPE, object.as_raw()));
        self
    }
}

/// The numeric message id the layer derives from a VUID.
pub fn message_id(vuid: &str) -> i32 {
    let mut hasher = FnvHasher::default();
    hasher.write(vuid.as_bytes());
    hasher.finish() as u32 as i32
}

fn c_string(s: &str) -> CString {
    CString::new(s.replace('\0', "")).unwrap_or_default()
}

/// The user data pointer is owned by whoever created the messenger,
/// which guarantees it outlives the registration.
#[derive(Clone, Copy, Debug)]
struct UserData(*mut c_void);

unsafe impl Send for UserData {}
unsafe impl Sync for UserData {}

#[derive(Clone, Copy, Derivative)]
#[derivative(Debug)]
struct Messenger {
    handle: vk::DebugUtilsMessengerEXT,
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    types: vk::DebugUtilsMessageTypeFlagsEXT,
    #[derivative(Debug = "ignore")]
    callback: vk::PFN_vkDebugUtilsMessengerCallbackEXT,
    user_data: UserData,
}

/// Delivers diagnostics to registered debug_utils messengers.
#[derive(Debug, Default)]
pub struct ValidationLayer {
    messengers: Mutex<Vec<Messenger>>,
    names: Mutex<FnvHashMap<u64, CString>>,
    next_handle: AtomicU64,
}

impl ValidationLayer {
    pub fn new() -> Self {
        Default::default()
    }

    /// Registers a messenger.
    ///
    /// # Safety
    ///
    /// `info.p_user_data` must stay valid until the messenger is
    /// destroyed.
    pub unsafe fn create_messenger(
        &self,
        info: &vk::DebugUtilsMessengerCreateInfoEXT<'_>,
    ) -> FixtureResult<vk::DebugUtilsMessengerEXT> {
        if info.pfn_user_callback.is_none() {
            return Err(vk::Result::ERROR_INITIALIZATION_FAILED.into());
        }
        let raw = self.next_handle.fetch_add(1, Ordering::Relaxed) + 1;
        let handle = vk::DebugUtilsMessengerEXT::from_raw(raw);
        self.messengers.lock().push(Messenger {
            handle,
            severity: info.message_severity,
            types: info.message_type,
            callback: info.pfn_user_callback,
            user_data: UserData(info.p_user_data),
        });
        trace!("created messenger {:?}", handle);
        Ok(handle)
    }

    pub fn destroy_messenger(&self, handle: vk::DebugUtilsMessengerEXT) {
        self.messengers.lock().retain(|m| m.handle != handle);
        trace!("destroyed messenger {:?}", handle);
    }

    pub fn messenger_count(&self) -> usize {
        self.messengers.lock().len()
    }

    /// Attaches a debug name to an object; subsequent diagnostics
    /// naming the object carry it.
    pub fn set_object_name(&self, handle: u64, name: &str) {
        self.names.lock().insert(handle, c_string(name));
    }

    pub fn forget_object(&self, handle: u64) {
        self.names.lock().remove(&handle);
    }

    /// Reports a validation error. Returns true if any messenger asked
    /// for the offending call to be skipped.
    pub fn report_error(&self, violation: &Violation) -> bool {
        self.report(
            vk::DebugUtilsMessageSeverityFlagsEXT::ERROR,
            vk::DebugUtilsMessageTypeFlagsEXT::VALIDATION,
            violation,
        )
    }

    pub fn report(
        &self,
        severity: vk::DebugUtilsMessageSeverityFlagsEXT,
        types: vk::DebugUtilsMessageTypeFlagsEXT,
        violation: &Violation,
    ) -> bool {
        let id = message_id(violation.vuid);
        let text = format!(
            "Validation Error: [ {} ] | MessageID = {:#010x} | {}",
            violation.vuid, id, violation.message,
        );
        debug!("{}", text);

        let p_id = c_string(violation.vuid);
        let p_text = c_string(&text);
        let names: Vec<Option<CString>> = {
            let table = self.names.lock();
            violation.objects.iter()
                .map(|(_, handle)| table.get(handle).cloned())
                .collect()
        };
        let objects: Vec<_> = violation.objects.iter().zip(names.iter())
            .map(|(&(object_type, object_handle), name)| {
                vk::DebugUtilsObjectNameInfoEXT {
                    object_type,
                    object_handle,
                    p_object_name: name.as_ref()
                        .map_or(ptr::null(), |name| name.as_ptr()),
                    ..Default::default()
                }
            })
            .collect();
        let data = vk::DebugUtilsMessengerCallbackDataEXT {
            p_message_id_name: p_id.as_ptr(),
            message_id_number: id,
            p_message: p_text.as_ptr(),
            object_count: objects.len() as u32,
            p_objects: objects.as_ptr(),
            ..Default::default()
        };

        let messengers = self.messengers.lock().clone();
        let mut skip = false;
        for m in messengers.iter() {
            let callback = match m.callback {
                Some(callback) => callback,
                None => continue,
            };
            if !m.severity.intersects(severity) || !m.types.intersects(types) {
                continue;
            }
            let res = unsafe { callback(severity, types, &data, m.user_data.0) };
            skip |= res == vk::TRUE;
        }
        skip
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use ash::vk::Handle;
    use monitor::*;

    use crate::*;

    fn id_is_stable(_: &TestContext) {
        let a = message_id("VUID-VkSamplerCreateInfo-maxLod-01973");
        assert_eq!(a, message_id("VUID-VkSamplerCreateInfo-maxLod-01973"));
        assert_ne!(a, message_id("VUID-VkSamplerCreateInfo-mipLodBias-01069"));
    }

    fn delivers_to_matching_messengers(_: &TestContext) {
        let layer = ValidationLayer::new();
        let errors = Arc::new(ErrorMonitor::new());
        let warnings = Arc::new(ErrorMonitor::new());
        let error_messenger =
            DebugMessenger::new(Severity::ERROR, Arc::clone(&errors) as _);
        let warning_messenger =
            DebugMessenger::new(Severity::WARNING, Arc::clone(&warnings) as _);
        unsafe {
            layer.create_messenger(&error_messenger.create_info()).unwrap();
            layer.create_messenger(&warning_messenger.create_info()).unwrap();
        }
        assert_eq!(layer.messenger_count(), 2);

        errors.set_desired_failure_msg(Severity::ERROR, "VUID-Test-1");
        warnings.expect_success(Severity::WARNING);
        let skip = layer.report_error(&Violation::new("VUID-Test-1", "bad"));
        assert!(skip);
        assert!(errors.verify_found());
        assert!(warnings.verify_not_found());
    }

    fn destroyed_messenger_is_silent(_: &TestContext) {
        let layer = ValidationLayer::new();
        let monitor = Arc::new(ErrorMonitor::new());
        let messenger =
            DebugMessenger::new(Severity::ERROR, Arc::clone(&monitor) as _);
        let handle =
            unsafe { layer.create_messenger(&messenger.create_info()).unwrap() };
        layer.destroy_messenger(handle);

        monitor.expect_success(Severity::ERROR);
        assert!(!layer.report_error(&Violation::new("VUID-Test-2", "bad")));
        assert!(monitor.verify_not_found());
    }

    fn text_carries_vuid(_: &TestContext) {
        let layer = ValidationLayer::new();
        let monitor = Arc::new(ErrorMonitor::new());
        let messenger =
            DebugMessenger::new(Severity::ERROR, Arc::clone(&monitor) as _);
        unsafe { layer.create_messenger(&messenger.create_info()).unwrap(); }

        layer.set_object_name(7, "named");
        let violation = Violation::new("VUID-Test-3", "details here")
            .with_object(vk::Sampler::from_raw(7));
        assert!(!layer.report_error(&violation));
        let msgs = monitor.other_failure_msgs();
        assert_eq!(msgs.len(), 1);
        assert!(msgs[0].starts_with("VUID-Test-3: Validation Error: [ VUID-Test-3 ]"),
            "{}", msgs[0]);
        assert!(msgs[0].ends_with("details here"), "{}", msgs[0]);
    }

    unit::declare_tests![
        id_is_stable,
        delivers_to_matching_messengers,
        destroyed_messenger_is_silent,
        text_carries_vuid,
    ];
}

unit::collect_tests![tests];
