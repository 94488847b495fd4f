use std::ffi::{CStr, c_void};
use std::os::raw::c_char;
use std::panic::{self, AssertUnwindSafe};
use std::slice;
use std::sync::Arc;

use ash::vk;
use derive_more::*;
use log::error;

use crate::*;

/// A queue or command buffer label attached to a diagnostic.
#[derive(Clone, Debug, Display, PartialEq)]
#[display(fmt = "{}", name)]
pub struct Label {
    pub name: String,
    pub color: [f32; 4],
}

unsafe fn lossy(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() { return None; }
    Some(CStr::from_ptr(ptr).to_string_lossy().into_owned())
}

/// Tolerates a null array when the count is zero.
unsafe fn array<'a, T>(ptr: *const T, count: u32) -> &'a [T] {
    if ptr.is_null() || count == 0 { return &[]; }
    slice::from_raw_parts(ptr, count as usize)
}

impl Label {
    unsafe fn from_vk(label: &vk::DebugUtilsLabelEXT<'_>) -> Self {
        Label {
            name: lossy(label.p_label_name).unwrap_or_default(),
            color: label.color,
        }
    }
}

impl ObjectInfo {
    unsafe fn from_vk(info: &vk::DebugUtilsObjectNameInfoEXT<'_>) -> Self {
        ObjectInfo {
            ty: info.object_type,
            handle: info.object_handle,
            name: lossy(info.p_object_name),
        }
    }
}

impl Diagnostic {
    /// Copies the contents of debug_utils callback data.
    ///
    /// # Safety
    ///
    /// Every non-null pointer in `data` must be valid for the duration
    /// of the call.
    pub unsafe fn from_vk(
        severity: vk::DebugUtilsMessageSeverityFlagsEXT,
        types: vk::DebugUtilsMessageTypeFlagsEXT,
        data: &vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    ) -> Self {
        Diagnostic {
            severity: Severity::from_vk(severity, types),
            message_id_name: lossy(data.p_message_id_name).unwrap_or_default(),
            message_id: data.message_id_number,
            message: lossy(data.p_message).unwrap_or_default(),
            queue_labels: array(data.p_queue_labels, data.queue_label_count)
                .iter().map(|x| Label::from_vk(x)).collect(),
            cmd_buf_labels: array(data.p_cmd_buf_labels, data.cmd_buf_label_count)
                .iter().map(|x| Label::from_vk(x)).collect(),
            objects: array(data.p_objects, data.object_count)
                .iter().map(|x| ObjectInfo::from_vk(x)).collect(),
        }
    }
}

/// The debug_utils callback installed by `DebugMessenger`. Returns
/// `VK_TRUE`, telling the caller to skip the offending command, only
/// when the diagnostic satisfied an expectation.
pub unsafe extern "system" fn debug_message_callback(
    message_severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    message_types: vk::DebugUtilsMessageTypeFlagsEXT,
    p_callback_data: *const vk::DebugUtilsMessengerCallbackDataEXT<'_>,
    p_user_data: *mut c_void,
) -> vk::Bool32 {
    if p_callback_data.is_null() || p_user_data.is_null() {
        return vk::FALSE;
    }
    let sink = &*(p_user_data as *const Arc<dyn DiagnosticSink>);
    let data = &*p_callback_data;
    let res = panic::catch_unwind(AssertUnwindSafe(|| {
        let diag = Diagnostic::from_vk(message_severity, message_types, data);
        sink.report(&diag)
    }));
    match res {
        Ok(disp) if disp.skip_call() => vk::TRUE,
        Ok(_) => vk::FALSE,
        Err(_) => {
            error!("diagnostic sink panicked");
            vk::FALSE
        },
    }
}

/// Owns the user data handed to the debug_utils callback. Must outlive
/// every messenger created from `create_info`.
#[derive(Debug)]
pub struct DebugMessenger {
    severity: vk::DebugUtilsMessageSeverityFlagsEXT,
    types: vk::DebugUtilsMessageTypeFlagsEXT,
    sink: Box<Arc<dyn DiagnosticSink>>,
}

impl DebugMessenger {
    pub fn new(mask: Severity, sink: Arc<dyn DiagnosticSink>) -> Self {
        DebugMessenger {
            severity: mask.vk_severity(),
            types: mask.vk_types(),
            sink: Box::new(sink),
        }
    }

    pub fn create_info(&self) -> vk::DebugUtilsMessengerCreateInfoEXT<'_> {
        vk::DebugUtilsMessengerCreateInfoEXT {
            message_severity: self.severity,
            message_type: self.types,
            pfn_user_callback: Some(debug_message_callback),
            p_user_data: &*self.sink as *const Arc<dyn DiagnosticSink>
                as *mut c_void,
            ..Default::default()
        }
    }
}


unit::collect_tests![tests];
