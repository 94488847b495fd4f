use std::fmt;
use std::sync::Arc;

use ash::vk;
use itertools::Itertools;

use crate::*;

/// What became of a reported diagnostic.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Disposition {
    /// Satisfied an expectation. The call that caused it may be skipped.
    Handled,
    /// Neither expected nor ignored; kept for later verification.
    Unhandled,
    /// Matched the ignore list or the allowed list and was dropped.
    Suppressed,
    /// Outside the severities being watched.
    Filtered,
}

impl Disposition {
    /// Whether the system under test should skip the offending call.
    pub fn skip_call(self) -> bool {
        self == Disposition::Handled
    }
}

/// An object referenced by a diagnostic.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ObjectInfo {
    pub ty: vk::ObjectType,
    pub handle: u64,
    pub name: Option<String>,
}

impl fmt::Display for ObjectInfo {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{:?} 0x{:016x}[{}]",
            self.ty,
            self.handle,
            self.name.as_deref().unwrap_or(""),
        )
    }
}

/// A diagnostic emitted by the system under test.
#[derive(Clone, Debug, Default)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message_id_name: String,
    pub message_id: i32,
    pub message: String,
    pub queue_labels: Vec<Label>,
    pub cmd_buf_labels: Vec<Label>,
    pub objects: Vec<ObjectInfo>,
}

impl Diagnostic {
    pub fn new(severity: Severity, message: impl Into<String>) -> Self {
        Diagnostic {
            severity,
            message: message.into(),
            ..Default::default()
        }
    }

    /// The text expectations are matched against: the message id name
    /// followed by the message.
    pub fn text(&self) -> String {
        if self.message_id_name.is_empty() {
            self.message.clone()
        } else {
            format!("{}: {}", self.message_id_name, self.message)
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "[{}] {}", self.severity, self.text())?;
        if !self.queue_labels.is_empty() {
            write!(f, "\n  Queue labels: {}",
                self.queue_labels.iter().format(", "))?;
        }
        if !self.cmd_buf_labels.is_empty() {
            write!(f, "\n  Command buffer labels: {}",
                self.cmd_buf_labels.iter().format(", "))?;
        }
        if !self.objects.is_empty() {
            writeln!(f)?;
            writeln!(f, "  Objects:")?;
            for obj in self.objects.iter() {
                writeln!(f, "    {}", obj)?;
            }
        }
        Ok(())
    }
}

/// Receives diagnostics from the system under test. Implementations may
/// be called from any thread and must not panic.
pub trait DiagnosticSink: fmt::Debug + Send + Sync {
    fn report(&self, diagnostic: &Diagnostic) -> Disposition;
}

impl<T: DiagnosticSink + ?Sized> DiagnosticSink for Arc<T> {
    fn report(&self, diagnostic: &Diagnostic) -> Disposition {
        (**self).report(diagnostic)
    }
}

impl DiagnosticSink for ErrorMonitor {
    fn report(&self, diagnostic: &Diagnostic) -> Disposition {
        self.check_for_desired_msg(diagnostic.severity, &diagnostic.text())
    }
}


unit::collect_tests![tests];
