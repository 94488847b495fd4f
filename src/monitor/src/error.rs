use std::fmt;

use itertools::Itertools;

use crate::Severity;

/// Why a verification failed.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum VerifyError {
    /// Expectations that no diagnostic consumed. `other` holds whatever
    /// unexpected diagnostics arrived instead.
    ExpectationUnmet {
        missing: Vec<String>,
        other: Vec<String>,
    },
    /// Diagnostics that arrived while expecting success.
    UnexpectedDiagnostic {
        severity: Severity,
        messages: Vec<String>,
    },
}

impl VerifyError {
    pub fn missing(&self) -> &[String] {
        match self {
            VerifyError::ExpectationUnmet { missing, .. } => missing,
            VerifyError::UnexpectedDiagnostic { .. } => &[],
        }
    }

    pub fn unexpected(&self) -> &[String] {
        match self {
            VerifyError::ExpectationUnmet { other, .. } => other,
            VerifyError::UnexpectedDiagnostic { messages, .. } => messages,
        }
    }
}

fn quoted(s: &str) -> String {
    if s.is_empty() { "<any message>".to_owned() } else { format!("'{}'", s) }
}

impl fmt::Display for VerifyError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            VerifyError::ExpectationUnmet { missing, other } => {
                write!(
                    f,
                    "did not receive expected diagnostic(s): {}",
                    missing.iter().map(|s| quoted(s)).format(", "),
                )?;
                if !other.is_empty() {
                    write!(f, "\nother diagnostics received:")?;
                    for msg in other.iter() {
                        write!(f, "\n    {}", msg)?;
                    }
                }
                Ok(())
            },
            VerifyError::UnexpectedDiagnostic { severity, messages } => {
                write!(f, "expected no {} diagnostics but received:", severity)?;
                for msg in messages.iter() {
                    write!(f, "\n    {}", msg)?;
                }
                Ok(())
            },
        }
    }
}

impl std::error::Error for VerifyError {}
