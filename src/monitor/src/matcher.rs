use crate::Severity;

/// A diagnostic a test requires to occur.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Expectation {
    pub severity: Severity,
    /// Matched by substring containment. An empty fragment matches any
    /// diagnostic of the right severity.
    pub fragment: String,
}

impl Expectation {
    pub fn new(severity: Severity, fragment: impl Into<String>) -> Self {
        Expectation { severity, fragment: fragment.into() }
    }

    pub fn is_wildcard(&self) -> bool {
        self.fragment.is_empty()
    }

    pub fn matches(&self, severity: Severity, text: &str) -> bool {
        self.severity.intersects(severity) && text.contains(&*self.fragment)
    }
}

/// A multiset of outstanding expectations. Each expectation is consumed
/// by exactly one matching diagnostic; when several could match, the
/// earliest added wins.
#[derive(Clone, Debug, Default)]
pub struct MessageMatcher {
    pending: Vec<Expectation>,
}

impl MessageMatcher {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn add_expectation(
        &mut self,
        severity: Severity,
        fragment: impl Into<String>,
    ) {
        self.pending.push(Expectation::new(severity, fragment));
    }

    /// Removes and returns the first expectation satisfied by the
    /// diagnostic, if any.
    pub fn try_consume(&mut self, severity: Severity, text: &str) ->
        Option<Expectation>
    {
        let idx = self.pending.iter().position(|e| e.matches(severity, text))?;
        Some(self.pending.remove(idx))
    }

    pub fn all_satisfied(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn remaining_fragments(&self) -> impl Iterator<Item = &str> + '_ {
        self.pending.iter().map(|e| &e.fragment[..])
    }

    pub fn pending(&self) -> &[Expectation] {
        &self.pending
    }

    /// The union of every pending expectation's severity.
    pub fn severity_mask(&self) -> Severity {
        self.pending.iter()
            .fold(Severity::empty(), |acc, e| acc | e.severity)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}


unit::collect_tests![tests];
