use regex::{Regex, RegexSet};

use crate::Test;

/// Selects which tests are run.
pub trait TestFilter<T>: std::fmt::Debug {
    fn is_match(&self, test: &T) -> bool;
}

impl<T, F: TestFilter<T> + ?Sized> TestFilter<T> for Box<F> {
    fn is_match(&self, test: &T) -> bool {
        (**self).is_match(test)
    }
}

impl<T, F: TestFilter<T>> TestFilter<T> for Option<F> {
    fn is_match(&self, test: &T) -> bool {
         self.as_ref().map_or(true, |filter| filter.is_match(test))
    }
}

impl<D> TestFilter<Test<D>> for Regex {
    fn is_match(&self, test: &Test<D>) -> bool {
        Regex::is_match(self, &test.name)
    }
}

impl<D> TestFilter<Test<D>> for RegexSet {
    fn is_match(&self, test: &Test<D>) -> bool {
        RegexSet::is_match(self, &test.name)
    }
}

/// Builds the filter for a command-line pattern: a substring match, or
/// the whole name when `exact` is set.
pub fn name_filter(pattern: &str, exact: bool) -> Option<Regex> {
    let escaped = regex::escape(pattern);
    let re = if exact { format!("^{}$", escaped) } else { escaped };
    Regex::new(&re).ok()
}


collect_tests![tests];
