use std::ffi::OsString;

use clap::{App, Arg};
use regex::Regex;

use crate::name_filter;

/// Options controlling which tests run and how.
#[derive(Clone, Debug, Default)]
pub struct RunnerConfig {
    pub filter: Option<Regex>,
    pub include_ignored: bool,
    /// Let panic messages go straight to stderr.
    pub disable_capture: bool,
}

fn app() -> App<'static, 'static> {
    App::new("tripwire test runner")
        .arg(Arg::with_name("FILTER")
            .help("Run only tests whose names contain this string")
            .index(1))
        .arg(Arg::with_name("exact")
            .long("exact")
            .help("Match FILTER against the full test name"))
        .arg(Arg::with_name("include-ignored")
            .long("include-ignored")
            .help("Also run ignored tests"))
        .arg(Arg::with_name("nocapture")
            .long("nocapture")
            .help("Don't capture panic output"))
        // Accepted for compatibility with cargo's test flags
        .arg(Arg::with_name("test-threads")
            .long("test-threads")
            .takes_value(true)
            .hidden(true))
        .arg(Arg::with_name("quiet")
            .short("q")
            .long("quiet")
            .hidden(true))
}

impl RunnerConfig {
    pub fn from_args() -> Self {
        Self::from_iter(std::env::args_os())
    }

    /// Parses a command line. The first item is the program name.
    pub fn from_iter<I, T>(args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        let matches = app().get_matches_from(args);
        let exact = matches.is_present("exact");
        let env_nocapture = std::env::var("TRIPWIRE_NOCAPTURE")
            .map_or(false, |val| val == "1");
        RunnerConfig {
            filter: matches.value_of("FILTER")
                .and_then(|pat| name_filter(pat, exact)),
            include_ignored: matches.is_present("include-ignored"),
            disable_capture: matches.is_present("nocapture") || env_nocapture,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::*;
    use super::*;

    fn defaults() {
        let config = RunnerConfig::from_iter(&["runner"]);
        assert!(config.filter.is_none());
        assert!(!config.include_ignored);
    }

    fn filter_and_flags() {
        let config = RunnerConfig::from_iter(&[
            "runner", "--exact", "--include-ignored", "--test-threads", "1",
            "a::b",
        ]);
        let test = TestAttrs::new().build_test("a::b".to_owned(), 0u8);
        let other = TestAttrs::new().build_test("a::b::c".to_owned(), 0u8);
        assert!(config.filter.is_match(&test));
        assert!(!config.filter.is_match(&other));
        assert!(config.include_ignored);
    }

    fn nocapture() {
        let config = RunnerConfig::from_iter(&["runner", "--nocapture"]);
        assert!(config.disable_capture);
    }

    declare_tests![defaults, filter_and_flags, nocapture];
}

collect_tests![tests];
