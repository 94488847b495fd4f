//! Runs tests which take a `TestContext`.

use crate::*;

pub type TestData = fn(&TestContext);
pub type Test = unit::Test<TestData>;
pub type CollectFn = fn(&mut unit::TestDriverBuilder<Test>);

/// Gives each test a fresh context and tears it down afterwards.
#[derive(Debug, Default)]
pub struct ContextInvoker {
    config: FixtureConfig,
}

impl ContextInvoker {
    pub fn new(config: FixtureConfig) -> Self {
        ContextInvoker { config }
    }
}

impl unit::PanicTestInvoker<TestData> for ContextInvoker {
    fn invoke(&self, test: &Test) {
        let ctx = TestContext::new(self.config.clone())
            .unwrap_or_else(|e| panic!("failed to initialize: {}", e));
        (test.data())(&ctx);
        ctx.teardown();
    }
}

/// Collects tests, runs them against contexts configured from the
/// environment, and exits.
pub fn run_tests(collect: CollectFn) -> ! {
    let mut builder = unit::TestDriverBuilder::<Test>::parse_args();
    collect(&mut builder);
    let invoker = ContextInvoker::new(FixtureConfig::from_env());
    let context = unit::PanicTestContext::new(invoker);
    unit::run_and_exit(builder.build(Box::new(context)))
}
