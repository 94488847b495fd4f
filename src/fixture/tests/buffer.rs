use ash::vk::{self, Handle};
use monitor::Severity;
use tripwire_fixture::*;

macro_rules! test_type {
    () => { tripwire_fixture::testing::Test }
}

type Helper<'a> = BufferHelper<'a>;

const SIZE: &str = "VUID-VkBufferCreateInfo-size-00912";
const USAGE: &str = "VUID-VkBufferCreateInfo-usage-requiredbitmask";
const NULL_INDICES: &str = "VUID-VkBufferCreateInfo-sharingMode-00913";
const INDEX_COUNT: &str = "VUID-VkBufferCreateInfo-sharingMode-00914";
const INDEX_RANGE: &str = "VUID-VkBufferCreateInfo-sharingMode-01419";

fn concurrent(h: &mut Helper, families: &[u32]) {
    h.info.sharing_mode = vk::SharingMode::CONCURRENT;
    h.queue_families = Some(families.to_vec());
}

fn cases<'a>() -> Vec<Case<Helper<'a>>> {
    vec![
        Case::positive(|_: &mut Helper| {}),
        Case::new(|h: &mut Helper| h.info.size = 0, &[SIZE]),
        Case::new(|h: &mut Helper| h.info.usage = vk::BufferUsageFlags::empty(), &[USAGE]),
        Case::new(|h: &mut Helper| {
            h.info.size = 0;
            h.info.usage = vk::BufferUsageFlags::empty();
        }, &[SIZE, USAGE]),
        Case::positive(|h: &mut Helper| concurrent(h, &[0, 2])),
        Case::new(|h: &mut Helper| {
            h.info.sharing_mode = vk::SharingMode::CONCURRENT;
            h.info.queue_family_index_count = 2;
        }, &[NULL_INDICES]),
        Case::new(|h: &mut Helper| concurrent(h, &[1]), &[INDEX_COUNT]),
        Case::new(|h: &mut Helper| concurrent(h, &[0, 3]), &[INDEX_RANGE]),
        Case::new(|h: &mut Helper| concurrent(h, &[1, 1]), &[INDEX_RANGE]),
        // Indices are ignored for exclusive sharing
        Case::positive(|h: &mut Helper| h.queue_families = Some(vec![7])),
    ]
}

fn run_cases(ctx: &TestContext) {
    let cases = cases();
    assert_eq!(oneshot_table(ctx, Severity::ERROR, &cases), cases.len());
    assert_eq!(ctx.device().live_object_count(), 0);
}

fn buffer_table(ctx: &TestContext) {
    run_cases(ctx);
}

fn buffer_table_threaded(ctx: &TestContext) {
    let ctx = TestContext::new(ctx.config().clone().threaded()).unwrap();
    run_cases(&ctx);
    ctx.teardown();
}

fn destroy_unknown_buffer(ctx: &TestContext) {
    ctx.monitor().set_desired_failure_msg(
        Severity::ERROR, "VUID-vkDestroyBuffer-buffer-parameter");
    ctx.device().destroy_buffer(vk::Buffer::from_raw(0xdead));
    assert!(ctx.monitor().verify_found());

    ctx.monitor().expect_success(Severity::ERROR);
    ctx.device().destroy_buffer(vk::Buffer::null());
    assert!(ctx.monitor().verify_not_found());
}

fn destroy_unknown_sampler(ctx: &TestContext) {
    ctx.monitor().set_desired_failure_msg(
        Severity::ERROR, "VUID-vkDestroySampler-sampler-parameter");
    ctx.device().destroy_sampler(vk::Sampler::from_raw(0xbeef));
    assert!(ctx.monitor().verify_found());
}

fn allowed_noise(ctx: &TestContext) {
    // A second, tolerated violation alongside the required one
    ctx.monitor().set_allowed_failure_msg(USAGE);
    let passed = oneshot(ctx, |h: &mut Helper| {
        h.info.size = 0;
        h.info.usage = vk::BufferUsageFlags::empty();
    }, Severity::ERROR, &[SIZE], false);
    assert!(passed);
    assert_eq!(ctx.device().live_object_count(), 0);
}

fn leaked_buffer(ctx: &TestContext) {
    let mut helper = BufferHelper::new(ctx);
    helper.create().unwrap();
    std::mem::forget(helper);
}

unit::declare_tests![
    buffer_table,
    buffer_table_threaded,
    destroy_unknown_buffer,
    destroy_unknown_sampler,
    allowed_noise,
    (#[should_err] leaked_buffer),
];

fn main() {
    env_logger::init();
    testing::run_tests(__collect_tests);
}
