use std::slice;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread;

use ash::vk::{self, Handle};
use fnv::FnvHashSet;
use log::{error, trace};
use parking_lot::Mutex;

use crate::*;

/// A single descriptor write within `update_descriptor_sets`.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct DescriptorWrite {
    pub binding: u32,
    pub count: u32,
}

/// Owned copy of the parts of `VkBufferCreateInfo` that get validated.
#[derive(Clone, Debug)]
struct BufferDesc {
    size: vk::DeviceSize,
    usage: vk::BufferUsageFlags,
    sharing_mode: vk::SharingMode,
    index_count: u32,
    indices: Option<Vec<u32>>,
}

impl BufferDesc {
    unsafe fn from_vk(info: &vk::BufferCreateInfo<'_>) -> Self {
        let indices = if info.p_queue_family_indices.is_null() { None } else {
            Some(slice::from_raw_parts(
                info.p_queue_family_indices,
                info.queue_family_index_count as usize,
            ).to_vec())
        };
        BufferDesc {
            size: info.size,
            usage: info.usage,
            sharing_mode: info.sharing_mode,
            index_count: info.queue_family_index_count,
            indices,
        }
    }
}

/// A device which validates its inputs and reports invalid usage
/// through a `ValidationLayer`. Calls the layer asks to skip fail with
/// `ERROR_VALIDATION_FAILED_EXT`.
#[derive(Debug)]
pub struct Device {
    layer: Arc<ValidationLayer>,
    features: DeviceFeatures,
    limits: DeviceLimits,
    threaded_validation: bool,
    samplers: Mutex<FnvHashSet<u64>>,
    buffers: Mutex<FnvHashSet<u64>>,
    next_handle: AtomicU64,
}

impl Drop for Device {
    fn drop(&mut self) {
        self.report_leaks();
    }
}

impl Device {
    pub fn new(layer: Arc<ValidationLayer>, config: &FixtureConfig) -> Self {
        Device {
            layer,
            features: config.features,
            limits: config.limits,
            threaded_validation: config.threaded_validation,
            samplers: Default::default(),
            buffers: Default::default(),
            next_handle: AtomicU64::new(0x1000),
        }
    }

    pub fn layer(&self) -> &Arc<ValidationLayer> {
        &self.layer
    }

    fn alloc_handle(&self) -> u64 {
        self.next_handle.fetch_add(1, Ordering::Relaxed)
    }

    /// Reports every violation and returns whether the call should be
    /// skipped. Reports come from a worker thread under threaded
    /// validation.
    fn validate(&self, violations: Vec<Violation>) -> bool {
        if violations.is_empty() {
            return false;
        }
        let report = move || {
            let mut skip = false;
            for violation in violations.iter() {
                skip |= self.layer.report_error(violation);
            }
            skip
        };
        if !self.threaded_validation {
            return report();
        }
        thread::scope(|s| {
            let worker = thread::Builder::new()
                .name("validation".into())
                .spawn_scoped(s, report);
            match worker.map(|handle| handle.join()) {
                Ok(Ok(skip)) => skip,
                _ => {
                    error!("validation worker failed");
                    false
                },
            }
        })
    }

    fn check_sampler(&self, info: &vk::SamplerCreateInfo<'_>) -> Vec<Violation> {
        let mut res = Vec::new();
        if info.anisotropy_enable == vk::TRUE {
            if !self.features.sampler_anisotropy {
                res.push(Violation::new(
                    "VUID-VkSamplerCreateInfo-anisotropyEnable-01070",
                    "anisotropyEnable is VK_TRUE but the samplerAnisotropy \
                     feature is not enabled",
                ));
            }
            let limit = self.limits.max_sampler_anisotropy;
            if !(1.0 <= info.max_anisotropy && info.max_anisotropy <= limit) {
                res.push(Violation::new(
                    "VUID-VkSamplerCreateInfo-anisotropyEnable-01071",
                    format!(
                        "maxAnisotropy ({}) is not between 1.0 and \
                         maxSamplerAnisotropy ({})",
                        info.max_anisotropy, limit,
                    ),
                ));
            }
        }
        let max_bias = self.limits.max_sampler_lod_bias;
        if info.mip_lod_bias.abs() > max_bias {
            res.push(Violation::new(
                "VUID-VkSamplerCreateInfo-mipLodBias-01069",
                format!(
                    "mipLodBias ({}) exceeds maxSamplerLodBias ({})",
                    info.mip_lod_bias, max_bias,
                ),
            ));
        }
        if info.max_lod < info.min_lod {
            res.push(Violation::new(
                "VUID-VkSamplerCreateInfo-maxLod-01973",
                format!(
                    "maxLod ({}) is less than minLod ({})",
                    info.max_lod, info.min_lod,
                ),
            ));
        }
        if info.unnormalized_coordinates == vk::TRUE
            && info.min_filter != info.mag_filter
        {
            res.push(Violation::new(
                "VUID-VkSamplerCreateInfo-unnormalizedCoordinates-01072",
                format!(
                    "unnormalizedCoordinates is VK_TRUE but minFilter ({:?}) \
                     and magFilter ({:?}) differ",
                    info.min_filter, info.mag_filter,
                ),
            ));
        }
        res
    }

    pub fn create_sampler(&self, info: &vk::SamplerCreateInfo<'_>) ->
        FixtureResult<vk::Sampler>
    {
        if self.validate(self.check_sampler(info)) {
            return Err(vk::Result::ERROR_VALIDATION_FAILED_EXT.into());
        }
        let raw = self.alloc_handle();
        self.samplers.lock().insert(raw);
        trace!("created sampler {:#x}", raw);
        Ok(vk::Sampler::from_raw(raw))
    }

    pub fn destroy_sampler(&self, sampler: vk::Sampler) {
        self.destroy(&self.samplers, sampler, "VUID-vkDestroySampler-sampler-parameter");
    }

    fn check_buffer(&self, desc: &BufferDesc) -> Vec<Violation> {
        let mut res = Vec::new();
        if desc.size == 0 {
            res.push(Violation::new(
                "VUID-VkBufferCreateInfo-size-00912",
                "size must be greater than 0",
            ));
        }
        if desc.usage.is_empty() {
            res.push(Violation::new(
                "VUID-VkBufferCreateInfo-usage-requiredbitmask",
                "usage must not be 0",
            ));
        }
        if desc.sharing_mode != vk::SharingMode::CONCURRENT {
            return res;
        }
        let indices = match desc.indices {
            Some(ref indices) => indices,
            None => {
                res.push(Violation::new(
                    "VUID-VkBufferCreateInfo-sharingMode-00913",
                    "sharingMode is VK_SHARING_MODE_CONCURRENT but \
                     pQueueFamilyIndices is NULL",
                ));
                return res;
            },
        };
        if desc.index_count < 2 {
            res.push(Violation::new(
                "VUID-VkBufferCreateInfo-sharingMode-00914",
                format!(
                    "sharingMode is VK_SHARING_MODE_CONCURRENT but \
                     queueFamilyIndexCount is {}",
                    desc.index_count,
                ),
            ));
        }
        let family_count = self.limits.queue_family_count;
        let mut seen = FnvHashSet::default();
        for &index in indices.iter() {
            if index >= family_count || !seen.insert(index) {
                res.push(Violation::new(
                    "VUID-VkBufferCreateInfo-sharingMode-01419",
                    format!(
                        "pQueueFamilyIndices contains {}, which is either \
                         repeated or not less than queueFamilyCount ({})",
                        index, family_count,
                    ),
                ));
                break;
            }
        }
        res
    }

    /// # Safety
    ///
    /// `p_queue_family_indices`, if not null, must point to
    /// `queue_family_index_count` indices.
    pub unsafe fn create_buffer(&self, info: &vk::BufferCreateInfo<'_>) ->
        FixtureResult<vk::Buffer>
    {
        let desc = BufferDesc::from_vk(info);
        if self.validate(self.check_buffer(&desc)) {
            return Err(vk::Result::ERROR_VALIDATION_FAILED_EXT.into());
        }
        let raw = self.alloc_handle();
        self.buffers.lock().insert(raw);
        trace!("created buffer {:#x} ({} bytes)", raw, desc.size);
        Ok(vk::Buffer::from_raw(raw))
    }

    pub fn destroy_buffer(&self, buffer: vk::Buffer) {
        self.destroy(&self.buffers, buffer, "VUID-vkDestroyBuffer-buffer-parameter");
    }

    fn destroy<H: Handle + Copy>(
        &self,
        live: &Mutex<FnvHashSet<u64>>,
        object: H,
        vuid: &'static str,
    ) {
        let raw = object.as_raw();
        // Destroying a null handle is a no-op
        if raw == 0 {
            return;
        }
        if live.lock().remove(&raw) {
            self.layer.forget_object(raw);
            trace!("destroyed {:?} {:#x}", H::TYPE, raw);
            return;
        }
        let violation = Violation::new(
            vuid,
            format!("invalid {:?} handle {:#x}", H::TYPE, raw),
        ).with_object(object);
        self.validate(vec![violation]);
    }

    /// Attaches a debug name which diagnostics about `object` carry.
    pub fn set_debug_name<H: Handle>(&self, object: H, name: &str) {
        self.layer.set_object_name(object.as_raw(), name);
    }

    pub fn live_object_count(&self) -> usize {
        self.samplers.lock().len() + self.buffers.lock().len()
    }

    /// Applies descriptor writes against a set layout with
    /// `binding_count` bindings. Stops before the next write once
    /// `bailout` is raised. Returns the number of writes processed.
    pub fn update_descriptor_sets(
        &self,
        binding_count: u32,
        writes: &[DescriptorWrite],
        bailout: Option<&AtomicBool>,
    ) -> usize {
        let mut processed = 0;
        for (i, write) in writes.iter().enumerate() {
            if bailout.map_or(false, |flag| flag.load(Ordering::Acquire)) {
                trace!("bailing out after {} descriptor writes", processed);
                break;
            }
            processed += 1;
            let mut res = Vec::new();
            if write.binding >= binding_count {
                res.push(Violation::new(
                    "VUID-VkWriteDescriptorSet-dstBinding-00315",
                    format!(
                        "pDescriptorWrites[{}].dstBinding ({}) is not less \
                         than the binding count ({})",
                        i, write.binding, binding_count,
                    ),
                ));
            }
            if write.count == 0 {
                res.push(Violation::new(
                    "VUID-VkWriteDescriptorSet-descriptorCount-arraylength",
                    format!("pDescriptorWrites[{}].descriptorCount is 0", i),
                ));
            }
            self.validate(res);
        }
        processed
    }

    /// Reports objects that are still alive and forgets them.
    pub fn report_leaks(&self) {
        let samplers: Vec<_> = self.samplers.lock().drain().collect();
        let buffers: Vec<_> = self.buffers.lock().drain().collect();
        if samplers.is_empty() && buffers.is_empty() {
            return;
        }
        let mut violation = Violation::new(
            "VUID-vkDestroyDevice-device-05137",
            format!(
                "device destroyed with {} sampler(s) and {} buffer(s) \
                 still alive",
                samplers.len(), buffers.len(),
            ),
        );
        for raw in samplers {
            violation = violation.with_object(vk::Sampler::from_raw(raw));
        }
        for raw in buffers {
            violation = violation.with_object(vk::Buffer::from_raw(raw));
        }
        self.layer.report_error(&violation);
    }
}


unit::collect_tests![tests];
