use ash::vk;
use log::debug;

use crate::*;

/// Builds one sampler from a known-valid description. The sampler is
/// destroyed when the helper is dropped.
#[derive(Debug)]
pub struct SamplerHelper<'a> {
    ctx: &'a TestContext,
    pub info: vk::SamplerCreateInfo<'static>,
    sampler: Option<vk::Sampler>,
}

impl<'a> SamplerHelper<'a> {
    pub fn sampler(&self) -> Option<vk::Sampler> {
        self.sampler
    }

    fn destroy(&mut self) {
        if let Some(sampler) = self.sampler.take() {
            self.ctx.device().destroy_sampler(sampler);
        }
    }
}

impl<'a> OneshotHelper<'a> for SamplerHelper<'a> {
    fn new(ctx: &'a TestContext) -> Self {
        let info = vk::SamplerCreateInfo {
            mag_filter: vk::Filter::LINEAR,
            min_filter: vk::Filter::LINEAR,
            mipmap_mode: vk::SamplerMipmapMode::NEAREST,
            address_mode_u: vk::SamplerAddressMode::CLAMP_TO_EDGE,
            address_mode_v: vk::SamplerAddressMode::CLAMP_TO_EDGE,
            address_mode_w: vk::SamplerAddressMode::CLAMP_TO_EDGE,
            mip_lod_bias: 0.0,
            anisotropy_enable: vk::FALSE,
            max_anisotropy: 1.0,
            min_lod: 0.0,
            max_lod: 1.0,
            border_color: vk::BorderColor::FLOAT_TRANSPARENT_BLACK,
            unnormalized_coordinates: vk::FALSE,
            ..Default::default()
        };
        SamplerHelper { ctx, info, sampler: None }
    }

    fn create(&mut self) -> FixtureResult<()> {
        self.destroy();
        self.sampler = Some(self.ctx.device().create_sampler(&self.info)?);
        Ok(())
    }
}

impl<'a> Drop for SamplerHelper<'a> {
    fn drop(&mut self) {
        self.destroy();
    }
}

/// Builds one buffer from a known-valid description.
/// `queue_families` supplies `pQueueFamilyIndices` at creation time;
/// when it is `None` the pointer is null and `queue_family_index_count`
/// is taken from `info` as is.
#[derive(Debug)]
pub struct BufferHelper<'a> {
    ctx: &'a TestContext,
    pub info: vk::BufferCreateInfo<'static>,
    pub queue_families: Option<Vec<u32>>,
    buffer: Option<vk::Buffer>,
}

impl<'a> BufferHelper<'a> {
    pub fn buffer(&self) -> Option<vk::Buffer> {
        self.buffer
    }

    fn destroy(&mut self) {
        if let Some(buffer) = self.buffer.take() {
            self.ctx.device().destroy_buffer(buffer);
        }
    }
}

impl<'a> OneshotHelper<'a> for BufferHelper<'a> {
    fn new(ctx: &'a TestContext) -> Self {
        let info = vk::BufferCreateInfo {
            size: 256,
            usage: vk::BufferUsageFlags::UNIFORM_BUFFER,
            sharing_mode: vk::SharingMode::EXCLUSIVE,
            ..Default::default()
        };
        BufferHelper { ctx, info, queue_families: None, buffer: None }
    }

    fn create(&mut self) -> FixtureResult<()> {
        self.destroy();
        let mut info = self.info;
        if let Some(ref families) = self.queue_families {
            info.queue_family_index_count = families.len() as u32;
            info.p_queue_family_indices = families.as_ptr();
        }
        debug!("creating buffer: {:?}", info);
        let buffer = unsafe { self.ctx.device().create_buffer(&info)? };
        self.buffer = Some(buffer);
        Ok(())
    }
}

impl<'a> Drop for BufferHelper<'a> {
    fn drop(&mut self) {
        self.destroy();
    }
}
