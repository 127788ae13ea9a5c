//! The driver layer a [`Device`](crate::Device) realizes its objects on.

mod headless;
mod native;

pub use headless::{HeadlessBackend, HeadlessObject, ObjectKind};
pub use native::WgpuBackend;

use crate::{
    error::DeviceResult,
    object::{
        ComputePipelineDescriptor, RenderPipelineDescriptor, SamplerDescriptor,
        ShaderModuleDescriptor,
    },
};

/// Everything a backend needs to allocate a 2D texture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureCreateInfo<'a> {
    pub label: Option<&'a str>,
    pub format: wgpu::TextureFormat,
    pub width: u32,
    pub height: u32,
    pub sample_count: u32,
    pub usage: wgpu::TextureUsages,
}

impl TextureCreateInfo<'_> {
    /// Bytes the texture occupies once allocated, all samples included.
    pub fn allocation_size(&self) -> u64 {
        // Depth-stencil formats have no single block size.
        const FALLBACK_TEXEL_SIZE: u32 = 4;

        let texel_size = self
            .format
            .block_copy_size(None)
            .unwrap_or(FALLBACK_TEXEL_SIZE);
        let (block_width, block_height) = self.format.block_dimensions();
        let blocks_wide = self.width.div_ceil(block_width) as u64;
        let blocks_high = self.height.div_ceil(block_height) as u64;

        blocks_wide * blocks_high * texel_size as u64 * self.sample_count as u64
    }
}

/// Creates raw driver objects.
///
/// Backends never see the caches. Every call realizes a brand new object, and
/// the returned value releases the object when dropped.
pub trait DeviceBackend: Send + Sync + Sized + 'static {
    type Texture: Send + Sync + 'static;
    type TextureView: Send + Sync + 'static;
    type BindGroupLayout: Send + Sync + 'static;
    type PipelineLayout: Send + Sync + 'static;
    type Sampler: Send + Sync + 'static;
    type ShaderModule: Send + Sync + 'static;
    type ComputePipeline: Send + Sync + 'static;
    type RenderPipeline: Send + Sync + 'static;

    /// Limits the device validates descriptors against.
    fn limits(&self) -> &wgpu::Limits;

    fn create_texture(&self, info: &TextureCreateInfo<'_>) -> DeviceResult<Self::Texture>;

    /// Creates the default view of `texture`.
    fn create_texture_view(&self, texture: &Self::Texture) -> DeviceResult<Self::TextureView>;

    /// `entries` are sorted by binding and free of duplicates.
    fn create_bind_group_layout(
        &self,
        entries: &[wgpu::BindGroupLayoutEntry],
    ) -> DeviceResult<Self::BindGroupLayout>;

    fn create_pipeline_layout(
        &self,
        bind_group_layouts: &[&Self::BindGroupLayout],
    ) -> DeviceResult<Self::PipelineLayout>;

    fn create_sampler(&self, descriptor: &SamplerDescriptor) -> DeviceResult<Self::Sampler>;

    fn create_shader_module(
        &self,
        descriptor: &ShaderModuleDescriptor,
    ) -> DeviceResult<Self::ShaderModule>;

    fn create_compute_pipeline(
        &self,
        descriptor: &ComputePipelineDescriptor<Self>,
    ) -> DeviceResult<Self::ComputePipeline>;

    fn create_render_pipeline(
        &self,
        descriptor: &RenderPipelineDescriptor<Self>,
    ) -> DeviceResult<Self::RenderPipeline>;
}
