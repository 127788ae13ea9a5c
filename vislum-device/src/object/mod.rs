//! Descriptors of the objects a [`Device`](crate::Device) deduplicates, and the
//! handle types it returns for them.

mod attachment;
mod bind_group_layout;
mod pipeline;
mod pipeline_layout;
mod sampler;
mod shader_module;

pub use attachment::{AttachmentTexture, MultisampleAttachment, MultisampleAttachmentDescriptor};
pub use bind_group_layout::{BindGroupLayout, BindGroupLayoutDescriptor};
pub use pipeline::{
    ComputePipeline, ComputePipelineDescriptor, RenderPipeline, RenderPipelineDescriptor,
};
pub use pipeline_layout::{PipelineLayout, PipelineLayoutDescriptor};
pub use sampler::{Sampler, SamplerDescriptor};
pub use shader_module::{ShaderModule, ShaderModuleDescriptor};
