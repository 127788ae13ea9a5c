use smallvec::SmallVec;
use vislum_cache::{Cached, Fingerprint};

use crate::{
    backend::DeviceBackend,
    error::{DeviceError, DeviceResult},
    object::{PipelineLayout, ShaderModule},
};

/// Sample counts a render pipeline may target.
const SUPPORTED_SAMPLE_COUNTS: [u32; 2] = [1, 4];

fn validate_stage<B: DeviceBackend>(
    module: &ShaderModule<B>,
    entry_point: &str,
    stage: naga::ShaderStage,
) -> DeviceResult<()> {
    if module.descriptor().has_entry_point(entry_point, stage) {
        return Ok(());
    }

    Err(DeviceError::validation(format!(
        "shader module has no {stage:?} entry point named {entry_point:?}"
    )))
}

/// A compute pipeline. The layout and module are recorded by their content
/// keys, so pipelines built from equal layouts and modules are shared.
#[derive(Fingerprint)]
pub struct ComputePipelineDescriptor<B: DeviceBackend> {
    #[fingerprint(object)]
    pub layout: PipelineLayout<B>,
    #[fingerprint(object)]
    pub module: ShaderModule<B>,
    pub entry_point: String,
}

impl<B: DeviceBackend> ComputePipelineDescriptor<B> {
    pub fn new(
        layout: PipelineLayout<B>,
        module: ShaderModule<B>,
        entry_point: impl Into<String>,
    ) -> Self {
        Self {
            layout,
            module,
            entry_point: entry_point.into(),
        }
    }

    pub(crate) fn validate(&self) -> DeviceResult<()> {
        validate_stage::<B>(&self.module, &self.entry_point, naga::ShaderStage::Compute)
    }
}

impl<B: DeviceBackend> Clone for ComputePipelineDescriptor<B> {
    fn clone(&self) -> Self {
        Self {
            layout: self.layout.clone(),
            module: self.module.clone(),
            entry_point: self.entry_point.clone(),
        }
    }
}

impl<B: DeviceBackend> PartialEq for ComputePipelineDescriptor<B> {
    fn eq(&self, other: &Self) -> bool {
        self.layout == other.layout
            && self.module == other.module
            && self.entry_point == other.entry_point
    }
}

impl<B: DeviceBackend> Eq for ComputePipelineDescriptor<B> {}

impl<B: DeviceBackend> std::fmt::Debug for ComputePipelineDescriptor<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ComputePipelineDescriptor")
            .field("layout", &self.layout)
            .field("module", &self.module)
            .field("entry_point", &self.entry_point)
            .finish()
    }
}

pub type ComputePipeline<B> =
    Cached<ComputePipelineDescriptor<B>, <B as DeviceBackend>::ComputePipeline>;

/// A render pipeline without vertex buffers.
///
/// The layout and both modules are recorded by their content keys.
#[derive(Fingerprint)]
pub struct RenderPipelineDescriptor<B: DeviceBackend> {
    #[fingerprint(object)]
    pub layout: PipelineLayout<B>,
    #[fingerprint(object)]
    pub vertex_module: ShaderModule<B>,
    pub vertex_entry_point: String,
    #[fingerprint(object)]
    pub fragment_module: ShaderModule<B>,
    pub fragment_entry_point: String,
    pub color_targets: SmallVec<[wgpu::ColorTargetState; 4]>,
    pub depth_stencil_format: Option<wgpu::TextureFormat>,
    pub primitive: wgpu::PrimitiveState,
    pub sample_count: u32,
}

impl<B: DeviceBackend> RenderPipelineDescriptor<B> {
    /// A triangle-list pipeline rendering to one color target of `format`.
    pub fn new(
        layout: PipelineLayout<B>,
        vertex_module: ShaderModule<B>,
        fragment_module: ShaderModule<B>,
        format: wgpu::TextureFormat,
    ) -> Self {
        Self {
            layout,
            vertex_module,
            vertex_entry_point: "vs_main".to_string(),
            fragment_module,
            fragment_entry_point: "fs_main".to_string(),
            color_targets: SmallVec::from_elem(format.into(), 1),
            depth_stencil_format: None,
            primitive: wgpu::PrimitiveState::default(),
            sample_count: 1,
        }
    }

    pub(crate) fn validate(&self, limits: &wgpu::Limits) -> DeviceResult<()> {
        validate_stage::<B>(
            &self.vertex_module,
            &self.vertex_entry_point,
            naga::ShaderStage::Vertex,
        )?;
        validate_stage::<B>(
            &self.fragment_module,
            &self.fragment_entry_point,
            naga::ShaderStage::Fragment,
        )?;

        if self.color_targets.is_empty() && self.depth_stencil_format.is_none() {
            return Err(DeviceError::validation(
                "render pipeline has no color target and no depth-stencil format",
            ));
        }

        if self.color_targets.len() > limits.max_color_attachments as usize {
            return Err(DeviceError::validation(format!(
                "{} color targets exceed the limit of {}",
                self.color_targets.len(),
                limits.max_color_attachments
            )));
        }

        if let Some(format) = self
            .depth_stencil_format
            .filter(|format| !format.is_depth_stencil_format())
        {
            return Err(DeviceError::validation(format!(
                "{format:?} is not a depth-stencil format"
            )));
        }

        if !SUPPORTED_SAMPLE_COUNTS.contains(&self.sample_count) {
            return Err(DeviceError::validation(format!(
                "sample count {} is not one of {SUPPORTED_SAMPLE_COUNTS:?}",
                self.sample_count
            )));
        }

        Ok(())
    }
}

impl<B: DeviceBackend> Clone for RenderPipelineDescriptor<B> {
    fn clone(&self) -> Self {
        Self {
            layout: self.layout.clone(),
            vertex_module: self.vertex_module.clone(),
            vertex_entry_point: self.vertex_entry_point.clone(),
            fragment_module: self.fragment_module.clone(),
            fragment_entry_point: self.fragment_entry_point.clone(),
            color_targets: self.color_targets.clone(),
            depth_stencil_format: self.depth_stencil_format,
            primitive: self.primitive,
            sample_count: self.sample_count,
        }
    }
}

impl<B: DeviceBackend> PartialEq for RenderPipelineDescriptor<B> {
    fn eq(&self, other: &Self) -> bool {
        self.layout == other.layout
            && self.vertex_module == other.vertex_module
            && self.vertex_entry_point == other.vertex_entry_point
            && self.fragment_module == other.fragment_module
            && self.fragment_entry_point == other.fragment_entry_point
            && self.color_targets == other.color_targets
            && self.depth_stencil_format == other.depth_stencil_format
            && self.primitive == other.primitive
            && self.sample_count == other.sample_count
    }
}

impl<B: DeviceBackend> Eq for RenderPipelineDescriptor<B> {}

impl<B: DeviceBackend> std::fmt::Debug for RenderPipelineDescriptor<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderPipelineDescriptor")
            .field("layout", &self.layout)
            .field("vertex_module", &self.vertex_module)
            .field("vertex_entry_point", &self.vertex_entry_point)
            .field("fragment_module", &self.fragment_module)
            .field("fragment_entry_point", &self.fragment_entry_point)
            .field("color_targets", &self.color_targets)
            .field("depth_stencil_format", &self.depth_stencil_format)
            .field("primitive", &self.primitive)
            .field("sample_count", &self.sample_count)
            .finish()
    }
}

pub type RenderPipeline<B> =
    Cached<RenderPipelineDescriptor<B>, <B as DeviceBackend>::RenderPipeline>;
