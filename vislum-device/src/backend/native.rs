use std::borrow::Cow;

use crate::{
    backend::{DeviceBackend, TextureCreateInfo},
    error::{DeviceError, DeviceResult},
    object::{
        ComputePipelineDescriptor, RenderPipelineDescriptor, SamplerDescriptor,
        ShaderModuleDescriptor,
    },
};

/// Realizes objects on a [`wgpu::Device`].
///
/// Every creation runs inside an out-of-memory and a validation error scope, so
/// failures come back as [`DeviceError`]s instead of reaching the uncaptured
/// error handler.
#[derive(Debug)]
pub struct WgpuBackend {
    device: wgpu::Device,
    queue: wgpu::Queue,
    limits: wgpu::Limits,
}

static_assertions::assert_impl_all!(WgpuBackend: Send, Sync);

impl WgpuBackend {
    pub fn new(device: wgpu::Device, queue: wgpu::Queue) -> Self {
        let limits = device.limits();
        Self {
            device,
            queue,
            limits,
        }
    }

    /// Opens the default adapter without a surface.
    pub fn request_headless() -> DeviceResult<Self> {
        pollster::block_on(async {
            let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
            let adapter = instance
                .request_adapter(&wgpu::RequestAdapterOptions::default())
                .await
                .map_err(|error| DeviceError::Backend(error.to_string()))?;

            log::debug!("wgpu: using adapter {:?}", adapter.get_info().name);

            let (device, queue) = adapter
                .request_device(&wgpu::DeviceDescriptor {
                    label: Some("vislum-device"),
                    ..Default::default()
                })
                .await
                .map_err(|error| DeviceError::Backend(error.to_string()))?;

            Ok(Self::new(device, queue))
        })
    }

    #[inline]
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }

    #[inline]
    pub fn queue(&self) -> &wgpu::Queue {
        &self.queue
    }

    fn scoped<T>(&self, create: impl FnOnce(&wgpu::Device) -> T) -> DeviceResult<T> {
        self.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let object = create(&self.device);

        // Scopes pop in reverse push order.
        let validation = pollster::block_on(self.device.pop_error_scope());
        let out_of_memory = pollster::block_on(self.device.pop_error_scope());

        match out_of_memory.or(validation) {
            None => Ok(object),
            Some(error) => Err(map_error(error)),
        }
    }
}

fn map_error(error: wgpu::Error) -> DeviceError {
    match error {
        wgpu::Error::OutOfMemory { .. } => DeviceError::OutOfMemory,
        wgpu::Error::Validation { description, .. } => DeviceError::Validation(description),
        other => DeviceError::Backend(other.to_string()),
    }
}

impl DeviceBackend for WgpuBackend {
    type Texture = wgpu::Texture;
    type TextureView = wgpu::TextureView;
    type BindGroupLayout = wgpu::BindGroupLayout;
    type PipelineLayout = wgpu::PipelineLayout;
    type Sampler = wgpu::Sampler;
    type ShaderModule = wgpu::ShaderModule;
    type ComputePipeline = wgpu::ComputePipeline;
    type RenderPipeline = wgpu::RenderPipeline;

    fn limits(&self) -> &wgpu::Limits {
        &self.limits
    }

    fn create_texture(&self, info: &TextureCreateInfo<'_>) -> DeviceResult<Self::Texture> {
        self.scoped(|device| {
            device.create_texture(&wgpu::TextureDescriptor {
                label: info.label,
                size: wgpu::Extent3d {
                    width: info.width,
                    height: info.height,
                    depth_or_array_layers: 1,
                },
                mip_level_count: 1,
                sample_count: info.sample_count,
                dimension: wgpu::TextureDimension::D2,
                format: info.format,
                usage: info.usage,
                view_formats: &[],
            })
        })
    }

    fn create_texture_view(&self, texture: &Self::Texture) -> DeviceResult<Self::TextureView> {
        self.scoped(|_| texture.create_view(&wgpu::TextureViewDescriptor::default()))
    }

    fn create_bind_group_layout(
        &self,
        entries: &[wgpu::BindGroupLayoutEntry],
    ) -> DeviceResult<Self::BindGroupLayout> {
        self.scoped(|device| {
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: None,
                entries,
            })
        })
    }

    fn create_pipeline_layout(
        &self,
        bind_group_layouts: &[&Self::BindGroupLayout],
    ) -> DeviceResult<Self::PipelineLayout> {
        self.scoped(|device| {
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: None,
                bind_group_layouts,
                push_constant_ranges: &[],
            })
        })
    }

    fn create_sampler(&self, descriptor: &SamplerDescriptor) -> DeviceResult<Self::Sampler> {
        self.scoped(|device| {
            device.create_sampler(&wgpu::SamplerDescriptor {
                label: None,
                address_mode_u: descriptor.address_mode_u,
                address_mode_v: descriptor.address_mode_v,
                address_mode_w: descriptor.address_mode_w,
                mag_filter: descriptor.mag_filter,
                min_filter: descriptor.min_filter,
                mipmap_filter: descriptor.mipmap_filter,
                lod_min_clamp: descriptor.lod_min_clamp,
                lod_max_clamp: descriptor.lod_max_clamp,
                compare: descriptor.compare,
                anisotropy_clamp: descriptor.anisotropy_clamp,
                border_color: descriptor.border_color,
            })
        })
    }

    fn create_shader_module(
        &self,
        descriptor: &ShaderModuleDescriptor,
    ) -> DeviceResult<Self::ShaderModule> {
        self.scoped(|device| {
            device.create_shader_module(wgpu::ShaderModuleDescriptor {
                label: None,
                source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(descriptor.source())),
            })
        })
    }

    fn create_compute_pipeline(
        &self,
        descriptor: &ComputePipelineDescriptor<Self>,
    ) -> DeviceResult<Self::ComputePipeline> {
        self.scoped(|device| {
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: None,
                layout: Some(descriptor.layout.resource()),
                module: descriptor.module.resource(),
                entry_point: Some(descriptor.entry_point.as_str()),
                compilation_options: Default::default(),
                cache: None,
            })
        })
    }

    fn create_render_pipeline(
        &self,
        descriptor: &RenderPipelineDescriptor<Self>,
    ) -> DeviceResult<Self::RenderPipeline> {
        let targets: Vec<_> = descriptor
            .color_targets
            .iter()
            .cloned()
            .map(Some)
            .collect();
        let depth_stencil = descriptor
            .depth_stencil_format
            .map(|format| wgpu::DepthStencilState {
                format,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            });

        self.scoped(|device| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: None,
                layout: Some(descriptor.layout.resource()),
                vertex: wgpu::VertexState {
                    module: descriptor.vertex_module.resource(),
                    entry_point: Some(descriptor.vertex_entry_point.as_str()),
                    compilation_options: Default::default(),
                    buffers: &[],
                },
                primitive: descriptor.primitive,
                depth_stencil,
                multisample: wgpu::MultisampleState {
                    count: descriptor.sample_count,
                    ..Default::default()
                },
                fragment: Some(wgpu::FragmentState {
                    module: descriptor.fragment_module.resource(),
                    entry_point: Some(descriptor.fragment_entry_point.as_str()),
                    compilation_options: Default::default(),
                    targets: &targets,
                }),
                multiview: None,
                cache: None,
            })
        })
    }
}
