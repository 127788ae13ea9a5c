use vislum_cache::{Blueprint, CacheStats, Cached, ContentCache, Fingerprint};

use crate::{
    backend::{DeviceBackend, HeadlessBackend, TextureCreateInfo},
    error::DeviceResult,
    object::{
        AttachmentTexture, BindGroupLayout, BindGroupLayoutDescriptor, ComputePipeline,
        ComputePipelineDescriptor, MultisampleAttachment, MultisampleAttachmentDescriptor,
        PipelineLayout, PipelineLayoutDescriptor, RenderPipeline, RenderPipelineDescriptor,
        Sampler, SamplerDescriptor, ShaderModule, ShaderModuleDescriptor,
    },
};

/// How a [`Device`] is set up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceCreateInfo {
    /// Prefix of the device's log lines and cache labels.
    pub label: String,
    /// When off, every request realizes a new object that no cache knows of.
    pub object_caching: bool,
    /// Initial capacity of each object cache.
    pub cache_capacity: usize,
}

impl Default for DeviceCreateInfo {
    fn default() -> Self {
        Self {
            label: "device".to_string(),
            object_caching: true,
            cache_capacity: 0,
        }
    }
}

/// Statistics of every object cache of a device.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeviceCacheStats {
    pub compute_pipelines: CacheStats,
    pub render_pipelines: CacheStats,
    pub multisample_attachments: CacheStats,
    pub bind_group_layouts: CacheStats,
    pub pipeline_layouts: CacheStats,
    pub samplers: CacheStats,
    pub shader_modules: CacheStats,
}

// Caches are declared (and dropped) before the caches of the objects their
// descriptors hold: pipelines before layouts and modules, pipeline layouts
// before bind group layouts.
struct DeviceCaches<B: DeviceBackend> {
    compute_pipelines: ContentCache<ComputePipelineDescriptor<B>, B::ComputePipeline>,
    render_pipelines: ContentCache<RenderPipelineDescriptor<B>, B::RenderPipeline>,
    multisample_attachments: ContentCache<MultisampleAttachmentDescriptor, AttachmentTexture<B>>,
    pipeline_layouts: ContentCache<PipelineLayoutDescriptor<B>, B::PipelineLayout>,
    bind_group_layouts: ContentCache<BindGroupLayoutDescriptor, B::BindGroupLayout>,
    samplers: ContentCache<SamplerDescriptor, B::Sampler>,
    shader_modules: ContentCache<ShaderModuleDescriptor, B::ShaderModule>,
}

impl<B: DeviceBackend> DeviceCaches<B> {
    fn new(label: &str, capacity: usize) -> Self {
        let cache_label = |category: &str| format!("{label}/{category}");

        Self {
            compute_pipelines: ContentCache::with_capacity(
                cache_label("compute pipelines"),
                capacity,
            ),
            render_pipelines: ContentCache::with_capacity(
                cache_label("render pipelines"),
                capacity,
            ),
            multisample_attachments: ContentCache::with_capacity(
                cache_label("multisample attachments"),
                capacity,
            ),
            bind_group_layouts: ContentCache::with_capacity(
                cache_label("bind group layouts"),
                capacity,
            ),
            pipeline_layouts: ContentCache::with_capacity(cache_label("pipeline layouts"), capacity),
            samplers: ContentCache::with_capacity(cache_label("samplers"), capacity),
            shader_modules: ContentCache::with_capacity(cache_label("shader modules"), capacity),
        }
    }
}

/// Realizes driver objects on a backend, handing out one shared object per
/// distinct descriptor.
///
/// Requests whose descriptor is invalid fail before any cache is consulted.
pub struct Device<B: DeviceBackend> {
    label: String,
    object_caching: bool,
    caches: DeviceCaches<B>,
    backend: B,
}

static_assertions::assert_impl_all!(Device<HeadlessBackend>: Send, Sync);

impl<B: DeviceBackend> Device<B> {
    pub fn new(backend: B, create_info: DeviceCreateInfo) -> Self {
        let DeviceCreateInfo {
            label,
            object_caching,
            cache_capacity,
        } = create_info;

        log::debug!("{label}: created (object caching {object_caching})");

        Self {
            caches: DeviceCaches::new(&label, cache_capacity),
            label,
            object_caching,
            backend,
        }
    }

    #[inline]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[inline]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    #[inline]
    pub fn limits(&self) -> &wgpu::Limits {
        self.backend.limits()
    }

    #[inline]
    pub fn object_caching(&self) -> bool {
        self.object_caching
    }

    /// Returns a texture and view matching `descriptor`, shared with every live
    /// attachment that has the same descriptor.
    pub fn get_or_create_multisample_attachment(
        &self,
        descriptor: MultisampleAttachmentDescriptor,
    ) -> DeviceResult<MultisampleAttachment<B>> {
        descriptor.validate(self.limits())?;

        self.realize(&self.caches.multisample_attachments, descriptor, |descriptor| {
            let texture = self.backend.create_texture(&TextureCreateInfo {
                label: Some("multisample attachment"),
                format: descriptor.format,
                width: descriptor.width,
                height: descriptor.height,
                sample_count: descriptor.sample_count,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            })?;
            let view = self.backend.create_texture_view(&texture)?;
            Ok(AttachmentTexture::new(texture, view))
        })
    }

    pub fn get_or_create_bind_group_layout(
        &self,
        descriptor: BindGroupLayoutDescriptor,
    ) -> DeviceResult<BindGroupLayout<B>> {
        descriptor.validate(self.limits())?;

        self.realize(&self.caches.bind_group_layouts, descriptor, |descriptor| {
            self.backend.create_bind_group_layout(descriptor.entries())
        })
    }

    pub fn get_or_create_pipeline_layout(
        &self,
        descriptor: PipelineLayoutDescriptor<B>,
    ) -> DeviceResult<PipelineLayout<B>> {
        descriptor.validate(self.limits())?;

        self.realize(&self.caches.pipeline_layouts, descriptor, |descriptor| {
            let layouts: Vec<&B::BindGroupLayout> = descriptor
                .bind_group_layouts()
                .iter()
                .map(Cached::resource)
                .collect();
            self.backend.create_pipeline_layout(&layouts)
        })
    }

    pub fn get_or_create_sampler(&self, descriptor: SamplerDescriptor) -> DeviceResult<Sampler<B>> {
        descriptor.validate()?;

        self.realize(&self.caches.samplers, descriptor, |descriptor| {
            self.backend.create_sampler(descriptor)
        })
    }

    pub fn get_or_create_shader_module(
        &self,
        descriptor: ShaderModuleDescriptor,
    ) -> DeviceResult<ShaderModule<B>> {
        descriptor.validate()?;

        self.realize(&self.caches.shader_modules, descriptor, |descriptor| {
            self.backend.create_shader_module(descriptor)
        })
    }

    /// Returns a compute pipeline shared by every request naming the same
    /// layout, module and entry point.
    pub fn get_or_create_compute_pipeline(
        &self,
        descriptor: ComputePipelineDescriptor<B>,
    ) -> DeviceResult<ComputePipeline<B>> {
        descriptor.validate()?;

        self.realize(&self.caches.compute_pipelines, descriptor, |descriptor| {
            self.backend.create_compute_pipeline(descriptor)
        })
    }

    pub fn get_or_create_render_pipeline(
        &self,
        descriptor: RenderPipelineDescriptor<B>,
    ) -> DeviceResult<RenderPipeline<B>> {
        descriptor.validate(self.limits())?;

        self.realize(&self.caches.render_pipelines, descriptor, |descriptor| {
            self.backend.create_render_pipeline(descriptor)
        })
    }

    pub fn cache_stats(&self) -> DeviceCacheStats {
        DeviceCacheStats {
            compute_pipelines: self.caches.compute_pipelines.stats(),
            render_pipelines: self.caches.render_pipelines.stats(),
            multisample_attachments: self.caches.multisample_attachments.stats(),
            bind_group_layouts: self.caches.bind_group_layouts.stats(),
            pipeline_layouts: self.caches.pipeline_layouts.stats(),
            samplers: self.caches.samplers.stats(),
            shader_modules: self.caches.shader_modules.stats(),
        }
    }

    fn realize<D, R, F>(
        &self,
        cache: &ContentCache<D, R>,
        descriptor: D,
        factory: F,
    ) -> DeviceResult<Cached<D, R>>
    where
        D: Fingerprint + Eq,
        F: FnOnce(&D) -> DeviceResult<R>,
    {
        let blueprint = Blueprint::new(descriptor);

        if !self.object_caching {
            let resource = factory(blueprint.descriptor())?;
            return Ok(Cached::detached(blueprint, resource)?);
        }

        cache.find_or_create(blueprint, factory)
    }
}

impl<B: DeviceBackend + std::fmt::Debug> std::fmt::Debug for Device<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Device")
            .field("label", &self.label)
            .field("object_caching", &self.object_caching)
            .field("backend", &self.backend)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{backend::ObjectKind, error::DeviceError};

    fn device() -> Device<HeadlessBackend> {
        let _ = env_logger::builder().is_test(true).try_init();
        Device::new(HeadlessBackend::new(), DeviceCreateInfo::default())
    }

    fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
        wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        }
    }

    #[test]
    fn invalid_descriptors_never_reach_the_cache() {
        let device = device();

        let result = device.get_or_create_bind_group_layout(BindGroupLayoutDescriptor::new([
            texture_entry(0),
            texture_entry(0),
        ]));
        assert!(matches!(result, Err(DeviceError::Validation(_))));

        let result = device.get_or_create_multisample_attachment(
            MultisampleAttachmentDescriptor::new(wgpu::TextureFormat::Rgba8Unorm, 256, 256, 8),
        );
        assert!(matches!(result, Err(DeviceError::Validation(_))));

        assert_eq!(device.cache_stats(), DeviceCacheStats::default());
        assert_eq!(device.backend().created(ObjectKind::BindGroupLayout), 0);
        assert_eq!(device.backend().created(ObjectKind::Texture), 0);
    }

    #[test]
    fn caching_can_be_turned_off() {
        let device = Device::new(
            HeadlessBackend::new(),
            DeviceCreateInfo {
                object_caching: false,
                ..Default::default()
            },
        );

        let a = device.get_or_create_sampler(SamplerDescriptor::default()).unwrap();
        let b = device.get_or_create_sampler(SamplerDescriptor::default()).unwrap();

        assert!(!Cached::ptr_eq(&a, &b));
        assert_eq!(a, b);
        assert!(!a.is_cached_reference());
        assert_eq!(device.backend().created(ObjectKind::Sampler), 2);
        assert_eq!(device.cache_stats().samplers, CacheStats::default());
    }

    #[test]
    fn factory_errors_surface_unchanged() {
        let device = device();
        device
            .backend()
            .inject_failure(ObjectKind::TextureView, DeviceError::OutOfMemory);

        let descriptor =
            MultisampleAttachmentDescriptor::new(wgpu::TextureFormat::Rgba8Unorm, 16, 16, 4);
        assert_eq!(
            device
                .get_or_create_multisample_attachment(descriptor)
                .unwrap_err(),
            DeviceError::OutOfMemory
        );

        // The texture made before the view failed has been released.
        assert_eq!(device.backend().live(ObjectKind::Texture), 0);
        assert_eq!(device.cache_stats().multisample_attachments.entries, 0);

        let attachment = device
            .get_or_create_multisample_attachment(descriptor)
            .unwrap();
        assert!(attachment.is_cached_reference());
    }

    #[test]
    fn shader_modules_are_keyed_on_source() {
        let device = device();
        let source = "@compute @workgroup_size(1) fn main() {}";

        let a = device
            .get_or_create_shader_module(ShaderModuleDescriptor::wgsl(source))
            .unwrap();
        let b = device
            .get_or_create_shader_module(ShaderModuleDescriptor::wgsl(source))
            .unwrap();
        let c = device
            .get_or_create_shader_module(ShaderModuleDescriptor::wgsl(
                "@compute @workgroup_size(2) fn main() {}",
            ))
            .unwrap();

        assert!(Cached::ptr_eq(&a, &b));
        assert!(!Cached::ptr_eq(&a, &c));
        assert_eq!(device.backend().created(ObjectKind::ShaderModule), 2);

        assert!(matches!(
            device.get_or_create_shader_module(ShaderModuleDescriptor::wgsl("fn (")),
            Err(DeviceError::Validation(_))
        ));
        assert_eq!(device.cache_stats().shader_modules.misses, 2);
    }
}
