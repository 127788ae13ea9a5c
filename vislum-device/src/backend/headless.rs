use std::sync::{
    Arc, Mutex, PoisonError,
    atomic::{AtomicU64, Ordering},
};

use crate::{
    backend::{DeviceBackend, TextureCreateInfo},
    error::{DeviceError, DeviceResult},
    object::{
        ComputePipelineDescriptor, RenderPipelineDescriptor, SamplerDescriptor,
        ShaderModuleDescriptor,
    },
};

/// The categories of objects a [`HeadlessBackend`] hands out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub enum ObjectKind {
    Texture,
    TextureView,
    BindGroupLayout,
    PipelineLayout,
    Sampler,
    ShaderModule,
    ComputePipeline,
    RenderPipeline,
}

impl ObjectKind {
    const COUNT: usize = 8;

    #[inline]
    const fn index(self) -> usize {
        self as usize
    }
}

#[derive(Default)]
struct Counters {
    created: [AtomicU64; ObjectKind::COUNT],
    live: [AtomicU64; ObjectKind::COUNT],
    texture_bytes: AtomicU64,
}

#[derive(Default)]
struct Control {
    texture_budget: Option<u64>,
    failures: Vec<(ObjectKind, DeviceError)>,
}

/// An object realized by a [`HeadlessBackend`].
///
/// Holds no real memory. Dropping it is the release the backend counts.
pub struct HeadlessObject {
    id: u64,
    kind: ObjectKind,
    bytes: u64,
    counters: Arc<Counters>,
}

impl HeadlessObject {
    #[inline]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    /// Texture memory charged to this object. Zero for everything but textures.
    #[inline]
    pub fn bytes(&self) -> u64 {
        self.bytes
    }
}

impl Drop for HeadlessObject {
    fn drop(&mut self) {
        self.counters.live[self.kind.index()].fetch_sub(1, Ordering::SeqCst);
        if self.bytes > 0 {
            self.counters
                .texture_bytes
                .fetch_sub(self.bytes, Ordering::SeqCst);
        }
        log::trace!("headless: released {} #{}", self.kind, self.id);
    }
}

impl std::fmt::Debug for HeadlessObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeadlessObject")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("bytes", &self.bytes)
            .finish()
    }
}

/// A driver stand-in that allocates nothing.
///
/// Counts how many objects of each kind were created and are still alive,
/// optionally enforces a texture memory budget and fails on request.
pub struct HeadlessBackend {
    limits: wgpu::Limits,
    next_id: AtomicU64,
    counters: Arc<Counters>,
    control: Mutex<Control>,
}

static_assertions::assert_impl_all!(HeadlessBackend: Send, Sync);

impl Default for HeadlessBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::with_limits(wgpu::Limits::default())
    }

    pub fn with_limits(limits: wgpu::Limits) -> Self {
        Self {
            limits,
            next_id: AtomicU64::new(1),
            counters: Arc::default(),
            control: Mutex::default(),
        }
    }

    /// Caps the bytes all live textures may occupy together. Allocations past the
    /// cap fail with [`DeviceError::OutOfMemory`].
    pub fn with_texture_budget(self, bytes: u64) -> Self {
        self.lock().texture_budget = Some(bytes);
        self
    }

    /// Makes the next creation of `kind` fail with `error`.
    pub fn inject_failure(&self, kind: ObjectKind, error: DeviceError) {
        self.lock().failures.push((kind, error));
    }

    /// Objects of `kind` created so far.
    pub fn created(&self, kind: ObjectKind) -> u64 {
        self.counters.created[kind.index()].load(Ordering::SeqCst)
    }

    /// Objects of `kind` not released yet.
    pub fn live(&self, kind: ObjectKind) -> u64 {
        self.counters.live[kind.index()].load(Ordering::SeqCst)
    }

    /// Bytes held by live textures.
    pub fn texture_bytes(&self) -> u64 {
        self.counters.texture_bytes.load(Ordering::SeqCst)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn allocate(&self, kind: ObjectKind, bytes: u64) -> DeviceResult<HeadlessObject> {
        let mut control = self.lock();

        if let Some(index) = control.failures.iter().position(|(k, _)| *k == kind) {
            let (_, error) = control.failures.remove(index);
            log::debug!("headless: injected failure for {kind}: {error}");
            return Err(error);
        }

        if let Some(budget) = control.texture_budget {
            let used = self.counters.texture_bytes.load(Ordering::SeqCst);
            if used.saturating_add(bytes) > budget {
                log::debug!("headless: {bytes} bytes requested, {used} of {budget} in use");
                return Err(DeviceError::OutOfMemory);
            }
        }

        self.counters
            .texture_bytes
            .fetch_add(bytes, Ordering::SeqCst);
        self.counters.created[kind.index()].fetch_add(1, Ordering::SeqCst);
        self.counters.live[kind.index()].fetch_add(1, Ordering::SeqCst);
        drop(control);

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        log::trace!("headless: created {kind} #{id}");

        Ok(HeadlessObject {
            id,
            kind,
            bytes,
            counters: self.counters.clone(),
        })
    }
}

impl DeviceBackend for HeadlessBackend {
    type Texture = HeadlessObject;
    type TextureView = HeadlessObject;
    type BindGroupLayout = HeadlessObject;
    type PipelineLayout = HeadlessObject;
    type Sampler = HeadlessObject;
    type ShaderModule = HeadlessObject;
    type ComputePipeline = HeadlessObject;
    type RenderPipeline = HeadlessObject;

    fn limits(&self) -> &wgpu::Limits {
        &self.limits
    }

    fn create_texture(&self, info: &TextureCreateInfo<'_>) -> DeviceResult<Self::Texture> {
        self.allocate(ObjectKind::Texture, info.allocation_size())
    }

    fn create_texture_view(&self, texture: &Self::Texture) -> DeviceResult<Self::TextureView> {
        if texture.kind != ObjectKind::Texture {
            return Err(DeviceError::validation(format!(
                "cannot view a {}",
                texture.kind
            )));
        }
        self.allocate(ObjectKind::TextureView, 0)
    }

    fn create_bind_group_layout(
        &self,
        _entries: &[wgpu::BindGroupLayoutEntry],
    ) -> DeviceResult<Self::BindGroupLayout> {
        self.allocate(ObjectKind::BindGroupLayout, 0)
    }

    fn create_pipeline_layout(
        &self,
        bind_group_layouts: &[&Self::BindGroupLayout],
    ) -> DeviceResult<Self::PipelineLayout> {
        if let Some(layout) = bind_group_layouts
            .iter()
            .find(|layout| layout.kind != ObjectKind::BindGroupLayout)
        {
            return Err(DeviceError::validation(format!(
                "{} #{} is not a bind group layout",
                layout.kind, layout.id
            )));
        }
        self.allocate(ObjectKind::PipelineLayout, 0)
    }

    fn create_sampler(&self, _descriptor: &SamplerDescriptor) -> DeviceResult<Self::Sampler> {
        self.allocate(ObjectKind::Sampler, 0)
    }

    fn create_shader_module(
        &self,
        _descriptor: &ShaderModuleDescriptor,
    ) -> DeviceResult<Self::ShaderModule> {
        self.allocate(ObjectKind::ShaderModule, 0)
    }

    fn create_compute_pipeline(
        &self,
        descriptor: &ComputePipelineDescriptor<Self>,
    ) -> DeviceResult<Self::ComputePipeline> {
        expect_kind(descriptor.layout.resource(), ObjectKind::PipelineLayout)?;
        expect_kind(descriptor.module.resource(), ObjectKind::ShaderModule)?;
        self.allocate(ObjectKind::ComputePipeline, 0)
    }

    fn create_render_pipeline(
        &self,
        descriptor: &RenderPipelineDescriptor<Self>,
    ) -> DeviceResult<Self::RenderPipeline> {
        expect_kind(descriptor.layout.resource(), ObjectKind::PipelineLayout)?;
        expect_kind(descriptor.vertex_module.resource(), ObjectKind::ShaderModule)?;
        expect_kind(descriptor.fragment_module.resource(), ObjectKind::ShaderModule)?;
        self.allocate(ObjectKind::RenderPipeline, 0)
    }
}

fn expect_kind(object: &HeadlessObject, kind: ObjectKind) -> DeviceResult<()> {
    if object.kind == kind {
        return Ok(());
    }

    Err(DeviceError::validation(format!(
        "{} #{} is not a {kind}",
        object.kind, object.id
    )))
}

impl std::fmt::Debug for HeadlessBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeadlessBackend")
            .field("texture_bytes", &self.texture_bytes())
            .finish_non_exhaustive()
    }
}
