use vislum_cache::{Cached, Fingerprint};

use crate::{
    backend::DeviceBackend,
    error::{DeviceError, DeviceResult},
    object::BindGroupLayout,
};

/// A pipeline layout, described by the cached bind group layouts it is made of.
///
/// Nested layouts are recorded by their content keys, so two descriptors that
/// name the same layouts fingerprint the same.
#[derive(Fingerprint)]
pub struct PipelineLayoutDescriptor<B: DeviceBackend> {
    #[fingerprint(objects)]
    bind_group_layouts: Vec<BindGroupLayout<B>>,
}

impl<B: DeviceBackend> PipelineLayoutDescriptor<B> {
    pub fn new(bind_group_layouts: impl IntoIterator<Item = BindGroupLayout<B>>) -> Self {
        Self {
            bind_group_layouts: bind_group_layouts.into_iter().collect(),
        }
    }

    #[inline]
    pub fn bind_group_layouts(&self) -> &[BindGroupLayout<B>] {
        &self.bind_group_layouts
    }

    pub(crate) fn validate(&self, limits: &wgpu::Limits) -> DeviceResult<()> {
        if self.bind_group_layouts.len() > limits.max_bind_groups as usize {
            return Err(DeviceError::validation(format!(
                "{} bind groups exceed the limit of {}",
                self.bind_group_layouts.len(),
                limits.max_bind_groups
            )));
        }

        Ok(())
    }
}

impl<B: DeviceBackend> Clone for PipelineLayoutDescriptor<B> {
    fn clone(&self) -> Self {
        Self {
            bind_group_layouts: self.bind_group_layouts.clone(),
        }
    }
}

impl<B: DeviceBackend> PartialEq for PipelineLayoutDescriptor<B> {
    fn eq(&self, other: &Self) -> bool {
        self.bind_group_layouts == other.bind_group_layouts
    }
}

impl<B: DeviceBackend> Eq for PipelineLayoutDescriptor<B> {}

impl<B: DeviceBackend> std::fmt::Debug for PipelineLayoutDescriptor<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineLayoutDescriptor")
            .field("bind_group_layouts", &self.bind_group_layouts)
            .finish()
    }
}

pub type PipelineLayout<B> =
    Cached<PipelineLayoutDescriptor<B>, <B as DeviceBackend>::PipelineLayout>;
