use smallvec::SmallVec;
use vislum_cache::{Cached, Fingerprint};

use crate::{
    backend::DeviceBackend,
    error::{DeviceError, DeviceResult},
};

/// The entries of a bind group layout, kept sorted by binding so the order they
/// were given in does not matter.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Fingerprint)]
pub struct BindGroupLayoutDescriptor {
    entries: SmallVec<[wgpu::BindGroupLayoutEntry; 4]>,
}

impl BindGroupLayoutDescriptor {
    pub fn new(entries: impl IntoIterator<Item = wgpu::BindGroupLayoutEntry>) -> Self {
        let mut entries: SmallVec<[wgpu::BindGroupLayoutEntry; 4]> = entries.into_iter().collect();
        entries.sort_by_key(|entry| entry.binding);
        Self { entries }
    }

    #[inline]
    pub fn entries(&self) -> &[wgpu::BindGroupLayoutEntry] {
        &self.entries
    }

    pub(crate) fn validate(&self, limits: &wgpu::Limits) -> DeviceResult<()> {
        if let Some(pair) = self
            .entries
            .windows(2)
            .find(|pair| pair[0].binding == pair[1].binding)
        {
            return Err(DeviceError::validation(format!(
                "binding {} is declared more than once",
                pair[0].binding
            )));
        }

        if self.entries.len() > limits.max_bindings_per_bind_group as usize {
            return Err(DeviceError::validation(format!(
                "{} bindings exceed the limit of {}",
                self.entries.len(),
                limits.max_bindings_per_bind_group
            )));
        }

        Ok(())
    }
}

pub type BindGroupLayout<B> =
    Cached<BindGroupLayoutDescriptor, <B as DeviceBackend>::BindGroupLayout>;

#[cfg(test)]
mod tests {
    use super::*;

    fn uniform(binding: u32) -> wgpu::BindGroupLayoutEntry {
        wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }
    }

    #[test]
    fn entries_are_sorted_by_binding() {
        let descriptor = BindGroupLayoutDescriptor::new([uniform(2), uniform(0), uniform(1)]);
        let bindings: Vec<_> = descriptor.entries().iter().map(|e| e.binding).collect();

        assert_eq!(bindings, [0, 1, 2]);
        assert_eq!(
            descriptor,
            BindGroupLayoutDescriptor::new([uniform(0), uniform(1), uniform(2)])
        );
    }

    #[test]
    fn duplicate_bindings_are_rejected() {
        let descriptor = BindGroupLayoutDescriptor::new([uniform(1), uniform(0), uniform(1)]);
        assert!(matches!(
            descriptor.validate(&wgpu::Limits::default()),
            Err(DeviceError::Validation(_))
        ));
    }

    #[test]
    fn empty_layouts_are_valid() {
        assert!(
            BindGroupLayoutDescriptor::default()
                .validate(&wgpu::Limits::default())
                .is_ok()
        );
    }
}
