use vislum_cache::{Cached, Fingerprint, canonical_f32_bits};

use crate::{
    backend::DeviceBackend,
    error::{DeviceError, DeviceResult},
};

/// A sampler. LOD clamps compare by their canonical bits, so `0.0` and `-0.0`
/// describe the same sampler.
#[derive(Debug, Clone, Copy, Fingerprint)]
pub struct SamplerDescriptor {
    pub address_mode_u: wgpu::AddressMode,
    pub address_mode_v: wgpu::AddressMode,
    pub address_mode_w: wgpu::AddressMode,
    pub mag_filter: wgpu::FilterMode,
    pub min_filter: wgpu::FilterMode,
    pub mipmap_filter: wgpu::FilterMode,
    pub lod_min_clamp: f32,
    pub lod_max_clamp: f32,
    pub compare: Option<wgpu::CompareFunction>,
    pub anisotropy_clamp: u16,
    pub border_color: Option<wgpu::SamplerBorderColor>,
}

impl Default for SamplerDescriptor {
    fn default() -> Self {
        Self {
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            lod_min_clamp: 0.0,
            lod_max_clamp: 32.0,
            compare: None,
            anisotropy_clamp: 1,
            border_color: None,
        }
    }
}

impl SamplerDescriptor {
    /// Linear filtering on every axis.
    pub fn linear() -> Self {
        Self {
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        }
    }

    pub(crate) fn validate(&self) -> DeviceResult<()> {
        if self.lod_min_clamp.is_nan() || self.lod_max_clamp.is_nan() {
            return Err(DeviceError::validation("LOD clamps must be numbers"));
        }

        if self.lod_min_clamp < 0.0 {
            return Err(DeviceError::validation(format!(
                "lod_min_clamp {} is negative",
                self.lod_min_clamp
            )));
        }

        if self.lod_min_clamp > self.lod_max_clamp {
            return Err(DeviceError::validation(format!(
                "lod_min_clamp {} is greater than lod_max_clamp {}",
                self.lod_min_clamp, self.lod_max_clamp
            )));
        }

        if self.anisotropy_clamp == 0 {
            return Err(DeviceError::validation("anisotropy_clamp must be at least 1"));
        }

        let all_linear = [self.mag_filter, self.min_filter, self.mipmap_filter]
            .iter()
            .all(|filter| *filter == wgpu::FilterMode::Linear);
        if self.anisotropy_clamp > 1 && !all_linear {
            return Err(DeviceError::validation(
                "anisotropic filtering requires linear filters",
            ));
        }

        Ok(())
    }
}

impl PartialEq for SamplerDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.address_mode_u == other.address_mode_u
            && self.address_mode_v == other.address_mode_v
            && self.address_mode_w == other.address_mode_w
            && self.mag_filter == other.mag_filter
            && self.min_filter == other.min_filter
            && self.mipmap_filter == other.mipmap_filter
            && canonical_f32_bits(self.lod_min_clamp) == canonical_f32_bits(other.lod_min_clamp)
            && canonical_f32_bits(self.lod_max_clamp) == canonical_f32_bits(other.lod_max_clamp)
            && self.compare == other.compare
            && self.anisotropy_clamp == other.anisotropy_clamp
            && self.border_color == other.border_color
    }
}

impl Eq for SamplerDescriptor {}

pub type Sampler<B> = Cached<SamplerDescriptor, <B as DeviceBackend>::Sampler>;
