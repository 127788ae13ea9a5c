use vislum_cache::{Cached, Fingerprint};

use crate::{
    backend::DeviceBackend,
    error::{DeviceError, DeviceResult},
};

/// Sample counts a multisample attachment may use.
const SUPPORTED_SAMPLE_COUNTS: [u32; 2] = [1, 4];

/// A render attachment used as a multisample resolve source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Fingerprint)]
pub struct MultisampleAttachmentDescriptor {
    pub format: wgpu::TextureFormat,
    pub width: u32,
    pub height: u32,
    pub sample_count: u32,
}

impl MultisampleAttachmentDescriptor {
    pub fn new(format: wgpu::TextureFormat, width: u32, height: u32, sample_count: u32) -> Self {
        Self {
            format,
            width,
            height,
            sample_count,
        }
    }

    pub(crate) fn validate(&self, limits: &wgpu::Limits) -> DeviceResult<()> {
        if self.width == 0 || self.height == 0 {
            return Err(DeviceError::validation(format!(
                "attachment extent {}x{} is empty",
                self.width, self.height
            )));
        }

        let max = limits.max_texture_dimension_2d;
        if self.width > max || self.height > max {
            return Err(DeviceError::validation(format!(
                "attachment extent {}x{} exceeds the 2D limit of {max}",
                self.width, self.height
            )));
        }

        if !SUPPORTED_SAMPLE_COUNTS.contains(&self.sample_count) {
            return Err(DeviceError::validation(format!(
                "sample count {} is not one of {SUPPORTED_SAMPLE_COUNTS:?}",
                self.sample_count
            )));
        }

        if self.format.is_compressed() {
            return Err(DeviceError::validation(format!(
                "{:?} cannot be rendered to",
                self.format
            )));
        }

        Ok(())
    }
}

/// The texture behind a multisample attachment, with its default view.
pub struct AttachmentTexture<B: DeviceBackend> {
    // Declared before the texture so it is released first.
    view: B::TextureView,
    texture: B::Texture,
}

impl<B: DeviceBackend> AttachmentTexture<B> {
    pub(crate) fn new(texture: B::Texture, view: B::TextureView) -> Self {
        Self { view, texture }
    }

    #[inline]
    pub fn texture(&self) -> &B::Texture {
        &self.texture
    }

    #[inline]
    pub fn view(&self) -> &B::TextureView {
        &self.view
    }
}

pub type MultisampleAttachment<B> = Cached<MultisampleAttachmentDescriptor, AttachmentTexture<B>>;
