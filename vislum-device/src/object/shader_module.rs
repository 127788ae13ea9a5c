use vislum_cache::{Cached, Fingerprint};

use crate::{
    backend::DeviceBackend,
    error::{DeviceError, DeviceResult},
};

/// A WGSL shader module, keyed on its source text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Fingerprint)]
pub struct ShaderModuleDescriptor {
    source: String,
}

impl ShaderModuleDescriptor {
    pub fn wgsl(source: impl Into<String>) -> Self {
        Self {
            source: source.into(),
        }
    }

    #[inline]
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Parses and validates the source with naga.
    pub(crate) fn validate(&self) -> DeviceResult<()> {
        self.parse().map(|_| ())
    }

    /// Whether the module declares an entry point called `name` for `stage`.
    pub(crate) fn has_entry_point(&self, name: &str, stage: naga::ShaderStage) -> bool {
        self.parse().is_ok_and(|module| {
            module
                .entry_points
                .iter()
                .any(|entry_point| entry_point.name == name && entry_point.stage == stage)
        })
    }

    fn parse(&self) -> DeviceResult<naga::Module> {
        if self.source.trim().is_empty() {
            return Err(DeviceError::validation("shader source is empty"));
        }

        let module = naga::front::wgsl::parse_str(&self.source).map_err(|error| {
            DeviceError::validation(format!("WGSL parse error: {}", error.message()))
        })?;

        naga::valid::Validator::new(
            naga::valid::ValidationFlags::all(),
            naga::valid::Capabilities::all(),
        )
        .validate(&module)
        .map_err(|error| DeviceError::validation(format!("WGSL validation error: {error}")))?;

        Ok(module)
    }
}

pub type ShaderModule<B> = Cached<ShaderModuleDescriptor, <B as DeviceBackend>::ShaderModule>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_valid_wgsl() {
        let descriptor = ShaderModuleDescriptor::wgsl("@compute @workgroup_size(1) fn main() {}");
        assert!(descriptor.validate().is_ok());
    }

    #[test]
    fn rejects_empty_and_malformed_sources() {
        for source in ["", "   \n", "fn main( {"] {
            assert!(matches!(
                ShaderModuleDescriptor::wgsl(source).validate(),
                Err(DeviceError::Validation(_))
            ));
        }
    }

    #[test]
    fn finds_entry_points_by_stage() {
        let descriptor = ShaderModuleDescriptor::wgsl("@compute @workgroup_size(1) fn main() {}");

        assert!(descriptor.has_entry_point("main", naga::ShaderStage::Compute));
        assert!(!descriptor.has_entry_point("main", naga::ShaderStage::Vertex));
        assert!(!descriptor.has_entry_point("other", naga::ShaderStage::Compute));
    }
}
