use vislum_cache::CacheError;

/// Errors raised while creating device objects.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    #[error("out of device memory")]
    OutOfMemory,

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("backend error: {0}")]
    Backend(String),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

impl DeviceError {
    pub(crate) fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }
}

pub type DeviceResult<T> = Result<T, DeviceError>;
