//! A device that deduplicates the immutable objects it creates.
//!
//! Every `get_or_create_*` call validates its descriptor, then returns the live
//! object with the same content if there is one, or realizes a new one on the
//! [`DeviceBackend`]. Objects leave their cache when the last handle to them is
//! dropped.

pub mod backend;
pub mod device;
pub mod error;
pub mod object;

pub use backend::{DeviceBackend, HeadlessBackend, HeadlessObject, ObjectKind, WgpuBackend};
pub use device::{Device, DeviceCacheStats, DeviceCreateInfo};
pub use error::{DeviceError, DeviceResult};
pub use object::*;
