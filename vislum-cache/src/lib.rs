//! Content-addressed caching of reference-counted objects.
//!
//! A caller describes the object it wants with a [`Blueprint`]. The
//! [`ContentCache`] fingerprints the blueprint, looks for a live object with equal
//! content and hands out a new reference to it, or asks a factory to realize one.
//! Realized objects are [`Cached`] handles which erase themselves from their cache
//! when the last reference goes away.

extern crate self as vislum_cache;

pub mod cache;
pub mod cached;
pub mod error;
pub mod key;
pub mod recordable;
pub mod recorder;

pub use cache::{CacheStats, ContentCache};
pub use cached::Cached;
pub use error::CacheError;
pub use key::{ContentKey, KeySlot};
pub use recordable::{Blueprint, Fingerprint, Recordable};
pub use recorder::{FingerprintRecorder, canonical_f32_bits, canonical_f64_bits};

/// Derives [`Fingerprint`] by recording every field in declaration order.
///
/// * `#[fingerprint(skip)]` leaves a field out.
/// * `#[fingerprint(object)]` records a nested [`Recordable`] by its content key.
/// * `#[fingerprint(objects)]` records the length of an iterable field, then every
///   element the same way.
///
/// `f32` and `f64` fields are recorded by their canonical bits.
pub use vislum_cache_macros::Fingerprint;
