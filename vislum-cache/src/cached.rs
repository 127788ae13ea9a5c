use std::{
    ops::Deref,
    sync::{
        Arc, Weak,
        atomic::{AtomicBool, Ordering},
    },
};

use crate::{
    cache::{CacheShared, EntryKey},
    error::CacheError,
    key::KeySlot,
    recordable::{Blueprint, Fingerprint, Recordable},
    recorder::FingerprintRecorder,
};

pub(crate) struct CachedInner<D, R> {
    descriptor: Arc<D>,
    key: KeySlot,
    resource: R,
    /// Set while this object is the representative tracked by `cache`.
    pub(crate) cached: AtomicBool,
    pub(crate) slot: Option<EntryKey>,
    pub(crate) cache: Weak<CacheShared<D, R>>,
}

impl<D, R> CachedInner<D, R> {
    pub(crate) fn new(
        descriptor: Arc<D>,
        key: KeySlot,
        resource: R,
        slot: Option<EntryKey>,
        cache: Weak<CacheShared<D, R>>,
    ) -> Self {
        Self {
            descriptor,
            key,
            resource,
            cached: AtomicBool::new(slot.is_some()),
            slot,
            cache,
        }
    }
}

impl<D, R> Drop for CachedInner<D, R> {
    fn drop(&mut self) {
        // Only the representative ever uncaches, and only once. The resource is
        // released after this, when the fields drop.
        if !self.cached.swap(false, Ordering::AcqRel) {
            return;
        }

        let Some(slot) = self.slot else {
            return;
        };

        if let Some(cache) = self.cache.upgrade() {
            cache.uncache(slot, self as *const Self);
        }
    }
}

/// A reference-counted object realized from a [`Blueprint`].
///
/// Cloning takes a new reference. When the last reference of the cached
/// representative is dropped, it erases itself from its [`ContentCache`] and then
/// releases the resource it owns.
///
/// [`ContentCache`]: crate::ContentCache
pub struct Cached<D, R> {
    inner: Arc<CachedInner<D, R>>,
}

static_assertions::assert_impl_all!(Cached<(), ()>: Send, Sync);

impl<D, R> Cached<D, R> {
    #[inline]
    pub(crate) fn from_inner(inner: Arc<CachedInner<D, R>>) -> Self {
        Self { inner }
    }

    #[inline]
    pub(crate) fn inner(&self) -> &CachedInner<D, R> {
        &self.inner
    }

    #[inline]
    pub(crate) fn arc(&self) -> &Arc<CachedInner<D, R>> {
        &self.inner
    }

    #[inline]
    pub fn descriptor(&self) -> &D {
        &self.inner.descriptor
    }

    #[inline]
    pub fn resource(&self) -> &R {
        &self.inner.resource
    }

    /// Whether this object is the one tracked by a cache.
    #[inline]
    pub fn is_cached_reference(&self) -> bool {
        self.inner.cached.load(Ordering::Acquire)
    }

    /// Number of live references, this one included.
    #[inline]
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    #[inline]
    pub fn ptr_eq(a: &Self, b: &Self) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }
}

impl<D: Fingerprint, R> Cached<D, R> {
    /// Wraps `resource` in an object that is never a cached reference.
    pub fn detached(blueprint: Blueprint<D>, resource: R) -> Result<Self, CacheError> {
        blueprint.content_key()?;
        let (descriptor, key) = blueprint.into_parts();

        Ok(Self {
            inner: Arc::new(CachedInner::new(
                Arc::new(descriptor),
                key,
                resource,
                None,
                Weak::new(),
            )),
        })
    }
}

impl<D, R> Clone for Cached<D, R> {
    #[inline]
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<D, R> Deref for Cached<D, R> {
    type Target = R;

    #[inline]
    fn deref(&self) -> &R {
        &self.inner.resource
    }
}

impl<D: Fingerprint, R> Fingerprint for Cached<D, R> {
    #[inline]
    fn fingerprint(&self, recorder: &mut FingerprintRecorder) {
        self.inner.descriptor.fingerprint(recorder);
    }
}

impl<D: Fingerprint, R> Recordable for Cached<D, R> {
    #[inline]
    fn key_slot(&self) -> &KeySlot {
        &self.inner.key
    }
}

impl<D: PartialEq, R> PartialEq for Cached<D, R> {
    fn eq(&self, other: &Self) -> bool {
        Self::ptr_eq(self, other) || self.inner.descriptor == other.inner.descriptor
    }
}

impl<D: Eq, R> Eq for Cached<D, R> {}

impl<D: std::fmt::Debug, R> std::fmt::Debug for Cached<D, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cached")
            .field("descriptor", &self.inner.descriptor)
            .field("key", &self.inner.key)
            .field("cached", &self.is_cached_reference())
            .field("refs", &self.ref_count())
            .finish()
    }
}
