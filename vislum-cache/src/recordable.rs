use std::ops::Deref;

use crate::{
    error::CacheError,
    key::{ContentKey, KeySlot},
    recorder::FingerprintRecorder,
};

/// Feeds the identity fields of a value into a [`FingerprintRecorder`].
///
/// Implementations must record exactly the fields their `PartialEq` compares, in the
/// same order. Usually derived with `#[derive(Fingerprint)]`.
pub trait Fingerprint {
    fn fingerprint(&self, recorder: &mut FingerprintRecorder);
}

/// An entity that memoizes its own content key after the first fingerprint.
pub trait Recordable: Fingerprint {
    fn key_slot(&self) -> &KeySlot;

    /// Returns the memoized key, computing and storing it on first use.
    fn content_key(&self) -> Result<ContentKey, CacheError> {
        let slot = self.key_slot();
        if let Ok(key) = slot.get() {
            return Ok(key);
        }

        let mut recorder = FingerprintRecorder::new();
        self.fingerprint(&mut recorder);
        let key = recorder.key()?;

        match slot.set(key) {
            Ok(()) => Ok(key),
            // Lost a race against another thread fingerprinting the same content.
            Err(CacheError::KeyAlreadySet { existing, .. }) => Ok(existing),
            Err(error) => Err(error),
        }
    }

    /// Returns the memoized key without computing it.
    #[inline]
    fn key(&self) -> Result<ContentKey, CacheError> {
        self.key_slot().get()
    }

    #[inline]
    fn set_key(&self, key: ContentKey) -> Result<(), CacheError> {
        self.key_slot().set(key)
    }
}

/// A lightweight value describing the object a caller wants.
///
/// Blueprints compare by descriptor value only; the memoized key plays no part in
/// equality.
pub struct Blueprint<D> {
    descriptor: D,
    key: KeySlot,
}

impl<D> Blueprint<D> {
    #[inline]
    pub fn new(descriptor: D) -> Self {
        Self {
            descriptor,
            key: KeySlot::new(),
        }
    }

    #[inline]
    pub fn descriptor(&self) -> &D {
        &self.descriptor
    }

    #[inline]
    pub fn into_descriptor(self) -> D {
        self.descriptor
    }

    pub(crate) fn into_parts(self) -> (D, KeySlot) {
        (self.descriptor, self.key)
    }
}

impl<D: Fingerprint> Fingerprint for Blueprint<D> {
    #[inline]
    fn fingerprint(&self, recorder: &mut FingerprintRecorder) {
        self.descriptor.fingerprint(recorder);
    }
}

impl<D: Fingerprint> Recordable for Blueprint<D> {
    #[inline]
    fn key_slot(&self) -> &KeySlot {
        &self.key
    }
}

impl<D> From<D> for Blueprint<D> {
    fn from(descriptor: D) -> Self {
        Self::new(descriptor)
    }
}

impl<D> Deref for Blueprint<D> {
    type Target = D;

    #[inline]
    fn deref(&self) -> &D {
        &self.descriptor
    }
}

impl<D: Clone> Clone for Blueprint<D> {
    fn clone(&self) -> Self {
        Self {
            descriptor: self.descriptor.clone(),
            key: self.key.clone(),
        }
    }
}

impl<D: PartialEq> PartialEq for Blueprint<D> {
    fn eq(&self, other: &Self) -> bool {
        self.descriptor == other.descriptor
    }
}

impl<D: Eq> Eq for Blueprint<D> {}

impl<D: std::fmt::Debug> std::fmt::Debug for Blueprint<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Blueprint").field(&self.descriptor).finish()
    }
}
