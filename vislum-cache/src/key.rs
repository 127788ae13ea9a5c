use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::CacheError;

/// A digest of the identity fields of a descriptor.
///
/// Valid keys always have the top bit cleared, so a real digest can never collide
/// with [`ContentKey::EMPTY`].
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, derive_more::Display)]
#[display("{_0:#018x}")]
pub struct ContentKey(u64);

impl ContentKey {
    /// Marks a slot that was never fingerprinted.
    pub const EMPTY: ContentKey = ContentKey(u64::MAX);

    const DIGEST_MASK: u64 = u64::MAX >> 1;

    /// Turns a raw hasher digest into a key.
    #[inline]
    pub const fn from_digest(digest: u64) -> Self {
        Self(digest & Self::DIGEST_MASK)
    }

    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }

    #[inline]
    pub const fn is_empty(self) -> bool {
        self.0 == u64::MAX
    }
}

impl std::fmt::Debug for ContentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            f.write_str("ContentKey(<empty>)")
        } else {
            write!(f, "ContentKey({:#018x})", self.0)
        }
    }
}

/// Write-once storage for a memoized [`ContentKey`].
pub struct KeySlot {
    raw: AtomicU64,
}

impl KeySlot {
    #[inline]
    pub const fn new() -> Self {
        Self {
            raw: AtomicU64::new(ContentKey::EMPTY.raw()),
        }
    }

    /// Creates a slot that already holds `key`.
    #[inline]
    pub const fn with_key(key: ContentKey) -> Self {
        Self {
            raw: AtomicU64::new(key.raw()),
        }
    }

    /// Returns the memoized key.
    pub fn get(&self) -> Result<ContentKey, CacheError> {
        let key = ContentKey(self.raw.load(Ordering::Acquire));
        if key.is_empty() {
            Err(CacheError::NotFingerprinted)
        } else {
            Ok(key)
        }
    }

    /// Memoizes `key`. The first key wins; later attempts are rejected.
    pub fn set(&self, key: ContentKey) -> Result<(), CacheError> {
        match self.raw.compare_exchange(
            ContentKey::EMPTY.raw(),
            key.raw(),
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(_) => Ok(()),
            Err(existing) => Err(CacheError::KeyAlreadySet {
                existing: ContentKey(existing),
                attempted: key,
            }),
        }
    }

    #[inline]
    pub fn is_set(&self) -> bool {
        self.get().is_ok()
    }
}

impl Default for KeySlot {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for KeySlot {
    fn clone(&self) -> Self {
        Self {
            raw: AtomicU64::new(self.raw.load(Ordering::Acquire)),
        }
    }
}

impl std::fmt::Debug for KeySlot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.get() {
            Ok(key) => f.debug_tuple("KeySlot").field(&key).finish(),
            Err(_) => f.write_str("KeySlot(<empty>)"),
        }
    }
}
