use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak, atomic::Ordering};

use rustc_hash::FxHashMap;
use slotmap::SlotMap;
use smallvec::SmallVec;

use crate::{
    cached::{Cached, CachedInner},
    error::CacheError,
    key::ContentKey,
    recordable::{Blueprint, Fingerprint, Recordable},
};

slotmap::new_key_type! {
    /// Index of an entry in a cache table.
    pub(crate) struct EntryKey;
}

/// Counters describing how a cache has been used.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
    /// Number of entries erased by a release or an explicit removal. Evicting an
    /// entry whose representative is being released counts as its release.
    pub uncached: u64,
}

struct Entry<D, R> {
    key: ContentKey,
    descriptor: Arc<D>,
    handle: Weak<CachedInner<D, R>>,
}

struct Table<D, R> {
    entries: SlotMap<EntryKey, Entry<D, R>>,
    buckets: FxHashMap<ContentKey, SmallVec<[EntryKey; 1]>>,
    hits: u64,
    misses: u64,
    uncached: u64,
}

impl<D, R> Table<D, R> {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: SlotMap::with_capacity_and_key(capacity),
            buckets: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            hits: 0,
            misses: 0,
            uncached: 0,
        }
    }

    fn insert(
        &mut self,
        key: ContentKey,
        descriptor: Arc<D>,
        handle: Weak<CachedInner<D, R>>,
    ) -> EntryKey {
        let slot = self.entries.insert(Entry {
            key,
            descriptor,
            handle,
        });
        self.buckets.entry(key).or_default().push(slot);
        slot
    }

    fn erase(&mut self, slot: EntryKey) -> bool {
        let Some(entry) = self.entries.remove(slot) else {
            return false;
        };

        if let Some(bucket) = self.buckets.get_mut(&entry.key) {
            bucket.retain(|candidate| *candidate != slot);
            if bucket.is_empty() {
                self.buckets.remove(&entry.key);
            }
        }

        true
    }

    fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            entries: self.entries.len(),
            uncached: self.uncached,
        }
    }
}

impl<D: Eq, R> Table<D, R> {
    /// Finds the live representative equal to `descriptor`.
    ///
    /// An equal entry whose representative is already being destroyed is evicted
    /// here, its own uncache will then find nothing.
    fn lookup(&mut self, key: ContentKey, descriptor: &D) -> Option<Cached<D, R>> {
        let bucket = self.buckets.get(&key)?;

        let mut dead = None;
        let mut found = None;
        for slot in bucket.iter().copied() {
            let Some(entry) = self.entries.get(slot) else {
                continue;
            };

            if *entry.descriptor != *descriptor {
                continue;
            }

            match entry.handle.upgrade() {
                Some(inner) => found = Some(Cached::from_inner(inner)),
                None => dead = Some(slot),
            }
            break;
        }

        if let Some(slot) = dead {
            log::debug!("evicting entry {slot:?} whose representative is being released");
            if self.erase(slot) {
                self.uncached += 1;
            }
        }

        found
    }
}

pub(crate) struct CacheShared<D, R> {
    label: String,
    table: Mutex<Table<D, R>>,
}

impl<D, R> CacheShared<D, R> {
    #[inline]
    fn lock(&self) -> MutexGuard<'_, Table<D, R>> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Erases `slot` if it still belongs to the object at `object`.
    pub(crate) fn uncache(&self, slot: EntryKey, object: *const CachedInner<D, R>) -> bool {
        let mut table = self.lock();

        let owned = table
            .entries
            .get(slot)
            .is_some_and(|entry| std::ptr::eq(entry.handle.as_ptr(), object));
        if !owned {
            log::trace!("{}: entry {slot:?} already gone", self.label);
            return false;
        }

        table.erase(slot);
        table.uncached += 1;
        log::debug!(
            "{}: uncached entry {slot:?} ({} left)",
            self.label,
            table.entries.len()
        );
        true
    }
}

/// A content-addressed cache of reference-counted objects.
///
/// Objects are looked up by the [`ContentKey`] of their descriptor, then confirmed
/// with a full equality check. The cache never owns a reference to what it tracks:
/// the last [`Cached`] handle to be dropped removes its own entry.
///
/// Every operation runs under a single table lock. `find_or_create` keeps the lock
/// while the factory runs, so two requests for the same content can never both
/// construct. A factory must therefore not touch the cache it is called from.
pub struct ContentCache<D, R> {
    shared: Arc<CacheShared<D, R>>,
}

static_assertions::assert_impl_all!(ContentCache<(), ()>: Send, Sync);

impl<D, R> ContentCache<D, R> {
    pub fn new(label: impl Into<String>) -> Self {
        Self::with_capacity(label, 0)
    }

    pub fn with_capacity(label: impl Into<String>, capacity: usize) -> Self {
        Self {
            shared: Arc::new(CacheShared {
                label: label.into(),
                table: Mutex::new(Table::with_capacity(capacity)),
            }),
        }
    }

    #[inline]
    pub fn label(&self) -> &str {
        &self.shared.label
    }

    /// Number of entries currently tracked.
    pub fn len(&self) -> usize {
        self.shared.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        self.shared.lock().stats()
    }

    /// Erases `object` from this cache.
    ///
    /// Returns `true` if an entry was erased. Removing an object twice, an object that
    /// was never inserted, or an object from another cache does nothing.
    pub fn remove(&self, object: &Cached<D, R>) -> bool {
        let inner = object.inner();
        if !std::ptr::eq(inner.cache.as_ptr(), Arc::as_ptr(&self.shared)) {
            return false;
        }

        let Some(slot) = inner.slot else {
            return false;
        };

        if !inner.cached.swap(false, Ordering::AcqRel) {
            return false;
        }

        self.shared.uncache(slot, Arc::as_ptr(object.arc()))
    }

    /// Drops every entry. Live objects stay usable but stop being cached references,
    /// so releasing them later never touches this cache.
    ///
    /// Returns the number of entries that were dropped.
    pub fn clear(&self) -> usize {
        let handles: Vec<Weak<CachedInner<D, R>>> = {
            let mut table = self.shared.lock();
            table.buckets.clear();
            table
                .entries
                .drain()
                .map(|(_, entry)| entry.handle)
                .collect()
        };

        // Upgraded handles are released outside the lock.
        let count = handles.len();
        for handle in handles {
            if let Some(inner) = handle.upgrade() {
                inner.cached.store(false, Ordering::Release);
            }
        }

        count
    }
}

impl<D, R> ContentCache<D, R>
where
    D: Fingerprint + Eq,
{
    /// Returns the live object equal to `blueprint`, if any. Never inserts.
    pub fn find(&self, blueprint: &Blueprint<D>) -> Result<Option<Cached<D, R>>, CacheError> {
        let key = blueprint.content_key()?;
        Ok(self.shared.lock().lookup(key, blueprint.descriptor()))
    }

    /// Returns the live object equal to `blueprint`, or realizes a new one with
    /// `factory` and caches it.
    ///
    /// A factory error is returned as is and leaves the cache untouched.
    pub fn find_or_create<E, F>(&self, blueprint: Blueprint<D>, factory: F) -> Result<Cached<D, R>, E>
    where
        E: From<CacheError>,
        F: FnOnce(&D) -> Result<R, E>,
    {
        let key = blueprint.content_key()?;
        let mut table = self.shared.lock();

        if let Some(found) = table.lookup(key, blueprint.descriptor()) {
            table.hits += 1;
            log::trace!("{}: hit {key}", self.shared.label);
            return Ok(found);
        }

        table.misses += 1;
        let resource = factory(blueprint.descriptor())?;

        let (descriptor, key_slot) = blueprint.into_parts();
        let descriptor = Arc::new(descriptor);
        let cache = Arc::downgrade(&self.shared);
        let inner = Arc::new_cyclic(|handle| {
            let slot = table.insert(key, descriptor.clone(), handle.clone());
            CachedInner::new(descriptor, key_slot, resource, Some(slot), cache)
        });

        log::debug!(
            "{}: cached {key} ({} entries)",
            self.shared.label,
            table.entries.len()
        );

        Ok(Cached::from_inner(inner))
    }
}

impl<D, R> Drop for ContentCache<D, R> {
    fn drop(&mut self) {
        let live = self.len();
        if live > 0 {
            log::warn!(
                "{}: cache torn down with {live} live entries, detaching them",
                self.shared.label
            );
        }
        self.clear();
    }
}

impl<D, R> std::fmt::Debug for ContentCache<D, R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentCache")
            .field("label", &self.shared.label)
            .field("stats", &self.stats())
            .finish()
    }
}
