use std::{
    sync::{
        Arc, Barrier,
        atomic::{AtomicUsize, Ordering},
    },
};

use proptest::prelude::*;
use vislum_cache::{
    Blueprint, CacheError, Cached, ContentCache, Fingerprint, FingerprintRecorder, Recordable,
};

#[derive(Debug, Clone, PartialEq, Eq, Fingerprint)]
struct Descriptor {
    format: u8,
    width: u32,
    height: u32,
    sample_count: u32,
}

/// Stand-in for an allocation: counts its own release.
struct Allocation {
    released: Arc<AtomicUsize>,
}

impl Drop for Allocation {
    fn drop(&mut self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}

struct Harness {
    cache: ContentCache<Descriptor, Allocation>,
    allocated: AtomicUsize,
    released: Arc<AtomicUsize>,
}

impl Harness {
    fn new() -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        Self {
            cache: ContentCache::new("allocations"),
            allocated: AtomicUsize::new(0),
            released: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn request(&self, descriptor: Descriptor) -> Cached<Descriptor, Allocation> {
        self.cache
            .find_or_create(Blueprint::new(descriptor), |_| {
                self.allocated.fetch_add(1, Ordering::SeqCst);
                Ok::<_, CacheError>(Allocation {
                    released: self.released.clone(),
                })
            })
            .unwrap()
    }
}

fn descriptor(sample_count: u32) -> Descriptor {
    Descriptor {
        format: 0,
        width: 256,
        height: 256,
        sample_count,
    }
}

#[test]
fn multisample_attachment_scenario() {
    let harness = Harness::new();

    let first = harness.request(descriptor(4));
    let single = harness.request(descriptor(1));
    let second = harness.request(descriptor(4));

    assert!(Cached::ptr_eq(&first, &second));
    assert!(!Cached::ptr_eq(&first, &single));
    assert_eq!(first.ref_count(), 2);
    assert_eq!(harness.allocated.load(Ordering::SeqCst), 2);

    drop(first);
    assert_eq!(harness.cache.stats().uncached, 0);
    drop(second);
    assert_eq!(harness.cache.stats().uncached, 1);
    assert_eq!(harness.released.load(Ordering::SeqCst), 1);

    assert!(single.is_cached_reference());
    assert_eq!(harness.cache.len(), 1);
}

#[test]
fn concurrent_requests_share_one_representative() {
    const THREADS: usize = 8;

    let harness = Arc::new(Harness::new());
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let harness = harness.clone();
            let barrier = barrier.clone();
            std::thread::spawn(move || {
                barrier.wait();
                harness.request(descriptor(4))
            })
        })
        .collect();

    let objects: Vec<_> = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .collect();

    assert_eq!(harness.allocated.load(Ordering::SeqCst), 1);
    assert!(objects.iter().all(|object| Cached::ptr_eq(object, &objects[0])));

    drop(objects);
    assert!(harness.cache.is_empty());
    assert_eq!(harness.released.load(Ordering::SeqCst), 1);
}

fn descriptor_strategy() -> impl Strategy<Value = Descriptor> {
    (0u8..3, 1u32..4, 1u32..4, prop_oneof![Just(1u32), Just(4u32)]).prop_map(
        |(format, width, height, sample_count)| Descriptor {
            format,
            width,
            height,
            sample_count,
        },
    )
}

#[derive(Debug, Clone)]
enum Op {
    Request(Descriptor),
    Release(usize),
    Remove(usize),
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        4 => descriptor_strategy().prop_map(Op::Request),
        2 => any::<usize>().prop_map(Op::Release),
        1 => any::<usize>().prop_map(Op::Remove),
    ]
}

proptest! {
    #[test]
    fn fingerprints_are_a_function_of_content(a in descriptor_strategy(), b in descriptor_strategy()) {
        let key_a = Blueprint::new(a.clone()).content_key().unwrap();
        let key_b = Blueprint::new(b.clone()).content_key().unwrap();
        if a == b {
            prop_assert_eq!(key_a, key_b);
        }
    }

    #[test]
    fn separate_recorders_agree_and_shared_recorders_discriminate(value in any::<u32>()) {
        let a = Blueprint::new(Descriptor { format: 1, width: value, height: 1, sample_count: 1 });
        let b = a.clone();

        let mut recorder_a = FingerprintRecorder::new();
        a.fingerprint(&mut recorder_a);
        let mut recorder_b = FingerprintRecorder::new();
        b.fingerprint(&mut recorder_b);
        prop_assert_eq!(recorder_a.key().unwrap(), recorder_b.key().unwrap());

        let mut shared = FingerprintRecorder::new();
        a.fingerprint(&mut shared);
        let first = shared.key().unwrap();
        b.fingerprint(&mut shared);
        prop_assert_ne!(first, shared.key().unwrap());
    }

    #[test]
    fn at_most_one_live_representative(ops in proptest::collection::vec(op_strategy(), 1..64)) {
        let harness = Harness::new();
        let mut held: Vec<Cached<Descriptor, Allocation>> = Vec::new();

        for op in ops {
            match op {
                Op::Request(descriptor) => held.push(harness.request(descriptor)),
                Op::Release(index) if !held.is_empty() => {
                    let index = index % held.len();
                    held.swap_remove(index);
                }
                Op::Remove(index) if !held.is_empty() => {
                    let index = index % held.len();
                    harness.cache.remove(&held[index]);
                    harness.cache.remove(&held[index]);
                }
                _ => {}
            }

            let mut representatives: Vec<&Cached<Descriptor, Allocation>> = Vec::new();
            for object in held.iter().filter(|object| object.is_cached_reference()) {
                if representatives.iter().any(|known| Cached::ptr_eq(known, object)) {
                    continue;
                }
                prop_assert!(
                    representatives.iter().all(|known| known.descriptor() != object.descriptor())
                );
                representatives.push(object);
            }
            prop_assert_eq!(harness.cache.len(), representatives.len());
        }

        let allocated = harness.allocated.load(Ordering::SeqCst);
        drop(held);
        prop_assert!(harness.cache.is_empty());
        prop_assert_eq!(harness.released.load(Ordering::SeqCst), allocated);
    }
}
