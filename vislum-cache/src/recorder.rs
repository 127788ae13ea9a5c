use std::hash::{Hash, Hasher};

use rustc_hash::FxHasher;

use crate::{error::CacheError, key::ContentKey, recordable::Recordable};

/// Canonical bit pattern used to record and compare `f32` identity fields.
///
/// `-0.0` maps onto `0.0` and every NaN maps onto the canonical quiet NaN, so
/// values that compare equal always record equal.
#[inline]
pub fn canonical_f32_bits(value: f32) -> u32 {
    if value == 0.0 {
        0.0f32.to_bits()
    } else if value.is_nan() {
        f32::NAN.to_bits()
    } else {
        value.to_bits()
    }
}

/// `f64` counterpart of [`canonical_f32_bits`].
#[inline]
pub fn canonical_f64_bits(value: f64) -> u64 {
    if value == 0.0 {
        0.0f64.to_bits()
    } else if value.is_nan() {
        f64::NAN.to_bits()
    } else {
        value.to_bits()
    }
}

/// Accumulates the identity fields of an entity into a [`ContentKey`].
///
/// Fields are folded in call order, so an entity must record its fields in the same
/// order its equality function compares them. The digest only depends on what was
/// recorded into this recorder; nested entities are fingerprinted with their own
/// recorder (see [`FingerprintRecorder::record_object`]).
#[derive(Default)]
pub struct FingerprintRecorder {
    hasher: FxHasher,
    recorded: bool,
}

impl FingerprintRecorder {
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Folds one value.
    #[inline]
    pub fn record<T: Hash + ?Sized>(&mut self, value: &T) -> &mut Self {
        value.hash(self);
        self.recorded = true;
        self
    }

    #[inline]
    pub fn record_f32(&mut self, value: f32) -> &mut Self {
        self.record(&canonical_f32_bits(value))
    }

    #[inline]
    pub fn record_f64(&mut self, value: f64) -> &mut Self {
        self.record(&canonical_f64_bits(value))
    }

    /// Folds every element in order, same as calling [`record`](Self::record) once per
    /// element. An empty sequence folds nothing.
    pub fn record_iterable<I>(&mut self, iterable: I) -> &mut Self
    where
        I: IntoIterator,
        I::Item: Hash,
    {
        for item in iterable {
            self.record(&item);
        }
        self
    }

    /// Folds the content key of a nested entity.
    ///
    /// An entity that already memoized its key is folded directly. Otherwise it is
    /// fingerprinted with a fresh recorder, its key is memoized, and then folded. The
    /// state of this recorder never leaks into the nested key.
    pub fn record_object<T: Recordable + ?Sized>(&mut self, object: &T) -> &mut Self {
        let key = match object.content_key() {
            Ok(key) => key,
            Err(error) => {
                // The nested entity recorded nothing; keep this digest deterministic.
                log::warn!("nested entity could not be fingerprinted: {error}");
                debug_assert!(false, "nested entity could not be fingerprinted: {error}");
                ContentKey::EMPTY
            }
        };

        self.record(&key.raw())
    }

    /// Folds the number of nested entities, then each of them in order.
    ///
    /// The count is recorded even for an empty sequence, so empty collections of
    /// objects still produce a key and adjacent collections cannot trade elements.
    pub fn record_objects<'a, T, I>(&mut self, objects: I) -> &mut Self
    where
        T: Recordable + 'a,
        I: IntoIterator<Item = &'a T>,
        I::IntoIter: ExactSizeIterator,
    {
        let objects = objects.into_iter();
        self.record(&objects.len());
        for object in objects {
            self.record_object(object);
        }
        self
    }

    #[inline]
    pub fn has_recorded(&self) -> bool {
        self.recorded
    }

    /// Returns the digest accumulated so far.
    pub fn key(&self) -> Result<ContentKey, CacheError> {
        if !self.recorded {
            return Err(CacheError::NothingRecorded);
        }

        Ok(ContentKey::from_digest(self.hasher.finish()))
    }
}

impl Hasher for FingerprintRecorder {
    #[inline]
    fn finish(&self) -> u64 {
        self.hasher.finish()
    }

    #[inline]
    fn write(&mut self, bytes: &[u8]) {
        self.hasher.write(bytes);
        self.recorded = true;
    }

    #[inline]
    fn write_u8(&mut self, value: u8) {
        self.hasher.write_u8(value);
        self.recorded = true;
    }

    #[inline]
    fn write_u16(&mut self, value: u16) {
        self.hasher.write_u16(value);
        self.recorded = true;
    }

    #[inline]
    fn write_u32(&mut self, value: u32) {
        self.hasher.write_u32(value);
        self.recorded = true;
    }

    #[inline]
    fn write_u64(&mut self, value: u64) {
        self.hasher.write_u64(value);
        self.recorded = true;
    }

    #[inline]
    fn write_usize(&mut self, value: usize) {
        self.hasher.write_usize(value);
        self.recorded = true;
    }
}

impl std::fmt::Debug for FingerprintRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FingerprintRecorder")
            .field("recorded", &self.recorded)
            .field("key", &self.key().ok())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Fingerprint, KeySlot};

    struct Object {
        value: u32,
        key: KeySlot,
    }

    impl Object {
        fn new(value: u32) -> Self {
            Self {
                value,
                key: KeySlot::new(),
            }
        }
    }

    impl Fingerprint for Object {
        fn fingerprint(&self, recorder: &mut FingerprintRecorder) {
            recorder.record(&self.value);
        }
    }

    impl Recordable for Object {
        fn key_slot(&self) -> &KeySlot {
            &self.key
        }
    }

    #[test]
    fn key_before_record_fails() {
        let recorder = FingerprintRecorder::new();
        assert!(!recorder.has_recorded());
        assert_eq!(recorder.key(), Err(CacheError::NothingRecorded));
    }

    #[test]
    fn record_order_matters() {
        let mut a = FingerprintRecorder::new();
        a.record(&1u32).record(&2u32);

        let mut b = FingerprintRecorder::new();
        b.record(&2u32).record(&1u32);

        assert_ne!(a.key().unwrap(), b.key().unwrap());
    }

    #[test]
    fn record_iterable_matches_individual_records() {
        let mut a = FingerprintRecorder::new();
        a.record_iterable([3u16, 5, 8]);

        let mut b = FingerprintRecorder::new();
        b.record(&3u16).record(&5u16).record(&8u16);

        assert_eq!(a.key().unwrap(), b.key().unwrap());
    }

    #[test]
    fn signed_zero_and_nan_record_canonically() {
        let mut a = FingerprintRecorder::new();
        a.record_f32(0.0).record_f64(f64::NAN);

        let mut b = FingerprintRecorder::new();
        b.record_f32(-0.0).record_f64(-f64::NAN);

        assert_eq!(a.key().unwrap(), b.key().unwrap());
    }

    #[test]
    fn same_content_with_separate_recorders_agree() {
        let a = Object::new(1234);
        let b = Object::new(1234);

        let mut recorder_a = FingerprintRecorder::new();
        a.fingerprint(&mut recorder_a);
        let mut recorder_b = FingerprintRecorder::new();
        b.fingerprint(&mut recorder_b);

        assert_eq!(recorder_a.key().unwrap(), recorder_b.key().unwrap());
    }

    #[test]
    fn shared_recorder_accumulates_state() {
        let a = Object::new(1234);
        let b = Object::new(1234);

        let mut recorder = FingerprintRecorder::new();
        a.fingerprint(&mut recorder);
        let key_a = recorder.key().unwrap();
        b.fingerprint(&mut recorder);
        let key_b = recorder.key().unwrap();

        assert_ne!(key_a, key_b);
    }

    #[test]
    fn record_object_uses_a_fresh_recorder() {
        let nested_first = Object::new(99);
        let nested_second = Object::new(99);

        // Dirty the parent before nesting; the nested keys must not see it.
        let mut parent = FingerprintRecorder::new();
        parent.record(&"parent state");
        parent.record_object(&nested_first);
        parent.record(&7u8);
        parent.record_object(&nested_second);

        assert_eq!(nested_first.key().unwrap(), nested_second.key().unwrap());
        assert_eq!(nested_first.key().unwrap(), Object::new(99).content_key().unwrap());
    }

    #[test]
    fn record_object_prefers_the_memoized_key() {
        let object = Object::new(5);
        let planted = ContentKey::from_digest(0xdead_beef);
        object.set_key(planted).unwrap();

        let mut via_object = FingerprintRecorder::new();
        via_object.record_object(&object);

        let mut via_raw = FingerprintRecorder::new();
        via_raw.record(&planted.raw());

        assert_eq!(via_object.key().unwrap(), via_raw.key().unwrap());
    }

    #[test]
    fn empty_object_sequences_still_record() {
        let mut recorder = FingerprintRecorder::new();
        recorder.record_objects(&Vec::<Object>::new());

        assert!(recorder.has_recorded());
        assert!(recorder.key().is_ok());
    }

    #[test]
    fn object_sequences_record_their_length() {
        let shared = [Object::new(1)];
        let none: [Object; 0] = [];

        let mut leading = FingerprintRecorder::new();
        leading.record_objects(&shared).record_objects(&none);
        let mut trailing = FingerprintRecorder::new();
        trailing.record_objects(&none).record_objects(&shared);

        assert_ne!(leading.key().unwrap(), trailing.key().unwrap());
    }
}
