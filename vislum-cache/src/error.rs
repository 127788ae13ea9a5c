use crate::key::ContentKey;

/// Programming errors around fingerprinting and key memoization.
///
/// None of these are recoverable by retrying: they mean a caller asked for a key
/// before the entity was fingerprinted, or tried to overwrite a memoized key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CacheError {
    #[error("fingerprint key requested before anything was recorded")]
    NothingRecorded,
    #[error("content key requested before the entity was fingerprinted")]
    NotFingerprinted,
    #[error("content key is write-once: {existing} already set, refusing {attempted}")]
    KeyAlreadySet {
        existing: ContentKey,
        attempted: ContentKey,
    },
}
