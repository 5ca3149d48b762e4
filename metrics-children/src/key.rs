use std::{
    hash::{Hash, Hasher},
    sync::Arc,
};

use rapidhash::fast::RapidHasher;

/// Hashes an ordered tuple of label values.
///
/// Both the borrowed tuple supplied by callers and the owned [`LabelValues`] stored in a repo are
/// hashed through this function, which lets lookups hash the caller's slice directly instead of
/// allocating an owned key first.
#[inline]
pub(crate) fn hash_label_values(values: &[&str]) -> u64 {
    let mut hasher: RapidHasher<'static> = RapidHasher::default();
    hasher.write_usize(values.len());
    for value in values {
        value.hash(&mut hasher);
    }
    hasher.finish()
}

/// An owned, pre-hashed tuple of label values.
///
/// Equality is structural over the whole tuple: two tuples are the same only if they have the
/// same length and the same values in the same order.
///
/// The values are shared, so the child created for a tuple can hold on to them without copying.
#[derive(Debug, Clone)]
pub(crate) struct LabelValues {
    values: Arc<[String]>,
    hash: u64,
}

impl LabelValues {
    pub fn new(values: &[&str], hash: u64) -> Self {
        debug_assert_eq!(hash, hash_label_values(values));
        Self { values: values.iter().map(|v| v.to_string()).collect(), hash }
    }

    pub fn matches(&self, other: &[&str]) -> bool {
        self.values.len() == other.len()
            && self.values.iter().zip(other.iter()).all(|(a, b)| a == b)
    }

    pub fn shared(&self) -> Arc<[String]> {
        Arc::clone(&self.values)
    }
}

impl PartialEq for LabelValues {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash && self.values == other.values
    }
}

impl Eq for LabelValues {}

impl Hash for LabelValues {
    fn hash<H: Hasher>(&self, state: &mut H) {
        state.write_u64(self.hash);
    }
}

/// A pass-through hasher for pre-hashed [`LabelValues`].
///
/// `LabelValues::hash()` writes its pre-computed hash via `write_u64()`, and `finish()` simply
/// returns it, so maps keyed by `LabelValues` never rehash the underlying strings, even when
/// growing.
///
/// # Panics
///
/// Panics if any write method other than `write_u64()` is called.
#[derive(Debug, Default)]
pub(crate) struct LabelHasher {
    hash: u64,
}

impl Hasher for LabelHasher {
    #[inline(always)]
    fn finish(&self) -> u64 {
        self.hash
    }

    fn write(&mut self, _bytes: &[u8]) {
        panic!("LabelHasher only supports write_u64() for pre-hashed label values");
    }

    #[inline(always)]
    fn write_u64(&mut self, i: u64) {
        self.hash = i;
    }
}
