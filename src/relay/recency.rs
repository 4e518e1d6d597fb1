// Bounded set of recently emitted fragment values, used for duplicate suppression.
//
// Values are only inserted when absent, so least-recently-used eviction is
// the same as evicting the oldest insertion.

use std::num::NonZeroUsize;

use lru::LruCache;

#[derive(Debug)]
pub struct RecencySet {
    entries: LruCache<String, ()>,
}

impl RecencySet {
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
        }
    }

    pub fn contains(&self, value: &str) -> bool {
        self.entries.contains(value)
    }

    /// Insert `value`, returning the member evicted to make room.
    pub fn insert(&mut self, value: String) -> Option<String> {
        if self.entries.contains(value.as_str()) {
            return None;
        }
        self.entries.push(value, ()).map(|(evicted, _)| evicted)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.entries.cap().get()
    }
}
