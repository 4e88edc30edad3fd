//! Computed table for forest operations.

use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hash};

use crate::dd::reference::Ref;

/// Key of a memoized forest operation.
///
/// Cubes and permutations are part of the key, so results for different quantified
/// variable sets never collide.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub(crate) enum OpKey {
    Ite(Ref, Ref, Ref),
    Exists(Ref, Ref),
    AndExists(Ref, Ref, Ref),
    Rename(Ref, usize),
}

struct Entry<K, V> {
    key: K,
    value: V,
}

/// Direct-mapped memo table of fixed size.
///
/// The number of slots is the largest power of two not above the requested capacity. A new
/// entry overwrites whatever occupied its slot, so the table never grows.
pub(crate) struct OpCache<K, V> {
    data: Vec<Option<Entry<K, V>>>,
    bitmask: u64,
    hasher: RandomState,
    occupied: usize,
    hits: usize,
    misses: usize,
}

impl<K, V> OpCache<K, V> {
    pub fn with_capacity(capacity: usize) -> Self {
        let bits = usize::BITS - 1 - capacity.max(1).leading_zeros();
        let size = 1usize << bits;
        Self {
            data: std::iter::repeat_with(|| None).take(size).collect(),
            bitmask: (size - 1) as u64,
            hasher: RandomState::new(),
            occupied: 0,
            hits: 0,
            misses: 0,
        }
    }

    /// Number of slots.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Number of occupied slots.
    pub fn len(&self) -> usize {
        self.occupied
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    pub fn misses(&self) -> usize {
        self.misses
    }

    pub fn clear(&mut self) {
        self.data.fill_with(|| None);
        self.occupied = 0;
    }
}

impl<K, V> OpCache<K, V>
where
    K: Hash + Eq,
    V: Copy,
{
    fn index(&self, key: &K) -> usize {
        (self.hasher.hash_one(key) & self.bitmask) as usize
    }

    #[inline]
    pub fn get(&mut self, key: &K) -> Option<V> {
        let index = self.index(key);
        match &self.data[index] {
            Some(entry) if entry.key == *key => {
                self.hits += 1;
                Some(entry.value)
            }
            _ => {
                self.misses += 1;
                None
            }
        }
    }

    #[inline]
    pub fn insert(&mut self, key: K, value: V) {
        let index = self.index(&key);
        let slot = &mut self.data[index];
        if slot.is_none() {
            self.occupied += 1;
        }
        *slot = Some(Entry { key, value });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hits_and_misses() {
        let mut cache = OpCache::with_capacity(4);
        let key = OpKey::Ite(Ref::ONE, Ref::ZERO, Ref::ONE);
        assert_eq!(cache.get(&key), None);
        cache.insert(key, Ref::ZERO);
        assert_eq!(cache.get(&key), Some(Ref::ZERO));
        assert_eq!(cache.get(&OpKey::Rename(Ref::ONE, 0)), None);
        assert_eq!(cache.hits(), 1);
        assert_eq!(cache.misses(), 2);
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_size_is_fixed() {
        let mut cache = OpCache::with_capacity(10);
        assert_eq!(cache.capacity(), 8);
        for i in 0..1000 {
            cache.insert(OpKey::Rename(Ref::ONE, i), Ref::ZERO);
        }
        assert!(cache.len() <= 8);
        // The latest entry always survives.
        assert_eq!(cache.get(&OpKey::Rename(Ref::ONE, 999)), Some(Ref::ZERO));
        assert_eq!(OpCache::<OpKey, Ref>::with_capacity(0).capacity(), 1);
    }
}
