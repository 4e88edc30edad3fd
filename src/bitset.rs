//! Fixed-universe bit set used as the explicit state-set payload.
//!
//! Every set knows the size of its universe (the number of states of the graph it belongs to),
//! so complementation is exact and bits past the universe are always clear.

/// A set of state indices in `0..universe`, backed by a vector of u64 words.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BitSet {
    words: Vec<u64>,
    universe: usize,
    /// Number of set bits (cached for O(1) len())
    count: usize,
}

impl BitSet {
    const BITS_PER_WORD: usize = 64;

    /// Creates an empty set over `0..universe`.
    pub fn new(universe: usize) -> Self {
        Self {
            words: vec![0; universe.div_ceil(Self::BITS_PER_WORD)],
            universe,
            count: 0,
        }
    }

    /// Creates the set containing every index of the universe.
    pub fn full(universe: usize) -> Self {
        let mut set = Self {
            words: vec![u64::MAX; universe.div_ceil(Self::BITS_PER_WORD)],
            universe,
            count: universe,
        };
        set.clear_tail();
        set
    }

    /// Creates a set from indices. Indices outside the universe are ignored.
    pub fn from_indices(universe: usize, indices: impl IntoIterator<Item = usize>) -> Self {
        let mut set = Self::new(universe);
        for index in indices {
            if index < universe {
                set.insert(index);
            }
        }
        set
    }

    #[inline]
    pub fn universe(&self) -> usize {
        self.universe
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[inline]
    fn word_and_bit(index: usize) -> (usize, u64) {
        (index / Self::BITS_PER_WORD, 1u64 << (index % Self::BITS_PER_WORD))
    }

    #[inline]
    pub fn contains(&self, index: usize) -> bool {
        if index >= self.universe {
            return false;
        }
        let (word, mask) = Self::word_and_bit(index);
        self.words[word] & mask != 0
    }

    /// Adds `index`. Returns true if it was not present before.
    ///
    /// # Panics
    ///
    /// Panics if `index` is outside the universe.
    #[inline]
    pub fn insert(&mut self, index: usize) -> bool {
        assert!(
            index < self.universe,
            "State {} is outside of the universe 0..{}",
            index,
            self.universe
        );
        let (word, mask) = Self::word_and_bit(index);
        let was_clear = self.words[word] & mask == 0;
        if was_clear {
            self.words[word] |= mask;
            self.count += 1;
        }
        was_clear
    }

    /// Removes `index`. Returns true if it was present.
    #[inline]
    pub fn remove(&mut self, index: usize) -> bool {
        if index >= self.universe {
            return false;
        }
        let (word, mask) = Self::word_and_bit(index);
        let was_set = self.words[word] & mask != 0;
        if was_set {
            self.words[word] &= !mask;
            self.count -= 1;
        }
        was_set
    }

    pub fn clear(&mut self) {
        self.words.fill(0);
        self.count = 0;
    }

    /// In-place union. Returns true if any bit was added.
    pub fn union_with(&mut self, other: &BitSet) -> bool {
        self.check_universe(other);
        let before = self.count;
        for (a, b) in self.words.iter_mut().zip(&other.words) {
            *a |= *b;
        }
        self.recount();
        self.count != before
    }

    /// In-place intersection. Returns true if any bit was removed.
    pub fn intersect_with(&mut self, other: &BitSet) -> bool {
        self.check_universe(other);
        let before = self.count;
        for (a, b) in self.words.iter_mut().zip(&other.words) {
            *a &= *b;
        }
        self.recount();
        self.count != before
    }

    /// In-place difference `self \ other`. Returns true if any bit was removed.
    pub fn difference_with(&mut self, other: &BitSet) -> bool {
        self.check_universe(other);
        let before = self.count;
        for (a, b) in self.words.iter_mut().zip(&other.words) {
            *a &= !*b;
        }
        self.recount();
        self.count != before
    }

    /// In-place complement with respect to the universe.
    pub fn complement(&mut self) {
        for word in &mut self.words {
            *word = !*word;
        }
        self.clear_tail();
        self.count = self.universe - self.count;
    }

    pub fn is_subset(&self, other: &BitSet) -> bool {
        self.check_universe(other);
        self.words.iter().zip(&other.words).all(|(a, b)| a & !b == 0)
    }

    pub fn is_disjoint(&self, other: &BitSet) -> bool {
        self.check_universe(other);
        self.words.iter().zip(&other.words).all(|(a, b)| a & b == 0)
    }

    /// Returns an iterator over the set indices in increasing order.
    pub fn iter(&self) -> Iter<'_> {
        Iter {
            words: &self.words,
            word_idx: 0,
            current_word: self.words.first().copied().unwrap_or(0),
        }
    }

    fn check_universe(&self, other: &BitSet) {
        assert_eq!(
            self.universe, other.universe,
            "Bit sets over different universes"
        );
    }

    fn clear_tail(&mut self) {
        let tail = self.universe % Self::BITS_PER_WORD;
        if tail != 0 {
            if let Some(last) = self.words.last_mut() {
                *last &= (1u64 << tail) - 1;
            }
        }
    }

    fn recount(&mut self) {
        self.count = self.words.iter().map(|w| w.count_ones() as usize).sum();
    }
}

impl<'a> IntoIterator for &'a BitSet {
    type Item = usize;
    type IntoIter = Iter<'a>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Iterator over set bits in a [`BitSet`].
pub struct Iter<'a> {
    words: &'a [u64],
    word_idx: usize,
    current_word: u64,
}

impl Iterator for Iter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.current_word != 0 {
                let bit = self.current_word.trailing_zeros() as usize;
                self.current_word &= self.current_word - 1; // clear lowest set bit
                return Some(self.word_idx * BitSet::BITS_PER_WORD + bit);
            }
            self.word_idx += 1;
            if self.word_idx >= self.words.len() {
                return None;
            }
            self.current_word = self.words[self.word_idx];
        }
    }
}
