//! Word-packed bit set.
//!
//! Backs the mutex table (one bit per unordered fact pair) and the alive
//! marks used while compacting the node table.

/// A bit set backed by a vector of u64 words.
///
/// Setting a bit beyond the current capacity grows the set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BitSet {
    words: Vec<u64>,
    /// Number of set bits (cached for O(1) `len()`).
    count: usize,
}

impl BitSet {
    const BITS_PER_WORD: usize = 64;

    /// Creates an empty bit set able to hold `capacity` bits without growing.
    pub fn new(capacity: usize) -> Self {
        Self {
            words: vec![0; capacity.div_ceil(Self::BITS_PER_WORD)],
            count: 0,
        }
    }

    /// Returns the number of set bits.
    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Returns the capacity in bits.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.words.len() * Self::BITS_PER_WORD
    }

    #[inline]
    fn word_and_mask(index: usize) -> (usize, u64) {
        (index / Self::BITS_PER_WORD, 1u64 << (index % Self::BITS_PER_WORD))
    }

    /// Returns true if the bit at the given index is set.
    #[inline]
    pub fn contains(&self, index: usize) -> bool {
        let (word, mask) = Self::word_and_mask(index);
        self.words.get(word).is_some_and(|w| w & mask != 0)
    }

    /// Sets the bit at the given index. Returns true if it was not set before.
    pub fn insert(&mut self, index: usize) -> bool {
        let (word, mask) = Self::word_and_mask(index);
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        let was_clear = self.words[word] & mask == 0;
        if was_clear {
            self.words[word] |= mask;
            self.count += 1;
        }
        was_clear
    }

    /// Clears the bit at the given index. Returns true if it was set before.
    pub fn remove(&mut self, index: usize) -> bool {
        let (word, mask) = Self::word_and_mask(index);
        let Some(w) = self.words.get_mut(word) else {
            return false;
        };
        let was_set = *w & mask != 0;
        if was_set {
            *w &= !mask;
            self.count -= 1;
        }
        was_set
    }

    /// Returns an iterator over all set bit indices, in increasing order.
    pub fn iter(&self) -> BitSetIter<'_> {
        BitSetIter {
            words: &self.words,
            word_idx: 0,
            current_word: self.words.first().copied().unwrap_or(0),
        }
    }
}

impl FromIterator<usize> for BitSet {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        let mut bs = BitSet::default();
        for index in iter {
            bs.insert(index);
        }
        bs
    }
}

/// Iterator over set bits in a [`BitSet`].
pub struct BitSetIter<'a> {
    words: &'a [u64],
    word_idx: usize,
    current_word: u64,
}

impl Iterator for BitSetIter<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.current_word != 0 {
                let bit = self.current_word.trailing_zeros() as usize;
                self.current_word &= self.current_word - 1; // clear lowest set bit
                return Some(self.word_idx * BitSet::BITS_PER_WORD + bit);
            }
            self.word_idx += 1;
            self.current_word = *self.words.get(self.word_idx)?;
        }
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_empty() {
        let bs = BitSet::new(100);
        assert!(bs.is_empty());
        assert_eq!(bs.len(), 0);
        assert!(bs.capacity() >= 100);
        assert!(!bs.contains(0));
        assert!(!bs.contains(1000));
    }

    #[test]
    fn test_insert_idempotent() {
        let mut bs = BitSet::new(10);
        assert!(bs.insert(7));
        assert!(!bs.insert(7));
        assert_eq!(bs.len(), 1);
        assert!(bs.contains(7));
    }

    #[test]
    fn test_remove() {
        let mut bs = BitSet::new(100);
        bs.insert(42);
        assert!(bs.remove(42));
        assert!(!bs.remove(42));
        assert!(!bs.remove(4200));
        assert!(bs.is_empty());
    }

    #[test]
    fn test_grow() {
        let mut bs = BitSet::new(0);
        bs.insert(1000);
        assert!(bs.contains(1000));
        assert_eq!(bs.len(), 1);
    }

    #[test]
    fn test_iter_across_words() {
        let bs: BitSet = [65, 3, 64, 10, 5].into_iter().collect();
        let indices: Vec<_> = bs.iter().collect();
        assert_eq!(indices, vec![3, 5, 10, 64, 65]);
    }
}
