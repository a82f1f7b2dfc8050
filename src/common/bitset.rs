//! Arbitrary-width bitset used by the subset enumerations.
//!
//! HYRISE enumerates merges over primary partitions and TrojanLayout tracks
//! knapsack item vectors; both need masks wider than a machine word once the
//! candidate count grows, so the masks are kept as plain `u64` words here.

const WORD_BITS: usize = 64;

/// A growable set of bit positions backed by `u64` words.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct BitSet {
    words: Vec<u64>,
}

impl BitSet {
    /// Create an empty bitset.
    pub fn new() -> Self {
        BitSet { words: Vec::new() }
    }

    /// Create a bitset from the given bit positions.
    pub fn from_bits(bits: &[usize]) -> Self {
        let mut set = BitSet::new();
        for &b in bits {
            set.set(b);
        }
        set
    }

    /// Set the bit at `index`.
    pub fn set(&mut self, index: usize) {
        let word = index / WORD_BITS;
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        self.words[word] |= 1u64 << (index % WORD_BITS);
    }

    /// Return a copy with the bit at `index` set.
    pub fn with_bit(&self, index: usize) -> Self {
        let mut copy = self.clone();
        copy.set(index);
        copy
    }

    /// Test the bit at `index`.
    pub fn test(&self, index: usize) -> bool {
        let word = index / WORD_BITS;
        word < self.words.len() && self.words[word] & (1u64 << (index % WORD_BITS)) != 0
    }

    /// Number of set bits.
    pub fn count_ones(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// In-place union with `other`.
    pub fn union_with(&mut self, other: &BitSet) {
        if other.words.len() > self.words.len() {
            self.words.resize(other.words.len(), 0);
        }
        for (i, &w) in other.words.iter().enumerate() {
            self.words[i] |= w;
        }
    }

    /// Whether the two sets share any bit.
    pub fn intersects(&self, other: &BitSet) -> bool {
        self.words
            .iter()
            .zip(other.words.iter())
            .any(|(&a, &b)| a & b != 0)
    }

    /// Whether both sets contain exactly the same bits.
    pub fn same_bits(&self, other: &BitSet) -> bool {
        let longest = self.words.len().max(other.words.len());
        for i in 0..longest {
            let a = self.words.get(i).copied().unwrap_or(0);
            let b = other.words.get(i).copied().unwrap_or(0);
            if a != b {
                return false;
            }
        }
        true
    }

    /// The set bit positions in ascending order.
    pub fn iter_ones(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(wi, &w)| {
            (0..WORD_BITS).filter_map(move |b| {
                if w & (1u64 << b) != 0 {
                    Some(wi * WORD_BITS + b)
                } else {
                    None
                }
            })
        })
    }
}
