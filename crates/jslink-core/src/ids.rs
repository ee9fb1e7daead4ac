//! Dense integer identities used throughout the linker.
//!
//! Every id is a `u32` newtype so tables can be plain `Vec`s indexed by id.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! define_index {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        pub struct $name(pub u32);

        impl $name {
            #[inline]
            pub fn new(index: usize) -> Self {
                Self(index as u32)
            }

            #[inline]
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

define_index!(
    /// Final module identity, stable for the lifetime of a build.
    ModuleIdx
);
define_index!(
    /// A symbol slot local to one module's symbol table.
    SymbolIdx
);
define_index!(
    /// A top-level statement of one module.
    PartIdx
);
define_index!(
    /// An import record local to one module.
    ImportRecordIdx
);
define_index!(
    /// One output chunk.
    ChunkIdx
);

/// A symbol anywhere in the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SymbolRef {
    pub module: ModuleIdx,
    pub symbol: SymbolIdx,
}

impl SymbolRef {
    pub fn new(module: ModuleIdx, symbol: SymbolIdx) -> Self {
        Self { module, symbol }
    }
}

/// Fixed-width bitset over entry points, used as a chunk key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct EntryBits {
    words: Vec<u64>,
}

impl EntryBits {
    pub fn with_capacity(bits: usize) -> Self {
        Self {
            words: vec![0; bits.div_ceil(64)],
        }
    }

    pub fn set(&mut self, bit: usize) {
        let word = bit / 64;
        if word >= self.words.len() {
            self.words.resize(word + 1, 0);
        }
        self.words[word] |= 1 << (bit % 64);
    }

    pub fn has(&self, bit: usize) -> bool {
        self.words
            .get(bit / 64)
            .is_some_and(|word| word & (1 << (bit % 64)) != 0)
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|word| *word == 0)
    }

    pub fn count(&self) -> usize {
        self.words.iter().map(|word| word.count_ones() as usize).sum()
    }

    /// Set bits in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.words.iter().enumerate().flat_map(|(i, word)| {
            (0..64).filter_map(move |bit| (word & (1 << bit) != 0).then_some(i * 64 + bit))
        })
    }

    /// Stable textual key, e.g. `0,3,5`.
    pub fn key(&self) -> String {
        self.iter()
            .map(|bit| bit.to_string())
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_bits_set_and_iterate() {
        let mut bits = EntryBits::with_capacity(3);
        bits.set(2);
        bits.set(0);
        bits.set(70);

        assert!(bits.has(0));
        assert!(!bits.has(1));
        assert!(bits.has(70));
        assert_eq!(bits.count(), 3);
        assert_eq!(bits.iter().collect::<Vec<_>>(), vec![0, 2, 70]);
        assert_eq!(bits.key(), "0,2,70");
    }

    #[test]
    fn test_entry_bits_equality_ignores_insertion_order() {
        let mut a = EntryBits::with_capacity(4);
        a.set(1);
        a.set(3);
        let mut b = EntryBits::with_capacity(4);
        b.set(3);
        b.set(1);
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_bits() {
        let bits = EntryBits::with_capacity(8);
        assert!(bits.is_empty());
        assert_eq!(bits.key(), "");
    }
}
