//! # Dense Haplotype Bit-Set
//!
//! A fixed-width bit-set over the complete reference panel `[0, D)`. One of
//! these per strand per window tracks which panel haplotypes remain
//! compatible with the chosen unique column, so intersection across windows
//! is a word-parallel AND.

use bitvec::prelude::*;

use crate::data::haplotype::HapIdx;

/// Dense bit-set over complete-panel haplotype indices
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HapSet {
    bits: BitVec<u64, Lsb0>,
}

impl HapSet {
    /// Empty set over a panel of `n_haplotypes`
    pub fn new(n_haplotypes: usize) -> Self {
        Self {
            bits: bitvec![u64, Lsb0; 0; n_haplotypes],
        }
    }

    /// Singleton set
    pub fn singleton(n_haplotypes: usize, hap: HapIdx) -> Self {
        let mut set = Self::new(n_haplotypes);
        set.insert(hap);
        set
    }

    /// Panel width this set ranges over
    pub fn capacity(&self) -> usize {
        self.bits.len()
    }

    #[inline]
    pub fn insert(&mut self, hap: HapIdx) {
        self.bits.set(hap.as_usize(), true);
    }

    #[inline]
    pub fn contains(&self, hap: HapIdx) -> bool {
        self.bits[hap.as_usize()]
    }

    /// Remove all members
    pub fn clear(&mut self) {
        self.bits.fill(false);
    }

    /// Number of members
    pub fn len(&self) -> usize {
        self.bits.count_ones()
    }

    pub fn is_empty(&self) -> bool {
        self.bits.not_any()
    }

    /// Lowest member, if any. This is the deterministic representative used
    /// whenever a single label must be drawn from a set.
    pub fn first(&self) -> Option<HapIdx> {
        self.bits.first_one().map(|i| HapIdx::new(i as u32))
    }

    /// Iterate members in increasing order
    pub fn iter(&self) -> impl Iterator<Item = HapIdx> + '_ {
        self.bits.iter_ones().map(|i| HapIdx::new(i as u32))
    }

    /// Overwrite this set with `other`
    pub fn assign(&mut self, other: &HapSet) {
        debug_assert_eq!(self.bits.len(), other.bits.len());
        self.bits.copy_from_bitslice(&other.bits);
    }

    /// In-place intersection
    pub fn intersect_with(&mut self, other: &HapSet) {
        debug_assert_eq!(self.bits.len(), other.bits.len());
        for (word, other_word) in self
            .bits
            .as_raw_mut_slice()
            .iter_mut()
            .zip(other.bits.as_raw_slice())
        {
            *word &= *other_word;
        }
    }

    /// Size of the intersection without materializing it
    pub fn intersection_len(&self, other: &HapSet) -> usize {
        debug_assert_eq!(self.bits.len(), other.bits.len());
        self.bits
            .as_raw_slice()
            .iter()
            .zip(other.bits.as_raw_slice())
            .map(|(a, b)| (a & b).count_ones() as usize)
            .sum()
    }

    /// Whether the intersection is empty, without materializing it
    pub fn intersects(&self, other: &HapSet) -> bool {
        self.bits
            .as_raw_slice()
            .iter()
            .zip(other.bits.as_raw_slice())
            .any(|(a, b)| a & b != 0)
    }
}
