//! # Column-Major Bit Matrix
//!
//! Bit-valued matrix with each column stored contiguously: the reference
//! panel over typed rows (rows = markers, columns = haplotypes) and each
//! window's unique-haplotype matrix both live here. Column contiguity is
//! what the pair-search kernel and the deduplication hashing want.

use bitvec::prelude::*;

/// Column-major bit matrix
#[derive(Clone, Debug)]
pub struct BitMatrix {
    bits: BitVec<u64, Lsb0>,
    n_rows: usize,
    n_cols: usize,
    /// Words per column; columns are padded to a word boundary so each
    /// column's raw slice can be compared and hashed directly
    words_per_col: usize,
}

impl BitMatrix {
    const WORD_BITS: usize = 64;

    /// All-zero matrix
    pub fn new(n_rows: usize, n_cols: usize) -> Self {
        let words_per_col = n_rows.div_ceil(Self::WORD_BITS);
        Self {
            bits: bitvec![u64, Lsb0; 0; words_per_col * Self::WORD_BITS * n_cols],
            n_rows,
            n_cols,
            words_per_col,
        }
    }

    /// Build from a closure yielding the bit at (row, col)
    pub fn from_fn(n_rows: usize, n_cols: usize, f: impl Fn(usize, usize) -> bool) -> Self {
        let mut m = Self::new(n_rows, n_cols);
        for col in 0..n_cols {
            for row in 0..n_rows {
                if f(row, col) {
                    m.set(row, col, true);
                }
            }
        }
        m
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    #[inline]
    fn bit_index(&self, row: usize, col: usize) -> usize {
        col * self.words_per_col * Self::WORD_BITS + row
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> bool {
        debug_assert!(row < self.n_rows && col < self.n_cols);
        self.bits[self.bit_index(row, col)]
    }

    pub fn set(&mut self, row: usize, col: usize, value: bool) {
        debug_assert!(row < self.n_rows && col < self.n_cols);
        let idx = self.bit_index(row, col);
        self.bits.set(idx, value);
    }

    /// Raw words backing one column (padding bits are zero)
    #[inline]
    pub fn col_words(&self, col: usize) -> &[u64] {
        let start = col * self.words_per_col;
        &self.bits.as_raw_slice()[start..start + self.words_per_col]
    }

    /// Dot product of two columns (count of shared set rows)
    pub fn col_dot(&self, a: usize, b: usize) -> usize {
        self.col_words(a)
            .iter()
            .zip(self.col_words(b))
            .map(|(x, y)| (x & y).count_ones() as usize)
            .sum()
    }

    /// Set-bit count of one column
    pub fn col_count(&self, col: usize) -> usize {
        self.col_words(col)
            .iter()
            .map(|w| w.count_ones() as usize)
            .sum()
    }

    /// Restrict to a contiguous row range, copying
    pub fn restrict_rows(&self, start: usize, end: usize) -> Self {
        Self::from_fn(end - start, self.n_cols, |row, col| {
            self.get(start + row, col)
        })
    }

    /// Approximate heap usage in bytes
    pub fn size_bytes(&self) -> usize {
        self.bits.as_raw_slice().len() * std::mem::size_of::<u64>()
            + std::mem::size_of::<Self>()
    }
}
