//! # Target Genotype Matrix
//!
//! Unphased diploid genotypes over typed markers: rows are markers, columns
//! are samples, entries are allele-dose codes `{0, 1, 2}` with `255` for
//! missing. Row-major storage so a window of rows is one contiguous block.

use std::sync::Arc;

use crate::data::haplotype::{SampleIdx, Samples};
use crate::error::{HapmosaicError, Result};

/// Missing genotype code
pub const MISSING: u8 = 255;

/// Unphased genotype matrix (typed markers x samples)
#[derive(Clone, Debug)]
pub struct GenotypeMatrix {
    /// Row-major entries, `data[row * n_samples + sample]`
    data: Vec<u8>,
    n_markers: usize,
    samples: Arc<Samples>,
}

impl GenotypeMatrix {
    /// Create a matrix from row-major entries
    pub fn new(data: Vec<u8>, n_markers: usize, samples: Arc<Samples>) -> Result<Self> {
        if data.len() != n_markers * samples.len() {
            return Err(HapmosaicError::invalid_data(format!(
                "genotype buffer holds {} entries, expected {} x {}",
                data.len(),
                n_markers,
                samples.len()
            )));
        }
        if let Some(bad) = data.iter().find(|&&g| g > 2 && g != MISSING) {
            return Err(HapmosaicError::invalid_data(format!(
                "genotype code {} is not in {{0, 1, 2, missing}}",
                bad
            )));
        }
        Ok(Self {
            data,
            n_markers,
            samples,
        })
    }

    /// Number of typed markers (rows)
    pub fn n_markers(&self) -> usize {
        self.n_markers
    }

    /// Number of samples (columns)
    pub fn n_samples(&self) -> usize {
        self.samples.len()
    }

    /// Sample metadata
    pub fn samples(&self) -> &Samples {
        &self.samples
    }

    /// Genotype at (row, sample)
    #[inline]
    pub fn get(&self, row: usize, sample: SampleIdx) -> u8 {
        self.data[row * self.samples.len() + sample.as_usize()]
    }

    /// One contiguous row (all samples)
    #[inline]
    pub fn row(&self, row: usize) -> &[u8] {
        let n = self.samples.len();
        &self.data[row * n..(row + 1) * n]
    }

    /// Contiguous block of rows `[start, end)`
    pub fn rows(&self, start: usize, end: usize) -> &[u8] {
        let n = self.samples.len();
        &self.data[start * n..end * n]
    }

    /// Empirical alt-allele frequency of a row, estimated from non-missing
    /// entries. Zero if the row is all-missing.
    pub fn row_allele_frequency(&self, row: usize) -> f64 {
        let mut sum = 0u64;
        let mut observed = 0u64;
        for &g in self.row(row) {
            if g != MISSING {
                sum += g as u64;
                observed += 1;
            }
        }
        if observed == 0 {
            0.0
        } else {
            sum as f64 / (2 * observed) as f64
        }
    }

    /// Approximate heap usage in bytes
    pub fn size_bytes(&self) -> usize {
        self.data.len() + std::mem::size_of::<Self>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn samples(n: usize) -> Arc<Samples> {
        Arc::new(Samples::from_ids(
            (0..n).map(|i| format!("S{}", i)).collect(),
        ))
    }

    #[test]
    fn test_shape_validation() {
        assert!(GenotypeMatrix::new(vec![0; 5], 2, samples(2)).is_err());
        assert!(GenotypeMatrix::new(vec![0, 1, 2, 3], 2, samples(2)).is_err());
        assert!(GenotypeMatrix::new(vec![0, 1, 2, MISSING], 2, samples(2)).is_ok());
    }

    #[test]
    fn test_row_frequency() {
        let gm = GenotypeMatrix::new(vec![0, 2, MISSING, 1, MISSING, MISSING], 2, samples(3))
            .unwrap();
        // Row 0: (0 + 2) / (2 * 2)
        assert!((gm.row_allele_frequency(0) - 0.5).abs() < 1e-12);
        // Row 1: one observed het
        assert!((gm.row_allele_frequency(1) - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_row_slicing() {
        let gm = GenotypeMatrix::new(vec![0, 1, 2, 0, 1, 2], 3, samples(2)).unwrap();
        assert_eq!(gm.rows(1, 3), &[2, 0, 1, 2]);
        assert_eq!(gm.get(2, SampleIdx::new(1)), 2);
    }
}
