//! # Typed-to-Full Marker Alignment
//!
//! The target cohort observes a subset of the reference markers. The
//! alignment maps each typed row to its row in the full reference and
//! answers the reverse neighbour queries used when expanding per-typed-row
//! quality scores to untyped rows.

use crate::error::{HapmosaicError, Result};

/// Monotone map from typed marker rows to full reference rows
#[derive(Clone, Debug)]
pub struct MarkerAlignment {
    typed_to_full: Vec<u32>,
    n_full: usize,
}

impl MarkerAlignment {
    /// Build an alignment, validating strict monotonicity and bounds
    pub fn new(typed_to_full: Vec<u32>, n_full: usize) -> Result<Self> {
        for pair in typed_to_full.windows(2) {
            if pair[1] <= pair[0] {
                return Err(HapmosaicError::invalid_data(format!(
                    "typed_to_full must be strictly increasing, saw {} then {}",
                    pair[0], pair[1]
                )));
            }
        }
        if let Some(&last) = typed_to_full.last() {
            if last as usize >= n_full {
                return Err(HapmosaicError::invalid_data(format!(
                    "typed row maps to reference row {} but panel has {} rows",
                    last, n_full
                )));
            }
        }
        Ok(Self {
            typed_to_full,
            n_full,
        })
    }

    /// Identity alignment: every reference row is typed
    pub fn identity(n_rows: usize) -> Self {
        Self {
            typed_to_full: (0..n_rows as u32).collect(),
            n_full: n_rows,
        }
    }

    /// Number of typed rows
    pub fn n_typed(&self) -> usize {
        self.typed_to_full.len()
    }

    /// Number of full reference rows
    pub fn n_full(&self) -> usize {
        self.n_full
    }

    /// Full reference row of a typed row
    #[inline]
    pub fn full_row(&self, typed_row: usize) -> usize {
        self.typed_to_full[typed_row] as usize
    }

    /// The raw map
    pub fn typed_rows(&self) -> &[u32] {
        &self.typed_to_full
    }

    /// Index of the typed row at or after `full_row`, if any
    pub fn typed_at_or_after(&self, full_row: usize) -> Option<usize> {
        let idx = self.typed_to_full.partition_point(|&r| (r as usize) < full_row);
        (idx < self.typed_to_full.len()).then_some(idx)
    }

    /// Index of the typed row at or before `full_row`, if any
    pub fn typed_at_or_before(&self, full_row: usize) -> Option<usize> {
        let idx = self.typed_to_full.partition_point(|&r| r as usize <= full_row);
        idx.checked_sub(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_monotone_validation() {
        assert!(MarkerAlignment::new(vec![0, 2, 2], 10).is_err());
        assert!(MarkerAlignment::new(vec![0, 2, 12], 10).is_err());
        assert!(MarkerAlignment::new(vec![0, 2, 9], 10).is_ok());
    }

    #[test]
    fn test_neighbour_queries() {
        let align = MarkerAlignment::new(vec![2, 5, 8], 12).unwrap();
        assert_eq!(align.typed_at_or_after(0), Some(0));
        assert_eq!(align.typed_at_or_after(5), Some(1));
        assert_eq!(align.typed_at_or_after(9), None);
        assert_eq!(align.typed_at_or_before(1), None);
        assert_eq!(align.typed_at_or_before(5), Some(1));
        assert_eq!(align.typed_at_or_before(11), Some(2));
    }

    #[test]
    fn test_identity() {
        let align = MarkerAlignment::identity(4);
        assert_eq!(align.n_typed(), 4);
        assert_eq!(align.full_row(3), 3);
    }
}
