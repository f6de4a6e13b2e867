//! # Compressed Reference Panel
//!
//! Read-only per-window dictionary of deduplicated haplotype patterns. Over
//! a few hundred typed markers, thousands of panel haplotypes collapse to a
//! much smaller set of distinct bit patterns; the pair search runs in the
//! deduplicated space and the equivalence classes are replayed afterwards.

use std::collections::HashMap;

use crate::data::haplotype::{HapIdx, UniqueIdx};
use crate::data::storage::bitmatrix::BitMatrix;
use crate::error::{HapmosaicError, Result};

/// One window of the compressed panel
#[derive(Clone, Debug)]
pub struct CompressedWindow {
    /// Deduplicated bit matrix: rows = typed markers of the window,
    /// columns = distinct haplotype patterns
    uniques: BitMatrix,
    /// Complete index -> unique column, for every panel haplotype
    to_unique: Vec<UniqueIdx>,
    /// Unique column -> canonical representative (lowest member)
    representative: Vec<HapIdx>,
    /// Canonical representative -> full equivalence class, ascending.
    /// Singleton classes are absent and represent themselves.
    hapmap: HashMap<HapIdx, Vec<HapIdx>>,
}

impl CompressedWindow {
    /// Deduplicate one window of the panel. `panel` covers all typed rows;
    /// the window spans rows `[start, end)`.
    fn compress(panel: &BitMatrix, start: usize, end: usize) -> Self {
        let n_haps = panel.n_cols();
        let p = end - start;

        let window = panel.restrict_rows(start, end);

        // Group complete indices by column bit pattern. Keys are the padded
        // raw words of each column, so equality is exact.
        let mut classes: HashMap<&[u64], Vec<HapIdx>> = HashMap::new();
        for h in 0..n_haps {
            classes
                .entry(window.col_words(h))
                .or_default()
                .push(HapIdx::new(h as u32));
        }

        // Deterministic column order: sort classes by their representative.
        let mut members: Vec<Vec<HapIdx>> = classes.into_values().collect();
        members.sort_unstable_by_key(|class| class[0]);

        let mut to_unique = vec![UniqueIdx::default(); n_haps];
        let mut representative = Vec::with_capacity(members.len());
        let mut hapmap = HashMap::new();
        for (u, class) in members.iter().enumerate() {
            let rep = class[0];
            representative.push(rep);
            for &h in class {
                to_unique[h.as_usize()] = UniqueIdx::new(u as u32);
            }
            if class.len() > 1 {
                hapmap.insert(rep, class.clone());
            }
        }

        let uniques = BitMatrix::from_fn(p, members.len(), |row, u| {
            window.get(row, members[u][0].as_usize())
        });

        Self {
            uniques,
            to_unique,
            representative,
            hapmap,
        }
    }

    /// The deduplicated matrix
    pub fn uniques(&self) -> &BitMatrix {
        &self.uniques
    }

    /// Number of distinct patterns in this window
    pub fn n_unique(&self) -> usize {
        self.representative.len()
    }

    /// Unique column of a complete haplotype
    #[inline]
    pub fn unique_of(&self, hap: HapIdx) -> UniqueIdx {
        self.to_unique[hap.as_usize()]
    }

    /// Canonical representative of a unique column
    #[inline]
    pub fn representative(&self, unique: UniqueIdx) -> HapIdx {
        self.representative[unique.as_usize()]
    }

    /// Equivalence class of a unique column (ascending complete indices).
    /// Returns `None` for singleton classes.
    pub fn class_of(&self, unique: UniqueIdx) -> Option<&[HapIdx]> {
        self.hapmap
            .get(&self.representative[unique.as_usize()])
            .map(Vec::as_slice)
    }

    /// Approximate heap usage in bytes
    fn size_bytes(&self) -> usize {
        let class_bytes: usize = self
            .hapmap
            .values()
            .map(|c| c.len() * std::mem::size_of::<HapIdx>())
            .sum();
        self.uniques.size_bytes()
            + self.to_unique.len() * std::mem::size_of::<UniqueIdx>()
            + self.representative.len() * std::mem::size_of::<HapIdx>()
            + class_bytes
    }
}

/// The compressed reference panel: one dictionary per window plus the
/// alignment of window columns to absolute typed rows
#[derive(Clone, Debug)]
pub struct CompressedHaplotypes {
    windows: Vec<CompressedWindow>,
    /// Absolute typed row where each window begins
    start: Vec<usize>,
    n_typed: usize,
    n_haplotypes: usize,
    width: usize,
    /// Alt-allele frequency per typed row of the reference
    altfreq: Vec<f64>,
}

impl CompressedHaplotypes {
    /// Compress a typed-rows panel into per-window dictionaries.
    ///
    /// `panel` has one row per typed marker and one column per reference
    /// haplotype. The last window may be short.
    pub fn compress(panel: &BitMatrix, width: usize) -> Result<Self> {
        if width == 0 {
            return Err(HapmosaicError::config("window width must be positive"));
        }
        if panel.n_cols() == 0 {
            return Err(HapmosaicError::algorithm("reference panel has no haplotypes"));
        }
        let n_typed = panel.n_rows();
        let n_windows = n_typed.div_ceil(width).max(1);

        let mut windows = Vec::with_capacity(n_windows);
        let mut start = Vec::with_capacity(n_windows);
        for w in 0..n_windows {
            let s = w * width;
            let e = ((w + 1) * width).min(n_typed);
            start.push(s);
            windows.push(CompressedWindow::compress(panel, s, e));
        }

        let altfreq = (0..n_typed)
            .map(|row| {
                let count = (0..panel.n_cols()).filter(|&h| panel.get(row, h)).count();
                count as f64 / panel.n_cols() as f64
            })
            .collect();

        Ok(Self {
            windows,
            start,
            n_typed,
            n_haplotypes: panel.n_cols(),
            width,
            altfreq,
        })
    }

    /// Number of windows
    pub fn n_windows(&self) -> usize {
        self.windows.len()
    }

    /// Number of typed rows covered
    pub fn n_typed(&self) -> usize {
        self.n_typed
    }

    /// Complete panel width `D`
    pub fn n_haplotypes(&self) -> usize {
        self.n_haplotypes
    }

    /// Nominal window width in typed markers
    pub fn width(&self) -> usize {
        self.width
    }

    /// One window's dictionary
    pub fn window(&self, w: usize) -> &CompressedWindow {
        &self.windows[w]
    }

    /// Absolute typed row where window `w` begins
    pub fn window_start(&self, w: usize) -> usize {
        self.start[w]
    }

    /// Absolute typed row one past the end of window `w`
    pub fn window_end(&self, w: usize) -> usize {
        if w + 1 < self.windows.len() {
            self.start[w + 1]
        } else {
            self.n_typed
        }
    }

    /// Window containing an absolute typed row
    pub fn window_of_row(&self, row: usize) -> usize {
        debug_assert!(row < self.n_typed);
        (row / self.width).min(self.windows.len() - 1)
    }

    /// Alt-allele frequency of a typed row
    #[inline]
    pub fn altfreq(&self, row: usize) -> f64 {
        self.altfreq[row]
    }

    /// Allele of a complete haplotype at an absolute typed row, materialized
    /// through the owning window's dictionary.
    pub fn allele(&self, row: usize, hap: HapIdx) -> Result<bool> {
        if row >= self.n_typed || hap.as_usize() >= self.n_haplotypes {
            return Err(HapmosaicError::invalid_data(format!(
                "allele lookup ({}, {}) outside {} x {} panel",
                row,
                hap.0,
                self.n_typed,
                self.n_haplotypes
            )));
        }
        let w = self.window_of_row(row);
        let window = &self.windows[w];
        let unique = window.unique_of(hap);
        Ok(window.uniques().get(row - self.start[w], unique.as_usize()))
    }

    /// Mean unique-column count across windows
    pub fn avg_unique(&self) -> f64 {
        if self.windows.is_empty() {
            return 0.0;
        }
        let total: usize = self.windows.iter().map(|w| w.n_unique()).sum();
        total as f64 / self.windows.len() as f64
    }

    /// Approximate heap usage in bytes
    pub fn size_bytes(&self) -> usize {
        self.windows.iter().map(|w| w.size_bytes()).sum::<usize>()
            + self.altfreq.len() * std::mem::size_of::<f64>()
            + std::mem::size_of::<Self>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Panel with duplicated columns: haps 0 and 2 identical, 1 and 3
    /// identical in window 0; all distinct in window 1.
    fn toy_panel() -> BitMatrix {
        BitMatrix::from_fn(8, 4, |row, col| {
            if row < 4 {
                match col {
                    0 | 2 => row % 2 == 0,
                    _ => row % 2 == 1,
                }
            } else {
                row % 4 == col
            }
        })
    }

    #[test]
    fn test_dedup_classes() {
        let ch = CompressedHaplotypes::compress(&toy_panel(), 4).unwrap();
        assert_eq!(ch.n_windows(), 2);

        let w0 = ch.window(0);
        assert_eq!(w0.n_unique(), 2);
        assert_eq!(w0.unique_of(HapIdx::new(0)), w0.unique_of(HapIdx::new(2)));
        assert_ne!(w0.unique_of(HapIdx::new(0)), w0.unique_of(HapIdx::new(1)));
        // Canonical representative is the lowest member
        let u0 = w0.unique_of(HapIdx::new(2));
        assert_eq!(w0.representative(u0), HapIdx::new(0));
        assert_eq!(
            w0.class_of(u0).unwrap(),
            &[HapIdx::new(0), HapIdx::new(2)]
        );

        let w1 = ch.window(1);
        assert_eq!(w1.n_unique(), 4);
        // Singletons are absent from the hapmap
        assert!(w1.class_of(w1.unique_of(HapIdx::new(0))).is_none());
    }

    #[test]
    fn test_every_hap_maps_to_one_column() {
        let ch = CompressedHaplotypes::compress(&toy_panel(), 4).unwrap();
        for w in 0..ch.n_windows() {
            let window = ch.window(w);
            for h in 0..ch.n_haplotypes() {
                let u = window.unique_of(HapIdx::new(h as u32));
                assert!(u.as_usize() < window.n_unique());
            }
        }
    }

    #[test]
    fn test_allele_materialization() {
        let panel = toy_panel();
        let ch = CompressedHaplotypes::compress(&panel, 4).unwrap();
        for row in 0..8 {
            for h in 0..4 {
                assert_eq!(
                    ch.allele(row, HapIdx::new(h as u32)).unwrap(),
                    panel.get(row, h),
                    "mismatch at ({}, {})",
                    row,
                    h
                );
            }
        }
        assert!(ch.allele(8, HapIdx::new(0)).is_err());
    }

    #[test]
    fn test_short_last_window() {
        let panel = BitMatrix::from_fn(10, 3, |row, col| (row + col) % 3 == 0);
        let ch = CompressedHaplotypes::compress(&panel, 4).unwrap();
        assert_eq!(ch.n_windows(), 3);
        assert_eq!(ch.window_start(2), 8);
        assert_eq!(ch.window_end(2), 10);
        assert_eq!(ch.window(2).uniques().n_rows(), 2);
    }

    #[test]
    fn test_altfreq() {
        let panel = BitMatrix::from_fn(2, 4, |row, col| row == 0 && col < 3);
        let ch = CompressedHaplotypes::compress(&panel, 2).unwrap();
        assert!((ch.altfreq(0) - 0.75).abs() < 1e-12);
        assert!((ch.altfreq(1) - 0.0).abs() < 1e-12);
    }
}
