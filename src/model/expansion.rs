//! # Redundancy Expansion
//!
//! A unique-column pair chosen by the kernel stands for every complete-panel
//! haplotype that collapses to those columns on the window's typed markers.
//! Expansion replays the equivalence classes into per-strand bit-sets so
//! reconciliation can intersect across windows.

use crate::data::haplotype::UniqueIdx;
use crate::data::storage::bitset::HapSet;
use crate::data::storage::compressed::CompressedWindow;

/// Expand one sample's unique pair `(a, b)` into per-strand bit-sets over
/// the complete panel.
///
/// With `expand_redundants`, each strand receives the full equivalence class
/// of its column; otherwise only the canonical representative, which keeps
/// the sets small at the cost of intersection power downstream.
pub fn expand_pair(
    window: &CompressedWindow,
    pair: (UniqueIdx, UniqueIdx),
    expand_redundants: bool,
    strand1: &mut HapSet,
    strand2: &mut HapSet,
) {
    expand_one(window, pair.0, expand_redundants, strand1);
    expand_one(window, pair.1, expand_redundants, strand2);
}

fn expand_one(
    window: &CompressedWindow,
    unique: UniqueIdx,
    expand_redundants: bool,
    out: &mut HapSet,
) {
    out.clear();
    if expand_redundants {
        if let Some(class) = window.class_of(unique) {
            for &hap in class {
                out.insert(hap);
            }
            return;
        }
    }
    out.insert(window.representative(unique));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::haplotype::HapIdx;
    use crate::data::storage::bitmatrix::BitMatrix;
    use crate::data::storage::compressed::CompressedHaplotypes;

    fn duplicated_panel() -> CompressedHaplotypes {
        // Haps 0, 2, 4 identical; 1 and 3 identical; window covers all rows
        let panel = BitMatrix::from_fn(3, 5, |row, col| {
            if col % 2 == 0 {
                row == 0
            } else {
                row != 0
            }
        });
        CompressedHaplotypes::compress(&panel, 3).unwrap()
    }

    #[test]
    fn test_expand_full_class() {
        let ch = duplicated_panel();
        let window = ch.window(0);
        let u_even = window.unique_of(HapIdx::new(4));
        let u_odd = window.unique_of(HapIdx::new(3));

        let mut s1 = HapSet::new(5);
        let mut s2 = HapSet::new(5);
        expand_pair(window, (u_even, u_odd), true, &mut s1, &mut s2);

        assert_eq!(
            s1.iter().collect::<Vec<_>>(),
            vec![HapIdx::new(0), HapIdx::new(2), HapIdx::new(4)]
        );
        assert_eq!(
            s2.iter().collect::<Vec<_>>(),
            vec![HapIdx::new(1), HapIdx::new(3)]
        );
    }

    #[test]
    fn test_expand_representative_only() {
        let ch = duplicated_panel();
        let window = ch.window(0);
        let u_even = window.unique_of(HapIdx::new(4));

        let mut s1 = HapSet::new(5);
        let mut s2 = HapSet::new(5);
        expand_pair(window, (u_even, u_even), false, &mut s1, &mut s2);

        assert_eq!(s1.len(), 1);
        assert_eq!(s1.first(), Some(HapIdx::new(0)));
        assert_eq!(s2.first(), Some(HapIdx::new(0)));
    }

    #[test]
    fn test_expanded_sets_nonempty() {
        let ch = duplicated_panel();
        let window = ch.window(0);
        for u in 0..window.n_unique() {
            let mut s1 = HapSet::new(5);
            let mut s2 = HapSet::new(5);
            let unique = UniqueIdx::new(u as u32);
            expand_pair(window, (unique, unique), true, &mut s1, &mut s2);
            assert!(s1.len() >= 1);
            assert!(s2.len() >= 1);
        }
    }
}
