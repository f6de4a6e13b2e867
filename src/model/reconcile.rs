//! # Intersection-Mode Reconciliation
//!
//! The fast path: walk each sample's per-window strand bit-sets left to
//! right, keeping a running intersection per strand. While the intersection
//! stays non-empty the same panel haplotype explains every window of the run;
//! when it empties, the finished run is committed to its consensus and a new
//! run starts. A crossover flip per window keeps the strands aligned with
//! whichever assignment preserves more overlap.
//!
//! The committed per-window labels are then stitched into segment mosaics,
//! with breakpoint search refining every label change.

use std::ops::Range;

use crate::data::genotype::GenotypeMatrix;
use crate::data::haplotype::{HapIdx, SampleIdx};
use crate::data::storage::compressed::CompressedHaplotypes;
use crate::data::storage::mosaic::HaplotypeMosaicPair;
use crate::data::storage::optimal_set::OptimalHaplotypeSet;
use crate::error::Result;
use crate::model::breakpoint::continue_haplotype;
use crate::utils::workspace::Workspace;

/// Run the intersection walk for one sample, producing one label pair per
/// window. `ws` supplies the two chain bit-sets so the walk allocates only
/// the label vector.
pub fn reconcile_intersection(
    ohs: &OptimalHaplotypeSet,
    sample: usize,
    ws: &mut Workspace,
) -> Vec<(HapIdx, HapIdx)> {
    let n_windows = ohs.n_windows();
    let mut labels1 = vec![HapIdx::default(); n_windows];
    let mut labels2 = vec![HapIdx::default(); n_windows];
    if n_windows == 0 {
        return Vec::new();
    }

    let chain1 = &mut ws.set_a;
    let chain2 = &mut ws.set_b;
    chain1.assign(ohs.strand1(0, sample));
    chain2.assign(ohs.strand2(0, sample));
    let mut run1_start = 0;
    let mut run2_start = 0;

    for w in 1..n_windows {
        let s1 = ohs.strand1(w, sample);
        let s2 = ohs.strand2(w, sample);

        // Crossover flip: keep whichever strand assignment preserves more
        // overlap with the running chains; ties prefer no flip
        let parallel = chain1.intersection_len(s1) + chain2.intersection_len(s2);
        let crossover = chain1.intersection_len(s2) + chain2.intersection_len(s1);
        let (s1, s2) = if parallel < crossover { (s2, s1) } else { (s1, s2) };

        if chain1.intersects(s1) {
            chain1.intersect_with(s1);
        } else {
            let label = chain1.first().expect("run chain is never empty");
            labels1[run1_start..w].fill(label);
            chain1.assign(s1);
            run1_start = w;
        }

        if chain2.intersects(s2) {
            chain2.intersect_with(s2);
        } else {
            let label = chain2.first().expect("run chain is never empty");
            labels2[run2_start..w].fill(label);
            chain2.assign(s2);
            run2_start = w;
        }
    }

    // Commit the final runs
    let label = chain1.first().expect("run chain is never empty");
    labels1[run1_start..n_windows].fill(label);
    let label = chain2.first().expect("run chain is never empty");
    labels2[run2_start..n_windows].fill(label);

    labels1.into_iter().zip(labels2).collect()
}

/// Stitch per-window label pairs into segment mosaics for one sample.
///
/// `windows` are the global window indices the labels cover (one chunk).
/// Every boundary where the pair changes is refined by breakpoint search;
/// a split of `-1` or one falling past the typed rows emits no segment.
/// Returns the mosaics plus the boundary-oriented label per window.
pub fn stitch_mosaic(
    genotypes: &GenotypeMatrix,
    compressed: &CompressedHaplotypes,
    sample: SampleIdx,
    windows: Range<usize>,
    labels: &[(HapIdx, HapIdx)],
    flank: usize,
    mosaic: &mut HaplotypeMosaicPair,
) -> Result<Vec<(HapIdx, HapIdx)>> {
    debug_assert_eq!(windows.len(), labels.len());
    let n_typed = compressed.n_typed();
    let mut oriented = Vec::with_capacity(labels.len());
    if labels.is_empty() {
        return Ok(oriented);
    }

    let w0 = windows.start;
    let first = labels[0];
    oriented.push(first);
    mosaic.strand1.push(compressed.window_start(w0), first.0, w0);
    mosaic.strand2.push(compressed.window_start(w0), first.1, w0);

    for (k, &raw) in labels.iter().enumerate().skip(1) {
        let w = w0 + k;
        let prev = oriented[k - 1];
        if raw == prev || (raw.0, raw.1) == (prev.1, prev.0) {
            oriented.push(prev);
            continue;
        }

        let stretch_start = compressed.window_start(w - 1).saturating_sub(flank);
        let stretch_end = (compressed.window_end(w) + flank).min(n_typed);
        let result = continue_haplotype(
            genotypes,
            compressed,
            sample,
            stretch_start..stretch_end,
            prev,
            raw,
        )?;
        oriented.push(result.next);

        if result.bkpt1 >= 0 {
            let start = stretch_start + result.bkpt1 as usize + 1;
            if start < n_typed {
                mosaic.strand1.push(start, result.next.0, w);
            }
        }
        if result.bkpt2 >= 0 {
            let start = stretch_start + result.bkpt2 as usize + 1;
            if start < n_typed {
                mosaic.strand2.push(start, result.next.1, w);
            }
        }
    }

    mosaic.strand1.set_length(n_typed);
    mosaic.strand2.set_length(n_typed);
    Ok(oriented)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::haplotype::Samples;
    use crate::data::storage::bitset::HapSet;
    use std::sync::Arc;

    fn set(d: usize, members: &[u32]) -> HapSet {
        let mut s = HapSet::new(d);
        for &m in members {
            s.insert(HapIdx::new(m));
        }
        s
    }

    #[test]
    fn test_run_consensus_commits_intersection() {
        // Strand 1 narrows 0,1 -> 1 over three windows then breaks to 5;
        // strand 2 stays on 2 throughout
        let windows = vec![
            (vec![set(8, &[0, 1])], vec![set(8, &[2, 3])]),
            (vec![set(8, &[1, 4])], vec![set(8, &[2])]),
            (vec![set(8, &[1])], vec![set(8, &[2, 6])]),
            (vec![set(8, &[5])], vec![set(8, &[2])]),
        ];
        let ohs = OptimalHaplotypeSet::from_windows(windows, 8);
        let mut ws = Workspace::minimal();
        ws.resize(0, 0, 0, 8);

        let labels = reconcile_intersection(&ohs, 0, &mut ws);
        assert_eq!(
            labels,
            vec![
                (HapIdx::new(1), HapIdx::new(2)),
                (HapIdx::new(1), HapIdx::new(2)),
                (HapIdx::new(1), HapIdx::new(2)),
                (HapIdx::new(5), HapIdx::new(2)),
            ]
        );
    }

    #[test]
    fn test_crossover_flip_preferred_when_overlap_larger() {
        // Window 1 arrives with the strands swapped; the flip keeps both
        // chains alive
        let windows = vec![
            (vec![set(8, &[0])], vec![set(8, &[1])]),
            (vec![set(8, &[1])], vec![set(8, &[0])]),
        ];
        let ohs = OptimalHaplotypeSet::from_windows(windows, 8);
        let mut ws = Workspace::minimal();
        ws.resize(0, 0, 0, 8);

        let labels = reconcile_intersection(&ohs, 0, &mut ws);
        assert_eq!(
            labels,
            vec![
                (HapIdx::new(0), HapIdx::new(1)),
                (HapIdx::new(0), HapIdx::new(1)),
            ]
        );
    }

    #[test]
    fn test_single_window_sample() {
        let windows = vec![(vec![set(4, &[2, 3])], vec![set(4, &[1])])];
        let ohs = OptimalHaplotypeSet::from_windows(windows, 4);
        let mut ws = Workspace::minimal();
        ws.resize(0, 0, 0, 4);

        let labels = reconcile_intersection(&ohs, 0, &mut ws);
        assert_eq!(labels, vec![(HapIdx::new(2), HapIdx::new(1))]);
    }

    #[test]
    fn test_stitch_single_run_yields_single_segments() {
        use crate::data::storage::bitmatrix::BitMatrix;

        let panel = BitMatrix::from_fn(20, 4, |row, col| match col {
            0 => false,
            1 => true,
            c => row % (c + 1) == 0,
        });
        let ch = CompressedHaplotypes::compress(&panel, 10).unwrap();
        let data: Vec<u8> = (0..20)
            .map(|row| panel.get(row, 1) as u8 + panel.get(row, 2) as u8)
            .collect();
        let samples = Arc::new(Samples::from_ids(vec!["S0".to_string()]));
        let gm = GenotypeMatrix::new(data, 20, samples).unwrap();

        let labels = vec![
            (HapIdx::new(1), HapIdx::new(2)),
            (HapIdx::new(1), HapIdx::new(2)),
        ];
        let mut mosaic = HaplotypeMosaicPair::new();
        let oriented =
            stitch_mosaic(&gm, &ch, SampleIdx::new(0), 0..2, &labels, 1, &mut mosaic).unwrap();

        assert_eq!(oriented.len(), 2);
        assert_eq!(mosaic.strand1.n_segments(), 1);
        assert_eq!(mosaic.strand2.n_segments(), 1);
        assert!(mosaic.validate().is_ok());
    }
}
