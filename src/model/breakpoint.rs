//! # Breakpoint Search
//!
//! Locates the within-stretch crossover position when consecutive windows
//! switch haplotype labels. The stretch spans the two adjacent windows plus
//! flanks; the scan is O(len) after an O(len) initialization because moving
//! the split by one row changes the residual at exactly one marker.
//!
//! Breakpoint convention: rows are 0-based within the stretch, rows `<= bkpt`
//! carry the outgoing label and rows `> bkpt` the incoming one. `bkpt = -1`
//! means the incoming label fits the whole stretch (or the labels are equal)
//! and no split position exists.

use std::ops::Range;

use crate::data::genotype::{GenotypeMatrix, MISSING};
use crate::data::haplotype::{HapIdx, SampleIdx};
use crate::data::storage::compressed::CompressedHaplotypes;
use crate::error::Result;

/// Outcome of stitching one window boundary
#[derive(Clone, Copy, Debug)]
pub struct ContinueResult {
    /// Incoming pair, oriented to minimize strand changes against the
    /// outgoing pair
    pub next: (HapIdx, HapIdx),
    /// Split on strand 1, `-1` when the strand does not break in-stretch
    pub bkpt1: i64,
    /// Split on strand 2
    pub bkpt2: i64,
    /// Observed-entry squared residual of the best stitching
    pub err: f32,
}

/// Materialize one haplotype's alleles over a typed-row range as floats
fn alleles(
    compressed: &CompressedHaplotypes,
    range: &Range<usize>,
    hap: HapIdx,
) -> Result<Vec<f32>> {
    range
        .clone()
        .map(|row| Ok(compressed.allele(row, hap)? as u8 as f32))
        .collect()
}

/// Genotypes over the range; missing entries get a NaN sentinel plus a mask
fn genotype_slice(
    genotypes: &GenotypeMatrix,
    range: &Range<usize>,
    sample: SampleIdx,
) -> (Vec<f32>, Vec<bool>) {
    let mut xs = Vec::with_capacity(range.len());
    let mut observed = Vec::with_capacity(range.len());
    for row in range.clone() {
        let g = genotypes.get(row, sample);
        observed.push(g != MISSING);
        xs.push(if g == MISSING { 0.0 } else { g as f32 });
    }
    (xs, observed)
}

/// Single-strand breakpoint search.
///
/// `fixed` is the non-switching strand's label over the whole stretch;
/// `(cur, next)` the switching strand's ordered candidate. Returns the split
/// minimizing the observed-entry squared residual; the scan starts at the
/// all-`next` assignment and improves strictly, so the smallest split wins
/// ties and `(-1, err)` is returned when no split strictly improves.
pub fn search_breakpoint(
    genotypes: &GenotypeMatrix,
    compressed: &CompressedHaplotypes,
    sample: SampleIdx,
    range: Range<usize>,
    fixed: HapIdx,
    (cur, next): (HapIdx, HapIdx),
) -> Result<(i64, f32)> {
    let len = range.len();
    let (xs, observed) = genotype_slice(genotypes, &range, sample);
    let h_fixed = alleles(compressed, &range, fixed)?;
    let h_cur = alleles(compressed, &range, cur)?;
    let h_next = alleles(compressed, &range, next)?;

    // bkpt = -1: every row on `next`
    let mut err: f32 = (0..len)
        .filter(|&i| observed[i])
        .map(|i| {
            let diff = xs[i] - h_fixed[i] - h_next[i];
            diff * diff
        })
        .sum();
    let mut best_err = err;
    let mut best_bkpt: i64 = -1;

    if cur == next {
        return Ok((-1, best_err));
    }

    // Shifting the split right by one row moves that row from `next` to
    // `cur`; only its term changes.
    for bkpt in 0..len {
        if observed[bkpt] {
            let base = xs[bkpt] - h_fixed[bkpt];
            let to_cur = base - h_cur[bkpt];
            let to_next = base - h_next[bkpt];
            err += to_cur * to_cur - to_next * to_next;
        }
        if err < best_err {
            best_err = err;
            best_bkpt = bkpt as i64;
        }
    }

    Ok((best_bkpt, best_err))
}

/// Double-switch breakpoint search: both strands change label across the
/// stretch. Scans the full split grid, inner dimension incrementally, and
/// returns `(bkpt1, bkpt2)` minimizing the joint observed-entry residual.
/// Ties prefer the lexicographically smallest split pair.
pub fn search_breakpoint_double(
    genotypes: &GenotypeMatrix,
    compressed: &CompressedHaplotypes,
    sample: SampleIdx,
    range: Range<usize>,
    (cur1, next1): (HapIdx, HapIdx),
    (cur2, next2): (HapIdx, HapIdx),
) -> Result<((i64, i64), f32)> {
    let len = range.len();
    let (xs, observed) = genotype_slice(genotypes, &range, sample);
    let h_cur1 = alleles(compressed, &range, cur1)?;
    let h_next1 = alleles(compressed, &range, next1)?;
    let h_cur2 = alleles(compressed, &range, cur2)?;
    let h_next2 = alleles(compressed, &range, next2)?;

    // Residual of strand 2 against `x - strand1`, with strand 1 fixed at the
    // current outer split. Starts with strand 1 fully on `next1`.
    let mut g: Vec<f32> = (0..len).map(|i| xs[i] - h_next1[i]).collect();

    let mut best_err = f32::INFINITY;
    let mut best = (-1i64, -1i64);

    let mut bkpt1: i64 = -1;
    loop {
        // Inner scan over strand 2 splits, incremental as in the single case
        let mut err: f32 = (0..len)
            .filter(|&i| observed[i])
            .map(|i| {
                let diff = g[i] - h_next2[i];
                diff * diff
            })
            .sum();
        if err < best_err {
            best_err = err;
            best = (bkpt1, -1);
        }
        for bkpt2 in 0..len {
            if observed[bkpt2] {
                let to_cur = g[bkpt2] - h_cur2[bkpt2];
                let to_next = g[bkpt2] - h_next2[bkpt2];
                err += to_cur * to_cur - to_next * to_next;
            }
            if err < best_err {
                best_err = err;
                best = (bkpt1, bkpt2 as i64);
            }
        }

        // Advance the outer split: one more leading row on `cur1`
        let row = (bkpt1 + 1) as usize;
        if row >= len {
            break;
        }
        g[row] = xs[row] - h_cur1[row];
        bkpt1 += 1;
    }

    Ok((best, best_err))
}

/// Stitch one window boundary: orient the incoming pair against the
/// outgoing one, then run the appropriate breakpoint search.
///
/// Equal pairs return `(-1, -1)` so no spurious segment is emitted when the
/// stitching already fits.
pub fn continue_haplotype(
    genotypes: &GenotypeMatrix,
    compressed: &CompressedHaplotypes,
    sample: SampleIdx,
    range: Range<usize>,
    prev: (HapIdx, HapIdx),
    next: (HapIdx, HapIdx),
) -> Result<ContinueResult> {
    let (a, b) = prev;
    let (c, d) = next;

    // Same pair in either orientation: nothing switches
    if (a, b) == (c, d) || (a, b) == (d, c) {
        let (_, err) = search_breakpoint(genotypes, compressed, sample, range, a, (b, b))?;
        return Ok(ContinueResult {
            next: (a, b),
            bkpt1: -1,
            bkpt2: -1,
            err,
        });
    }

    // One strand continues: single switch on the other
    if a == c || a == d {
        let incoming = if a == c { d } else { c };
        let (bkpt2, err) =
            search_breakpoint(genotypes, compressed, sample, range, a, (b, incoming))?;
        return Ok(ContinueResult {
            next: (a, incoming),
            bkpt1: -1,
            bkpt2,
            err,
        });
    }
    if b == c || b == d {
        let incoming = if b == c { d } else { c };
        let (bkpt1, err) =
            search_breakpoint(genotypes, compressed, sample, range, b, (a, incoming))?;
        return Ok(ContinueResult {
            next: (incoming, b),
            bkpt1,
            bkpt2: -1,
            err,
        });
    }

    // Both strands switch: try both orientations of the incoming pair and
    // keep the better stitching (ties prefer the unswapped orientation)
    let (split_fwd, err_fwd) = search_breakpoint_double(
        genotypes,
        compressed,
        sample,
        range.clone(),
        (a, c),
        (b, d),
    )?;
    let (split_rev, err_rev) =
        search_breakpoint_double(genotypes, compressed, sample, range, (a, d), (b, c))?;

    if err_rev < err_fwd {
        Ok(ContinueResult {
            next: (d, c),
            bkpt1: split_rev.0,
            bkpt2: split_rev.1,
            err: err_rev,
        })
    } else {
        Ok(ContinueResult {
            next: (c, d),
            bkpt1: split_fwd.0,
            bkpt2: split_fwd.1,
            err: err_fwd,
        })
    }
}
