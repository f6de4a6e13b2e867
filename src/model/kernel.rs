//! # Pair-Search Kernel
//!
//! For one window, finds per sample the ordered pair of unique columns
//! `(a, b)` minimizing `||x - u_a - u_b||^2` over entries treated as
//! observed. The objective is assembled algebraically:
//!
//! ```text
//! M[a,b] = ||u_a + u_b||^2 = ||u_a||^2 + ||u_b||^2 + 2 u_a'u_b
//! N[j,a] = 2 x_j'u_a
//! ||x_j - u_a - u_b||^2 = ||x_j||^2 + M[a,b] - N[j,a] - N[j,b]
//! ```
//!
//! so the per-sample scan touches only the upper triangle of `M` and one row
//! of `N`. Missing entries are pre-imputed with twice the window's empirical
//! allele frequency before the products are formed.

use std::time::{Duration, Instant};

use crate::data::genotype::{GenotypeMatrix, MISSING};
use crate::data::haplotype::UniqueIdx;
use crate::data::storage::compressed::CompressedHaplotypes;
use crate::error::{HapmosaicError, Result};
use crate::model::screening;
use crate::utils::workspace::Workspace;

/// Wall-clock accumulators for the kernel phases, kept per worker thread
/// and summed when a chunk completes.
#[derive(Clone, Copy, Debug, Default)]
pub struct KernelTimers {
    /// t1: prescreen column selection
    pub screen: Duration,
    /// t2: work-matrix initialization and `M`/`N` assembly
    pub matmul: Duration,
    /// t3: pair scan
    pub scan: Duration,
    /// t4: observed-entry rescoring
    pub rescreen: Duration,
    /// t5: redundancy expansion
    pub expand: Duration,
}

impl KernelTimers {
    pub fn merge(&mut self, other: &KernelTimers) {
        self.screen += other.screen;
        self.matmul += other.matmul;
        self.scan += other.scan;
        self.rescreen += other.rescreen;
        self.expand += other.expand;
    }

    pub fn total(&self) -> Duration {
        self.screen + self.matmul + self.scan + self.rescreen + self.expand
    }
}

/// Search strategy for one window
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PairSearchMethod {
    /// Scan every pair in the upper triangle
    Exhaustive,
    /// Stepwise-gradient prescreen: per sample, restrict the first pair
    /// member to the `r` best columns
    Lasso { r: usize },
    /// Keep the `tf` columns most aligned with each sample and search the
    /// small triangle, skipping the global Gramian entirely
    Thinning { tf: usize },
}

/// Kernel invocation options
#[derive(Clone, Copy, Debug)]
pub struct KernelOptions {
    pub method: PairSearchMethod,
    /// Rescore top candidates on observed entries after the scan
    pub rescreen: bool,
    /// Inverse-variance row scaling from reference allele frequencies
    pub scale_allelefreq: bool,
    /// Candidate pairs retained per sample (1 keeps only the best)
    pub keep: usize,
}

impl Default for KernelOptions {
    fn default() -> Self {
        Self {
            method: PairSearchMethod::Exhaustive,
            rescreen: false,
            scale_allelefreq: false,
            keep: 1,
        }
    }
}

/// Per-window kernel output
#[derive(Clone, Debug)]
pub struct PairSearchResult {
    /// Best ordered pair per sample, in unique-column space
    pub pairs: Vec<(UniqueIdx, UniqueIdx)>,
    /// Objective value per sample (`>= 0` up to rounding)
    pub scores: Vec<f32>,
    /// Candidate pairs per sample, best first; empty unless `keep > 1`
    pub candidates: Vec<Vec<(UniqueIdx, UniqueIdx)>>,
}

/// Inverse-variance row weight with the low-frequency floor: any frequency
/// whose weight would exceed the floor value 1.98 (in particular p < 0.15)
/// is capped there, which also keeps monomorphic rows finite.
#[inline]
pub fn allele_weight(p: f64) -> f32 {
    let w = 1.0 / (2.0 * p * (1.0 - p)).sqrt();
    (w as f32).min(1.98)
}

/// Run the pair search on one window.
///
/// `genotypes` spans all typed rows; the slice for `window` is taken
/// internally. Results are in the unique-column space of that window.
pub fn haplopair(
    genotypes: &GenotypeMatrix,
    compressed: &CompressedHaplotypes,
    window: usize,
    opts: &KernelOptions,
    ws: &mut Workspace,
) -> Result<PairSearchResult> {
    let dict = compressed.window(window);
    let start = compressed.window_start(window);
    let p = compressed.window_end(window) - start;
    let d = dict.n_unique();
    let n = genotypes.n_samples();

    if d == 0 {
        return Err(HapmosaicError::algorithm(format!(
            "window {} has an empty haplotype panel",
            window
        )));
    }

    ws.resize(p, d, n, compressed.n_haplotypes());

    let build_gram = !matches!(opts.method, PairSearchMethod::Thinning { .. });

    // ---- t2: work matrices ----
    let t2 = Instant::now();

    // Pre-impute missing entries with 2q from this window's observed data,
    // column-major by sample.
    for i in 0..p {
        let row = genotypes.row(start + i);
        let fill = 2.0 * genotypes.row_allele_frequency(start + i) as f32;
        for (j, &g) in row.iter().enumerate() {
            ws.xwork[j * p + i] = if g == MISSING { fill } else { g as f32 };
        }
    }

    if ws.xwork[..p * n].iter().any(|v| !v.is_finite()) {
        return Err(HapmosaicError::algorithm(
            "non-finite entry in genotype work matrix after initialization",
        ));
    }

    // Float copy of the unique matrix, then optional row scaling of both
    // matrices. Scaling must precede both M and N assembly.
    let uniques = dict.uniques();
    for a in 0..d {
        for i in 0..p {
            ws.uwork[a * p + i] = uniques.get(i, a) as u8 as f32;
        }
    }
    if opts.scale_allelefreq {
        for i in 0..p {
            let w = allele_weight(compressed.altfreq(start + i));
            for a in 0..d {
                ws.uwork[a * p + i] *= w;
            }
            for j in 0..n {
                ws.xwork[j * p + i] *= w;
            }
        }
    }

    // Gramian upper triangle, then the in-place transform to M:
    // M[a,b] = G[a,a] + G[b,b] + 2 G[a,b] off the diagonal, 4 G[a,a] on it.
    if build_gram {
        for b in 0..d {
            let ub = &ws.uwork[b * p..b * p + p];
            for a in 0..=b {
                let ua = &ws.uwork[a * p..a * p + p];
                let dot: f32 = ua.iter().zip(ub).map(|(x, y)| x * y).sum();
                ws.m[a * d + b] = dot;
            }
        }
        for a in 0..d {
            ws.diag[a] = ws.m[a * d + a];
        }
        for b in 0..d {
            for a in 0..b {
                ws.m[a * d + b] = 2.0 * ws.m[a * d + b] + ws.diag[a] + ws.diag[b];
            }
            ws.m[b * d + b] = 4.0 * ws.diag[b];
        }
    }

    // N[j,a] = 2 x_j'u_a and the squared norms.
    for j in 0..n {
        let xj = &ws.xwork[j * p..j * p + p];
        ws.xnorm[j] = xj.iter().map(|v| v * v).sum();
        for a in 0..d {
            let ua = &ws.uwork[a * p..a * p + p];
            let dot: f32 = xj.iter().zip(ua).map(|(x, y)| x * y).sum();
            ws.n[j * d + a] = 2.0 * dot;
        }
    }

    ws.timers.matmul += t2.elapsed();

    // Column sums for the thinning criterion, once per window
    if matches!(opts.method, PairSearchMethod::Thinning { .. }) {
        let t1 = Instant::now();
        for a in 0..d {
            ws.grad[a] = ws.uwork[a * p..a * p + p].iter().sum();
        }
        ws.timers.screen += t1.elapsed();
    }

    // ---- t1 + t3: screening and pair scan ----
    let keep = opts.keep.max(1);
    let mut candidates: Vec<Vec<(UniqueIdx, UniqueIdx)>> = if keep > 1 {
        Vec::with_capacity(n)
    } else {
        Vec::new()
    };

    for j in 0..n {
        let (best, a, b) = match opts.method {
            PairSearchMethod::Exhaustive => {
                let t3 = Instant::now();
                let found = scan_full(&ws.m, &ws.n[j * d..j * d + d], d, keep, &mut ws.topk);
                ws.timers.scan += t3.elapsed();
                found
            }
            PairSearchMethod::Lasso { r } => {
                let t1 = Instant::now();
                screening::lasso_select(
                    &ws.m,
                    &ws.diag,
                    &ws.n[j * d..j * d + d],
                    d,
                    r,
                    &mut ws.grad,
                    &mut ws.maxindx,
                    &mut ws.maxgrad,
                    &mut ws.selected,
                );
                ws.timers.screen += t1.elapsed();

                let t3 = Instant::now();
                let found = screening::scan_lasso(
                    &ws.m,
                    &ws.n[j * d..j * d + d],
                    d,
                    &ws.selected,
                    keep,
                    &mut ws.topk,
                );
                ws.timers.scan += t3.elapsed();
                found
            }
            PairSearchMethod::Thinning { tf } => screening::thinning_search(
                &ws.uwork,
                &ws.xwork[j * p..j * p + p],
                &ws.n[j * d..j * d + d],
                &ws.grad,
                p,
                d,
                tf,
                keep,
                &mut ws.thin,
                &mut ws.selected,
                &mut ws.topk,
                &mut ws.timers,
            ),
        };

        if !best.is_finite() {
            return Err(HapmosaicError::algorithm(format!(
                "pair scan found no candidate for sample {} in window {}",
                j, window
            )));
        }

        ws.happair1[j] = a;
        ws.happair2[j] = b;
        // hapscore accumulates the squared norm of the work genotype
        ws.hapscore[j] = (best + ws.xnorm[j]).max(0.0);
        if keep > 1 {
            candidates.push(
                ws.topk
                    .iter()
                    .map(|&(_, a, b)| (UniqueIdx::new(a), UniqueIdx::new(b)))
                    .collect(),
            );
        }
    }

    // ---- t4: observed-entry rescoring ----
    if opts.rescreen {
        let t4 = Instant::now();
        for j in 0..n {
            let pool: Vec<(u32, u32)> = if keep > 1 {
                candidates[j].iter().map(|&(a, b)| (a.0, b.0)).collect()
            } else {
                vec![(ws.happair1[j], ws.happair2[j])]
            };
            let mut best_err = f32::INFINITY;
            let mut best_pair = pool[0];
            for &(a, b) in &pool {
                let err = exact_residual(genotypes, start, p, j, uniques, a, b);
                if err < best_err {
                    best_err = err;
                    best_pair = (a, b);
                }
            }
            ws.happair1[j] = best_pair.0;
            ws.happair2[j] = best_pair.1;
            ws.hapscore[j] = best_err;
        }
        ws.timers.rescreen += t4.elapsed();
    }

    let pairs = (0..n)
        .map(|j| (UniqueIdx::new(ws.happair1[j]), UniqueIdx::new(ws.happair2[j])))
        .collect();
    Ok(PairSearchResult {
        pairs,
        scores: ws.hapscore[..n].to_vec(),
        candidates,
    })
}

/// Upper-triangle scan. Iteration is `for b, for a <= b` with strict
/// improvement, so the first-found pair wins ties deterministically.
/// When `keep > 1`, the best `keep` candidates are retained in `topk`.
pub(crate) fn scan_full(
    m: &[f32],
    n_row: &[f32],
    d: usize,
    keep: usize,
    topk: &mut Vec<(f32, u32, u32)>,
) -> (f32, u32, u32) {
    topk.clear();
    let mut best = f32::INFINITY;
    let mut best_a = 0u32;
    let mut best_b = 0u32;
    for b in 0..d {
        let nb = n_row[b];
        for a in 0..=b {
            let score = m[a * d + b] - n_row[a] - nb;
            if score < best {
                best = score;
                best_a = a as u32;
                best_b = b as u32;
            }
            if keep > 1 {
                offer_candidate(topk, keep, score, a as u32, b as u32);
            }
        }
    }
    (best, best_a, best_b)
}

/// Insert a candidate into the bounded best-`keep` list, keeping it sorted
/// ascending by score with earlier-found pairs ahead on ties.
pub(crate) fn offer_candidate(
    topk: &mut Vec<(f32, u32, u32)>,
    keep: usize,
    score: f32,
    a: u32,
    b: u32,
) {
    if topk.len() == keep && score >= topk[keep - 1].0 {
        return;
    }
    let pos = topk.partition_point(|c| c.0 <= score);
    topk.insert(pos, (score, a, b));
    topk.truncate(keep);
}

/// Exact squared residual over observed entries only, in unscaled genotype
/// units. Used by the rescreen pass.
pub(crate) fn exact_residual(
    genotypes: &GenotypeMatrix,
    start: usize,
    p: usize,
    sample: usize,
    uniques: &crate::data::storage::bitmatrix::BitMatrix,
    a: u32,
    b: u32,
) -> f32 {
    let mut err = 0.0f32;
    for i in 0..p {
        let g = genotypes.row(start + i)[sample];
        if g == MISSING {
            continue;
        }
        let fit = uniques.get(i, a as usize) as u8 + uniques.get(i, b as usize) as u8;
        let diff = g as f32 - fit as f32;
        err += diff * diff;
    }
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::haplotype::Samples;
    use crate::data::storage::bitmatrix::BitMatrix;
    use std::sync::Arc;

    fn toy_compressed() -> CompressedHaplotypes {
        // Two rows, four distinct haplotypes over them
        let panel = BitMatrix::from_fn(2, 4, |row, col| match col {
            0 => false,
            1 => true,
            2 => row == 0,
            _ => row == 1,
        });
        CompressedHaplotypes::compress(&panel, 2).unwrap()
    }

    fn target(entries: Vec<u8>, n_samples: usize) -> GenotypeMatrix {
        let samples = Arc::new(Samples::from_ids(
            (0..n_samples).map(|i| format!("S{}", i)).collect(),
        ));
        GenotypeMatrix::new(entries, 2, samples).unwrap()
    }

    #[test]
    fn test_exact_pair_recovered() {
        // x = u_1 + u_2 (all-ones plus [1,0]) = [2, 1]
        let ch = toy_compressed();
        let gm = target(vec![2, 1], 1);
        let mut ws = Workspace::minimal();
        let result = haplopair(&gm, &ch, 0, &KernelOptions::default(), &mut ws).unwrap();
        assert_eq!(result.pairs[0], (UniqueIdx::new(1), UniqueIdx::new(2)));
        assert!(result.scores[0].abs() < 1e-5);
    }

    #[test]
    fn test_tie_breaks_first_found() {
        // All-zero sample: (0,0) fits exactly; ties elsewhere must not win
        let ch = toy_compressed();
        let gm = target(vec![0, 0], 1);
        let mut ws = Workspace::minimal();
        let result = haplopair(&gm, &ch, 0, &KernelOptions::default(), &mut ws).unwrap();
        assert_eq!(result.pairs[0], (UniqueIdx::new(0), UniqueIdx::new(0)));
    }

    #[test]
    fn test_missing_preimputation_keeps_fit() {
        // Second row missing; observed row still selects the het pair
        let ch = toy_compressed();
        let gm = target(vec![2, MISSING], 1);
        let mut ws = Workspace::minimal();
        let result = haplopair(&gm, &ch, 0, &KernelOptions::default(), &mut ws).unwrap();
        let (a, b) = result.pairs[0];
        // Row 0 must be explained exactly: both chosen columns carry the alt
        let u = ch.window(0).uniques();
        assert_eq!(
            u.get(0, a.as_usize()) as u8 + u.get(0, b.as_usize()) as u8,
            2
        );
    }

    #[test]
    fn test_scores_nonnegative() {
        let ch = toy_compressed();
        let gm = target(vec![1, 1, 0, 2, 2, 0], 3);
        let mut ws = Workspace::minimal();
        let result = haplopair(&gm, &ch, 0, &KernelOptions::default(), &mut ws).unwrap();
        for (j, &s) in result.scores.iter().enumerate() {
            assert!(s >= 0.0, "sample {} score {}", j, s);
            let (a, b) = result.pairs[j];
            assert!(a <= b);
        }
    }

    #[test]
    fn test_candidate_list_sorted() {
        let mut topk = Vec::new();
        offer_candidate(&mut topk, 3, 5.0, 0, 1);
        offer_candidate(&mut topk, 3, 1.0, 0, 2);
        offer_candidate(&mut topk, 3, 5.0, 1, 1);
        offer_candidate(&mut topk, 3, 0.5, 2, 2);
        assert_eq!(topk.len(), 3);
        assert_eq!(topk[0], (0.5, 2, 2));
        assert_eq!(topk[1], (1.0, 0, 2));
        // Equal scores keep the earlier-found pair
        assert_eq!(topk[2], (5.0, 0, 1));
    }

    #[test]
    fn test_allele_weight_floor() {
        assert!((allele_weight(0.5) - 1.0 / 0.5f32.sqrt()).abs() < 1e-6);
        assert_eq!(allele_weight(0.05), 1.98);
        assert_eq!(allele_weight(0.0), 1.98);
        assert_eq!(allele_weight(1.0), 1.98);
    }
}
