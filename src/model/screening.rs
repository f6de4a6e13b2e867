//! # Prescreen Variants
//!
//! When a window's unique-column count is large, the quadratic pair scan
//! dominates. These variants shrink the candidate space per sample before
//! the scan. Tie-breaking everywhere is the smallest column index, enforced
//! by ascending scans with strict improvement.

use std::time::Instant;

use crate::model::kernel::{offer_candidate, KernelTimers};

/// Raw Gramian entry `u_a'u_b`, recovered from the transformed `M` and the
/// saved diagonal.
#[inline]
fn raw_gram(m: &[f32], diag: &[f32], d: usize, a: usize, b: usize) -> f32 {
    if a == b {
        diag[a]
    } else {
        let (lo, hi) = if a < b { (a, b) } else { (b, a) };
        0.5 * (m[lo * d + hi] - diag[lo] - diag[hi])
    }
}

/// Stepwise-gradient column selection for one sample.
///
/// Starts from the raw correlations `x'u_a` and repeatedly takes the column
/// with the largest absolute gradient, then deflates every gradient by the
/// chosen column's Gramian row. `selected` ends sorted ascending;
/// `maxindx`/`maxgrad` record the selection order and criterion values.
#[allow(clippy::too_many_arguments)]
pub(crate) fn lasso_select(
    m: &[f32],
    diag: &[f32],
    n_row: &[f32],
    d: usize,
    r: usize,
    grad: &mut [f32],
    maxindx: &mut Vec<usize>,
    maxgrad: &mut Vec<f32>,
    selected: &mut Vec<usize>,
) {
    maxindx.clear();
    maxgrad.clear();
    selected.clear();

    // N is stored doubled; the stepwise criterion works in raw units
    for a in 0..d {
        grad[a] = 0.5 * n_row[a];
    }

    let r = r.min(d);
    for _ in 0..r {
        let mut best = f32::NEG_INFINITY;
        let mut best_idx = usize::MAX;
        for a in 0..d {
            if selected.contains(&a) {
                continue;
            }
            let g = grad[a].abs();
            if g > best {
                best = g;
                best_idx = a;
            }
        }
        if best_idx == usize::MAX {
            break;
        }
        maxindx.push(best_idx);
        maxgrad.push(best);
        selected.push(best_idx);

        // Deflate: adding the chosen column to the partial fit reduces every
        // remaining correlation by its Gramian row
        for b in 0..d {
            grad[b] -= raw_gram(m, diag, d, b, best_idx);
        }
    }

    selected.sort_unstable();
}

/// Restricted scan for the lasso prescreen: first member among the selected
/// columns, second member anywhere. Pairs with both members selected are
/// visited once.
pub(crate) fn scan_lasso(
    m: &[f32],
    n_row: &[f32],
    d: usize,
    selected: &[usize],
    keep: usize,
    topk: &mut Vec<(f32, u32, u32)>,
) -> (f32, u32, u32) {
    topk.clear();
    let mut best = f32::INFINITY;
    let mut best_pair = (0u32, 0u32);
    for &s in selected {
        for b in 0..d {
            if b < s && selected.binary_search(&b).is_ok() {
                continue;
            }
            let (lo, hi) = if s < b { (s, b) } else { (b, s) };
            let score = m[lo * d + hi] - n_row[lo] - n_row[hi];
            if score < best {
                best = score;
                best_pair = (lo as u32, hi as u32);
            }
            if keep > 1 {
                offer_candidate(topk, keep, score, lo as u32, hi as u32);
            }
        }
    }
    (best, best_pair.0, best_pair.1)
}

/// Haplotype thinning for one sample: keep the `tf` columns most aligned
/// with the centered genotype and search the small triangle with
/// on-the-fly dot products, skipping the global Gramian.
///
/// `colsum` holds each column's entry sum (precomputed once per window).
#[allow(clippy::too_many_arguments)]
pub(crate) fn thinning_search(
    uwork: &[f32],
    xj: &[f32],
    n_row: &[f32],
    colsum: &[f32],
    p: usize,
    d: usize,
    tf: usize,
    keep: usize,
    thin: &mut Vec<(f32, u32)>,
    selected: &mut Vec<usize>,
    topk: &mut Vec<(f32, u32, u32)>,
    timers: &mut KernelTimers,
) -> (f32, u32, u32) {
    let t1 = Instant::now();
    let tf = tf.min(d);
    let xmean = if p == 0 {
        0.0
    } else {
        xj.iter().sum::<f32>() / p as f32
    };

    // Bounded descending-by-criterion list; ties keep the earlier column
    thin.clear();
    for a in 0..d {
        let c = 0.5 * n_row[a] - xmean * colsum[a];
        if thin.len() == tf && c <= thin[tf - 1].0 {
            continue;
        }
        let pos = thin.partition_point(|t| t.0 >= c);
        thin.insert(pos, (c, a as u32));
        thin.truncate(tf);
    }

    selected.clear();
    selected.extend(thin.iter().map(|&(_, a)| a as usize));
    selected.sort_unstable();

    // Self-products of the surviving columns, reusing the selection buffer
    thin.clear();
    for &a in selected.iter() {
        let ua = &uwork[a * p..a * p + p];
        let dot: f32 = ua.iter().map(|v| v * v).sum();
        thin.push((dot, a as u32));
    }
    timers.screen += t1.elapsed();

    let t3 = Instant::now();
    topk.clear();
    let mut best = f32::INFINITY;
    let mut best_pair = (0u32, 0u32);
    for bi in 0..selected.len() {
        let b = selected[bi];
        let dbb = thin[bi].0;
        let ub = &uwork[b * p..b * p + p];
        for ai in 0..=bi {
            let a = selected[ai];
            let score = if ai == bi {
                4.0 * dbb - 2.0 * n_row[b]
            } else {
                let daa = thin[ai].0;
                let ua = &uwork[a * p..a * p + p];
                let dab: f32 = ua.iter().zip(ub).map(|(x, y)| x * y).sum();
                daa + dbb + 2.0 * dab - n_row[a] - n_row[b]
            };
            if score < best {
                best = score;
                best_pair = (a as u32, b as u32);
            }
            if keep > 1 {
                offer_candidate(topk, keep, score, a as u32, b as u32);
            }
        }
    }
    timers.scan += t3.elapsed();

    (best, best_pair.0, best_pair.1)
}
