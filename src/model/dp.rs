//! # Minimum-Switch Reconciliation (Dynamic Programming)
//!
//! Shortest path over window-indexed pair vertices. Each window contributes
//! a short candidate list from the kernel; the edge cost between adjacent
//! windows is the squared switch count, taken over the cheaper of the
//! parallel and crossover strand matchings.

use crate::data::haplotype::HapIdx;
use crate::error::{HapmosaicError, Result};

/// Switch cost between adjacent windows' pairs.
///
/// `parallel` matches strands in order, `crossover` swaps them; the cost is
/// `lambda * min(parallel, crossover)^2`. The function is symmetric under
/// strand swap of either argument and zero exactly when the unordered pairs
/// coincide.
pub fn pair_error(prev: (HapIdx, HapIdx), next: (HapIdx, HapIdx), lambda: f64) -> f64 {
    let parallel = (prev.0 != next.0) as u32 + (prev.1 != next.1) as u32;
    let crossover = (prev.0 != next.1) as u32 + (prev.1 != next.0) as u32;
    let switches = parallel.min(crossover) as f64;
    lambda * switches * switches
}

/// Choose one pair per window minimizing the total switch cost.
///
/// The table is filled backward from the last window; forward tracing uses
/// first-minimum successors, while the start vertex uses last-minimum, so on
/// equal total cost the later first-window candidate wins (the endpoint
/// tie-break). Returns the chosen sequence and its total cost.
pub fn reconcile_dp(
    candidates: &[Vec<(HapIdx, HapIdx)>],
    lambda: f64,
) -> Result<(Vec<(HapIdx, HapIdx)>, f64)> {
    let n_windows = candidates.len();
    if n_windows == 0 {
        return Ok((Vec::new(), 0.0));
    }
    for (w, set) in candidates.iter().enumerate() {
        if set.is_empty() {
            return Err(HapmosaicError::algorithm(format!(
                "window {} has no candidate pairs for reconciliation",
                w
            )));
        }
    }

    let mut best_err: Vec<Vec<f64>> = candidates.iter().map(|c| vec![0.0; c.len()]).collect();
    let mut next_pair: Vec<Vec<usize>> = candidates.iter().map(|c| vec![0; c.len()]).collect();

    for w in (0..n_windows - 1).rev() {
        for (i, &pair) in candidates[w].iter().enumerate() {
            let mut best = f64::INFINITY;
            let mut arg = 0;
            for (j, &succ) in candidates[w + 1].iter().enumerate() {
                let cost = pair_error(pair, succ, lambda) + best_err[w + 1][j];
                if cost < best {
                    best = cost;
                    arg = j;
                }
            }
            best_err[w][i] = best;
            next_pair[w][i] = arg;
        }
    }

    let mut start = 0;
    let mut start_cost = f64::INFINITY;
    for (i, &cost) in best_err[0].iter().enumerate() {
        if cost <= start_cost {
            start_cost = cost;
            start = i;
        }
    }

    let mut chosen = Vec::with_capacity(n_windows);
    let mut idx = start;
    for w in 0..n_windows {
        chosen.push(candidates[w][idx]);
        if w + 1 < n_windows {
            idx = next_pair[w][idx];
        }
    }

    Ok((chosen, start_cost))
}
