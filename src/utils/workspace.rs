//! # Workspace Pattern for Pair-Search Buffers
//!
//! Pre-allocated buffers for the pair-search kernel and reconciliation to
//! avoid repeated allocations in hot loops. This pattern is essential for
//! satisfying the Rust borrow checker while maintaining performance.
//!
//! ## Design Philosophy
//! Instead of storing mutable buffers inside model structs (which causes
//! borrow checker issues), a separate Workspace owns all temporary buffers
//! and computation functions take `&mut Workspace`. One workspace exists per
//! worker thread; buffers grow monotonically so the largest window of a
//! chunk allocates once.

use crate::data::storage::bitset::HapSet;
use crate::model::kernel::KernelTimers;

/// Workspace for per-window pair-search computations
#[derive(Debug)]
pub struct Workspace {
    /// First chosen unique column per sample
    pub happair1: Vec<u32>,

    /// Second chosen unique column per sample (`happair1[j] <= happair2[j]`)
    pub happair2: Vec<u32>,

    /// Objective value per sample
    pub hapscore: Vec<f32>,

    /// Work copy of the genotype slice (p x n, column-major by sample)
    /// with missing entries pre-imputed
    pub xwork: Vec<f32>,

    /// Float copy of the unique matrix (p x d, column-major), optionally
    /// allele-frequency scaled
    pub uwork: Vec<f32>,

    /// Raw Gramian `U'U` (d x d), transformed in place into the pair
    /// objective matrix `M`
    pub m: Vec<f32>,

    /// Cross products `X'U` (n x d), doubled into `N`
    pub n: Vec<f32>,

    /// Squared norm of each work genotype column
    pub xnorm: Vec<f32>,

    /// Raw Gramian diagonal, saved before `m` is transformed in place
    pub diag: Vec<f32>,

    /// Lasso prescreen: chosen column per step
    pub maxindx: Vec<usize>,

    /// Lasso prescreen: gradient magnitude per step
    pub maxgrad: Vec<f32>,

    /// Stepwise gradient buffer (d)
    pub grad: Vec<f32>,

    /// Columns selected by a prescreen for the current sample
    pub selected: Vec<usize>,

    /// Thinning selection buffer: `(criterion, column)`
    pub thin: Vec<(f32, u32)>,

    /// Candidate heap for rescreen / DP collection: `(score, a, b)`
    pub topk: Vec<(f32, u32, u32)>,

    /// Bit-set scratch for reconciliation chains
    pub set_a: HapSet,
    pub set_b: HapSet,

    /// Per-thread kernel timers, summed at the end of each chunk
    pub timers: KernelTimers,
}

impl Workspace {
    /// Create a workspace sized for a window of `p` markers, `d` unique
    /// columns, `n` samples over a panel of `n_haplotypes`
    pub fn new(p: usize, d: usize, n: usize, n_haplotypes: usize) -> Self {
        Self {
            happair1: vec![0; n],
            happair2: vec![0; n],
            hapscore: vec![0.0; n],
            xwork: vec![0.0; p * n],
            uwork: vec![0.0; p * d],
            m: vec![0.0; d * d],
            n: vec![0.0; n * d],
            xnorm: vec![0.0; n],
            diag: vec![0.0; d],
            maxindx: Vec::new(),
            maxgrad: Vec::new(),
            grad: vec![0.0; d],
            selected: Vec::new(),
            thin: Vec::new(),
            topk: Vec::new(),
            set_a: HapSet::new(n_haplotypes),
            set_b: HapSet::new(n_haplotypes),
            timers: KernelTimers::default(),
        }
    }

    /// Create a minimal workspace for testing
    pub fn minimal() -> Self {
        Self::new(0, 0, 0, 0)
    }

    /// Resize buffers for new window dimensions. Buffers only grow.
    pub fn resize(&mut self, p: usize, d: usize, n: usize, n_haplotypes: usize) {
        if self.happair1.len() < n {
            self.happair1.resize(n, 0);
            self.happair2.resize(n, 0);
            self.hapscore.resize(n, 0.0);
            self.xnorm.resize(n, 0.0);
        }
        if self.xwork.len() < p * n {
            self.xwork.resize(p * n, 0.0);
        }
        if self.uwork.len() < p * d {
            self.uwork.resize(p * d, 0.0);
        }
        if self.m.len() < d * d {
            self.m.resize(d * d, 0.0);
        }
        if self.n.len() < n * d {
            self.n.resize(n * d, 0.0);
        }
        if self.grad.len() < d {
            self.grad.resize(d, 0.0);
            self.diag.resize(d, 0.0);
        }
        if self.set_a.capacity() != n_haplotypes {
            self.set_a = HapSet::new(n_haplotypes);
            self.set_b = HapSet::new(n_haplotypes);
        }
    }
}

impl Default for Workspace {
    fn default() -> Self {
        Self::minimal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_workspace_creation() {
        let ws = Workspace::new(100, 50, 10, 1000);
        assert_eq!(ws.happair1.len(), 10);
        assert_eq!(ws.uwork.len(), 5000);
        assert_eq!(ws.m.len(), 2500);
        assert_eq!(ws.set_a.capacity(), 1000);
    }

    #[test]
    fn test_workspace_grows_monotonically() {
        let mut ws = Workspace::minimal();
        ws.resize(200, 100, 20, 2000);
        assert_eq!(ws.m.len(), 10000);
        let m_cap = ws.m.len();
        ws.resize(10, 10, 2, 2000);
        assert_eq!(ws.m.len(), m_cap);
    }
}
