//! # Model Module
//!
//! The inference algorithms of the crate.
//!
//! ## Core Algorithms
//! - `kernel`: Per-window least-squares best-pair search over unique columns
//! - `screening`: Prescreen variants that tame the quadratic pair scan
//! - `expansion`: Unique pair -> complete-panel equivalence-class bit-sets
//! - `reconcile`: Intersection-mode stitching of per-window pairs
//! - `dp`: Minimum-switch shortest path over candidate pair sequences
//! - `breakpoint`: Within-stretch crossover position search

pub mod breakpoint;
pub mod dp;
pub mod expansion;
pub mod kernel;
pub mod reconcile;
pub mod screening;

pub use breakpoint::{continue_haplotype, search_breakpoint, search_breakpoint_double};
pub use dp::{pair_error, reconcile_dp};
pub use expansion::expand_pair;
pub use kernel::{haplopair, KernelOptions, KernelTimers, PairSearchMethod, PairSearchResult};
pub use reconcile::reconcile_intersection;
