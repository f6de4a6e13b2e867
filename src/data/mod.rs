//! # Data Module
//!
//! ## Role
//! In-memory representations of genomic data. This is the core "Model" layer.
//!
//! ## Design Philosophy: Data-Oriented Design
//! - **Structure of Arrays (SoA):** Genotypes, unique-haplotype matrices, and
//!   per-window metadata are stored in flat arrays for cache-friendly loops.
//! - **Zero-cost newtypes:** `HapIdx`, `UniqueIdx`, `SampleIdx` prevent index
//!   bugs at compile time with no runtime overhead. A complete-panel index and
//!   a deduplicated-column index are different things and must not mix.
//! - **Bit-level storage:** the reference panel and per-sample strand sets are
//!   bit vectors so set operations are word-parallel.
//!
//! ## Sub-modules
//! - `haplotype`: Index types for samples and haplotypes
//! - `marker`: Typed-to-full marker alignment
//! - `genotype`: The target genotype matrix
//! - `storage`: Bit-level storage backends and phase containers

pub mod genotype;
pub mod haplotype;
pub mod marker;
pub mod storage;

pub use genotype::{GenotypeMatrix, MISSING};
pub use haplotype::{HapIdx, SampleIdx, Samples, UniqueIdx};
pub use marker::MarkerAlignment;
pub use storage::{
    BitMatrix, CompressedHaplotypes, CompressedWindow, HapSet, HaplotypeMosaic,
    HaplotypeMosaicPair, OptimalHaplotypeSet, Segment,
};
