//! # Pipelines Module (Orchestration)
//!
//! ## Role
//! High-level workflow coordination. Connects I/O, data structures, and
//! algorithms. This is the "Controller" in MVC terms.
//!
//! ## Design Philosophy
//! - Pipelines **own** the execution flow.
//! - They call into `io` to load data, `model` to process, `io` to write.
//! - Parallelization (via rayon) is coordinated here.
//! - Progress reporting and logging happen here.
//!
//! ## Sub-modules
//! - `phasing`: Windowed pair search, expansion, and reconciliation
//! - `imputation`: Mosaic application to the full panel and quality scores

pub mod imputation;
pub mod phasing;

pub use imputation::{impute, ImputeResult};
pub use phasing::{PhaseOutput, PhasingPipeline};
