//! # Utilities Module
//!
//! ## Role
//! Cross-cutting helpers that don't belong in domain-specific modules.
//!
//! ## Sub-modules
//! - `threading`: Rayon thread pool configuration and per-worker scratch
//! - `workspace`: Pre-allocated buffers for zero-allocation hot paths
//! - `telemetry`: Atomic progress blackboard and heartbeat reporting

pub mod telemetry;
pub mod threading;
pub mod workspace;

pub use threading::{build_thread_pool, ThreadLocalWorkspace};
pub use workspace::Workspace;
