//! # Threading Configuration
//!
//! Configure rayon thread pools and per-worker workspace storage. Workers
//! are stateless across windows except for the thread-local scratch; the
//! scratch is keyed by thread identity so variable-sized allocations happen
//! once per worker and grow monotonically.

use std::cell::RefCell;

use thread_local::ThreadLocal;

use crate::error::{HapmosaicError, Result};
use crate::utils::workspace::Workspace;

/// Create a configured thread pool with named workers
pub fn build_thread_pool(n_threads: usize) -> Result<rayon::ThreadPool> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(n_threads)
        .thread_name(|i| format!("hapmosaic-worker-{}", i))
        .build()
        .map_err(|e| HapmosaicError::Config {
            message: format!("Failed to create thread pool: {}", e),
        })
}

/// Per-thread workspaces (avoids mutex contention in the window loop)
#[derive(Default)]
pub struct ThreadLocalWorkspace {
    workspaces: ThreadLocal<RefCell<Workspace>>,
}

impl ThreadLocalWorkspace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` with the current thread's workspace, creating it on first use
    pub fn with<R>(&self, f: impl FnOnce(&mut Workspace) -> R) -> R {
        let cell = self.workspaces.get_or(|| RefCell::new(Workspace::minimal()));
        f(&mut cell.borrow_mut())
    }

    /// Drain all workspaces (used to sum per-thread timers after a chunk)
    pub fn into_inner(self) -> impl Iterator<Item = Workspace> {
        self.workspaces.into_iter().map(RefCell::into_inner)
    }
}
