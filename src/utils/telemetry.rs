//! # Telemetry Blackboard
//!
//! Thread-safe progress tracking for the phasing pipeline. Atomic counters
//! are cheaply updated from rayon parallel iterators; a background heartbeat
//! thread periodically reads and reports progress.
//!
//! The blackboard pattern decouples work execution from progress reporting:
//! worker threads touch relaxed atomics, the heartbeat thread prints.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Processing stage for high-level progress tracking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Stage {
    Initializing = 0,
    Compressing = 1,
    PairSearch = 2,
    Reconciliation = 3,
    Imputation = 4,
    WritingOutput = 5,
    Complete = 6,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Initializing => "Initializing",
            Stage::Compressing => "Compressing Panel",
            Stage::PairSearch => "Pair Search",
            Stage::Reconciliation => "Reconciliation",
            Stage::Imputation => "Imputation",
            Stage::WritingOutput => "Writing Output",
            Stage::Complete => "Complete",
        }
    }

    fn from_u64(val: u64) -> Self {
        match val {
            0 => Stage::Initializing,
            1 => Stage::Compressing,
            2 => Stage::PairSearch,
            3 => Stage::Reconciliation,
            4 => Stage::Imputation,
            5 => Stage::WritingOutput,
            _ => Stage::Complete,
        }
    }
}

/// Global telemetry state, designed for cheap atomic updates from hot loops.
///
/// All fields use relaxed ordering since only eventual visibility is needed;
/// the heartbeat thread reads approximate values.
pub struct TelemetryBlackboard {
    stage: AtomicU64,
    windows_done: AtomicU64,
    total_windows: AtomicU64,
    samples_done: AtomicU64,
    total_samples: AtomicU64,
    chunk: AtomicU64,
    total_chunks: AtomicU64,
    start_time: Instant,
    shutdown: AtomicBool,
}

impl TelemetryBlackboard {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            stage: AtomicU64::new(Stage::Initializing as u64),
            windows_done: AtomicU64::new(0),
            total_windows: AtomicU64::new(0),
            samples_done: AtomicU64::new(0),
            total_samples: AtomicU64::new(0),
            chunk: AtomicU64::new(0),
            total_chunks: AtomicU64::new(0),
            start_time: Instant::now(),
            shutdown: AtomicBool::new(false),
        })
    }

    #[inline]
    pub fn set_stage(&self, stage: Stage) {
        self.stage.store(stage as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn stage(&self) -> Stage {
        Stage::from_u64(self.stage.load(Ordering::Relaxed))
    }

    pub fn set_totals(&self, windows: u64, samples: u64, chunks: u64) {
        self.total_windows.store(windows, Ordering::Relaxed);
        self.total_samples.store(samples, Ordering::Relaxed);
        self.total_chunks.store(chunks, Ordering::Relaxed);
    }

    pub fn set_chunk(&self, chunk: u64) {
        self.chunk.store(chunk, Ordering::Relaxed);
        self.samples_done.store(0, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_window(&self) {
        self.windows_done.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn add_samples(&self, delta: u64) {
        self.samples_done.fetch_add(delta, Ordering::Relaxed);
    }

    pub fn elapsed_secs(&self) -> f64 {
        self.start_time.elapsed().as_secs_f64()
    }

    fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    fn signal_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
    }
}

/// Get RSS memory usage in MB (Linux only)
fn get_rss_mb() -> Option<u64> {
    #[cfg(target_os = "linux")]
    {
        std::fs::read_to_string("/proc/self/statm")
            .ok()
            .and_then(|s| {
                let parts: Vec<&str> = s.split_whitespace().collect();
                // Second field is RSS in pages
                parts.get(1)?.parse::<u64>().ok()
            })
            .map(|pages| pages * 4096 / (1024 * 1024))
    }
    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}

/// Handle to the heartbeat thread
pub struct HeartbeatHandle {
    handle: Option<JoinHandle<()>>,
    blackboard: Arc<TelemetryBlackboard>,
}

impl HeartbeatHandle {
    /// Spawn the heartbeat thread reporting every `interval_secs`
    pub fn spawn(blackboard: Arc<TelemetryBlackboard>, interval_secs: u64) -> Self {
        let bb = blackboard.clone();
        let handle = thread::Builder::new()
            .name("heartbeat".to_string())
            .spawn(move || heartbeat_loop(bb, Duration::from_secs(interval_secs)))
            .expect("Failed to spawn heartbeat thread");

        Self {
            handle: Some(handle),
            blackboard,
        }
    }

    /// Signal shutdown and wait for the thread to finish
    pub fn shutdown(mut self) {
        self.blackboard.signal_shutdown();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for HeartbeatHandle {
    fn drop(&mut self) {
        // Don't block in drop - just signal shutdown
        self.blackboard.signal_shutdown();
    }
}

fn heartbeat_loop(bb: Arc<TelemetryBlackboard>, interval: Duration) {
    loop {
        thread::sleep(interval);
        if bb.is_shutdown() {
            break;
        }

        let stage = bb.stage();
        let windows = bb.windows_done.load(Ordering::Relaxed);
        let total_windows = bb.total_windows.load(Ordering::Relaxed);
        let samples = bb.samples_done.load(Ordering::Relaxed);
        let total_samples = bb.total_samples.load(Ordering::Relaxed);
        let chunk = bb.chunk.load(Ordering::Relaxed);
        let total_chunks = bb.total_chunks.load(Ordering::Relaxed);
        let rss = get_rss_mb()
            .map(|mb| format!(" rss_mb={}", mb))
            .unwrap_or_default();

        tracing::info!(
            "[HEARTBEAT] stage=\"{}\" chunk={}/{} windows={}/{} samples={}/{} elapsed={:.0}s{}",
            stage.as_str(),
            chunk,
            total_chunks,
            windows,
            total_windows,
            samples,
            total_samples,
            bb.elapsed_secs(),
            rss
        );
    }
}
