//! # Phasing Pipeline
//!
//! Orchestrates the windowed haplotype-pair inference:
//! 1. Validate target/reference shapes
//! 2. Split windows into chunks sized against the memory budget
//! 3. Per chunk, run the pair-search kernel over windows on the worker pool
//!    and expand the chosen pairs into strand bit-sets
//! 4. Reconcile per sample (intersection walk or DP shortest path) and
//!    stitch segment mosaics with breakpoint refinement
//!
//! Windows within a chunk are independent; samples are independent during
//! reconciliation. All scratch lives in per-worker workspaces.

use std::sync::Arc;
use std::time::Instant;

use rayon::prelude::*;
use tracing::{debug, info, instrument};

use crate::config::{Config, ReconcileMethod};
use crate::data::genotype::GenotypeMatrix;
use crate::data::haplotype::{HapIdx, SampleIdx};
use crate::data::storage::bitset::HapSet;
use crate::data::storage::compressed::CompressedHaplotypes;
use crate::data::storage::mosaic::HaplotypeMosaicPair;
use crate::data::storage::optimal_set::OptimalHaplotypeSet;
use crate::error::{HapmosaicError, Result};
use crate::model::dp::reconcile_dp;
use crate::model::expansion::expand_pair;
use crate::model::kernel::{haplopair, KernelOptions, KernelTimers, PairSearchMethod};
use crate::model::reconcile::{reconcile_intersection, stitch_mosaic};
use crate::utils::telemetry::{Stage, TelemetryBlackboard};
use crate::utils::threading::ThreadLocalWorkspace;

/// Result of phasing: one mosaic pair per sample, in typed-row space
#[derive(Debug)]
pub struct PhaseOutput {
    pub phase: Vec<HaplotypeMosaicPair>,
    /// Kernel phase timers summed over all workers and chunks
    pub timers: KernelTimers,
}

/// Per-window driver output
struct WindowResult {
    strand1: Vec<HapSet>,
    strand2: Vec<HapSet>,
    /// Candidate pairs per sample in complete-label space (DP mode only)
    candidates: Vec<Vec<(HapIdx, HapIdx)>>,
}

/// Phasing pipeline
pub struct PhasingPipeline {
    config: Config,
    telemetry: Arc<TelemetryBlackboard>,
}

impl PhasingPipeline {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            telemetry: TelemetryBlackboard::new(),
        }
    }

    /// Telemetry blackboard, for wiring a heartbeat reporter
    pub fn telemetry(&self) -> Arc<TelemetryBlackboard> {
        Arc::clone(&self.telemetry)
    }

    /// Kernel options for a window with `d` unique columns. Screening
    /// variants activate only above the `max_haplotypes` threshold.
    fn kernel_options(&self, d: usize) -> KernelOptions {
        let method = if d > self.config.max_haplotypes {
            if let Some(r) = self.config.lasso {
                PairSearchMethod::Lasso { r }
            } else if let Some(tf) = self.config.tf {
                PairSearchMethod::Thinning { tf }
            } else {
                PairSearchMethod::Exhaustive
            }
        } else {
            PairSearchMethod::Exhaustive
        };
        let keep = match self.config.fast_method {
            ReconcileMethod::Dp => self.config.dp_candidates,
            ReconcileMethod::Intersection => 1,
        };
        KernelOptions {
            method,
            rescreen: self.config.rescreen,
            scale_allelefreq: self.config.scale_allelefreq,
            keep,
        }
    }

    /// Windows per chunk under the memory budget. The calculator charges the
    /// fixed inputs (X, compressed panel, per-thread scratch) against 80% of
    /// the budget and divides the remainder by the per-window strand-set
    /// footprint.
    fn chunk_size(
        &self,
        genotypes: &GenotypeMatrix,
        compressed: &CompressedHaplotypes,
        threads: usize,
    ) -> usize {
        let n = genotypes.n_samples().max(1);
        let d_avg = compressed.avg_unique().max(1.0) as usize;
        let d_total = compressed.n_haplotypes();
        let p = compressed.width();
        let n_windows = compressed.n_windows();

        let budget = (available_memory_bytes(self.config.memory_gb) as f64 * 0.8) as usize;
        let scratch_per_thread =
            4 * (d_avg * d_avg + n * d_avg + p * n + p * d_avg) + 2 * d_total / 8;
        let fixed = genotypes.size_bytes() + compressed.size_bytes() + threads * scratch_per_thread;
        // Two strand bit-sets per sample per window
        let per_window = 2 * n * (d_total / 8 + std::mem::size_of::<HapSet>());

        let chunk = if budget > fixed {
            ((budget - fixed) / per_window.max(1)).max(1)
        } else {
            1
        };
        chunk.min(n_windows.max(1))
    }

    /// Kernel plus expansion for one window
    fn process_window(
        &self,
        genotypes: &GenotypeMatrix,
        compressed: &CompressedHaplotypes,
        window: usize,
        tls: &ThreadLocalWorkspace,
    ) -> Result<WindowResult> {
        let dict = compressed.window(window);
        let opts = self.kernel_options(dict.n_unique());
        let n = genotypes.n_samples();
        let d_total = compressed.n_haplotypes();
        let dp_mode = self.config.fast_method == ReconcileMethod::Dp;

        tls.with(|ws| {
            let result = haplopair(genotypes, compressed, window, &opts, ws)?;

            let t5 = Instant::now();
            let mut strand1 = Vec::with_capacity(n);
            let mut strand2 = Vec::with_capacity(n);
            for j in 0..n {
                let mut s1 = HapSet::new(d_total);
                let mut s2 = HapSet::new(d_total);
                expand_pair(
                    dict,
                    result.pairs[j],
                    self.config.expand_redundants,
                    &mut s1,
                    &mut s2,
                );
                strand1.push(s1);
                strand2.push(s2);
            }
            ws.timers.expand += t5.elapsed();

            let candidates = if dp_mode {
                (0..n)
                    .map(|j| {
                        let pool = if result.candidates.is_empty() {
                            std::slice::from_ref(&result.pairs[j])
                        } else {
                            result.candidates[j].as_slice()
                        };
                        pool.iter()
                            .map(|&(a, b)| (dict.representative(a), dict.representative(b)))
                            .collect()
                    })
                    .collect()
            } else {
                Vec::new()
            };

            Ok(WindowResult {
                strand1,
                strand2,
                candidates,
            })
        })
    }

    /// Run phasing against in-memory inputs.
    #[instrument(skip_all)]
    pub fn run_in_memory(
        &self,
        genotypes: &GenotypeMatrix,
        compressed: &CompressedHaplotypes,
    ) -> Result<PhaseOutput> {
        if genotypes.n_markers() != compressed.n_typed() {
            return Err(HapmosaicError::ShapeMismatch {
                target_rows: genotypes.n_markers(),
                ref_rows: compressed.n_typed(),
            });
        }

        let n_windows = compressed.n_windows();
        let n_samples = genotypes.n_samples();
        let d_total = compressed.n_haplotypes();
        let threads = rayon::current_num_threads();
        let flank = self.config.flankwidth();
        let chunk = self.chunk_size(genotypes, compressed, threads);
        let n_chunks = n_windows.div_ceil(chunk.max(1));

        info!(
            n_windows,
            n_samples, d_total, chunk, n_chunks, "phasing started"
        );
        self.telemetry
            .set_totals(n_windows as u64, n_samples as u64, n_chunks as u64);

        let mut phase = vec![HaplotypeMosaicPair::new(); n_samples];
        let mut timers = KernelTimers::default();

        for (c, w0) in (0..n_windows).step_by(chunk.max(1)).enumerate() {
            let w1 = (w0 + chunk).min(n_windows);
            self.telemetry.set_chunk(c as u64 + 1);
            self.telemetry.set_stage(Stage::PairSearch);
            debug!(chunk = c, w0, w1, "processing chunk");

            let tls = ThreadLocalWorkspace::new();
            let results: Result<Vec<WindowResult>> = (w0..w1)
                .into_par_iter()
                .map(|w| {
                    let r = self.process_window(genotypes, compressed, w, &tls);
                    self.telemetry.add_window();
                    r
                })
                .collect();
            let results = results?;

            let mut candidates_by_window = Vec::with_capacity(results.len());
            let mut sets = Vec::with_capacity(results.len());
            for r in results {
                candidates_by_window.push(r.candidates);
                sets.push((r.strand1, r.strand2));
            }
            let mut ohs = OptimalHaplotypeSet::from_windows(sets, d_total);

            self.telemetry.set_stage(Stage::Reconciliation);
            let dp_mode = self.config.fast_method == ReconcileMethod::Dp;
            let lambda = self.config.lambda;
            let oriented: Result<Vec<Vec<(HapIdx, HapIdx)>>> = phase
                .par_iter_mut()
                .enumerate()
                .map(|(j, mosaic)| {
                    let labels = if dp_mode {
                        let cand: Vec<Vec<(HapIdx, HapIdx)>> = candidates_by_window
                            .iter()
                            .map(|w| w[j].clone())
                            .collect();
                        reconcile_dp(&cand, lambda)?.0
                    } else {
                        tls.with(|ws| {
                            ws.resize(0, 0, 0, d_total);
                            reconcile_intersection(&ohs, j, ws)
                        })
                    };
                    let oriented = stitch_mosaic(
                        genotypes,
                        compressed,
                        SampleIdx::new(j as u32),
                        w0..w1,
                        &labels,
                        flank,
                        mosaic,
                    )?;
                    self.telemetry.add_samples(1);
                    Ok(oriented)
                })
                .collect();
            ohs.collapse(&oriented?);

            for ws in tls.into_inner() {
                timers.merge(&ws.timers);
            }
        }

        info!(
            total_ms = timers.total().as_millis() as u64,
            matmul_ms = timers.matmul.as_millis() as u64,
            scan_ms = timers.scan.as_millis() as u64,
            screen_ms = timers.screen.as_millis() as u64,
            rescreen_ms = timers.rescreen.as_millis() as u64,
            expand_ms = timers.expand.as_millis() as u64,
            "phasing finished"
        );
        Ok(PhaseOutput { phase, timers })
    }
}

/// Memory budget in bytes: the explicit override, `MemAvailable` on Linux,
/// or a conservative default.
fn available_memory_bytes(override_gb: Option<f64>) -> usize {
    if let Some(gb) = override_gb {
        return (gb * 1024.0 * 1024.0 * 1024.0) as usize;
    }
    #[cfg(target_os = "linux")]
    {
        if let Ok(content) = std::fs::read_to_string("/proc/meminfo") {
            for line in content.lines() {
                if let Some(rest) = line.strip_prefix("MemAvailable:") {
                    if let Some(kb) = rest.split_whitespace().next() {
                        if let Ok(kb) = kb.parse::<usize>() {
                            return kb * 1024;
                        }
                    }
                }
            }
        }
    }
    8 * 1024 * 1024 * 1024
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::haplotype::Samples;
    use crate::data::storage::bitmatrix::BitMatrix;

    fn pipeline(width: usize) -> PhasingPipeline {
        let mut config = Config::for_memory();
        config.width = width;
        PhasingPipeline::new(config)
    }

    fn distinct_panel(p: usize, d: usize) -> BitMatrix {
        BitMatrix::from_fn(p, d, |row, col| match col {
            0 => false,
            1 => true,
            c => row % (c + 1) == 0,
        })
    }

    fn exact_target(panel: &BitMatrix, h1: usize, h2: usize) -> GenotypeMatrix {
        let p = panel.n_rows();
        let data: Vec<u8> = (0..p)
            .map(|row| panel.get(row, h1) as u8 + panel.get(row, h2) as u8)
            .collect();
        let samples = Arc::new(Samples::from_ids(vec!["S0".to_string()]));
        GenotypeMatrix::new(data, p, samples).unwrap()
    }

    #[test]
    fn test_exact_sample_yields_single_segment_mosaic() {
        let panel = distinct_panel(40, 6);
        let ch = CompressedHaplotypes::compress(&panel, 10).unwrap();
        let gm = exact_target(&panel, 2, 4);

        let output = pipeline(10).run_in_memory(&gm, &ch).unwrap();
        let mosaic = &output.phase[0];
        assert!(mosaic.validate().is_ok());
        assert_eq!(mosaic.strand1.n_segments(), 1);
        assert_eq!(mosaic.strand2.n_segments(), 1);

        let labels = (
            mosaic.strand1.segments()[0].hap,
            mosaic.strand2.segments()[0].hap,
        );
        let expected = (HapIdx::new(2), HapIdx::new(4));
        assert!(
            labels == expected || labels == (expected.1, expected.0),
            "unexpected labels {:?}",
            labels
        );
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let panel = distinct_panel(40, 4);
        let ch = CompressedHaplotypes::compress(&panel, 10).unwrap();
        let samples = Arc::new(Samples::from_ids(vec!["S0".to_string()]));
        let gm = GenotypeMatrix::new(vec![0; 30], 30, samples).unwrap();
        assert!(matches!(
            pipeline(10).run_in_memory(&gm, &ch),
            Err(HapmosaicError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn test_dp_mode_matches_on_exact_data() {
        let panel = distinct_panel(40, 6);
        let ch = CompressedHaplotypes::compress(&panel, 10).unwrap();
        let gm = exact_target(&panel, 1, 3);

        let mut config = Config::for_memory();
        config.width = 10;
        config.fast_method = ReconcileMethod::Dp;
        let output = PhasingPipeline::new(config).run_in_memory(&gm, &ch).unwrap();
        let mosaic = &output.phase[0];
        assert_eq!(mosaic.strand1.n_segments(), 1);
        assert_eq!(mosaic.strand2.n_segments(), 1);
    }

    #[test]
    fn test_chunk_size_positive() {
        let panel = distinct_panel(100, 8);
        let ch = CompressedHaplotypes::compress(&panel, 10).unwrap();
        let gm = exact_target(&panel, 0, 1);
        let pipe = pipeline(10);
        let chunk = pipe.chunk_size(&gm, &ch, 4);
        assert!(chunk >= 1);
        assert!(chunk <= ch.n_windows());
    }
}
