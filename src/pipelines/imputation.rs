//! # Imputation
//!
//! Applies each sample's reconciled strand mosaics to the full reference
//! panel, producing per-strand allele matrices `X1`, `X2` with
//! `X = X1 + X2` on observed entries, plus a per-row imputation quality
//! track expanded from the typed rows.

use rayon::prelude::*;
use tracing::{info, instrument};

use crate::data::genotype::{GenotypeMatrix, MISSING};
use crate::data::marker::MarkerAlignment;
use crate::data::storage::bitmatrix::BitMatrix;
use crate::data::storage::mosaic::{HaplotypeMosaic, HaplotypeMosaicPair};
use crate::error::{HapmosaicError, Result};

/// Phased, imputed genotypes over the full reference marker set
#[derive(Clone, Debug)]
pub struct ImputeResult {
    /// Strand-1 alleles, row-major (full rows x samples)
    pub x1: Vec<u8>,
    /// Strand-2 alleles, row-major
    pub x2: Vec<u8>,
    pub n_rows: usize,
    pub n_samples: usize,
    /// Imputation quality per full row, in [0, 1]
    pub impq: Vec<f64>,
}

impl ImputeResult {
    /// Allele pair of a sample at a full row
    #[inline]
    pub fn genotype(&self, row: usize, sample: usize) -> (u8, u8) {
        let idx = row * self.n_samples + sample;
        (self.x1[idx], self.x2[idx])
    }

    /// Imputed dose at a full row
    #[inline]
    pub fn dose(&self, row: usize, sample: usize) -> u8 {
        let (a, b) = self.genotype(row, sample);
        a + b
    }
}

/// Write one strand's alleles from its mosaic into a row-major output row
/// block. Every segment label must address the panel and a known window.
fn apply_strand(
    mosaic: &HaplotypeMosaic,
    panel: &BitMatrix,
    n_windows: usize,
    sample: usize,
    n_samples: usize,
    out: &mut [u8],
) -> Result<()> {
    let n_rows = panel.n_rows();
    let segments = mosaic.segments();
    for (s, seg) in segments.iter().enumerate() {
        if seg.window >= n_windows {
            return Err(HapmosaicError::invalid_data(format!(
                "segment references unknown window {} (panel has {})",
                seg.window, n_windows
            )));
        }
        if seg.hap.as_usize() >= panel.n_cols() {
            return Err(HapmosaicError::invalid_data(format!(
                "segment references haplotype {} outside panel of {}",
                seg.hap.0,
                panel.n_cols()
            )));
        }
        let end = segments.get(s + 1).map(|n| n.start).unwrap_or(n_rows);
        for row in seg.start..end {
            out[row * n_samples + sample] = panel.get(row, seg.hap.as_usize()) as u8;
        }
    }
    Ok(())
}

/// Quality of one typed row: one minus the mean observed-entry squared
/// residual, normalized by the worst-case per-entry error. Rows with no
/// observed entries score 1.
fn typed_row_score(
    genotypes: &GenotypeMatrix,
    typed_row: usize,
    full_row: usize,
    x1: &[u8],
    x2: &[u8],
    n_samples: usize,
) -> f64 {
    let mut err = 0.0f64;
    let mut observed = 0usize;
    for (j, &g) in genotypes.row(typed_row).iter().enumerate() {
        if g == MISSING {
            continue;
        }
        let idx = full_row * n_samples + j;
        let fit = (x1[idx] + x2[idx]) as f64;
        let diff = g as f64 - fit;
        err += diff * diff;
        observed += 1;
    }
    if observed == 0 {
        return 1.0;
    }
    (1.0 - err / (4.0 * observed as f64)).clamp(0.0, 1.0)
}

/// Apply the phased mosaics to the full panel.
///
/// `phase` arrives in typed-row space and is remapped to full rows in
/// place. The quality track carries each typed row's score; untyped rows
/// get the mean of the two nearest typed scores, clamped at the ends.
#[instrument(skip_all)]
pub fn impute(
    genotypes: &GenotypeMatrix,
    panel: &BitMatrix,
    alignment: &MarkerAlignment,
    n_windows: usize,
    phase: &mut [HaplotypeMosaicPair],
) -> Result<ImputeResult> {
    if alignment.n_typed() != genotypes.n_markers() {
        return Err(HapmosaicError::ShapeMismatch {
            target_rows: genotypes.n_markers(),
            ref_rows: alignment.n_typed(),
        });
    }
    if alignment.n_full() != panel.n_rows() {
        return Err(HapmosaicError::ShapeMismatch {
            target_rows: alignment.n_full(),
            ref_rows: panel.n_rows(),
        });
    }

    let n_rows = panel.n_rows();
    let n_samples = phase.len();
    let mut x1 = vec![0u8; n_rows * n_samples];
    let mut x2 = vec![0u8; n_rows * n_samples];

    for (j, mosaic) in phase.iter_mut().enumerate() {
        mosaic.validate()?;
        mosaic.update_marker_position(alignment);
        apply_strand(&mosaic.strand1, panel, n_windows, j, n_samples, &mut x1)?;
        apply_strand(&mosaic.strand2, panel, n_windows, j, n_samples, &mut x2)?;
    }

    // Typed-row scores, then nearest-neighbour expansion to full rows
    let typed_scores: Vec<f64> = (0..genotypes.n_markers())
        .into_par_iter()
        .map(|t| typed_row_score(genotypes, t, alignment.full_row(t), &x1, &x2, n_samples))
        .collect();

    let impq: Vec<f64> = (0..n_rows)
        .map(|row| {
            let before = alignment.typed_at_or_before(row);
            let after = alignment.typed_at_or_after(row);
            match (before, after) {
                (Some(b), Some(a)) if b == a => typed_scores[b],
                (Some(b), Some(a)) => 0.5 * (typed_scores[b] + typed_scores[a]),
                (Some(b), None) => typed_scores[b],
                (None, Some(a)) => typed_scores[a],
                (None, None) => 0.0,
            }
        })
        .collect();

    info!(n_rows, n_samples, "imputation finished");
    Ok(ImputeResult {
        x1,
        x2,
        n_rows,
        n_samples,
        impq,
    })
}
