//! # Haplotype Mosaic
//!
//! The phased result for one sample: per strand, an ordered list of
//! `(start_row, haplotype_label, window_label)` segments covering every
//! marker. Segment starts are recorded in typed-row space during
//! reconciliation and remapped to full reference rows before imputation of
//! untyped markers.

use crate::data::haplotype::HapIdx;
use crate::data::marker::MarkerAlignment;
use crate::error::{HapmosaicError, Result};

/// One mosaic segment
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Segment {
    /// First row covered by this segment
    pub start: usize,
    /// Complete-panel haplotype carried over the segment
    pub hap: HapIdx,
    /// Window whose dictionary the label was drawn from
    pub window: usize,
}

/// One strand's segment list
#[derive(Clone, Debug, Default)]
pub struct HaplotypeMosaic {
    segments: Vec<Segment>,
    /// Total rows covered (typed rows until remapping, full rows after)
    length: usize,
}

impl HaplotypeMosaic {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a segment. A segment repeating the current label extends the
    /// run; one starting at or before the current last start replaces it,
    /// so starts stay strictly increasing.
    pub fn push(&mut self, start: usize, hap: HapIdx, window: usize) {
        if let Some(last) = self.segments.last_mut() {
            if last.hap == hap {
                last.window = window;
                return;
            }
            if start <= last.start {
                last.hap = hap;
                last.window = window;
                return;
            }
        }
        self.segments.push(Segment { start, hap, window });
    }

    pub fn set_length(&mut self, length: usize) {
        self.length = length;
    }

    pub fn length(&self) -> usize {
        self.length
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn n_segments(&self) -> usize {
        self.segments.len()
    }

    /// Label covering a row (binary search over segment starts)
    pub fn label_at(&self, row: usize) -> Option<&Segment> {
        if self.segments.is_empty() || row >= self.length {
            return None;
        }
        let idx = self.segments.partition_point(|s| s.start <= row);
        idx.checked_sub(1).map(|i| &self.segments[i])
    }

    /// Validate that segments start at row 0, strictly increase, and the
    /// recorded length covers them all.
    pub fn validate(&self) -> Result<()> {
        let first = self
            .segments
            .first()
            .ok_or_else(|| HapmosaicError::invalid_data("mosaic has no segments"))?;
        if first.start != 0 {
            return Err(HapmosaicError::invalid_data(format!(
                "mosaic must start at row 0, starts at {}",
                first.start
            )));
        }
        for pair in self.segments.windows(2) {
            if pair[1].start <= pair[0].start {
                return Err(HapmosaicError::invalid_data(format!(
                    "segment starts must strictly increase, saw {} then {}",
                    pair[0].start, pair[1].start
                )));
            }
        }
        if let Some(last) = self.segments.last() {
            if last.start >= self.length {
                return Err(HapmosaicError::invalid_data(format!(
                    "last segment starts at {} beyond length {}",
                    last.start, self.length
                )));
            }
        }
        Ok(())
    }

    /// Remap segment starts from typed-row space to full reference rows.
    /// The first segment is pinned to row 0 so the mosaic keeps covering
    /// untyped rows before the first typed marker.
    pub fn update_marker_position(&mut self, alignment: &MarkerAlignment) {
        for (i, seg) in self.segments.iter_mut().enumerate() {
            seg.start = if i == 0 { 0 } else { alignment.full_row(seg.start) };
        }
        self.length = alignment.n_full();
    }
}

/// Both strands of one sample
#[derive(Clone, Debug, Default)]
pub struct HaplotypeMosaicPair {
    pub strand1: HaplotypeMosaic,
    pub strand2: HaplotypeMosaic,
}

impl HaplotypeMosaicPair {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn validate(&self) -> Result<()> {
        self.strand1.validate()?;
        self.strand2.validate()
    }

    pub fn update_marker_position(&mut self, alignment: &MarkerAlignment) {
        self.strand1.update_marker_position(alignment);
        self.strand2.update_marker_position(alignment);
    }
}
