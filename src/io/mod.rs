//! # I/O Module
//!
//! ## Role
//! Boundaries to the outside world. The heavy formats (VCF with full header
//! handling, binary panel dictionaries) belong to external collaborators and
//! are represented here only by their interfaces; the module ships a phased
//! record renderer and a plain-text matrix loader used by the CLI and the
//! test harness.
//!
//! ## Sub-modules
//! - `text`: Tab-separated target/panel matrix loader

pub mod text;

use std::io::Write;

use crate::data::genotype::GenotypeMatrix;
use crate::data::marker::MarkerAlignment;
use crate::data::storage::bitmatrix::BitMatrix;
use crate::error::Result;
use crate::pipelines::imputation::ImputeResult;

/// Allele separator for phased genotypes
pub const PHASED_SEPARATOR: u8 = b'|';
/// Allele separator for unphased genotypes
pub const UNPHASED_SEPARATOR: u8 = b'/';

/// Marker metadata carried alongside the full reference rows
#[derive(Clone, Debug)]
pub struct MarkerInfo {
    pub chrom: String,
    pub pos: u32,
    pub ref_allele: String,
    pub alt_allele: String,
}

/// Source of the target cohort: typed genotypes plus their alignment into
/// the reference rows
pub trait TargetSource {
    fn read_target(&mut self, n_full_rows: usize) -> Result<(GenotypeMatrix, MarkerAlignment)>;
}

/// Source of the reference panel over the full marker set
pub trait PanelSource {
    fn read_panel(&mut self) -> Result<(BitMatrix, Vec<MarkerInfo>)>;
}

/// Sink for phased, imputed records
pub trait PhasedSink {
    fn write_record(&mut self, marker: &MarkerInfo, row: usize, result: &ImputeResult)
        -> Result<()>;
}

/// Renders phased records as VCF-style body lines to any writer
pub struct TextSink<W: Write> {
    writer: W,
    separator: u8,
}

impl<W: Write> TextSink<W> {
    pub fn new(writer: W, separator: u8) -> Self {
        Self { writer, separator }
    }

    /// Write the column header line for the given sample ids
    pub fn write_header(&mut self, sample_ids: &[String]) -> Result<()> {
        write!(
            self.writer,
            "#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT"
        )?;
        for id in sample_ids {
            write!(self.writer, "\t{}", id)?;
        }
        writeln!(self.writer)?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl<W: Write> PhasedSink for TextSink<W> {
    fn write_record(
        &mut self,
        marker: &MarkerInfo,
        row: usize,
        result: &ImputeResult,
    ) -> Result<()> {
        write!(
            self.writer,
            "{}\t{}\t.\t{}\t{}\t.\t.\tIMPQ={:.4}\tGT",
            marker.chrom, marker.pos, marker.ref_allele, marker.alt_allele, result.impq[row]
        )?;
        for sample in 0..result.n_samples {
            let (a, b) = result.genotype(row, sample);
            write!(self.writer, "\t{}{}{}", a, self.separator as char, b)?;
        }
        writeln!(self.writer)?;
        Ok(())
    }
}
