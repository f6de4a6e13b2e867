//! # Plain-Text Matrix Loader
//!
//! Minimal tab-separated formats for the CLI and test harness. The panel
//! file carries one row per reference marker:
//!
//! ```text
//! chrom  pos  ref  alt  h0 h1 h2 ...
//! ```
//!
//! with `h*` in `{0, 1}`. The target file carries a `#`-prefixed header of
//! sample ids, then one row per typed marker:
//!
//! ```text
//! pos  g0 g1 g2 ...
//! ```
//!
//! with `g*` in `{0, 1, 2, .}` (`.` = missing). Typed rows are matched to
//! panel rows by position; every target position must exist in the panel.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::data::genotype::{GenotypeMatrix, MISSING};
use crate::data::haplotype::Samples;
use crate::data::marker::MarkerAlignment;
use crate::data::storage::bitmatrix::BitMatrix;
use crate::error::{HapmosaicError, Result};
use crate::io::{MarkerInfo, PanelSource, TargetSource};

/// Reference panel from a tab-separated file
pub struct TextPanelSource {
    path: PathBuf,
}

impl TextPanelSource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl PanelSource for TextPanelSource {
    fn read_panel(&mut self) -> Result<(BitMatrix, Vec<MarkerInfo>)> {
        let reader = BufReader::new(File::open(&self.path)?);
        let mut markers = Vec::new();
        let mut rows: Vec<Vec<bool>> = Vec::new();
        let mut n_haps = None;

        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut fields = line.split_whitespace();
            let chrom = fields
                .next()
                .ok_or_else(|| HapmosaicError::parse(lineno + 1, "missing chrom"))?;
            let pos: u32 = fields
                .next()
                .ok_or_else(|| HapmosaicError::parse(lineno + 1, "missing pos"))?
                .parse()
                .map_err(|_| HapmosaicError::parse(lineno + 1, "bad position"))?;
            let ref_allele = fields
                .next()
                .ok_or_else(|| HapmosaicError::parse(lineno + 1, "missing ref allele"))?;
            let alt_allele = fields
                .next()
                .ok_or_else(|| HapmosaicError::parse(lineno + 1, "missing alt allele"))?;

            let alleles: Vec<bool> = fields
                .map(|f| match f {
                    "0" => Ok(false),
                    "1" => Ok(true),
                    other => Err(HapmosaicError::parse(
                        lineno + 1,
                        format!("haplotype allele '{}' is not 0/1", other),
                    )),
                })
                .collect::<Result<_>>()?;

            match n_haps {
                None => n_haps = Some(alleles.len()),
                Some(n) if n != alleles.len() => {
                    return Err(HapmosaicError::parse(
                        lineno + 1,
                        format!("expected {} haplotypes, found {}", n, alleles.len()),
                    ));
                }
                _ => {}
            }

            markers.push(MarkerInfo {
                chrom: chrom.to_string(),
                pos,
                ref_allele: ref_allele.to_string(),
                alt_allele: alt_allele.to_string(),
            });
            rows.push(alleles);
        }

        let n_haps = n_haps.unwrap_or(0);
        let panel = BitMatrix::from_fn(rows.len(), n_haps, |row, col| rows[row][col]);
        Ok((panel, markers))
    }
}

/// Target cohort from a tab-separated file, aligned by position against the
/// panel markers
pub struct TextTargetSource {
    path: PathBuf,
    panel_positions: Vec<u32>,
}

impl TextTargetSource {
    pub fn new(path: impl AsRef<Path>, panel_markers: &[MarkerInfo]) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            panel_positions: panel_markers.iter().map(|m| m.pos).collect(),
        }
    }
}

impl TargetSource for TextTargetSource {
    fn read_target(&mut self, n_full_rows: usize) -> Result<(GenotypeMatrix, MarkerAlignment)> {
        let reader = BufReader::new(File::open(&self.path)?);
        let mut sample_ids: Option<Vec<String>> = None;
        let mut typed_to_full = Vec::new();
        let mut data = Vec::new();
        let mut n_markers = 0usize;
        let mut cursor = 0usize;

        for (lineno, line) in reader.lines().enumerate() {
            let line = line?;
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            if let Some(header) = line.strip_prefix('#') {
                sample_ids = Some(header.split_whitespace().map(str::to_string).collect());
                continue;
            }
            let mut fields = line.split_whitespace();
            let pos: u32 = fields
                .next()
                .ok_or_else(|| HapmosaicError::parse(lineno + 1, "missing pos"))?
                .parse()
                .map_err(|_| HapmosaicError::parse(lineno + 1, "bad position"))?;

            // Positions are matched monotonically against the panel
            while cursor < self.panel_positions.len() && self.panel_positions[cursor] < pos {
                cursor += 1;
            }
            if cursor >= self.panel_positions.len() || self.panel_positions[cursor] != pos {
                return Err(HapmosaicError::parse(
                    lineno + 1,
                    format!("typed position {} not present in the reference panel", pos),
                ));
            }
            typed_to_full.push(cursor as u32);
            cursor += 1;

            for f in fields {
                let g = match f {
                    "0" => 0,
                    "1" => 1,
                    "2" => 2,
                    "." => MISSING,
                    other => {
                        return Err(HapmosaicError::parse(
                            lineno + 1,
                            format!("genotype '{}' is not 0/1/2/.", other),
                        ));
                    }
                };
                data.push(g);
            }
            n_markers += 1;
        }

        let sample_ids = sample_ids.ok_or_else(|| {
            HapmosaicError::invalid_data("target file has no #-prefixed sample header")
        })?;
        let samples = Arc::new(Samples::from_ids(sample_ids));
        let genotypes = GenotypeMatrix::new(data, n_markers, samples)?;
        let alignment = MarkerAlignment::new(typed_to_full, n_full_rows)?;
        Ok((genotypes, alignment))
    }
}
