//! # Configuration Logic
//!
//! CLI argument parsing and validation using clap derive.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::error::{HapmosaicError, Result};

/// Phase reconciliation strategy across windows
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReconcileMethod {
    /// Iterated bit-set intersection with breakpoint search (fast)
    Intersection,
    /// Dynamic-programming shortest path over candidate pairs (exact minimum switch)
    Dp,
}

/// Hapmosaic: windowed least-squares genotype imputation and phasing
#[derive(Parser, Debug, Clone)]
#[command(name = "hapmosaic")]
#[command(author = "Hapmosaic Authors")]
#[command(version = "0.1.0")]
#[command(about = "Windowed least-squares genotype imputation and phasing", long_about = None)]
pub struct Config {
    // ============ Data Parameters ============
    /// Target genotypes: tab-separated, a `#`-prefixed sample-id header,
    /// then one `pos g0 g1 ...` row per typed marker (`.` = missing)
    #[arg(long, value_name = "FILE")]
    pub gt: PathBuf,

    /// Phased reference panel: tab-separated, one
    /// `chrom pos ref alt h0 h1 ...` row per marker with 0/1 haplotypes
    #[arg(long, value_name = "FILE")]
    pub r#ref: PathBuf,

    /// Output file prefix (required)
    #[arg(long, short, value_name = "PREFIX")]
    pub out: PathBuf,

    /// File with sample IDs to exclude (one per line)
    #[arg(long, value_name = "FILE")]
    pub excludesamples: Option<PathBuf>,

    // ============ Window Parameters ============
    /// Typed markers per window
    #[arg(long, default_value = "700")]
    pub width: usize,

    /// Extra markers each side of a window for breakpoint search
    /// (default: 10% of width)
    #[arg(long)]
    pub flankwidth: Option<usize>,

    // ============ Pair Search Parameters ============
    /// Unique-haplotype count above which screening variants activate
    #[arg(long = "max-haplotypes", default_value = "800")]
    pub max_haplotypes: usize,

    /// Lasso prescreen: per-sample columns kept by the stepwise criterion
    #[arg(long)]
    pub lasso: Option<usize>,

    /// Haplotype thinning: per-sample columns kept by alignment with the genotype
    #[arg(long)]
    pub tf: Option<usize>,

    /// Rescore top candidate pairs on observed entries after the search
    #[arg(long, default_value = "false")]
    pub rescreen: bool,

    /// Scale each marker row by inverse genotype variance before the search
    #[arg(long = "scale-allelefreq", default_value = "false")]
    pub scale_allelefreq: bool,

    // ============ Reconciliation Parameters ============
    /// Cross-window phase reconciliation strategy
    #[arg(long = "fast-method", value_enum, default_value = "intersection")]
    pub fast_method: ReconcileMethod,

    /// Switch penalty for dynamic-programming reconciliation
    #[arg(long, default_value = "1.0")]
    pub lambda: f64,

    /// Candidate pairs kept per window for dynamic-programming reconciliation
    #[arg(long = "dp-candidates", default_value = "8")]
    pub dp_candidates: usize,

    /// Expand unique pairs to their full equivalence classes before reconciliation
    #[arg(long = "expand-redundants", default_value = "true")]
    pub expand_redundants: bool,

    // ============ General Parameters ============
    /// Memory budget in GiB (default: 80% of available RAM)
    #[arg(long = "memory-gb")]
    pub memory_gb: Option<f64>,

    /// Number of threads (default: all available cores)
    #[arg(long)]
    pub nthreads: Option<usize>,

    /// Enable the progress heartbeat on stderr
    #[arg(long, default_value = "false")]
    pub profile: bool,
}

impl Config {
    /// Parse command line arguments and validate
    pub fn parse_and_validate() -> Result<Self> {
        let config = Self::parse();
        config.validate()?;
        Ok(config)
    }

    /// Configuration suitable for in-memory runs and tests
    pub fn for_memory() -> Self {
        Self {
            gt: PathBuf::new(),
            r#ref: PathBuf::new(),
            out: PathBuf::new(),
            excludesamples: None,
            width: 700,
            flankwidth: None,
            max_haplotypes: 800,
            lasso: None,
            tf: None,
            rescreen: false,
            scale_allelefreq: false,
            fast_method: ReconcileMethod::Intersection,
            lambda: 1.0,
            dp_candidates: 8,
            expand_redundants: true,
            memory_gb: None,
            nthreads: None,
            profile: false,
        }
    }

    /// Load sample IDs to exclude from the exclusion file
    ///
    /// Returns an empty set if no exclusion file is specified.
    pub fn load_exclude_samples(&self) -> Result<std::collections::HashSet<String>> {
        use std::fs::File;
        use std::io::{BufRead, BufReader};

        let mut exclude_set = std::collections::HashSet::new();

        if let Some(ref path) = self.excludesamples {
            let file = File::open(path)?;
            let reader = BufReader::new(file);
            for line in reader.lines() {
                let line = line?;
                let id = line.trim();
                if !id.is_empty() && !id.starts_with('#') {
                    exclude_set.insert(id.to_string());
                }
            }
        }

        Ok(exclude_set)
    }

    /// Validate configuration parameters
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 {
            return Err(HapmosaicError::config("'width' must be positive"));
        }

        if self.lambda < 0.0 {
            return Err(HapmosaicError::config(
                "Switch penalty 'lambda' must be nonnegative",
            ));
        }

        if self.lasso.is_some() && self.tf.is_some() {
            return Err(HapmosaicError::config(
                "'lasso' and 'tf' prescreens are mutually exclusive",
            ));
        }

        if let Some(r) = self.lasso {
            if r == 0 {
                return Err(HapmosaicError::config("'lasso' must be positive"));
            }
        }

        if let Some(tf) = self.tf {
            if tf < 2 {
                return Err(HapmosaicError::config(
                    "'tf' must keep at least two columns",
                ));
            }
        }

        if self.dp_candidates == 0 {
            return Err(HapmosaicError::config("'dp-candidates' must be positive"));
        }

        // Check output prefix is not a directory
        if self.out.is_dir() {
            return Err(HapmosaicError::config(format!(
                "'out' parameter cannot be a directory: {:?}",
                self.out
            )));
        }

        if !self.gt.exists() {
            return Err(HapmosaicError::FileNotFound {
                path: self.gt.clone(),
            });
        }

        if !self.r#ref.exists() {
            return Err(HapmosaicError::FileNotFound {
                path: self.r#ref.clone(),
            });
        }

        Ok(())
    }

    /// Flank width for breakpoint search stretches
    pub fn flankwidth(&self) -> usize {
        self.flankwidth.unwrap_or(self.width / 10)
    }

    /// Get the number of threads to use
    pub fn nthreads(&self) -> usize {
        self.nthreads.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flankwidth_default() {
        let mut config = Config::for_memory();
        config.width = 400;
        assert_eq!(config.flankwidth(), 40);
        config.flankwidth = Some(25);
        assert_eq!(config.flankwidth(), 25);
    }

    #[test]
    fn test_exclusive_prescreens() {
        let mut config = Config::for_memory();
        config.lasso = Some(10);
        config.tf = Some(10);
        assert!(config.validate().is_err());
    }
}
