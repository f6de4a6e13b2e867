//! # Application Entry Point
//!
//! CLI wiring: logging, configuration, thread pool, pipeline dispatch, and
//! phased output rendering. Heavy formats (VCF, binary panels) come from
//! external collaborators; the binary ships with the plain-text loader.

use std::fs::File;
use std::io::BufWriter;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use hapmosaic::config::Config;
use hapmosaic::data::storage::compressed::CompressedHaplotypes;
use hapmosaic::error::Result;
use hapmosaic::io::text::{TextPanelSource, TextTargetSource};
use hapmosaic::io::{PanelSource, PhasedSink, TargetSource, TextSink, PHASED_SEPARATOR};
use hapmosaic::pipelines::{impute, PhasingPipeline};
use hapmosaic::utils::telemetry::{HeartbeatHandle, Stage};
use hapmosaic::utils::threading::build_thread_pool;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with_writer(std::io::stderr)
        .init();

    let config = match Config::parse_and_validate() {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            std::process::exit(2);
        }
    };

    if let Err(e) = run(config) {
        error!("{}", e);
        std::process::exit(1);
    }
}

fn run(config: Config) -> Result<()> {
    let pool = build_thread_pool(config.nthreads())?;

    // Restrict typed rows against the panel by position, then compress
    let mut panel_source = TextPanelSource::new(&config.r#ref);
    let (panel, markers) = panel_source.read_panel()?;
    let mut target_source = TextTargetSource::new(&config.gt, &markers);
    let (genotypes, alignment) = target_source.read_target(panel.n_rows())?;
    let genotypes = drop_excluded(genotypes, &config.load_exclude_samples()?)?;
    info!(
        full_rows = panel.n_rows(),
        typed_rows = genotypes.n_markers(),
        samples = genotypes.n_samples(),
        haplotypes = panel.n_cols(),
        "inputs loaded"
    );

    let pipeline = PhasingPipeline::new(config.clone());
    let telemetry = pipeline.telemetry();
    let heartbeat = config
        .profile
        .then(|| HeartbeatHandle::spawn(telemetry.clone(), 30));

    let result = pool.install(|| -> Result<_> {
        telemetry.set_stage(Stage::Compressing);
        let typed_panel = restrict_panel(&panel, alignment.typed_rows());
        let compressed = CompressedHaplotypes::compress(&typed_panel, config.width)?;

        let mut output = pipeline.run_in_memory(&genotypes, &compressed)?;

        telemetry.set_stage(Stage::Imputation);
        impute(
            &genotypes,
            &panel,
            &alignment,
            compressed.n_windows(),
            &mut output.phase,
        )
    })?;

    telemetry.set_stage(Stage::WritingOutput);
    let file = File::create(&config.out)?;
    let mut sink = TextSink::new(BufWriter::new(file), PHASED_SEPARATOR);
    sink.write_header(genotypes.samples().ids())?;
    for (row, marker) in markers.iter().enumerate() {
        sink.write_record(marker, row, &result)?;
    }

    telemetry.set_stage(Stage::Complete);
    if let Some(heartbeat) = heartbeat {
        heartbeat.shutdown();
    }
    info!(out = %config.out.display(), "phased output written");
    Ok(())
}

/// Target matrix without the excluded sample columns
fn drop_excluded(
    genotypes: hapmosaic::GenotypeMatrix,
    exclude: &std::collections::HashSet<String>,
) -> Result<hapmosaic::GenotypeMatrix> {
    if exclude.is_empty() {
        return Ok(genotypes);
    }
    let kept: Vec<usize> = (0..genotypes.n_samples())
        .filter(|&j| !exclude.contains(genotypes.samples().id(hapmosaic::SampleIdx::new(j as u32))))
        .collect();
    info!(
        excluded = genotypes.n_samples() - kept.len(),
        "dropping excluded samples"
    );
    let mut data = Vec::with_capacity(genotypes.n_markers() * kept.len());
    for row in 0..genotypes.n_markers() {
        let full = genotypes.row(row);
        data.extend(kept.iter().map(|&j| full[j]));
    }
    let ids = kept
        .iter()
        .map(|&j| genotypes.samples().id(hapmosaic::SampleIdx::new(j as u32)).to_string())
        .collect();
    let samples = std::sync::Arc::new(hapmosaic::Samples::from_ids(ids));
    hapmosaic::GenotypeMatrix::new(data, genotypes.n_markers(), samples)
}

/// Panel restricted to the typed rows, for window compression
fn restrict_panel(
    panel: &hapmosaic::data::storage::bitmatrix::BitMatrix,
    typed_rows: &[u32],
) -> hapmosaic::data::storage::bitmatrix::BitMatrix {
    hapmosaic::data::storage::bitmatrix::BitMatrix::from_fn(
        typed_rows.len(),
        panel.n_cols(),
        |row, col| panel.get(typed_rows[row] as usize, col),
    )
}
