// ==============================================================================
// main.rs - MR Instrument Generator Entry Point
// ==============================================================================
// Description: Builds LDL -> CAD Mendelian-randomization instruments from GWAS
//              summary statistics and writes them as CSV
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mr_instruments::backend::PanelBackend;
use mr_instruments::config::{
    apply_column_override, ClumpParams, EffectColumn, HarmonizeAction, HarmonizeParams, PipelineConfig,
    PreprocessingStrategy, DEFAULT_EAF_THRESHOLD, DEFAULT_EXPOSURE_LABEL, DEFAULT_EXPOSURE_PATH, DEFAULT_KB,
    DEFAULT_OUTCOME_LABEL, DEFAULT_OUTCOME_PATH, DEFAULT_OUTPUT_PATH, DEFAULT_P1, DEFAULT_R2,
    DEFAULT_REFERENCE_DIR, DEFAULT_REFERENCE_PANEL,
};
use mr_instruments::output::OutputFormat;
use mr_instruments::processor::InstrumentPipeline;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Exposure GWAS summary statistics (gzip TSV, GWAS Catalog layout)
    #[arg(long, default_value = DEFAULT_EXPOSURE_PATH)]
    exposure: PathBuf,

    /// Outcome GWAS summary statistics (gzip TSV, METAL layout)
    #[arg(long, default_value = DEFAULT_OUTCOME_PATH)]
    outcome: PathBuf,

    /// Output CSV path (other formats reuse it with their own extension)
    #[arg(short, long, default_value = DEFAULT_OUTPUT_PATH)]
    output: PathBuf,

    /// Exposure label, suffix of exposure columns
    #[arg(long, default_value = DEFAULT_EXPOSURE_LABEL)]
    exposure_label: String,

    /// Outcome label, suffix of outcome columns
    #[arg(long, default_value = DEFAULT_OUTCOME_LABEL)]
    outcome_label: String,

    /// Exposure column override, CANONICAL=source (e.g. SNP=rsid); repeatable
    #[arg(long)]
    exposure_column: Vec<String>,

    /// Outcome column override, CANONICAL=source (e.g. SNP=MarkerName); repeatable
    #[arg(long)]
    outcome_column: Vec<String>,

    /// Directory searched for the reference panel fileset
    #[arg(long, env = "MR_REFERENCE_DIR", default_value = DEFAULT_REFERENCE_DIR)]
    reference_dir: PathBuf,

    /// Reference panel name (ancestry_build)
    #[arg(long, default_value = DEFAULT_REFERENCE_PANEL)]
    reference_panel: String,

    /// Preprocessing strategy (None, Fill or Fill_delete)
    #[arg(long, default_value = "Fill_delete")]
    preprocessing: PreprocessingStrategy,

    /// Effect column scale (auto, beta or or)
    #[arg(long, default_value = "auto")]
    effect_column: EffectColumn,

    /// Index variant p-value threshold
    #[arg(long, default_value_t = DEFAULT_P1)]
    p1: f64,

    /// LD r² clumping threshold
    #[arg(long, default_value_t = DEFAULT_R2)]
    r2: f64,

    /// Clumping window in kilobases
    #[arg(long, default_value_t = DEFAULT_KB)]
    kb: u64,

    /// Palindromic SNP handling: 1 assume forward, 2 infer from EAF, 3 drop
    #[arg(long, default_value = "2")]
    action: HarmonizeAction,

    /// EAF band [t, 1 - t] in which palindromic SNPs are ambiguous
    #[arg(long, default_value_t = DEFAULT_EAF_THRESHOLD)]
    eaf_threshold: f64,

    /// Output formats (csv, json, parquet, sqlite)
    #[arg(long, value_delimiter = ',', default_value = "csv")]
    format: Vec<OutputFormat>,

    /// Write a JSON run summary to this path
    #[arg(long)]
    summary: Option<PathBuf>,
}

impl Args {
    fn into_config(self) -> Result<PipelineConfig> {
        let mut config = PipelineConfig::default();

        config.exposure.path = self.exposure;
        config.exposure.label = self.exposure_label;
        for assignment in &self.exposure_column {
            apply_column_override(&mut config.exposure.mapping, assignment)?;
        }

        config.outcome.path = self.outcome;
        config.outcome.label = self.outcome_label;
        for assignment in &self.outcome_column {
            apply_column_override(&mut config.outcome.mapping, assignment)?;
        }

        config.output_path = self.output;
        config.formats = self.format;
        config.summary_path = self.summary;
        config.reference_dir = self.reference_dir;
        config.reference_panel = self.reference_panel;
        config.preprocessing = self.preprocessing;
        config.effect_column = self.effect_column;
        config.clump = ClumpParams {
            p1: self.p1,
            r2: self.r2,
            kb: self.kb,
        };
        config.harmonize = HarmonizeParams {
            action: self.action,
            eaf_threshold: self.eaf_threshold,
        };

        config.validate()?;
        Ok(config)
    }
}

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "mr_instruments=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("MR instrument generator starting...");

    // Parse command line arguments
    let args = Args::parse();
    let config = args.into_config().context("Invalid arguments")?;

    let backend = PanelBackend::from_config(&config)?;
    let mut pipeline = InstrumentPipeline::new(config, backend)?;
    let outcome = pipeline.run()?;

    info!(
        "Saved {} instruments ({} -> {}) to {:?}",
        outcome.rows.len(),
        pipeline.config().exposure.label,
        pipeline.config().outcome.label,
        outcome.summary.outputs
    );

    Ok(())
}
