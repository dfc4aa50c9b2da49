// ==============================================================================
// processor.rs - Instrument Generation Pipeline
// ==============================================================================
// Description: Loads exposure and outcome GWAS summary statistics, preprocesses
//              them, clumps and harmonizes instruments, merges and writes them
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::backend::{InstrumentSelector, Preprocessor};
use crate::config::{PipelineConfig, StudyConfig};
use crate::merge::{merge_instruments, FStatSummary};
use crate::models::{GenoTable, InstrumentRow};
use crate::output::InstrumentWriter;
use crate::parsers::{GwasLoader, RawGwasTable};
use crate::report::RunSummary;
use crate::validator::{InputValidator, ValidatedInput};

/// Result of one pipeline run
#[derive(Debug)]
pub struct PipelineOutcome {
    pub rows: Vec<InstrumentRow>,
    pub summary: RunSummary,
}

pub struct InstrumentPipeline<B> {
    config: PipelineConfig,
    backend: B,
    loader: GwasLoader,
    validator: InputValidator,
}

impl<B: Preprocessor + InstrumentSelector> InstrumentPipeline<B> {
    pub fn new(config: PipelineConfig, backend: B) -> Result<Self> {
        config.validate().context("Invalid pipeline configuration")?;
        Ok(Self {
            config,
            backend,
            loader: GwasLoader::new(),
            validator: InputValidator::new(),
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Main processing pipeline
    pub fn run(&mut self) -> Result<PipelineOutcome> {
        let mut summary = RunSummary::start(&self.config);
        info!(
            "Starting instrument generation {} -> {} (run {})",
            self.config.exposure.label, self.config.outcome.label, summary.run_id
        );

        // 1. Load exposure
        info!("[1/5] Loading exposure {} from {:?}", self.config.exposure.label, self.config.exposure.path);
        let (raw, input) = self.load_study(&self.config.exposure)?;
        summary.exposure.input = Some(input);
        summary.counts.exposure_loaded = raw.len();

        // 2. Standardize exposure columns
        info!("[2/5] Standardizing {} columns", self.config.exposure.label);
        let exposure = standardize(&self.config.exposure, &raw)?;
        drop(raw);

        // 3. Preprocess exposure
        info!(
            "[3/5] Preprocessing {} ({}, panel {})",
            exposure.label, self.config.preprocessing, self.config.reference_panel
        );
        let (exposure, report) = self.backend.preprocess(exposure, self.config.preprocessing)?;
        summary.counts.exposure_preprocessed = exposure.len();
        summary.exposure.preprocessing = report;

        // 4. Load, standardize and preprocess outcome
        info!("[4/5] Loading outcome {} from {:?}", self.config.outcome.label, self.config.outcome.path);
        let (raw, input) = self.load_study(&self.config.outcome)?;
        summary.outcome.input = Some(input);
        summary.counts.outcome_loaded = raw.len();

        let outcome = standardize(&self.config.outcome, &raw)?;
        drop(raw);

        let (outcome, report) = self.backend.preprocess(outcome, self.config.preprocessing)?;
        summary.counts.outcome_preprocessed = outcome.len();
        summary.outcome.preprocessing = report;

        // 5. Clump, query outcome, merge and write
        info!(
            "[5/5] Clumping {} (p1={:e}, r2={}, kb={}) and harmonizing with {}",
            exposure.label, self.config.clump.p1, self.config.clump.r2, self.config.clump.kb, outcome.label
        );
        let (clumped, clump_report) = self.backend.clump(&exposure, &self.config.clump)?;
        summary.counts.clumped = clumped.len();
        summary.clumping = clump_report;

        let (mr_data, harmonize_report) = self
            .backend
            .query_outcome(&clumped, &outcome, &self.config.harmonize)?;
        summary.counts.harmonized = mr_data.exposure.len();
        summary.harmonization = harmonize_report;

        let rows = merge_instruments(&mr_data).context("Failed to merge instruments")?;
        summary.counts.instruments = rows.len();
        debug!("{} instruments for {}", rows.len(), mr_data.name);

        summary.f_stat = FStatSummary::from_rows(&rows);
        match &summary.f_stat {
            Some(f_stat) => {
                f_stat.log();
                if f_stat.min < 10.0 {
                    warn!("Weak instruments present (minimum F-statistic {:.2} < 10)", f_stat.min);
                }
            }
            None => warn!("No instrument has an F-statistic"),
        }

        let writer = InstrumentWriter::new(&self.config.exposure.label, &self.config.outcome.label)?;
        summary.outputs = writer.write_all(&rows, &self.config.output_path, &self.config.formats)?;

        summary.finish();
        if let Some(path) = &self.config.summary_path {
            summary.write(path)?;
        }

        info!(
            "Processing complete: {} instruments written to {:?}",
            rows.len(),
            summary.outputs
        );
        Ok(PipelineOutcome { rows, summary })
    }

    fn load_study(&self, study: &StudyConfig) -> Result<(RawGwasTable, ValidatedInput)> {
        let input = self
            .validator
            .validate(&study.path, &study.mapping)
            .with_context(|| format!("Invalid {} input", study.label))?;

        let raw = self
            .loader
            .load(&study.path)
            .with_context(|| format!("Failed to load {} summary statistics from {:?}", study.label, study.path))?;

        info!("Loaded {} variants for {}", raw.len(), study.label);
        Ok((raw, input))
    }
}

fn standardize(study: &StudyConfig, raw: &RawGwasTable) -> Result<GenoTable> {
    study
        .mapping
        .standardize(raw, &study.label)
        .with_context(|| format!("Failed to standardize {} columns", study.label))
}
