// ==============================================================================
// report.rs - Run Summary
// ==============================================================================
// Description: JSON record of one instrument generation run (inputs and their
//              checksums, parameters, per-step counts, written files)
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::info;
use uuid::Uuid;

use crate::clump::ClumpReport;
use crate::config::{ClumpParams, HarmonizeParams, PipelineConfig};
use crate::harmonize::HarmonizeReport;
use crate::merge::FStatSummary;
use crate::preprocess::PreprocessReport;
use crate::validator::ValidatedInput;

/// Row counts after each pipeline step
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepCounts {
    pub exposure_loaded: usize,
    pub exposure_preprocessed: usize,
    pub outcome_loaded: usize,
    pub outcome_preprocessed: usize,
    pub clumped: usize,
    pub harmonized: usize,
    pub instruments: usize,
}

/// Preprocessing report of one study
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StudySummary {
    pub label: String,
    pub input: Option<ValidatedInput>,
    pub preprocessing: PreprocessReport,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub tool_version: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub reference_panel: String,
    pub preprocessing: String,
    pub clump_params: ClumpParams,
    pub harmonize_params: HarmonizeParams,
    pub exposure: StudySummary,
    pub outcome: StudySummary,
    pub clumping: ClumpReport,
    pub harmonization: HarmonizeReport,
    pub counts: StepCounts,
    pub f_stat: Option<FStatSummary>,
    pub outputs: Vec<PathBuf>,
}

impl RunSummary {
    /// Parameters and run identity; reports are filled in as steps finish
    pub fn start(config: &PipelineConfig) -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            started_at: now,
            finished_at: now,
            reference_panel: config.reference_panel.clone(),
            preprocessing: config.preprocessing.to_string(),
            clump_params: config.clump,
            harmonize_params: config.harmonize,
            exposure: StudySummary {
                label: config.exposure.label.clone(),
                input: None,
                preprocessing: PreprocessReport::default(),
            },
            outcome: StudySummary {
                label: config.outcome.label.clone(),
                input: None,
                preprocessing: PreprocessReport::default(),
            },
            clumping: ClumpReport::default(),
            harmonization: HarmonizeReport::default(),
            counts: StepCounts::default(),
            f_stat: None,
            outputs: Vec::new(),
        }
    }

    pub fn finish(&mut self) {
        self.finished_at = Utc::now();
    }

    /// Write the summary as pretty-printed JSON
    pub fn write(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create summary directory {:?}", parent))?;
        }

        let file = BufWriter::new(File::create(path).context("Failed to create run summary file")?);
        serde_json::to_writer_pretty(file, self).context("Failed to serialize run summary")?;

        info!("Run summary written: {:?} (run {})", path, self.run_id);
        Ok(())
    }
}
