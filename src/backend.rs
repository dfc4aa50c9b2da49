// ==============================================================================
// backend.rs - Preprocessing and Instrument Selection Backends
// ==============================================================================
// Description: Interfaces for the reference-panel dependent pipeline steps and
//              their implementation on top of a local PLINK reference panel
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::debug;

use crate::clump::{self, ClumpReport};
use crate::config::{ClumpParams, EffectColumn, HarmonizeParams, PipelineConfig, PreprocessingStrategy};
use crate::harmonize::{self, HarmonizeReport};
use crate::models::{GenoTable, MrData};
use crate::preprocess::{self, needs_panel, PreprocessReport};
use crate::reference_panel::{PanelName, ReferencePanel};

/// Cleans a standardized table before clumping
pub trait Preprocessor {
    fn preprocess(
        &mut self,
        table: GenoTable,
        strategy: PreprocessingStrategy,
    ) -> Result<(GenoTable, PreprocessReport)>;
}

/// Picks instruments from the exposure and aligns the outcome to them
pub trait InstrumentSelector {
    /// Independent significant exposure variants
    fn clump(&mut self, exposure: &GenoTable, params: &ClumpParams) -> Result<(GenoTable, ClumpReport)>;

    /// Outcome effects for the clumped variants, harmonized to the exposure
    /// effect allele (no proxy search)
    fn query_outcome(
        &mut self,
        clumped: &GenoTable,
        outcome: &GenoTable,
        params: &HarmonizeParams,
    ) -> Result<(MrData, HarmonizeReport)>;
}

/// Backend reading LD and variant annotations from a PLINK reference panel
///
/// The panel is opened on first use: preprocessing of fully annotated tables
/// does not touch the reference directory, clumping always does.
pub struct PanelBackend {
    reference_dir: PathBuf,
    panel_name: PanelName,
    effect_column: EffectColumn,
    panel: Option<ReferencePanel>,
}

impl PanelBackend {
    pub fn new(reference_dir: impl Into<PathBuf>, panel_name: PanelName, effect_column: EffectColumn) -> Self {
        Self {
            reference_dir: reference_dir.into(),
            panel_name,
            effect_column,
            panel: None,
        }
    }

    /// Backend for the panel, reference directory and effect scale of a run
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        let panel_name: PanelName = config
            .reference_panel
            .parse()
            .with_context(|| format!("Invalid reference panel name {:?}", config.reference_panel))?;
        Ok(Self::new(&config.reference_dir, panel_name, config.effect_column))
    }

    /// Backend around an already opened panel
    pub fn with_panel(panel: ReferencePanel, effect_column: EffectColumn) -> Self {
        Self {
            reference_dir: PathBuf::new(),
            panel_name: panel.name(),
            effect_column,
            panel: Some(panel),
        }
    }

    pub fn is_open(&self) -> bool {
        self.panel.is_some()
    }

    fn panel(&mut self) -> Result<&mut ReferencePanel> {
        let panel = match self.panel.take() {
            Some(panel) => panel,
            None => {
                debug!("Opening reference panel {} lazily", self.panel_name);
                ReferencePanel::open(&self.reference_dir, self.panel_name).with_context(|| {
                    format!(
                        "Failed to open reference panel {} under {:?}",
                        self.panel_name, self.reference_dir
                    )
                })?
            }
        };
        Ok(self.panel.insert(panel))
    }
}

impl Preprocessor for PanelBackend {
    fn preprocess(
        &mut self,
        table: GenoTable,
        strategy: PreprocessingStrategy,
    ) -> Result<(GenoTable, PreprocessReport)> {
        let label = table.label.clone();
        let effect_column = self.effect_column;

        let panel = if needs_panel(&table, strategy) {
            Some(&*self.panel()?)
        } else {
            None
        };

        preprocess::preprocess(table, strategy, effect_column, panel)
            .with_context(|| format!("Failed to preprocess {}", label))
    }
}

impl InstrumentSelector for PanelBackend {
    fn clump(&mut self, exposure: &GenoTable, params: &ClumpParams) -> Result<(GenoTable, ClumpReport)> {
        let panel = self.panel()?;
        clump::clump(exposure, params, panel).with_context(|| format!("Failed to clump {}", exposure.label))
    }

    fn query_outcome(
        &mut self,
        clumped: &GenoTable,
        outcome: &GenoTable,
        params: &HarmonizeParams,
    ) -> Result<(MrData, HarmonizeReport)> {
        harmonize::query_outcome(clumped, outcome, params).with_context(|| {
            format!(
                "Failed to harmonize {} instruments with {}",
                clumped.label, outcome.label
            )
        })
    }
}
