// ==============================================================================
// config.rs - Pipeline Configuration
// ==============================================================================
// Description: Run parameters for instrument generation (paths, labels, column
//              mappings, preprocessing, clumping and harmonization settings)
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use thiserror::Error;

use crate::models::{CanonicalColumn, ColumnMapping};
use crate::output::OutputFormat;

pub const DEFAULT_EXPOSURE_PATH: &str = "../data_raw/LDL.tsv.gz";
pub const DEFAULT_OUTCOME_PATH: &str = "../data_raw/CAD.tsv.gz";
pub const DEFAULT_OUTPUT_PATH: &str = "../data/MR_IVs_LDL_CAD.csv";
pub const DEFAULT_REFERENCE_DIR: &str = "../reference";
pub const DEFAULT_REFERENCE_PANEL: &str = "EUR_37";
pub const DEFAULT_EXPOSURE_LABEL: &str = "LDL";
pub const DEFAULT_OUTCOME_LABEL: &str = "CAD";

pub const DEFAULT_P1: f64 = 5e-8;
pub const DEFAULT_R2: f64 = 0.01;
pub const DEFAULT_KB: u64 = 10_000;
pub const DEFAULT_EAF_THRESHOLD: f64 = 0.42;

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Unknown preprocessing strategy '{0}' (expected None, Fill or Fill_delete)")]
    UnknownStrategy(String),

    #[error("Unknown effect column kind '{0}' (expected auto, beta or or)")]
    UnknownEffectColumn(String),

    #[error("Unknown harmonization action '{0}' (expected 1, 2 or 3)")]
    UnknownAction(String),

    #[error("Invalid column override '{0}' (expected CANONICAL=source, e.g. SNP=rsid)")]
    InvalidColumnOverride(String),

    #[error("Invalid parameter {name}={value}: {reason}")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("Exposure and outcome labels must differ (both '{0}')")]
    DuplicateLabels(String),
}

/// How invalid or missing values are handled before clumping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PreprocessingStrategy {
    /// Leave the table untouched
    None,
    /// Fill missing columns and blank out invalid values, keep every row
    Fill,
    /// Fill, then delete rows with missing or invalid values
    FillDelete,
}

impl PreprocessingStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            PreprocessingStrategy::None => "None",
            PreprocessingStrategy::Fill => "Fill",
            PreprocessingStrategy::FillDelete => "Fill_delete",
        }
    }

    pub fn fills(&self) -> bool {
        !matches!(self, PreprocessingStrategy::None)
    }

    pub fn deletes(&self) -> bool {
        matches!(self, PreprocessingStrategy::FillDelete)
    }
}

impl FromStr for PreprocessingStrategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "none" => Ok(PreprocessingStrategy::None),
            "fill" => Ok(PreprocessingStrategy::Fill),
            "fill_delete" => Ok(PreprocessingStrategy::FillDelete),
            _ => Err(ConfigError::UnknownStrategy(s.to_string())),
        }
    }
}

impl fmt::Display for PreprocessingStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Scale of the effect column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EffectColumn {
    /// Odds ratio if the median effect is closer to 1 than to 0
    Auto,
    Beta,
    /// Odds ratios, log-transformed during preprocessing
    OddsRatio,
}

impl FromStr for EffectColumn {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "auto" => Ok(EffectColumn::Auto),
            "beta" => Ok(EffectColumn::Beta),
            "or" | "odds_ratio" => Ok(EffectColumn::OddsRatio),
            _ => Err(ConfigError::UnknownEffectColumn(s.to_string())),
        }
    }
}

/// Treatment of palindromic (A/T, C/G) variants during harmonization
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HarmonizeAction {
    /// 1: assume both studies report the forward strand
    AssumeForward,
    /// 2: infer strand from allele frequencies, drop ambiguous ones
    InferFromFrequency,
    /// 3: drop every palindromic variant
    DropPalindromic,
}

impl FromStr for HarmonizeAction {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "1" => Ok(HarmonizeAction::AssumeForward),
            "2" => Ok(HarmonizeAction::InferFromFrequency),
            "3" => Ok(HarmonizeAction::DropPalindromic),
            _ => Err(ConfigError::UnknownAction(s.to_string())),
        }
    }
}

/// Clumping thresholds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClumpParams {
    /// Index variant p-value threshold
    pub p1: f64,
    /// LD r² above which a neighbour is clumped into its index variant
    pub r2: f64,
    /// Clumping window in kilobases
    pub kb: u64,
}

impl Default for ClumpParams {
    fn default() -> Self {
        Self {
            p1: DEFAULT_P1,
            r2: DEFAULT_R2,
            kb: DEFAULT_KB,
        }
    }
}

impl ClumpParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.p1 > 0.0 && self.p1 <= 1.0) {
            return Err(ConfigError::InvalidParameter {
                name: "p1",
                value: self.p1.to_string(),
                reason: "must be in (0, 1]",
            });
        }
        if !(0.0..=1.0).contains(&self.r2) {
            return Err(ConfigError::InvalidParameter {
                name: "r2",
                value: self.r2.to_string(),
                reason: "must be in [0, 1]",
            });
        }
        if self.kb == 0 {
            return Err(ConfigError::InvalidParameter {
                name: "kb",
                value: self.kb.to_string(),
                reason: "must be positive",
            });
        }
        Ok(())
    }

    /// Window half-width in base pairs
    pub fn window_bp(&self) -> u64 {
        self.kb.saturating_mul(1000)
    }
}

/// Outcome query and allele harmonization settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HarmonizeParams {
    pub action: HarmonizeAction,
    /// Palindromic variants with exposure EAF in [t, 1 - t] are ambiguous
    pub eaf_threshold: f64,
}

impl Default for HarmonizeParams {
    fn default() -> Self {
        Self {
            action: HarmonizeAction::InferFromFrequency,
            eaf_threshold: DEFAULT_EAF_THRESHOLD,
        }
    }
}

impl HarmonizeParams {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=0.5).contains(&self.eaf_threshold) {
            return Err(ConfigError::InvalidParameter {
                name: "eaf_threshold",
                value: self.eaf_threshold.to_string(),
                reason: "must be in [0, 0.5]",
            });
        }
        Ok(())
    }
}

/// One input study: where it lives and how its columns map
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyConfig {
    pub path: PathBuf,
    pub label: String,
    pub mapping: ColumnMapping,
}

/// Complete configuration of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub exposure: StudyConfig,
    pub outcome: StudyConfig,
    pub output_path: PathBuf,
    pub formats: Vec<OutputFormat>,
    pub summary_path: Option<PathBuf>,
    pub reference_dir: PathBuf,
    pub reference_panel: String,
    pub preprocessing: PreprocessingStrategy,
    pub effect_column: EffectColumn,
    pub clump: ClumpParams,
    pub harmonize: HarmonizeParams,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            exposure: StudyConfig {
                path: PathBuf::from(DEFAULT_EXPOSURE_PATH),
                label: DEFAULT_EXPOSURE_LABEL.to_string(),
                mapping: ColumnMapping::gwas_catalog(),
            },
            outcome: StudyConfig {
                path: PathBuf::from(DEFAULT_OUTCOME_PATH),
                label: DEFAULT_OUTCOME_LABEL.to_string(),
                mapping: ColumnMapping::metal(),
            },
            output_path: PathBuf::from(DEFAULT_OUTPUT_PATH),
            formats: vec![OutputFormat::Csv],
            summary_path: None,
            reference_dir: PathBuf::from(DEFAULT_REFERENCE_DIR),
            reference_panel: DEFAULT_REFERENCE_PANEL.to_string(),
            preprocessing: PreprocessingStrategy::FillDelete,
            effect_column: EffectColumn::Auto,
            clump: ClumpParams::default(),
            harmonize: HarmonizeParams::default(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.clump.validate()?;
        self.harmonize.validate()?;

        if self.exposure.label == self.outcome.label {
            return Err(ConfigError::DuplicateLabels(self.exposure.label.clone()));
        }
        if self.formats.is_empty() {
            return Err(ConfigError::InvalidParameter {
                name: "formats",
                value: String::new(),
                reason: "at least one output format is required",
            });
        }
        Ok(())
    }
}

/// Apply a `CANONICAL=source` override to a mapping (`CANONICAL=` unmaps)
pub fn apply_column_override(mapping: &mut ColumnMapping, assignment: &str) -> Result<(), ConfigError> {
    let (canonical, source) = assignment
        .split_once('=')
        .ok_or_else(|| ConfigError::InvalidColumnOverride(assignment.to_string()))?;

    let column = CanonicalColumn::from_name(canonical)
        .ok_or_else(|| ConfigError::InvalidColumnOverride(assignment.to_string()))?;

    let source = source.trim();
    if source.is_empty() {
        mapping.unset(column);
    } else {
        mapping.set(column, source);
    }
    Ok(())
}
