// ==============================================================================
// models.rs - GWAS Summary Statistics Data Models
// ==============================================================================
// Description: Canonical variant records, column mappings and MR instrument rows
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Canonical summary-statistics fields
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CanonicalColumn {
    /// Variant identifier (rsID)
    Snp,
    /// Chromosome (1-22, X=23, Y=24, XY=25, MT=26)
    Chr,
    /// Base pair position
    Pos,
    /// Effect allele
    Ea,
    /// Non-effect allele
    Nea,
    /// Effect size (beta, or log odds ratio after preprocessing)
    Beta,
    /// Standard error of the effect size
    Se,
    /// P-value
    P,
    /// Effect allele frequency
    Eaf,
}

impl CanonicalColumn {
    pub const ALL: [CanonicalColumn; 9] = [
        CanonicalColumn::Snp,
        CanonicalColumn::Chr,
        CanonicalColumn::Pos,
        CanonicalColumn::Ea,
        CanonicalColumn::Nea,
        CanonicalColumn::Beta,
        CanonicalColumn::Se,
        CanonicalColumn::P,
        CanonicalColumn::Eaf,
    ];

    /// Columns carried per study in merged output (everything but the merge key)
    pub const VALUE_COLUMNS: [CanonicalColumn; 8] = [
        CanonicalColumn::Chr,
        CanonicalColumn::Pos,
        CanonicalColumn::Ea,
        CanonicalColumn::Nea,
        CanonicalColumn::Beta,
        CanonicalColumn::Se,
        CanonicalColumn::P,
        CanonicalColumn::Eaf,
    ];

    /// Columns a record must carry to survive `Fill_delete`
    pub const REQUIRED: [CanonicalColumn; 8] = [
        CanonicalColumn::Snp,
        CanonicalColumn::Chr,
        CanonicalColumn::Pos,
        CanonicalColumn::Ea,
        CanonicalColumn::Nea,
        CanonicalColumn::Beta,
        CanonicalColumn::Se,
        CanonicalColumn::P,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalColumn::Snp => "SNP",
            CanonicalColumn::Chr => "CHR",
            CanonicalColumn::Pos => "POS",
            CanonicalColumn::Ea => "EA",
            CanonicalColumn::Nea => "NEA",
            CanonicalColumn::Beta => "BETA",
            CanonicalColumn::Se => "SE",
            CanonicalColumn::P => "P",
            CanonicalColumn::Eaf => "EAF",
        }
    }

    /// Case-insensitive lookup by canonical name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(name.trim()))
    }
}

/// One variant from a GWAS summary statistics table
///
/// Every field is optional: standardization coerces what it can and leaves the
/// rest missing, preprocessing decides what to fill and what to delete.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GwasRecord {
    pub snp: Option<String>,
    pub chr: Option<u8>,
    pub pos: Option<u64>,
    pub ea: Option<String>,
    pub nea: Option<String>,
    pub beta: Option<f64>,
    pub se: Option<f64>,
    pub p: Option<f64>,
    pub eaf: Option<f64>,
}

impl GwasRecord {
    /// Whether the given canonical field holds a value
    pub fn has(&self, column: CanonicalColumn) -> bool {
        match column {
            CanonicalColumn::Snp => self.snp.is_some(),
            CanonicalColumn::Chr => self.chr.is_some(),
            CanonicalColumn::Pos => self.pos.is_some(),
            CanonicalColumn::Ea => self.ea.is_some(),
            CanonicalColumn::Nea => self.nea.is_some(),
            CanonicalColumn::Beta => self.beta.is_some(),
            CanonicalColumn::Se => self.se.is_some(),
            CanonicalColumn::P => self.p.is_some(),
            CanonicalColumn::Eaf => self.eaf.is_some(),
        }
    }

    /// Text rendering of a field for tabular output (`None` when missing)
    pub fn field_text(&self, column: CanonicalColumn) -> Option<String> {
        match column {
            CanonicalColumn::Snp => self.snp.clone(),
            CanonicalColumn::Chr => self.chr.map(|v| v.to_string()),
            CanonicalColumn::Pos => self.pos.map(|v| v.to_string()),
            CanonicalColumn::Ea => self.ea.clone(),
            CanonicalColumn::Nea => self.nea.clone(),
            CanonicalColumn::Beta => self.beta.map(|v| v.to_string()),
            CanonicalColumn::Se => self.se.map(|v| v.to_string()),
            CanonicalColumn::P => self.p.map(|v| v.to_string()),
            CanonicalColumn::Eaf => self.eaf.map(|v| v.to_string()),
        }
    }

    /// (chromosome, position) if both are known
    pub fn locus(&self) -> Option<(u8, u64)> {
        Some((self.chr?, self.pos?))
    }
}

/// Explicit mapping from canonical fields to the column names of one source file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnMapping {
    pub snp: Option<String>,
    pub chr: Option<String>,
    pub pos: Option<String>,
    pub ea: Option<String>,
    pub nea: Option<String>,
    pub beta: Option<String>,
    pub se: Option<String>,
    pub p: Option<String>,
    pub eaf: Option<String>,
}

impl ColumnMapping {
    /// GWAS Catalog harmonised summary statistics layout (e.g. GLGC LDL)
    pub fn gwas_catalog() -> Self {
        Self {
            snp: None,
            chr: Some("chromosome".to_string()),
            pos: Some("base_pair_location".to_string()),
            ea: Some("effect_allele".to_string()),
            nea: Some("other_allele".to_string()),
            beta: Some("beta".to_string()),
            se: Some("standard_error".to_string()),
            p: Some("p_value".to_string()),
            eaf: Some("effect_allele_frequency".to_string()),
        }
    }

    /// METAL meta-analysis output layout (e.g. CARDIoGRAMplusC4D CAD)
    pub fn metal() -> Self {
        Self {
            snp: None,
            chr: Some("CHR".to_string()),
            pos: Some("BP".to_string()),
            ea: Some("Allele1".to_string()),
            nea: Some("Allele2".to_string()),
            beta: Some("Effect".to_string()),
            se: Some("StdErr".to_string()),
            p: Some("P-value".to_string()),
            eaf: Some("Freq1".to_string()),
        }
    }

    /// Source column name for a canonical field
    pub fn source(&self, column: CanonicalColumn) -> Option<&str> {
        self.slot(column).as_deref()
    }

    /// Map a canonical field to a source column
    pub fn set(&mut self, column: CanonicalColumn, source: impl Into<String>) {
        *self.slot_mut(column) = Some(source.into());
    }

    /// Remove the mapping for a canonical field
    pub fn unset(&mut self, column: CanonicalColumn) {
        *self.slot_mut(column) = None;
    }

    /// All mapped (canonical, source) pairs in canonical order
    pub fn mapped(&self) -> Vec<(CanonicalColumn, &str)> {
        CanonicalColumn::ALL
            .iter()
            .filter_map(|&c| self.source(c).map(|s| (c, s)))
            .collect()
    }

    fn slot(&self, column: CanonicalColumn) -> &Option<String> {
        match column {
            CanonicalColumn::Snp => &self.snp,
            CanonicalColumn::Chr => &self.chr,
            CanonicalColumn::Pos => &self.pos,
            CanonicalColumn::Ea => &self.ea,
            CanonicalColumn::Nea => &self.nea,
            CanonicalColumn::Beta => &self.beta,
            CanonicalColumn::Se => &self.se,
            CanonicalColumn::P => &self.p,
            CanonicalColumn::Eaf => &self.eaf,
        }
    }

    fn slot_mut(&mut self, column: CanonicalColumn) -> &mut Option<String> {
        match column {
            CanonicalColumn::Snp => &mut self.snp,
            CanonicalColumn::Chr => &mut self.chr,
            CanonicalColumn::Pos => &mut self.pos,
            CanonicalColumn::Ea => &mut self.ea,
            CanonicalColumn::Nea => &mut self.nea,
            CanonicalColumn::Beta => &mut self.beta,
            CanonicalColumn::Se => &mut self.se,
            CanonicalColumn::P => &mut self.p,
            CanonicalColumn::Eaf => &mut self.eaf,
        }
    }
}

/// Standardized genotype-association table for one trait
#[derive(Debug, Clone)]
pub struct GenoTable {
    /// Trait label (e.g. "LDL"), used for output suffixes and logging
    pub label: String,

    /// Variant records in canonical form
    pub records: Vec<GwasRecord>,

    /// Canonical columns present in the table (mapped from source or filled)
    pub columns: BTreeSet<CanonicalColumn>,
}

impl GenoTable {
    pub fn new(label: impl Into<String>, records: Vec<GwasRecord>, columns: BTreeSet<CanonicalColumn>) -> Self {
        Self {
            label: label.into(),
            records,
            columns,
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn has_column(&self, column: CanonicalColumn) -> bool {
        self.columns.contains(&column)
    }

    /// Same label and columns, different records
    pub fn with_records(&self, records: Vec<GwasRecord>) -> Self {
        Self {
            label: self.label.clone(),
            records,
            columns: self.columns.clone(),
        }
    }
}

/// Aligned exposure/outcome tables produced by clumping + harmonization
///
/// Both tables hold the same variants in the same order, with the outcome
/// effect estimates expressed on the exposure effect allele.
#[derive(Debug, Clone)]
pub struct MrData {
    pub exposure: GenoTable,
    pub outcome: GenoTable,
    pub name: String,
}

/// One merged instrument (exposure and outcome side by side)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentRow {
    pub snp: String,
    pub exposure: GwasRecord,
    pub outcome: GwasRecord,
    /// (beta_exposure / se_exposure)^2
    pub f_stat: Option<f64>,
}
