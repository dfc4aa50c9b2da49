// ==============================================================================
// merge.rs - Instrument Merge and Strength Metrics
// ==============================================================================
// Description: Joins harmonized exposure and outcome tables on the variant id,
//              computes per-instrument F-statistics and names output columns
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tracing::{debug, info};

use crate::models::{CanonicalColumn, GenoTable, InstrumentRow, MrData};

/// Name of the instrument strength column
pub const F_STAT_COLUMN: &str = "F_stat";

/// Merge errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MergeError {
    #[error("{label} row {row} has no SNP id")]
    MissingKey { label: String, row: usize },

    #[error("SNP id {snp} appears more than once in {label}")]
    DuplicateKey { label: String, snp: String },

    #[error("Output column {0} would appear twice (exposure and outcome labels must differ)")]
    ColumnCollision(String),
}

/// F-statistic of one instrument: (beta / se)²
pub fn f_statistic(beta: Option<f64>, se: Option<f64>) -> Option<f64> {
    let (beta, se) = (beta?, se?);
    if se <= 0.0 {
        return None;
    }
    let f = (beta / se).powi(2);
    f.is_finite().then_some(f)
}

/// Index of each SNP id, failing on missing or repeated ids
fn key_index(table: &GenoTable) -> Result<HashMap<&str, usize>, MergeError> {
    let mut index = HashMap::with_capacity(table.len());
    for (row, record) in table.records.iter().enumerate() {
        let snp = record.snp.as_deref().ok_or_else(|| MergeError::MissingKey {
            label: table.label.clone(),
            row,
        })?;
        if index.insert(snp, row).is_some() {
            return Err(MergeError::DuplicateKey {
                label: table.label.clone(),
                snp: snp.to_string(),
            });
        }
    }
    Ok(index)
}

/// Inner join of the aligned tables on SNP, in exposure order
///
/// Both sides must carry a unique, non-empty id per row. `F_stat` is computed
/// from the exposure effect after the join.
pub fn merge_instruments(data: &MrData) -> Result<Vec<InstrumentRow>, MergeError> {
    key_index(&data.exposure)?;
    let outcome_index = key_index(&data.outcome)?;

    let rows: Vec<InstrumentRow> = data
        .exposure
        .records
        .iter()
        .filter_map(|exposure| {
            let snp = exposure.snp.as_deref()?;
            let outcome = &data.outcome.records[*outcome_index.get(snp)?];
            Some(InstrumentRow {
                snp: snp.to_string(),
                exposure: exposure.clone(),
                outcome: outcome.clone(),
                f_stat: f_statistic(exposure.beta, exposure.se),
            })
        })
        .collect();

    debug!(
        "Merged {} exposure and {} outcome rows into {} instruments",
        data.exposure.len(),
        data.outcome.len(),
        rows.len()
    );

    Ok(rows)
}

/// Output header: SNP, exposure fields, outcome fields, F_stat
///
/// # Arguments
/// * `exposure_label` - Suffix of exposure columns (e.g. "LDL" -> "BETA_LDL")
/// * `outcome_label` - Suffix of outcome columns
pub fn output_header(exposure_label: &str, outcome_label: &str) -> Result<Vec<String>, MergeError> {
    let mut header = vec![CanonicalColumn::Snp.as_str().to_string()];
    for label in [exposure_label, outcome_label] {
        for column in CanonicalColumn::VALUE_COLUMNS {
            header.push(format!("{}_{}", column.as_str(), label));
        }
    }
    header.push(F_STAT_COLUMN.to_string());

    let mut seen = HashSet::with_capacity(header.len());
    for name in &header {
        if !seen.insert(name.as_str()) {
            return Err(MergeError::ColumnCollision(name.clone()));
        }
    }
    Ok(header)
}

/// Distribution of instrument F-statistics
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FStatSummary {
    pub count: usize,
    pub median: f64,
    pub min: f64,
    pub max: f64,
}

impl FStatSummary {
    /// `None` when no row has an F-statistic
    pub fn from_rows(rows: &[InstrumentRow]) -> Option<Self> {
        let mut values: Vec<f64> = rows.iter().filter_map(|r| r.f_stat).collect();
        if values.is_empty() {
            return None;
        }
        values.sort_by(|a, b| a.total_cmp(b));

        let n = values.len();
        let median = if n % 2 == 0 {
            (values[n / 2 - 1] + values[n / 2]) / 2.0
        } else {
            values[n / 2]
        };

        Some(Self {
            count: n,
            median,
            min: values[0],
            max: values[n - 1],
        })
    }

    pub fn log(&self) {
        info!(
            "F-statistic over {} instruments: median {:.2}, min {:.2}, max {:.2}",
            self.count, self.median, self.min, self.max
        );
    }
}
