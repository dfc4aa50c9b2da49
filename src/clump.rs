// ==============================================================================
// clump.rs - LD Clumping
// ==============================================================================
// Description: Selects independent genome-wide significant exposure variants
//              by greedy p-value ordered clumping against a reference panel
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================
// Algorithm (PLINK --clump style):
//   1. keep variants with P <= p1 whose id is in the panel
//   2. sort by P ascending (ties by chromosome, position)
//   3. take the best remaining variant as index, drop every remaining variant
//      on the same chromosome within kb * 1000 bp with r² > r2
//   4. repeat until no variant remains
// ==============================================================================

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::config::ClumpParams;
use crate::models::{CanonicalColumn, GenoTable, GwasRecord};
use crate::reference_panel::{PanelError, ReferencePanel};

/// Clumping errors
#[derive(Error, Debug)]
pub enum ClumpError {
    #[error("{label} has no {column} column, clumping needs SNP and P")]
    MissingColumn { label: String, column: &'static str },

    #[error("No {label} variant reaches P <= {p1} among reference panel variants")]
    NoIndexVariants { label: String, p1: f64 },

    #[error(transparent)]
    Panel(#[from] PanelError),
}

/// Counts of one clumping run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClumpReport {
    pub input_rows: usize,
    pub significant: usize,
    pub missing_from_panel: usize,
    pub clumped_out: usize,
    pub index_variants: usize,
}

/// Candidate for clumping with resolved coordinates
struct Candidate<'a> {
    record: &'a GwasRecord,
    snp: &'a str,
    chromosome: u8,
    position: u64,
    p: f64,
}

/// Clump a table against the panel
///
/// # Arguments
/// * `table` - Preprocessed exposure table
/// * `params` - p-value threshold, r² threshold and window
/// * `panel` - Reference panel providing genotypes for r²
///
/// # Returns
/// Index variants in chromosome/position order and the run counts
pub fn clump(
    table: &GenoTable,
    params: &ClumpParams,
    panel: &mut ReferencePanel,
) -> Result<(GenoTable, ClumpReport), ClumpError> {
    for column in [CanonicalColumn::Snp, CanonicalColumn::P] {
        if !table.has_column(column) {
            return Err(ClumpError::MissingColumn {
                label: table.label.clone(),
                column: column.as_str(),
            });
        }
    }

    let mut report = ClumpReport {
        input_rows: table.len(),
        ..Default::default()
    };

    let mut candidates = Vec::new();
    for record in &table.records {
        let (Some(snp), Some(p)) = (record.snp.as_deref(), record.p) else {
            continue;
        };
        if p > params.p1 {
            continue;
        }
        report.significant += 1;

        // Coordinates come from the study, the panel fills them when absent
        let Some(variant) = panel.by_rsid(snp) else {
            report.missing_from_panel += 1;
            continue;
        };
        let (chromosome, position) = record.locus().unwrap_or((variant.chromosome, variant.position));

        candidates.push(Candidate {
            record,
            snp,
            chromosome,
            position,
            p,
        });
    }

    info!(
        "{}: {} variants with P <= {:e} ({} not in reference panel {})",
        table.label,
        report.significant,
        params.p1,
        report.missing_from_panel,
        panel.name()
    );

    candidates.sort_by(|a, b| {
        a.p.total_cmp(&b.p)
            .then(a.chromosome.cmp(&b.chromosome))
            .then(a.position.cmp(&b.position))
    });

    let window = params.window_bp();
    let mut removed = vec![false; candidates.len()];
    let mut index_variants: Vec<&Candidate> = Vec::new();

    for i in 0..candidates.len() {
        if removed[i] {
            continue;
        }
        removed[i] = true;
        let index = &candidates[i];

        for j in (i + 1)..candidates.len() {
            if removed[j] {
                continue;
            }
            let other = &candidates[j];
            if other.chromosome != index.chromosome || other.position.abs_diff(index.position) > window {
                continue;
            }

            let r2 = panel.r2(index.snp, other.snp)?.unwrap_or(0.0);
            if r2 > params.r2 {
                debug!("{} clumped into {} (r² = {:.3})", other.snp, index.snp, r2);
                removed[j] = true;
                report.clumped_out += 1;
            }
        }

        index_variants.push(index);
    }

    if index_variants.is_empty() {
        return Err(ClumpError::NoIndexVariants {
            label: table.label.clone(),
            p1: params.p1,
        });
    }

    index_variants.sort_by_key(|c| (c.chromosome, c.position));
    report.index_variants = index_variants.len();

    let records = index_variants
        .iter()
        .map(|c| {
            let mut record = c.record.clone();
            record.chr = Some(c.chromosome);
            record.pos = Some(c.position);
            record
        })
        .collect();

    info!(
        "{}: {} independent index variants ({} clumped out, r² > {}, window {} kb)",
        table.label, report.index_variants, report.clumped_out, params.r2, params.kb
    );

    Ok((table.with_records(records), report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference_panel::test_support::{variant, write_panel};
    use std::collections::BTreeSet;
    use tempfile::tempdir;

    fn record(snp: &str, chr: u8, pos: u64, p: f64) -> GwasRecord {
        GwasRecord {
            snp: Some(snp.to_string()),
            chr: Some(chr),
            pos: Some(pos),
            ea: Some("A".to_string()),
            nea: Some("G".to_string()),
            beta: Some(0.1),
            se: Some(0.01),
            p: Some(p),
            eaf: Some(0.3),
        }
    }

    fn table(records: Vec<GwasRecord>) -> GenoTable {
        GenoTable::new("LDL", records, CanonicalColumn::ALL.iter().copied().collect())
    }

    fn panel(dir: &std::path::Path) -> ReferencePanel {
        // rs1/rs2 in perfect LD, rs3 independent of both, rs4 copies rs1 on chr 2
        let bed = write_panel(
            dir,
            "EUR_37",
            &[
                variant(1, "rs1", 1_000, ("A", "G"), &[0, 1, 2, 0, 1, 2]),
                variant(1, "rs2", 2_000, ("A", "G"), &[0, 1, 2, 0, 1, 2]),
                variant(1, "rs3", 3_000, ("A", "G"), &[1, 0, 1, 1, 2, 1]),
                variant(2, "rs4", 1_000, ("A", "G"), &[0, 1, 2, 0, 1, 2]),
                variant(1, "rs5", 50_000_000, ("A", "G"), &[0, 1, 2, 0, 1, 2]),
            ],
        );
        ReferencePanel::from_fileset("EUR_37".parse().unwrap(), &bed).unwrap()
    }

    #[test]
    fn test_clump_keeps_independent_variants() {
        let dir = tempdir().unwrap();
        let mut panel = panel(dir.path());

        let exposure = table(vec![
            record("rs2", 1, 2_000, 1e-12),
            record("rs1", 1, 1_000, 1e-20),
            record("rs3", 1, 3_000, 1e-9),
            record("rs4", 2, 1_000, 1e-10),
            record("rs5", 1, 50_000_000, 1e-15),
            record("rs_weak", 1, 4_000, 1e-3),
            record("rs_unknown", 1, 5_000, 1e-30),
        ]);

        let (clumped, report) = clump(&exposure, &ClumpParams::default(), &mut panel).unwrap();
        let ids: Vec<&str> = clumped.records.iter().filter_map(|r| r.snp.as_deref()).collect();

        // rs2 is clumped into rs1; rs4 is on another chromosome; rs5 is outside
        // the 10 Mb window
        assert_eq!(ids, vec!["rs1", "rs3", "rs5", "rs4"]);
        assert_eq!(report.significant, 6);
        assert_eq!(report.missing_from_panel, 1);
        assert_eq!(report.clumped_out, 1);
        assert_eq!(report.index_variants, 4);
        assert!(clumped.len() <= exposure.len());
    }

    #[test]
    fn test_clump_window_boundary_and_threshold() {
        let dir = tempdir().unwrap();
        let mut panel = panel(dir.path());

        let exposure = table(vec![record("rs1", 1, 1_000, 1e-20), record("rs2", 1, 2_000, 1e-12)]);
        // Exactly 1 kb apart is still inside a 1 kb window
        let params = ClumpParams {
            kb: 1,
            ..Default::default()
        };
        let (clumped, _) = clump(&exposure, &params, &mut panel).unwrap();
        assert_eq!(clumped.len(), 1);

        // r² threshold of 1 never clumps (r² must exceed it)
        let params = ClumpParams {
            r2: 1.0,
            ..Default::default()
        };
        let (clumped, _) = clump(&exposure, &params, &mut panel).unwrap();
        assert_eq!(clumped.len(), 2);
    }

    #[test]
    fn test_clump_fills_coordinates_from_panel() {
        let dir = tempdir().unwrap();
        let mut panel = panel(dir.path());

        let mut r = record("rs3", 1, 0, 1e-9);
        r.chr = None;
        r.pos = None;
        let (clumped, _) = clump(&table(vec![r]), &ClumpParams::default(), &mut panel).unwrap();
        assert_eq!(clumped.records[0].locus(), Some((1, 3_000)));
    }

    #[test]
    fn test_clump_no_significant_variants() {
        let dir = tempdir().unwrap();
        let mut panel = panel(dir.path());

        let exposure = table(vec![record("rs1", 1, 1_000, 0.01)]);
        match clump(&exposure, &ClumpParams::default(), &mut panel).unwrap_err() {
            ClumpError::NoIndexVariants { label, .. } => assert_eq!(label, "LDL"),
            other => panic!("Expected NoIndexVariants, got {:?}", other),
        }
    }

    #[test]
    fn test_clump_requires_p_column() {
        let dir = tempdir().unwrap();
        let mut panel = panel(dir.path());

        let columns: BTreeSet<CanonicalColumn> = [CanonicalColumn::Snp].into_iter().collect();
        let exposure = GenoTable::new("LDL", vec![], columns);
        assert!(matches!(
            clump(&exposure, &ClumpParams::default(), &mut panel),
            Err(ClumpError::MissingColumn { column: "P", .. })
        ));
    }
}
