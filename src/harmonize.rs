// ==============================================================================
// harmonize.rs - Outcome Query and Allele Harmonization
// ==============================================================================
// Description: Looks up clumped exposure variants in the outcome study (no
//              proxies) and expresses outcome effects on the exposure effect
//              allele
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================
// Per variant:
//   outcome EA/NEA == exposure EA/NEA           -> keep
//   outcome EA/NEA == exposure NEA/EA           -> flip (BETA * -1, EAF -> 1 - EAF)
//   complement of outcome alleles matches       -> strand flip, then as above
//   otherwise                                   -> incompatible, dropped
// Palindromic variants (A/T, C/G) are resolved by HarmonizeAction.
// ==============================================================================

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;
use tracing::{debug, info};

use crate::config::{HarmonizeAction, HarmonizeParams};
use crate::models::{CanonicalColumn, GenoTable, GwasRecord, MrData};

/// Harmonization errors
#[derive(Error, Debug)]
pub enum HarmonizeError {
    #[error("{label} has no {column} column, harmonization needs SNP, EA and NEA")]
    MissingColumn { label: String, column: &'static str },

    #[error("None of the {exposure} instruments were found in {outcome}")]
    NoSharedVariants { exposure: String, outcome: String },

    #[error("No {exposure} instrument could be harmonized with {outcome}")]
    NoCompatibleVariants { exposure: String, outcome: String },
}

/// Counts of one harmonization run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HarmonizeReport {
    pub instruments: usize,
    pub found_in_outcome: usize,
    pub not_in_outcome: usize,
    pub aligned: usize,
    pub allele_flipped: usize,
    pub strand_flipped: usize,
    pub palindromic_kept: usize,
    pub palindromic_flipped: usize,
    pub palindromic_dropped: usize,
    pub incompatible: usize,
    pub harmonized: usize,
}

/// How the outcome alleles relate to the exposure alleles
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Orientation {
    Same,
    Swapped,
}

/// Watson-Crick complement of an allele
pub fn complement(allele: &str) -> String {
    allele
        .chars()
        .map(|c| match c {
            'A' => 'T',
            'T' => 'A',
            'C' => 'G',
            'G' => 'C',
            other => other,
        })
        .collect()
}

/// A/T and C/G variants read the same on both strands
pub fn is_palindromic(ea: &str, nea: &str) -> bool {
    complement(ea) == nea
}

fn orientation(exp_ea: &str, exp_nea: &str, out_ea: &str, out_nea: &str) -> Option<Orientation> {
    if out_ea == exp_ea && out_nea == exp_nea {
        Some(Orientation::Same)
    } else if out_ea == exp_nea && out_nea == exp_ea {
        Some(Orientation::Swapped)
    } else {
        None
    }
}

/// Express the outcome effect on the other allele
fn flip(record: &mut GwasRecord) {
    record.beta = record.beta.map(|b| -b);
    record.eaf = record.eaf.map(|f| 1.0 - f);
    std::mem::swap(&mut record.ea, &mut record.nea);
}

/// Query the outcome for the clumped instruments and harmonize alleles
///
/// # Arguments
/// * `clumped` - Clumped exposure table
/// * `outcome` - Preprocessed outcome table
/// * `params` - Palindromic variant handling
///
/// # Returns
/// Aligned exposure/outcome tables in exposure order and the run counts
pub fn query_outcome(
    clumped: &GenoTable,
    outcome: &GenoTable,
    params: &HarmonizeParams,
) -> Result<(MrData, HarmonizeReport), HarmonizeError> {
    for table in [clumped, outcome] {
        for column in [CanonicalColumn::Snp, CanonicalColumn::Ea, CanonicalColumn::Nea] {
            if !table.has_column(column) {
                return Err(HarmonizeError::MissingColumn {
                    label: table.label.clone(),
                    column: column.as_str(),
                });
            }
        }
    }

    let mut by_snp: HashMap<&str, &GwasRecord> = HashMap::with_capacity(outcome.len());
    for record in &outcome.records {
        if let Some(snp) = record.snp.as_deref() {
            by_snp.entry(snp).or_insert(record);
        }
    }

    let mut report = HarmonizeReport {
        instruments: clumped.len(),
        ..Default::default()
    };
    let mut exposure_records = Vec::new();
    let mut outcome_records = Vec::new();

    for exposure in &clumped.records {
        let Some(found) = exposure.snp.as_deref().and_then(|snp| by_snp.get(snp)) else {
            report.not_in_outcome += 1;
            continue;
        };
        report.found_in_outcome += 1;

        if let Some(aligned) = harmonize_pair(exposure, found, params, &mut report) {
            exposure_records.push(exposure.clone());
            outcome_records.push(aligned);
        }
    }

    if report.found_in_outcome == 0 {
        return Err(HarmonizeError::NoSharedVariants {
            exposure: clumped.label.clone(),
            outcome: outcome.label.clone(),
        });
    }
    if exposure_records.is_empty() {
        return Err(HarmonizeError::NoCompatibleVariants {
            exposure: clumped.label.clone(),
            outcome: outcome.label.clone(),
        });
    }

    report.harmonized = exposure_records.len();
    info!(
        "Harmonized {} of {} instruments with {} ({} not found, {} flipped, {} strand flipped, {} palindromic dropped, {} incompatible)",
        report.harmonized,
        report.instruments,
        outcome.label,
        report.not_in_outcome,
        report.allele_flipped + report.palindromic_flipped,
        report.strand_flipped,
        report.palindromic_dropped,
        report.incompatible
    );

    let data = MrData {
        exposure: clumped.with_records(exposure_records),
        outcome: outcome.with_records(outcome_records),
        name: outcome.label.clone(),
    };
    Ok((data, report))
}

/// Outcome record aligned to the exposure effect allele, `None` if dropped
fn harmonize_pair(
    exposure: &GwasRecord,
    outcome: &GwasRecord,
    params: &HarmonizeParams,
    report: &mut HarmonizeReport,
) -> Option<GwasRecord> {
    let snp = exposure.snp.as_deref().unwrap_or_default();
    let (Some(exp_ea), Some(exp_nea), Some(out_ea), Some(out_nea)) = (
        exposure.ea.as_deref(),
        exposure.nea.as_deref(),
        outcome.ea.as_deref(),
        outcome.nea.as_deref(),
    ) else {
        debug!("{}: missing alleles", snp);
        report.incompatible += 1;
        return None;
    };

    let mut aligned = outcome.clone();

    if is_palindromic(exp_ea, exp_nea) {
        let Some(orient) = orientation(exp_ea, exp_nea, out_ea, out_nea) else {
            debug!("{}: alleles {}/{} vs {}/{}", snp, exp_ea, exp_nea, out_ea, out_nea);
            report.incompatible += 1;
            return None;
        };
        if orient == Orientation::Swapped {
            flip(&mut aligned);
        }

        match params.action {
            HarmonizeAction::DropPalindromic => {
                report.palindromic_dropped += 1;
                return None;
            }
            HarmonizeAction::AssumeForward => {
                report.palindromic_kept += 1;
            }
            HarmonizeAction::InferFromFrequency => {
                let t = params.eaf_threshold;
                let (Some(exp_eaf), Some(out_eaf)) = (exposure.eaf, aligned.eaf) else {
                    debug!("{}: palindromic without allele frequencies", snp);
                    report.palindromic_dropped += 1;
                    return None;
                };
                if (t..=1.0 - t).contains(&exp_eaf) {
                    debug!("{}: palindromic with ambiguous EAF {:.3}", snp, exp_eaf);
                    report.palindromic_dropped += 1;
                    return None;
                }

                if (exp_eaf - 0.5) * (out_eaf - 0.5) < 0.0 {
                    // Outcome reported on the reverse strand: its EA is the exposure NEA
                    aligned.beta = aligned.beta.map(|b| -b);
                    aligned.eaf = aligned.eaf.map(|f| 1.0 - f);
                    report.palindromic_flipped += 1;
                } else {
                    report.palindromic_kept += 1;
                }
            }
        }
        return Some(aligned);
    }

    let (orient, strand) = match orientation(exp_ea, exp_nea, out_ea, out_nea) {
        Some(orient) => (orient, false),
        None => {
            let (c_ea, c_nea) = (complement(out_ea), complement(out_nea));
            match orientation(exp_ea, exp_nea, &c_ea, &c_nea) {
                Some(orient) => (orient, true),
                None => {
                    debug!("{}: alleles {}/{} vs {}/{}", snp, exp_ea, exp_nea, out_ea, out_nea);
                    report.incompatible += 1;
                    return None;
                }
            }
        }
    };

    if strand {
        aligned.ea = Some(complement(out_ea));
        aligned.nea = Some(complement(out_nea));
        report.strand_flipped += 1;
    }
    match orient {
        Orientation::Same => report.aligned += 1,
        Orientation::Swapped => {
            flip(&mut aligned);
            report.allele_flipped += 1;
        }
    }

    Some(aligned)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(snp: &str, ea: &str, nea: &str, beta: f64, eaf: Option<f64>) -> GwasRecord {
        GwasRecord {
            snp: Some(snp.to_string()),
            chr: Some(1),
            pos: Some(100),
            ea: Some(ea.to_string()),
            nea: Some(nea.to_string()),
            beta: Some(beta),
            se: Some(0.01),
            p: Some(1e-10),
            eaf,
        }
    }

    fn table(label: &str, records: Vec<GwasRecord>) -> GenoTable {
        GenoTable::new(label, records, CanonicalColumn::ALL.iter().copied().collect())
    }

    fn harmonize(exposure: GwasRecord, outcome: GwasRecord, action: HarmonizeAction) -> Option<GwasRecord> {
        let params = HarmonizeParams {
            action,
            ..Default::default()
        };
        let mut report = HarmonizeReport::default();
        harmonize_pair(&exposure, &outcome, &params, &mut report)
    }

    #[test]
    fn test_complement_and_palindromic() {
        assert_eq!(complement("ACGT"), "TGCA");
        assert!(is_palindromic("A", "T"));
        assert!(is_palindromic("G", "C"));
        assert!(!is_palindromic("A", "G"));
    }

    #[test]
    fn test_same_orientation_kept() {
        let out = harmonize(
            record("rs1", "A", "G", 0.1, Some(0.3)),
            record("rs1", "A", "G", 0.05, Some(0.3)),
            HarmonizeAction::InferFromFrequency,
        )
        .unwrap();
        assert_eq!(out.beta, Some(0.05));
        assert_eq!(out.ea.as_deref(), Some("A"));
    }

    #[test]
    fn test_swapped_alleles_flipped() {
        let out = harmonize(
            record("rs1", "A", "G", 0.1, Some(0.3)),
            record("rs1", "G", "A", 0.05, Some(0.7)),
            HarmonizeAction::InferFromFrequency,
        )
        .unwrap();
        assert_eq!(out.beta, Some(-0.05));
        assert!((out.eaf.unwrap() - 0.3).abs() < 1e-12);
        assert_eq!(out.ea.as_deref(), Some("A"));
        assert_eq!(out.nea.as_deref(), Some("G"));
    }

    #[test]
    fn test_strand_flip() {
        // T/C on the reverse strand is A/G
        let out = harmonize(
            record("rs1", "A", "G", 0.1, Some(0.3)),
            record("rs1", "C", "T", 0.05, Some(0.7)),
            HarmonizeAction::InferFromFrequency,
        )
        .unwrap();
        assert_eq!(out.ea.as_deref(), Some("A"));
        assert_eq!(out.nea.as_deref(), Some("G"));
        assert_eq!(out.beta, Some(-0.05));
    }

    #[test]
    fn test_incompatible_alleles_dropped() {
        let out = harmonize(
            record("rs1", "A", "G", 0.1, Some(0.3)),
            record("rs1", "A", "C", 0.05, Some(0.3)),
            HarmonizeAction::InferFromFrequency,
        );
        assert!(out.is_none());
    }

    #[test]
    fn test_palindromic_actions() {
        let exposure = record("rs1", "A", "T", 0.1, Some(0.2));
        let outcome = record("rs1", "A", "T", 0.05, Some(0.8));

        // Frequencies on opposite sides of 0.5: outcome is on the other strand
        let inferred = harmonize(exposure.clone(), outcome.clone(), HarmonizeAction::InferFromFrequency).unwrap();
        assert_eq!(inferred.beta, Some(-0.05));
        assert!((inferred.eaf.unwrap() - 0.2).abs() < 1e-12);

        let forward = harmonize(exposure.clone(), outcome.clone(), HarmonizeAction::AssumeForward).unwrap();
        assert_eq!(forward.beta, Some(0.05));

        assert!(harmonize(exposure, outcome, HarmonizeAction::DropPalindromic).is_none());
    }

    #[test]
    fn test_ambiguous_palindromic_dropped() {
        let outcome = record("rs1", "C", "G", 0.05, Some(0.45));
        assert!(harmonize(
            record("rs1", "C", "G", 0.1, Some(0.45)),
            outcome.clone(),
            HarmonizeAction::InferFromFrequency
        )
        .is_none());
        assert!(harmonize(
            record("rs1", "C", "G", 0.1, None),
            outcome,
            HarmonizeAction::InferFromFrequency
        )
        .is_none());
    }

    #[test]
    fn test_query_outcome_keeps_exposure_order() {
        let clumped = table(
            "LDL",
            vec![
                record("rs3", "A", "G", 0.3, Some(0.3)),
                record("rs1", "A", "G", 0.1, Some(0.3)),
                record("rs9", "A", "G", 0.2, Some(0.3)),
                record("rs4", "A", "G", 0.2, Some(0.3)),
            ],
        );
        let outcome = table(
            "CAD",
            vec![
                record("rs1", "G", "A", 0.01, Some(0.7)),
                record("rs3", "A", "G", 0.03, Some(0.3)),
                record("rs4", "A", "C", 0.03, Some(0.3)),
            ],
        );

        let (data, report) = query_outcome(&clumped, &outcome, &HarmonizeParams::default()).unwrap();

        let exposure_ids: Vec<_> = data.exposure.records.iter().map(|r| r.snp.clone().unwrap()).collect();
        let outcome_ids: Vec<_> = data.outcome.records.iter().map(|r| r.snp.clone().unwrap()).collect();
        assert_eq!(exposure_ids, vec!["rs3", "rs1"]);
        assert_eq!(outcome_ids, exposure_ids);
        assert_eq!(data.name, "CAD");
        assert_eq!(data.outcome.records[1].beta, Some(-0.01));

        assert_eq!(report.not_in_outcome, 1);
        assert_eq!(report.incompatible, 1);
        assert_eq!(report.allele_flipped, 1);
        assert_eq!(report.harmonized, 2);
    }

    #[test]
    fn test_query_outcome_nothing_shared() {
        let clumped = table("LDL", vec![record("rs1", "A", "G", 0.1, Some(0.3))]);
        let outcome = table("CAD", vec![record("rs2", "A", "G", 0.1, Some(0.3))]);

        match query_outcome(&clumped, &outcome, &HarmonizeParams::default()).unwrap_err() {
            HarmonizeError::NoSharedVariants { exposure, outcome } => {
                assert_eq!(exposure, "LDL");
                assert_eq!(outcome, "CAD");
            }
            other => panic!("Expected NoSharedVariants, got {:?}", other),
        }
    }

    #[test]
    fn test_query_outcome_nothing_compatible() {
        let clumped = table("LDL", vec![record("rs1", "A", "G", 0.1, Some(0.3))]);
        let outcome = table("CAD", vec![record("rs1", "A", "C", 0.1, Some(0.3))]);

        assert!(matches!(
            query_outcome(&clumped, &outcome, &HarmonizeParams::default()),
            Err(HarmonizeError::NoCompatibleVariants { .. })
        ));
    }
}
