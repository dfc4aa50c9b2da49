// ==============================================================================
// preprocess.rs - Summary Statistics Preprocessing
// ==============================================================================
// Description: Fills missing columns from the reference panel and removes
//              invalid, multi-allelic and duplicated variants
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================
// Steps (Fill):
//   1. CHR/POS from the panel when only SNP ids are available
//   2. SNP ids from the panel by CHR/POS (unmatched -> "CHR:POS")
//   3. Upper-case alleles, blank non-ACGT alleles, NEA from the panel
//   4. P outside [0, 1] -> missing
//   5. Odds ratios (explicit or detected) -> log odds
//   6. SE not finite or <= 0 -> missing
//   7. P from BETA/SE, SE from BETA/P when the column was never mapped
//   8. EAF outside [0, 1] -> missing
// Fill_delete additionally removes multi-allelic loci, rows missing a required
// value and duplicated SNP ids (first kept).
// ==============================================================================

use serde::{Deserialize, Serialize};
use statrs::distribution::{ContinuousCDF, Normal};
use std::collections::{HashMap, HashSet};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{EffectColumn, PreprocessingStrategy};
use crate::models::{CanonicalColumn, GenoTable, GwasRecord};
use crate::reference_panel::ReferencePanel;

/// Preprocessing errors
#[derive(Error, Debug)]
pub enum PreprocessError {
    #[error("A reference panel is required to {0}")]
    PanelRequired(&'static str),

    #[error("Statistics error: {0}")]
    Statistics(String),
}

/// Counts of what preprocessing changed
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PreprocessReport {
    pub strategy: String,
    pub input_rows: usize,
    pub output_rows: usize,
    pub filled_coordinates: usize,
    pub filled_snp_ids: usize,
    pub unmatched_snp_ids: usize,
    pub filled_nea: usize,
    pub invalid_alleles: usize,
    pub invalid_p: usize,
    pub log_transformed_effects: bool,
    pub invalid_effects: usize,
    pub invalid_se: usize,
    pub filled_p: usize,
    pub filled_se: usize,
    pub invalid_eaf: usize,
    pub removed_multiallelic: usize,
    pub removed_missing: usize,
    pub removed_duplicates: usize,
}

/// Whether preprocessing `table` with `strategy` has to consult the panel
pub fn needs_panel(table: &GenoTable, strategy: PreprocessingStrategy) -> bool {
    if !strategy.fills() {
        return false;
    }
    let has = |c| table.has_column(c);
    let coordinates = has(CanonicalColumn::Chr) && has(CanonicalColumn::Pos);

    (!coordinates && has(CanonicalColumn::Snp))
        || (!has(CanonicalColumn::Snp) && coordinates)
        || (!has(CanonicalColumn::Nea) && has(CanonicalColumn::Ea))
}

/// Preprocess a standardized table
///
/// # Arguments
/// * `table` - Standardized table (consumed)
/// * `strategy` - `None`, `Fill` or `Fill_delete`
/// * `effect_column` - Scale of the BETA column
/// * `panel` - Reference panel, required when `needs_panel` is true
pub fn preprocess(
    mut table: GenoTable,
    strategy: PreprocessingStrategy,
    effect_column: EffectColumn,
    panel: Option<&ReferencePanel>,
) -> Result<(GenoTable, PreprocessReport), PreprocessError> {
    let mut report = PreprocessReport {
        strategy: strategy.to_string(),
        input_rows: table.len(),
        ..Default::default()
    };

    if !strategy.fills() {
        report.output_rows = table.len();
        return Ok((table, report));
    }

    fill_coordinates(&mut table, panel, &mut report)?;
    fill_snp_ids(&mut table, panel, &mut report)?;
    clean_alleles(&mut table, panel, &mut report)?;
    clean_p_values(&mut table, &mut report);
    clean_effects(&mut table, effect_column, &mut report);
    clean_standard_errors(&mut table, &mut report);
    fill_statistics(&mut table, &mut report)?;
    clean_frequencies(&mut table, &mut report);

    if strategy.deletes() {
        remove_multiallelic(&mut table, &mut report);
        remove_missing(&mut table, &mut report);
        remove_duplicates(&mut table, &mut report);
    }

    report.output_rows = table.len();
    info!(
        "Preprocessed {} ({}): {} -> {} variants",
        table.label, report.strategy, report.input_rows, report.output_rows
    );

    Ok((table, report))
}

fn require<'a>(panel: Option<&'a ReferencePanel>, purpose: &'static str) -> Result<&'a ReferencePanel, PreprocessError> {
    panel.ok_or(PreprocessError::PanelRequired(purpose))
}

fn fill_coordinates(
    table: &mut GenoTable,
    panel: Option<&ReferencePanel>,
    report: &mut PreprocessReport,
) -> Result<(), PreprocessError> {
    if table.has_column(CanonicalColumn::Chr) && table.has_column(CanonicalColumn::Pos) {
        return Ok(());
    }
    if !table.has_column(CanonicalColumn::Snp) {
        return Ok(());
    }

    let panel = require(panel, "fill CHR/POS from SNP ids")?;
    for record in &mut table.records {
        let Some(variant) = record.snp.as_deref().and_then(|snp| panel.by_rsid(snp)) else {
            continue;
        };
        if record.chr.is_none() || record.pos.is_none() {
            record.chr = Some(variant.chromosome);
            record.pos = Some(variant.position);
            report.filled_coordinates += 1;
        }
    }

    table.columns.insert(CanonicalColumn::Chr);
    table.columns.insert(CanonicalColumn::Pos);
    info!("{}: filled CHR/POS for {} variants from the reference panel", table.label, report.filled_coordinates);
    Ok(())
}

fn fill_snp_ids(
    table: &mut GenoTable,
    panel: Option<&ReferencePanel>,
    report: &mut PreprocessReport,
) -> Result<(), PreprocessError> {
    if table.has_column(CanonicalColumn::Snp) {
        return Ok(());
    }
    if !(table.has_column(CanonicalColumn::Chr) && table.has_column(CanonicalColumn::Pos)) {
        return Ok(());
    }

    let panel = require(panel, "fill SNP ids from CHR/POS")?;
    for record in &mut table.records {
        let Some((chr, pos)) = record.locus() else {
            continue;
        };

        let candidates = panel.at_locus(chr, pos);
        // Prefer the panel variant carrying the record's alleles at multi-allelic sites
        let matched = candidates
            .iter()
            .find(|v| alleles_match(record, &v.allele1, &v.allele2))
            .or_else(|| candidates.first());

        match matched {
            Some(variant) => {
                record.snp = Some(variant.rsid.clone());
                report.filled_snp_ids += 1;
            }
            None => {
                record.snp = Some(format!("{}:{}", chr, pos));
                report.unmatched_snp_ids += 1;
            }
        }
    }

    table.columns.insert(CanonicalColumn::Snp);
    info!(
        "{}: filled {} SNP ids from the reference panel ({} not in panel)",
        table.label, report.filled_snp_ids, report.unmatched_snp_ids
    );
    Ok(())
}

fn alleles_match(record: &GwasRecord, allele1: &str, allele2: &str) -> bool {
    let ea = record.ea.as_deref().map(str::to_ascii_uppercase);
    let nea = record.nea.as_deref().map(str::to_ascii_uppercase);
    match (ea.as_deref(), nea.as_deref()) {
        (Some(ea), Some(nea)) => (ea == allele1 && nea == allele2) || (ea == allele2 && nea == allele1),
        (Some(ea), None) => ea == allele1 || ea == allele2,
        _ => false,
    }
}

/// Upper-case allele made only of A/C/G/T, `None` otherwise
pub fn normalize_allele(allele: &str) -> Option<String> {
    let upper = allele.trim().to_ascii_uppercase();
    let valid = !upper.is_empty() && upper.chars().all(|c| matches!(c, 'A' | 'C' | 'G' | 'T'));
    valid.then_some(upper)
}

fn clean_alleles(
    table: &mut GenoTable,
    panel: Option<&ReferencePanel>,
    report: &mut PreprocessReport,
) -> Result<(), PreprocessError> {
    for record in &mut table.records {
        for allele in [&mut record.ea, &mut record.nea] {
            if let Some(raw) = allele.take() {
                *allele = normalize_allele(&raw);
                if allele.is_none() {
                    report.invalid_alleles += 1;
                }
            }
        }
    }

    if table.has_column(CanonicalColumn::Ea) && !table.has_column(CanonicalColumn::Nea) {
        let panel = require(panel, "fill NEA from the effect allele")?;
        for record in &mut table.records {
            let Some(ea) = record.ea.as_deref() else {
                continue;
            };
            let variant = record
                .snp
                .as_deref()
                .and_then(|snp| panel.by_rsid(snp))
                .or_else(|| {
                    record
                        .locus()
                        .and_then(|(chr, pos)| panel.at_locus(chr, pos).into_iter().next())
                });

            let nea = variant.and_then(|v| {
                if v.allele1 == ea {
                    Some(v.allele2.clone())
                } else if v.allele2 == ea {
                    Some(v.allele1.clone())
                } else {
                    None
                }
            });

            if nea.is_some() {
                report.filled_nea += 1;
            }
            record.nea = nea;
        }
        table.columns.insert(CanonicalColumn::Nea);
        info!("{}: filled NEA for {} variants from the reference panel", table.label, report.filled_nea);
    }

    if report.invalid_alleles > 0 {
        debug!("{}: {} invalid allele values blanked", table.label, report.invalid_alleles);
    }
    Ok(())
}

fn clean_p_values(table: &mut GenoTable, report: &mut PreprocessReport) {
    for record in &mut table.records {
        if record.p.is_some_and(|p| !(0.0..=1.0).contains(&p)) {
            record.p = None;
            report.invalid_p += 1;
        }
    }
}

/// Median of the available effect values
fn median(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    Some(if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    })
}

fn clean_effects(table: &mut GenoTable, effect_column: EffectColumn, report: &mut PreprocessReport) {
    if !table.has_column(CanonicalColumn::Beta) {
        return;
    }

    let odds_ratio = match effect_column {
        EffectColumn::Beta => false,
        EffectColumn::OddsRatio => true,
        EffectColumn::Auto => {
            let mut values: Vec<f64> = table.records.iter().filter_map(|r| r.beta).collect();
            match median(&mut values) {
                Some(m) if (m - 1.0).abs() < m.abs() => {
                    warn!(
                        "{}: median effect {:.3} is closer to 1 than 0, treating BETA as odds ratios",
                        table.label, m
                    );
                    true
                }
                _ => false,
            }
        }
    };

    if !odds_ratio {
        return;
    }

    report.log_transformed_effects = true;
    for record in &mut table.records {
        if let Some(or) = record.beta {
            if or > 0.0 {
                record.beta = Some(or.ln());
            } else {
                record.beta = None;
                report.invalid_effects += 1;
            }
        }
    }
}

fn clean_standard_errors(table: &mut GenoTable, report: &mut PreprocessReport) {
    for record in &mut table.records {
        if record.se.is_some_and(|se| !(se.is_finite() && se > 0.0)) {
            record.se = None;
            report.invalid_se += 1;
        }
    }
}

fn fill_statistics(table: &mut GenoTable, report: &mut PreprocessReport) -> Result<(), PreprocessError> {
    let has_beta = table.has_column(CanonicalColumn::Beta);
    let fill_p = !table.has_column(CanonicalColumn::P) && has_beta && table.has_column(CanonicalColumn::Se);
    let fill_se = !table.has_column(CanonicalColumn::Se) && has_beta && table.has_column(CanonicalColumn::P);
    if !(fill_p || fill_se) {
        return Ok(());
    }

    let normal = Normal::new(0.0, 1.0).map_err(|e| PreprocessError::Statistics(e.to_string()))?;

    for record in &mut table.records {
        if fill_p {
            if let Some(p) = p_from_z(&normal, record.beta, record.se) {
                record.p = Some(p);
                report.filled_p += 1;
            }
        }
        if fill_se {
            if let Some(se) = se_from_p(&normal, record.beta, record.p) {
                record.se = Some(se);
                report.filled_se += 1;
            }
        }
    }

    if fill_p {
        table.columns.insert(CanonicalColumn::P);
        info!("{}: computed P from BETA/SE for {} variants", table.label, report.filled_p);
    }
    if fill_se {
        table.columns.insert(CanonicalColumn::Se);
        info!("{}: computed SE from BETA/P for {} variants", table.label, report.filled_se);
    }
    Ok(())
}

/// Two-sided p-value of z = beta / se
fn p_from_z(normal: &Normal, beta: Option<f64>, se: Option<f64>) -> Option<f64> {
    let z = beta? / se?;
    z.is_finite().then(|| 2.0 * normal.sf(z.abs()))
}

/// SE such that |beta| / se reproduces the two-sided p-value
fn se_from_p(normal: &Normal, beta: Option<f64>, p: Option<f64>) -> Option<f64> {
    let (beta, p) = (beta?, p?);
    if !(p > 0.0 && p < 1.0) {
        return None;
    }
    let z = -normal.inverse_cdf(p / 2.0);
    let se = beta.abs() / z;
    (se.is_finite() && se > 0.0).then_some(se)
}

fn clean_frequencies(table: &mut GenoTable, report: &mut PreprocessReport) {
    for record in &mut table.records {
        if record.eaf.is_some_and(|eaf| !(0.0..=1.0).contains(&eaf)) {
            record.eaf = None;
            report.invalid_eaf += 1;
        }
    }
}

fn remove_multiallelic(table: &mut GenoTable, report: &mut PreprocessReport) {
    let mut counts: HashMap<(u8, u64), usize> = HashMap::new();
    for locus in table.records.iter().filter_map(|r| r.locus()) {
        *counts.entry(locus).or_default() += 1;
    }

    let before = table.len();
    table
        .records
        .retain(|r| r.locus().map_or(true, |locus| counts[&locus] == 1));
    report.removed_multiallelic = before - table.len();

    if report.removed_multiallelic > 0 {
        info!(
            "{}: deleted {} variants at multi-allelic positions",
            table.label, report.removed_multiallelic
        );
    }
}

fn remove_missing(table: &mut GenoTable, report: &mut PreprocessReport) {
    let required: Vec<CanonicalColumn> = CanonicalColumn::REQUIRED
        .iter()
        .copied()
        .filter(|c| table.has_column(*c))
        .collect();

    let before = table.len();
    table.records.retain(|r| required.iter().all(|c| r.has(*c)));
    report.removed_missing = before - table.len();

    if report.removed_missing > 0 {
        info!(
            "{}: deleted {} variants with missing or invalid values",
            table.label, report.removed_missing
        );
    }
}

fn remove_duplicates(table: &mut GenoTable, report: &mut PreprocessReport) {
    let mut seen: HashSet<String> = HashSet::with_capacity(table.len());
    let before = table.len();
    table.records.retain(|r| match &r.snp {
        Some(snp) => seen.insert(snp.clone()),
        None => true,
    });
    report.removed_duplicates = before - table.len();

    if report.removed_duplicates > 0 {
        info!("{}: deleted {} duplicated SNP ids", table.label, report.removed_duplicates);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference_panel::test_support::{variant, write_panel};
    use std::collections::BTreeSet;
    use tempfile::tempdir;

    fn record(chr: u8, pos: u64, ea: &str, nea: &str, beta: f64, se: f64, p: f64) -> GwasRecord {
        GwasRecord {
            snp: None,
            chr: Some(chr),
            pos: Some(pos),
            ea: Some(ea.to_string()),
            nea: Some(nea.to_string()),
            beta: Some(beta),
            se: Some(se),
            p: Some(p),
            eaf: Some(0.3),
        }
    }

    fn columns(cols: &[CanonicalColumn]) -> BTreeSet<CanonicalColumn> {
        cols.iter().copied().collect()
    }

    fn without_snp() -> BTreeSet<CanonicalColumn> {
        CanonicalColumn::ALL
            .iter()
            .copied()
            .filter(|c| *c != CanonicalColumn::Snp)
            .collect()
    }

    fn open_panel(dir: &std::path::Path) -> ReferencePanel {
        let bed = write_panel(
            dir,
            "EUR_37",
            &[
                variant(1, "rs100", 100, ("A", "G"), &[0, 1, 2, 1]),
                variant(1, "rs200", 200, ("C", "T"), &[0, 1, 2, 1]),
                variant(1, "rs300a", 300, ("A", "C"), &[0, 1, 2, 1]),
                variant(1, "rs300b", 300, ("A", "T"), &[0, 1, 2, 1]),
            ],
        );
        ReferencePanel::from_fileset("EUR_37".parse().unwrap(), &bed).unwrap()
    }

    #[test]
    fn test_strategy_none_is_identity() {
        let table = GenoTable::new("T", vec![record(1, 100, "x", "g", 0.1, -1.0, 2.0)], without_snp());
        let (out, report) = preprocess(table, PreprocessingStrategy::None, EffectColumn::Beta, None).unwrap();

        assert_eq!(out.records[0].ea.as_deref(), Some("x"));
        assert_eq!(out.records[0].p, Some(2.0));
        assert_eq!(report.output_rows, 1);
    }

    #[test]
    fn test_needs_panel() {
        let table = GenoTable::new("T", vec![], without_snp());
        assert!(needs_panel(&table, PreprocessingStrategy::FillDelete));
        assert!(!needs_panel(&table, PreprocessingStrategy::None));

        let full = GenoTable::new("T", vec![], CanonicalColumn::ALL.iter().copied().collect());
        assert!(!needs_panel(&full, PreprocessingStrategy::FillDelete));
    }

    #[test]
    fn test_missing_panel_is_an_error() {
        let table = GenoTable::new("T", vec![record(1, 100, "A", "G", 0.1, 0.01, 1e-9)], without_snp());
        let result = preprocess(table, PreprocessingStrategy::Fill, EffectColumn::Beta, None);
        assert!(matches!(result, Err(PreprocessError::PanelRequired(_))));
    }

    #[test]
    fn test_fill_snp_ids_from_panel() {
        let dir = tempdir().unwrap();
        let panel = open_panel(dir.path());

        let table = GenoTable::new(
            "LDL",
            vec![
                record(1, 100, "g", "a", 0.1, 0.01, 1e-9),
                record(1, 300, "T", "A", 0.1, 0.01, 1e-9),
                record(2, 999, "A", "G", 0.1, 0.01, 1e-9),
            ],
            without_snp(),
        );

        let (out, report) = preprocess(table, PreprocessingStrategy::Fill, EffectColumn::Beta, Some(&panel)).unwrap();

        assert_eq!(out.records[0].snp.as_deref(), Some("rs100"));
        assert_eq!(out.records[0].ea.as_deref(), Some("G"));
        // Multi-allelic panel site resolved by alleles
        assert_eq!(out.records[1].snp.as_deref(), Some("rs300b"));
        assert_eq!(out.records[2].snp.as_deref(), Some("2:999"));
        assert_eq!(report.filled_snp_ids, 2);
        assert_eq!(report.unmatched_snp_ids, 1);
        assert!(out.has_column(CanonicalColumn::Snp));
    }

    #[test]
    fn test_fill_coordinates_and_nea() {
        let dir = tempdir().unwrap();
        let panel = open_panel(dir.path());

        let records = vec![
            GwasRecord {
                snp: Some("rs200".to_string()),
                ea: Some("t".to_string()),
                beta: Some(0.2),
                se: Some(0.02),
                p: Some(1e-20),
                ..Default::default()
            },
            GwasRecord {
                snp: Some("rs100".to_string()),
                ea: Some("C".to_string()),
                beta: Some(0.2),
                se: Some(0.02),
                p: Some(1e-20),
                ..Default::default()
            },
        ];
        let table = GenoTable::new(
            "T",
            records,
            columns(&[
                CanonicalColumn::Snp,
                CanonicalColumn::Ea,
                CanonicalColumn::Beta,
                CanonicalColumn::Se,
                CanonicalColumn::P,
            ]),
        );

        let (out, report) =
            preprocess(table, PreprocessingStrategy::FillDelete, EffectColumn::Beta, Some(&panel)).unwrap();

        assert_eq!(report.filled_coordinates, 2);
        assert_eq!(report.filled_nea, 1);
        // rs100 has alleles A/G, so effect allele C cannot be placed and the row is deleted
        assert_eq!(out.len(), 1);
        assert_eq!(out.records[0].locus(), Some((1, 200)));
        assert_eq!(out.records[0].nea.as_deref(), Some("C"));
    }

    #[test]
    fn test_fill_delete_removes_invalid_rows() {
        let mut records = vec![
            record(1, 10, "A", "G", 0.1, 0.01, 1e-9),
            record(1, 20, "A", "N", 0.1, 0.01, 1e-9),  // invalid allele
            record(1, 30, "A", "G", 0.1, 0.0, 1e-9),   // invalid SE
            record(1, 40, "A", "G", 0.1, 0.01, 1.5),   // invalid P
            record(1, 50, "A", "G", 0.1, 0.01, 1e-9),  // multi-allelic
            record(1, 50, "A", "C", 0.1, 0.01, 1e-9),  // multi-allelic
            record(1, 60, "A", "G", 0.1, 0.01, 1e-9),  // duplicate id
        ];
        for (i, r) in records.iter_mut().enumerate() {
            r.snp = Some(format!("rs{}", i));
        }
        records[6].snp = Some("rs0".to_string());
        records[0].eaf = Some(1.2);

        let table = GenoTable::new("T", records, CanonicalColumn::ALL.iter().copied().collect());
        let (out, report) = preprocess(table, PreprocessingStrategy::FillDelete, EffectColumn::Beta, None).unwrap();

        assert_eq!(out.len(), 1);
        assert_eq!(out.records[0].snp.as_deref(), Some("rs0"));
        // EAF is blanked but never a deletion reason
        assert_eq!(out.records[0].eaf, None);
        assert_eq!(report.invalid_eaf, 1);
        assert_eq!(report.removed_multiallelic, 2);
        assert_eq!(report.removed_missing, 3);
        assert_eq!(report.removed_duplicates, 1);
        assert_eq!(report.input_rows, 7);
        assert_eq!(report.output_rows, 1);
    }

    #[test]
    fn test_fill_keeps_rows() {
        let mut bad = record(1, 20, "A", "G", 0.1, 0.01, 7.0);
        bad.snp = Some("rs2".to_string());
        let table = GenoTable::new("T", vec![bad], CanonicalColumn::ALL.iter().copied().collect());

        let (out, report) = preprocess(table, PreprocessingStrategy::Fill, EffectColumn::Beta, None).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(out.records[0].p, None);
        assert_eq!(report.invalid_p, 1);
    }

    #[test]
    fn test_odds_ratio_detection() {
        let mut records: Vec<GwasRecord> = [1.1, 0.9, 1.05, -1.0]
            .iter()
            .enumerate()
            .map(|(i, &or)| {
                let mut r = record(1, 10 * (i as u64 + 1), "A", "G", or, 0.01, 1e-9);
                r.snp = Some(format!("rs{}", i));
                r
            })
            .collect();
        records[3].beta = Some(-1.0);

        let table = GenoTable::new("CAD", records, CanonicalColumn::ALL.iter().copied().collect());
        let (out, report) = preprocess(table, PreprocessingStrategy::Fill, EffectColumn::Auto, None).unwrap();

        assert!(report.log_transformed_effects);
        assert_eq!(report.invalid_effects, 1);
        assert!((out.records[0].beta.unwrap() - 1.1f64.ln()).abs() < 1e-12);
        assert_eq!(out.records[3].beta, None);
    }

    #[test]
    fn test_beta_not_mistaken_for_odds_ratio() {
        let records = vec![
            record(1, 10, "A", "G", 0.02, 0.01, 1e-9),
            record(1, 20, "A", "G", -0.05, 0.01, 1e-9),
        ];
        let table = GenoTable::new("T", records, without_snp());
        let dir = tempdir().unwrap();
        let panel = open_panel(dir.path());
        let (out, report) = preprocess(table, PreprocessingStrategy::Fill, EffectColumn::Auto, Some(&panel)).unwrap();

        assert!(!report.log_transformed_effects);
        assert_eq!(out.records[0].beta, Some(0.02));
    }

    #[test]
    fn test_fill_p_and_se() {
        let normal = Normal::new(0.0, 1.0).unwrap();

        // z = 1.959964 gives two-sided p of 0.05
        let p = p_from_z(&normal, Some(1.959964), Some(1.0)).unwrap();
        assert!((p - 0.05).abs() < 1e-6);

        let se = se_from_p(&normal, Some(-0.2), Some(0.05)).unwrap();
        assert!((se - 0.2 / 1.959964).abs() < 1e-6);

        assert_eq!(se_from_p(&normal, Some(0.2), Some(1.0)), None);
        assert_eq!(p_from_z(&normal, Some(0.2), None), None);
    }

    #[test]
    fn test_fill_p_column_when_unmapped() {
        let mut r = record(1, 10, "A", "G", 0.5, 0.1, 0.0);
        r.p = None;
        r.snp = Some("rs1".to_string());
        let cols = columns(&[
            CanonicalColumn::Snp,
            CanonicalColumn::Chr,
            CanonicalColumn::Pos,
            CanonicalColumn::Ea,
            CanonicalColumn::Nea,
            CanonicalColumn::Beta,
            CanonicalColumn::Se,
        ]);

        let table = GenoTable::new("T", vec![r], cols);
        let (out, report) = preprocess(table, PreprocessingStrategy::FillDelete, EffectColumn::Beta, None).unwrap();

        assert_eq!(report.filled_p, 1);
        assert!(out.has_column(CanonicalColumn::P));
        let p = out.records[0].p.unwrap();
        assert!(p > 0.0 && p < 1e-6);
    }

    #[test]
    fn test_normalize_allele() {
        assert_eq!(normalize_allele(" a "), Some("A".to_string()));
        assert_eq!(normalize_allele("acgt"), Some("ACGT".to_string()));
        assert_eq!(normalize_allele("D"), None);
        assert_eq!(normalize_allele("<DEL>"), None);
        assert_eq!(normalize_allele(""), None);
    }

    #[test]
    fn test_median() {
        assert_eq!(median(&mut [3.0, 1.0, 2.0]), Some(2.0));
        assert_eq!(median(&mut [4.0, 1.0, 2.0, 3.0]), Some(2.5));
        assert_eq!(median(&mut []), None);
    }
}
