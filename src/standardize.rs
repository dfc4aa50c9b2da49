// ==============================================================================
// standardize.rs - Column Standardization
// ==============================================================================
// Description: Maps source-specific summary statistics columns onto the
//              canonical schema (SNP, CHR, POS, EA, NEA, BETA, SE, P, EAF)
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================

use std::collections::BTreeSet;
use thiserror::Error;
use tracing::debug;

use crate::models::{CanonicalColumn, ColumnMapping, GenoTable, GwasRecord};
use crate::parsers::{chromosome_code, RawGwasTable};

/// Errors that can occur while standardizing a table
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StandardizeError {
    #[error("Column '{source_column}' mapped to {canonical} not found in header (available: {available})")]
    MissingColumn {
        canonical: &'static str,
        source_column: String,
        available: String,
    },

    #[error("Column mapping is empty")]
    EmptyMapping,
}

impl ColumnMapping {
    /// Build a standardized table from a raw table
    ///
    /// Only mapped columns are kept. Values that do not coerce to the canonical
    /// type become missing; range checks are left to preprocessing.
    pub fn standardize(&self, table: &RawGwasTable, label: &str) -> Result<GenoTable, StandardizeError> {
        let mapped = self.mapped();
        if mapped.is_empty() {
            return Err(StandardizeError::EmptyMapping);
        }

        let mut indices: Vec<(CanonicalColumn, usize)> = Vec::with_capacity(mapped.len());
        for (canonical, source) in mapped {
            let index = table
                .column_index(source)
                .ok_or_else(|| StandardizeError::MissingColumn {
                    canonical: canonical.as_str(),
                    source_column: source.to_string(),
                    available: table.headers.iter().collect::<Vec<_>>().join(", "),
                })?;
            indices.push((canonical, index));
        }

        let records = table
            .rows
            .iter()
            .map(|row| {
                let mut record = GwasRecord::default();
                for &(canonical, index) in &indices {
                    let value = row.get(index).unwrap_or("");
                    assign(&mut record, canonical, value);
                }
                record
            })
            .collect::<Vec<_>>();

        let columns: BTreeSet<CanonicalColumn> = indices.iter().map(|(c, _)| *c).collect();
        debug!(
            "Standardized {} rows for {} ({} canonical columns)",
            records.len(),
            label,
            columns.len()
        );

        Ok(GenoTable::new(label, records, columns))
    }
}

fn assign(record: &mut GwasRecord, column: CanonicalColumn, value: &str) {
    match column {
        CanonicalColumn::Snp => record.snp = parse_text(value),
        CanonicalColumn::Chr => record.chr = chromosome_code(value),
        CanonicalColumn::Pos => record.pos = parse_position(value),
        CanonicalColumn::Ea => record.ea = parse_text(value),
        CanonicalColumn::Nea => record.nea = parse_text(value),
        CanonicalColumn::Beta => record.beta = parse_number(value),
        CanonicalColumn::Se => record.se = parse_number(value),
        CanonicalColumn::P => record.p = parse_number(value),
        CanonicalColumn::Eaf => record.eaf = parse_number(value),
    }
}

fn is_missing(value: &str) -> bool {
    matches!(value, "" | "." | "NA" | "na" | "NaN" | "nan" | "null" | "NULL")
}

fn parse_text(value: &str) -> Option<String> {
    let value = value.trim();
    (!is_missing(value)).then(|| value.to_string())
}

fn parse_number(value: &str) -> Option<f64> {
    let value = value.trim();
    if is_missing(value) {
        return None;
    }
    value.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Positions sometimes arrive as floats ("55505647.0") after round-trips
/// through spreadsheet tools
fn parse_position(value: &str) -> Option<u64> {
    let value = value.trim();
    value.parse::<u64>().ok().or_else(|| {
        parse_number(value)
            .filter(|v| *v >= 0.0 && v.fract() == 0.0)
            .map(|v| v as u64)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use csv::StringRecord;

    fn raw_table(headers: &[&str], rows: &[&[&str]]) -> RawGwasTable {
        RawGwasTable {
            headers: StringRecord::from(headers.to_vec()),
            rows: rows.iter().map(|r| StringRecord::from(r.to_vec())).collect(),
        }
    }

    #[test]
    fn test_standardize_metal_layout() {
        let table = raw_table(
            &["MarkerName", "CHR", "BP", "Allele1", "Allele2", "Effect", "StdErr", "P-value", "Freq1"],
            &[
                &["rs1", "1", "100", "a", "g", "0.1", "0.01", "1e-10", "0.3"],
                &["rs2", "chrX", "200.0", "C", "T", "NA", "0.05", "0.2", "."],
            ],
        );

        let geno = ColumnMapping::metal().standardize(&table, "CAD").unwrap();

        assert_eq!(geno.label, "CAD");
        assert_eq!(geno.len(), 2);
        // MarkerName is not mapped, so it is dropped
        assert!(!geno.has_column(CanonicalColumn::Snp));
        assert!(geno.has_column(CanonicalColumn::Eaf));
        assert_eq!(geno.records[0].snp, None);

        let first = &geno.records[0];
        assert_eq!(first.chr, Some(1));
        assert_eq!(first.pos, Some(100));
        assert_eq!(first.ea.as_deref(), Some("a"));
        assert_eq!(first.p, Some(1e-10));

        let second = &geno.records[1];
        assert_eq!(second.chr, Some(23));
        assert_eq!(second.pos, Some(200));
        assert_eq!(second.beta, None);
        assert_eq!(second.eaf, None);
    }

    #[test]
    fn test_standardize_missing_column() {
        let table = raw_table(&["chromosome", "beta"], &[&["1", "0.1"]]);

        match ColumnMapping::gwas_catalog().standardize(&table, "LDL").unwrap_err() {
            StandardizeError::MissingColumn { canonical, source_column, available } => {
                assert_eq!(canonical, "POS");
                assert_eq!(source_column, "base_pair_location");
                assert_eq!(available, "chromosome, beta");
            }
            other => panic!("Expected MissingColumn, got {:?}", other),
        }
    }

    #[test]
    fn test_standardize_empty_mapping() {
        let table = raw_table(&["a"], &[&["1"]]);
        assert_eq!(
            ColumnMapping::default().standardize(&table, "X").unwrap_err(),
            StandardizeError::EmptyMapping
        );
    }

    #[test]
    fn test_unparseable_values_become_missing() {
        let mut mapping = ColumnMapping::default();
        mapping.set(CanonicalColumn::Pos, "pos");
        mapping.set(CanonicalColumn::P, "p");
        mapping.set(CanonicalColumn::Chr, "chr");

        let table = raw_table(&["chr", "pos", "p"], &[&["0", "-5", "inf"], &["22", "1.5", "abc"]]);
        let geno = mapping.standardize(&table, "T").unwrap();

        for record in &geno.records {
            assert_eq!(record.pos, None);
            assert_eq!(record.p, None);
        }
        assert_eq!(geno.records[0].chr, None);
        assert_eq!(geno.records[1].chr, Some(22));
    }
}
