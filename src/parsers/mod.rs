// ==============================================================================
// parsers/mod.rs - File parser modules
// ==============================================================================
// Description: Parsers for summary statistics tables and PLINK reference panels
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================

pub mod gwas;
pub mod plink;

pub use gwas::{GwasLoader, GwasParseError, RawGwasTable};
pub use plink::{BedReader, BimFile, BimRecord, PlinkParseError};

/// Numeric chromosome code in PLINK convention: "1"-"22", X=23, Y=24, XY=25, MT=26
/// (with or without a "chr" prefix)
pub fn chromosome_code(value: &str) -> Option<u8> {
    let value = value.trim();
    let stripped = value
        .strip_prefix("chr")
        .or_else(|| value.strip_prefix("CHR"))
        .unwrap_or(value);

    match stripped.to_ascii_uppercase().as_str() {
        "X" | "23" => Some(23),
        "Y" | "24" => Some(24),
        "XY" | "25" => Some(25),
        "MT" | "M" | "26" => Some(26),
        other => other
            .parse::<u8>()
            .ok()
            .filter(|n| (1..=22).contains(n)),
    }
}
