// ==============================================================================
// plink.rs - PLINK 1 Binary Fileset Parser
// ==============================================================================
// Description: Reads .bim variant tables, .fam sample lists and SNP-major .bed
//              genotype matrices used as LD reference panels
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================
// References:
// - PLINK 1 binary format: https://www.cog-genomics.org/plink/1.9/formats#bed
// ==============================================================================
// .bed layout:
//   bytes 0-2   magic 0x6c 0x1b 0x01 (SNP-major)
//   then one block of ceil(n_samples / 4) bytes per variant, 2 bits per
//   sample, low bits first:
//     00 = homozygous allele1   (2 copies of allele1)
//     01 = missing
//     10 = heterozygous         (1 copy)
//     11 = homozygous allele2   (0 copies)
// ==============================================================================

use std::fs::File;
use std::io::{BufRead, BufReader, Read, Seek, SeekFrom};
use std::path::Path;
use thiserror::Error;

use super::chromosome_code;

pub const BED_MAGIC: [u8; 3] = [0x6c, 0x1b, 0x01];

/// One variant line from a .bim file
#[derive(Debug, Clone, PartialEq)]
pub struct BimRecord {
    /// Row index in the fileset (also the variant's block index in .bed)
    pub index: usize,
    pub chromosome: u8,
    pub rsid: String,
    pub position: u64,
    /// Allele counted by .bed dosages
    pub allele1: String,
    pub allele2: String,
}

/// Parsed .bim file
#[derive(Debug, Clone, Default)]
pub struct BimFile {
    /// Variants on recognised chromosomes
    pub records: Vec<BimRecord>,
    /// Total row count, including skipped rows (the .bed variant count)
    pub rows: usize,
}

/// Errors that can occur while reading a PLINK fileset
#[derive(Error, Debug)]
pub enum PlinkParseError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid .bim line {line}: {details}")]
    InvalidBimLine { line: usize, details: String },

    #[error("Not a SNP-major PLINK .bed file (magic {0:02x?})")]
    InvalidBedMagic(Vec<u8>),

    #[error(".bed size mismatch: expected {expected} bytes, found {actual}")]
    TruncatedBed { expected: u64, actual: u64 },

    #[error("Variant index {index} out of range ({count} variants)")]
    VariantOutOfRange { index: usize, count: usize },
}

/// Parse a .bim file
///
/// Variants on chromosomes outside the PLINK coding (e.g. "0" for unplaced)
/// are skipped, but every record keeps its original row index so .bed lookups
/// stay aligned.
pub fn parse_bim(path: impl AsRef<Path>) -> Result<BimFile, PlinkParseError> {
    let reader = BufReader::new(File::open(path.as_ref())?);
    let mut records = Vec::new();
    let mut rows = 0;

    for (index, line_result) in reader.lines().enumerate() {
        let line = line_result?;
        rows = index + 1;
        let fields: Vec<&str> = line.split_whitespace().collect();

        if fields.len() != 6 {
            return Err(PlinkParseError::InvalidBimLine {
                line: index + 1,
                details: format!("Expected 6 fields, found {}", fields.len()),
            });
        }

        let position = fields[3].parse::<u64>().map_err(|_| PlinkParseError::InvalidBimLine {
            line: index + 1,
            details: format!("Invalid position '{}'", fields[3]),
        })?;

        let Some(chromosome) = chromosome_code(fields[0]) else {
            continue;
        };

        records.push(BimRecord {
            index,
            chromosome,
            rsid: fields[1].to_string(),
            position,
            allele1: fields[4].to_ascii_uppercase(),
            allele2: fields[5].to_ascii_uppercase(),
        });
    }

    Ok(BimFile { records, rows })
}

/// Count samples in a .fam file (one non-empty line per sample)
pub fn count_fam_samples(path: impl AsRef<Path>) -> Result<usize, PlinkParseError> {
    let reader = BufReader::new(File::open(path.as_ref())?);
    let mut count = 0;
    for line in reader.lines() {
        if !line?.trim().is_empty() {
            count += 1;
        }
    }
    Ok(count)
}

/// Random-access reader for SNP-major .bed genotype blocks
#[derive(Debug)]
pub struct BedReader {
    file: File,
    n_samples: usize,
    n_variants: usize,
    block_size: usize,
}

impl BedReader {
    /// Open a .bed file and check its magic number and size
    ///
    /// # Arguments
    /// * `path` - Path to the .bed file
    /// * `n_samples` - Sample count from the matching .fam
    /// * `n_variants` - Row count of the matching .bim (including skipped rows)
    pub fn open(path: impl AsRef<Path>, n_samples: usize, n_variants: usize) -> Result<Self, PlinkParseError> {
        let mut file = File::open(path.as_ref())?;

        let mut magic = [0u8; 3];
        file.read_exact(&mut magic)?;
        if magic != BED_MAGIC {
            return Err(PlinkParseError::InvalidBedMagic(magic.to_vec()));
        }

        let block_size = n_samples.div_ceil(4);
        let expected = (BED_MAGIC.len() + block_size * n_variants) as u64;
        let actual = file.metadata()?.len();
        if actual != expected {
            return Err(PlinkParseError::TruncatedBed { expected, actual });
        }

        Ok(Self {
            file,
            n_samples,
            n_variants,
            block_size,
        })
    }

    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    pub fn n_variants(&self) -> usize {
        self.n_variants
    }

    /// Allele1 dosages (0, 1, 2) per sample for one variant, `None` if missing
    pub fn read_dosages(&mut self, index: usize) -> Result<Vec<Option<u8>>, PlinkParseError> {
        if index >= self.n_variants {
            return Err(PlinkParseError::VariantOutOfRange {
                index,
                count: self.n_variants,
            });
        }

        let offset = (BED_MAGIC.len() + index * self.block_size) as u64;
        let mut block = vec![0u8; self.block_size];
        self.file.seek(SeekFrom::Start(offset))?;
        self.file.read_exact(&mut block)?;

        Ok(decode_block(&block, self.n_samples))
    }
}

/// Decode one packed .bed block into allele1 dosages
pub fn decode_block(block: &[u8], n_samples: usize) -> Vec<Option<u8>> {
    (0..n_samples)
        .map(|i| {
            let code = (block[i / 4] >> ((i % 4) * 2)) & 0b11;
            match code {
                0b00 => Some(2),
                0b10 => Some(1),
                0b11 => Some(0),
                _ => None,
            }
        })
        .collect()
}

/// Pack allele1 dosages into a .bed block (inverse of `decode_block`)
pub fn encode_block(dosages: &[Option<u8>]) -> Vec<u8> {
    let mut block = vec![0u8; dosages.len().div_ceil(4)];
    for (i, dosage) in dosages.iter().enumerate() {
        let code = match dosage {
            Some(2) => 0b00,
            Some(1) => 0b10,
            Some(0) => 0b11,
            _ => 0b01,
        };
        block[i / 4] |= code << ((i % 4) * 2);
    }
    block
}
