// ==============================================================================
// gwas.rs - GWAS Summary Statistics Loader
// ==============================================================================
// Description: Reads (gzip-compressed) tab-separated summary statistics tables
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================
// Format: Tab-delimited text with a single header line
// Example:
//   chromosome    base_pair_location    effect_allele    other_allele    beta    ...
//   1    55505647    T    G    -0.0712    ...
// Gzip is detected from the magic number, not the file name. Multi-member
// streams (BGZF) are decoded completely.
// ==============================================================================

use csv::{ReaderBuilder, StringRecord};
use flate2::read::MultiGzDecoder;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

pub const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// Raw summary statistics table: header plus untyped rows
#[derive(Debug, Clone)]
pub struct RawGwasTable {
    pub headers: StringRecord,
    pub rows: Vec<StringRecord>,
}

impl RawGwasTable {
    /// Index of a header column (exact match)
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.headers.iter().position(|h| h == name)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Errors that can occur while loading a summary statistics file
#[derive(Error, Debug)]
pub enum GwasParseError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to decompress {path}: {source}")]
    Decompression {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Row at line {line} has {found} fields, header has {expected}")]
    RaggedRow { line: u64, expected: u64, found: u64 },

    #[error("Malformed table: {0}")]
    Format(String),

    #[error("File has no header line")]
    MissingHeader,

    #[error("File contains a header but no records")]
    EmptyFile,
}

/// Loader for delimited summary statistics tables
#[derive(Debug, Clone)]
pub struct GwasLoader {
    /// Field delimiter (tab by default)
    pub delimiter: u8,
}

impl Default for GwasLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl GwasLoader {
    pub fn new() -> Self {
        Self { delimiter: b'\t' }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// Load a summary statistics table
    ///
    /// # Arguments
    /// * `path` - Path to the table (`.tsv` or `.tsv.gz`)
    ///
    /// # Returns
    /// * `Ok(RawGwasTable)` - Header and one row per variant
    /// * `Err(GwasParseError)` - Missing file, corrupt gzip stream or ragged rows
    pub fn load(&self, path: impl AsRef<Path>) -> Result<RawGwasTable, GwasParseError> {
        let path = path.as_ref();

        let file = File::open(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => GwasParseError::FileNotFound(path.display().to_string()),
            _ => GwasParseError::IoError(e),
        })?;

        let mut buffered = BufReader::new(file);
        let compressed = buffered.fill_buf()?.starts_with(&GZIP_MAGIC);
        debug!("Opening {:?} (gzip: {})", path, compressed);

        let source: Box<dyn Read> = if compressed {
            Box::new(MultiGzDecoder::new(buffered))
        } else {
            Box::new(buffered)
        };

        let mut reader = ReaderBuilder::new()
            .delimiter(self.delimiter)
            .has_headers(true)
            .from_reader(source);

        let headers = reader
            .headers()
            .map_err(|e| classify_csv_error(e, path, compressed))?
            .clone();

        if headers.is_empty() {
            return Err(GwasParseError::MissingHeader);
        }

        let mut rows = Vec::new();
        for result in reader.records() {
            let record = result.map_err(|e| classify_csv_error(e, path, compressed))?;
            rows.push(record);
        }

        if rows.is_empty() {
            return Err(GwasParseError::EmptyFile);
        }

        Ok(RawGwasTable { headers, rows })
    }
}

fn classify_csv_error(err: csv::Error, path: &Path, compressed: bool) -> GwasParseError {
    match err.into_kind() {
        csv::ErrorKind::Io(source) if compressed => GwasParseError::Decompression {
            path: path.display().to_string(),
            source,
        },
        csv::ErrorKind::Io(source) => GwasParseError::IoError(source),
        csv::ErrorKind::UnequalLengths { pos, expected_len, len } => GwasParseError::RaggedRow {
            line: pos.map(|p| p.line()).unwrap_or(0),
            expected: expected_len,
            found: len,
        },
        other => GwasParseError::Format(format!("{:?}", other)),
    }
}
