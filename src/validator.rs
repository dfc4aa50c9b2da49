// ==============================================================================
// validator.rs - Input File Validation
// ==============================================================================
// Description: Checks summary statistics inputs before loading (existence,
//              size, gzip magic number, mapped header columns) and fingerprints
//              them with SHA-256
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================

use anyhow::{Context, Result};
use flate2::read::MultiGzDecoder;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::models::ColumnMapping;
use crate::parsers::gwas::GZIP_MAGIC;

const MAX_FILE_SIZE: u64 = 20 * 1024 * 1024 * 1024; // 20 GB

/// Facts about a validated input, recorded in the run summary
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidatedInput {
    pub path: PathBuf,
    pub file_name: String,
    pub size: u64,
    pub compressed: bool,
    pub hash_sha256: String,
    pub validated_at: chrono::DateTime<chrono::Utc>,
}

pub struct InputValidator {
    max_file_size: u64,
    delimiter: char,
}

impl InputValidator {
    pub fn new() -> Self {
        Self {
            max_file_size: MAX_FILE_SIZE,
            delimiter: '\t',
        }
    }

    pub fn with_max_file_size(mut self, max_file_size: u64) -> Self {
        self.max_file_size = max_file_size;
        self
    }

    /// Validate one summary statistics file against its column mapping
    ///
    /// # Arguments
    /// * `file_path` - Input file (gzip or plain text)
    /// * `mapping` - Columns the file must provide
    pub fn validate(&self, file_path: &Path, mapping: &ColumnMapping) -> Result<ValidatedInput> {
        let file_name = file_path
            .file_name()
            .ok_or_else(|| anyhow::anyhow!("Invalid file path: {:?}", file_path))?
            .to_string_lossy()
            .to_string();

        info!("Validating input: {}", file_name);

        // 1. Existence and size
        let metadata = std::fs::metadata(file_path)
            .with_context(|| format!("Input file not found: {:?}", file_path))?;
        let size = metadata.len();
        if size == 0 {
            anyhow::bail!("Input file is empty: {:?}", file_path);
        }
        if size > self.max_file_size {
            anyhow::bail!("File too large: {} bytes (max: {} bytes)", size, self.max_file_size);
        }
        debug!("Size check passed: {} bytes", size);

        // 2. Magic number
        let magic = self.read_magic_number(file_path)?;
        let compressed = magic.starts_with(&GZIP_MAGIC);
        if file_name.ends_with(".gz") && !compressed {
            anyhow::bail!("Magic number mismatch: {} is not gzip compressed", file_name);
        }
        debug!("Magic number check passed (gzip: {})", compressed);

        // 3. Header contains every mapped column
        let header = self.read_header(file_path, compressed)?;
        let missing: Vec<&str> = mapping
            .mapped()
            .into_iter()
            .map(|(_, source)| source)
            .filter(|source| !header.iter().any(|h| h == source))
            .collect();
        if !missing.is_empty() {
            anyhow::bail!(
                "{} is missing mapped columns: {} (header: {})",
                file_name,
                missing.join(", "),
                header.join(", ")
            );
        }
        debug!("Header check passed: {} columns", header.len());

        // 4. Compute SHA-256 hash
        let hash = self.compute_sha256(file_path)?;
        debug!("SHA-256: {}", hash);

        Ok(ValidatedInput {
            path: file_path.to_path_buf(),
            file_name,
            size,
            compressed,
            hash_sha256: hash,
            validated_at: chrono::Utc::now(),
        })
    }

    fn read_magic_number(&self, path: &Path) -> Result<Vec<u8>> {
        let mut file = File::open(path)?;
        let mut buffer = Vec::with_capacity(GZIP_MAGIC.len());
        file.by_ref().take(GZIP_MAGIC.len() as u64).read_to_end(&mut buffer)?;
        Ok(buffer)
    }

    fn read_header(&self, path: &Path, compressed: bool) -> Result<Vec<String>> {
        let file = File::open(path)?;
        let reader: Box<dyn BufRead> = if compressed {
            Box::new(BufReader::new(MultiGzDecoder::new(file)))
        } else {
            Box::new(BufReader::new(file))
        };

        let first_line = reader
            .lines()
            .next()
            .ok_or_else(|| anyhow::anyhow!("File is empty"))?
            .context("Failed to read header line")?;

        Ok(first_line
            .trim_end_matches('\r')
            .split(self.delimiter)
            .map(|s| s.trim().to_string())
            .collect())
    }

    /// SHA-256 of the raw (still compressed) file
    pub fn compute_sha256(&self, path: &Path) -> Result<String> {
        let mut file = File::open(path)?;
        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; 8192];

        loop {
            let n = file.read(&mut buffer)?;
            if n == 0 {
                break;
            }
            hasher.update(&buffer[..n]);
        }

        Ok(format!("{:x}", hasher.finalize()))
    }
}

impl Default for InputValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Write;
    use tempfile::{tempdir, NamedTempFile};

    const METAL_HEADER: &str = "MarkerName\tAllele1\tAllele2\tFreq1\tEffect\tStdErr\tP-value\tCHR\tBP\n";

    fn write_gz(path: &Path, contents: &str) {
        let mut encoder = GzEncoder::new(File::create(path).unwrap(), Compression::default());
        encoder.write_all(contents.as_bytes()).unwrap();
        encoder.finish().unwrap();
    }

    #[test]
    fn test_validate_gzip_input() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("CAD.tsv.gz");
        write_gz(&path, &format!("{}rs1\ta\tg\t0.3\t0.1\t0.01\t1e-9\t1\t100\n", METAL_HEADER));

        let validated = InputValidator::new().validate(&path, &ColumnMapping::metal()).unwrap();
        assert!(validated.compressed);
        assert_eq!(validated.file_name, "CAD.tsv.gz");
        assert_eq!(validated.hash_sha256.len(), 64);
    }

    #[test]
    fn test_missing_mapped_column() {
        let mut file = NamedTempFile::new().unwrap();
        write!(file, "CHR\tBP\tAllele1\n1\t100\tA\n").unwrap();
        file.flush().unwrap();

        let err = InputValidator::new()
            .validate(file.path(), &ColumnMapping::metal())
            .unwrap_err();
        assert!(err.to_string().contains("Allele2"));
    }

    #[test]
    fn test_gz_name_without_gzip_content() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("LDL.tsv.gz");
        std::fs::write(&path, METAL_HEADER).unwrap();

        let err = InputValidator::new().validate(&path, &ColumnMapping::metal()).unwrap_err();
        assert!(err.to_string().contains("Magic number mismatch"));
    }

    #[test]
    fn test_missing_and_empty_files() {
        let dir = tempdir().unwrap();
        let validator = InputValidator::new();

        assert!(validator
            .validate(&dir.path().join("absent.tsv.gz"), &ColumnMapping::metal())
            .is_err());

        let empty = dir.path().join("empty.tsv");
        std::fs::write(&empty, "").unwrap();
        let err = validator.validate(&empty, &ColumnMapping::metal()).unwrap_err();
        assert!(err.to_string().contains("empty"));
    }

    #[test]
    fn test_size_limit() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(METAL_HEADER.as_bytes()).unwrap();
        file.flush().unwrap();

        let validator = InputValidator::new().with_max_file_size(8);
        assert!(validator.validate(file.path(), &ColumnMapping::metal()).is_err());
    }

    #[test]
    fn test_sha256_known_value() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"abc").unwrap();
        file.flush().unwrap();

        assert_eq!(
            InputValidator::new().compute_sha256(file.path()).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
