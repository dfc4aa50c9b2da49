// ==============================================================================
// reference_panel.rs - LD Reference Panel Reader
// ==============================================================================
// Description: Locates and reads named PLINK reference panels (e.g. EUR_37),
//              answers variant lookups and pairwise LD (r²) queries
// Created: 2026-10-16
// Modified: 2026-10-16
// Version: 1.0.0
// ==============================================================================

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

use crate::parsers::plink::{count_fam_samples, parse_bim, BedReader, BimRecord, PlinkParseError};

/// Reference panel errors
#[derive(Error, Debug)]
pub enum PanelError {
    #[error("Unknown reference panel '{0}' (expected e.g. EUR_37, AFR_38)")]
    UnknownPanel(String),

    #[error("Reference panel {name} not found under {dir}")]
    PanelNotFound { name: String, dir: String },

    #[error("Reference panel file missing: {0}")]
    MissingFile(String),

    #[error("Reference panel {name} has no samples")]
    NoSamples { name: String },

    #[error(transparent)]
    Plink(#[from] PlinkParseError),
}

/// Super-population of a 1000 Genomes panel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Ancestry {
    Eur,
    Afr,
    Eas,
    Amr,
    Sas,
}

impl Ancestry {
    pub fn as_str(&self) -> &'static str {
        match self {
            Ancestry::Eur => "EUR",
            Ancestry::Afr => "AFR",
            Ancestry::Eas => "EAS",
            Ancestry::Amr => "AMR",
            Ancestry::Sas => "SAS",
        }
    }
}

/// Genome build of the panel coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GenomeBuild {
    Grch37,
    Grch38,
}

/// Panel identifier such as `EUR_37`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PanelName {
    pub ancestry: Ancestry,
    pub build: GenomeBuild,
}

impl FromStr for PanelName {
    type Err = PanelError;

    /// Accepts `EUR_37`, `eur_38` or a bare ancestry (`eur`, build 37)
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let upper = s.trim().to_ascii_uppercase();
        let (ancestry, build) = match upper.split_once('_') {
            Some((ancestry, build)) => (ancestry, build),
            None => (upper.as_str(), "37"),
        };

        let ancestry = match ancestry {
            "EUR" => Ancestry::Eur,
            "AFR" => Ancestry::Afr,
            "EAS" => Ancestry::Eas,
            "AMR" => Ancestry::Amr,
            "SAS" => Ancestry::Sas,
            _ => return Err(PanelError::UnknownPanel(s.to_string())),
        };
        let build = match build {
            "37" | "GRCH37" | "HG19" => GenomeBuild::Grch37,
            "38" | "GRCH38" | "HG38" => GenomeBuild::Grch38,
            _ => return Err(PanelError::UnknownPanel(s.to_string())),
        };

        Ok(Self { ancestry, build })
    }
}

impl fmt::Display for PanelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let build = match self.build {
            GenomeBuild::Grch37 => "37",
            GenomeBuild::Grch38 => "38",
        };
        write!(f, "{}_{}", self.ancestry.as_str(), build)
    }
}

/// Loaded PLINK reference panel
#[derive(Debug)]
pub struct ReferencePanel {
    name: PanelName,
    variants: Vec<BimRecord>,
    by_rsid: HashMap<String, usize>,
    by_locus: HashMap<(u8, u64), Vec<usize>>,
    bed: BedReader,
    genotype_cache: HashMap<usize, Vec<Option<u8>>>,
}

impl ReferencePanel {
    /// Find `<name>.bed/.bim/.fam` anywhere under `reference_dir` and open it
    pub fn open(reference_dir: impl AsRef<Path>, name: PanelName) -> Result<Self, PanelError> {
        let reference_dir = reference_dir.as_ref();
        let bed_name = format!("{}.bed", name);

        let bed_path = WalkDir::new(reference_dir)
            .follow_links(true)
            .into_iter()
            .filter_map(|entry| entry.ok())
            .find(|entry| entry.file_type().is_file() && entry.file_name().to_string_lossy() == bed_name)
            .map(|entry| entry.into_path())
            .ok_or_else(|| PanelError::PanelNotFound {
                name: name.to_string(),
                dir: reference_dir.display().to_string(),
            })?;

        Self::from_fileset(name, &bed_path)
    }

    /// Open a fileset given the path of its .bed (siblings share the stem)
    pub fn from_fileset(name: PanelName, bed_path: &Path) -> Result<Self, PanelError> {
        let bim_path = sibling(bed_path, "bim")?;
        let fam_path = sibling(bed_path, "fam")?;

        info!("Opening reference panel {} ({:?})", name, bed_path);

        let bim = parse_bim(&bim_path)?;
        let n_samples = count_fam_samples(&fam_path)?;
        if n_samples == 0 {
            return Err(PanelError::NoSamples { name: name.to_string() });
        }
        let bed = BedReader::open(bed_path, n_samples, bim.rows)?;

        let mut by_rsid = HashMap::with_capacity(bim.records.len());
        let mut by_locus: HashMap<(u8, u64), Vec<usize>> = HashMap::with_capacity(bim.records.len());
        for (i, variant) in bim.records.iter().enumerate() {
            by_rsid.entry(variant.rsid.clone()).or_insert(i);
            by_locus.entry((variant.chromosome, variant.position)).or_default().push(i);
        }

        info!(
            "Reference panel {} loaded: {} variants, {} samples",
            name,
            bim.records.len(),
            n_samples
        );

        Ok(Self {
            name,
            variants: bim.records,
            by_rsid,
            by_locus,
            bed,
            genotype_cache: HashMap::new(),
        })
    }

    pub fn name(&self) -> PanelName {
        self.name
    }

    pub fn variant_count(&self) -> usize {
        self.variants.len()
    }

    pub fn sample_count(&self) -> usize {
        self.bed.n_samples()
    }

    /// Variant with the given identifier
    pub fn by_rsid(&self, rsid: &str) -> Option<&BimRecord> {
        self.by_rsid.get(rsid).map(|&i| &self.variants[i])
    }

    /// Variants at a locus (several for multi-allelic sites)
    pub fn at_locus(&self, chromosome: u8, position: u64) -> Vec<&BimRecord> {
        self.by_locus
            .get(&(chromosome, position))
            .map(|ids| ids.iter().map(|&i| &self.variants[i]).collect())
            .unwrap_or_default()
    }

    pub fn contains(&self, rsid: &str) -> bool {
        self.by_rsid.contains_key(rsid)
    }

    /// Genotype r² between two panel variants, `None` if either is absent
    pub fn r2(&mut self, rsid_a: &str, rsid_b: &str) -> Result<Option<f64>, PanelError> {
        let (Some(a), Some(b)) = (self.by_rsid(rsid_a), self.by_rsid(rsid_b)) else {
            return Ok(None);
        };
        let (a, b) = (a.index, b.index);

        self.load_genotypes(a)?;
        self.load_genotypes(b)?;

        Ok(Some(genotype_r2(&self.genotype_cache[&a], &self.genotype_cache[&b])))
    }

    fn load_genotypes(&mut self, bed_index: usize) -> Result<(), PanelError> {
        if !self.genotype_cache.contains_key(&bed_index) {
            let dosages = self.bed.read_dosages(bed_index)?;
            debug!("Cached genotypes for panel row {}", bed_index);
            self.genotype_cache.insert(bed_index, dosages);
        }
        Ok(())
    }
}

fn sibling(bed_path: &Path, extension: &str) -> Result<PathBuf, PanelError> {
    let path = bed_path.with_extension(extension);
    if path.is_file() {
        Ok(path)
    } else {
        Err(PanelError::MissingFile(path.display().to_string()))
    }
}

/// Squared Pearson correlation of allele dosages over samples observed at both
/// variants (0 when fewer than two such samples or either is monomorphic)
pub fn genotype_r2(a: &[Option<u8>], b: &[Option<u8>]) -> f64 {
    let pairs: Vec<(f64, f64)> = a
        .iter()
        .zip(b)
        .filter_map(|(x, y)| Some((f64::from((*x)?), f64::from((*y)?))))
        .collect();

    if pairs.len() < 2 {
        return 0.0;
    }

    let n = pairs.len() as f64;
    let mean_x = pairs.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = pairs.iter().map(|(_, y)| y).sum::<f64>() / n;

    let (mut cov, mut var_x, mut var_y) = (0.0, 0.0, 0.0);
    for (x, y) in &pairs {
        let dx = x - mean_x;
        let dy = y - mean_y;
        cov += dx * dy;
        var_x += dx * dx;
        var_y += dy * dy;
    }

    if var_x == 0.0 || var_y == 0.0 {
        return 0.0;
    }

    (cov * cov) / (var_x * var_y)
}


#[cfg(test)]
mod tests {
    use super::test_support::{variant, write_panel};
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_panel_name_parsing() {
        let name: PanelName = "EUR_37".parse().unwrap();
        assert_eq!(name.ancestry, Ancestry::Eur);
        assert_eq!(name.build, GenomeBuild::Grch37);
        assert_eq!(name.to_string(), "EUR_37");

        assert_eq!("afr_38".parse::<PanelName>().unwrap().to_string(), "AFR_38");
        assert_eq!("eur".parse::<PanelName>().unwrap().to_string(), "EUR_37");
        assert!("XYZ_37".parse::<PanelName>().is_err());
        assert!("EUR_36".parse::<PanelName>().is_err());
    }

    #[test]
    fn test_genotype_r2() {
        let a = vec![Some(0), Some(1), Some(2), Some(0)];
        assert!((genotype_r2(&a, &a) - 1.0).abs() < 1e-12);

        // Perfect negative correlation still gives r² = 1
        let b = vec![Some(2), Some(1), Some(0), Some(2)];
        assert!((genotype_r2(&a, &b) - 1.0).abs() < 1e-12);

        // Monomorphic variant
        let c = vec![Some(1); 4];
        assert_eq!(genotype_r2(&a, &c), 0.0);

        // Missing samples are excluded pairwise
        let d = vec![None, Some(1), Some(2), None];
        assert!((genotype_r2(&a, &d) - 1.0).abs() < 1e-12);

        let e = vec![None, None, Some(2), None];
        assert_eq!(genotype_r2(&a, &e), 0.0);
    }

    #[test]
    fn test_open_nested_panel() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("1000G").join("EUR");
        std::fs::create_dir_all(&nested).unwrap();

        write_panel(
            &nested,
            "EUR_37",
            &[
                variant(1, "rs1", 100, ("A", "G"), &[0, 1, 2, 1]),
                variant(1, "rs2", 150, ("C", "T"), &[0, 1, 2, 1]),
                variant(2, "rs3", 100, ("A", "C"), &[1, 1, 0, 2]),
            ],
        );

        let mut panel = ReferencePanel::open(dir.path(), "EUR_37".parse().unwrap()).unwrap();
        assert_eq!(panel.variant_count(), 3);
        assert_eq!(panel.sample_count(), 4);
        assert_eq!(panel.by_rsid("rs2").unwrap().position, 150);
        assert_eq!(panel.at_locus(2, 100)[0].rsid, "rs3");
        assert!(panel.at_locus(3, 100).is_empty());

        let r2 = panel.r2("rs1", "rs2").unwrap().unwrap();
        assert!((r2 - 1.0).abs() < 1e-12);
        assert_eq!(panel.r2("rs1", "rs_missing").unwrap(), None);
    }

    #[test]
    fn test_panel_not_found() {
        let dir = tempdir().unwrap();
        let result = ReferencePanel::open(dir.path(), "EUR_37".parse().unwrap());
        assert!(matches!(result, Err(PanelError::PanelNotFound { .. })));
    }

    #[test]
    fn test_panel_missing_sibling() {
        let dir = tempdir().unwrap();
        let bed = write_panel(dir.path(), "EUR_37", &[variant(1, "rs1", 100, ("A", "G"), &[0, 1])]);
        std::fs::remove_file(dir.path().join("EUR_37.fam")).unwrap();

        let result = ReferencePanel::from_fileset("EUR_37".parse().unwrap(), &bed);
        assert!(matches!(result, Err(PanelError::MissingFile(_))));
    }
}
