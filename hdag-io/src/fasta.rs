use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use bio::io::fasta;
use fxhash::FxHashMap;
use log::info;

use hdag_core::CompactGenome;

use crate::utils::get_dynamic_reader;

///
/// Read leaf sequences from a FASTA alignment (optionally gzipped) as compact
/// genomes against `reference`, keyed by record id.
///
/// Every sequence must be aligned to the reference, i.e. have the same length.
///
pub fn leaf_genomes_from_fasta(
    path: &Path,
    reference: &Arc<str>,
) -> Result<FxHashMap<String, CompactGenome>> {
    let reader = fasta::Reader::new(get_dynamic_reader(path)?);

    let mut genomes = FxHashMap::default();
    for record in reader.records() {
        let record = record.with_context(|| format!("Error reading FASTA file {:?}", path))?;
        let sequence = std::str::from_utf8(record.seq())
            .with_context(|| format!("Sequence {} is not valid text", record.id()))?
            .to_ascii_uppercase();
        let genome = CompactGenome::from_sequence(&sequence, Arc::clone(reference))
            .with_context(|| format!("Sequence {} does not fit the reference", record.id()))?;
        genomes.insert(record.id().to_string(), genome);
    }

    info!("Read {} leaf sequences from {:?}", genomes.len(), path);
    Ok(genomes)
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use rstest::rstest;
    use tempfile::tempdir;

    #[rstest]
    fn test_leaf_genomes_from_fasta() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("leaves.fa");
        std::fs::write(&path, ">s\nCAAA\n>t\naama\n").unwrap();

        let reference: Arc<str> = Arc::from("AAAA");
        let genomes = leaf_genomes_from_fasta(&path, &reference).unwrap();
        assert_eq!(genomes.len(), 2);
        assert_eq!(genomes["s"].to_string(), "<A1C>");
        assert_eq!(genomes["t"].to_sequence(), "AAMA");
        assert!(genomes["t"].has_ambiguity());
    }

    #[rstest]
    fn test_unaligned_sequence() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("leaves.fa");
        std::fs::write(&path, ">s\nCAAAA\n").unwrap();

        let reference: Arc<str> = Arc::from("AAAA");
        assert!(leaf_genomes_from_fasta(&path, &reference).is_err());
    }
}
