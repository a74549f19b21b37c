use std::fs::read_to_string;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{MadError, Result};

///
/// Settings for loading and writing history DAG files, read from TOML:
///
/// ```toml
/// topology_only = false
/// leaf_fasta = "alignment.fasta"
/// sort_genomes = true
/// reference_id = "MN908947.3"
/// ```
///
#[derive(Deserialize, Serialize, Debug, Default, Clone, PartialEq)]
#[serde(default)]
pub struct LoadConfig {
    pub topology_only: bool,
    /// FASTA alignment holding leaf sequences, relative to the config file.
    pub leaf_fasta: Option<PathBuf>,
    pub sort_genomes: bool,
    /// Reference sequence id to record on the loaded DAG.
    pub reference_id: Option<String>,
}

impl TryFrom<&Path> for LoadConfig {
    type Error = MadError;

    fn try_from(path: &Path) -> Result<Self> {
        let toml_str = read_to_string(path)?;
        let mut config: LoadConfig = toml::from_str(&toml_str)?;
        if let (Some(fasta), Some(dir)) = (config.leaf_fasta.as_mut(), path.parent()) {
            if fasta.is_relative() {
                *fasta = dir.join(&*fasta);
            }
        }
        Ok(config)
    }
}
