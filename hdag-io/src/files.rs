use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use log::warn;

use hdag_core::HistoryDag;

use crate::config::LoadConfig;
use crate::fasta::leaf_genomes_from_fasta;
use crate::flat::{load_json_file, to_json_file};
use crate::mad::{LoadOptions, decode, read_mad_data, to_protobuf_file};
use crate::utils::{DagFileType, get_file_info};

fn file_type(path: &Path) -> Result<DagFileType> {
    get_file_info(path)
        .map(|info| info.file_type)
        .ok_or_else(|| anyhow!("Unrecognized DAG file extension: {:?} (expected .pb or .json, optionally .gz)", path))
}

///
/// Load a history DAG from a `.pb` or `.json` file (either optionally gzipped).
///
/// # Arguments
///
/// - path: path to the DAG file
/// - config: load settings; protobuf-only settings are ignored for JSON input
///
pub fn load_dag(path: &Path, config: &LoadConfig) -> Result<HistoryDag> {
    let mut dag = match file_type(path)? {
        DagFileType::Protobuf => {
            let data = read_mad_data(path)?;
            let leaf_genomes = match &config.leaf_fasta {
                Some(fasta) if !config.topology_only => {
                    let reference: Arc<str> = Arc::from(data.reference_seq.as_str());
                    Some(leaf_genomes_from_fasta(fasta, &reference)?)
                }
                _ => None,
            };
            let options = LoadOptions {
                topology_only: config.topology_only,
                leaf_genomes,
            };
            decode(&data, &options)
                .with_context(|| format!("Failed to load MAD protobuf from {:?}", path))?
        }
        DagFileType::Json => {
            if config.topology_only || config.leaf_fasta.is_some() {
                warn!("topology-only and leaf FASTA settings apply to protobuf input only");
            }
            load_json_file(path)?
        }
    };

    if let Some(reference_id) = &config.reference_id {
        dag.set_refseq_id(reference_id.as_str());
    }
    Ok(dag)
}

///
/// Write a history DAG to a `.pb` or `.json` file, gzipped if the path ends in `.gz`.
///
pub fn save_dag(dag: &HistoryDag, path: &Path, sort_genomes: bool) -> Result<()> {
    match file_type(path)? {
        DagFileType::Protobuf => to_protobuf_file(dag, path),
        DagFileType::Json => to_json_file(dag, path, sort_genomes),
    }
}
