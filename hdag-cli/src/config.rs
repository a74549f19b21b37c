use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::ArgMatches;

use hdag_io::LoadConfig;

///
/// Build the load settings for a subcommand: the `--config` file if given, with
/// any command line flags taking precedence.
///
pub fn load_config(matches: &ArgMatches) -> Result<LoadConfig> {
    let mut config = match matches.try_get_one::<String>("config").ok().flatten() {
        Some(path) => LoadConfig::try_from(Path::new(path))
            .with_context(|| format!("Failed to read config file {}", path))?,
        None => LoadConfig::default(),
    };

    if let Ok(Some(true)) = matches.try_get_one::<bool>("topology-only") {
        config.topology_only = true;
    }
    if let Ok(Some(true)) = matches.try_get_one::<bool>("sort") {
        config.sort_genomes = true;
    }
    if let Ok(Some(fasta)) = matches.try_get_one::<String>("leaf-fasta") {
        config.leaf_fasta = Some(PathBuf::from(fasta));
    }
    if let Ok(Some(id)) = matches.try_get_one::<String>("reference-id") {
        config.reference_id = Some(id.to_string());
    }

    Ok(config)
}
