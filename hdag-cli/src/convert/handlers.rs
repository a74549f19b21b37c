use std::path::Path;

use anyhow::{Context, Result};
use clap::ArgMatches;
use log::info;

use hdag_io::{load_dag, save_dag};

use crate::config::load_config;

pub fn run_convert(matches: &ArgMatches) -> Result<()> {
    let input = matches
        .get_one::<String>("input")
        .context("A path to an input DAG file is required.")?;
    let output = matches
        .get_one::<String>("output")
        .context("A path to an output DAG file is required.")?;

    let config = load_config(matches)?;
    let dag = load_dag(Path::new(input), &config)?;
    save_dag(&dag, Path::new(output), config.sort_genomes)?;

    info!(
        "Wrote {} nodes and {} edges to {}",
        dag.num_nodes(),
        dag.num_edges(),
        output
    );
    Ok(())
}
