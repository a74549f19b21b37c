use std::path::Path;

use anyhow::{Context, Result};
use clap::ArgMatches;

use hdag_io::load_dag;

use crate::config::load_config;

pub fn run_summary(matches: &ArgMatches) -> Result<()> {
    let input = matches
        .get_one::<String>("input")
        .context("A path to a DAG file is required.")?;

    let config = load_config(matches)?;
    let dag = load_dag(Path::new(input), &config)?;
    let summary = dag.summary()?;

    print!("{}", summary);
    Ok(())
}
