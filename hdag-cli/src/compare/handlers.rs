use std::path::Path;

use anyhow::{Context, Result};
use clap::ArgMatches;

use hdag_io::{load_dag, test_equal};

use crate::config::load_config;

/// Returns whether the two DAGs are equal.
pub fn run_compare(matches: &ArgMatches) -> Result<bool> {
    let a = matches
        .get_one::<String>("a")
        .context("A path to the first DAG file is required.")?;
    let b = matches
        .get_one::<String>("b")
        .context("A path to the second DAG file is required.")?;

    let config = load_config(matches)?;
    let dag_a = load_dag(Path::new(a), &config)?;
    let dag_b = load_dag(Path::new(b), &config)?;

    let equal = test_equal(&dag_a, &dag_b)?;
    println!("{}", if equal { "equal" } else { "different" });
    Ok(equal)
}
