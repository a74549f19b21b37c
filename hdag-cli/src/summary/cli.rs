use clap::{Command, arg};

pub const SUMMARY_CMD: &str = "summary";

pub fn create_summary_cli() -> Command {
    Command::new(SUMMARY_CMD)
        .author("hdag developers")
        .about("Print node, edge, leaf and history counts of a history DAG.")
        .arg_required_else_help(true)
        .arg(arg!(-i --input <input> "The DAG file to summarize").required(true))
        .arg(arg!(--"topology-only" "Load only the DAG topology, skipping sequence reconstruction"))
        .arg(arg!(--"leaf-fasta" <leaf_fasta> "FASTA alignment with leaf sequences (protobuf input only)"))
        .arg(arg!(-c --config <config> "TOML file with load settings"))
}
