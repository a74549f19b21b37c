use clap::{Command, arg};

pub const CONVERT_CMD: &str = "convert";

pub fn create_convert_cli() -> Command {
    Command::new(CONVERT_CMD)
        .author("hdag developers")
        .about("Convert a history DAG between MAD protobuf (.pb) and flattened JSON (.json), optionally gzipped.")
        .arg_required_else_help(true)
        .arg(arg!(-i --input <input> "The DAG file to read").required(true))
        .arg(arg!(-o --output <output> "The DAG file to write").required(true))
        .arg(arg!(--sort "Sort compact genomes in JSON output"))
        .arg(arg!(--"leaf-fasta" <leaf_fasta> "FASTA alignment with leaf sequences (protobuf input only)"))
        .arg(arg!(--"reference-id" <reference_id> "Reference sequence id to record in the output"))
        .arg(arg!(-c --config <config> "TOML file with load settings"))
}
