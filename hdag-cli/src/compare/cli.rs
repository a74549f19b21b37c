use clap::{Command, arg};

pub const COMPARE_CMD: &str = "compare";

pub fn create_compare_cli() -> Command {
    Command::new(COMPARE_CMD)
        .author("hdag developers")
        .about("Check whether two history DAG files hold structurally equal DAGs. Exits with status 1 if they differ.")
        .arg_required_else_help(true)
        .arg(arg!(-a <a> "The first DAG file").required(true))
        .arg(arg!(-b <b> "The second DAG file").required(true))
        .arg(arg!(--"leaf-fasta" <leaf_fasta> "FASTA alignment with leaf sequences (protobuf input only)"))
        .arg(arg!(-c --config <config> "TOML file with load settings"))
}
