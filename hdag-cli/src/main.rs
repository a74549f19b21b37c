mod compare;
mod config;
mod convert;
mod summary;

use anyhow::Result;
use clap::Command;

pub mod consts {
    pub const VERSION: &str = env!("CARGO_PKG_VERSION");
    pub const PKG_NAME: &str = "hdag";
    pub const BIN_NAME: &str = "hdag";
}

fn build_parser() -> Command {
    Command::new(consts::BIN_NAME)
        .bin_name(consts::BIN_NAME)
        .version(consts::VERSION)
        .author("hdag developers")
        .about("Tools for mutation-annotated history DAGs: convert between Larch protobuf and JSON, summarize, and compare.")
        .subcommand_required(true)
        .subcommand(convert::cli::create_convert_cli())
        .subcommand(summary::cli::create_summary_cli())
        .subcommand(compare::cli::create_compare_cli())
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let app = build_parser();
    let matches = app.get_matches();

    match matches.subcommand() {
        //
        // CONVERT
        //
        Some((convert::cli::CONVERT_CMD, matches)) => {
            convert::handlers::run_convert(matches)?;
        }

        //
        // SUMMARY
        //
        Some((summary::cli::SUMMARY_CMD, matches)) => {
            summary::handlers::run_summary(matches)?;
        }

        //
        // COMPARE
        //
        Some((compare::cli::COMPARE_CMD, matches)) => {
            if !compare::handlers::run_compare(matches)? {
                std::process::exit(1);
            }
        }

        _ => unreachable!("Subcommand not found"),
    };

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::path::Path;
    use std::sync::Arc;

    use hdag_core::{Clade, CompactGenome, DagBuilder, DagKind, HistoryDag, Label, NodeLabel};
    use hdag_io::save_dag;
    use rstest::rstest;
    use tempfile::tempdir;

    /// ua -> r -> {s, t}
    fn cherry(t: &str) -> HistoryDag {
        let reference: Arc<str> = Arc::from("AAAA");
        let leaf = |id: &str, sequence: &str| Label {
            compact_genome: Some(
                CompactGenome::from_sequence(sequence, Arc::clone(&reference)).unwrap(),
            ),
            node_id: Some(id.to_string()),
        };
        let s = leaf("s", "CAAA");
        let t = leaf("t", t);
        let single = |l: &Label| -> Clade { [NodeLabel::Node(l.clone())].into_iter().collect() };
        let clades = vec![single(&s), single(&t)];

        let mut b = DagBuilder::new();
        let si = b.add_node(s, vec![]);
        let ti = b.add_node(t, vec![]);
        let r = b.add_node(
            Label::from_genome(CompactGenome::empty(Arc::clone(&reference))),
            clades.clone(),
        );
        let ua = b
            .add_ua_node(clades.iter().flatten().cloned().collect())
            .unwrap();
        b.add_edge(r, si, 0).unwrap();
        b.add_edge(r, ti, 1).unwrap();
        b.add_edge(ua, r, 0).unwrap();
        b.build(DagKind::CompactGenomes).unwrap()
    }

    fn path_arg(path: &Path) -> &str {
        path.to_str().unwrap()
    }

    #[rstest]
    fn test_parser_is_valid() {
        build_parser().debug_assert();
    }

    #[rstest]
    fn test_convert_args() {
        let matches = build_parser()
            .try_get_matches_from(["hdag", "convert", "-i", "in.pb", "-o", "out.json", "--sort"])
            .unwrap();
        let (name, sub) = matches.subcommand().unwrap();
        assert_eq!(name, convert::cli::CONVERT_CMD);
        let config = config::load_config(sub).unwrap();
        assert!(config.sort_genomes);
        assert!(!config.topology_only);
    }

    #[rstest]
    fn test_compare_requires_both_files() {
        assert!(
            build_parser()
                .try_get_matches_from(["hdag", "compare", "-a", "a.pb"])
                .is_err()
        );
    }

    #[rstest]
    fn test_convert_summary_compare() {
        let dir = tempdir().unwrap();
        let pb = dir.path().join("dag.pb");
        let json = dir.path().join("dag.json.gz");
        let other = dir.path().join("other.json");
        save_dag(&cherry("AAAC"), &pb, false).unwrap();
        save_dag(&cherry("AAAG"), &other, false).unwrap();

        let matches = build_parser()
            .try_get_matches_from(["hdag", "convert", "-i", path_arg(&pb), "-o", path_arg(&json), "--sort"])
            .unwrap();
        let (_, sub) = matches.subcommand().unwrap();
        convert::handlers::run_convert(sub).unwrap();
        assert!(json.exists());

        let matches = build_parser()
            .try_get_matches_from(["hdag", "summary", "-i", path_arg(&json)])
            .unwrap();
        let (_, sub) = matches.subcommand().unwrap();
        summary::handlers::run_summary(sub).unwrap();

        let compare = |a: &Path, b: &Path| {
            let matches = build_parser()
                .try_get_matches_from(["hdag", "compare", "-a", path_arg(a), "-b", path_arg(b)])
                .unwrap();
            let (_, sub) = matches.subcommand().unwrap();
            compare::handlers::run_compare(sub).unwrap()
        };
        assert!(compare(&pb, &json));
        assert!(!compare(&pb, &other));
    }
}
