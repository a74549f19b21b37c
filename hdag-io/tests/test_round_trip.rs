//! Round trips of history DAGs through the protobuf and flattened JSON forms.

use std::collections::BTreeSet;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use pretty_assertions::assert_eq;
use rstest::*;
use tempfile::{NamedTempFile, tempdir};

use hdag_core::models::nucleotide::is_ambiguous;
use hdag_core::{Clade, CompactGenome, DagBuilder, DagKind, HistoryDag, Label, NodeIndex, NodeLabel};
use hdag_io::{
    LoadConfig, LoadOptions, decode, encode, flatten, load_dag, save_dag, test_equal, unflatten,
};

fn label(sequence: &str, id: Option<&str>, reference: &Arc<str>) -> Label {
    Label {
        compact_genome: Some(
            CompactGenome::from_sequence(sequence, Arc::clone(reference)).unwrap(),
        ),
        node_id: id.map(str::to_string),
    }
}

///
/// Four leaves; {s1, s2} has two resolutions (a, a2) and the root clade has two
/// resolutions (r1, r2), so the DAG holds four histories.
///
fn build_dag(s4: &str) -> HistoryDag {
    let reference: Arc<str> = Arc::from("AAAAAA");
    let leaves: Vec<Label> = [("s1", "CAAAAA"), ("s2", "CGAAAA"), ("s3", "AAATAA"), ("s4", s4)]
        .iter()
        .map(|(id, seq)| label(seq, Some(id), &reference))
        .collect();
    let clade = |ids: &[usize]| -> Clade {
        ids.iter()
            .map(|&i| NodeLabel::Node(leaves[i].clone()))
            .collect::<BTreeSet<_>>()
    };

    let mut b = DagBuilder::new();
    let s: Vec<NodeIndex> = leaves
        .iter()
        .map(|l| b.add_node(l.clone(), vec![]))
        .collect();
    let a = b.add_node(label("CAAAAA", None, &reference), vec![clade(&[0]), clade(&[1])]);
    let a2 = b.add_node(label("CGAAAA", None, &reference), vec![clade(&[0]), clade(&[1])]);
    let bb = b.add_node(label("AAATAA", None, &reference), vec![clade(&[2]), clade(&[3])]);
    let r1 = b.add_node(
        label("AAAAAA", None, &reference),
        vec![clade(&[0, 1]), clade(&[2, 3])],
    );
    let r2 = b.add_node(
        label("CAATAA", None, &reference),
        vec![clade(&[0, 1]), clade(&[2, 3])],
    );
    let ua = b.add_ua_node(clade(&[0, 1, 2, 3])).unwrap();

    for p in [a, a2] {
        b.add_edge(p, s[0], 0).unwrap();
        b.add_edge(p, s[1], 1).unwrap();
    }
    b.add_edge(bb, s[2], 0).unwrap();
    b.add_edge(bb, s[3], 1).unwrap();
    for r in [r1, r2] {
        b.add_edge(r, a, 0).unwrap();
        b.add_edge(r, a2, 0).unwrap();
        b.add_edge(r, bb, 1).unwrap();
    }
    b.add_edge(ua, r1, 0).unwrap();
    b.add_edge(ua, r2, 0).unwrap();

    let kind = if is_ambiguous(s4) {
        DagKind::AmbiguousLeafCompactGenomes
    } else {
        DagKind::CompactGenomes
    };
    let mut dag = b.build(kind).unwrap();
    dag.set_refseq_id("test_ref");
    dag
}

#[fixture]
fn dag() -> HistoryDag {
    build_dag("AAATAC")
}

#[rstest]
fn test_fixture_shape(dag: HistoryDag) {
    assert_eq!(dag.num_nodes(), 10);
    assert_eq!(dag.num_edges(), 14);
    assert_eq!(dag.count_histories(), 4);
    assert_eq!(dag.leaves().len(), 4);

    let summary = dag.summary().unwrap();
    assert_eq!(summary.max_edge_weight, Some(2));
    assert_eq!(summary.total_edge_weight, 11);
    assert_eq!(summary.reference_length, Some(6));
}

#[rstest]
#[case("AAATAC", DagKind::CompactGenomes)]
#[case("AAATAM", DagKind::AmbiguousLeafCompactGenomes)]
fn test_protobuf_round_trip(#[case] s4: &str, #[case] kind: DagKind) {
    let dag = build_dag(s4);
    let data = encode(&dag).unwrap();
    let decoded = decode(&data, &LoadOptions::default()).unwrap();

    assert_eq!(decoded.kind(), kind);
    assert_eq!(decoded.refseq_id(), Some("test_ref"));
    assert_eq!(decoded.count_histories(), 4);
    assert!(test_equal(&dag, &decoded).unwrap());

    // leaf ids survive in condensed_leaves
    let mut ids: Vec<&str> = decoded
        .nodes()
        .iter()
        .filter_map(|n| n.label.node_id())
        .collect();
    ids.sort();
    assert_eq!(ids, vec!["s1", "s2", "s3", "s4"]);
}

#[rstest]
fn test_encode_is_deterministic(dag: HistoryDag) {
    assert_eq!(encode(&dag).unwrap(), encode(&dag).unwrap());
}

#[rstest]
fn test_topology_only_keeps_structure(dag: HistoryDag) {
    let data = encode(&dag).unwrap();
    let options = LoadOptions {
        topology_only: true,
        ..Default::default()
    };
    let decoded = decode(&data, &options).unwrap();
    assert_eq!(decoded.kind(), DagKind::NodeIds);
    assert_eq!(decoded.num_nodes(), dag.num_nodes());
    assert_eq!(decoded.num_edges(), dag.num_edges());
    assert_eq!(decoded.count_histories(), 4);
}

#[rstest]
#[case(false)]
#[case(true)]
fn test_flatten_round_trip(dag: HistoryDag, #[case] sort_genomes: bool) {
    let flat = flatten(&dag, sort_genomes).unwrap();
    assert_eq!(flat.nodes.len(), dag.num_nodes());
    assert_eq!(flat.edges.len(), dag.num_edges());
    // s1, s2 and s3 share genomes with a, a2 and bb; the UA slot is last
    assert_eq!(flat.compact_genomes.len(), 7);
    assert_eq!(flat.compact_genomes.last(), Some(&None));

    let unflattened = unflatten(&flat).unwrap();
    assert!(test_equal(&dag, &unflattened).unwrap());
    assert_eq!(unflattened.count_histories(), 4);
}

#[rstest]
fn test_structural_difference_detected(dag: HistoryDag) {
    let other = build_dag("AAATAG");
    assert!(!test_equal(&dag, &other).unwrap());
}

#[rstest]
#[case("dag.pb")]
#[case("dag.pb.gz")]
#[case("dag.json")]
#[case("dag.json.gz")]
fn test_file_round_trip(dag: HistoryDag, #[case] name: &str) {
    let dir = tempdir().unwrap();
    let path: PathBuf = dir.path().join(name);

    save_dag(&dag, &path, true).unwrap();
    let loaded = load_dag(&path, &LoadConfig::default()).unwrap();
    assert!(test_equal(&dag, &loaded).unwrap());
    assert_eq!(loaded.refseq_id(), Some("test_ref"));
}

#[rstest]
fn test_unknown_extension(dag: HistoryDag) {
    let dir = tempdir().unwrap();
    assert!(save_dag(&dag, &dir.path().join("dag.txt"), false).is_err());
}

#[rstest]
fn test_load_with_leaf_fasta(dag: HistoryDag) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("dag.pb");
    save_dag(&dag, &path, false).unwrap();

    // s4 is ambiguous in the alignment but not on the wire
    let mut fasta = NamedTempFile::new().unwrap();
    writeln!(fasta, ">s1\nCAAAAA\n>s2\nCGAAAA\n>s3\nAAATAA\n>s4\nAAATAM").unwrap();

    let config = LoadConfig {
        leaf_fasta: Some(fasta.path().to_path_buf()),
        reference_id: Some("renamed".to_string()),
        ..Default::default()
    };
    let loaded = load_dag(&path, &config).unwrap();
    assert_eq!(loaded.kind(), DagKind::AmbiguousLeafCompactGenomes);
    assert_eq!(loaded.refseq_id(), Some("renamed"));
    assert!(test_equal(&build_dag("AAATAM"), &loaded).unwrap());
}

#[rstest]
fn test_load_gapped_leaf_fasta(dag: HistoryDag) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("dag.pb");
    save_dag(&dag, &path, false).unwrap();

    let fasta = dir.path().join("leaves.fa");
    std::fs::write(&fasta, ">s1\nCAAAAA\n>s2\nCGAAAA\n>s3\nAAATAA\n>s4\nAAAT-A\n").unwrap();
    let config = LoadConfig {
        leaf_fasta: Some(fasta),
        ..Default::default()
    };
    let loaded = load_dag(&path, &config).unwrap();
    assert_eq!(loaded.kind(), DagKind::CompactGenomes);
    assert!(test_equal(&build_dag("AAAT-A"), &loaded).unwrap());

    let summary = loaded.summary().unwrap();
    assert_eq!(summary.num_leaves, 4);

    // gaps survive the JSON form; the protobuf alphabet has no code for them
    let json = dir.path().join("gapped.json");
    save_dag(&loaded, &json, true).unwrap();
    assert!(test_equal(&loaded, &load_dag(&json, &LoadConfig::default()).unwrap()).unwrap());
    assert!(save_dag(&loaded, &dir.path().join("gapped.pb"), false).is_err());
}
