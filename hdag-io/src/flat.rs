//! Canonical flattened form of a history DAG and its JSON text format.
//!
//! ```json
//! {
//!   "refseq": ["ref_id", "ACGT"],
//!   "compact_genomes": [[[2, ["C", "T"]]], [], null],
//!   "nodes": [[0, []], [1, []], [2, [[0, 1]]]],
//!   "edges": [[2, 0, 0], [2, 1, 0]]
//! }
//! ```
//!
//! Genomes are stored once each; nodes refer to them by index. The universal
//! ancestor is the last node and owns the last genome slot, which holds `null`.

use std::collections::BTreeSet;
use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use fxhash::FxHashMap;
use serde::{Deserialize, Serialize};

use hdag_core::models::nucleotide::GAP;
use hdag_core::{
    Clade, CompactGenome, DagBuilder, DagError, DagKind, HistoryDag, Label, MutationMap, NodeIndex,
    NodeLabel,
};

use crate::error::{MadError, Result};
use crate::mad::DEFAULT_REFSEQ_ID;
use crate::utils::{get_dynamic_reader, get_dynamic_writer};

/// A compact genome as `[site, [reference base, new base]]` pairs.
pub type FlatGenome = Vec<(usize, (char, char))>;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct FlatDag {
    /// Reference sequence id and the reference sequence itself.
    pub refseq: (String, String),
    pub compact_genomes: Vec<Option<FlatGenome>>,
    /// Genome index and child clades (as sets of genome indices) of each node, in postorder.
    pub nodes: Vec<(usize, Vec<Vec<usize>>)>,
    /// `(parent node, child node, clade index in the parent)`.
    pub edges: Vec<(usize, usize, usize)>,
}

fn flat_genome(genome: &CompactGenome) -> FlatGenome {
    genome
        .mutations()
        .iter()
        .map(|(&site, &(old, new))| (site, (old as char, new as char)))
        .collect()
}

fn genome_from_flat(flat: &FlatGenome, reference: &Arc<str>) -> Result<CompactGenome> {
    let base = |c: char| -> Result<u8> {
        u8::try_from(c)
            .ok()
            .filter(|b| b.is_ascii_alphabetic() || *b == GAP)
            .ok_or(MadError::Genome(hdag_core::GenomeError::InvalidBase(c)))
    };
    let mut mutations = MutationMap::new();
    for &(site, (old, new)) in flat {
        if mutations.insert(site, (base(old)?, base(new)?)).is_some() {
            return Err(MadError::MalformedInput(format!(
                "site {} appears twice in one compact genome",
                site
            )));
        }
    }
    Ok(CompactGenome::new(mutations, Arc::clone(reference))?)
}

///
/// Flatten a history DAG with compact genomes.
///
/// Nodes are listed in postorder. Genomes are indexed in order of first appearance,
/// or in genome order when `sort_genomes` is set.
///
pub fn flatten(dag: &HistoryDag, sort_genomes: bool) -> Result<FlatDag> {
    let reference = dag.reference_sequence().ok_or_else(|| {
        MadError::NotSupported("node labels carry no compact genome".to_string())
    })?;
    let postorder = dag.postorder();

    let mut genomes: Vec<&CompactGenome> = Vec::new();
    let mut genome_idx: FxHashMap<&CompactGenome, usize> = FxHashMap::default();
    for &idx in &postorder {
        let node = dag.node(idx)?;
        if node.is_ua() {
            continue;
        }
        let genome = node.label.compact_genome().ok_or_else(|| {
            MadError::NotSupported(format!("node {} has no compact genome", idx))
        })?;
        genome_idx.entry(genome).or_insert_with(|| {
            genomes.push(genome);
            genomes.len() - 1
        });
    }

    if sort_genomes {
        let mut order: Vec<usize> = (0..genomes.len()).collect();
        order.sort_by(|&a, &b| genomes[a].cmp(genomes[b]));
        let mut remap = vec![0; genomes.len()];
        for (new_idx, &old_idx) in order.iter().enumerate() {
            remap[old_idx] = new_idx;
        }
        genomes = order.iter().map(|&i| genomes[i]).collect();
        for idx in genome_idx.values_mut() {
            *idx = remap[*idx];
        }
    }
    let ua_genome = genomes.len();

    let label_idx = |label: &NodeLabel| -> Result<usize> {
        match label {
            NodeLabel::UniversalAncestor => Ok(ua_genome),
            NodeLabel::Node(l) => l
                .compact_genome
                .as_ref()
                .and_then(|cg| genome_idx.get(cg))
                .copied()
                .ok_or_else(|| {
                    DagError::Invalid(format!("clade label {} is not a node label", label)).into()
                }),
        }
    };

    let mut positions: Vec<usize> = vec![0; dag.num_nodes()];
    let mut nodes = Vec::with_capacity(postorder.len());
    let mut edges = Vec::with_capacity(dag.num_edges());
    for (position, &idx) in postorder.iter().enumerate() {
        positions[idx] = position;
        let node = dag.node(idx)?;
        let clades = node
            .clades
            .iter()
            .map(|es| {
                es.clade
                    .iter()
                    .map(label_idx)
                    .collect::<Result<BTreeSet<usize>>>()
                    .map(|set| set.into_iter().collect::<Vec<usize>>())
            })
            .collect::<Result<Vec<_>>>()?;
        nodes.push((label_idx(&node.label)?, clades));
        for (clade_idx, es) in node.clades.iter().enumerate() {
            for &child in &es.children {
                edges.push((position, positions[child], clade_idx));
            }
        }
    }

    let mut compact_genomes: Vec<Option<FlatGenome>> =
        genomes.iter().map(|cg| Some(flat_genome(cg))).collect();
    compact_genomes.push(None);

    Ok(FlatDag {
        refseq: (
            dag.refseq_id().unwrap_or(DEFAULT_REFSEQ_ID).to_string(),
            reference.to_string(),
        ),
        compact_genomes,
        nodes,
        edges,
    })
}

///
/// Rebuild a history DAG from its flattened form. The last node is the universal
/// ancestor and must have exactly one clade.
///
pub fn unflatten(flat: &FlatDag) -> Result<HistoryDag> {
    let reference: Arc<str> = Arc::from(flat.refseq.1.as_str());
    let genomes = flat
        .compact_genomes
        .iter()
        .map(|g| g.as_ref().map(|g| genome_from_flat(g, &reference)).transpose())
        .collect::<Result<Vec<Option<CompactGenome>>>>()?;

    let label = |idx: usize| -> Result<Label> {
        genomes
            .get(idx)
            .and_then(Option::as_ref)
            .map(|cg| Label::from_genome(cg.clone()))
            .ok_or_else(|| {
                MadError::MalformedInput(format!("genome index {} does not name a genome", idx))
            })
    };
    let clade = |indices: &Vec<usize>| -> Result<Clade> {
        indices
            .iter()
            .map(|&i| label(i).map(NodeLabel::Node))
            .collect()
    };

    let Some(ua_position) = flat.nodes.len().checked_sub(1) else {
        return Err(MadError::MalformedInput("no nodes".to_string()));
    };
    let mut builder = DagBuilder::with_capacity(flat.nodes.len());
    for (position, (genome_idx, clades)) in flat.nodes.iter().enumerate() {
        let clades = clades.iter().map(clade).collect::<Result<Vec<Clade>>>()?;
        if position == ua_position {
            let [ua_clade] = <[Clade; 1]>::try_from(clades).map_err(|c| {
                MadError::MalformedInput(format!(
                    "last node must have exactly one clade, found {}",
                    c.len()
                ))
            })?;
            builder.add_ua_node(ua_clade)?;
        } else {
            builder.add_node(label(*genome_idx)?, clades);
        }
    }

    for &(parent, child, clade_idx) in &flat.edges {
        builder.add_edge(parent as NodeIndex, child as NodeIndex, clade_idx)?;
    }

    let ambiguous = genomes.iter().flatten().any(CompactGenome::has_ambiguity);
    let kind = if ambiguous {
        DagKind::AmbiguousLeafCompactGenomes
    } else {
        DagKind::CompactGenomes
    };
    let mut dag = builder.build(kind)?;
    dag.set_refseq_id(flat.refseq.0.as_str());
    Ok(dag)
}

/// A node as `(genome index, set of clade index sets)`.
type CanonicalNode = (usize, BTreeSet<BTreeSet<usize>>);

fn canonical_edges(flat: &FlatDag) -> BTreeSet<(CanonicalNode, CanonicalNode)> {
    let nodes: Vec<CanonicalNode> = flat
        .nodes
        .iter()
        .map(|(genome_idx, clades)| {
            (
                *genome_idx,
                clades.iter().map(|c| c.iter().copied().collect()).collect(),
            )
        })
        .collect();
    flat.edges
        .iter()
        .filter_map(|&(p, c, _)| Some((nodes.get(p)?.clone(), nodes.get(c)?.clone())))
        .collect()
}

///
/// Structural equality of two history DAGs.
///
/// Compares the reference sequence, the set of genomes, and the set of edges with
/// each endpoint identified by its genome and child clades. Node order, clade
/// order, edge order and node ids do not matter.
///
pub fn test_equal(a: &HistoryDag, b: &HistoryDag) -> Result<bool> {
    let flat_a = flatten(a, true)?;
    let flat_b = flatten(b, true)?;
    Ok(flat_a.refseq.1 == flat_b.refseq.1
        && flat_a.compact_genomes == flat_b.compact_genomes
        && canonical_edges(&flat_a) == canonical_edges(&flat_b))
}

/// Serialize a history DAG to flattened JSON.
pub fn to_json(dag: &HistoryDag, sort_genomes: bool) -> Result<String> {
    Ok(serde_json::to_string(&flatten(dag, sort_genomes)?)?)
}

/// Parse a history DAG from flattened JSON.
pub fn from_json(json: &str) -> Result<HistoryDag> {
    let flat: FlatDag = serde_json::from_str(json)?;
    unflatten(&flat)
}

///
/// Write a history DAG as flattened JSON, gzipped if the path ends in `.gz`.
///
pub fn to_json_file<P: AsRef<Path>>(
    dag: &HistoryDag,
    path: P,
    sort_genomes: bool,
) -> anyhow::Result<()> {
    let path = path.as_ref();
    let json = to_json(dag, sort_genomes)?;
    let mut writer = get_dynamic_writer(path)?;
    writer
        .write_all(json.as_bytes())
        .with_context(|| format!("Failed to write {:?}", path))?;
    writer
        .finish()
        .with_context(|| format!("Failed to finish {:?}", path))?;
    Ok(())
}

///
/// Load a history DAG from a flattened JSON file (optionally gzipped).
///
pub fn load_json_file<P: AsRef<Path>>(path: P) -> anyhow::Result<HistoryDag> {
    let path = path.as_ref();
    let mut json = String::new();
    get_dynamic_reader(path)?
        .read_to_string(&mut json)
        .with_context(|| format!("Failed to read {:?}", path))?;
    from_json(&json).with_context(|| format!("Failed to load DAG from {:?}", path))
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use rstest::*;

    #[fixture]
    fn flat_dag() -> FlatDag {
        // ua -> r{a, b}; r carries the reference genome
        FlatDag {
            refseq: ("ref".to_string(), "ACGT".to_string()),
            compact_genomes: vec![
                Some(vec![(2, ('C', 'T'))]),
                Some(vec![(4, ('T', 'A'))]),
                Some(vec![]),
                None,
            ],
            nodes: vec![
                (0, vec![]),
                (1, vec![]),
                (2, vec![vec![0], vec![1]]),
                (3, vec![vec![0, 1]]),
            ],
            edges: vec![(2, 0, 0), (2, 1, 1), (3, 2, 0)],
        }
    }

    #[rstest]
    fn test_unflatten(flat_dag: FlatDag) {
        let dag = unflatten(&flat_dag).unwrap();
        assert_eq!(dag.num_nodes(), 4);
        assert_eq!(dag.num_edges(), 3);
        assert_eq!(dag.kind(), DagKind::CompactGenomes);
        assert_eq!(dag.refseq_id(), Some("ref"));
        assert!(dag.node(dag.root()).unwrap().is_ua());
        assert_eq!(dag.count_histories(), 1);
    }

    #[rstest]
    fn test_flatten_sorted(flat_dag: FlatDag) {
        let dag = unflatten(&flat_dag).unwrap();
        let flat = flatten(&dag, true).unwrap();
        assert_eq!(
            flat.compact_genomes,
            vec![
                Some(vec![]),
                Some(vec![(2, ('C', 'T'))]),
                Some(vec![(4, ('T', 'A'))]),
                None,
            ]
        );
        assert_eq!(flat.nodes.last().unwrap(), &(3, vec![vec![1, 2]]));
        assert!(test_equal(&dag, &unflatten(&flat).unwrap()).unwrap());
    }

    #[rstest]
    fn test_json_round_trip(flat_dag: FlatDag) {
        let dag = unflatten(&flat_dag).unwrap();
        let json = to_json(&dag, false).unwrap();
        assert!(json.contains("\"refseq\":[\"ref\",\"ACGT\"]"));
        let reloaded = from_json(&json).unwrap();
        assert!(test_equal(&dag, &reloaded).unwrap());
    }

    #[rstest]
    fn test_not_equal_on_genome_change(flat_dag: FlatDag) {
        let dag = unflatten(&flat_dag).unwrap();
        let mut other = flat_dag.clone();
        other.compact_genomes[1] = Some(vec![(4, ('T', 'G'))]);
        let other = unflatten(&other).unwrap();
        assert!(!test_equal(&dag, &other).unwrap());
    }

    #[rstest]
    fn test_not_equal_on_topology_change(flat_dag: FlatDag) {
        let dag = unflatten(&flat_dag).unwrap();
        // same genomes, but b's genome now sits on the internal node and r's on a leaf
        let other = FlatDag {
            nodes: vec![
                (0, vec![]),
                (2, vec![]),
                (1, vec![vec![0], vec![2]]),
                (3, vec![vec![0, 2]]),
            ],
            ..flat_dag
        };
        let other = unflatten(&other).unwrap();
        assert!(!test_equal(&dag, &other).unwrap());
    }

    #[rstest]
    fn test_unflatten_rejects_bad_indices(flat_dag: FlatDag) {
        let mut bad = flat_dag.clone();
        bad.nodes[2].1[0] = vec![9];
        assert!(matches!(unflatten(&bad), Err(MadError::MalformedInput(_))));

        let mut bad = flat_dag.clone();
        bad.nodes[3].1.push(vec![0]);
        assert!(matches!(unflatten(&bad), Err(MadError::MalformedInput(_))));

        let mut bad = flat_dag;
        bad.edges.push((3, 7, 0));
        assert!(matches!(unflatten(&bad), Err(MadError::Dag(_))));
    }
}
