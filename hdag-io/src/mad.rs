//! Conversion between history DAGs and Larch mutation-annotated DAG (MAD) protobufs.
//!
//! In the protobuf form node sequences are implicit: each edge carries the mutations
//! between parent and child, and the universal ancestor carries the reference.

use std::collections::BTreeSet;
use std::io::{Read, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use fxhash::{FxHashMap, FxHashSet};
use log::{debug, info, warn};
use prost::Message;

use hdag_core::models::nucleotide::{base_from_protobuf, code_for_bases, protobuf_code, resolutions};
use hdag_core::{
    Clade, CompactGenome, DagBuilder, DagKind, HistoryDag, Label, Mutation, NodeIndex, NodeLabel,
    reconcile,
};

use crate::error::{MadError, Result};
use crate::proto::{Data, Edge, Mut, NodeName};
use crate::utils::{get_dynamic_reader, get_dynamic_writer};

/// Reference id written when the DAG does not record one.
pub const DEFAULT_REFSEQ_ID: &str = "unknown_seqid";

/// Options controlling how a MAD protobuf is turned into a history DAG.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Keep only topology: labels carry node ids and no genomes.
    pub topology_only: bool,
    /// Leaf genomes keyed by leaf identifier. When given, leaf genomes are taken
    /// from here instead of being inferred from pendant edge mutations.
    pub leaf_genomes: Option<FxHashMap<String, CompactGenome>>,
}

/// Node and edge lookup tables over one protobuf message.
struct WireIndex<'a> {
    data: &'a Data,
    records: FxHashMap<i64, &'a NodeName>,
    parent_edges: FxHashMap<i64, Vec<&'a Edge>>,
    child_edges: FxHashMap<i64, Vec<&'a Edge>>,
}

impl<'a> WireIndex<'a> {
    fn new(data: &'a Data) -> Result<Self> {
        let mut records = FxHashMap::default();
        let mut parent_edges: FxHashMap<i64, Vec<&Edge>> = FxHashMap::default();
        let mut child_edges: FxHashMap<i64, Vec<&Edge>> = FxHashMap::default();
        for record in &data.node_names {
            if records.insert(record.node_id, record).is_some() {
                return Err(MadError::MalformedInput(format!(
                    "node id {} appears more than once",
                    record.node_id
                )));
            }
            parent_edges.insert(record.node_id, Vec::new());
            child_edges.insert(record.node_id, Vec::new());
        }
        for edge in &data.edges {
            let (Some(parents), true) = (
                parent_edges.get_mut(&edge.child_node),
                child_edges.contains_key(&edge.parent_node),
            ) else {
                return Err(MadError::MalformedInput(format!(
                    "edge {} -> {} refers to an unknown node",
                    edge.parent_node, edge.child_node
                )));
            };
            parents.push(edge);
            if let Some(children) = child_edges.get_mut(&edge.parent_node) {
                children.push(edge);
            }
        }
        Ok(WireIndex {
            data,
            records,
            parent_edges,
            child_edges,
        })
    }

    fn parents(&self, id: i64) -> &[&'a Edge] {
        self.parent_edges.get(&id).map_or(&[], Vec::as_slice)
    }

    fn children(&self, id: i64) -> &[&'a Edge] {
        self.child_edges.get(&id).map_or(&[], Vec::as_slice)
    }

    fn is_leaf(&self, id: i64) -> bool {
        self.children(id).is_empty()
    }

    fn leaf_name(&self, id: i64) -> Option<&'a str> {
        self.records
            .get(&id)
            .and_then(|r| r.condensed_leaves.first())
            .map(String::as_str)
    }

    /// The unique node without parent edges.
    fn root(&self) -> Result<i64> {
        let roots: Vec<i64> = self
            .data
            .node_names
            .iter()
            .map(|r| r.node_id)
            .filter(|id| self.parents(*id).is_empty())
            .collect();
        match roots.as_slice() {
            [root] => Ok(*root),
            [] => Err(MadError::MalformedInput(
                "no node without parent edges".to_string(),
            )),
            many => Err(MadError::MalformedInput(format!(
                "{} nodes without parent edges, expected one",
                many.len()
            ))),
        }
    }

    /// Node ids reachable from `root`, children first, each listed once.
    fn postorder(&self, root: i64) -> Vec<i64> {
        let mut order = Vec::with_capacity(self.records.len());
        let mut visited: FxHashSet<i64> = FxHashSet::default();
        let mut stack = vec![(root, false)];
        while let Some((id, expanded)) = stack.pop() {
            if expanded {
                order.push(id);
                continue;
            }
            if !visited.insert(id) {
                continue;
            }
            stack.push((id, true));
            for edge in self.children(id).iter().rev() {
                if !visited.contains(&edge.child_node) {
                    stack.push((edge.child_node, false));
                }
            }
        }
        order
    }
}

fn wire_mutation(m: &Mut) -> Result<Mutation> {
    let malformed = || MadError::MalformedInput(format!("invalid edge mutation {:?}", m));
    let position = usize::try_from(m.position)
        .ok()
        .filter(|p| *p > 0)
        .ok_or_else(malformed)?;
    let old = base_from_protobuf(m.par_nuc).ok_or_else(malformed)?;
    let new = match m.mut_nuc.as_slice() {
        [] => return Err(malformed()),
        [code] => base_from_protobuf(*code).ok_or_else(malformed)?,
        codes => {
            let bases = codes
                .iter()
                .map(|c| base_from_protobuf(*c).ok_or_else(malformed))
                .collect::<Result<Vec<u8>>>()?;
            code_for_bases(&bases)?
        }
    };
    Ok(Mutation::new(old, new, position))
}

fn to_wire_mutation(m: &Mutation) -> Result<Mut> {
    let position = i32::try_from(m.position).map_err(|_| {
        MadError::NotSupported(format!("site {} does not fit the protobuf format", m.position))
    })?;
    let mut_nuc = resolutions(m.new)?
        .into_iter()
        .map(protobuf_code)
        .collect::<hdag_core::errors::Result<Vec<i32>>>()?;
    if mut_nuc.is_empty() {
        return Err(MadError::NotSupported(format!(
            "mutation {} has no nucleotide to write",
            m
        )));
    }
    Ok(Mut {
        position,
        par_nuc: protobuf_code(m.old)?,
        mut_nuc,
        chromosome: String::new(),
    })
}

fn apply_edge(genomes: &FxHashMap<i64, CompactGenome>, edge: &Edge) -> Result<CompactGenome> {
    let parent = genomes.get(&edge.parent_node).ok_or_else(|| {
        MadError::MalformedInput(format!(
            "parent {} of node {} has no genome",
            edge.parent_node, edge.child_node
        ))
    })?;
    let mutations = edge
        .edge_mutations
        .iter()
        .map(wire_mutation)
        .collect::<Result<Vec<Mutation>>>()?;
    Ok(parent.apply_mutations(&mutations, false)?)
}

///
/// Reconstruct every node's genome, root to leaves.
///
/// Internal nodes follow their first parent edge. Leaves take external genomes when
/// provided, otherwise the reconciliation of the genomes implied by all their
/// parent edges. Returns the genome table and whether any leaf is ambiguous.
///
fn build_genomes(
    index: &WireIndex,
    postorder: &[i64],
    reference: &Arc<str>,
    leaf_genomes: Option<&FxHashMap<String, CompactGenome>>,
) -> Result<(FxHashMap<i64, CompactGenome>, bool)> {
    let mut genomes: FxHashMap<i64, CompactGenome> = FxHashMap::default();
    let mut ambiguous = false;
    let mut reconciled = 0usize;

    let mut ids = postorder.iter().rev();
    if let Some(&root) = ids.next() {
        genomes.insert(root, CompactGenome::empty(Arc::clone(reference)));
    }

    for &id in ids {
        let genome = if !index.is_leaf(id) {
            let edge = index.parents(id).first().ok_or_else(|| {
                MadError::MalformedInput(format!("node {} has no parent edge", id))
            })?;
            apply_edge(&genomes, edge)?
        } else if let Some(leaf_genomes) = leaf_genomes {
            let name = index.leaf_name(id).ok_or_else(|| {
                MadError::MalformedInput(format!("leaf node {} has no leaf identifier", id))
            })?;
            let genome = leaf_genomes.get(name).ok_or_else(|| {
                MadError::MalformedInput(format!("no genome provided for leaf {:?}", name))
            })?;
            ambiguous |= genome.has_ambiguity();
            genome.rebase(reference)?
        } else {
            let candidates = index
                .parents(id)
                .iter()
                .map(|edge| apply_edge(&genomes, edge))
                .collect::<Result<Vec<CompactGenome>>>()?;
            if candidates.iter().collect::<FxHashSet<_>>().len() > 1 {
                reconciled += 1;
            }
            let (genome, disagreed) = reconcile(&candidates)?;
            ambiguous |= disagreed || genome.has_ambiguity();
            genome
        };
        genomes.insert(id, genome);
    }

    debug!("{} leaf genomes reconciled from differing candidates", reconciled);
    Ok((genomes, ambiguous))
}

///
/// Build a history DAG from a decoded MAD protobuf message.
///
/// Node ids in the message are not kept: the resulting DAG indexes nodes in
/// postorder, with the universal ancestor last.
///
/// # Arguments
///
/// - data: the protobuf message
/// - options: topology-only mode and optional external leaf genomes
///
pub fn decode(data: &Data, options: &LoadOptions) -> Result<HistoryDag> {
    let index = WireIndex::new(data)?;
    let ua_id = index.root()?;
    let postorder = index.postorder(ua_id);
    if postorder.len() != data.node_names.len() {
        return Err(MadError::MalformedInput(format!(
            "{} of {} nodes are unreachable from the root",
            data.node_names.len() - postorder.len(),
            data.node_names.len()
        )));
    }

    let reference: Arc<str> = Arc::from(data.reference_seq.as_str());
    let (mut genomes, ambiguous) = if options.topology_only {
        (FxHashMap::default(), false)
    } else {
        build_genomes(
            &index,
            &postorder,
            &reference,
            options.leaf_genomes.as_ref(),
        )?
    };

    let mut labels: FxHashMap<i64, Label> = FxHashMap::default();
    for &id in &postorder {
        if id == ua_id {
            continue;
        }
        let leaf = index.is_leaf(id);
        let label = if options.topology_only {
            let name = match (leaf, index.leaf_name(id)) {
                (true, Some(name)) => name.to_string(),
                _ => id.to_string(),
            };
            Label::from_node_id(name)
        } else {
            Label {
                compact_genome: genomes.remove(&id),
                node_id: if leaf {
                    index.leaf_name(id).map(str::to_string)
                } else {
                    None
                },
            }
        };
        labels.insert(id, label);
    }

    // distinct labels, first seen in node record order
    let mut label_list: Vec<NodeLabel> = Vec::new();
    let mut label_idx: FxHashMap<&Label, usize> = FxHashMap::default();
    for record in &data.node_names {
        if let Some(label) = labels.get(&record.node_id) {
            label_idx.entry(label).or_insert_with(|| {
                label_list.push(NodeLabel::Node(label.clone()));
                label_list.len() - 1
            });
        }
    }
    let node_label_idx = |id: i64| -> Result<usize> {
        labels
            .get(&id)
            .and_then(|l| label_idx.get(l))
            .copied()
            .ok_or_else(|| MadError::MalformedInput(format!("node {} has no label", id)))
    };

    // clade unions as sets of label indices
    let mut clade_unions: FxHashMap<i64, BTreeSet<usize>> = FxHashMap::default();
    for &id in &postorder {
        let union = if index.is_leaf(id) {
            BTreeSet::from([node_label_idx(id)?])
        } else {
            index
                .children(id)
                .iter()
                .filter_map(|edge| clade_unions.get(&edge.child_node))
                .flatten()
                .copied()
                .collect()
        };
        clade_unions.insert(id, union);
    }

    let to_clade = |set: &BTreeSet<usize>| -> Clade {
        set.iter().map(|&i| label_list[i].clone()).collect()
    };

    let mut builder = DagBuilder::with_capacity(postorder.len());
    let mut positions: FxHashMap<i64, NodeIndex> = FxHashMap::default();
    let mut node_clades: FxHashMap<i64, Vec<&BTreeSet<usize>>> = FxHashMap::default();
    for &id in &postorder {
        let mut clades: Vec<&BTreeSet<usize>> = Vec::new();
        for edge in index.children(id) {
            if let Some(union) = clade_unions.get(&edge.child_node) {
                if !clades.contains(&union) {
                    clades.push(union);
                }
            }
        }
        let position = if id == ua_id {
            let [clade] = clades.as_slice() else {
                return Err(MadError::MalformedInput(format!(
                    "root node {} must have exactly one clade, found {}",
                    id,
                    clades.len()
                )));
            };
            builder.add_ua_node(to_clade(*clade))?
        } else {
            let label = labels
                .get(&id)
                .cloned()
                .ok_or_else(|| MadError::MalformedInput(format!("node {} has no label", id)))?;
            builder.add_node(label, clades.iter().map(|c| to_clade(*c)).collect())
        };
        positions.insert(id, position);
        node_clades.insert(id, clades);
    }

    for edge in &data.edges {
        let clade = node_clades
            .get(&edge.parent_node)
            .zip(clade_unions.get(&edge.child_node))
            .and_then(|(clades, union)| clades.iter().position(|c| *c == union));
        match (
            positions.get(&edge.parent_node),
            positions.get(&edge.child_node),
            clade,
        ) {
            (Some(&parent), Some(&child), Some(clade)) => builder.add_edge(parent, child, clade)?,
            _ => {
                return Err(MadError::MalformedInput(format!(
                    "edge {} -> {} could not be placed",
                    edge.parent_node, edge.child_node
                )));
            }
        }
    }

    let kind = match (options.topology_only, ambiguous) {
        (true, _) => DagKind::NodeIds,
        (false, false) => DagKind::CompactGenomes,
        (false, true) => DagKind::AmbiguousLeafCompactGenomes,
    };
    let mut dag = builder.build(kind)?;
    if !data.reference_id.is_empty() {
        dag.set_refseq_id(data.reference_id.as_str());
    }

    info!(
        "Loaded MAD protobuf: {} nodes, {} edges ({:?})",
        dag.num_nodes(),
        dag.num_edges(),
        kind
    );
    Ok(dag)
}

///
/// Convert a history DAG with compact genomes to a MAD protobuf message. Leaf
/// node ids are recorded as leaf identifiers.
///
pub fn encode(dag: &HistoryDag) -> Result<Data> {
    encode_with_leaf_names(dag, |label| label.node_id.clone())
}

fn clade_key(clade: &Clade) -> Vec<Vec<usize>> {
    let mut key: Vec<Vec<usize>> = clade
        .iter()
        .map(|label| label.compact_genome().map(|cg| cg.sites()).unwrap_or_default())
        .collect();
    key.sort();
    key
}

/// The genome of a node, with the universal ancestor standing for the reference.
fn node_genome<'a>(
    dag: &'a HistoryDag,
    empty: &'a CompactGenome,
    idx: NodeIndex,
) -> Result<&'a CompactGenome> {
    let node = dag.node(idx)?;
    if node.is_ua() {
        return Ok(empty);
    }
    let genome = node
        .label
        .compact_genome()
        .ok_or_else(|| MadError::NotSupported(format!("node {} has no compact genome", idx)))?;
    if !genome.same_reference(empty) {
        return Err(hdag_core::GenomeError::ReferenceMismatch.into());
    }
    Ok(genome)
}

///
/// Like [`encode`], with `leaf_name` supplying the leaf identifier stored on each
/// leaf node record.
///
pub fn encode_with_leaf_names<F>(dag: &HistoryDag, leaf_name: F) -> Result<Data>
where
    F: Fn(&Label) -> Option<String>,
{
    let reference = dag.reference_sequence().cloned().ok_or_else(|| {
        MadError::NotSupported("node labels carry no compact genome".to_string())
    })?;
    let empty = CompactGenome::empty(Arc::clone(&reference));

    let postorder = dag.postorder();
    let mut ids: Vec<i64> = vec![0; dag.num_nodes()];
    let mut data = Data {
        reference_seq: reference.to_string(),
        reference_id: dag.refseq_id().unwrap_or(DEFAULT_REFSEQ_ID).to_string(),
        ..Default::default()
    };

    for (id, &idx) in postorder.iter().enumerate() {
        ids[idx] = id as i64;
        let node = dag.node(idx)?;
        let condensed_leaves = match &node.label {
            NodeLabel::Node(label) if node.is_leaf() => leaf_name(label).into_iter().collect(),
            _ => Vec::new(),
        };
        data.node_names.push(NodeName {
            node_id: id as i64,
            condensed_leaves,
        });
    }

    let mut silent_edges = 0usize;
    for &idx in &postorder {
        let node = dag.node(idx)?;
        let parent_genome = node_genome(dag, &empty, idx)?;
        let mut clades: Vec<_> = node.clades.iter().collect();
        clades.sort_by_cached_key(|es| clade_key(&es.clade));

        for (clade_idx, es) in clades.into_iter().enumerate() {
            for &child in &es.children {
                let mutations = parent_genome.diff(node_genome(dag, &empty, child)?)?;
                if mutations.is_empty() && !node.is_ua() && !dag.node(child)?.is_leaf() {
                    silent_edges += 1;
                }
                data.edges.push(Edge {
                    edge_id: data.edges.len() as i64,
                    parent_node: ids[idx],
                    parent_clade: clade_idx as i64,
                    child_node: ids[child],
                    edge_mutations: mutations
                        .iter()
                        .map(to_wire_mutation)
                        .collect::<Result<Vec<Mut>>>()?,
                });
            }
        }
    }
    if silent_edges > 0 {
        warn!(
            "{} edges between internal nodes carry no mutations; the DAG may not be collapsed",
            silent_edges
        );
    }

    Ok(data)
}

///
/// Decode a serialized MAD protobuf.
///
pub fn load_mad_protobuf(bytes: &[u8], options: &LoadOptions) -> Result<HistoryDag> {
    let data = Data::decode(bytes)?;
    decode(&data, options)
}

///
/// Read a MAD protobuf message from a file (optionally gzipped).
///
pub fn read_mad_data<P: AsRef<Path>>(path: P) -> anyhow::Result<Data> {
    let path = path.as_ref();
    let mut bytes = Vec::new();
    get_dynamic_reader(path)?
        .read_to_end(&mut bytes)
        .with_context(|| format!("Failed to read {:?}", path))?;
    Data::decode(bytes.as_slice())
        .with_context(|| format!("Failed to parse MAD protobuf from {:?}", path))
}

///
/// Load a MAD protobuf file (optionally gzipped) as a history DAG.
///
pub fn load_mad_protobuf_file<P: AsRef<Path>>(
    path: P,
    options: &LoadOptions,
) -> anyhow::Result<HistoryDag> {
    let path = path.as_ref();
    let data = read_mad_data(path)?;
    decode(&data, options).with_context(|| format!("Failed to load MAD protobuf from {:?}", path))
}

///
/// Write a history DAG to a MAD protobuf file, gzipped if the path ends in `.gz`.
///
pub fn to_protobuf_file<P: AsRef<Path>>(dag: &HistoryDag, path: P) -> anyhow::Result<()> {
    let path = path.as_ref();
    let data = encode(dag)?;
    let mut writer = get_dynamic_writer(path)?;
    writer
        .write_all(&data.encode_to_vec())
        .with_context(|| format!("Failed to write {:?}", path))?;
    writer
        .finish()
        .with_context(|| format!("Failed to finish {:?}", path))?;
    Ok(())
}
