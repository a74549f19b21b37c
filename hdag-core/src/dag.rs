//! Minimal arena-backed history DAG.
//!
//! Nodes live in a `Vec` and refer to each other by index. Each node groups its
//! child edges by clade: the set of leaf labels reachable below the child. The
//! universal ancestor (UA) is the unique root and always has exactly one clade.

use std::collections::BTreeSet;
use std::fmt::{self, Display};
use std::sync::Arc;

use fxhash::FxHashMap;

use crate::errors::{DagError, DagResult, GenomeError};
use crate::models::{CompactGenome, Label, NodeLabel};
use crate::weights::EdgeWeight;

pub type NodeIndex = usize;

/// Set of leaf labels below a node.
pub type Clade = BTreeSet<NodeLabel>;

/// The shape of the labels a DAG carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DagKind {
    /// Topology only: labels carry node ids and no genomes.
    NodeIds,
    CompactGenomes,
    /// Compact genomes where at least one leaf carries IUPAC ambiguity codes.
    AmbiguousLeafCompactGenomes,
}

impl DagKind {
    pub fn has_genomes(&self) -> bool {
        !matches!(self, DagKind::NodeIds)
    }

    /// The edge weight that fits this kind of label, if any.
    pub fn edge_weight(&self) -> Option<EdgeWeight> {
        match self {
            DagKind::NodeIds => None,
            DagKind::CompactGenomes => Some(EdgeWeight::CompactGenomeHamming),
            DagKind::AmbiguousLeafCompactGenomes => Some(EdgeWeight::AmbiguousLeafHamming),
        }
    }
}

/// Child edges of a node that all lead to the same clade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeSet {
    pub clade: Clade,
    pub children: Vec<NodeIndex>,
}

#[derive(Debug, Clone)]
pub struct Node {
    pub label: NodeLabel,
    pub clades: Vec<EdgeSet>,
    pub parents: Vec<NodeIndex>,
}

impl Node {
    pub fn is_leaf(&self) -> bool {
        self.clades.is_empty()
    }

    pub fn is_ua(&self) -> bool {
        self.label.is_ua()
    }

    pub fn children(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.clades.iter().flat_map(|es| es.children.iter().copied())
    }

    /// Index of the edge set for `clade`, if this node has one.
    pub fn clade_index(&self, clade: &Clade) -> Option<usize> {
        self.clades.iter().position(|es| &es.clade == clade)
    }

    ///
    /// The clade this node sits above: its own label for a leaf, otherwise the
    /// union of its child clades.
    ///
    pub fn clade_union(&self) -> Clade {
        if self.is_leaf() {
            BTreeSet::from([self.label.clone()])
        } else {
            self.clades
                .iter()
                .flat_map(|es| es.clade.iter().cloned())
                .collect()
        }
    }
}

#[derive(Debug, Clone)]
pub struct HistoryDag {
    nodes: Vec<Node>,
    root: NodeIndex,
    kind: DagKind,
    refseq_id: Option<String>,
}

impl HistoryDag {
    pub fn root(&self) -> NodeIndex {
        self.root
    }

    pub fn kind(&self) -> DagKind {
        self.kind
    }

    pub fn set_kind(&mut self, kind: DagKind) {
        self.kind = kind;
    }

    /// Identifier of the reference sequence, when one was recorded.
    pub fn refseq_id(&self) -> Option<&str> {
        self.refseq_id.as_deref()
    }

    pub fn set_refseq_id<S: Into<String>>(&mut self, refseq_id: S) {
        self.refseq_id = Some(refseq_id.into());
    }

    pub fn node(&self, idx: NodeIndex) -> DagResult<&Node> {
        self.nodes.get(idx).ok_or(DagError::InvalidNode(idx))
    }

    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_edges(&self) -> usize {
        self.nodes
            .iter()
            .map(|n| n.clades.iter().map(|es| es.children.len()).sum::<usize>())
            .sum()
    }

    pub fn leaves(&self) -> Vec<NodeIndex> {
        (0..self.nodes.len())
            .filter(|&i| self.nodes[i].is_leaf() && !self.nodes[i].is_ua())
            .collect()
    }

    ///
    /// Every node reachable from the root, children before parents. Child edges
    /// are followed in clade order, then edge order.
    ///
    pub fn postorder(&self) -> Vec<NodeIndex> {
        let mut order = Vec::with_capacity(self.nodes.len());
        let mut visited = vec![false; self.nodes.len()];
        let mut stack: Vec<(NodeIndex, bool)> = vec![(self.root, false)];

        while let Some((idx, expanded)) = stack.pop() {
            if expanded {
                order.push(idx);
                continue;
            }
            if visited[idx] {
                continue;
            }
            visited[idx] = true;
            stack.push((idx, true));

            let children: Vec<NodeIndex> = self.nodes[idx].children().collect();
            for &child in children.iter().rev() {
                if !visited[child] {
                    stack.push((child, false));
                }
            }
        }
        order
    }

    /// Parents before children. With `skip_ua` the root is left out.
    pub fn preorder(&self, skip_ua: bool) -> Vec<NodeIndex> {
        self.postorder()
            .into_iter()
            .rev()
            .filter(|&i| !(skip_ua && self.nodes[i].is_ua()))
            .collect()
    }

    /// All `(parent, child)` pairs, grouped by parent.
    pub fn edges(&self) -> Vec<(NodeIndex, NodeIndex)> {
        self.nodes
            .iter()
            .enumerate()
            .flat_map(|(p, node)| node.children().map(move |c| (p, c)))
            .collect()
    }

    ///
    /// Number of trees (histories) the DAG contains. Saturates at `u128::MAX`.
    ///
    pub fn count_histories(&self) -> u128 {
        let mut counts = vec![0u128; self.nodes.len()];
        for idx in self.postorder() {
            let node = &self.nodes[idx];
            counts[idx] = if node.is_leaf() {
                1
            } else {
                node.clades.iter().fold(1u128, |acc, es| {
                    let below = es
                        .children
                        .iter()
                        .fold(0u128, |s, &c| s.saturating_add(counts[c]));
                    acc.saturating_mul(below)
                })
            };
        }
        counts[self.root]
    }

    /// The reference sequence shared by every compact genome in the DAG.
    pub fn reference_sequence(&self) -> Option<&Arc<str>> {
        self.nodes
            .iter()
            .find_map(|n| n.label.compact_genome())
            .map(|cg| cg.reference())
    }

    ///
    /// Edge weights of every edge, in the order of [`HistoryDag::edges`].
    ///
    pub fn edge_weights(&self, weight: EdgeWeight) -> DagResult<Vec<usize>> {
        self.edges()
            .into_iter()
            .map(|(p, c)| {
                weight
                    .weight(&self.nodes[p].label, &self.nodes[c].label)
                    .map_err(DagError::from)
            })
            .collect()
    }

    /// Counts and shape of this DAG.
    pub fn summary(&self) -> DagResult<DagSummary> {
        let weights = match self.kind.edge_weight() {
            Some(weight) => self.edge_weights(weight)?,
            None => Vec::new(),
        };
        Ok(DagSummary {
            kind: self.kind,
            num_nodes: self.nodes.len(),
            num_edges: self.num_edges(),
            num_leaves: self.leaves().len(),
            num_histories: self.count_histories(),
            reference_length: self.reference_sequence().map(|r| r.len()),
            refseq_id: self.refseq_id.clone(),
            max_edge_weight: weights.iter().copied().max(),
            total_edge_weight: weights.iter().sum(),
        })
    }

    ///
    /// Check structural invariants: a single UA root with one clade, every node
    /// reachable, parent links matching child links, every edge set matching the
    /// clade of each child it holds, and one shared reference sequence.
    ///
    pub fn check_valid(&self) -> DagResult<()> {
        let root = self.node(self.root)?;
        if !root.is_ua() {
            return Err(DagError::MissingRoot);
        }
        if root.clades.len() != 1 {
            return Err(DagError::Invalid(format!(
                "universal ancestor must have exactly one clade, found {}",
                root.clades.len()
            )));
        }

        let reachable = self.postorder();
        if reachable.len() != self.nodes.len() {
            return Err(DagError::Invalid(format!(
                "{} of {} nodes are unreachable from the root",
                self.nodes.len() - reachable.len(),
                self.nodes.len()
            )));
        }

        let mut parent_links: Vec<Vec<NodeIndex>> = vec![Vec::new(); self.nodes.len()];
        let mut reference: Option<&CompactGenome> = None;
        for (idx, node) in self.nodes.iter().enumerate() {
            if idx != self.root && node.is_ua() {
                return Err(DagError::Invalid(format!(
                    "node {} is a second universal ancestor",
                    idx
                )));
            }
            if let Some(cg) = node.label.compact_genome() {
                match reference {
                    Some(first) if !first.same_reference(cg) => {
                        return Err(GenomeError::ReferenceMismatch.into());
                    }
                    Some(_) => {}
                    None => reference = Some(cg),
                }
            }
            for (clade_idx, es) in node.clades.iter().enumerate() {
                if es.children.is_empty() {
                    return Err(DagError::InvalidClade {
                        node: idx,
                        clade: clade_idx,
                    });
                }
                for &child in &es.children {
                    if self.node(child)?.clade_union() != es.clade {
                        return Err(DagError::Invalid(format!(
                            "child {} of node {} does not match its clade",
                            child, idx
                        )));
                    }
                    parent_links[child].push(idx);
                }
            }
        }

        for (idx, node) in self.nodes.iter().enumerate() {
            let mut expected = parent_links[idx].clone();
            let mut recorded = node.parents.clone();
            expected.sort_unstable();
            recorded.sort_unstable();
            if expected != recorded {
                return Err(DagError::Invalid(format!(
                    "parent links of node {} are inconsistent",
                    idx
                )));
            }
        }
        Ok(())
    }

    ///
    /// A copy of this DAG with every real label passed through `f`. Clades are
    /// relabeled consistently. `f` must keep distinct labels distinct.
    ///
    pub fn map_labels<F>(&self, kind: DagKind, f: F) -> HistoryDag
    where
        F: Fn(&Label) -> Label,
    {
        let mut mapped: FxHashMap<NodeLabel, NodeLabel> = FxHashMap::default();
        let mut map = |label: &NodeLabel| -> NodeLabel {
            match label {
                NodeLabel::UniversalAncestor => NodeLabel::UniversalAncestor,
                NodeLabel::Node(inner) => mapped
                    .entry(label.clone())
                    .or_insert_with(|| NodeLabel::Node(f(inner)))
                    .clone(),
            }
        };

        let nodes = self
            .nodes
            .iter()
            .map(|node| Node {
                label: map(&node.label),
                clades: node
                    .clades
                    .iter()
                    .map(|es| EdgeSet {
                        clade: es.clade.iter().map(&mut map).collect(),
                        children: es.children.clone(),
                    })
                    .collect(),
                parents: node.parents.clone(),
            })
            .collect();

        HistoryDag {
            nodes,
            root: self.root,
            kind,
            refseq_id: self.refseq_id.clone(),
        }
    }
}

/// Summary statistics of a [`HistoryDag`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DagSummary {
    pub kind: DagKind,
    pub num_nodes: usize,
    pub num_edges: usize,
    pub num_leaves: usize,
    pub num_histories: u128,
    pub reference_length: Option<usize>,
    pub refseq_id: Option<String>,
    /// Largest edge weight under the kind's edge weight, if it has one.
    pub max_edge_weight: Option<usize>,
    pub total_edge_weight: usize,
}

impl Display for DagSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "kind:\t{:?}", self.kind)?;
        writeln!(f, "nodes:\t{}", self.num_nodes)?;
        writeln!(f, "edges:\t{}", self.num_edges)?;
        writeln!(f, "leaves:\t{}", self.num_leaves)?;
        writeln!(f, "histories:\t{}", self.num_histories)?;
        if let Some(length) = self.reference_length {
            writeln!(f, "reference length:\t{}", length)?;
        }
        if let Some(id) = &self.refseq_id {
            writeln!(f, "reference id:\t{}", id)?;
        }
        if let Some(max) = self.max_edge_weight {
            writeln!(f, "max edge weight:\t{}", max)?;
            writeln!(f, "total edge weight:\t{}", self.total_edge_weight)?;
        }
        Ok(())
    }
}

///
/// Incremental constructor for a [`HistoryDag`].
///
/// Real nodes are added with [`DagBuilder::add_node`]; the universal ancestor
/// has its own path, [`DagBuilder::add_ua_node`], and must be added exactly once.
///
#[derive(Debug, Default)]
pub struct DagBuilder {
    nodes: Vec<Node>,
    ua: Option<NodeIndex>,
}

impl DagBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        DagBuilder {
            nodes: Vec::with_capacity(capacity),
            ua: None,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Add a real node whose child edges will fall into `clades`.
    pub fn add_node(&mut self, label: Label, clades: Vec<Clade>) -> NodeIndex {
        self.push(NodeLabel::Node(label), clades)
    }

    /// Add the universal ancestor, which sits above the single clade of all leaves.
    pub fn add_ua_node(&mut self, clade: Clade) -> DagResult<NodeIndex> {
        if self.ua.is_some() {
            return Err(DagError::Invalid(
                "universal ancestor was already added".to_string(),
            ));
        }
        let idx = self.push(NodeLabel::UniversalAncestor, vec![clade]);
        self.ua = Some(idx);
        Ok(idx)
    }

    fn push(&mut self, label: NodeLabel, clades: Vec<Clade>) -> NodeIndex {
        self.nodes.push(Node {
            label,
            clades: clades
                .into_iter()
                .map(|clade| EdgeSet {
                    clade,
                    children: Vec::new(),
                })
                .collect(),
            parents: Vec::new(),
        });
        self.nodes.len() - 1
    }

    /// Add an edge from `parent`'s clade number `clade` to `child`. Duplicate edges are ignored.
    pub fn add_edge(&mut self, parent: NodeIndex, child: NodeIndex, clade: usize) -> DagResult<()> {
        if child >= self.nodes.len() {
            return Err(DagError::InvalidNode(child));
        }
        let es = self
            .nodes
            .get_mut(parent)
            .ok_or(DagError::InvalidNode(parent))?
            .clades
            .get_mut(clade)
            .ok_or(DagError::InvalidClade {
                node: parent,
                clade,
            })?;
        if es.children.contains(&child) {
            return Ok(());
        }
        es.children.push(child);
        self.nodes[child].parents.push(parent);
        Ok(())
    }

    /// Finish construction and validate the result.
    pub fn build(self, kind: DagKind) -> DagResult<HistoryDag> {
        let root = self.ua.ok_or(DagError::MissingRoot)?;
        let dag = HistoryDag {
            nodes: self.nodes,
            root,
            kind,
            refseq_id: None,
        };
        dag.check_valid()?;
        Ok(dag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use rstest::*;

    fn leaf(id: &str) -> NodeLabel {
        NodeLabel::Node(Label::from_node_id(id))
    }

    fn clade(ids: &[&str]) -> Clade {
        ids.iter().map(|id| leaf(id)).collect()
    }

    ///
    /// UA -> r{a,b,c}; r has two resolutions of {a,b}: x and y, both above a and b.
    ///
    #[fixture]
    fn two_tree_dag() -> HistoryDag {
        let mut b = DagBuilder::new();
        let a = b.add_node(Label::from_node_id("a"), vec![]);
        let bb = b.add_node(Label::from_node_id("b"), vec![]);
        let c = b.add_node(Label::from_node_id("c"), vec![]);
        let x = b.add_node(Label::from_node_id("x"), vec![clade(&["a"]), clade(&["b"])]);
        let y = b.add_node(Label::from_node_id("y"), vec![clade(&["a"]), clade(&["b"])]);
        let r = b.add_node(
            Label::from_node_id("r"),
            vec![clade(&["a", "b"]), clade(&["c"])],
        );
        let ua = b.add_ua_node(clade(&["a", "b", "c"])).unwrap();
        for p in [x, y] {
            b.add_edge(p, a, 0).unwrap();
            b.add_edge(p, bb, 1).unwrap();
        }
        b.add_edge(r, x, 0).unwrap();
        b.add_edge(r, y, 0).unwrap();
        b.add_edge(r, c, 1).unwrap();
        b.add_edge(ua, r, 0).unwrap();
        b.build(DagKind::NodeIds).unwrap()
    }

    #[rstest]
    fn test_counts(two_tree_dag: HistoryDag) {
        assert_eq!(two_tree_dag.num_nodes(), 7);
        assert_eq!(two_tree_dag.num_edges(), 8);
        assert_eq!(two_tree_dag.leaves().len(), 3);
        assert_eq!(two_tree_dag.count_histories(), 2);
    }

    #[rstest]
    fn test_summary(two_tree_dag: HistoryDag) {
        let summary = two_tree_dag.summary().unwrap();
        assert_eq!(summary.num_histories, 2);
        assert_eq!(summary.num_leaves, 3);
        assert_eq!(summary.reference_length, None);
        assert_eq!(summary.max_edge_weight, None);
        assert!(summary.to_string().contains("histories:\t2"));
    }

    #[rstest]
    fn test_postorder_children_first(two_tree_dag: HistoryDag) {
        let order = two_tree_dag.postorder();
        assert_eq!(order.len(), 7);
        assert_eq!(*order.last().unwrap(), two_tree_dag.root());
        let position: FxHashMap<NodeIndex, usize> =
            order.iter().enumerate().map(|(i, &n)| (n, i)).collect();
        for (p, c) in two_tree_dag.edges() {
            assert!(position[&c] < position[&p]);
        }
    }

    #[rstest]
    fn test_preorder_skip_ua(two_tree_dag: HistoryDag) {
        let order = two_tree_dag.preorder(true);
        assert_eq!(order.len(), 6);
        assert_eq!(two_tree_dag.nodes()[order[0]].label, leaf("r"));
    }

    #[rstest]
    fn test_map_labels(two_tree_dag: HistoryDag) {
        let upper = two_tree_dag.map_labels(DagKind::NodeIds, |l| {
            Label::from_node_id(l.node_id.as_deref().unwrap_or("").to_uppercase())
        });
        assert!(upper.check_valid().is_ok());
        let root_child = upper.node(upper.root()).unwrap().clades[0].clone();
        assert_eq!(root_child.clade, clade(&["A", "B", "C"]));
    }

    #[rstest]
    fn test_clade_mismatch_is_rejected() {
        let mut b = DagBuilder::new();
        let a = b.add_node(Label::from_node_id("a"), vec![]);
        let ua = b.add_ua_node(clade(&["b"])).unwrap();
        b.add_edge(ua, a, 0).unwrap();
        assert!(matches!(b.build(DagKind::NodeIds), Err(DagError::Invalid(_))));
    }

    #[rstest]
    fn test_builder_errors() {
        let mut b = DagBuilder::new();
        let a = b.add_node(Label::from_node_id("a"), vec![]);
        assert_eq!(
            b.add_edge(a, a, 0),
            Err(DagError::InvalidClade { node: a, clade: 0 })
        );
        assert_eq!(b.add_edge(a, 7, 0), Err(DagError::InvalidNode(7)));
        b.add_ua_node(clade(&["a"])).unwrap();
        assert!(b.add_ua_node(clade(&["a"])).is_err());
    }

    #[rstest]
    fn test_missing_ua() {
        let mut b = DagBuilder::new();
        b.add_node(Label::from_node_id("a"), vec![]);
        assert_eq!(b.build(DagKind::NodeIds).unwrap_err(), DagError::MissingRoot);
    }
}
