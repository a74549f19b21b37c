use std::fmt::{self, Display};

use crate::models::compact_genome::CompactGenome;

///
/// Label of a real (non-UA) history DAG node.
///
/// `compact_genome` is absent for topology-only DAGs. `node_id` holds the unique
/// leaf identifier on leaves, or an engine-assigned integer id rendered as a string
/// on internal nodes.
///
#[derive(Eq, PartialEq, Hash, Debug, Clone, PartialOrd, Ord)]
pub struct Label {
    pub compact_genome: Option<CompactGenome>,
    pub node_id: Option<String>,
}

impl Label {
    pub fn from_genome(compact_genome: CompactGenome) -> Self {
        Label {
            compact_genome: Some(compact_genome),
            node_id: None,
        }
    }

    pub fn from_node_id<S: Into<String>>(node_id: S) -> Self {
        Label {
            compact_genome: None,
            node_id: Some(node_id.into()),
        }
    }

    pub fn with_node_id<S: Into<String>>(mut self, node_id: S) -> Self {
        self.node_id = Some(node_id.into());
        self
    }

    /// Full sequence derived from the compact genome, if there is one.
    pub fn sequence(&self) -> Option<String> {
        self.compact_genome.as_ref().map(|cg| cg.to_sequence())
    }
}

///
/// A history DAG node label: either the universal ancestor (UA) sentinel, or a real label.
///
/// The UA label carries no data and is equal only to itself.
///
#[derive(Eq, PartialEq, Hash, Debug, Clone, PartialOrd, Ord)]
pub enum NodeLabel {
    UniversalAncestor,
    Node(Label),
}

impl NodeLabel {
    pub fn is_ua(&self) -> bool {
        matches!(self, NodeLabel::UniversalAncestor)
    }

    pub fn label(&self) -> Option<&Label> {
        match self {
            NodeLabel::UniversalAncestor => None,
            NodeLabel::Node(label) => Some(label),
        }
    }

    pub fn compact_genome(&self) -> Option<&CompactGenome> {
        self.label().and_then(|l| l.compact_genome.as_ref())
    }

    pub fn node_id(&self) -> Option<&str> {
        self.label().and_then(|l| l.node_id.as_deref())
    }
}

impl From<Label> for NodeLabel {
    fn from(label: Label) -> Self {
        NodeLabel::Node(label)
    }
}

impl Display for NodeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeLabel::UniversalAncestor => write!(f, "UA_node"),
            NodeLabel::Node(label) => match (&label.compact_genome, &label.node_id) {
                (Some(cg), Some(id)) => write!(f, "{} {}", id, cg),
                (Some(cg), None) => write!(f, "{}", cg),
                (None, Some(id)) => write!(f, "{}", id),
                (None, None) => write!(f, "<unlabeled>"),
            },
        }
    }
}
