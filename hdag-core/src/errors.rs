use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenomeError {
    #[error("Reference sequences do not match")]
    ReferenceMismatch,

    #[error("Sequence length {sequence} does not match reference length {reference}")]
    LengthMismatch { sequence: usize, reference: usize },

    #[error("Site {position} is outside of the reference sequence (length {length})")]
    PositionOutOfRange { position: usize, length: usize },

    #[error("Invalid nucleotide: {0:?}")]
    InvalidBase(char),

    #[error("Invalid mutation string {0:?}: expected old base, 1-based site, new base (e.g. A110G)")]
    InvalidMutation(String),

    #[error("Cannot reconcile an empty set of compact genomes")]
    EmptyReconciliation,

    #[error("Node label has no compact genome")]
    MissingGenome,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DagError {
    #[error("History DAG has no universal ancestor node")]
    MissingRoot,

    #[error("Node index {0} does not exist")]
    InvalidNode(usize),

    #[error("Node {node} has no clade with index {clade}")]
    InvalidClade { node: usize, clade: usize },

    #[error("Invalid history DAG: {0}")]
    Invalid(String),

    #[error(transparent)]
    Genome(#[from] GenomeError),
}

/// Result type alias for compact genome operations.
pub type Result<T> = std::result::Result<T, GenomeError>;

/// Result type alias for history DAG operations.
pub type DagResult<T> = std::result::Result<T, DagError>;
