//! Core data structures for mutation-annotated history DAGs.
//!
//! A history DAG compactly stores a large family of phylogenetic trees over the same
//! set of leaves. This crate provides the sequence side of that picture:
//!
//! - [`CompactGenome`]: a nucleotide sequence stored as a sparse set of substitutions
//!   against a shared reference, with apply/diff/hamming operations.
//! - [`reconcile`]: merging several candidate genomes for one node into a single
//!   genome with IUPAC ambiguity codes where they disagree.
//! - [`NodeLabel`]: node labels with a distinguished universal ancestor (UA) sentinel.
//! - [`EdgeWeight`]: edge weight dispatch over labels.
//! - [`HistoryDag`] and [`DagBuilder`]: a small arena-backed DAG with the traversals
//!   and clade bookkeeping the codecs in `hdag-io` consume.
//!
//! ## Quick Start
//!
//! ```rust
//! use std::sync::Arc;
//! use hdag_core::CompactGenome;
//!
//! let reference: Arc<str> = Arc::from("AAAA");
//! let parent = CompactGenome::from_sequence("AAAA", reference.clone()).unwrap();
//! let child = CompactGenome::from_sequence("ACAA", reference).unwrap();
//!
//! let diff = parent.diff(&child).unwrap();
//! assert_eq!(diff[0].to_string(), "A2C");
//! assert_eq!(parent.apply_mutations(&diff, false).unwrap(), child);
//! ```

pub mod dag;
pub mod errors;
pub mod models;
pub mod reconcile;
pub mod weights;

// re-exports
pub use self::dag::{Clade, DagBuilder, DagKind, DagSummary, EdgeSet, HistoryDag, Node, NodeIndex};
pub use self::errors::{DagError, DagResult, GenomeError};
pub use self::models::{CompactGenome, Label, Mutation, MutationMap, NodeLabel};
pub use self::reconcile::reconcile;
pub use self::weights::{EdgeWeight, ambiguous_hamming_distance};
