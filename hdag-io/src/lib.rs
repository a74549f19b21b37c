//! # Input/Output for mutation-annotated history DAGs.
//!
//! This crate converts [`hdag_core::HistoryDag`]s to and from their two persisted forms:
//!
//! - the Larch mutation-annotated DAG (MAD) protobuf, where sequences are implied by
//!   per-edge mutations ([`mad`]), and
//! - a canonical flattened form with deduplicated genomes, stored as JSON ([`flat`]).
//!
//! The flattened form also defines structural equality of two DAGs, [`flat::test_equal`].
//! Files may be gzipped; the format is chosen from the file extension ([`files`]).
//!
pub mod config;
pub mod error;
pub mod fasta;
pub mod files;
pub mod flat;
pub mod mad;
pub mod proto;
pub mod utils;

// re-expose core functions
pub use config::*;
pub use error::*;
pub use fasta::*;
pub use files::*;
pub use flat::*;
pub use mad::*;
