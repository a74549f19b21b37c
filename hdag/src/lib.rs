//! Mutation-annotated history DAGs.
//!
//! Each member crate is re-exported behind a cargo feature of the same name:
//!
//! - `core`: compact genomes, genome reconciliation and the history DAG itself
//! - `io`: the Larch protobuf codec and the flattened JSON form

#[cfg(feature = "core")]
#[doc(inline)]
pub use hdag_core as core;

#[cfg(feature = "io")]
#[doc(inline)]
pub use hdag_io as io;
