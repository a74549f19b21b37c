pub mod compact_genome;
pub mod label;
pub mod mutation;
pub mod nucleotide;

// re-export for cleaner imports
pub use self::compact_genome::{CompactGenome, MutationMap};
pub use self::label::{Label, NodeLabel};
pub use self::mutation::Mutation;
