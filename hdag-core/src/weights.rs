use std::collections::BTreeSet;

use crate::errors::{GenomeError, Result};
use crate::models::nucleotide::code_contains;
use crate::models::{CompactGenome, Label, NodeLabel};

type LabelWeightFn = fn(&Label, &Label) -> Result<usize>;

///
/// Edge weight functions available on history DAG edges.
///
/// Every weight is zero on edges out of the universal ancestor.
///
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EdgeWeight {
    /// Number of differing sites between parent and child compact genomes.
    CompactGenomeHamming,
    /// Like `CompactGenomeHamming`, but an ambiguous child base costs nothing
    /// when it admits the parent base.
    AmbiguousLeafHamming,
}

impl EdgeWeight {
    fn label_fn(self) -> LabelWeightFn {
        match self {
            EdgeWeight::CompactGenomeHamming => compact_genome_hamming,
            EdgeWeight::AmbiguousLeafHamming => ambiguous_leaf_hamming,
        }
    }

    pub fn weight(self, parent: &NodeLabel, child: &NodeLabel) -> Result<usize> {
        match (parent, child) {
            (NodeLabel::Node(parent), NodeLabel::Node(child)) => (self.label_fn())(parent, child),
            _ => Ok(0),
        }
    }
}

fn genome_of(label: &Label) -> Result<&CompactGenome> {
    label
        .compact_genome
        .as_ref()
        .ok_or(GenomeError::MissingGenome)
}

fn compact_genome_hamming(parent: &Label, child: &Label) -> Result<usize> {
    genome_of(parent)?.hamming_distance(genome_of(child)?)
}

fn ambiguous_leaf_hamming(parent: &Label, child: &Label) -> Result<usize> {
    ambiguous_hamming_distance(genome_of(parent)?, genome_of(child)?)
}

///
/// Count sites where `child` cannot be resolved to the base `parent` carries.
///
/// An ambiguous child code that includes the parent base does not count as a difference.
///
pub fn ambiguous_hamming_distance(parent: &CompactGenome, child: &CompactGenome) -> Result<usize> {
    if !parent.same_reference(child) {
        return Err(GenomeError::ReferenceMismatch);
    }
    let sites: BTreeSet<usize> = parent
        .mutations()
        .keys()
        .chain(child.mutations().keys())
        .copied()
        .collect();

    let mut distance = 0;
    for site in sites {
        let parent_base = parent.base_at(site)?;
        let child_base = child.base_at(site)?;
        if parent_base != child_base && !code_contains(child_base, parent_base)? {
            distance += 1;
        }
    }
    Ok(distance)
}
