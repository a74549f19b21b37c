//! Reconciliation of candidate genomes reconstructed along different paths to one node.
//!
//! Where candidates disagree at a site, the result carries the IUPAC code for exactly
//! the set of bases observed there, never a wider wildcard.

use std::collections::{BTreeSet, HashSet};

use crate::errors::{GenomeError, Result};
use crate::models::nucleotide::{base_mask, code_for_mask};
use crate::models::{CompactGenome, MutationMap};

///
/// Merge candidate genomes into a single, possibly ambiguous, genome.
///
/// Returns the reconciled genome and whether any site was ambiguous. A single
/// candidate (or several identical ones) is returned unchanged.
///
pub fn reconcile(candidates: &[CompactGenome]) -> Result<(CompactGenome, bool)> {
    let first = candidates.first().ok_or(GenomeError::EmptyReconciliation)?;
    if candidates.iter().any(|cg| !cg.same_reference(first)) {
        return Err(GenomeError::ReferenceMismatch);
    }

    let distinct: Vec<&CompactGenome> = {
        let mut seen = HashSet::new();
        candidates.iter().filter(|cg| seen.insert(*cg)).collect()
    };
    if distinct.len() == 1 {
        return Ok((first.clone(), false));
    }

    let sites: BTreeSet<usize> = distinct
        .iter()
        .flat_map(|cg| cg.mutations().keys().copied())
        .collect();

    let reference = first.reference().as_bytes();
    let mut ambiguous = false;
    let mut mutations = MutationMap::new();
    for site in sites {
        let bases = distinct
            .iter()
            .map(|cg| cg.base_at(site))
            .collect::<Result<Vec<u8>>>()?;
        let base = if bases.iter().all(|b| *b == bases[0]) {
            bases[0]
        } else {
            ambiguous = true;
            let mask = bases
                .iter()
                .try_fold(0u8, |acc, &b| base_mask(b).map(|m| acc | m))?;
            code_for_mask(mask)?
        };
        let ref_base = reference[site - 1];
        if base != ref_base {
            mutations.insert(site, (ref_base, base));
        }
    }

    Ok((
        CompactGenome::new(mutations, first.reference().clone())?,
        ambiguous,
    ))
}
