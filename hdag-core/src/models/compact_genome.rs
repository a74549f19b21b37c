use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{self, Debug, Display};
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use log::warn;

use crate::errors::{GenomeError, Result};
use crate::models::mutation::Mutation;
use crate::models::nucleotide::is_ambiguous_base;

/// Site -> (reference base, new base). Sites are 1-based.
pub type MutationMap = BTreeMap<usize, (u8, u8)>;

///
/// A nucleotide sequence stored as its differences from a shared reference.
///
/// Genomes are immutable: every edit returns a new genome. The mutation map sits
/// behind an `Arc`, so clones are cheap and a batch of edits copies the map once.
/// The reference is shared by all genomes derived from it and is never copied.
///
/// Equality, hashing and ordering look only at the mutation map. Use
/// [`CompactGenome::same_reference`] to check that two genomes are comparable.
///
#[derive(Clone)]
pub struct CompactGenome {
    mutations: Arc<MutationMap>,
    reference: Arc<str>,
}

impl CompactGenome {
    ///
    /// Build a genome from a mutation map.
    ///
    /// Entries whose new base equals their reference base are dropped. Sites outside
    /// the reference are rejected.
    ///
    pub fn new(mut mutations: MutationMap, reference: Arc<str>) -> Result<Self> {
        let length = reference.len();
        if let Some((&position, _)) = mutations
            .iter()
            .find(|(pos, _)| **pos == 0 || **pos > length)
        {
            return Err(GenomeError::PositionOutOfRange { position, length });
        }
        mutations.retain(|_, (old, new)| old != new);
        Ok(CompactGenome {
            mutations: Arc::new(mutations),
            reference,
        })
    }

    /// The genome identical to the reference.
    pub fn empty(reference: Arc<str>) -> Self {
        CompactGenome {
            mutations: Arc::new(MutationMap::new()),
            reference,
        }
    }

    ///
    /// Diff a full sequence against the reference.
    ///
    /// # Arguments
    /// - sequence: the full sequence, same length as the reference
    /// - reference: the shared reference sequence
    ///
    pub fn from_sequence(sequence: &str, reference: Arc<str>) -> Result<Self> {
        if sequence.len() != reference.len() {
            return Err(GenomeError::LengthMismatch {
                sequence: sequence.len(),
                reference: reference.len(),
            });
        }
        let mutations = reference
            .bytes()
            .zip(sequence.bytes())
            .enumerate()
            .filter(|(_, (old, new))| old != new)
            .map(|(idx, (old, new))| (idx + 1, (old, new)))
            .collect();
        Ok(CompactGenome {
            mutations: Arc::new(mutations),
            reference,
        })
    }

    pub fn reference(&self) -> &Arc<str> {
        &self.reference
    }

    pub fn mutations(&self) -> &MutationMap {
        &self.mutations
    }

    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    /// Sorted list of mutated sites.
    pub fn sites(&self) -> Vec<usize> {
        self.mutations.keys().copied().collect()
    }

    /// True if any mutated site carries an IUPAC ambiguity code.
    pub fn has_ambiguity(&self) -> bool {
        self.mutations
            .values()
            .any(|(_, new)| is_ambiguous_base(*new))
    }

    ///
    /// The same genome expressed against `reference`, which must hold the same sequence.
    /// The result shares `reference` instead of its current copy.
    ///
    pub fn rebase(&self, reference: &Arc<str>) -> Result<Self> {
        if Arc::ptr_eq(&self.reference, reference) {
            return Ok(self.clone());
        }
        if self.reference != *reference {
            return Err(GenomeError::ReferenceMismatch);
        }
        Ok(CompactGenome {
            mutations: Arc::clone(&self.mutations),
            reference: Arc::clone(reference),
        })
    }

    /// True if both genomes are expressed against the same reference sequence.
    pub fn same_reference(&self, other: &CompactGenome) -> bool {
        Arc::ptr_eq(&self.reference, &other.reference) || self.reference == other.reference
    }

    fn check_reference(&self, other: &CompactGenome) -> Result<()> {
        if self.same_reference(other) {
            Ok(())
        } else {
            Err(GenomeError::ReferenceMismatch)
        }
    }

    fn reference_base(&self, position: usize) -> Result<u8> {
        match position {
            0 => Err(GenomeError::PositionOutOfRange {
                position,
                length: self.reference.len(),
            }),
            _ => self
                .reference
                .as_bytes()
                .get(position - 1)
                .copied()
                .ok_or(GenomeError::PositionOutOfRange {
                    position,
                    length: self.reference.len(),
                }),
        }
    }

    /// The base this genome carries at a 1-based site.
    pub fn base_at(&self, position: usize) -> Result<u8> {
        match self.mutations.get(&position) {
            Some((_, new)) => Ok(*new),
            None => self.reference_base(position),
        }
    }

    /// Sites whose recorded reference base disagrees with the reference sequence.
    pub fn drifted_sites(&self) -> Vec<usize> {
        let reference = self.reference.as_bytes();
        self.mutations
            .iter()
            .filter(|(pos, (old, _))| reference.get(**pos - 1) != Some(old))
            .map(|(pos, _)| *pos)
            .collect()
    }

    ///
    /// Materialize the full sequence.
    ///
    /// A recorded reference base that disagrees with the reference sequence is
    /// reported as a warning; the recorded new base is applied regardless.
    ///
    pub fn to_sequence(&self) -> String {
        let mut sequence = self.reference.as_bytes().to_vec();
        for (&pos, &(old, new)) in self.mutations.iter() {
            if sequence[pos - 1] != old {
                warn!(
                    "reference base {} at site {} doesn't match compact genome reference base {}",
                    sequence[pos - 1] as char,
                    pos,
                    old as char
                );
            }
            sequence[pos - 1] = new;
        }
        String::from_utf8_lossy(&sequence).into_owned()
    }

    fn mutate_in_place(&self, map: &mut MutationMap, mutation: &Mutation, reverse: bool) -> Result<()> {
        let mutation = if reverse {
            mutation.reversed()
        } else {
            *mutation
        };
        let ref_base = self.reference_base(mutation.position)?;
        let current = map
            .get(&mutation.position)
            .map(|(_, new)| *new)
            .unwrap_or(ref_base);
        if current != mutation.old {
            warn!(
                "recorded old base {} in sequence doesn't match old base of mutation {}",
                current as char, mutation
            );
        }
        if mutation.new == ref_base {
            map.remove(&mutation.position);
        } else {
            map.insert(mutation.position, (ref_base, mutation.new));
        }
        Ok(())
    }

    ///
    /// Apply one mutation, returning the new genome.
    ///
    /// With `reverse`, old and new bases are swapped first. The mutation's old base is
    /// only checked against the genome; the stored reference base always comes from
    /// the reference sequence.
    ///
    pub fn apply_mutation(&self, mutation: &Mutation, reverse: bool) -> Result<Self> {
        self.apply_mutations(std::slice::from_ref(mutation), reverse)
    }

    ///
    /// Apply a list of mutations in order, returning the new genome.
    ///
    /// With `reverse`, each mutation is swapped and the list is walked back to front,
    /// which recovers a parent genome from a child genome and the edge's mutations.
    ///
    pub fn apply_mutations(&self, mutations: &[Mutation], reverse: bool) -> Result<Self> {
        if mutations.is_empty() {
            return Ok(self.clone());
        }
        let mut map = MutationMap::clone(&self.mutations);
        if reverse {
            for mutation in mutations.iter().rev() {
                self.mutate_in_place(&mut map, mutation, true)?;
            }
        } else {
            for mutation in mutations {
                self.mutate_in_place(&mut map, mutation, false)?;
            }
        }
        Ok(CompactGenome {
            mutations: Arc::new(map),
            reference: Arc::clone(&self.reference),
        })
    }

    ///
    /// Mutations which turn `self` (the parent) into `child`, sorted by site.
    ///
    /// Where only one genome records a site, the other side's base is the recorded
    /// reference base, so the result is minimal even when no sites are shared.
    ///
    pub fn diff(&self, child: &CompactGenome) -> Result<Vec<Mutation>> {
        self.check_reference(child)?;
        let sites: BTreeSet<usize> = self
            .mutations
            .keys()
            .chain(child.mutations.keys())
            .copied()
            .collect();

        let mut result = Vec::new();
        for site in sites {
            let parent_base = match (self.mutations.get(&site), child.mutations.get(&site)) {
                (Some((_, new)), _) => *new,
                (None, Some((old, _))) => *old,
                (None, None) => continue,
            };
            let child_base = match (child.mutations.get(&site), self.mutations.get(&site)) {
                (Some((_, new)), _) => *new,
                (None, Some((old, _))) => *old,
                (None, None) => continue,
            };
            if parent_base != child_base {
                result.push(Mutation::new(parent_base, child_base, site));
            }
        }
        Ok(result)
    }

    ///
    /// Number of sites at which two genomes carry different bases.
    ///
    pub fn hamming_distance(&self, other: &CompactGenome) -> Result<usize> {
        self.check_reference(other)?;
        let only_self = self
            .mutations
            .keys()
            .filter(|k| !other.mutations.contains_key(*k))
            .count();
        let only_other = other
            .mutations
            .keys()
            .filter(|k| !self.mutations.contains_key(*k))
            .count();
        let shared_differ = self
            .mutations
            .iter()
            .filter(|(k, (_, new))| {
                other
                    .mutations
                    .get(*k)
                    .is_some_and(|(_, other_new)| other_new != new)
            })
            .count();
        Ok(only_self + only_other + shared_differ)
    }

    ///
    /// Drop mutations at the given sites.
    ///
    /// # Arguments
    /// - sites: sites to mask
    /// - one_based: whether `sites` are 1-based; 0-based sites are shifted by one
    ///
    pub fn mask_sites<I>(&self, sites: I, one_based: bool) -> Self
    where
        I: IntoIterator<Item = usize>,
    {
        let offset = if one_based { 0 } else { 1 };
        let masked: BTreeSet<usize> = sites.into_iter().map(|s| s + offset).collect();
        if !masked.iter().any(|s| self.mutations.contains_key(s)) {
            return self.clone();
        }
        let mutations = self
            .mutations
            .iter()
            .filter(|(site, _)| !masked.contains(*site))
            .map(|(site, bases)| (*site, *bases))
            .collect();
        CompactGenome {
            mutations: Arc::new(mutations),
            reference: Arc::clone(&self.reference),
        }
    }
}

impl PartialEq for CompactGenome {
    fn eq(&self, other: &Self) -> bool {
        self.mutations == other.mutations
    }
}

impl Eq for CompactGenome {}

impl Hash for CompactGenome {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.mutations.hash(state);
    }
}

impl Ord for CompactGenome {
    fn cmp(&self, other: &Self) -> Ordering {
        self.mutations.iter().cmp(other.mutations.iter())
    }
}

impl PartialOrd for CompactGenome {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Display for CompactGenome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let muts: Vec<String> = self
            .mutations
            .iter()
            .map(|(pos, (old, new))| Mutation::new(*old, *new, *pos).to_string())
            .collect();
        write!(f, "<{}>", muts.join(","))
    }
}

impl Debug for CompactGenome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CompactGenome{}", self)
    }
}
