//! Nucleotide alphabets used by compact genomes and the mutation wire format.
//!
//! Unambiguous bases are plain ASCII bytes (`A`, `C`, `G`, `T`). Ambiguity is expressed
//! with IUPAC codes, which are backed by a 4-bit set representation so that reconciling
//! several observed bases is a bitwise OR.

use crate::errors::{GenomeError, Result};

/// Unambiguous bases, in protobuf code order (`0 = A`, `1 = C`, `2 = G`, `3 = T`).
pub const BASES: [u8; 4] = [b'A', b'C', b'G', b'T'];

/// Alignment gap. A plain base of its own: never ambiguous, never part of an IUPAC set.
pub const GAP: u8 = b'-';

/// Lookup table mapping IUPAC characters to their 4-bit base set.
/// A=0b0001, C=0b0010, G=0b0100, T=0b1000. Zero means "not a nucleotide code".
const IUPAC_MASK_ARRAY: [u8; 256] = {
    let mut arr = [0u8; 256];
    arr[b'A' as usize] = 0b0001;
    arr[b'C' as usize] = 0b0010;
    arr[b'G' as usize] = 0b0100;
    arr[b'T' as usize] = 0b1000;
    arr[b'U' as usize] = 0b1000; // U (RNA)
    arr[b'R' as usize] = 0b0101; // A or G
    arr[b'Y' as usize] = 0b1010; // C or T
    arr[b'S' as usize] = 0b0110; // G or C
    arr[b'W' as usize] = 0b1001; // A or T
    arr[b'K' as usize] = 0b1100; // G or T
    arr[b'M' as usize] = 0b0011; // A or C
    arr[b'B' as usize] = 0b1110; // C or G or T
    arr[b'D' as usize] = 0b1101; // A or G or T
    arr[b'H' as usize] = 0b1011; // A or C or T
    arr[b'V' as usize] = 0b0111; // A or C or G
    arr[b'N' as usize] = 0b1111; // any
    arr[b'?' as usize] = 0b1111;
    arr
};

/// Reverse lookup: 4-bit base set -> canonical IUPAC character.
const IUPAC_CODE_ARRAY: [u8; 16] = [
    b'-', // empty set, never produced for valid input
    b'A', b'C', b'M', b'G', b'R', b'S', b'V', b'T', b'W', b'Y', b'H', b'K', b'D', b'B', b'N',
];

/// Returns the 4-bit base set for an IUPAC character (case-insensitive).
pub fn base_mask(base: u8) -> Result<u8> {
    match IUPAC_MASK_ARRAY[base.to_ascii_uppercase() as usize] {
        0 => Err(GenomeError::InvalidBase(base as char)),
        mask => Ok(mask),
    }
}

/// Returns the IUPAC code for exactly the bases in `mask`.
pub fn code_for_mask(mask: u8) -> Result<u8> {
    match mask {
        1..=15 => Ok(IUPAC_CODE_ARRAY[mask as usize]),
        _ => Err(GenomeError::InvalidBase(mask as char)),
    }
}

/// Returns the IUPAC code representing a set of unambiguous bases.
pub fn code_for_bases(bases: &[u8]) -> Result<u8> {
    let mask = bases
        .iter()
        .try_fold(0u8, |acc, &b| base_mask(b).map(|m| acc | m))?;
    code_for_mask(mask)
}

/// True if `base` stands for more than one nucleotide.
pub fn is_ambiguous_base(base: u8) -> bool {
    let base = base.to_ascii_uppercase();
    base != GAP && !BASES.contains(&base)
}

/// True if any character of `sequence` is not one of `A`, `C`, `G`, `T` or a gap.
pub fn is_ambiguous(sequence: &str) -> bool {
    sequence.bytes().any(is_ambiguous_base)
}

/// All unambiguous bases an IUPAC code may stand for, in `BASES` order.
pub fn resolutions(base: u8) -> Result<Vec<u8>> {
    if base == GAP {
        return Ok(vec![GAP]);
    }
    let mask = base_mask(base)?;
    Ok(BASES
        .iter()
        .enumerate()
        .filter(|(i, _)| mask & (1 << i) != 0)
        .map(|(_, &b)| b)
        .collect())
}

/// True if the unambiguous base `base` is one of the bases `code` stands for.
pub fn code_contains(code: u8, base: u8) -> Result<bool> {
    if code == GAP || base == GAP {
        return Ok(code == base);
    }
    Ok(base_mask(code)? & base_mask(base)? == base_mask(base)?)
}

/// Protobuf nucleotide code for an unambiguous base.
pub fn protobuf_code(base: u8) -> Result<i32> {
    BASES
        .iter()
        .position(|&b| b == base.to_ascii_uppercase())
        .map(|p| p as i32)
        .ok_or(GenomeError::InvalidBase(base as char))
}

/// Unambiguous base for a protobuf nucleotide code.
pub fn base_from_protobuf(code: i32) -> Option<u8> {
    usize::try_from(code).ok().and_then(|i| BASES.get(i).copied())
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use rstest::*;

    #[rstest]
    #[case(b"CG", b'S')]
    #[case(b"AG", b'R')]
    #[case(b"CT", b'Y')]
    #[case(b"ACG", b'V')]
    #[case(b"ACGT", b'N')]
    #[case(b"T", b'T')]
    fn test_code_for_bases(#[case] bases: &[u8], #[case] expected: u8) {
        assert_eq!(code_for_bases(bases).unwrap(), expected);
    }

    #[rstest]
    fn test_resolutions_round_trip() {
        for code in b"ACGTRYSWKMBDHVN" {
            let bases = resolutions(*code).unwrap();
            assert_eq!(code_for_bases(&bases).unwrap(), *code);
        }
    }

    #[rstest]
    fn test_protobuf_codes() {
        assert_eq!(protobuf_code(b'A').unwrap(), 0);
        assert_eq!(protobuf_code(b't').unwrap(), 3);
        assert_eq!(base_from_protobuf(2), Some(b'G'));
        assert_eq!(base_from_protobuf(4), None);
        assert_eq!(base_from_protobuf(-1), None);
        assert!(protobuf_code(b'N').is_err());
    }

    #[rstest]
    fn test_gap_is_plain_base() {
        assert!(!is_ambiguous_base(GAP));
        assert!(!is_ambiguous("C-AA"));
        assert!(is_ambiguous("C-NA"));
        assert_eq!(resolutions(GAP).unwrap(), vec![GAP]);
        assert!(code_contains(GAP, GAP).unwrap());
        assert!(!code_contains(b'N', GAP).unwrap());
        assert!(!code_contains(GAP, b'A').unwrap());
        assert!(protobuf_code(GAP).is_err());
    }

    #[rstest]
    fn test_ambiguity() {
        assert!(!is_ambiguous("ACGTACGT"));
        assert!(is_ambiguous("ACGNACGT"));
        assert!(code_contains(b'S', b'C').unwrap());
        assert!(!code_contains(b'S', b'A').unwrap());
        assert!(base_mask(b'x').is_err());
    }
}
