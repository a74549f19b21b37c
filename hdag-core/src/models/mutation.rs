use std::fmt::{self, Display};
use std::str::FromStr;

use crate::errors::GenomeError;
use crate::models::nucleotide::{GAP, base_mask};

///
/// A single-site substitution: `old` base replaced by `new` base at the
/// 1-based sequence `position`.
///
#[derive(Eq, PartialEq, Hash, Debug, Clone, Copy, PartialOrd, Ord)]
pub struct Mutation {
    pub position: usize,
    pub old: u8,
    pub new: u8,
}

impl Mutation {
    pub fn new(old: u8, new: u8, position: usize) -> Self {
        Mutation { position, old, new }
    }

    /// The mutation that undoes this one.
    pub fn reversed(&self) -> Self {
        Mutation {
            position: self.position,
            old: self.new,
            new: self.old,
        }
    }
}

impl Display for Mutation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}",
            self.old as char, self.position, self.new as char
        )
    }
}

impl FromStr for Mutation {
    type Err = GenomeError;

    ///
    /// Parse a mutation string such as `A110G`.
    ///
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || GenomeError::InvalidMutation(s.to_string());
        let bytes = s.as_bytes();
        let [old, site @ .., new] = bytes else {
            return Err(invalid());
        };
        let position = std::str::from_utf8(site)
            .ok()
            .and_then(|p| p.parse::<usize>().ok())
            .filter(|p| *p > 0)
            .ok_or_else(invalid)?;
        for base in [*old, *new] {
            if base != GAP {
                base_mask(base)?;
            }
        }
        Ok(Mutation::new(*old, *new, position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use pretty_assertions::assert_eq;
    use rstest::*;

    #[rstest]
    fn test_display_and_parse() {
        let m = Mutation::new(b'A', b'G', 110);
        assert_eq!(m.to_string(), "A110G");
        assert_eq!("A110G".parse::<Mutation>().unwrap(), m);
    }

    #[rstest]
    #[case("AG")]
    #[case("AxG")]
    #[case("A0G")]
    #[case("A-1G")]
    #[case("")]
    fn test_parse_malformed_site(#[case] s: &str) {
        assert_eq!(
            s.parse::<Mutation>(),
            Err(GenomeError::InvalidMutation(s.to_string()))
        );
    }

    #[rstest]
    fn test_parse_bases() {
        assert_eq!("A3-".parse::<Mutation>().unwrap(), Mutation::new(b'A', b'-', 3));
        assert_eq!("A3N".parse::<Mutation>().unwrap().new, b'N');
        assert_eq!("Z3A".parse::<Mutation>(), Err(GenomeError::InvalidBase('Z')));
    }

    #[rstest]
    fn test_reversed() {
        let m = Mutation::new(b'A', b'G', 3);
        assert_eq!(m.reversed(), Mutation::new(b'G', b'A', 3));
    }
}
