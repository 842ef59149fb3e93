use serde::{Deserialize, Serialize};

use super::{dna, protein};

/// Residue alphabet of a database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Alphabet {
    Nucleotide,
    Protein,
}

impl Alphabet {
    #[inline]
    pub fn encode(self, b: u8) -> u8 {
        match self {
            Alphabet::Nucleotide => dna::to_code(b),
            Alphabet::Protein => protein::to_code(b),
        }
    }

    #[inline]
    pub fn decode(self, c: u8) -> u8 {
        match self {
            Alphabet::Nucleotide => dna::from_code(c),
            Alphabet::Protein => protein::from_code(c),
        }
    }

    pub fn encode_seq(self, seq: &[u8]) -> Vec<u8> {
        seq.iter().map(|&b| self.encode(b)).collect()
    }

    /// Number of residue codes, ambiguity codes included.
    pub fn size(self) -> usize {
        match self {
            Alphabet::Nucleotide => dna::SIGMA,
            Alphabet::Protein => protein::SIGMA,
        }
    }

    /// Number of leading codes allowed inside a seed.
    pub fn seed_size(self) -> usize {
        match self {
            Alphabet::Nucleotide => dna::SEED_SIGMA,
            Alphabet::Protein => protein::SEED_SIGMA,
        }
    }

    #[inline]
    pub fn is_seedable(self, c: u8) -> bool {
        (c as usize) < self.seed_size()
    }
}
