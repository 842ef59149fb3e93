pub mod alphabet;
pub mod dna;
pub mod protein;

pub use alphabet::Alphabet;
