//! Small numeric and hashing helpers shared by the reconstruction stages.

pub mod fingerprint;
pub mod stats;

pub use fingerprint::{compute_hash, fingerprint_fragments};
pub use stats::{coefficient_of_variation, mean, median};
