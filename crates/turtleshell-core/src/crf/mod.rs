//! Bundled linear-chain CRF backend.

pub mod lattice;
pub mod model;
pub mod viterbi;

pub use lattice::Lattice;
pub use model::{CrfModel, CrfTrainer};
pub use viterbi::ViterbiDecoder;
