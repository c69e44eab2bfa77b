//! # TurtleShell Trainer
//!
//! Runs active-learning cycles for morphological segmentation. A cycle
//! fits a CRF on the current training set, evaluates it on the test set,
//! ranks the unlabeled pool by model confidence and moves the least
//! confident words into the next increment. Committed cycles are kept in a
//! [`CycleStore`] keyed by trajectory seed and cumulative selection size.

pub mod bootstrap;
pub mod bridge;
pub mod config;
pub mod cycle;
pub mod data;
pub mod store;

pub use bootstrap::{partition, BootstrapPlan, Splits};
pub use config::CycleConfig;
pub use cycle::{
    execute_cycle, resolve_inputs, run_cycle, run_trajectory, segment, Annotator, CycleInputs,
    GoldAnnotator, PredictionAnnotator,
};
pub use store::{CycleArtifacts, CycleKey, CycleStore, FsStore, MemoryStore, SqliteStore};
