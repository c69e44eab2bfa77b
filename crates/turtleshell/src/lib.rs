//! # TurtleShell
//!
//! Active-learning morphological segmentation.
//!
//! This crate re-exports [`turtleshell_core`] (codec, features, CRF,
//! scoring, selection) and [`turtleshell_trainer`] (cycles, stores, bridge).

pub use turtleshell_core::*;
pub use turtleshell_trainer::{
    bootstrap, bridge, config, cycle, data, execute_cycle, partition, resolve_inputs, run_cycle,
    run_trajectory, segment, store, Annotator, BootstrapPlan, CycleArtifacts, CycleConfig,
    CycleInputs, CycleKey, CycleStore, FsStore, GoldAnnotator, MemoryStore, PredictionAnnotator,
    SqliteStore, Splits,
};
