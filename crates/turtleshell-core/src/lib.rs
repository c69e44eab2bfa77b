//! # TurtleShell Core
//!
//! Building blocks for active-learning morphological segmentation: the BMES
//! boundary codec, sliding-window character features, a bundled
//! linear-chain CRF, confidence scoring, pool selection and evaluation.
//!
//! ## Quick Start
//!
//! ```rust
//! use turtleshell_core::codec::{decode, encode, encode_tags, sentinel_wrap};
//!
//! assert_eq!(encode(&["un", "happy"]), "BEBMMME");
//!
//! let tags = sentinel_wrap(&encode_tags(&["un", "happy"]));
//! assert_eq!(decode("unhappy", &tags), vec!["un", "happy"]);
//! ```
pub mod codec;
pub mod crf;
pub mod error;
pub mod features;
pub mod labeler;
pub mod random;
pub mod scoring;
pub mod selection;
pub mod types;

// Re-export primary API
pub use codec::{decode, encode, BoundaryTag};
pub use crf::{CrfModel, CrfTrainer};
pub use error::{Result, TurtleError};
pub use features::{CharFeatures, FeatureBatch, FeatureExtractor};
pub use labeler::{SequenceModel, SequenceTrainer, TagDistribution};
pub use scoring::{evaluate, score_word, EvaluationReport, MetricScale, WordScore};
pub use selection::{
    select, ResidualPolicy, Selection, SelectionStrategy, Selector, TieBreak,
};
pub use types::{ConfidenceRecord, Dataset, Segmentation, SplitKind};
