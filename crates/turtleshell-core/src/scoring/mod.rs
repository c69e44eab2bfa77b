pub mod confidence;
pub mod evaluation;

pub use confidence::score as confidence_score;
pub use evaluation::{
    evaluate, score_word, EvaluationReport, MetricScale, WordEvaluation, WordScore,
};
