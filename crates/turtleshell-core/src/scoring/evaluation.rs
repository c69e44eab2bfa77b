use serde::{Deserialize, Serialize};

use crate::error::{Result, TurtleError};
use crate::types::BOUNDARY_MARK;

/// Numeric scale used for every metric in one report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricScale {
    /// `[0.0, 1.0]`
    #[default]
    Unit,
    /// `[0.0, 100.0]`
    Percent,
}

impl MetricScale {
    pub fn factor(&self) -> f64 {
        match self {
            MetricScale::Unit => 1.0,
            MetricScale::Percent => 100.0,
        }
    }

    /// Decimal places shown when rendering.
    fn places(&self) -> usize {
        match self {
            MetricScale::Unit => 4,
            MetricScale::Percent => 2,
        }
    }
}

/// Precision, recall and F1 for one word.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct WordScore {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// Scores one predicted segmentation against the gold one.
///
/// A predicted morph counts as correct when it occurs anywhere in the gold
/// list. Repeated morphs are not matched one-to-one.
///
/// # Examples
/// ```
/// use turtleshell_core::scoring::score_word;
///
/// let score = score_word(&["un", "help", "ful"], &["un", "helpful"]);
/// assert_eq!(score.precision, 0.5);
/// assert!((score.recall - 1.0 / 3.0).abs() < 1e-12);
/// ```
#[must_use]
pub fn score_word<G: AsRef<str>, P: AsRef<str>>(gold: &[G], predicted: &[P]) -> WordScore {
    if predicted.is_empty() || gold.is_empty() {
        return WordScore::default();
    }

    let correct = predicted
        .iter()
        .filter(|morph| gold.iter().any(|g| g.as_ref() == morph.as_ref()))
        .count() as f64;

    let precision = correct / predicted.len() as f64;
    let recall = correct / gold.len() as f64;
    let f1 = if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    };

    WordScore {
        precision,
        recall,
        f1,
    }
}

/// One row of an evaluation report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordEvaluation {
    pub word: String,
    pub gold: Vec<String>,
    pub predicted: Vec<String>,
    pub score: WordScore,
}

/// Macro-averaged metrics over a test set, plus the per-word detail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub scale: MetricScale,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub words: Vec<WordEvaluation>,
}

impl EvaluationReport {
    /// Text report: a summary header followed by a tab-separated
    /// word / gold / predicted table.
    pub fn render(&self) -> String {
        let places = self.scale.places();
        let mut out = String::from("# TurtleShell Evaluation Report\n");
        out += &format!(
            "# Precision: {:.places$}  Recall: {:.places$}  F1: {:.places$}\n",
            self.precision, self.recall, self.f1
        );
        out.push_str("#\n# word\tgold\tpredicted\n");

        let mark = BOUNDARY_MARK.to_string();
        for row in &self.words {
            out += &format!(
                "{}\t{}\t{}\n",
                row.word,
                row.gold.join(&mark),
                row.predicted.join(&mark)
            );
        }
        out
    }

    /// The three summary lines on their own.
    pub fn summary(&self) -> String {
        let places = self.scale.places();
        format!(
            "Precision: {:.places$}\nRecall: {:.places$}\nF1: {:.places$}\n",
            self.precision, self.recall, self.f1
        )
    }
}

/// Evaluates aligned gold and predicted segmentations.
///
/// Every metric in the report uses `scale`. An empty test set yields zeros.
///
/// # Errors
///
/// Returns `TurtleError::ShapeMismatch` if the two lists differ in length.
pub fn evaluate(
    gold: &[Vec<String>],
    predicted: &[Vec<String>],
    scale: MetricScale,
) -> Result<EvaluationReport> {
    if gold.len() != predicted.len() {
        return Err(TurtleError::ShapeMismatch(format!(
            "{} gold segmentations but {} predictions",
            gold.len(),
            predicted.len()
        )));
    }

    let factor = scale.factor();
    let words: Vec<WordEvaluation> = gold
        .iter()
        .zip(predicted)
        .map(|(g, p)| {
            let unit = score_word(g.as_slice(), p.as_slice());
            WordEvaluation {
                word: g.concat(),
                gold: g.clone(),
                predicted: p.clone(),
                score: WordScore {
                    precision: unit.precision * factor,
                    recall: unit.recall * factor,
                    f1: unit.f1 * factor,
                },
            }
        })
        .collect();

    let mean = |metric: fn(&WordScore) -> f64| {
        if words.is_empty() {
            0.0
        } else {
            words.iter().map(|w| metric(&w.score)).sum::<f64>() / words.len() as f64
        }
    };

    Ok(EvaluationReport {
        scale,
        precision: mean(|s| s.precision),
        recall: mean(|s| s.recall),
        f1: mean(|s| s.f1),
        words,
    })
}
