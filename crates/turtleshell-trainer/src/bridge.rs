//! JSON request/response entry points for embedding hosts.
//!
//! Both functions take a request as a JSON string and always return a JSON
//! string. A failure never escapes as an `Err`: it is reported through the
//! response's `error` field next to an otherwise empty payload.

use anyhow::{bail, Context};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use turtleshell_core::codec::boundary_indices;
use turtleshell_core::labeler::{SequenceModel, SequenceTrainer};
use turtleshell_core::scoring::MetricScale;
use turtleshell_core::types::Dataset;

use crate::config::CycleConfig;
use crate::cycle::{execute_cycle, segment, CycleInputs};
use crate::data::parse_src_str;
use crate::store::{CycleArtifacts, CycleKey, CycleStore};

const NO_MODEL: &str = "No trained model found. Run at least one training cycle first.";

fn default_increment_size() -> usize {
    50
}

fn default_delta() -> usize {
    4
}

fn default_max_iterations() -> usize {
    100
}

/// Request for one training cycle. File contents are passed inline.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingRequest {
    #[serde(default)]
    pub train_tgt: String,
    #[serde(default)]
    pub test_tgt: String,
    /// Pool with segmentations, preferred over `select_src`
    #[serde(default)]
    pub select_tgt: String,
    #[serde(default)]
    pub select_src: String,
    #[serde(default = "default_increment_size")]
    pub increment_size: usize,
    #[serde(default = "default_delta")]
    pub delta: usize,
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,
    #[serde(default)]
    pub select_size: usize,
    #[serde(default)]
    pub seed: u64,
}

impl TrainingRequest {
    fn config(&self) -> CycleConfig {
        CycleConfig::new()
            .with_seed(self.seed)
            .with_delta(self.delta)
            .with_increment_size(self.increment_size)
            .with_select_size(self.select_size)
            .with_max_iterations(self.max_iterations)
            .with_metric_scale(MetricScale::Percent)
    }

    fn inputs(&self) -> anyhow::Result<(CycleInputs, Dataset)> {
        let train = Dataset::from_tgt_str(&self.train_tgt).context("parsing trainTgt")?;
        let test = Dataset::from_tgt_str(&self.test_tgt).context("parsing testTgt")?;
        let pool = if !self.select_tgt.trim().is_empty() {
            Dataset::from_tgt_str(&self.select_tgt).context("parsing selectTgt")?
        } else {
            parse_src_str(&self.select_src).context("parsing selectSrc")?
        };
        Ok((CycleInputs { train, pool }, test))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Boundary {
    pub index: usize,
}

/// An increment word prepared for annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IncrementWord {
    pub id: String,
    pub word: String,
    pub confidence: f64,
    pub boundaries: Vec<Boundary>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingResponse {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub increment_words: Vec<IncrementWord>,
    pub residual_count: usize,
    pub increment_content: String,
    pub residual_content: String,
    pub evaluation_content: String,
    pub error: Option<String>,
}

impl TrainingResponse {
    fn failed(error: &anyhow::Error) -> Self {
        Self {
            error: Some(format!("{error:#}")),
            ..Self::default()
        }
    }
}

/// Request to segment words with a committed model.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceRequest {
    #[serde(default)]
    pub residual_tgt: String,
    #[serde(default)]
    pub seed: u64,
    #[serde(default)]
    pub select_size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub word: String,
    /// Morphs joined by `!`
    pub segmentation: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceResponse {
    pub predictions: Vec<Prediction>,
    pub predictions_content: String,
    pub total_words: usize,
    pub error: Option<String>,
}

impl InferenceResponse {
    fn failed(error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::default()
        }
    }
}

/// Runs one training cycle described by `request_json` and commits it to
/// `store`.
///
/// Metrics are reported on the unit scale rounded to four decimals; the
/// evaluation report keeps the percent scale.
pub fn run_training_cycle(store: &dyn CycleStore, request_json: &str) -> String {
    let response = training_cycle(store, request_json).unwrap_or_else(|e| {
        warn!(error = %e, "training request failed");
        TrainingResponse::failed(&e)
    });
    to_json(&response)
}

/// Segments the words of `residualTgt` with the model of the cycle the
/// request addresses.
pub fn run_inference(store: &dyn CycleStore, request_json: &str) -> String {
    let response = inference(store, request_json).unwrap_or_else(|e| {
        warn!(error = %e, "inference request failed");
        InferenceResponse::failed(format!("{e:#}"))
    });
    to_json(&response)
}

fn training_cycle(store: &dyn CycleStore, request_json: &str) -> anyhow::Result<TrainingResponse> {
    let request: TrainingRequest =
        serde_json::from_str(request_json).context("parsing training request")?;
    let config = request.config();
    let (inputs, test) = request.inputs()?;
    if test.is_empty() {
        bail!("testTgt holds no words");
    }

    let artifacts = execute_cycle(&config.trainer(), store, &config, inputs, &test)?;
    let increment_words = increment_words(&config, &artifacts)?;

    let evaluation = &artifacts.evaluation;
    let unit = |value: f64| round4(value / evaluation.scale.factor());
    info!(key = %artifacts.key, "training request served");
    Ok(TrainingResponse {
        precision: unit(evaluation.precision),
        recall: unit(evaluation.recall),
        f1: unit(evaluation.f1),
        increment_words,
        residual_count: artifacts.residual.len(),
        increment_content: artifacts.increment_dataset().to_tgt_string(),
        residual_content: artifacts.residual_dataset().to_tgt_string(),
        evaluation_content: evaluation.render(),
        error: None,
    })
}

/// Increment words with their confidences and the boundaries the model
/// predicts for them.
fn increment_words(
    config: &CycleConfig,
    artifacts: &CycleArtifacts,
) -> anyhow::Result<Vec<IncrementWord>> {
    if artifacts.increment.is_empty() {
        return Ok(Vec::new());
    }
    let model = config.trainer().restore(&artifacts.model)?;
    let words: Vec<&str> = artifacts.increment.iter().map(|r| r.word.as_str()).collect();
    let tags = model.predict(&config.extractor()?.features_only(&words))?;

    Ok(artifacts
        .increment
        .iter()
        .zip(&tags)
        .enumerate()
        .map(|(i, (record, tags))| IncrementWord {
            id: format!("w{i}"),
            word: record.word.clone(),
            confidence: round4(record.confidence),
            boundaries: boundary_indices(&record.word, tags)
                .into_iter()
                .map(|index| Boundary { index })
                .collect(),
        })
        .collect())
}

fn inference(store: &dyn CycleStore, request_json: &str) -> anyhow::Result<InferenceResponse> {
    let request: InferenceRequest =
        serde_json::from_str(request_json).context("parsing inference request")?;
    let key = CycleKey::new(request.seed, request.select_size);
    if !store.contains(key)? {
        return Ok(InferenceResponse::failed(NO_MODEL));
    }

    let residual = Dataset::from_tgt_str(&request.residual_tgt).context("parsing residualTgt")?;
    if residual.is_empty() {
        return Ok(InferenceResponse::default());
    }

    let words = residual.words();
    let segmented = segment(&CycleConfig::new().trainer(), store, key, &words)?;
    let predictions: Vec<Prediction> = segmented
        .into_iter()
        .map(|s| Prediction {
            segmentation: s.segmented(),
            word: s.word,
        })
        .collect();

    let mut content = predictions
        .iter()
        .map(|p| p.segmentation.as_str())
        .collect::<Vec<_>>()
        .join("\n");
    content.push('\n');

    Ok(InferenceResponse {
        total_words: predictions.len(),
        predictions,
        predictions_content: content,
        error: None,
    })
}

fn round4(value: f64) -> f64 {
    (value * 10_000.0).round() / 10_000.0
}

fn to_json<T: Serialize>(response: &T) -> String {
    serde_json::to_string(response)
        .unwrap_or_else(|e| format!(r#"{{"error":"serializing response: {e}"}}"#))
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::*;
    use crate::store::MemoryStore;

    fn training_request() -> String {
        json!({
            "trainTgt": "c a t ! s\nd o g\nw a l k ! e d\n",
            "testTgt": "d o g ! s\nt a l k\n",
            "selectTgt": "b i r d ! s\nc o w\nj u m p ! e d\n",
            "incrementSize": 2,
            "maxIterations": 20,
        })
        .to_string()
    }

    #[test]
    fn test_training_cycle_payload() {
        let store = MemoryStore::new();
        let response: Value =
            serde_json::from_str(&run_training_cycle(&store, &training_request())).unwrap();

        assert_eq!(response["error"], Value::Null);
        for metric in ["precision", "recall", "f1"] {
            let value = response[metric].as_f64().unwrap();
            assert!((0.0..=1.0).contains(&value), "{metric} = {value}");
        }

        let words = response["incrementWords"].as_array().unwrap();
        assert_eq!(words.len(), 2);
        assert_eq!(words[0]["id"], "w0");
        assert_eq!(words[1]["id"], "w1");
        for word in words {
            let len = word["word"].as_str().unwrap().chars().count();
            for boundary in word["boundaries"].as_array().unwrap() {
                assert!(boundary["index"].as_u64().unwrap() < len as u64 - 1);
            }
        }

        assert_eq!(response["residualCount"], 1);
        assert_eq!(
            response["incrementContent"].as_str().unwrap().lines().count(),
            2
        );
        assert!(
            response["evaluationContent"]
                .as_str()
                .unwrap()
                .starts_with("# TurtleShell Evaluation Report")
        );
        assert!(store.contains(CycleKey::new(0, 0)).unwrap());
    }

    #[test]
    fn test_increment_keeps_one_word_in_pool() {
        let store = MemoryStore::new();
        let request = json!({
            "trainTgt": "c a t ! s\n",
            "testTgt": "d o g ! s\n",
            "selectTgt": "b i r d ! s\nc o w\n",
            "incrementSize": 50,
            "maxIterations": 5,
        })
        .to_string();
        let response: TrainingResponse =
            serde_json::from_str(&run_training_cycle(&store, &request)).unwrap();
        assert_eq!(response.increment_words.len(), 1);
        assert_eq!(response.residual_count, 1);
    }

    #[test]
    fn test_failure_yields_zero_payload() {
        let store = MemoryStore::new();
        let response: Value = serde_json::from_str(&run_training_cycle(&store, "not json")).unwrap();
        assert!(response["error"].is_string());
        assert_eq!(response["f1"], 0.0);
        assert_eq!(response["incrementWords"], json!([]));
        assert_eq!(response["incrementContent"], "");

        // an empty training set commits nothing
        let request = json!({ "testTgt": "d o g\n", "selectTgt": "c o w\n" }).to_string();
        let response: TrainingResponse =
            serde_json::from_str(&run_training_cycle(&store, &request)).unwrap();
        assert!(response.error.is_some());
        assert!(store.keys().unwrap().is_empty());
    }

    #[test]
    fn test_repeated_cycle_is_rejected() {
        let store = MemoryStore::new();
        let first: TrainingResponse =
            serde_json::from_str(&run_training_cycle(&store, &training_request())).unwrap();
        assert!(first.error.is_none());

        let second: TrainingResponse =
            serde_json::from_str(&run_training_cycle(&store, &training_request())).unwrap();
        assert!(second.error.unwrap().contains("already committed"));
    }

    #[test]
    fn test_inference_without_model() {
        let store = MemoryStore::new();
        let request = json!({ "residualTgt": "c o w\n" }).to_string();
        let response: InferenceResponse =
            serde_json::from_str(&run_inference(&store, &request)).unwrap();
        assert_eq!(response.error.as_deref(), Some(NO_MODEL));
        assert_eq!(response.total_words, 0);
    }

    #[test]
    fn test_inference_with_committed_model() {
        let store = MemoryStore::new();
        run_training_cycle(&store, &training_request());

        let empty: InferenceResponse =
            serde_json::from_str(&run_inference(&store, r#"{"residualTgt": "  \n"}"#)).unwrap();
        assert_eq!(empty, InferenceResponse::default());

        let request = json!({ "residualTgt": "c o w\nj u m p ! e d\n" }).to_string();
        let response: InferenceResponse =
            serde_json::from_str(&run_inference(&store, &request)).unwrap();
        assert!(response.error.is_none());
        assert_eq!(response.total_words, 2);
        assert_eq!(response.predictions[1].word, "jumped");
        assert_eq!(response.predictions[1].segmentation.replace('!', ""), "jumped");
        assert!(response.predictions_content.ends_with('\n'));
        assert_eq!(response.predictions_content.lines().count(), 2);
    }
}
