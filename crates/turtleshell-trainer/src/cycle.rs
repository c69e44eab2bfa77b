//! The active-learning cycle.
//!
//! One cycle resolves its train and pool sets from the previous committed
//! cycle (or the bootstrap splits), fits a model, segments the test and pool
//! words, evaluates the test predictions, scores the pool by confidence and
//! splits it into increment and residual. Nothing is committed unless every
//! step succeeds.

use anyhow::{bail, Context};
use tracing::{debug, info, warn};
use turtleshell_core::codec::{decode, BoundaryTag};
use turtleshell_core::labeler::{SequenceModel, SequenceTrainer};
use turtleshell_core::scoring::{confidence_score, evaluate};
use turtleshell_core::selection::Selection;
use turtleshell_core::types::{ConfidenceRecord, Dataset, Segmentation};

use crate::bootstrap::Splits;
use crate::config::CycleConfig;
use crate::store::{CycleArtifacts, CycleKey, CycleStore};

/// Supplies the segmentation an increment word enters the training set with.
pub trait Annotator: Send + Sync {
    fn annotate(&self, record: &ConfidenceRecord) -> Segmentation;
}

/// Uses the segmentation recorded for the word in the pool, standing in for
/// a human annotator in simulations over a gold corpus.
#[derive(Debug, Clone, Copy, Default)]
pub struct GoldAnnotator;

impl Annotator for GoldAnnotator {
    fn annotate(&self, record: &ConfidenceRecord) -> Segmentation {
        record.segmentation()
    }
}

/// Accepts the model's own prediction.
#[derive(Debug, Clone, Copy, Default)]
pub struct PredictionAnnotator;

impl Annotator for PredictionAnnotator {
    fn annotate(&self, record: &ConfidenceRecord) -> Segmentation {
        record.predicted_segmentation()
    }
}

/// Train and pool sets of one cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleInputs {
    pub train: Dataset,
    pub pool: Dataset,
}

/// Works out the train and pool sets for the cycle `config` describes.
///
/// The bootstrap cycle takes them from `splits`. A later cycle takes the
/// previous cycle's training set plus its annotated increment, and the
/// previous cycle's residual as its pool.
pub fn resolve_inputs(
    store: &dyn CycleStore,
    splits: &Splits,
    config: &CycleConfig,
    annotator: &dyn Annotator,
) -> anyhow::Result<CycleInputs> {
    config.validate()?;
    let Some(prior_key) = config.prior_key() else {
        return Ok(CycleInputs {
            train: splits.train.clone(),
            pool: splits.pool.clone(),
        });
    };

    let Some(prior) = store.load(prior_key)? else {
        bail!(
            "cycle {} needs cycle {prior_key}, which is not committed",
            config.key()
        );
    };

    let annotated: Dataset = prior.increment.iter().map(|r| annotator.annotate(r)).collect();
    Ok(CycleInputs {
        train: prior.train.union(&annotated),
        pool: prior.residual_dataset(),
    })
}

/// Runs one cycle and commits its artifacts.
///
/// # Errors
///
/// Fails if the configuration is invalid, the cycle is already committed,
/// its predecessor is missing, the training set is empty, or feature
/// extraction, training, prediction or the commit fail. The store is left
/// untouched on failure.
pub fn run_cycle<T: SequenceTrainer>(
    trainer: &T,
    store: &dyn CycleStore,
    splits: &Splits,
    config: &CycleConfig,
    annotator: &dyn Annotator,
) -> anyhow::Result<CycleArtifacts> {
    let inputs = resolve_inputs(store, splits, config, annotator)?;
    execute_cycle(trainer, store, config, inputs, &splits.test)
}

/// Runs one cycle on explicitly supplied train and pool sets and commits
/// its artifacts under `config.key()`.
pub fn execute_cycle<T: SequenceTrainer>(
    trainer: &T,
    store: &dyn CycleStore,
    config: &CycleConfig,
    inputs: CycleInputs,
    test: &Dataset,
) -> anyhow::Result<CycleArtifacts> {
    config.validate()?;
    let key = config.key();
    if store.contains(key)? {
        bail!("cycle {key} is already committed");
    }

    let CycleInputs { train, pool } = inputs;
    if train.is_empty() {
        bail!("cycle {key} has an empty training set");
    }
    info!(
        key = %key,
        train = train.len(),
        test = test.len(),
        pool = pool.len(),
        "starting cycle"
    );

    let extractor = config.extractor()?;
    let train_batch = extractor
        .extract_dataset(&train)
        .context("extracting training features")?;
    let test_batch = extractor
        .extract_dataset(test)
        .context("extracting test features")?;
    let pool_features = extractor.features_only(&pool.words());

    let model = trainer
        .fit(&train_batch.features, &train_batch.labels)
        .with_context(|| format!("training model for cycle {key}"))?;

    let test_tags = model.predict(&test_batch.features).context("predicting test set")?;
    log_ill_formed("test", &test_tags);
    let test_predictions = segment_all(test.words(), &test_tags);

    let gold: Vec<Vec<String>> = test.examples().iter().map(|e| e.morphs.clone()).collect();
    let predicted: Vec<Vec<String>> = test_predictions.iter().map(|s| s.morphs.clone()).collect();
    let evaluation = evaluate(&gold, &predicted, config.metric_scale)?;

    let (selection, pool_predictions) = if pool.is_empty() {
        info!(key = %key, "pool is empty, skipping selection");
        (Selection::default(), None)
    } else {
        let pool_tags = model.predict(&pool_features).context("predicting pool")?;
        let marginals = model
            .predict_marginals(&pool_features)
            .context("computing pool marginals")?;
        log_ill_formed("pool", &pool_tags);

        let records: Vec<ConfidenceRecord> = pool
            .examples()
            .iter()
            .zip(&pool_tags)
            .zip(&marginals)
            .map(|((example, tags), dist)| ConfidenceRecord {
                word: example.word.clone(),
                morphs: example.morphs.clone(),
                predicted: decode(&example.word, tags),
                confidence: confidence_score(&example.word, tags, dist),
            })
            .collect();
        let pool_predictions = segment_all(pool.words(), &pool_tags);
        (config.selector().select(records), Some(pool_predictions))
    };

    let artifacts = CycleArtifacts {
        key,
        config: config.clone(),
        train,
        test_predictions,
        pool_predictions,
        increment: selection.increment,
        residual: selection.residual,
        evaluation,
        model: model.to_bytes()?,
    };
    store.commit(&artifacts)?;

    info!(
        key = %key,
        precision = artifacts.evaluation.precision,
        recall = artifacts.evaluation.recall,
        f1 = artifacts.evaluation.f1,
        increment = artifacts.increment.len(),
        residual = artifacts.residual.len(),
        "cycle committed"
    );
    Ok(artifacts)
}

/// Runs cycles from `config` onward until a cycle finds an empty pool or
/// `max_cycles` cycles have run. Cycles already in the store are loaded
/// instead of rerun.
pub fn run_trajectory(
    store: &dyn CycleStore,
    splits: &Splits,
    config: &CycleConfig,
    annotator: &dyn Annotator,
    max_cycles: Option<usize>,
) -> anyhow::Result<Vec<CycleArtifacts>> {
    config.validate()?;
    let mut config = config.clone();
    let mut cycles = Vec::new();

    while max_cycles.is_none_or(|max| cycles.len() < max) {
        let artifacts = match store.load(config.key())? {
            Some(existing) => {
                debug!(key = %config.key(), "cycle already committed, resuming after it");
                existing
            }
            None => run_cycle(&config.trainer(), store, splits, &config, annotator)?,
        };
        let exhausted = artifacts.pool_predictions.is_none();
        cycles.push(artifacts);
        if exhausted || config.increment_size == 0 {
            break;
        }
        config = config.next();
    }

    Ok(cycles)
}

/// Segments `words` with the model committed under `key`, without
/// retraining.
pub fn segment<T: SequenceTrainer, S: AsRef<str>>(
    trainer: &T,
    store: &dyn CycleStore,
    key: CycleKey,
    words: &[S],
) -> anyhow::Result<Vec<Segmentation>> {
    let Some(artifacts) = store.load(key)? else {
        bail!("no committed cycle {key}; run at least one training cycle first");
    };
    let model = trainer
        .restore(&artifacts.model)
        .with_context(|| format!("restoring model of cycle {key}"))?;
    let extractor = artifacts.config.extractor()?;

    let features = extractor.features_only(words);
    let tags = model.predict(&features)?;
    Ok(segment_all(words.iter().map(AsRef::as_ref), &tags))
}

fn segment_all<'a>(
    words: impl IntoIterator<Item = &'a str>,
    tags: &[Vec<BoundaryTag>],
) -> Vec<Segmentation> {
    words
        .into_iter()
        .zip(tags)
        .map(|(word, tags)| Segmentation::from_decoded(word, decode(word, tags)))
        .collect()
}

fn log_ill_formed(split: &str, predictions: &[Vec<BoundaryTag>]) {
    let ill_formed = predictions
        .iter()
        .filter(|tags| !BoundaryTag::is_well_formed(tags))
        .count();
    if ill_formed > 0 {
        warn!(
            split,
            ill_formed,
            total = predictions.len(),
            "model produced ungrammatical tag sequences"
        );
    }
}
