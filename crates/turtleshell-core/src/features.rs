//! # Character Features
//!
//! Builds the sparse, position-indexed feature sets the sequence model sees.
//! Each word is wrapped in the `[` … `]` sentinels and every position gets
//! its right-context and left-context substrings up to `delta` characters,
//! plus its absolute index.

use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::codec::tags::{BoundaryTag, WORD_END, WORD_START};
use crate::error::{Result, TurtleError};
use crate::types::Dataset;

/// Default context window radius.
pub const DEFAULT_DELTA: usize = 4;

/// The named boolean features active at one character position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharFeatures {
    names: BTreeSet<String>,
}

impl CharFeatures {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>) {
        self.names.insert(name.into());
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Feature names in sorted order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for CharFeatures {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            names: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Features and labels for a batch of words, aligned word by word.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureBatch {
    pub features: Vec<Vec<CharFeatures>>,
    pub labels: Vec<Vec<BoundaryTag>>,
}

impl FeatureBatch {
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// Sliding-window feature extractor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureExtractor {
    delta: usize,
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self {
            delta: DEFAULT_DELTA,
        }
    }
}

impl FeatureExtractor {
    /// Creates an extractor with the given context window radius.
    ///
    /// # Errors
    ///
    /// Returns `TurtleError::InvalidConfig` if `delta` is zero.
    pub fn new(delta: usize) -> Result<Self> {
        if delta == 0 {
            return Err(TurtleError::InvalidConfig(
                "delta must be at least 1".into(),
            ));
        }
        Ok(Self { delta })
    }

    pub fn delta(&self) -> usize {
        self.delta
    }

    /// Features for every position of the bounded word, sentinels included.
    ///
    /// # Examples
    /// ```
    /// use turtleshell_core::features::FeatureExtractor;
    ///
    /// let extractor = FeatureExtractor::new(2).unwrap();
    /// let features = extractor.word_features("ab");
    ///
    /// assert_eq!(features.len(), 4); // "[ab]"
    /// assert!(features[1].contains("right_ab"));
    /// assert!(features[1].contains("left_["));
    /// assert!(features[1].contains("pos_start_1"));
    /// ```
    pub fn word_features(&self, word: &str) -> Vec<CharFeatures> {
        let bounded = bounded_chars(word);
        let n = bounded.len();

        (0..n)
            .map(|i| {
                let mut features = CharFeatures::new();

                for j in 0..self.delta {
                    let end = (i + j + 1).min(n);
                    let right: String = bounded[i..end].iter().collect();
                    features.insert(format!("right_{right}"));
                }

                for j in 0..self.delta {
                    if i < j + 1 {
                        break;
                    }
                    let left: String = bounded[i - j - 1..i].iter().collect();
                    features.insert(format!("left_{left}"));
                }

                features.insert(format!("pos_start_{i}"));
                features
            })
            .collect()
    }

    /// Labels for every position of the bounded word: the sentinel tags at
    /// both ends, the word's BMES labels in between.
    ///
    /// # Errors
    ///
    /// Returns `TurtleError::LabelLengthMismatch` if `labels` does not have
    /// one tag per character, or `TurtleError::UnknownTag` for characters
    /// outside the BMES alphabet.
    pub fn word_labels(&self, word: &str, labels: &str) -> Result<Vec<BoundaryTag>> {
        let expected = word.chars().count();
        let got = labels.chars().count();
        if expected != got {
            return Err(TurtleError::LabelLengthMismatch {
                word: word.to_string(),
                expected,
                got,
            });
        }

        let mut tags = Vec::with_capacity(expected + 2);
        tags.push(BoundaryTag::WordStart);
        for c in labels.chars() {
            let tag = BoundaryTag::from_char(c)?;
            if tag.is_sentinel() {
                return Err(TurtleError::UnknownTag(c));
            }
            tags.push(tag);
        }
        tags.push(BoundaryTag::WordEnd);
        Ok(tags)
    }

    /// Features for a batch of words, without labels.
    pub fn features_only<S: AsRef<str>>(&self, words: &[S]) -> Vec<Vec<CharFeatures>> {
        words
            .iter()
            .map(|word| self.word_features(word.as_ref()))
            .collect()
    }

    /// Features and labels for a batch of words, labels looked up by word.
    ///
    /// # Errors
    ///
    /// Returns `TurtleError::MissingLabels` if a word has no entry in
    /// `lookup`, or any error from [`FeatureExtractor::word_labels`].
    pub fn extract_batch<S: AsRef<str>>(
        &self,
        words: &[S],
        lookup: &HashMap<String, String>,
    ) -> Result<FeatureBatch> {
        let mut batch = FeatureBatch {
            features: Vec::with_capacity(words.len()),
            labels: Vec::with_capacity(words.len()),
        };

        for word in words {
            let word = word.as_ref();
            let labels = lookup
                .get(word)
                .ok_or_else(|| TurtleError::MissingLabels {
                    word: word.to_string(),
                })?;
            batch.labels.push(self.word_labels(word, labels)?);
            batch.features.push(self.word_features(word));
        }

        Ok(batch)
    }

    /// Features and labels for every word of a dataset, in order.
    pub fn extract_dataset(&self, dataset: &Dataset) -> Result<FeatureBatch> {
        self.extract_batch(&dataset.words(), dataset.label_lookup())
    }
}

fn bounded_chars(word: &str) -> Vec<char> {
    let mut bounded = Vec::with_capacity(word.len() + 2);
    bounded.push(WORD_START);
    bounded.extend(word.chars());
    bounded.push(WORD_END);
    bounded
}
