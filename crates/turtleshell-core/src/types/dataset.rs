use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::segmentation::Segmentation;

/// Which part of a cycle's data a dataset plays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitKind {
    Train,
    Test,
    Pool,
}

impl fmt::Display for SplitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SplitKind::Train => write!(f, "train"),
            SplitKind::Test => write!(f, "test"),
            SplitKind::Pool => write!(f, "pool"),
        }
    }
}

/// An ordered list of segmented words plus a word → BMES label lookup.
///
/// Words may repeat; the lookup keeps the labels of the last occurrence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<Segmentation>", into = "Vec<Segmentation>")]
pub struct Dataset {
    examples: Vec<Segmentation>,
    labels: HashMap<String, String>,
}

impl Dataset {
    /// Creates an empty dataset.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a dataset from segmentations, computing their labels.
    pub fn from_examples(examples: Vec<Segmentation>) -> Self {
        let mut dataset = Self::new();
        for example in examples {
            dataset.push(example);
        }
        dataset
    }

    /// Parses `.tgt` content, one segmented word per non-blank line.
    pub fn from_tgt_str(content: &str) -> Result<Self> {
        let examples = content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(Segmentation::from_tgt_line)
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::from_examples(examples))
    }

    /// Appends one segmentation.
    pub fn push(&mut self, example: Segmentation) {
        self.labels.insert(example.word.clone(), example.labels());
        self.examples.push(example);
    }

    /// Concatenates `other` after `self`, in order.
    pub fn union(&self, other: &Dataset) -> Dataset {
        let mut merged = self.clone();
        for example in &other.examples {
            merged.push(example.clone());
        }
        merged
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    pub fn examples(&self) -> &[Segmentation] {
        &self.examples
    }

    /// Surface words in order.
    pub fn words(&self) -> Vec<&str> {
        self.examples.iter().map(|e| e.word.as_str()).collect()
    }

    /// Morph lists in order.
    pub fn morphs(&self) -> Vec<&[String]> {
        self.examples.iter().map(|e| e.morphs.as_slice()).collect()
    }

    /// The word → BMES label lookup.
    pub fn label_lookup(&self) -> &HashMap<String, String> {
        &self.labels
    }

    /// BMES labels of a word, if it is in the dataset.
    pub fn labels_for(&self, word: &str) -> Option<&str> {
        self.labels.get(word).map(String::as_str)
    }

    /// Renders the dataset as `.src` content.
    pub fn to_src_string(&self) -> String {
        render_lines(self.examples.iter().map(Segmentation::to_src_line))
    }

    /// Renders the dataset as `.tgt` content.
    pub fn to_tgt_string(&self) -> String {
        render_lines(self.examples.iter().map(Segmentation::to_tgt_line))
    }
}

impl From<Vec<Segmentation>> for Dataset {
    fn from(examples: Vec<Segmentation>) -> Self {
        Self::from_examples(examples)
    }
}

impl From<Dataset> for Vec<Segmentation> {
    fn from(dataset: Dataset) -> Self {
        dataset.examples
    }
}

impl FromIterator<Segmentation> for Dataset {
    fn from_iter<I: IntoIterator<Item = Segmentation>>(iter: I) -> Self {
        Self::from_examples(iter.into_iter().collect())
    }
}

fn render_lines(lines: impl Iterator<Item = String>) -> String {
    let mut out = String::new();
    for line in lines {
        out.push_str(&line);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(morphs: &[&str]) -> Segmentation {
        Segmentation::new(morphs.iter().map(|m| m.to_string()).collect()).unwrap()
    }

    #[test]
    fn builds_label_lookup() {
        let dataset = Dataset::from_examples(vec![seg(&["cat", "s"]), seg(&["un", "happy"])]);
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.labels_for("cats"), Some("BMES"));
        assert_eq!(dataset.labels_for("unhappy"), Some("BEBMMME"));
        assert_eq!(dataset.labels_for("dogs"), None);
        assert_eq!(dataset.words(), vec!["cats", "unhappy"]);
    }

    #[test]
    fn parses_tgt_content_skipping_blank_lines() {
        let dataset = Dataset::from_tgt_str("c a t ! s\n\n d o g ! s \n").unwrap();
        assert_eq!(dataset.words(), vec!["cats", "dogs"]);
        assert_eq!(dataset.to_tgt_string(), "c a t ! s\nd o g ! s\n");
        assert_eq!(dataset.to_src_string(), "c a t s\nd o g s\n");
    }

    #[test]
    fn empty_content_is_empty_dataset() {
        let dataset = Dataset::from_tgt_str("").unwrap();
        assert!(dataset.is_empty());
        assert_eq!(dataset.to_tgt_string(), "");
    }

    #[test]
    fn union_preserves_order() {
        let a = Dataset::from_examples(vec![seg(&["cat", "s"])]);
        let b = Dataset::from_examples(vec![seg(&["bird", "s"])]);
        let merged = a.union(&b);
        assert_eq!(merged.words(), vec!["cats", "birds"]);
        assert_eq!(merged.labels_for("birds"), Some("BMMES"));
        assert_eq!(a.len(), 1);
    }

    #[test]
    fn serialization_roundtrip_rebuilds_labels() {
        let dataset = Dataset::from_examples(vec![seg(&["un", "help", "ful"])]);
        let json = serde_json::to_string(&dataset).unwrap();
        let back: Dataset = serde_json::from_str(&json).unwrap();
        assert_eq!(back, dataset);
        assert_eq!(back.labels_for("unhelpful"), Some("BEBMMEBME"));
    }

    #[test]
    fn split_kind_display() {
        assert_eq!(SplitKind::Pool.to_string(), "pool");
        assert_eq!(serde_json::to_string(&SplitKind::Train).unwrap(), "\"train\"");
    }
}
