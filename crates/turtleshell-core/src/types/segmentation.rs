use serde::{Deserialize, Serialize};

use crate::codec;
use crate::error::{Result, TurtleError};

/// Token marking a morph boundary in segmented word-pair lines.
pub const BOUNDARY_MARK: char = '!';

/// A word together with its ordered morph list.
///
/// Invariant: the morphs are non-empty and concatenate to `word`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segmentation {
    /// Surface form of the word.
    pub word: String,
    /// Morphs in order.
    pub morphs: Vec<String>,
}

impl Segmentation {
    /// Builds a segmentation from its morphs; the word is their concatenation.
    ///
    /// # Errors
    ///
    /// Returns `TurtleError::EmptyInput` if there are no morphs or any morph
    /// is empty.
    pub fn new(morphs: Vec<String>) -> Result<Self> {
        if morphs.is_empty() || morphs.iter().any(String::is_empty) {
            return Err(TurtleError::EmptyInput);
        }
        let word = morphs.concat();
        Ok(Self { word, morphs })
    }

    /// A segmentation that treats the whole word as a single morph.
    pub fn unsegmented(word: impl Into<String>) -> Result<Self> {
        let word = word.into();
        if word.is_empty() {
            return Err(TurtleError::EmptyInput);
        }
        Ok(Self {
            morphs: vec![word.clone()],
            word,
        })
    }

    /// Pairs a word with morphs decoded for it.
    ///
    /// Used for model output, whose morphs already concatenate to the word.
    pub fn from_decoded(word: impl Into<String>, morphs: Vec<String>) -> Self {
        Self {
            word: word.into(),
            morphs,
        }
    }

    /// Parses a `.tgt` line: space-separated characters with `!` tokens at
    /// morph boundaries, e.g. `"u n ! h a p p y"`. Empty morphs produced by
    /// repeated or dangling boundary marks are skipped.
    ///
    /// # Errors
    ///
    /// Returns `TurtleError::MalformedLine` if the line holds no characters.
    pub fn from_tgt_line(line: &str) -> Result<Self> {
        let joined: String = line.split_whitespace().collect();
        let morphs: Vec<String> = joined
            .split(BOUNDARY_MARK)
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .collect();
        Self::new(morphs).map_err(|_| TurtleError::MalformedLine {
            line: line.to_string(),
        })
    }

    /// Parses a `.src` line (space-separated characters) into a word.
    pub fn word_from_src_line(line: &str) -> Result<String> {
        let word: String = line.split_whitespace().collect();
        if word.is_empty() {
            return Err(TurtleError::EmptyInput);
        }
        Ok(word)
    }

    /// Renders the `.src` line for this word.
    pub fn to_src_line(&self) -> String {
        spaced(&self.word)
    }

    /// Renders the `.tgt` line for this segmentation.
    pub fn to_tgt_line(&self) -> String {
        spaced(&self.segmented())
    }

    /// Morphs joined by the boundary mark, e.g. `"un!happy"`.
    pub fn segmented(&self) -> String {
        self.morphs.join(&BOUNDARY_MARK.to_string())
    }

    /// BMES label string of this segmentation.
    pub fn labels(&self) -> String {
        codec::encode(&self.morphs)
    }

    /// Number of characters in the word.
    pub fn char_len(&self) -> usize {
        self.word.chars().count()
    }
}

impl std::fmt::Display for Segmentation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.segmented())
    }
}

fn spaced(s: &str) -> String {
    let mut out = String::with_capacity(s.len() * 2);
    for (i, c) in s.chars().enumerate() {
        if i > 0 {
            out.push(' ');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tgt_line() {
        let seg = Segmentation::from_tgt_line("u n ! h a p p y").unwrap();
        assert_eq!(seg.word, "unhappy");
        assert_eq!(seg.morphs, vec!["un", "happy"]);
        assert_eq!(seg.labels(), "BEBMMME");
    }

    #[test]
    fn tgt_line_roundtrip() {
        let seg = Segmentation::from_tgt_line("c a t ! s\n").unwrap();
        assert_eq!(seg.to_tgt_line(), "c a t ! s");
        assert_eq!(seg.to_src_line(), "c a t s");
        assert_eq!(seg.segmented(), "cat!s");
        assert_eq!(seg.to_string(), "cat!s");
    }

    #[test]
    fn skips_empty_morphs() {
        let seg = Segmentation::from_tgt_line("! a ! ! b !").unwrap();
        assert_eq!(seg.morphs, vec!["a", "b"]);
    }

    #[test]
    fn rejects_blank_lines() {
        assert!(matches!(
            Segmentation::from_tgt_line("   "),
            Err(TurtleError::MalformedLine { .. })
        ));
        assert!(Segmentation::from_tgt_line("! !").is_err());
        assert!(Segmentation::word_from_src_line("").is_err());
    }

    #[test]
    fn new_validates_morphs() {
        assert!(Segmentation::new(vec![]).is_err());
        assert!(Segmentation::new(vec!["a".into(), String::new()]).is_err());
        let seg = Segmentation::new(vec!["dog".into(), "s".into()]).unwrap();
        assert_eq!(seg.word, "dogs");
    }

    #[test]
    fn unsegmented_word() {
        let seg = Segmentation::unsegmented("birds").unwrap();
        assert_eq!(seg.morphs, vec!["birds"]);
        assert_eq!(seg.char_len(), 5);
        assert!(Segmentation::unsegmented("").is_err());
    }

    #[test]
    fn src_line_word() {
        assert_eq!(Segmentation::word_from_src_line("b i r d s").unwrap(), "birds");
    }
}
