//! # BMES Boundary Tags
//!
//! Defines the tag set for character-level morph boundary labeling.
//! Uses the BMES (Begin-Middle-End-Single) scheme, plus two sentinel
//! pseudo-tags for the word-start and word-end markers that wrap every
//! word during feature construction.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TurtleError};

/// Marker wrapped around the start of a word.
pub const WORD_START: char = '[';
/// Marker wrapped around the end of a word.
pub const WORD_END: char = ']';

/// Boundary tags for labeling the characters of a bounded word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BoundaryTag {
    /// First character of a multi-character morph.
    Begin,
    /// Interior character of a multi-character morph.
    Middle,
    /// Last character of a multi-character morph.
    End,
    /// A morph made of exactly one character.
    Single,
    /// The word-start sentinel position.
    WordStart,
    /// The word-end sentinel position.
    WordEnd,
}

impl BoundaryTag {
    /// Total number of distinct tags.
    pub const NUM_TAGS: usize = 6;

    /// Get all possible tags in index order.
    pub fn all_tags() -> &'static [BoundaryTag] {
        &[
            BoundaryTag::Begin,
            BoundaryTag::Middle,
            BoundaryTag::End,
            BoundaryTag::Single,
            BoundaryTag::WordStart,
            BoundaryTag::WordEnd,
        ]
    }

    /// Get the tag index for weight tables.
    pub fn index(&self) -> usize {
        match self {
            BoundaryTag::Begin => 0,
            BoundaryTag::Middle => 1,
            BoundaryTag::End => 2,
            BoundaryTag::Single => 3,
            BoundaryTag::WordStart => 4,
            BoundaryTag::WordEnd => 5,
        }
    }

    /// Get tag from index.
    pub fn from_index(idx: usize) -> Option<Self> {
        match idx {
            0 => Some(BoundaryTag::Begin),
            1 => Some(BoundaryTag::Middle),
            2 => Some(BoundaryTag::End),
            3 => Some(BoundaryTag::Single),
            4 => Some(BoundaryTag::WordStart),
            5 => Some(BoundaryTag::WordEnd),
            _ => None,
        }
    }

    /// The single-character form used in label strings.
    pub fn as_char(&self) -> char {
        match self {
            BoundaryTag::Begin => 'B',
            BoundaryTag::Middle => 'M',
            BoundaryTag::End => 'E',
            BoundaryTag::Single => 'S',
            BoundaryTag::WordStart => WORD_START,
            BoundaryTag::WordEnd => WORD_END,
        }
    }

    /// Parse a tag from its label-string character.
    pub fn from_char(c: char) -> Result<Self> {
        match c {
            'B' => Ok(BoundaryTag::Begin),
            'M' => Ok(BoundaryTag::Middle),
            'E' => Ok(BoundaryTag::End),
            'S' => Ok(BoundaryTag::Single),
            WORD_START => Ok(BoundaryTag::WordStart),
            WORD_END => Ok(BoundaryTag::WordEnd),
            other => Err(TurtleError::UnknownTag(other)),
        }
    }

    /// Parse a whole label string, e.g. `"BEBMMME"`.
    pub fn parse_str(labels: &str) -> Result<Vec<Self>> {
        labels.chars().map(Self::from_char).collect()
    }

    /// Check if this is one of the two sentinel pseudo-tags.
    pub fn is_sentinel(&self) -> bool {
        matches!(self, BoundaryTag::WordStart | BoundaryTag::WordEnd)
    }

    /// Check if this tag closes a morph (`E` or `S`).
    pub fn closes_morph(&self) -> bool {
        matches!(self, BoundaryTag::End | BoundaryTag::Single)
    }

    /// Check if transitioning from `from` tag to `to` tag is allowed by the
    /// BMES grammar of a bounded word.
    pub fn is_valid_transition(from: BoundaryTag, to: BoundaryTag) -> bool {
        use BoundaryTag::*;
        match (from, to) {
            // A morph can only start after the word start or a closed morph
            (WordStart | End | Single, Begin | Single) => true,
            // An open morph must continue or close
            (Begin | Middle, Middle | End) => true,
            // The word ends only after a closed morph
            (End | Single, WordEnd) => true,
            _ => false,
        }
    }

    /// Whether a full bounded tag sequence obeys the grammar: it starts with
    /// the start sentinel, ends with the end sentinel, labels at least one
    /// character and every adjacent pair is a valid transition.
    pub fn is_well_formed(tags: &[BoundaryTag]) -> bool {
        if tags.len() < 3 {
            return false;
        }
        tags[0] == BoundaryTag::WordStart
            && tags[tags.len() - 1] == BoundaryTag::WordEnd
            && tags
                .windows(2)
                .all(|pair| BoundaryTag::is_valid_transition(pair[0], pair[1]))
    }
}

impl fmt::Display for BoundaryTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

/// Render a tag sequence back into its label-string form.
pub fn tags_to_string(tags: &[BoundaryTag]) -> String {
    tags.iter().map(BoundaryTag::as_char).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tag_index_roundtrip() {
        for tag in BoundaryTag::all_tags() {
            let idx = tag.index();
            let recovered = BoundaryTag::from_index(idx).unwrap();
            assert_eq!(*tag, recovered);
        }
        assert_eq!(BoundaryTag::all_tags().len(), BoundaryTag::NUM_TAGS);
        assert!(BoundaryTag::from_index(BoundaryTag::NUM_TAGS).is_none());
    }

    #[test]
    fn test_char_roundtrip() {
        for tag in BoundaryTag::all_tags() {
            assert_eq!(BoundaryTag::from_char(tag.as_char()).unwrap(), *tag);
        }
        assert!(matches!(
            BoundaryTag::from_char('X'),
            Err(TurtleError::UnknownTag('X'))
        ));
    }

    #[test]
    fn test_parse_str() {
        let tags = BoundaryTag::parse_str("[BES]").unwrap();
        assert_eq!(
            tags,
            vec![
                BoundaryTag::WordStart,
                BoundaryTag::Begin,
                BoundaryTag::End,
                BoundaryTag::Single,
                BoundaryTag::WordEnd,
            ]
        );
        assert_eq!(tags_to_string(&tags), "[BES]");
    }

    #[test]
    fn test_valid_transitions() {
        use BoundaryTag::*;
        assert!(BoundaryTag::is_valid_transition(WordStart, Begin));
        assert!(BoundaryTag::is_valid_transition(Begin, Middle));
        assert!(BoundaryTag::is_valid_transition(Middle, End));
        assert!(BoundaryTag::is_valid_transition(End, Single));
        assert!(BoundaryTag::is_valid_transition(Single, WordEnd));
    }

    #[test]
    fn test_invalid_transitions() {
        use BoundaryTag::*;
        assert!(!BoundaryTag::is_valid_transition(WordStart, Middle));
        assert!(!BoundaryTag::is_valid_transition(Begin, Single));
        assert!(!BoundaryTag::is_valid_transition(Middle, WordEnd));
        assert!(!BoundaryTag::is_valid_transition(End, Middle));
        assert!(!BoundaryTag::is_valid_transition(WordEnd, Begin));
    }

    #[test]
    fn test_well_formed() {
        let good = BoundaryTag::parse_str("[BEBMMME]").unwrap();
        assert!(BoundaryTag::is_well_formed(&good));

        let open_morph = BoundaryTag::parse_str("[BM]").unwrap();
        assert!(!BoundaryTag::is_well_formed(&open_morph));

        let no_sentinels = BoundaryTag::parse_str("BE").unwrap();
        assert!(!BoundaryTag::is_well_formed(&no_sentinels));

        let empty = BoundaryTag::parse_str("[]").unwrap();
        assert!(!BoundaryTag::is_well_formed(&empty));
    }

    #[test]
    fn test_sentinel_flags() {
        assert!(BoundaryTag::WordStart.is_sentinel());
        assert!(BoundaryTag::WordEnd.is_sentinel());
        assert!(!BoundaryTag::Single.is_sentinel());
        assert!(BoundaryTag::End.closes_morph());
        assert!(!BoundaryTag::Middle.closes_morph());
    }
}
