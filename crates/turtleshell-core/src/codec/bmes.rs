//! # BMES Boundary Codec
//!
//! Encodes a morph list into a character-aligned BMES label string and
//! decodes a model's tag sequence back into morphs.
//!
//! Decoding is lenient: tags predicted by a trained model are not guaranteed
//! to follow the BMES grammar, so [`decode`] reinterprets ill-formed input
//! instead of rejecting it. The returned morphs always concatenate back to
//! the word.

use crate::codec::tags::{tags_to_string, BoundaryTag};

/// Encode a morph list into its BMES label string.
///
/// # Examples
/// ```
/// use turtleshell_core::codec::encode;
///
/// assert_eq!(encode(&["a"]), "S");
/// assert_eq!(encode(&["un", "happy"]), "BEBMMME");
/// ```
pub fn encode<S: AsRef<str>>(morphs: &[S]) -> String {
    tags_to_string(&encode_tags(morphs))
}

/// Encode a morph list into BMES tags (without sentinels).
pub fn encode_tags<S: AsRef<str>>(morphs: &[S]) -> Vec<BoundaryTag> {
    let mut tags = Vec::new();
    for morph in morphs {
        let len = morph.as_ref().chars().count();
        match len {
            0 => {}
            1 => tags.push(BoundaryTag::Single),
            _ => {
                tags.push(BoundaryTag::Begin);
                tags.extend(std::iter::repeat_n(BoundaryTag::Middle, len - 2));
                tags.push(BoundaryTag::End);
            }
        }
    }
    tags
}

/// Wrap an inner tag sequence with the word-start and word-end sentinels.
pub fn sentinel_wrap(inner: &[BoundaryTag]) -> Vec<BoundaryTag> {
    let mut tags = Vec::with_capacity(inner.len() + 2);
    tags.push(BoundaryTag::WordStart);
    tags.extend_from_slice(inner);
    tags.push(BoundaryTag::WordEnd);
    tags
}

/// Decode a bounded tag sequence (sentinel positions included) into morphs.
///
/// Never fails. The first and last positions are dropped as sentinels, the
/// remaining tags are split into morph-sized tokens, and `word` is cut into
/// consecutive pieces of those sizes. When an ill-formed sequence produces
/// tokens that overrun the word they are clamped; characters left over after
/// the last token become one trailing morph.
///
/// # Examples
/// ```
/// use turtleshell_core::codec::{decode, encode_tags, sentinel_wrap};
///
/// let tags = sentinel_wrap(&encode_tags(&["un", "happy"]));
/// assert_eq!(decode("unhappy", &tags), vec!["un", "happy"]);
/// ```
pub fn decode(word: &str, tags: &[BoundaryTag]) -> Vec<String> {
    let inner = if tags.len() >= 2 {
        tags_to_string(&tags[1..tags.len() - 1])
    } else {
        String::new()
    };
    materialize(word, &token_lengths(&inner))
}

/// Decode a bounded label string such as `"[BEBMMME]"`.
///
/// The first and last characters are treated as sentinels whatever they
/// are; other characters outside the BMES alphabet count as open-morph
/// labels, exactly like a stray sentinel predicted at an inner position.
pub fn decode_str(word: &str, bounded_labels: &str) -> Vec<String> {
    let chars: Vec<char> = bounded_labels.chars().collect();
    let inner: String = if chars.len() >= 2 {
        chars[1..chars.len() - 1].iter().collect()
    } else {
        String::new()
    };
    materialize(word, &token_lengths(&inner))
}

/// Character indices after which a morph boundary falls, read from a
/// bounded tag sequence. The last character never carries a boundary.
pub fn boundary_indices(word: &str, tags: &[BoundaryTag]) -> Vec<usize> {
    let word_len = word.chars().count();
    if tags.len() < 2 || word_len == 0 {
        return Vec::new();
    }
    tags[1..tags.len() - 1]
        .iter()
        .enumerate()
        .filter(|(i, tag)| tag.closes_morph() && *i < word_len - 1)
        .map(|(i, _)| i)
        .collect()
}

/// Resolve an inner label string into token lengths.
///
/// The labels are split on `E` into runs (empty runs dropped). A run without
/// `S` is one token that regains its `E`; a run made only of `S` is that many
/// single-character tokens; a mixed run is split on `S`, where every empty
/// fragment is an `S` token and every other fragment regains an `E`.
fn token_lengths(inner: &str) -> Vec<usize> {
    let mut lengths = Vec::new();

    for run in inner.split('E').filter(|run| !run.is_empty()) {
        let run_len = run.chars().count();
        let singles = run.chars().filter(|&c| c == 'S').count();

        if singles == 0 {
            lengths.push(run_len + 1);
        } else if singles == run_len {
            lengths.extend(std::iter::repeat_n(1, singles));
        } else {
            for fragment in run.split('S') {
                if fragment.is_empty() {
                    lengths.push(1);
                } else {
                    lengths.push(fragment.chars().count() + 1);
                }
            }
        }
    }

    lengths
}

/// Cut `word` into consecutive pieces of the given lengths.
fn materialize(word: &str, lengths: &[usize]) -> Vec<String> {
    let chars: Vec<char> = word.chars().collect();
    let mut morphs = Vec::with_capacity(lengths.len());
    let mut cursor = 0;

    for &len in lengths {
        if cursor >= chars.len() {
            break;
        }
        let end = (cursor + len).min(chars.len());
        morphs.push(chars[cursor..end].iter().collect());
        cursor = end;
    }

    if cursor < chars.len() {
        morphs.push(chars[cursor..].iter().collect());
    }

    morphs
}
