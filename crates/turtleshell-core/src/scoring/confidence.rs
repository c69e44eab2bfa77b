use crate::codec::tags::BoundaryTag;
use crate::labeler::TagDistribution;

/// Mean marginal probability the model assigns to its own predicted tags.
///
/// `predicted` and `marginals` cover the bounded word; the sentinel
/// positions at both ends are ignored, so the average runs over the
/// word's own characters. An empty word scores `0.0`.
#[must_use]
pub fn score(word: &str, predicted: &[BoundaryTag], marginals: &[TagDistribution]) -> f64 {
    let len = word.chars().count();
    if len == 0 {
        return 0.0;
    }

    let total: f64 = inner(predicted)
        .iter()
        .zip(inner(marginals))
        .take(len)
        .map(|(tag, dist)| dist.prob(*tag))
        .sum();

    (total / len as f64).clamp(0.0, 1.0)
}

fn inner<T>(bounded: &[T]) -> &[T] {
    match bounded.len() {
        0..=2 => &[],
        n => &bounded[1..n - 1],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{encode_tags, sentinel_wrap};

    fn points(tags: &[BoundaryTag]) -> Vec<TagDistribution> {
        tags.iter().copied().map(TagDistribution::point).collect()
    }

    #[test]
    fn certain_prediction_scores_one() {
        let tags = sentinel_wrap(&encode_tags(&["cat", "s"]));
        assert_eq!(score("cats", &tags, &points(&tags)), 1.0);
    }

    #[test]
    fn sentinels_are_ignored() {
        let tags = sentinel_wrap(&encode_tags(&["ab"]));
        let mut marginals = points(&tags);
        marginals[0] = TagDistribution::uniform();
        let last = marginals.len() - 1;
        marginals[last] = TagDistribution::uniform();
        assert_eq!(score("ab", &tags, &marginals), 1.0);
    }

    #[test]
    fn averages_over_characters() {
        let tags = sentinel_wrap(&encode_tags(&["ab"]));
        let mut marginals = points(&tags);
        marginals[1] = TagDistribution::uniform();
        let expected = (1.0 / 6.0 + 1.0) / 2.0;
        assert!((score("ab", &tags, &marginals) - expected).abs() < 1e-12);
    }

    #[test]
    fn empty_word_scores_zero() {
        let tags = vec![BoundaryTag::WordStart, BoundaryTag::WordEnd];
        assert_eq!(score("", &tags, &points(&tags)), 0.0);
    }

    #[test]
    fn short_inputs_do_not_panic() {
        assert_eq!(score("abc", &[], &[]), 0.0);
    }
}
