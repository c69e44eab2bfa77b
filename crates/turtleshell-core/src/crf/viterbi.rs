//! # Viterbi Decoding for CRF
//!
//! Finds the most likely tag sequence given emission scores and a
//! transition matrix, optionally restricted to BMES-grammatical paths.

use crate::codec::tags::BoundaryTag;
use crate::error::{Result, TurtleError};

/// Viterbi decoder for CRF tag sequences.
#[derive(Debug, Clone)]
pub struct ViterbiDecoder {
    num_tags: usize,
}

/// Path score and backpointer for Viterbi decoding.
#[derive(Debug, Clone, Copy)]
struct PathState {
    score: f64,
    prev_tag: Option<usize>,
}

impl ViterbiDecoder {
    /// Create a new Viterbi decoder.
    pub fn new(num_tags: usize) -> Self {
        Self { num_tags }
    }

    /// Decode the optimal tag sequence.
    ///
    /// # Arguments
    /// * `emission_scores` - Matrix of shape [seq_len, num_tags]
    /// * `transition_matrix` - Matrix of shape [num_tags, num_tags], indexed [from][to]
    ///
    /// # Returns
    /// The optimal tag sequence as indices.
    pub fn decode(
        &self,
        emission_scores: &[Vec<f64>],
        transition_matrix: &[Vec<f64>],
    ) -> Result<Vec<usize>> {
        let allowed = vec![vec![true; self.num_tags]; self.num_tags];
        self.decode_masked(emission_scores, transition_matrix, &allowed, None, None)
    }

    /// Decode with hard BMES constraints: paths start at the word-start tag,
    /// end at the word-end tag and only take grammatical transitions.
    pub fn decode_constrained(
        &self,
        emission_scores: &[Vec<f64>],
        transition_matrix: &[Vec<f64>],
    ) -> Result<Vec<usize>> {
        let mut allowed = vec![vec![false; self.num_tags]; self.num_tags];

        for (prev_idx, row) in allowed.iter_mut().enumerate() {
            if let Some(prev_tag) = BoundaryTag::from_index(prev_idx) {
                for (curr_idx, cell) in row.iter_mut().enumerate() {
                    if let Some(curr_tag) = BoundaryTag::from_index(curr_idx) {
                        *cell = BoundaryTag::is_valid_transition(prev_tag, curr_tag);
                    }
                }
            }
        }

        self.decode_masked(
            emission_scores,
            transition_matrix,
            &allowed,
            Some(BoundaryTag::WordStart.index()),
            Some(BoundaryTag::WordEnd.index()),
        )
    }

    fn decode_masked(
        &self,
        emission_scores: &[Vec<f64>],
        transition_matrix: &[Vec<f64>],
        allowed: &[Vec<bool>],
        first: Option<usize>,
        last: Option<usize>,
    ) -> Result<Vec<usize>> {
        let seq_len = emission_scores.len();
        if seq_len == 0 {
            return Ok(Vec::new());
        }

        // Validate dimensions
        if let Some(row) = emission_scores.iter().find(|row| row.len() != self.num_tags) {
            return Err(TurtleError::ShapeMismatch(format!(
                "emission score dimension mismatch: expected {}, got {}",
                self.num_tags,
                row.len()
            )));
        }
        if transition_matrix.len() != self.num_tags
            || transition_matrix.iter().any(|row| row.len() != self.num_tags)
        {
            return Err(TurtleError::ShapeMismatch(format!(
                "transition matrix must be {0}x{0}",
                self.num_tags
            )));
        }

        let mut dp: Vec<Vec<PathState>> = vec![
            vec![
                PathState {
                    score: f64::NEG_INFINITY,
                    prev_tag: None
                };
                self.num_tags
            ];
            seq_len
        ];

        for tag in 0..self.num_tags {
            if first.is_none_or(|first| first == tag) {
                dp[0][tag].score = emission_scores[0][tag];
            }
        }

        // Forward pass
        for pos in 1..seq_len {
            for curr_tag in 0..self.num_tags {
                let mut best_score = f64::NEG_INFINITY;
                let mut best_prev = None;

                for prev_tag in 0..self.num_tags {
                    if !allowed[prev_tag][curr_tag] {
                        continue;
                    }

                    let score = dp[pos - 1][prev_tag].score
                        + transition_matrix[prev_tag][curr_tag]
                        + emission_scores[pos][curr_tag];

                    if score > best_score {
                        best_score = score;
                        best_prev = Some(prev_tag);
                    }
                }

                dp[pos][curr_tag] = PathState {
                    score: best_score,
                    prev_tag: best_prev,
                };
            }
        }

        // Find best final tag, ignoring the end constraint when no
        // constrained path reaches it
        let best_final = |constrained: bool| {
            let mut best_tag = 0;
            let mut best_score = f64::NEG_INFINITY;
            for tag in 0..self.num_tags {
                if constrained && last.is_some_and(|last| last != tag) {
                    continue;
                }
                if dp[seq_len - 1][tag].score > best_score {
                    best_score = dp[seq_len - 1][tag].score;
                    best_tag = tag;
                }
            }
            (best_tag, best_score)
        };
        let (mut best_final_tag, best_final_score) = best_final(true);
        if best_final_score == f64::NEG_INFINITY {
            best_final_tag = best_final(false).0;
        }

        // Backtrack
        let mut path = Vec::with_capacity(seq_len);
        path.push(best_final_tag);
        let mut curr_tag = best_final_tag;

        for pos in (1..seq_len).rev() {
            curr_tag = dp[pos][curr_tag].prev_tag.unwrap_or(0);
            path.push(curr_tag);
        }

        path.reverse();
        Ok(path)
    }
}
