//! Forward-backward over a linear-chain lattice, in log space.

use crate::codec::tags::BoundaryTag;
use crate::labeler::TagDistribution;

/// Forward and backward log-scores for one sequence.
#[derive(Debug, Clone)]
pub struct Lattice {
    alpha: Vec<Vec<f64>>,
    beta: Vec<Vec<f64>>,
    log_z: f64,
}

impl Lattice {
    /// Runs forward-backward over `emissions` ([seq_len][num_tags]) and
    /// `transitions` ([from][to]).
    pub fn compute(emissions: &[Vec<f64>], transitions: &[Vec<f64>]) -> Self {
        let seq_len = emissions.len();
        if seq_len == 0 {
            return Self {
                alpha: Vec::new(),
                beta: Vec::new(),
                log_z: 0.0,
            };
        }
        let num_tags = emissions[0].len();

        let mut alpha = vec![vec![0.0; num_tags]; seq_len];
        alpha[0].clone_from(&emissions[0]);
        for t in 1..seq_len {
            for to in 0..num_tags {
                let incoming = (0..num_tags).map(|from| alpha[t - 1][from] + transitions[from][to]);
                alpha[t][to] = log_sum_exp(incoming) + emissions[t][to];
            }
        }

        let mut beta = vec![vec![0.0; num_tags]; seq_len];
        for t in (0..seq_len - 1).rev() {
            for from in 0..num_tags {
                let outgoing = (0..num_tags)
                    .map(|to| transitions[from][to] + emissions[t + 1][to] + beta[t + 1][to]);
                beta[t][from] = log_sum_exp(outgoing);
            }
        }

        let log_z = log_sum_exp(alpha[seq_len - 1].iter().copied());
        Self { alpha, beta, log_z }
    }

    /// Like [`compute`](Self::compute), but only grammatical paths carry
    /// mass: the first position is the word-start tag, the last is the
    /// word-end tag and every step is a valid transition. Falls back to the
    /// unrestricted lattice when no grammatical path exists.
    pub fn compute_constrained(emissions: &[Vec<f64>], transitions: &[Vec<f64>]) -> Self {
        let seq_len = emissions.len();
        if seq_len == 0 {
            return Self::compute(emissions, transitions);
        }

        let tags = BoundaryTag::all_tags();
        let masked_transitions: Vec<Vec<f64>> = tags
            .iter()
            .zip(transitions)
            .map(|(&from, row)| {
                tags.iter()
                    .zip(row)
                    .map(|(&to, &w)| {
                        if BoundaryTag::is_valid_transition(from, to) {
                            w
                        } else {
                            f64::NEG_INFINITY
                        }
                    })
                    .collect()
            })
            .collect();

        let mut masked_emissions = emissions.to_vec();
        let pin = |row: &mut Vec<f64>, keep: BoundaryTag| {
            for (idx, score) in row.iter_mut().enumerate() {
                if idx != keep.index() {
                    *score = f64::NEG_INFINITY;
                }
            }
        };
        pin(&mut masked_emissions[0], BoundaryTag::WordStart);
        pin(&mut masked_emissions[seq_len - 1], BoundaryTag::WordEnd);

        let lattice = Self::compute(&masked_emissions, &masked_transitions);
        if lattice.log_z.is_finite() {
            lattice
        } else {
            Self::compute(emissions, transitions)
        }
    }

    /// Log of the partition function.
    pub fn log_partition(&self) -> f64 {
        self.log_z
    }

    pub fn len(&self) -> usize {
        self.alpha.len()
    }

    pub fn is_empty(&self) -> bool {
        self.alpha.is_empty()
    }

    /// P(y_t = tag | x).
    pub fn marginal(&self, t: usize, tag: usize) -> f64 {
        (self.alpha[t][tag] + self.beta[t][tag] - self.log_z).exp()
    }

    /// P(y_{t-1} = from, y_t = to | x), for `t >= 1`.
    pub fn pair_marginal(
        &self,
        t: usize,
        from: usize,
        to: usize,
        emissions: &[Vec<f64>],
        transitions: &[Vec<f64>],
    ) -> f64 {
        (self.alpha[t - 1][from] + transitions[from][to] + emissions[t][to] + self.beta[t][to]
            - self.log_z)
            .exp()
    }

    /// Normalized per-position tag distributions.
    pub fn distributions(&self) -> Vec<TagDistribution> {
        (0..self.len())
            .map(|t| {
                TagDistribution::from_fn(|tag: BoundaryTag| self.marginal(t, tag.index()))
                    .normalized()
            })
            .collect()
    }
}

/// Numerically stable `ln(sum(exp(v)))`.
pub fn log_sum_exp(values: impl Iterator<Item = f64>) -> f64 {
    let values: Vec<f64> = values.collect();
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    if max == f64::NEG_INFINITY {
        return f64::NEG_INFINITY;
    }
    max + values.iter().map(|v| (v - max).exp()).sum::<f64>().ln()
}
