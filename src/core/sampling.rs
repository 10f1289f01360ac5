use std::collections::BTreeMap;

use log::debug;
use ndarray::prelude::*;
use rand::prelude::*;
use rand::rngs::StdRng;
use rand_distr::weighted_alias::WeightedAliasIndex;

use super::{NegativeSamplingError, Result};

/// Counts of each distinct token ID, raised to `power` and normalized.
///
/// Entry `i` belongs to the `i`-th smallest distinct ID, which is ID `i`
/// itself whenever the corpus uses a contiguous `0..n` vocabulary.
pub fn unigram_distribution(corpus: &[usize], power: f32) -> Result<Array1<f32>> {
    if corpus.is_empty() {
        return Err(NegativeSamplingError::DegenerateDistribution {
            reason: "corpus is empty".to_owned(),
        });
    }
    if !(power.is_finite() && power >= 0.) {
        return Err(NegativeSamplingError::DegenerateDistribution {
            reason: format!("smoothing power {} is not a finite non-negative number", power),
        });
    }

    let mut counts = BTreeMap::<usize, u64>::new();
    for &token in corpus {
        *counts.entry(token).or_insert(0) += 1;
    }

    let smoothed = counts
        .values()
        .map(|&count| (count as f32).powf(power))
        .collect::<Array1<f32>>();
    let total = smoothed.sum();
    if !(total.is_finite() && total > 0.) {
        return Err(NegativeSamplingError::DegenerateDistribution {
            reason: format!("smoothed counts sum to {}", total),
        });
    }
    Ok(smoothed / total)
}

/// Draws negative samples from a smoothed unigram distribution built once
/// from the corpus. Draws are independent of each other; the only state
/// carried between calls is the random number generator.
pub struct UnigramSampler {
    sample_size: usize,
    word_p: Array1<f32>,
    distribution: WeightedAliasIndex<f32>,
    rng: StdRng,
}

impl UnigramSampler {
    pub fn new(corpus: &[usize], power: f32, sample_size: usize) -> Result<Self> {
        Self::from_rng(corpus, power, sample_size, StdRng::from_entropy())
    }

    /// A sampler whose draws are reproducible for a given seed.
    pub fn with_seed(corpus: &[usize], power: f32, sample_size: usize, seed: u64) -> Result<Self> {
        Self::from_rng(corpus, power, sample_size, StdRng::seed_from_u64(seed))
    }

    fn from_rng(corpus: &[usize], power: f32, sample_size: usize, rng: StdRng) -> Result<Self> {
        let word_p = unigram_distribution(corpus, power)?;
        let distribution = WeightedAliasIndex::new(word_p.to_vec()).map_err(|error| {
            NegativeSamplingError::DegenerateDistribution {
                reason: error.to_string(),
            }
        })?;
        debug!(
            "unigram sampler over {} distinct tokens, {} negatives per target",
            word_p.len(),
            sample_size
        );
        Ok(Self {
            sample_size,
            word_p,
            distribution,
            rng,
        })
    }

    pub fn word_p(&self) -> &Array1<f32> {
        &self.word_p
    }

    pub fn vocabulary_size(&self) -> usize {
        self.word_p.len()
    }

    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    /// A (sample_size, batch_size) matrix drawn with replacement. The true
    /// target may turn up among its own negatives; that is tolerated.
    pub fn get_negative_sample(&mut self, target: ArrayView1<usize>) -> Array2<usize> {
        let batch_size = target.len();
        Array2::from_shape_simple_fn((self.sample_size, batch_size), || {
            self.distribution.sample(&mut self.rng)
        })
    }
}
