use std::rc::Rc;

use log::warn;
use ndarray::prelude::*;

use crate::core::embedding::EmbeddingDot;
use crate::core::operations::SigmoidWithLoss;
use crate::core::sampling::UnigramSampler;
use crate::core::{NegativeSamplingError, ParameterGradient, Parameterized, Result, Tensor};

#[derive(Debug, Clone, PartialEq)]
pub struct NegativeSamplingConfiguration {
    pub power: f32,
    pub sample_size: usize,
    /// Seeds the negative sampler; `None` draws from entropy.
    pub seed: Option<u64>,
}

impl Default for NegativeSamplingConfiguration {
    fn default() -> Self {
        Self {
            power: 0.75,
            sample_size: 5,
            seed: None,
        }
    }
}

/// Binary-classification stand-in for a softmax over the whole vocabulary:
/// the true target is scored against label 1 and `sample_size` words drawn
/// from the unigram distribution against label 0.
///
/// Branch 0 is the positive one; branches `1..=sample_size` are negatives.
/// Every branch reads the same weight matrix but keeps its own gradient
/// buffer, and [`Parameterized::parameters`] exposes all of them in branch
/// order for the optimizer to merge.
pub struct NegativeSamplingLoss {
    identifier: String,
    sample_size: usize,
    vocabulary_size: usize,
    sampler: UnigramSampler,
    embed_dot_layers: Vec<EmbeddingDot>,
    loss_layers: Vec<SigmoidWithLoss>,
    batch_size: Option<usize>,
}

impl NegativeSamplingLoss {
    pub fn new(
        identifier: &str,
        weights: Rc<Tensor>,
        corpus: &[usize],
        configuration: &NegativeSamplingConfiguration,
    ) -> Result<Self> {
        let sample_size = configuration.sample_size;
        if sample_size == 0 {
            return Err(NegativeSamplingError::ShapeMismatch {
                operation: "negative-sampling construction",
                expected: vec![1],
                actual: vec![0],
            });
        }
        let sampler = match configuration.seed {
            Some(seed) => {
                UnigramSampler::with_seed(corpus, configuration.power, sample_size, seed)?
            }
            None => UnigramSampler::new(corpus, configuration.power, sample_size)?,
        };

        let mut embed_dot_layers = Vec::with_capacity(sample_size + 1);
        let mut loss_layers = Vec::with_capacity(sample_size + 1);
        for branch in 0..=sample_size {
            embed_dot_layers.push(EmbeddingDot::new(
                &format!("{}_branch_{}", identifier, branch),
                weights.clone(),
            )?);
            loss_layers.push(SigmoidWithLoss::new());
        }

        // Sampled indices must address rows of the weight matrix.
        let vocabulary_size = weights.shape()[0];
        if sampler.vocabulary_size() > vocabulary_size {
            return Err(NegativeSamplingError::IndexOutOfRange {
                index: sampler.vocabulary_size() - 1,
                vocabulary_size,
            });
        }
        if sampler.vocabulary_size() < vocabulary_size {
            warn!(
                "{}: corpus covers {} of {} vocabulary rows; negatives never reach the rest",
                identifier,
                sampler.vocabulary_size(),
                vocabulary_size
            );
        }

        Ok(Self {
            identifier: identifier.to_owned(),
            sample_size,
            vocabulary_size,
            sampler,
            embed_dot_layers,
            loss_layers,
            batch_size: None,
        })
    }

    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    pub fn sampler(&self) -> &UnigramSampler {
        &self.sampler
    }

    fn check_batch(&self, h: &Array2<f32>, target: &Array1<usize>) -> Result<usize> {
        let batch_size = target.len();
        if batch_size == 0 {
            return Err(NegativeSamplingError::EmptyBatch {
                operation: "negative-sampling forward",
            });
        }
        if h.nrows() != batch_size {
            return Err(NegativeSamplingError::ShapeMismatch {
                operation: "negative-sampling forward",
                expected: vec![batch_size, h.ncols()],
                actual: h.shape().to_vec(),
            });
        }
        if let Some(&index) = target.iter().find(|&&index| index >= self.vocabulary_size) {
            return Err(NegativeSamplingError::IndexOutOfRange {
                index,
                vocabulary_size: self.vocabulary_size,
            });
        }
        Ok(batch_size)
    }

    /// Draws fresh negatives for this batch and returns the summed loss of
    /// all `sample_size + 1` branches.
    pub fn forward(&mut self, h: &Array2<f32>, target: &Array1<usize>) -> Result<f32> {
        self.batch_size = None;
        // Rejected batches must not advance the sampler.
        self.check_batch(h, target)?;
        let negative_target = self.sampler.get_negative_sample(target.view());
        self.forward_with_negatives(h, target, &negative_target)
    }

    /// [`forward`](Self::forward) with the (sample_size, batch_size) negative
    /// indices supplied by the caller instead of drawn.
    pub fn forward_with_negatives(
        &mut self,
        h: &Array2<f32>,
        target: &Array1<usize>,
        negative_target: &Array2<usize>,
    ) -> Result<f32> {
        // Any failure below leaves no backward to run.
        self.batch_size = None;
        let batch_size = self.check_batch(h, target)?;
        let expected = [self.sample_size, batch_size];
        if negative_target.shape() != expected {
            return Err(NegativeSamplingError::ShapeMismatch {
                operation: "negative-sampling forward",
                expected: expected.to_vec(),
                actual: negative_target.shape().to_vec(),
            });
        }

        let correct_label = Array1::<usize>::ones(batch_size);
        let score = self.embed_dot_layers[0].forward(h, target.view())?;
        let mut loss = self.loss_layers[0].forward(&score, &correct_label)?;

        let negative_label = Array1::<usize>::zeros(batch_size);
        for (i, negatives) in negative_target.rows().into_iter().enumerate() {
            let score = self.embed_dot_layers[1 + i].forward(h, negatives)?;
            loss += self.loss_layers[1 + i].forward(&score, &negative_label)?;
        }

        self.batch_size = Some(batch_size);
        Ok(loss)
    }

    /// Gradient of `dout · loss` with respect to `h`, summed over branches.
    /// Also leaves each branch's weight gradient in its own buffer.
    pub fn backward(&mut self, dout: f32) -> Result<Array2<f32>> {
        self.batch_size
            .take()
            .ok_or(NegativeSamplingError::StateError {
                layer: "NegativeSamplingLoss",
            })?;
        let mut dh: Option<Array2<f32>> = None;
        for (loss_layer, embed_dot_layer) in self
            .loss_layers
            .iter_mut()
            .zip(self.embed_dot_layers.iter_mut())
        {
            let d = loss_layer.backward(dout)?;
            let branch_dh = embed_dot_layer.backward(&d)?;
            dh = Some(match dh {
                Some(sum) => sum + branch_dh,
                None => branch_dh,
            });
        }
        dh.ok_or(NegativeSamplingError::StateError {
            layer: "NegativeSamplingLoss",
        })
    }
}

impl Parameterized for NegativeSamplingLoss {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn parameters(&self) -> Vec<ParameterGradient> {
        let mut parameters = Vec::new();
        for layer in &self.embed_dot_layers {
            parameters.extend(layer.parameters());
        }
        parameters
    }
}
