use std::collections::HashMap;
use std::time;

use log::{debug, info};
use ndarray::prelude::*;
use rand::prelude::*;
use rand::rngs::StdRng;

use crate::core::embedding::{random_embedding_weights, Embedding};
use crate::core::optimization::{AdaptiveMomentEstimationOptimizer, Optimizer};
use crate::core::{NegativeSamplingError, Parameterized, Result};
use crate::negative_sampling::{NegativeSamplingConfiguration, NegativeSamplingLoss};

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingConfiguration {
    pub embedding_dimensionality: usize,
    pub batch_size: usize,
    pub learning_rate: f32,
    pub epoch_count: usize,
    /// Seeds the batch order (and, unless it has its own, the sampler).
    pub seed: Option<u64>,
    pub negative_sampling: NegativeSamplingConfiguration,
}

impl Default for TrainingConfiguration {
    fn default() -> Self {
        Self {
            embedding_dimensionality: 32,
            batch_size: 32,
            learning_rate: 0.01,
            epoch_count: 10,
            seed: None,
            negative_sampling: NegativeSamplingConfiguration::default(),
        }
    }
}

/// Splits on whitespace and numbers words in order of first appearance.
pub fn tokenize(text: &str) -> (Vec<usize>, Vec<String>) {
    let mut word_to_id = HashMap::new();
    let mut id_to_word = Vec::new();
    let mut corpus = Vec::new();
    for word in text.split_whitespace() {
        let id = *word_to_id.entry(word.to_owned()).or_insert_with(|| {
            id_to_word.push(word.to_owned());
            id_to_word.len() - 1
        });
        corpus.push(id);
    }
    (corpus, id_to_word)
}

/// Trains output embeddings with the negative-sampling loss, using a
/// one-word context: the hidden vector for position `i + 1` is the context
/// embedding of the token at position `i`. Returns the mean loss of each
/// epoch.
pub fn train_on_corpus(corpus: &[usize], configuration: &TrainingConfiguration) -> Result<Vec<f32>> {
    if corpus.len() < 2 || configuration.batch_size == 0 {
        return Err(NegativeSamplingError::EmptyBatch {
            operation: "training",
        });
    }
    let vocabulary_size = corpus.iter().max().map_or(0, |&max| max + 1);
    let dimensionality = configuration.embedding_dimensionality;

    let mut negative_sampling = configuration.negative_sampling.clone();
    if negative_sampling.seed.is_none() {
        negative_sampling.seed = configuration.seed;
    }
    let mut context_embedding = Embedding::new(
        "context",
        random_embedding_weights("context", vocabulary_size, dimensionality),
    )?;
    let mut loss_layer = NegativeSamplingLoss::new(
        "output",
        random_embedding_weights("output", vocabulary_size, dimensionality),
        corpus,
        &negative_sampling,
    )?;

    let mut pairs = loss_layer.parameters();
    pairs.extend(context_embedding.parameters());
    let mut optimizer =
        AdaptiveMomentEstimationOptimizer::new(pairs, configuration.learning_rate, 0.9, 0.999, 1e-8);
    info!(
        "training on {} tokens, vocabulary {}, {} parameters",
        corpus.len(),
        vocabulary_size,
        loss_layer.parameter_count() + context_embedding.parameter_count()
    );

    let mut rng = match configuration.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut positions = (0..corpus.len() - 1).collect::<Vec<_>>();
    let start_time = time::Instant::now();
    let mut epoch_losses = Vec::with_capacity(configuration.epoch_count);

    for epoch in 0..configuration.epoch_count {
        positions.shuffle(&mut rng);
        let mut total_loss = 0.;
        let mut batch_count = 0;
        for batch in positions.chunks(configuration.batch_size) {
            let contexts = batch.iter().map(|&i| corpus[i]).collect::<Array1<usize>>();
            let targets = batch.iter().map(|&i| corpus[i + 1]).collect::<Array1<usize>>();

            let h = context_embedding.forward(contexts.view())?;
            total_loss += loss_layer.forward(&h, &targets)?;
            let dh = loss_layer.backward(1.)?;
            context_embedding.backward(&dh)?;

            optimizer.step();
            optimizer.zero_gradients();
            batch_count += 1;
        }
        let mean_loss = total_loss / batch_count as f32;
        info!(
            "epoch {} after {}s, {} steps, loss: {}",
            epoch,
            start_time.elapsed().as_secs(),
            optimizer.step_count(),
            mean_loss
        );
        epoch_losses.push(mean_loss);
    }
    debug!("training done in {:?}", start_time.elapsed());
    Ok(epoch_losses)
}
