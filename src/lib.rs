//! Negative-sampling loss for CBOW-style word embeddings: a sigmoid
//! cross-entropy over one true target and a few unigram-sampled negatives,
//! standing in for a softmax over the whole vocabulary.

#![allow(mixed_script_confusables)]

pub mod core;
pub mod negative_sampling;
pub mod training;

pub use crate::core::{NegativeSamplingError, Parameterized, Result};
pub use crate::negative_sampling::{NegativeSamplingConfiguration, NegativeSamplingLoss};
