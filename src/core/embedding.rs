use std::rc::Rc;

use ndarray::prelude::*;
use ndarray_rand::rand_distr::Normal;
use ndarray_rand::RandomExt;

use super::{NegativeSamplingError, ParameterGradient, Parameterized, Result, Tensor, TensorBuilder};

/// Small random weights for a (vocabulary_size, embedding_dimensionality)
/// table. The rows index over vocabulary tokens.
pub fn random_embedding_weights(
    identifier: &str,
    vocabulary_size: usize,
    embedding_dimensionality: usize,
) -> Rc<Tensor> {
    let weights = Array::random(
        (vocabulary_size, embedding_dimensionality),
        Normal::new(0., 0.01).expect("standard deviation is finite and positive"),
    );
    Rc::new(
        TensorBuilder::new(weights.into_dyn())
            .identifier(&format!("{}_weights", identifier))
            .build(),
    )
}

fn as_matrix<'a>(array: &'a ArrayD<f32>, operation: &'static str) -> Result<ArrayView2<'a, f32>> {
    array
        .view()
        .into_dimensionality::<Ix2>()
        .map_err(|_| NegativeSamplingError::ShapeMismatch {
            operation,
            expected: vec![0, 0],
            actual: array.shape().to_vec(),
        })
}

/// Row lookup into a shared weight matrix, with this layer's own gradient
/// buffer for the rows it looked up.
pub struct Embedding {
    identifier: String,
    weights: Rc<Tensor>,
    gradient: Rc<Tensor>,
    index: Option<Vec<usize>>,
}

impl Embedding {
    pub fn new(identifier: &str, weights: Rc<Tensor>) -> Result<Self> {
        let shape = weights.shape();
        if shape.len() != 2 {
            return Err(NegativeSamplingError::ShapeMismatch {
                operation: "embedding construction",
                expected: vec![0, 0],
                actual: shape,
            });
        }
        let gradient = Rc::new(
            TensorBuilder::new(ArrayD::zeros(shape))
                .identifier(&format!("{}_gradient", identifier))
                .build(),
        );
        Ok(Self {
            identifier: identifier.to_owned(),
            weights,
            gradient,
            index: None,
        })
    }

    pub fn vocabulary_size(&self) -> usize {
        self.weights.borrow_array().shape()[0]
    }

    pub fn dimensionality(&self) -> usize {
        self.weights.borrow_array().shape()[1]
    }

    pub fn gradient(&self) -> Rc<Tensor> {
        self.gradient.clone()
    }

    pub fn forward(&mut self, index: ArrayView1<usize>) -> Result<Array2<f32>> {
        let vocabulary_size = self.vocabulary_size();
        if let Some(&token) = index.iter().find(|&&token| token >= vocabulary_size) {
            return Err(NegativeSamplingError::IndexOutOfRange {
                index: token,
                vocabulary_size,
            });
        }
        let index = index.to_vec();
        let weights = self.weights.borrow_array();
        let embedding_matrix = as_matrix(&weights, "embedding forward")?;
        let rows = embedding_matrix.select(Axis(0), &index);
        self.index = Some(index);
        Ok(rows)
    }

    pub fn backward(&mut self, out_gradient: &Array2<f32>) -> Result<()> {
        let index = self.index.as_ref().ok_or(NegativeSamplingError::StateError {
            layer: "Embedding",
        })?;
        let expected = [index.len(), self.dimensionality()];
        if out_gradient.shape() != expected {
            return Err(NegativeSamplingError::ShapeMismatch {
                operation: "embedding backward",
                expected: expected.to_vec(),
                actual: out_gradient.shape().to_vec(),
            });
        }

        // The gradients on the output get "un-plucked" back into the buffer.
        // Repeated tokens must add up, so this is `+=` over a zeroed buffer,
        // one row at a time.
        let gradient_shape = self.gradient.shape();
        let mut buffer = self.gradient.borrow_array_mut();
        buffer.fill(0.);
        let mut gradient = buffer
            .view_mut()
            .into_dimensionality::<Ix2>()
            .map_err(|_| NegativeSamplingError::ShapeMismatch {
                operation: "embedding backward",
                expected: vec![0, 0],
                actual: gradient_shape,
            })?;
        for (i, &token) in index.iter().enumerate() {
            let mut token_gradient = gradient.row_mut(token);
            token_gradient += &out_gradient.row(i);
        }
        self.index = None;
        Ok(())
    }
}

impl Parameterized for Embedding {
    fn identifier(&self) -> &str {
        &self.identifier
    }

    fn parameters(&self) -> Vec<ParameterGradient> {
        vec![ParameterGradient::new(
            self.weights.clone(),
            self.gradient.clone(),
        )]
    }
}

/// Embedding lookup followed by a row-wise dot product with the hidden
/// vectors: one score per batch row.
pub struct EmbeddingDot {
    embed: Embedding,
    // (h, looked-up rows)
    cache: Option<(Array2<f32>, Array2<f32>)>,
}

impl EmbeddingDot {
    pub fn new(identifier: &str, weights: Rc<Tensor>) -> Result<Self> {
        Ok(Self {
            embed: Embedding::new(identifier, weights)?,
            cache: None,
        })
    }

    pub fn forward(&mut self, h: &Array2<f32>, index: ArrayView1<usize>) -> Result<Array1<f32>> {
        let expected = [index.len(), self.embed.dimensionality()];
        if h.shape() != expected {
            return Err(NegativeSamplingError::ShapeMismatch {
                operation: "embedding-dot forward",
                expected: expected.to_vec(),
                actual: h.shape().to_vec(),
            });
        }
        let target_weights = self.embed.forward(index)?;
        let out = (&target_weights * h).sum_axis(Axis(1));
        self.cache = Some((h.clone(), target_weights));
        Ok(out)
    }

    pub fn backward(&mut self, out_gradient: &Array1<f32>) -> Result<Array2<f32>> {
        let (h, target_weights) = self.cache.take().ok_or(NegativeSamplingError::StateError {
            layer: "EmbeddingDot",
        })?;
        if out_gradient.len() != h.nrows() {
            return Err(NegativeSamplingError::ShapeMismatch {
                operation: "embedding-dot backward",
                expected: vec![h.nrows()],
                actual: out_gradient.shape().to_vec(),
            });
        }
        // out_n = Σ_j w_nj h_nj, so each row's scalar gradient broadcasts
        // across the other factor of that row.
        let out_gradient = out_gradient.view().insert_axis(Axis(1));
        let target_weights_gradient = &out_gradient * &h;
        self.embed.backward(&target_weights_gradient)?;
        Ok(&out_gradient * &target_weights)
    }
}

impl Parameterized for EmbeddingDot {
    fn identifier(&self) -> &str {
        self.embed.identifier()
    }

    fn parameters(&self) -> Vec<ParameterGradient> {
        self.embed.parameters()
    }
}
