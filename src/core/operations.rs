use ndarray::prelude::*;

use super::{NegativeSamplingError, Result};

/// Keeps `ln` finite when a probability rounds to zero.
const LOG_FLOOR: f32 = 1e-7;

pub fn sigmoid(x: &Array1<f32>) -> Array1<f32> {
    x.mapv(|x_i| 1. / (1. + (-x_i).exp()))
}

/// Mean cross-entropy of the two-column probabilities `[1 − y, y]` picked out
/// by class index `t`:
///
/// −(1/N) Σ_n log(min(p[n, t_n] + 1e−7, 1))
fn two_class_cross_entropy(y: &Array1<f32>, t: &Array1<usize>) -> f32 {
    let batch_size = y.len() as f32;
    let total: f32 = y
        .iter()
        .zip(t.iter())
        .map(|(&y_n, &t_n)| {
            let p = if t_n == 1 { y_n } else { 1. - y_n };
            // the floor must not lift a saturated p past 1
            -(p + LOG_FLOOR).min(1.).ln()
        })
        .sum();
    total / batch_size
}

/// Sigmoid activation fused with a binary cross-entropy loss against 0/1
/// labels, so that the backward pass is the tidy `(y − t) / N`.
#[derive(Debug, Default)]
pub struct SigmoidWithLoss {
    // (sigmoid output, labels as reals)
    cache: Option<(Array1<f32>, Array1<f32>)>,
}

impl SigmoidWithLoss {
    pub fn new() -> Self {
        Self { cache: None }
    }

    pub fn forward(&mut self, x: &Array1<f32>, t: &Array1<usize>) -> Result<f32> {
        if x.shape() != t.shape() {
            return Err(NegativeSamplingError::ShapeMismatch {
                operation: "sigmoid-with-loss forward",
                expected: x.shape().to_vec(),
                actual: t.shape().to_vec(),
            });
        }
        if x.is_empty() {
            return Err(NegativeSamplingError::EmptyBatch {
                operation: "sigmoid-with-loss forward",
            });
        }
        if let Some(&label) = t.iter().find(|&&label| label > 1) {
            return Err(NegativeSamplingError::IndexOutOfRange {
                index: label,
                vocabulary_size: 2,
            });
        }

        let y = sigmoid(x);
        let loss = two_class_cross_entropy(&y, t);
        self.cache = Some((y, t.mapv(|t_n| t_n as f32)));
        Ok(loss)
    }

    pub fn backward(&mut self, dout: f32) -> Result<Array1<f32>> {
        let (y, t) = self
            .cache
            .take()
            .ok_or(NegativeSamplingError::StateError {
                layer: "SigmoidWithLoss",
            })?;
        // With L = −(1/N) Σ [t log y + (1 − t) log(1 − y)] and y = σ(x),
        // dy/dx = y(1 − y), so dL/dx = (y − t)/N.
        let batch_size = t.len() as f32;
        Ok((y - t) * dout / batch_size)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_sigmoid() {
        let y = sigmoid(&array![0., 2., -2.]);
        assert_abs_diff_eq!(y, array![0.5, 0.880797, 0.119203], epsilon = 1e-6);
    }

    #[test]
    fn test_sigmoid_with_loss_golden_values() {
        let mut layer = SigmoidWithLoss::new();
        let loss = layer
            .forward(&array![0., 2., -1.], &array![1, 0, 0])
            .expect("shapes agree");
        // y = [0.5, 0.880797, 0.268941]
        // p = [0.5, 0.119203, 0.731059]
        // −(ln 0.5 + ln 0.119203 + ln 0.731059)/3 = (0.693147 + 2.126928 + 0.313262)/3
        assert_abs_diff_eq!(loss, 1.044446, epsilon = 1e-4);

        let dx = layer.backward(1.).expect("forward was called");
        // (y − t)/3
        assert_abs_diff_eq!(
            dx,
            array![-0.166667, 0.293599, 0.089647],
            epsilon = 1e-5
        );
    }

    #[test]
    fn test_backward_scales_by_dout() {
        let mut layer = SigmoidWithLoss::new();
        layer.forward(&array![1., -1.], &array![1, 1]).unwrap();
        let unit = layer.backward(1.).unwrap();
        layer.forward(&array![1., -1.], &array![1, 1]).unwrap();
        let scaled = layer.backward(3.).unwrap();
        assert_abs_diff_eq!(scaled, unit * 3., epsilon = 1e-6);
    }

    #[test]
    fn test_loss_is_nonnegative_and_vanishes_when_confidently_right() {
        let mut layer = SigmoidWithLoss::new();
        for x in [-20., -3., -0.5, 0., 0.5, 3., 20.] {
            for t in [0, 1] {
                let loss = layer.forward(&array![x], &array![t]).unwrap();
                assert!(loss >= 0., "loss {} for x = {}, t = {}", loss, x, t);
            }
        }

        let confidently_right = layer.forward(&array![20., -20.], &array![1, 0]).unwrap();
        assert!(confidently_right < 1e-5);

        // σ(10) ≈ 0.9999546, so p[0] ≈ 4.54e−5 and the loss is about 10.
        let confidently_wrong = layer.forward(&array![10.], &array![0]).unwrap();
        assert_abs_diff_eq!(confidently_wrong, 10., epsilon = 0.05);
    }

    #[test]
    fn test_shape_mismatch() {
        let mut layer = SigmoidWithLoss::new();
        let result = layer.forward(&array![0., 1.], &array![1]);
        assert_eq!(
            result,
            Err(NegativeSamplingError::ShapeMismatch {
                operation: "sigmoid-with-loss forward",
                expected: vec![2],
                actual: vec![1],
            })
        );
    }

    #[test]
    fn test_labels_must_be_binary() {
        let mut layer = SigmoidWithLoss::new();
        assert!(matches!(
            layer.forward(&array![0.], &array![2]),
            Err(NegativeSamplingError::IndexOutOfRange { index: 2, .. })
        ));
    }

    #[test]
    fn test_empty_batch() {
        let mut layer = SigmoidWithLoss::new();
        let empty_x: Array1<f32> = Array1::zeros(0);
        let empty_t: Array1<usize> = Array1::zeros(0);
        assert!(matches!(
            layer.forward(&empty_x, &empty_t),
            Err(NegativeSamplingError::EmptyBatch { .. })
        ));
    }

    #[test]
    fn test_backward_requires_forward() {
        let mut layer = SigmoidWithLoss::new();
        assert_eq!(
            layer.backward(1.),
            Err(NegativeSamplingError::StateError {
                layer: "SigmoidWithLoss"
            })
        );

        layer.forward(&array![0.], &array![1]).unwrap();
        assert!(layer.backward(1.).is_ok());
        assert!(layer.backward(1.).is_err());
    }
}
