use std::rc::Rc;

use ndarray::prelude::*;

use negative_sampling::core::optimization::{Optimizer, StochasticGradientDescentOptimizer};
use negative_sampling::core::sampling::UnigramSampler;
use negative_sampling::core::{Tensor, TensorBuilder};
use negative_sampling::{NegativeSamplingConfiguration, NegativeSamplingLoss, Parameterized};

const CORPUS: [usize; 8] = [0, 0, 1, 2, 2, 2, 3, 4];
const SEED: u64 = 2024;

fn small_weights() -> Rc<Tensor> {
    // vocabulary 5, embedding dimensionality 3
    Rc::new(
        TensorBuilder::new(
            Array2::from_shape_fn((5, 3), |(i, j)| 0.1 * (i as f32) - 0.05 * (j as f32))
                .into_dyn(),
        )
        .identifier("small_weights")
        .build(),
    )
}

fn configuration() -> NegativeSamplingConfiguration {
    NegativeSamplingConfiguration {
        power: 0.75,
        sample_size: 2,
        seed: Some(SEED),
    }
}

fn context() -> (Array2<f32>, Array1<usize>) {
    (array![[0.2, -0.1, 0.3], [-0.3, 0.4, 0.1]], array![1, 3])
}

#[test]
fn test_forward_and_backward_shapes() {
    let mut loss =
        NegativeSamplingLoss::new("end_to_end", small_weights(), &CORPUS, &configuration())
            .unwrap();
    let (h, target) = context();
    let value = loss.forward(&h, &target).unwrap();
    assert!(value.is_finite());
    assert!(value > 0.);
    let dh = loss.backward(1.).unwrap();
    assert_eq!(dh.shape(), &[2, 3]);
}

#[test]
fn test_same_seed_same_loss() {
    let (h, target) = context();
    let mut first =
        NegativeSamplingLoss::new("first", small_weights(), &CORPUS, &configuration()).unwrap();
    let mut second =
        NegativeSamplingLoss::new("second", small_weights(), &CORPUS, &configuration()).unwrap();
    for _ in 0..5 {
        assert_eq!(
            first.forward(&h, &target).unwrap(),
            second.forward(&h, &target).unwrap()
        );
    }
}

#[test]
fn test_gradient_steps_reduce_loss() {
    let weights = small_weights();
    let mut loss =
        NegativeSamplingLoss::new("end_to_end", weights.clone(), &CORPUS, &configuration())
            .unwrap();
    let mut optimizer = StochasticGradientDescentOptimizer::new(loss.parameters(), 0.5);

    let (h, target) = context();
    // Hold the negatives fixed so successive losses measure the same objective.
    let negatives = UnigramSampler::with_seed(&CORPUS, 0.75, 2, SEED)
        .unwrap()
        .get_negative_sample(target.view());

    let mut previous = f32::INFINITY;
    for step in 0..10 {
        let value = loss.forward_with_negatives(&h, &target, &negatives).unwrap();
        assert!(
            value < previous,
            "step {}: loss {} did not fall below {}",
            step,
            value,
            previous
        );
        previous = value;
        loss.backward(1.).unwrap();
        optimizer.step();
        optimizer.zero_gradients();
    }
    assert_eq!(optimizer.step_count(), 10);
}
