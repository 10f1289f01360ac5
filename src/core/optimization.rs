use ndarray::prelude::*;

use super::{merge_shared_parameters, ParameterGradient};

pub trait Optimizer {
    fn step(&mut self);
    fn step_count(&self) -> usize;
    fn zero_gradients(&self);
}

fn zero_all(pairs: &[ParameterGradient]) {
    for pair in pairs {
        pair.gradient.fill(0.);
    }
}

pub struct StochasticGradientDescentOptimizer {
    pairs: Vec<ParameterGradient>,
    learning_rate: f32,
    step_count: usize,
}

impl StochasticGradientDescentOptimizer {
    pub fn new(pairs: Vec<ParameterGradient>, learning_rate: f32) -> Self {
        Self {
            pairs,
            learning_rate,
            step_count: 0,
        }
    }
}

impl Optimizer for StochasticGradientDescentOptimizer {
    fn step(&mut self) {
        for (parameter, gradient) in merge_shared_parameters(&self.pairs) {
            let mut array = parameter.borrow_array_mut();
            *array -= &(self.learning_rate * gradient);
        }
        self.step_count += 1;
    }

    fn step_count(&self) -> usize {
        self.step_count
    }

    fn zero_gradients(&self) {
        zero_all(&self.pairs);
    }
}

pub struct AdaptiveMomentEstimationOptimizer {
    pairs: Vec<ParameterGradient>,
    learning_rate: f32,
    // one per distinct parameter, in first-appearance order
    first_moment_estimates: Vec<ArrayD<f32>>,
    second_moment_estimates: Vec<ArrayD<f32>>,
    first_moment_estimate_decay: f32,
    second_moment_estimate_decay: f32,
    ε: f32,
    step_count: usize,
}

impl AdaptiveMomentEstimationOptimizer {
    pub fn new(
        pairs: Vec<ParameterGradient>,
        learning_rate: f32,
        first_moment_estimate_decay: f32,
        second_moment_estimate_decay: f32,
        ε: f32,
    ) -> Self {
        let mut first_moment_estimates = Vec::new();
        let mut second_moment_estimates = Vec::new();
        for (_, gradient) in merge_shared_parameters(&pairs) {
            first_moment_estimates.push(Array::zeros(gradient.raw_dim()));
            second_moment_estimates.push(Array::zeros(gradient.raw_dim()));
        }

        Self {
            pairs,
            learning_rate,
            first_moment_estimates,
            second_moment_estimates,
            first_moment_estimate_decay,
            second_moment_estimate_decay,
            ε,
            step_count: 0,
        }
    }
}

impl Optimizer for AdaptiveMomentEstimationOptimizer {
    fn step(&mut self) {
        let β1 = self.first_moment_estimate_decay;
        let β2 = self.second_moment_estimate_decay;
        let t = (self.step_count + 1) as i32;
        for (i, (parameter, gradient)) in merge_shared_parameters(&self.pairs)
            .into_iter()
            .enumerate()
        {
            self.first_moment_estimates[i] =
                β1 * &self.first_moment_estimates[i] + (1. - β1) * &gradient;
            self.second_moment_estimates[i] =
                β2 * &self.second_moment_estimates[i] + (1. - β2) * (&gradient * &gradient);

            let corrected_first_moments = &self.first_moment_estimates[i] / (1. - β1.powi(t));
            let corrected_second_moments = &self.second_moment_estimates[i] / (1. - β2.powi(t));

            let mut array = parameter.borrow_array_mut();
            *array = &*array
                - self.learning_rate * &corrected_first_moments
                    / (corrected_second_moments.sqrt() + self.ε);
        }

        self.step_count += 1;
    }

    fn step_count(&self) -> usize {
        self.step_count
    }

    fn zero_gradients(&self) {
        zero_all(&self.pairs);
    }
}
