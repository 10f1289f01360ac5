use std::cell::{Ref, RefCell, RefMut};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;
use std::sync::Mutex;

use lazy_static::lazy_static;
use ndarray::prelude::*;

pub mod embedding;
pub mod error;
pub mod operations;
pub mod optimization;
pub mod sampling;

pub use self::error::{NegativeSamplingError, Result};

lazy_static! {
    static ref COUNTER: Mutex<u64> = Mutex::new(0);
}

fn generate_sequential_tensor_id() -> String {
    // A poisoned counter still holds a usable count.
    let mut num = match COUNTER.lock() {
        Ok(num) => num,
        Err(poisoned) => poisoned.into_inner(),
    };
    *num += 1;
    format!("Tensor{}", num)
}

/// A named, shared, mutable array. Weight matrices are handed out as
/// `Rc<Tensor>` so that several layers can read the same up-to-date values
/// while only the optimizer writes them.
pub struct Tensor {
    identifier: String,
    array: RefCell<ArrayD<f32>>,
}

impl fmt::Debug for Tensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Tensor")
            .field("identifier", &self.identifier)
            .field("array", &self.array)
            .finish()
    }
}

impl Hash for Tensor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identifier.hash(state);
    }
}

impl PartialEq for Tensor {
    fn eq(&self, other: &Self) -> bool {
        self.identifier == other.identifier
    }
}

impl Eq for Tensor {}

impl Tensor {
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn borrow_array(&self) -> Ref<'_, ArrayD<f32>> {
        self.array.borrow()
    }

    pub fn borrow_array_mut(&self) -> RefMut<'_, ArrayD<f32>> {
        self.array.borrow_mut()
    }

    pub fn shape(&self) -> Vec<usize> {
        self.array.borrow().shape().to_vec()
    }

    pub fn scalar_count(&self) -> usize {
        self.array.borrow().len()
    }

    pub fn fill(&self, value: f32) {
        self.array.borrow_mut().fill(value);
    }
}

pub struct TensorBuilder {
    array: ArrayD<f32>,
    identifier: Option<String>,
}

impl TensorBuilder {
    pub fn new(array: ArrayD<f32>) -> TensorBuilder {
        TensorBuilder {
            array,
            identifier: None,
        }
    }

    pub fn identifier(mut self, identifier: &str) -> TensorBuilder {
        self.identifier = Some(identifier.to_owned());
        self
    }

    pub fn build(self) -> Tensor {
        Tensor {
            array: RefCell::new(self.array),
            identifier: match self.identifier {
                Some(identifier) => identifier,
                None => generate_sequential_tensor_id(),
            },
        }
    }
}

/// A trainable parameter together with one layer's gradient buffer for it.
///
/// Several pairs may alias the same parameter (every branch of a
/// negative-sampling loss reads the one weight matrix), but each gradient
/// buffer belongs to exactly one layer.
#[derive(Debug, Clone)]
pub struct ParameterGradient {
    pub parameter: Rc<Tensor>,
    pub gradient: Rc<Tensor>,
}

impl ParameterGradient {
    pub fn new(parameter: Rc<Tensor>, gradient: Rc<Tensor>) -> Self {
        Self {
            parameter,
            gradient,
        }
    }
}

pub trait Parameterized {
    fn identifier(&self) -> &str;
    fn parameters(&self) -> Vec<ParameterGradient>;

    /// Scalar count of the distinct parameter tensors; aliases count once.
    fn parameter_count(&self) -> usize {
        let mut seen: Vec<Rc<Tensor>> = Vec::new();
        for pair in self.parameters() {
            if !seen.iter().any(|p| Rc::ptr_eq(p, &pair.parameter)) {
                seen.push(pair.parameter);
            }
        }
        seen.iter().map(|p| p.scalar_count()).sum()
    }
}

/// Sums the gradients of pairs that share a parameter tensor, preserving the
/// order in which each distinct parameter first appears.
pub fn merge_shared_parameters(pairs: &[ParameterGradient]) -> Vec<(Rc<Tensor>, ArrayD<f32>)> {
    let mut merged: Vec<(Rc<Tensor>, ArrayD<f32>)> = Vec::new();
    for pair in pairs {
        let gradient = pair.gradient.borrow_array();
        match merged
            .iter_mut()
            .find(|(parameter, _)| Rc::ptr_eq(parameter, &pair.parameter))
        {
            Some((_, sum)) => {
                *sum += &*gradient;
            }
            None => merged.push((pair.parameter.clone(), gradient.clone())),
        }
    }
    merged
}
