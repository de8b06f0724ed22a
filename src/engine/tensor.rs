//! Flat channel-first tensors exchanged with the execution engine.

use std::collections::HashMap;

use ndarray::Array4;

use crate::error::InferenceError;

/// Named tensor mapping, the unit of exchange with an engine session.
pub type TensorMap = HashMap<String, Tensor>;

/// A dense f32 tensor in channel-first row-major order.
///
/// Invariant: `data.len() == shape.iter().product()`, enforced at
/// construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    shape: Vec<usize>,
    data: Vec<f32>,
}

impl Tensor {
    /// Build a tensor from a shape and flat data, validating the element
    /// count against the shape.
    pub fn new(shape: Vec<usize>, data: Vec<f32>) -> Result<Self, InferenceError> {
        let expected: usize = shape.iter().product();
        if data.len() != expected {
            return Err(InferenceError::Run(format!(
                "tensor data length {} does not match shape {:?} ({} elements)",
                data.len(),
                shape,
                expected
            )));
        }
        Ok(Self { shape, data })
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    /// Flatten into the raw element vector, in layout order.
    pub fn into_data(self) -> Vec<f32> {
        self.data
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl From<Array4<f32>> for Tensor {
    fn from(array: Array4<f32>) -> Self {
        let shape = array.shape().to_vec();
        // Iteration follows logical order, which matches the row-major
        // layout the engine expects.
        let data = array.iter().copied().collect();
        Self { shape, data }
    }
}
