//! Tensor aliases and the raw output container handed back by executors.

use crate::core::errors::VisionError;

/// A 4D tensor in NCHW layout, the input format vision graphs expect.
pub type Tensor4D = ndarray::Array4<f32>;

/// One named output tensor produced by an execution runtime.
///
/// Decoders work on the flat data plus its declared shape rather than a
/// typed ndarray, since output rank varies per architecture family.
#[derive(Debug, Clone)]
pub struct RawOutput {
    /// Output name as discovered from the loaded session.
    pub name: String,
    /// Tensor dimensions, outermost first.
    pub shape: Vec<usize>,
    /// Flattened tensor data in row-major order.
    pub data: Vec<f32>,
}

impl RawOutput {
    pub fn new(name: impl Into<String>, shape: Vec<usize>, data: Vec<f32>) -> Self {
        Self {
            name: name.into(),
            shape,
            data,
        }
    }

    /// Total element count implied by the shape.
    pub fn element_count(&self) -> usize {
        self.shape.iter().product()
    }

    /// Validates that the data length matches the declared shape.
    pub fn validate(&self) -> Result<(), VisionError> {
        let expected = self.element_count();
        if self.data.len() != expected {
            return Err(VisionError::InvalidInput {
                message: format!(
                    "output '{}' data size mismatch: shape {:?} implies {} elements, got {}",
                    self.name,
                    self.shape,
                    expected,
                    self.data.len()
                ),
            });
        }
        Ok(())
    }
}
