//! Tensor data model and codec
//!
//! This module contains the dtype enum shared with the inference server
//! protocol, the [`TensorSpec`] describing one named/shaped/typed tensor,
//! and the stateless codec converting between record field payloads and
//! dtype-tagged tensor buffers in both directions.

pub mod codec;
pub mod dtype;

pub use codec::TensorValues;
pub use dtype::DataType;

/// Name, shape and dtype of one tensor
///
/// Shape and dtype come from the bridge options and are fixed for the
/// component's lifetime until the next reconfiguration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorSpec {
    /// Tensor name as known to the model
    pub name: String,
    /// Ordered dimensions, each non-negative
    pub shape: Vec<i64>,
    /// Scalar element type
    pub dtype: DataType,
}

impl TensorSpec {
    /// Create a new tensor spec
    pub fn new(name: impl Into<String>, shape: Vec<i64>, dtype: DataType) -> Self {
        Self {
            name: name.into(),
            shape,
            dtype,
        }
    }
}
