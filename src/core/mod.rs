//! Core types shared across the inference pipeline.
//!
//! This module contains the error taxonomy and the tensor aliases the rest
//! of the crate exchanges with the execution runtime.

pub mod errors;
pub mod tensor;

pub use errors::{ProcessingStage, VisionError, VisionResult};
pub use tensor::{RawOutput, Tensor4D};
