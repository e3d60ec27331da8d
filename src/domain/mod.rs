//! Domain types: model descriptors, predictions, and bounding boxes.

pub mod descriptor;
pub mod prediction;

pub use descriptor::{
    ArchitectureFamily, ChannelOrder, InputShape, ModelDescriptor, PostprocessingConfig,
    PreprocessingConfig,
};
pub use prediction::{BoundingBox, InferenceResult, Prediction};
