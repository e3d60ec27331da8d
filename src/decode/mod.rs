//! Raw output decoding.
//!
//! Different model families emit differently shaped output tensors; each
//! family gets a dedicated decoder and declares the exact rank/shape it
//! accepts. Dispatch happens on the descriptor's declared
//! [`ArchitectureFamily`](crate::domain::ArchitectureFamily) — never on
//! filenames or element-count arithmetic — and a tensor that does not
//! match the declared shape is rejected as
//! [`UnsupportedArchitecture`](crate::core::VisionError::UnsupportedArchitecture).
//!
//! Every decoder funnels into the shared [`nms`] stage, which also
//! enforces the `max_detections` bound.

pub mod anchor_grid;
pub mod classifier;
pub mod dense_grid;
pub mod landmark;
pub mod nms;
pub mod region_proposal;

use crate::core::{RawOutput, VisionError, VisionResult};
use crate::domain::{ArchitectureFamily, ModelDescriptor, Prediction};

/// Per-frame context the decoders need: which model produced the output
/// and how large the original (pre-resize) image was.
#[derive(Debug, Clone, Copy)]
pub struct DecodeContext<'a> {
    pub descriptor: &'a ModelDescriptor,
    pub original_width: u32,
    pub original_height: u32,
}

impl<'a> DecodeContext<'a> {
    pub fn new(descriptor: &'a ModelDescriptor, original_width: u32, original_height: u32) -> Self {
        Self {
            descriptor,
            original_width,
            original_height,
        }
    }

    /// Horizontal scale from model input space to original image space.
    pub fn scale_x(&self) -> f32 {
        self.original_width as f32 / self.descriptor.input_shape.width as f32
    }

    /// Vertical scale from model input space to original image space.
    pub fn scale_y(&self) -> f32 {
        self.original_height as f32 / self.descriptor.input_shape.height as f32
    }
}

/// Decodes the executor's raw outputs into a canonical prediction list:
/// family decode, shared NMS, descending-confidence order, truncated to
/// `max_detections`.
pub fn decode_outputs(outputs: &[RawOutput], ctx: &DecodeContext) -> VisionResult<Vec<Prediction>> {
    for output in outputs {
        output.validate()?;
    }
    let primary = outputs.first().ok_or_else(|| VisionError::InvalidInput {
        message: "executor produced no output tensors".to_string(),
    })?;

    let candidates = match &ctx.descriptor.architecture {
        ArchitectureFamily::DenseGrid => dense_grid::decode(primary, ctx)?,
        ArchitectureFamily::AnchorGrid { anchors } => anchor_grid::decode(primary, anchors, ctx)?,
        ArchitectureFamily::RegionProposal => region_proposal::decode(outputs, ctx)?,
        ArchitectureFamily::Landmark => landmark::decode(primary, ctx)?,
        ArchitectureFamily::Classifier => classifier::decode(primary, ctx)?,
    };

    let post = &ctx.descriptor.postprocessing;
    let predictions = nms::suppress(candidates, post.iou_threshold, post.max_detections);
    tracing::debug!(
        model = %ctx.descriptor.id,
        predictions = predictions.len(),
        "decoded raw output"
    );
    Ok(predictions)
}

pub(crate) fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

/// Numerically stable softmax: the max logit is subtracted before
/// exponentiating so large logits cannot overflow to infinity.
pub(crate) fn softmax_stable(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    if !max.is_finite() {
        return vec![0.0; logits.len()];
    }
    let exps: Vec<f32> = logits.iter().map(|&v| (v - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    if sum <= 0.0 {
        return vec![0.0; logits.len()];
    }
    exps.into_iter().map(|e| e / sum).collect()
}
