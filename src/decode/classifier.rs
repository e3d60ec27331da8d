//! Pure classifier decoding.
//!
//! Expects a single logit vector, `[C]` or `[1, C]`. Logits are normalized
//! to a probability distribution with a numerically stable softmax over
//! the full vector, sorted descending, and truncated to the top K
//! (`max_detections`). No boxes, no confidence-threshold filtering: the
//! truncation is the only cut, so the reported scores are a valid
//! distribution before it.

use std::cmp::Ordering;

use crate::core::{RawOutput, VisionError, VisionResult};
use crate::domain::Prediction;

use super::{softmax_stable, DecodeContext};

pub fn decode(output: &RawOutput, ctx: &DecodeContext) -> VisionResult<Vec<Prediction>> {
    let descriptor = ctx.descriptor;

    let num_classes = match output.shape.as_slice() {
        [c] => *c,
        [1, c] => *c,
        other => {
            return Err(VisionError::unsupported_shape(
                &descriptor.architecture,
                other,
                "[C] or [1, C]",
            ));
        }
    };
    if num_classes == 0 {
        return Err(VisionError::unsupported_shape(
            &descriptor.architecture,
            &output.shape,
            "a non-empty logit vector",
        ));
    }

    let probs = softmax_stable(&output.data[..num_classes]);

    let mut ranked: Vec<(usize, f32)> = probs.into_iter().enumerate().collect();
    // Stable sort: equal probabilities stay in class-index order.
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal));
    ranked.truncate(descriptor.postprocessing.max_detections);

    Ok(ranked
        .into_iter()
        .map(|(class_id, confidence)| {
            Prediction::classification(descriptor.label_for(class_id), class_id, confidence)
        })
        .collect())
}
