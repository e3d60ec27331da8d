//! Anchor-based grid detector decoding (TinyYOLOv2-style).
//!
//! Expects a single `[1, A * (5 + num_classes), Sy, Sx]` tensor: per grid
//! cell and anchor, five box parameters (tx, ty, tw, th, objectness
//! logit) followed by class logits. Confidence is sigmoid(objectness) ×
//! the max softmax class probability; the box center comes from sigmoid
//! center offsets plus the cell position, the size from exponential
//! deltas times the anchor dimensions, both in grid-stride units.

use crate::core::{RawOutput, VisionResult};
use crate::domain::{BoundingBox, Prediction};

use super::{sigmoid, softmax_stable, DecodeContext};

/// Per-anchor box parameters preceding the class logits.
const BOX_PARAMS: usize = 5;

pub fn decode(
    output: &RawOutput,
    anchors: &[(f32, f32)],
    ctx: &DecodeContext,
) -> VisionResult<Vec<Prediction>> {
    let descriptor = ctx.descriptor;
    let num_classes = descriptor.num_classes();
    let channels_per_anchor = BOX_PARAMS + num_classes;
    let expected_channels = anchors.len() * channels_per_anchor;

    if output.shape.len() != 4 || output.shape[0] != 1 || output.shape[1] != expected_channels {
        return Err(crate::core::VisionError::unsupported_shape(
            &descriptor.architecture,
            &output.shape,
            &format!("[1, {expected_channels}, Sy, Sx]"),
        ));
    }

    let grid_h = output.shape[2];
    let grid_w = output.shape[3];
    let cell_area = grid_h * grid_w;
    let data = &output.data;

    let input_w = descriptor.input_shape.width as f32;
    let input_h = descriptor.input_shape.height as f32;
    let stride_x = input_w / grid_w as f32;
    let stride_y = input_h / grid_h as f32;
    let scale_x = ctx.scale_x();
    let scale_y = ctx.scale_y();
    let threshold = descriptor.postprocessing.confidence_threshold;

    let mut candidates = Vec::new();
    let mut class_logits = vec![0.0f32; num_classes];

    for cy in 0..grid_h {
        for cx in 0..grid_w {
            for (a, &(anchor_w, anchor_h)) in anchors.iter().enumerate() {
                let at = |param: usize| {
                    let channel = a * channels_per_anchor + param;
                    data[channel * cell_area + cy * grid_w + cx]
                };

                let objectness = sigmoid(at(4));
                for (c, logit) in class_logits.iter_mut().enumerate() {
                    *logit = at(BOX_PARAMS + c);
                }
                let probs = softmax_stable(&class_logits);
                let (best_class, best_prob) = probs
                    .iter()
                    .enumerate()
                    .fold((0usize, f32::NEG_INFINITY), |acc, (c, &p)| {
                        if p > acc.1 { (c, p) } else { acc }
                    });

                let confidence = objectness * best_prob;
                if confidence < threshold {
                    continue;
                }

                let bx = (sigmoid(at(0)) + cx as f32) * stride_x;
                let by = (sigmoid(at(1)) + cy as f32) * stride_y;
                let bw = at(2).exp() * anchor_w * stride_x;
                let bh = at(3).exp() * anchor_h * stride_y;

                candidates.push(Prediction::detection(
                    descriptor.label_for(best_class),
                    best_class,
                    confidence,
                    BoundingBox::new(
                        (bx - bw / 2.0) * scale_x,
                        (by - bh / 2.0) * scale_y,
                        bw * scale_x,
                        bh * scale_y,
                    ),
                ));
            }
        }
    }

    Ok(candidates)
}
