//! Anchor-free dense-grid detector decoding (YOLOv8-style).
//!
//! Expects a single `[1, 4 + num_classes, N]` tensor: four center-form box
//! attributes followed by one score row per class, each row `N` candidates
//! wide. Per candidate: arg-max class score, inclusive confidence
//! threshold, center-form to corner-form, rescale to original image space
//! with independent X/Y factors.

use crate::core::{RawOutput, VisionResult};
use crate::domain::{BoundingBox, Prediction};

use super::DecodeContext;

/// Box attributes preceding the class scores: xc, yc, w, h.
const BOX_ATTRS: usize = 4;

pub fn decode(output: &RawOutput, ctx: &DecodeContext) -> VisionResult<Vec<Prediction>> {
    let descriptor = ctx.descriptor;
    let num_classes = descriptor.num_classes();
    let expected_attrs = BOX_ATTRS + num_classes;

    if output.shape.len() != 3 || output.shape[0] != 1 || output.shape[1] != expected_attrs {
        return Err(crate::core::VisionError::unsupported_shape(
            &descriptor.architecture,
            &output.shape,
            &format!("[1, {expected_attrs}, N]"),
        ));
    }

    let n = output.shape[2];
    let data = &output.data;
    let scale_x = ctx.scale_x();
    let scale_y = ctx.scale_y();
    let threshold = descriptor.postprocessing.confidence_threshold;

    let mut candidates = Vec::new();
    for i in 0..n {
        let mut best_score = f32::NEG_INFINITY;
        let mut best_class = 0usize;
        for c in 0..num_classes {
            let score = data[(BOX_ATTRS + c) * n + i];
            if score > best_score {
                best_score = score;
                best_class = c;
            }
        }
        if best_score < threshold {
            continue;
        }

        let xc = data[i];
        let yc = data[n + i];
        let w = data[2 * n + i];
        let h = data[3 * n + i];

        candidates.push(Prediction::detection(
            descriptor.label_for(best_class),
            best_class,
            best_score,
            BoundingBox::new(
                (xc - w / 2.0) * scale_x,
                (yc - h / 2.0) * scale_y,
                w * scale_x,
                h * scale_y,
            ),
        ));
    }

    Ok(candidates)
}
