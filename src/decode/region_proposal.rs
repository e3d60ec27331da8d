//! Two-tensor region-proposal detector decoding (SSD-style).
//!
//! Expects a box tensor `[1, N, 4]` (a leading batch axis is optional)
//! holding normalized `[y_min, x_min, y_max, x_max]` corners, and a score
//! tensor `[1, N, C]` with the background class at index 0. Per proposal:
//! skip background, arg-max over the remaining classes, scale corners
//! directly by the original image dimensions.

use crate::core::{RawOutput, VisionError, VisionResult};
use crate::domain::{BoundingBox, Prediction};

use super::DecodeContext;

/// Strips an optional leading batch-1 axis.
fn squeeze_batch(shape: &[usize]) -> &[usize] {
    match shape {
        [1, rest @ ..] if rest.len() == 2 => rest,
        other => other,
    }
}

pub fn decode(outputs: &[RawOutput], ctx: &DecodeContext) -> VisionResult<Vec<Prediction>> {
    let descriptor = ctx.descriptor;

    // The box tensor is the one whose record width is 4; the score tensor
    // is the other. Both shapes are declared, not guessed: anything that
    // fails to line up is rejected.
    let boxes = outputs
        .iter()
        .find(|o| matches!(squeeze_batch(&o.shape), [_, 4]))
        .ok_or_else(|| {
            VisionError::unsupported_shape(
                &descriptor.architecture,
                &outputs.first().map(|o| o.shape.clone()).unwrap_or_default(),
                "[1, N, 4] box tensor plus [1, N, C] score tensor",
            )
        })?;
    let scores = outputs
        .iter()
        .find(|o| {
            !std::ptr::eq::<RawOutput>(*o, boxes)
                && matches!(squeeze_batch(&o.shape), [n, c] if *n == squeeze_batch(&boxes.shape)[0] && *c >= 2)
        })
        .ok_or_else(|| {
            VisionError::unsupported_shape(
                &descriptor.architecture,
                &boxes.shape,
                "a score tensor [1, N, C] matching the box tensor's N",
            )
        })?;

    let [num_proposals, _] = squeeze_batch(&boxes.shape) else {
        unreachable!("shape checked above");
    };
    let [_, num_classes] = squeeze_batch(&scores.shape) else {
        unreachable!("shape checked above");
    };
    let (num_proposals, num_classes) = (*num_proposals, *num_classes);

    let orig_w = ctx.original_width as f32;
    let orig_h = ctx.original_height as f32;
    let threshold = descriptor.postprocessing.confidence_threshold;

    let mut candidates = Vec::new();
    for i in 0..num_proposals {
        let mut best_score = f32::NEG_INFINITY;
        let mut best_class = 0usize;
        // Class 0 is background; real classes start at 1.
        for c in 1..num_classes {
            let score = scores.data[i * num_classes + c];
            if score > best_score {
                best_score = score;
                best_class = c;
            }
        }
        if best_score < threshold {
            continue;
        }

        let y_min = boxes.data[i * 4];
        let x_min = boxes.data[i * 4 + 1];
        let y_max = boxes.data[i * 4 + 2];
        let x_max = boxes.data[i * 4 + 3];

        candidates.push(Prediction::detection(
            descriptor.label_for(best_class),
            best_class,
            best_score,
            BoundingBox::new(
                x_min * orig_w,
                y_min * orig_h,
                (x_max - x_min) * orig_w,
                (y_max - y_min) * orig_h,
            ),
        ));
    }

    Ok(candidates)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        ArchitectureFamily, InputShape, ModelDescriptor, PostprocessingConfig,
    };

    fn descriptor() -> ModelDescriptor {
        ModelDescriptor::new(
            "ssd",
            "1",
            "https://models.example.com/ssd.onnx",
            ArchitectureFamily::RegionProposal,
            InputShape::new(300, 300, 3),
        )
        .with_labels(vec![
            "background".to_string(),
            "person".to_string(),
            "car".to_string(),
        ])
        .with_postprocessing(PostprocessingConfig {
            confidence_threshold: 0.5,
            iou_threshold: 0.45,
            max_detections: 100,
        })
    }

    fn outputs(boxes: Vec<f32>, scores: Vec<f32>, n: usize, c: usize) -> Vec<RawOutput> {
        vec![
            RawOutput::new("boxes", vec![1, n, 4], boxes),
            RawOutput::new("scores", vec![1, n, c], scores),
        ]
    }

    #[test]
    fn skips_background_and_scales_normalized_corners() {
        let d = descriptor();
        let ctx = DecodeContext::new(&d, 600, 300);
        // One proposal: corners (0.1, 0.2)-(0.5, 0.6) in [ymin, xmin, ymax, xmax].
        // Background dominates numerically but must be ignored.
        let predictions = decode(
            &outputs(
                vec![0.1, 0.2, 0.5, 0.6],
                vec![0.99, 0.7, 0.2],
                1,
                3,
            ),
            &ctx,
        )
        .unwrap();

        assert_eq!(predictions.len(), 1);
        let p = &predictions[0];
        assert_eq!(p.class_name, "person");
        assert_eq!(p.class_id, 1);
        let b = p.bounding_box.unwrap();
        assert!((b.x - 0.2 * 600.0).abs() < 1e-3);
        assert!((b.y - 0.1 * 300.0).abs() < 1e-3);
        assert!((b.width - 0.4 * 600.0).abs() < 1e-3);
        assert!((b.height - 0.4 * 300.0).abs() < 1e-3);
    }

    #[test]
    fn full_frame_box_maps_to_original_corners() {
        let d = descriptor();
        let ctx = DecodeContext::new(&d, 1920, 1080);
        let predictions = decode(
            &outputs(vec![0.0, 0.0, 1.0, 1.0], vec![0.0, 0.9, 0.1], 1, 3),
            &ctx,
        )
        .unwrap();
        let b = predictions[0].bounding_box.unwrap();
        assert_eq!(b.x, 0.0);
        assert_eq!(b.y, 0.0);
        assert!((b.x_max() - 1920.0).abs() < 1e-3);
        assert!((b.y_max() - 1080.0).abs() < 1e-3);
    }

    #[test]
    fn tensor_order_does_not_matter() {
        let d = descriptor();
        let ctx = DecodeContext::new(&d, 300, 300);
        let mut flipped = outputs(vec![0.0, 0.0, 0.5, 0.5], vec![0.0, 0.8, 0.1], 1, 3);
        flipped.reverse();
        assert_eq!(decode(&flipped, &ctx).unwrap().len(), 1);
    }

    #[test]
    fn missing_score_tensor_is_unsupported() {
        let d = descriptor();
        let ctx = DecodeContext::new(&d, 300, 300);
        let only_boxes = vec![RawOutput::new("boxes", vec![1, 1, 4], vec![0.0; 4])];
        assert!(matches!(
            decode(&only_boxes, &ctx),
            Err(VisionError::UnsupportedArchitecture { .. })
        ));
    }

    #[test]
    fn proposal_count_mismatch_is_unsupported() {
        let d = descriptor();
        let ctx = DecodeContext::new(&d, 300, 300);
        let mismatched = vec![
            RawOutput::new("boxes", vec![1, 2, 4], vec![0.0; 8]),
            RawOutput::new("scores", vec![1, 3, 3], vec![0.0; 9]),
        ];
        assert!(decode(&mismatched, &ctx).is_err());
    }
}
