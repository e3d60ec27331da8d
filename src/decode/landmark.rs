//! Fixed small-output landmark detector decoding (YuNet-style).
//!
//! Single-class face detectors emit a compact per-detection record with no
//! class loop. Two record layouts are declared, both in model-input-space
//! pixels:
//!
//! - width 5: `x, y, w, h, score`
//! - width 15: `x1, y1, x2, y2`, five landmark point pairs, `score` last
//!
//! The tensor must be `[N, R]` (a leading batch-1 axis is accepted) with
//! `R` one of the declared widths; anything else is rejected rather than
//! guessed from element counts. Filtering is on the score field alone;
//! padding rows with non-positive sizes or out-of-range scores are
//! dropped.

use crate::core::{RawOutput, VisionError, VisionResult};
use crate::domain::{BoundingBox, Prediction};

use super::DecodeContext;

const RECORD_XYWH: usize = 5;
const RECORD_CORNERS_LANDMARKS: usize = 15;

pub fn decode(output: &RawOutput, ctx: &DecodeContext) -> VisionResult<Vec<Prediction>> {
    let descriptor = ctx.descriptor;

    let (n, record_len) = match output.shape.as_slice() {
        [n, r] => (*n, *r),
        [1, n, r] => (*n, *r),
        other => {
            return Err(VisionError::unsupported_shape(
                &descriptor.architecture,
                other,
                "[N, 5] or [N, 15]",
            ));
        }
    };
    if record_len != RECORD_XYWH && record_len != RECORD_CORNERS_LANDMARKS {
        return Err(VisionError::unsupported_shape(
            &descriptor.architecture,
            &output.shape,
            "[N, 5] or [N, 15]",
        ));
    }

    let scale_x = ctx.scale_x();
    let scale_y = ctx.scale_y();
    let threshold = descriptor.postprocessing.confidence_threshold;
    let class_name = descriptor.label_for(0);

    let mut candidates = Vec::new();
    for i in 0..n {
        let record = &output.data[i * record_len..(i + 1) * record_len];

        let (x, y, w, h, score) = if record_len == RECORD_XYWH {
            (record[0], record[1], record[2], record[3], record[4])
        } else {
            let (x1, y1, x2, y2) = (record[0], record[1], record[2], record[3]);
            (x1, y1, x2 - x1, y2 - y1, record[14])
        };

        // Zero-padded or garbage rows are common in fixed-size outputs.
        if score < threshold || score > 1.0 || w <= 0.0 || h <= 0.0 {
            continue;
        }

        candidates.push(Prediction::detection(
            class_name.clone(),
            0,
            score,
            BoundingBox::new(x * scale_x, y * scale_y, w * scale_x, h * scale_y),
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
            "yunet",
            "1",
            "https://models.example.com/yunet.onnx",
            ArchitectureFamily::Landmark,
            InputShape::new(320, 320, 3),
        )
        .with_labels(vec!["face".to_string()])
        .with_postprocessing(PostprocessingConfig {
            confidence_threshold: 0.6,
            iou_threshold: 0.3,
            max_detections: 50,
        })
    }

    #[test]
    fn decodes_xywh_records_and_scales() {
        let d = descriptor();
        let ctx = DecodeContext::new(&d, 640, 640);
        let out = RawOutput::new(
            "dets",
            vec![2, 5],
            vec![
                10.0, 20.0, 30.0, 40.0, 0.9, // face
                0.0, 0.0, 0.0, 0.0, 0.0, // padding row
            ],
        );

        let predictions = decode(&out, &ctx).unwrap();
        assert_eq!(predictions.len(), 1);
        let p = &predictions[0];
        assert_eq!(p.class_name, "face");
        let b = p.bounding_box.unwrap();
        assert_eq!(b.x, 20.0);
        assert_eq!(b.y, 40.0);
        assert_eq!(b.width, 60.0);
        assert_eq!(b.height, 80.0);
    }

    #[test]
    fn decodes_corner_records_with_trailing_score() {
        let d = descriptor();
        let ctx = DecodeContext::new(&d, 320, 320);
        let mut record = vec![0.0f32; 15];
        record[0] = 100.0;
        record[1] = 110.0;
        record[2] = 150.0;
        record[3] = 180.0;
        record[14] = 0.8;
        let out = RawOutput::new("dets", vec![1, 1, 15], record);

        let predictions = decode(&out, &ctx).unwrap();
        assert_eq!(predictions.len(), 1);
        let b = predictions[0].bounding_box.unwrap();
        assert_eq!(b.x, 100.0);
        assert_eq!(b.y, 110.0);
        assert_eq!(b.width, 50.0);
        assert_eq!(b.height, 70.0);
    }

    #[test]
    fn scores_above_one_are_treated_as_garbage() {
        let d = descriptor();
        let ctx = DecodeContext::new(&d, 320, 320);
        let out = RawOutput::new("dets", vec![1, 5], vec![10.0, 10.0, 20.0, 20.0, 37.5]);
        assert!(decode(&out, &ctx).unwrap().is_empty());
    }

    #[test]
    fn score_exactly_at_threshold_is_kept() {
        let d = descriptor();
        let ctx = DecodeContext::new(&d, 320, 320);
        let out = RawOutput::new("dets", vec![1, 5], vec![10.0, 10.0, 20.0, 20.0, 0.6]);
        assert_eq!(decode(&out, &ctx).unwrap().len(), 1);
    }

    #[test]
    fn undeclared_record_width_is_unsupported() {
        let d = descriptor();
        let ctx = DecodeContext::new(&d, 320, 320);
        let out = RawOutput::new("dets", vec![4, 7], vec![0.0; 28]);
        assert!(matches!(
            decode(&out, &ctx),
            Err(VisionError::UnsupportedArchitecture { .. })
        ));
    }
}
