//! Shared duplicate suppression for all decoder families.
//!
//! One implementation so tie-breaking is identical across architectures:
//! candidates are stable-sorted by descending confidence (ties keep
//! insertion order, which each decoder produces deterministically), then
//! greedily kept; a later candidate is discarded when a kept same-class
//! candidate overlaps it above the IoU threshold. Predictions without a
//! box (classifiers) are never suppressed, only truncated.

use std::cmp::Ordering;

use crate::domain::Prediction;

/// Applies non-maximum suppression and truncates to `max_detections`.
pub fn suppress(
    mut candidates: Vec<Prediction>,
    iou_threshold: f32,
    max_detections: usize,
) -> Vec<Prediction> {
    if candidates.is_empty() || max_detections == 0 {
        return Vec::new();
    }

    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
    });

    let mut kept: Vec<Prediction> = Vec::new();
    'candidates: for candidate in candidates {
        for survivor in &kept {
            if survivor.class_id != candidate.class_id {
                continue;
            }
            if let (Some(kept_box), Some(candidate_box)) =
                (&survivor.bounding_box, &candidate.bounding_box)
            {
                if kept_box.iou(candidate_box) > iou_threshold {
                    continue 'candidates;
                }
            }
        }
        kept.push(candidate);
        if kept.len() == max_detections {
            break;
        }
    }

    kept
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BoundingBox;

    fn boxed(class_id: usize, confidence: f32, x: f32) -> Prediction {
        Prediction::detection(
            format!("class_{class_id}"),
            class_id,
            confidence,
            BoundingBox::new(x, 0.0, 10.0, 10.0),
        )
    }

    #[test]
    fn overlapping_same_class_keeps_only_higher_confidence() {
        // IoU of these two boxes is 9/11 ≈ 0.82, above the 0.45 threshold.
        let a = boxed(0, 0.9, 0.0);
        let b = boxed(0, 0.6, 1.0);
        let kept = suppress(vec![b, a], 0.45, 100);

        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].confidence, 0.9);
    }

    #[test]
    fn below_threshold_overlap_keeps_both() {
        // Boxes offset by 8px: IoU = 20/180 ≈ 0.11.
        let a = boxed(0, 0.9, 0.0);
        let b = boxed(0, 0.6, 8.0);
        let kept = suppress(vec![a, b], 0.45, 100);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn different_classes_survive_regardless_of_overlap() {
        let a = boxed(0, 0.9, 0.0);
        let b = boxed(1, 0.6, 1.0);
        let kept = suppress(vec![a, b], 0.45, 100);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn result_is_ordered_by_descending_confidence() {
        let kept = suppress(vec![boxed(0, 0.4, 0.0), boxed(1, 0.8, 50.0), boxed(2, 0.6, 100.0)], 0.45, 100);
        let confidences: Vec<f32> = kept.iter().map(|p| p.confidence).collect();
        assert_eq!(confidences, vec![0.8, 0.6, 0.4]);
    }

    #[test]
    fn confidence_ties_keep_insertion_order() {
        let first = boxed(0, 0.5, 0.0);
        let second = boxed(1, 0.5, 100.0);
        let kept = suppress(vec![first.clone(), second.clone()], 0.45, 100);
        assert_eq!(kept[0], first);
        assert_eq!(kept[1], second);
    }

    #[test]
    fn truncates_to_max_detections() {
        let candidates: Vec<_> = (0..10)
            .map(|i| boxed(i, 1.0 - i as f32 * 0.05, i as f32 * 100.0))
            .collect();
        let kept = suppress(candidates, 0.45, 3);
        assert_eq!(kept.len(), 3);
        assert_eq!(kept[0].class_id, 0);
    }

    #[test]
    fn boxless_predictions_are_never_suppressed() {
        let a = Prediction::classification("cat", 0, 0.9);
        let b = Prediction::classification("cat", 0, 0.6);
        let kept = suppress(vec![a, b], 0.45, 100);
        assert_eq!(kept.len(), 2);
    }

    #[test]
    fn deterministic_across_repeated_runs() {
        let candidates = vec![
            boxed(0, 0.9, 0.0),
            boxed(0, 0.9, 1.0),
            boxed(1, 0.7, 0.0),
            boxed(0, 0.5, 2.0),
        ];
        let first = suppress(candidates.clone(), 0.45, 100);
        for _ in 0..5 {
            assert_eq!(suppress(candidates.clone(), 0.45, 100), first);
        }
    }
}
