//! Prediction results and bounding-box geometry.

use serde::{Deserialize, Serialize};

/// An axis-aligned bounding box in pixel units of the original
/// (pre-resize) image. `x` and `y` are non-negative by construction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl BoundingBox {
    /// Creates a bounding box, clamping the origin to non-negative values.
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x: x.max(0.0),
            y: y.max(0.0),
            width,
            height,
        }
    }

    /// Creates a bounding box from corner coordinates.
    pub fn from_corners(x_min: f32, y_min: f32, x_max: f32, y_max: f32) -> Self {
        Self::new(x_min, y_min, x_max - x_min, y_max - y_min)
    }

    pub fn x_min(&self) -> f32 {
        self.x
    }

    pub fn y_min(&self) -> f32 {
        self.y
    }

    pub fn x_max(&self) -> f32 {
        self.x + self.width
    }

    pub fn y_max(&self) -> f32 {
        self.y + self.height
    }

    pub fn area(&self) -> f32 {
        self.width * self.height
    }

    /// Area of the intersection with another box, zero when disjoint.
    pub fn intersection_area(&self, other: &BoundingBox) -> f32 {
        let inter_x1 = self.x_min().max(other.x_min());
        let inter_y1 = self.y_min().max(other.y_min());
        let inter_x2 = self.x_max().min(other.x_max());
        let inter_y2 = self.y_max().min(other.y_max());

        (inter_x2 - inter_x1).max(0.0) * (inter_y2 - inter_y1).max(0.0)
    }

    /// Intersection over Union with another box.
    ///
    /// Returns 0.0 when the union is degenerate.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let inter_area = self.intersection_area(other);
        let union_area = self.area() + other.area() - inter_area;

        if union_area <= 0.0 {
            0.0
        } else {
            inter_area / union_area
        }
    }
}

/// One labeled prediction: a classified region for detectors, a bare
/// class/score pair for classifiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    /// Human-readable class name (`class_<id>` when the descriptor carries
    /// no label for the index).
    pub class_name: String,
    /// Index into the descriptor's label list.
    pub class_id: usize,
    /// Confidence in `[0, 1]`.
    pub confidence: f32,
    /// Absent for pure classification outputs.
    pub bounding_box: Option<BoundingBox>,
}

impl Prediction {
    pub fn classification(class_name: impl Into<String>, class_id: usize, confidence: f32) -> Self {
        Self {
            class_name: class_name.into(),
            class_id,
            confidence,
            bounding_box: None,
        }
    }

    pub fn detection(
        class_name: impl Into<String>,
        class_id: usize,
        confidence: f32,
        bounding_box: BoundingBox,
    ) -> Self {
        Self {
            class_name: class_name.into(),
            class_id,
            confidence,
            bounding_box: Some(bounding_box),
        }
    }
}

/// The result of one inference pass over one frame. Immutable and
/// consumer-owned; nothing here aliases pipeline state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InferenceResult {
    /// Predictions ordered by descending confidence.
    pub predictions: Vec<Prediction>,
    /// Wall-clock time of preprocess + run + decode, in milliseconds.
    pub elapsed_ms: f64,
    /// Dimensions of the original input image (width, height).
    pub input_dimensions: (u32, u32),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_is_clamped_non_negative() {
        let b = BoundingBox::new(-4.0, -1.5, 10.0, 10.0);
        assert_eq!(b.x, 0.0);
        assert_eq!(b.y, 0.0);
    }

    #[test]
    fn iou_of_identical_boxes_is_one() {
        let b = BoundingBox::new(10.0, 10.0, 20.0, 20.0);
        assert!((b.iou(&b) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn iou_of_disjoint_boxes_is_zero() {
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(100.0, 100.0, 10.0, 10.0);
        assert_eq!(a.iou(&b), 0.0);
    }

    #[test]
    fn iou_of_half_overlap() {
        // Two 10x10 boxes sharing a 5x10 strip: inter 50, union 150.
        let a = BoundingBox::new(0.0, 0.0, 10.0, 10.0);
        let b = BoundingBox::new(5.0, 0.0, 10.0, 10.0);
        assert!((a.iou(&b) - 1.0 / 3.0).abs() < 1e-6);
    }
}
