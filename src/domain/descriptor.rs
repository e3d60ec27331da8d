//! Model descriptors: everything the pipeline needs to know about an
//! artifact before it touches the bytes.
//!
//! A descriptor is registered once per model (typically deserialized from
//! catalog metadata) and is the single source of truth for input layout,
//! normalization constants, label names, and the architecture family the
//! decode engine dispatches on. The family is always declared explicitly
//! here; it is never inferred from the artifact's URL or filename.

use serde::{Deserialize, Serialize};

use crate::core::errors::VisionError;

/// Fixed input tensor geometry a model expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputShape {
    pub width: u32,
    pub height: u32,
    pub channels: u32,
}

impl InputShape {
    pub fn new(width: u32, height: u32, channels: u32) -> Self {
        Self {
            width,
            height,
            channels,
        }
    }

    /// Flat element count of one tensor (`channels * height * width`).
    pub fn element_count(&self) -> usize {
        self.channels as usize * self.height as usize * self.width as usize
    }
}

/// Order of color channels in the normalized tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChannelOrder {
    #[default]
    Rgb,
    Bgr,
}

/// How a model's raw output tensor encodes detections.
///
/// Each family fixes the decoder and the output rank/shape it will accept;
/// a tensor that does not match is rejected as unsupported rather than
/// decoded by guesswork.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ArchitectureFamily {
    /// Anchor-free single-stage detector emitting one row per candidate
    /// across a dense grid: `[1, 4 + num_classes, N]` with center-form
    /// boxes and per-class scores packed together (YOLOv8-style).
    DenseGrid,
    /// Anchor-based grid detector: `[1, A * (5 + num_classes), Sy, Sx]`
    /// with per-anchor objectness, box deltas, and class logits
    /// (TinyYOLOv2-style). Carries the anchor table, since anchor geometry
    /// is model metadata the tensor itself does not encode.
    AnchorGrid { anchors: Vec<(f32, f32)> },
    /// Two-tensor region-proposal detector: boxes `[1, N, 4]` normalized
    /// `[y_min, x_min, y_max, x_max]` plus scores `[1, N, C]` with
    /// background at class 0 (SSD-style).
    RegionProposal,
    /// Fixed small-output single-class landmark detector: `[N, 5]`
    /// (`x, y, w, h, score`) or `[N, 15]` (corner pair + landmark points,
    /// score last) in input-space pixels (YuNet-style).
    Landmark,
    /// Pure classifier emitting one logit per class: `[C]` or `[1, C]`.
    Classifier,
}

impl ArchitectureFamily {
    /// The anchor table of the ONNX Model Zoo TinyYOLOv2 release, the most
    /// common anchor-grid artifact in the wild.
    pub fn anchor_grid_default() -> Self {
        Self::AnchorGrid {
            anchors: vec![
                (1.08, 1.19),
                (3.42, 4.41),
                (6.63, 11.38),
                (9.42, 5.11),
                (16.62, 10.52),
            ],
        }
    }

    /// True for families that produce bounding boxes.
    pub fn is_detector(&self) -> bool {
        !matches!(self, Self::Classifier)
    }
}

/// Normalization constants applied during preprocessing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PreprocessingConfig {
    /// Per-channel means subtracted after unit-range scaling.
    pub channel_means: [f32; 3],
    /// Per-channel standard deviations divided out after mean subtraction.
    pub channel_stds: [f32; 3],
    /// Divide byte values by 255 before mean/std normalization.
    pub normalize_to_unit_range: bool,
    /// Channel order of the produced tensor.
    pub channel_order: ChannelOrder,
}

impl Default for PreprocessingConfig {
    fn default() -> Self {
        Self {
            channel_means: [0.485, 0.456, 0.406],
            channel_stds: [0.229, 0.224, 0.225],
            normalize_to_unit_range: true,
            channel_order: ChannelOrder::Rgb,
        }
    }
}

impl PreprocessingConfig {
    /// Identity normalization: raw byte values straight into the tensor.
    pub fn passthrough() -> Self {
        Self {
            channel_means: [0.0, 0.0, 0.0],
            channel_stds: [1.0, 1.0, 1.0],
            normalize_to_unit_range: false,
            channel_order: ChannelOrder::Rgb,
        }
    }

    /// Unit-range scaling without mean/std adjustment.
    pub fn unit_range() -> Self {
        Self {
            channel_means: [0.0, 0.0, 0.0],
            channel_stds: [1.0, 1.0, 1.0],
            normalize_to_unit_range: true,
            channel_order: ChannelOrder::Rgb,
        }
    }

    /// Validates the normalization constants.
    pub fn validate(&self) -> Result<(), VisionError> {
        for (i, &s) in self.channel_stds.iter().enumerate() {
            if s <= 0.0 {
                return Err(VisionError::ConfigError {
                    message: format!(
                        "standard deviation at index {i} must be greater than 0, got {s}"
                    ),
                });
            }
        }
        for (i, &m) in self.channel_means.iter().enumerate() {
            if !m.is_finite() {
                return Err(VisionError::ConfigError {
                    message: format!("channel mean at index {i} is not finite: {m}"),
                });
            }
        }
        Ok(())
    }
}

/// Thresholds applied while decoding raw model output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PostprocessingConfig {
    /// Minimum confidence (inclusive) a candidate needs to be kept.
    pub confidence_threshold: f32,
    /// IoU above which a lower-confidence same-class box is suppressed.
    pub iou_threshold: f32,
    /// Upper bound on returned predictions (also the classifier's top-K).
    pub max_detections: usize,
}

impl Default for PostprocessingConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            iou_threshold: 0.45,
            max_detections: 100,
        }
    }
}

/// Identifies one model artifact and how to run it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Stable key; also the cache key.
    pub id: String,
    /// Version string used for cache invalidation.
    pub version: String,
    /// HTTP(S) endpoint serving the model graph bytes.
    pub source_url: String,
    /// Decoder family for the model's raw output.
    pub architecture: ArchitectureFamily,
    /// Input tensor geometry.
    pub input_shape: InputShape,
    /// Ordered, index-addressable class names. May be empty for
    /// single-class models.
    pub labels: Vec<String>,
    pub preprocessing: PreprocessingConfig,
    pub postprocessing: PostprocessingConfig,
}

impl ModelDescriptor {
    pub fn new(
        id: impl Into<String>,
        version: impl Into<String>,
        source_url: impl Into<String>,
        architecture: ArchitectureFamily,
        input_shape: InputShape,
    ) -> Self {
        Self {
            id: id.into(),
            version: version.into(),
            source_url: source_url.into(),
            architecture,
            input_shape,
            labels: Vec::new(),
            preprocessing: PreprocessingConfig::default(),
            postprocessing: PostprocessingConfig::default(),
        }
    }

    /// Deserializes and validates a descriptor from catalog JSON.
    pub fn from_json(json: &str) -> Result<Self, VisionError> {
        let descriptor: Self =
            serde_json::from_str(json).map_err(|e| VisionError::ConfigError {
                message: format!("malformed model descriptor: {e}"),
            })?;
        descriptor.validate()?;
        Ok(descriptor)
    }

    /// Sets the class labels.
    pub fn with_labels(mut self, labels: Vec<String>) -> Self {
        self.labels = labels;
        self
    }

    /// Sets the preprocessing configuration.
    pub fn with_preprocessing(mut self, preprocessing: PreprocessingConfig) -> Self {
        self.preprocessing = preprocessing;
        self
    }

    /// Sets the postprocessing configuration.
    pub fn with_postprocessing(mut self, postprocessing: PostprocessingConfig) -> Self {
        self.postprocessing = postprocessing;
        self
    }

    /// Number of classes the decode engine should assume.
    pub fn num_classes(&self) -> usize {
        self.labels.len().max(1)
    }

    /// Label for a class index, falling back to `class_<id>`.
    pub fn label_for(&self, class_id: usize) -> String {
        self.labels
            .get(class_id)
            .cloned()
            .unwrap_or_else(|| format!("class_{class_id}"))
    }

    /// Validates the descriptor before registration.
    pub fn validate(&self) -> Result<(), VisionError> {
        if self.id.is_empty() {
            return Err(VisionError::ConfigError {
                message: "model descriptor id must not be empty".to_string(),
            });
        }
        if self.input_shape.width == 0 || self.input_shape.height == 0 {
            return Err(VisionError::ConfigError {
                message: format!(
                    "input shape must be non-zero, got {}x{}",
                    self.input_shape.width, self.input_shape.height
                ),
            });
        }
        if self.input_shape.channels != 3 {
            return Err(VisionError::ConfigError {
                message: format!(
                    "only 3-channel color input is supported, got {} channels",
                    self.input_shape.channels
                ),
            });
        }
        if let ArchitectureFamily::AnchorGrid { anchors } = &self.architecture {
            if anchors.is_empty() {
                return Err(VisionError::ConfigError {
                    message: "anchor-grid family requires a non-empty anchor table".to_string(),
                });
            }
        }
        self.preprocessing.validate()
    }
}
