//! # edgevision
//!
//! A Rust library for running pre-trained vision models (detectors,
//! classifiers, segmenters) directly on the device that captured the
//! imagery, without shipping frames to a server.
//!
//! ## Features
//!
//! - Compute backend probing with ranked capability tiers and automatic
//!   fallback to the CPU floor
//! - Model artifact download with chunked progress, retry/backoff, and a
//!   quota-bound persistent cache
//! - Preprocessing from arbitrary images into the planar `f32` tensor
//!   layout vision graphs expect
//! - Decoding of raw output tensors for the common detector families
//!   (dense-grid, anchor-grid, region-proposal, landmark) and classifiers,
//!   funneled through one shared non-maximum-suppression stage
//! - A serialized live-video loop with explicit cancellation
//!
//! Tensor execution itself is delegated to a [`runtime::ExecutionRuntime`]
//! implementation. The crate ships an ONNX Runtime adapter behind the
//! default `ort-runtime` feature; any executor that can load a graph and
//! run a tensor through it can stand in.
//!
//! ## Modules
//!
//! * [`core`] - Error taxonomy and tensor aliases
//! * [`domain`] - Model descriptors, predictions, bounding boxes
//! * [`backend`] - Capability tiers and backend selection
//! * [`runtime`] - The execution-runtime boundary (and the `ort` adapter)
//! * [`artifact`] - Fetcher, cache, and versioned cache guard
//! * [`preprocess`] - Image-to-tensor conversion
//! * [`decode`] - Per-architecture output decoding and shared NMS
//! * [`pipeline`] - The orchestrator and live loop
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgevision::prelude::*;
//!
//! # #[cfg(feature = "ort-runtime")]
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let descriptor = ModelDescriptor::new(
//!     "yolo-coco",
//!     "1.2.0",
//!     "https://models.example.com/yolo-coco.onnx",
//!     ArchitectureFamily::DenseGrid,
//!     InputShape::new(640, 640, 3),
//! );
//!
//! let cache = ArtifactCache::open("models.db", 500 * 1024 * 1024)?;
//! let mut pipeline = Pipeline::new(edgevision::runtime::ort::OrtRuntime::new(), cache);
//!
//! pipeline.select_backend();
//! pipeline.ensure_model(&descriptor, |event| {
//!     if let ModelEvent::Progress(p) = event {
//!         println!("{} / {:?} bytes", p.loaded, p.total);
//!     }
//! })?;
//!
//! let image = image::open("frame.jpg")?;
//! let result = pipeline.run_on_image(&image)?;
//! for prediction in &result.predictions {
//!     println!("{} ({:.2})", prediction.class_name, prediction.confidence);
//! }
//! # Ok(())
//! # }
//! # #[cfg(not(feature = "ort-runtime"))]
//! # fn main() {}
//! ```

pub mod artifact;
pub mod backend;
pub mod core;
pub mod decode;
pub mod domain;
pub mod pipeline;
pub mod preprocess;
pub mod runtime;

/// Prelude module for convenient imports.
///
/// Bring the essentials into scope with a single use statement:
///
/// ```rust
/// use edgevision::prelude::*;
/// ```
pub mod prelude {
    pub use crate::artifact::{ArtifactCache, ArtifactFetcher, VersionedCacheGuard};
    pub use crate::backend::{CapabilityTier, DeviceCapability};
    pub use crate::core::{VisionError, VisionResult};
    pub use crate::domain::{
        ArchitectureFamily, BoundingBox, InferenceResult, InputShape, ModelDescriptor, Prediction,
    };
    pub use crate::pipeline::{CancellationToken, ModelEvent, Pipeline};
}

/// Initializes the tracing subscriber for logging.
///
/// Sets up an environment-filtered formatting subscriber. Typically called
/// once at application start; library code only emits events.
pub fn init_tracing() {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();
}
