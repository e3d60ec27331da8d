//! Error types for the inference pipeline.
//!
//! One taxonomy covers the whole crate: backend probing, artifact
//! acquisition, preprocessing, execution, and decoding. Recoverable
//! conditions (tier fallback, fetch retry, cache overflow) are handled
//! internally and logged; everything surfaced here carries enough context
//! for the caller to decide whether to retry, switch models, or inform the
//! user.

use thiserror::Error;

use crate::backend::CapabilityTier;
use crate::domain::ArchitectureFamily;

/// Convenient result alias for vision pipeline operations.
pub type VisionResult<T> = Result<T, VisionError>;

/// Stage of processing an error occurred in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessingStage {
    /// Image resampling.
    Resize,
    /// Mean/std normalization and layout conversion.
    Normalization,
    /// Raw output tensor decoding.
    Decode,
    /// Generic processing error.
    Generic,
}

impl std::fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessingStage::Resize => write!(f, "resize"),
            ProcessingStage::Normalization => write!(f, "normalization"),
            ProcessingStage::Decode => write!(f, "decode"),
            ProcessingStage::Generic => write!(f, "processing"),
        }
    }
}

/// Errors produced by the vision pipeline.
#[derive(Error, Debug)]
pub enum VisionError {
    /// No capability tier could load the model; nothing left to fall back to.
    #[error("no usable compute backend: all capability tiers exhausted")]
    BackendUnavailable,

    /// The artifact download failed after exhausting every retry attempt.
    #[error("artifact fetch failed after {attempts} attempt(s): {context}")]
    ArtifactFetchFailed {
        /// Number of attempts made before giving up.
        attempts: u32,
        /// Description of the final failure.
        context: String,
        /// The underlying error from the last attempt, if any.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The artifact alone exceeds the cache quota and was not persisted.
    ///
    /// Non-fatal: inference can proceed from the in-memory copy.
    #[error("artifact of {size_bytes} bytes exceeds cache quota of {quota_bytes} bytes")]
    ArtifactTooLargeForCache {
        /// Size of the rejected artifact.
        size_bytes: u64,
        /// Configured cache quota.
        quota_bytes: u64,
    },

    /// The execution runtime rejected the model at a given tier.
    #[error("executor failed to load model on {tier:?}")]
    ExecutorLoadFailed {
        /// The capability tier the load was attempted on.
        tier: CapabilityTier,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The decode engine has no decoder matching the declared family and
    /// output shape. Fatal: guessing a decoder would corrupt results.
    #[error("unsupported architecture {family:?}: {details}")]
    UnsupportedArchitecture {
        /// The architecture family the descriptor declared.
        family: ArchitectureFamily,
        /// Why dispatch failed (e.g. the observed output shape).
        details: String,
    },

    /// Opaque failure from the execution runtime during `run`.
    ///
    /// Surfaced per-frame in live mode without killing the loop.
    #[error("inference runtime error")]
    InferenceRuntimeError(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Error during a processing stage.
    #[error("{stage} failed: {context}")]
    Processing {
        /// The stage the error occurred in.
        stage: ProcessingStage,
        /// Additional context about the error.
        context: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// The operation was canceled through its cancellation token.
    #[error("operation canceled")]
    Canceled,

    /// An operation was invoked from the wrong pipeline state.
    #[error("invalid pipeline state: {message}")]
    InvalidState {
        /// What was attempted and which state the pipeline was in.
        message: String,
    },

    /// Invalid input.
    #[error("invalid input: {message}")]
    InvalidInput {
        /// A message describing the invalid input.
        message: String,
    },

    /// Configuration problem.
    #[error("configuration: {message}")]
    ConfigError {
        /// A message describing the configuration error.
        message: String,
    },

    /// Error from the cache's backing store.
    #[error("artifact store")]
    Storage(#[from] rusqlite::Error),

    /// Error while decoding an image.
    #[error("image load")]
    ImageLoad(#[from] image::ImageError),

    /// Error from tensor shape operations.
    #[error("tensor operation")]
    Tensor(#[from] ndarray::ShapeError),

    /// Error from the ONNX Runtime session.
    #[cfg(feature = "ort-runtime")]
    #[error(transparent)]
    Session(#[from] ort::Error),

    /// IO error.
    #[error("io")]
    Io(#[from] std::io::Error),
}

impl VisionError {
    /// Creates a resize-stage processing error.
    pub fn resize(context: &str, error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Processing {
            stage: ProcessingStage::Resize,
            context: context.to_string(),
            source: Box::new(error),
        }
    }

    /// Creates a normalization-stage processing error.
    pub fn normalization(
        context: &str,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Processing {
            stage: ProcessingStage::Normalization,
            context: context.to_string(),
            source: Box::new(error),
        }
    }

    /// Creates a decode-stage processing error.
    pub fn decode(context: &str, error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Processing {
            stage: ProcessingStage::Decode,
            context: context.to_string(),
            source: Box::new(error),
        }
    }

    /// Creates an error for an executor `run` failure.
    pub fn runtime(error: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::InferenceRuntimeError(Box::new(error))
    }

    /// Creates an error for an executor `load` rejection at a tier.
    pub fn executor_load(
        tier: CapabilityTier,
        error: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::ExecutorLoadFailed {
            tier,
            source: Box::new(error),
        }
    }

    /// Creates an unsupported-architecture error with shape context.
    pub fn unsupported_shape(family: &ArchitectureFamily, observed: &[usize], expected: &str) -> Self {
        Self::UnsupportedArchitecture {
            family: family.clone(),
            details: format!("expected output shape {expected}, got {observed:?}"),
        }
    }

    /// True when the error is non-fatal for the operation that produced it.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::ArtifactTooLargeForCache { .. })
    }
}

/// A plain-message error used when no richer source error exists.
#[derive(Debug)]
pub struct SimpleError {
    message: String,
}

impl SimpleError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl std::fmt::Display for SimpleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for SimpleError {}
