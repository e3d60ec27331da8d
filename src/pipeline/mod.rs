//! The orchestrator: backend selection, model acquisition, executor
//! loading with tier fallback, and per-frame inference.
//!
//! State machine:
//!
//! ```text
//! Uninitialized → BackendSelected → ArtifactReady → ExecutorLoaded
//!               → Ready → (Inferring ⇄ Ready) → Disposed
//! ```
//!
//! Transition failures (fetch failure, executor load failure) move back to
//! the prior stable state and surface a typed error; the machine is never
//! left partially initialized.

pub mod cancel;
pub mod live;

pub use cancel::CancellationToken;
pub use live::{FrameSource, LiveEvent};

use std::time::Instant;

use image::DynamicImage;

use crate::artifact::{ArtifactCache, ArtifactFetcher, FetchProgress, VersionedCacheGuard};
use crate::backend::{self, CapabilityTier, DeviceCapability};
use crate::core::{VisionError, VisionResult};
use crate::decode::{decode_outputs, DecodeContext};
use crate::domain::{InferenceResult, ModelDescriptor};
use crate::preprocess::Preprocessor;
use crate::runtime::{ExecutionRuntime, Session};

/// Lifecycle states of a [`Pipeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Uninitialized,
    BackendSelected,
    ArtifactReady,
    ExecutorLoaded,
    Ready,
    Inferring,
    Disposed,
}

/// Progress events emitted while ensuring a model is ready.
#[derive(Debug, Clone)]
pub enum ModelEvent {
    /// The artifact was served from the cache at the expected version.
    CacheHit,
    /// Download progress for a cache miss.
    Progress(FetchProgress),
    /// The artifact exceeds the cache quota and was not persisted;
    /// inference proceeds from the in-memory copy.
    CacheSkipped { size_bytes: u64 },
    /// The executor is loaded and the pipeline is ready to infer.
    Ready { tier: CapabilityTier },
}

/// Sequences selector → fetcher/cache → executor load → per-frame
/// preprocess/run/decode against one execution runtime.
pub struct Pipeline<R: ExecutionRuntime> {
    runtime: R,
    cache: ArtifactCache,
    fetcher: ArtifactFetcher,
    state: PipelineState,
    capability: Option<DeviceCapability>,
    active_tier: Option<CapabilityTier>,
    session: Option<R::Session>,
    descriptor: Option<ModelDescriptor>,
    preprocessor: Option<Preprocessor>,
}

impl<R: ExecutionRuntime> Pipeline<R> {
    pub fn new(runtime: R, cache: ArtifactCache) -> Self {
        Self {
            runtime,
            cache,
            fetcher: ArtifactFetcher::default(),
            state: PipelineState::Uninitialized,
            capability: None,
            active_tier: None,
            session: None,
            descriptor: None,
            preprocessor: None,
        }
    }

    /// Overrides the artifact fetcher (retry policy, timeouts).
    pub fn with_fetcher(mut self, fetcher: ArtifactFetcher) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// The tier the executor actually loaded on, once ready. May be lower
    /// than the probed tier after fallback.
    pub fn active_tier(&self) -> Option<CapabilityTier> {
        self.active_tier
    }

    /// Probes the device and records the best available capability tier.
    ///
    /// Idempotent: repeated calls return the cached probe result for the
    /// lifetime of this pipeline.
    pub fn select_backend(&mut self) -> DeviceCapability {
        if let Some(capability) = &self.capability {
            return capability.clone();
        }
        let capability = backend::select_backend(&self.runtime);
        self.capability = Some(capability.clone());
        if self.state == PipelineState::Uninitialized {
            self.state = PipelineState::BackendSelected;
        }
        capability
    }

    /// Acquires the model artifact (cache-first) and loads the executor,
    /// falling back through lower capability tiers as needed.
    ///
    /// Emits [`ModelEvent`]s along the way. On failure the pipeline
    /// returns to `BackendSelected` and the previous session, if any, is
    /// already released (a model switch starts by dropping it).
    pub fn ensure_model(
        &mut self,
        descriptor: &ModelDescriptor,
        mut on_event: impl FnMut(ModelEvent),
    ) -> VisionResult<()> {
        if self.state == PipelineState::Disposed {
            return Err(VisionError::InvalidState {
                message: "ensure_model called on a disposed pipeline".to_string(),
            });
        }
        descriptor.validate()?;

        let capability = self.select_backend();

        // Model switch: release the old session before acquiring the new
        // artifact, so a failure cannot leave a half-swapped pipeline.
        self.session = None;
        self.active_tier = None;
        self.preprocessor = None;
        self.descriptor = None;
        self.state = PipelineState::BackendSelected;

        let guard = VersionedCacheGuard::new(&self.cache);
        let bytes = match guard.get(&descriptor.id, &descriptor.version)? {
            Some(bytes) => {
                tracing::debug!(model = %descriptor.id, "artifact served from cache");
                on_event(ModelEvent::CacheHit);
                bytes
            }
            None => {
                let bytes = self.fetcher.fetch(
                    &descriptor.source_url,
                    |progress| on_event(ModelEvent::Progress(progress)),
                    None,
                )?;
                match guard.put(&descriptor.id, &bytes, &descriptor.version) {
                    Ok(()) => {}
                    Err(VisionError::ArtifactTooLargeForCache {
                        size_bytes,
                        quota_bytes,
                    }) => {
                        tracing::warn!(
                            model = %descriptor.id,
                            size_bytes,
                            quota_bytes,
                            "artifact exceeds cache quota, proceeding uncached"
                        );
                        on_event(ModelEvent::CacheSkipped { size_bytes });
                    }
                    Err(other) => return Err(other),
                }
                bytes
            }
        };
        self.state = PipelineState::ArtifactReady;

        let session = self.load_with_fallback(&bytes, capability.tier)?;
        self.session = Some(session);
        self.state = PipelineState::ExecutorLoaded;

        self.preprocessor = Some(Preprocessor::new(&descriptor.preprocessing)?);
        self.descriptor = Some(descriptor.clone());
        self.state = PipelineState::Ready;

        let tier = self.active_tier.unwrap_or(CapabilityTier::CpuFallback);
        tracing::debug!(model = %descriptor.id, %tier, "model ready");
        on_event(ModelEvent::Ready { tier });
        Ok(())
    }

    /// Attempts executor load exactly once per tier, from the selected
    /// tier down to the CPU floor. A tier that rejected the load is never
    /// re-attempted.
    fn load_with_fallback(
        &mut self,
        bytes: &[u8],
        start_tier: CapabilityTier,
    ) -> VisionResult<R::Session> {
        let mut last_error: Option<VisionError> = None;
        for tier in start_tier.fallback_chain() {
            match self.runtime.load(bytes, tier) {
                Ok(session) => {
                    self.active_tier = Some(tier);
                    return Ok(session);
                }
                Err(err) => {
                    tracing::warn!(%tier, error = %err, "executor load rejected, falling back");
                    last_error = Some(err);
                }
            }
        }
        self.state = PipelineState::BackendSelected;
        Err(last_error.unwrap_or(VisionError::BackendUnavailable))
    }

    /// Runs one image through preprocess → execute → decode.
    pub fn run_on_image(&mut self, image: &DynamicImage) -> VisionResult<InferenceResult> {
        if self.state != PipelineState::Ready {
            return Err(VisionError::InvalidState {
                message: format!("run_on_image requires Ready state, pipeline is {:?}", self.state),
            });
        }
        self.state = PipelineState::Inferring;
        let result = self.infer(image);
        self.state = PipelineState::Ready;
        result
    }

    fn infer(&mut self, image: &DynamicImage) -> VisionResult<InferenceResult> {
        let descriptor = self.descriptor.as_ref().expect("descriptor set in Ready state");
        let preprocessor = self
            .preprocessor
            .as_ref()
            .expect("preprocessor set in Ready state");
        let session = self.session.as_mut().expect("session set in Ready state");

        let start = Instant::now();
        let (original_width, original_height) = (image.width(), image.height());

        let tensor = preprocessor.run(image, descriptor.input_shape)?;
        let outputs = session.run(&tensor)?;
        let ctx = DecodeContext::new(descriptor, original_width, original_height);
        let predictions = decode_outputs(&outputs, &ctx)?;

        Ok(InferenceResult {
            predictions,
            elapsed_ms: start.elapsed().as_secs_f64() * 1000.0,
            input_dimensions: (original_width, original_height),
        })
    }

    /// Releases the executor session. Terminal: a disposed pipeline
    /// rejects further operations.
    pub fn dispose(&mut self) {
        self.session = None;
        self.descriptor = None;
        self.preprocessor = None;
        self.active_tier = None;
        self.state = PipelineState::Disposed;
    }
}
