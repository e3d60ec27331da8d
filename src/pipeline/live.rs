//! The live-video loop.
//!
//! Strictly serialized producer/consumer: capture frame → preprocess →
//! run → decode → deliver → capture next frame, paced by the executor's
//! own completion. At most one frame is ever in flight, because the
//! executor is assumed not reentrancy-safe.
//!
//! Cancellation is an explicit token checked at the top of each iteration,
//! not a mutable flag closed over by a callback: after `cancel` no new
//! frame is started, and the canceling thread never waits for an in-flight
//! run to finish.

use image::DynamicImage;

use crate::core::{VisionError, VisionResult};
use crate::domain::InferenceResult;
use crate::runtime::ExecutionRuntime;

use super::cancel::CancellationToken;
use super::Pipeline;

/// Surface a repeated identical frame error again only every this many
/// occurrences, so a persistently failing stream cannot flood the caller.
const ERROR_RESURFACE_INTERVAL: u64 = 30;

/// Supplies frames to the live loop.
///
/// `Ok(None)` ends the loop normally (stream exhausted). Errors from the
/// source are fatal to the loop; per-frame *inference* errors are not.
pub trait FrameSource {
    fn next_frame(&mut self) -> VisionResult<Option<DynamicImage>>;
}

impl<F> FrameSource for F
where
    F: FnMut() -> VisionResult<Option<DynamicImage>>,
{
    fn next_frame(&mut self) -> VisionResult<Option<DynamicImage>> {
        self()
    }
}

/// Events delivered to the live-loop consumer.
#[derive(Debug, Clone)]
pub enum LiveEvent {
    /// A frame was inferred successfully.
    Result(InferenceResult),
    /// A frame failed inside the executor. Deduplicated: identical
    /// consecutive failures are surfaced on first occurrence and then
    /// every 30th repeat.
    FrameError {
        /// Zero-based index of the failing frame.
        frame_index: u64,
        /// Rendered error message.
        message: String,
        /// How many consecutive frames produced this same message.
        occurrences: u64,
    },
}

/// Deduplicates consecutive identical frame errors.
struct ErrorDeduper {
    last_message: Option<String>,
    occurrences: u64,
}

impl ErrorDeduper {
    fn new() -> Self {
        Self {
            last_message: None,
            occurrences: 0,
        }
    }

    /// Records an error; returns the occurrence count when the error
    /// should be surfaced, `None` when it is suppressed.
    fn record(&mut self, message: &str) -> Option<u64> {
        if self.last_message.as_deref() == Some(message) {
            self.occurrences += 1;
            if (self.occurrences - 1) % ERROR_RESURFACE_INTERVAL == 0 {
                Some(self.occurrences)
            } else {
                None
            }
        } else {
            self.last_message = Some(message.to_string());
            self.occurrences = 1;
            Some(1)
        }
    }

    fn reset(&mut self) {
        self.last_message = None;
        self.occurrences = 0;
    }
}

impl<R: ExecutionRuntime> Pipeline<R> {
    /// Runs the serialized live loop until the source is exhausted or the
    /// token is canceled.
    ///
    /// Per-frame executor failures are delivered as
    /// [`LiveEvent::FrameError`] without stopping the stream; any other
    /// error (bad state, decode mismatch, source failure) is fatal and
    /// returned. A cancellation observed at the top of an iteration ends
    /// the loop with `Ok(())`.
    pub fn run_live<S: FrameSource>(
        &mut self,
        source: &mut S,
        mut on_event: impl FnMut(LiveEvent),
        token: &CancellationToken,
    ) -> VisionResult<()> {
        let mut deduper = ErrorDeduper::new();
        let mut frame_index: u64 = 0;

        loop {
            if token.is_cancelled() {
                tracing::debug!(frames = frame_index, "live loop canceled");
                return Ok(());
            }

            let Some(frame) = source.next_frame()? else {
                tracing::debug!(frames = frame_index, "frame source exhausted");
                return Ok(());
            };

            match self.run_on_image(&frame) {
                Ok(result) => {
                    deduper.reset();
                    on_event(LiveEvent::Result(result));
                }
                Err(VisionError::InferenceRuntimeError(source_err)) => {
                    let message = source_err.to_string();
                    tracing::warn!(frame_index, error = %message, "frame inference failed");
                    if let Some(occurrences) = deduper.record(&message) {
                        on_event(LiveEvent::FrameError {
                            frame_index,
                            message,
                            occurrences,
                        });
                    }
                }
                Err(fatal) => return Err(fatal),
            }
            frame_index += 1;
        }
    }
}
