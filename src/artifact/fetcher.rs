//! Streaming artifact download with progress, retry, and cancellation.
//!
//! Each attempt is a fresh request bounded by its own timeout; attempts
//! back off exponentially. Progress is reported per chunk when the server
//! exposes a content length, and degrades to indeterminate (no percentage)
//! when it does not — completion still fires at 100%.

use std::io::Read;
use std::time::Duration;

use crate::core::errors::SimpleError;
use crate::core::{VisionError, VisionResult};
use crate::pipeline::CancellationToken;

/// Download progress for one fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchProgress {
    /// Bytes received so far.
    pub loaded: u64,
    /// Total bytes when the server sent a content length.
    pub total: Option<u64>,
    /// Whole-number percentage; `None` while the total is unknown.
    pub percentage: Option<u8>,
}

impl FetchProgress {
    fn new(loaded: u64, total: Option<u64>) -> Self {
        let percentage = total.and_then(|t| {
            if t == 0 {
                None
            } else {
                Some(((loaded.saturating_mul(100)) / t).min(100) as u8)
            }
        });
        Self {
            loaded,
            total,
            percentage,
        }
    }

    fn completed(loaded: u64, total: Option<u64>) -> Self {
        Self {
            loaded,
            total: Some(total.unwrap_or(loaded)),
            percentage: Some(100),
        }
    }
}

/// Fetch policy: attempts, backoff, per-attempt timeout, read granularity.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// Maximum attempts before the fetch fails.
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles per further attempt.
    pub initial_backoff: Duration,
    /// Timeout covering one whole attempt, distinct from the retry policy.
    pub attempt_timeout: Duration,
    /// Read chunk size; also the progress reporting granularity.
    pub chunk_size: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
            attempt_timeout: Duration::from_secs(120),
            chunk_size: 64 * 1024,
        }
    }
}

impl FetchConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum number of attempts (clamped to at least 1).
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    /// Sets the initial retry backoff.
    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    /// Sets the per-attempt timeout.
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = timeout;
        self
    }

    /// Backoff before retrying after the given 1-based failed attempt.
    fn backoff_after(&self, attempt: u32) -> Duration {
        self.initial_backoff * 2u32.saturating_pow(attempt.saturating_sub(1))
    }
}

/// Result of probing a remote artifact without downloading it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactAvailability {
    pub available: bool,
    /// Size advertised by the server, when it sends a content length.
    pub size_bytes: Option<u64>,
    pub content_type: Option<String>,
}

/// Streams model graph bytes from an HTTP(S) source.
#[derive(Debug, Clone, Default)]
pub struct ArtifactFetcher {
    config: FetchConfig,
}

impl ArtifactFetcher {
    pub fn new(config: FetchConfig) -> Self {
        Self { config }
    }

    /// Downloads the artifact at `url`, reporting progress per chunk.
    ///
    /// Retries with exponential backoff up to the configured attempt
    /// count; every attempt is a fresh request. A cancellation observed
    /// between chunks drops all partial buffers and returns
    /// [`VisionError::Canceled`] without consuming further attempts.
    pub fn fetch(
        &self,
        url: &str,
        mut on_progress: impl FnMut(FetchProgress),
        cancel: Option<&CancellationToken>,
    ) -> VisionResult<Vec<u8>> {
        let mut last_error: Option<Box<dyn std::error::Error + Send + Sync>> = None;

        for attempt in 1..=self.config.max_attempts {
            if let Some(token) = cancel {
                if token.is_cancelled() {
                    return Err(VisionError::Canceled);
                }
            }

            tracing::debug!(url, attempt, max = self.config.max_attempts, "fetching artifact");
            match self.fetch_once(url, &mut on_progress, cancel) {
                Ok(bytes) => return Ok(bytes),
                Err(VisionError::Canceled) => return Err(VisionError::Canceled),
                Err(err) => {
                    tracing::warn!(url, attempt, error = %err, "artifact fetch attempt failed");
                    last_error = Some(Box::new(SimpleError::new(err.to_string())));
                    if attempt < self.config.max_attempts {
                        std::thread::sleep(self.config.backoff_after(attempt));
                    }
                }
            }
        }

        Err(VisionError::ArtifactFetchFailed {
            attempts: self.config.max_attempts,
            context: format!("giving up on {url}"),
            source: last_error,
        })
    }

    /// Probes the artifact source with a HEAD request.
    ///
    /// Useful for surfacing the download size before committing to a
    /// fetch. Never fails: an unreachable source reports `available:
    /// false`.
    pub fn check_availability(&self, url: &str) -> ArtifactAvailability {
        match ureq::head(url).timeout(self.config.attempt_timeout).call() {
            Ok(response) => ArtifactAvailability {
                available: true,
                size_bytes: response
                    .header("content-length")
                    .and_then(|v| v.parse().ok()),
                content_type: response.header("content-type").map(str::to_string),
            },
            Err(_) => ArtifactAvailability::default(),
        }
    }

    fn fetch_once(
        &self,
        url: &str,
        on_progress: &mut impl FnMut(FetchProgress),
        cancel: Option<&CancellationToken>,
    ) -> VisionResult<Vec<u8>> {
        let response = ureq::get(url)
            .timeout(self.config.attempt_timeout)
            .call()
            .map_err(|e| VisionError::ArtifactFetchFailed {
                attempts: 1,
                context: format!("request to {url} failed"),
                source: Some(Box::new(e)),
            })?;

        let total: Option<u64> = response
            .header("content-length")
            .and_then(|v| v.parse().ok());

        let mut reader = response.into_reader();
        let mut body: Vec<u8> = match total {
            Some(t) => Vec::with_capacity(t.min(1u64 << 31) as usize),
            None => Vec::new(),
        };
        let mut chunk = vec![0u8; self.config.chunk_size];
        let mut loaded: u64 = 0;

        loop {
            if let Some(token) = cancel {
                if token.is_cancelled() {
                    // Partial buffers are dropped here, not retained.
                    return Err(VisionError::Canceled);
                }
            }

            let read = reader.read(&mut chunk)?;
            if read == 0 {
                break;
            }
            body.extend_from_slice(&chunk[..read]);
            loaded += read as u64;
            on_progress(FetchProgress::new(loaded, total));
        }

        if let Some(t) = total {
            if loaded != t {
                return Err(VisionError::ArtifactFetchFailed {
                    attempts: 1,
                    context: format!("truncated body: got {loaded} of {t} bytes"),
                    source: None,
                });
            }
        }

        on_progress(FetchProgress::completed(loaded, total));
        Ok(body)
    }
}
