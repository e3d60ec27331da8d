//! A scripted execution runtime for tests.
//!
//! Plays back pre-baked output tensors and records which tiers were
//! attempted, so tests can exercise backend selection, tier fallback, and
//! the live loop without a real executor.

use std::sync::{Arc, Mutex};

use crate::backend::CapabilityTier;
use crate::core::errors::SimpleError;
use crate::core::{RawOutput, Tensor4D, VisionError, VisionResult};

use super::{ExecutionRuntime, Session};

/// Scripted runtime: configurable tier availability, load failures, and
/// per-run output tensors.
#[derive(Clone)]
pub struct StubRuntime {
    available: Vec<CapabilityTier>,
    load_failures: Vec<CapabilityTier>,
    outputs: Vec<RawOutput>,
    failing_runs: Vec<u64>,
    load_attempts: Arc<Mutex<Vec<CapabilityTier>>>,
}

impl StubRuntime {
    /// A runtime reporting exactly the given tiers as available.
    pub fn with_tiers(tiers: &[CapabilityTier]) -> Self {
        Self {
            available: tiers.to_vec(),
            load_failures: Vec::new(),
            outputs: Vec::new(),
            failing_runs: Vec::new(),
            load_attempts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A runtime that only reports the CPU floor.
    pub fn cpu_only() -> Self {
        Self::with_tiers(&[CapabilityTier::CpuFallback])
    }

    /// Sets the output tensors every `run` call returns.
    pub fn with_outputs(mut self, outputs: Vec<RawOutput>) -> Self {
        self.outputs = outputs;
        self
    }

    /// Makes `load` fail on the given tiers.
    pub fn failing_load_on(mut self, tiers: &[CapabilityTier]) -> Self {
        self.load_failures = tiers.to_vec();
        self
    }

    /// Makes `run` fail on the given zero-based call indices.
    pub fn failing_runs(mut self, indices: &[u64]) -> Self {
        self.failing_runs = indices.to_vec();
        self
    }

    /// Tiers `load` has been attempted on, in order.
    pub fn load_attempts(&self) -> Vec<CapabilityTier> {
        self.load_attempts.lock().expect("attempt log poisoned").clone()
    }
}

impl ExecutionRuntime for StubRuntime {
    type Session = StubSession;

    fn tier_available(&self, tier: CapabilityTier) -> bool {
        self.available.contains(&tier)
    }

    fn device_name(&self, tier: CapabilityTier) -> Option<String> {
        self.available
            .contains(&tier)
            .then(|| format!("stub-{tier}"))
    }

    fn load(&self, _graph: &[u8], tier: CapabilityTier) -> VisionResult<Self::Session> {
        self.load_attempts
            .lock()
            .expect("attempt log poisoned")
            .push(tier);
        if self.load_failures.contains(&tier) {
            return Err(VisionError::executor_load(
                tier,
                SimpleError::new(format!("stub load rejection on {tier}")),
            ));
        }
        Ok(StubSession {
            outputs: self.outputs.clone(),
            failing_runs: self.failing_runs.clone(),
            run_index: 0,
            input_name: "images".to_string(),
            output_names: self.outputs.iter().map(|o| o.name.clone()).collect(),
        })
    }
}

/// Session produced by [`StubRuntime`]; replays the scripted outputs.
pub struct StubSession {
    outputs: Vec<RawOutput>,
    failing_runs: Vec<u64>,
    run_index: u64,
    input_name: String,
    output_names: Vec<String>,
}

impl Session for StubSession {
    fn input_name(&self) -> &str {
        &self.input_name
    }

    fn output_names(&self) -> &[String] {
        &self.output_names
    }

    fn run(&mut self, _input: &Tensor4D) -> VisionResult<Vec<RawOutput>> {
        let index = self.run_index;
        self.run_index += 1;
        if self.failing_runs.contains(&index) {
            return Err(VisionError::runtime(SimpleError::new(format!(
                "stub run failure at frame {index}"
            ))));
        }
        Ok(self.outputs.clone())
    }
}
