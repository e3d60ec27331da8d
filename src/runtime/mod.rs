//! The execution-runtime boundary.
//!
//! Tensor execution is an external collaborator: something that can load a
//! serialized graph into a session and push a tensor through it. The core
//! treats it as a black box behind these two traits and never looks
//! inside. The shipped [`ort`] adapter implements them over ONNX Runtime;
//! tests use the scripted runtime in [`testing`].
//!
//! `Session::run` takes `&mut self` deliberately: executors are assumed
//! not reentrancy-safe, so two concurrent runs against the same handle
//! must be unrepresentable.

use crate::backend::CapabilityTier;
use crate::core::{RawOutput, Tensor4D, VisionResult};

#[cfg(feature = "ort-runtime")]
pub mod ort;
pub mod testing;

/// A loaded model graph ready to execute.
pub trait Session {
    /// Name of the graph's primary input, as discovered from the session.
    fn input_name(&self) -> &str;

    /// Names of the graph's outputs, in declaration order.
    fn output_names(&self) -> &[String];

    /// Runs one input tensor through the graph.
    ///
    /// Returns every output as a named raw tensor, in declaration order.
    fn run(&mut self, input: &Tensor4D) -> VisionResult<Vec<RawOutput>>;
}

/// An executor that can probe device capability and load model graphs.
pub trait ExecutionRuntime {
    type Session: Session;

    /// Whether the platform reports the tier as usable. Must not panic;
    /// unavailability is a normal `false`.
    fn tier_available(&self, tier: CapabilityTier) -> bool;

    /// Free-text adapter/device name for a tier, when known.
    fn device_name(&self, _tier: CapabilityTier) -> Option<String> {
        None
    }

    /// Loads a serialized model graph on the given tier.
    ///
    /// A rejection here (tier advertised but unusable for this graph) is
    /// expected; the orchestrator retries once per lower tier.
    fn load(&self, graph: &[u8], tier: CapabilityTier) -> VisionResult<Self::Session>;
}
