//! ONNX Runtime adapter for the execution-runtime boundary.
//!
//! Thin glue only: capability probing via execution-provider availability,
//! session creation from in-memory graph bytes, and f32 tensor extraction
//! for every declared output. No preprocessing or decoding lives here.

use once_cell::sync::OnceCell;
use ort::execution_providers::{
    CPUExecutionProvider, CUDAExecutionProvider, DirectMLExecutionProvider, ExecutionProvider,
};
use ort::logging::LogLevel;
use ort::session::Session as OrtSession;
use ort::value::TensorRef;

use crate::backend::CapabilityTier;
use crate::core::{RawOutput, Tensor4D, VisionError, VisionResult};

use super::{ExecutionRuntime, Session};

/// Availability probe results, cached process-wide: probing is idempotent
/// and provider availability cannot change within a process lifetime.
static AVAILABLE_TIERS: OnceCell<Vec<CapabilityTier>> = OnceCell::new();

fn probe_available_tiers() -> &'static [CapabilityTier] {
    AVAILABLE_TIERS.get_or_init(|| {
        let mut tiers = Vec::new();
        if CUDAExecutionProvider::default()
            .is_available()
            .unwrap_or(false)
        {
            tiers.push(CapabilityTier::GpuCompute);
        }
        if DirectMLExecutionProvider::default()
            .is_available()
            .unwrap_or(false)
        {
            tiers.push(CapabilityTier::GpuRaster);
        }
        tiers.push(CapabilityTier::CpuFallback);
        tracing::debug!(?tiers, "ONNX Runtime execution providers probed");
        tiers
    })
}

/// [`ExecutionRuntime`] implementation over ONNX Runtime.
#[derive(Debug, Default, Clone, Copy)]
pub struct OrtRuntime;

impl OrtRuntime {
    pub fn new() -> Self {
        Self
    }
}

impl ExecutionRuntime for OrtRuntime {
    type Session = OrtModelSession;

    fn tier_available(&self, tier: CapabilityTier) -> bool {
        probe_available_tiers().contains(&tier)
    }

    fn device_name(&self, tier: CapabilityTier) -> Option<String> {
        match tier {
            CapabilityTier::GpuCompute => Some("CUDA execution provider".to_string()),
            CapabilityTier::GpuRaster => Some("DirectML execution provider".to_string()),
            CapabilityTier::CpuFallback => None,
        }
    }

    fn load(&self, graph: &[u8], tier: CapabilityTier) -> VisionResult<Self::Session> {
        let builder = OrtSession::builder()
            .and_then(|b| b.with_log_level(LogLevel::Error))
            .map_err(|e| VisionError::executor_load(tier, e))?;

        // error_on_failure makes a tier rejection an actual load error
        // instead of a silent downgrade, so the orchestrator's fallback
        // chain stays in control of which tier runs.
        let builder = match tier {
            CapabilityTier::GpuCompute => builder.with_execution_providers([
                CUDAExecutionProvider::default().build().error_on_failure(),
            ]),
            CapabilityTier::GpuRaster => builder.with_execution_providers([
                DirectMLExecutionProvider::default().build().error_on_failure(),
            ]),
            CapabilityTier::CpuFallback => {
                builder.with_execution_providers([CPUExecutionProvider::default().build()])
            }
        }
        .map_err(|e| VisionError::executor_load(tier, e))?;

        let session = builder
            .commit_from_memory(graph)
            .map_err(|e| VisionError::executor_load(tier, e))?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .ok_or_else(|| VisionError::InvalidInput {
                message: "model declares no inputs".to_string(),
            })?;
        let output_names: Vec<String> =
            session.outputs.iter().map(|o| o.name.clone()).collect();
        if output_names.is_empty() {
            return Err(VisionError::InvalidInput {
                message: "model declares no outputs".to_string(),
            });
        }

        tracing::debug!(%input_name, outputs = output_names.len(), %tier, "session loaded");

        Ok(OrtModelSession {
            session,
            input_name,
            output_names,
        })
    }
}

/// A loaded ONNX Runtime session.
pub struct OrtModelSession {
    session: OrtSession,
    input_name: String,
    output_names: Vec<String>,
}

impl Session for OrtModelSession {
    fn input_name(&self) -> &str {
        &self.input_name
    }

    fn output_names(&self) -> &[String] {
        &self.output_names
    }

    fn run(&mut self, input: &Tensor4D) -> VisionResult<Vec<RawOutput>> {
        let input_tensor =
            TensorRef::from_array_view(input.view()).map_err(VisionError::runtime)?;
        let inputs = ort::inputs![self.input_name.as_str() => input_tensor];

        let outputs = self.session.run(inputs).map_err(VisionError::runtime)?;

        // Collect every f32 output in declaration order. Auxiliary integer
        // outputs (e.g. detection-count tensors) are skipped; no decoder
        // consumes them.
        let mut raw = Vec::with_capacity(self.output_names.len());
        for name in &self.output_names {
            match outputs[name.as_str()].try_extract_tensor::<f32>() {
                Ok((shape, data)) => {
                    let shape: Vec<usize> = shape.iter().map(|&d| d.max(0) as usize).collect();
                    raw.push(RawOutput::new(name.clone(), shape, data.to_vec()));
                }
                Err(_) => {
                    tracing::debug!(output = %name, "skipping non-f32 output tensor");
                }
            }
        }

        if raw.is_empty() {
            return Err(VisionError::runtime(
                crate::core::errors::SimpleError::new("model produced no f32 output tensor"),
            ));
        }
        Ok(raw)
    }
}
