//! Compute backend capability tiers and selection.
//!
//! A device exposes at most three ranked tiers for running the execution
//! runtime. Probing walks them in fixed priority order and returns the
//! first one the platform reports as available; unavailability is a normal
//! answer, never an error, and `CpuFallback` is the guaranteed floor.

use serde::{Deserialize, Serialize};

use crate::runtime::ExecutionRuntime;

/// Ranked compute backends, best first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CapabilityTier {
    /// Dedicated GPU compute path (e.g. CUDA-class providers).
    GpuCompute,
    /// GPU via the raster/graphics stack (e.g. DirectML-class providers).
    GpuRaster,
    /// Always-available CPU execution.
    CpuFallback,
}

impl CapabilityTier {
    /// All tiers in probe priority order.
    pub const PRIORITY: [CapabilityTier; 3] = [
        CapabilityTier::GpuCompute,
        CapabilityTier::GpuRaster,
        CapabilityTier::CpuFallback,
    ];

    /// This tier and every lower one, in order. The orchestrator attempts
    /// executor load exactly once per yielded tier.
    pub fn fallback_chain(self) -> impl Iterator<Item = CapabilityTier> {
        let start = Self::PRIORITY
            .iter()
            .position(|&t| t == self)
            .unwrap_or(Self::PRIORITY.len() - 1);
        Self::PRIORITY.into_iter().skip(start)
    }
}

impl std::fmt::Display for CapabilityTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CapabilityTier::GpuCompute => write!(f, "gpu-compute"),
            CapabilityTier::GpuRaster => write!(f, "gpu-raster"),
            CapabilityTier::CpuFallback => write!(f, "cpu"),
        }
    }
}

/// The probed capability of the current device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCapability {
    pub tier: CapabilityTier,
    /// Free-text adapter/device name when the runtime can report one.
    pub device_name: Option<String>,
}

impl DeviceCapability {
    pub fn new(tier: CapabilityTier, device_name: Option<String>) -> Self {
        Self { tier, device_name }
    }
}

/// Probes the runtime's tiers in priority order and returns the best
/// available one.
///
/// Never fails: a runtime that reports nothing yields `CpuFallback` with no
/// device name. Probing has no observable side effect and is idempotent,
/// so callers may cache the result for the session lifetime.
pub fn select_backend<R: ExecutionRuntime>(runtime: &R) -> DeviceCapability {
    for tier in CapabilityTier::PRIORITY {
        if runtime.tier_available(tier) {
            let capability = DeviceCapability::new(tier, runtime.device_name(tier));
            tracing::debug!(tier = %capability.tier, device = ?capability.device_name, "backend selected");
            return capability;
        }
    }
    DeviceCapability::new(CapabilityTier::CpuFallback, None)
}
