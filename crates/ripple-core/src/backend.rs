use std::fmt;

use crate::config::WaterConfig;
use crate::encoding::{Capability, StorageEncoding};
use crate::stepper::StepInput;

/// Output surface size in logical pixels plus the device pixel ratio.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceSize {
    pub width: u32,
    pub height: u32,
    pub pixel_ratio: f32,
}

impl SurfaceSize {
    pub fn new(width: u32, height: u32, pixel_ratio: f32) -> Self {
        Self { width, height, pixel_ratio }
    }

    /// Size in device pixels, never smaller than 1x1.
    pub fn physical(&self) -> PhysicalSize {
        let ratio = if self.pixel_ratio > 0.0 { self.pixel_ratio } else { 1.0 };
        PhysicalSize {
            width: ((self.width as f32 * ratio).round() as u32).max(1),
            height: ((self.height as f32 * ratio).round() as u32).max(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PhysicalSize {
    pub width: u32,
    pub height: u32,
}

/// Everything a backend needs to allocate its buffers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AllocationPlan {
    pub field_resolution: u32,
    pub encoding: StorageEncoding,
    pub scene: PhysicalSize,
    pub output: PhysicalSize,
}

impl AllocationPlan {
    pub fn new(config: &WaterConfig, capability: Capability, surface: SurfaceSize) -> Self {
        let physical = surface.physical();
        Self {
            field_resolution: config.grid_resolution,
            encoding: capability.encoding(),
            scene: physical,
            output: physical,
        }
    }
}

/// A fault raised while producing one frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameFault {
    /// The GPU context went away. Rendering pauses until it is restored.
    ContextLost,
    /// Anything else. The frame stage is skipped and retried next frame.
    Transient(String),
}

impl FrameFault {
    pub fn transient(msg: impl Into<String>) -> Self {
        FrameFault::Transient(msg.into())
    }
}

impl fmt::Display for FrameFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameFault::ContextLost => write!(f, "rendering context lost"),
            FrameFault::Transient(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for FrameFault {}

/// One execution target for the simulate → capture → composite pipeline.
///
/// The session drives these strictly in order each frame. Implementations
/// own every buffer they allocate and must drop all of them in `release`.
pub trait RenderBackend {
    /// What the host draws the background scene into.
    type Surface;

    /// Detect storage capability. Called at initialization and after a context restore.
    fn probe(&mut self) -> Capability;

    /// Allocate field, scene and output buffers. Any previous allocation is released first.
    fn allocate(&mut self, plan: &AllocationPlan, config: &WaterConfig) -> anyhow::Result<()>;

    /// Output surface changed size. The field is never touched; the scene
    /// capture is reallocated only when `reallocate_scene` is set.
    fn resize(&mut self, output: PhysicalSize, reallocate_scene: bool) -> Result<(), FrameFault>;

    /// Advance the field one step and swap its buffers. On error the
    /// buffers keep their previous roles and contents.
    fn simulate(&mut self, input: &StepInput) -> Result<(), FrameFault>;

    /// Clear the capture buffer and let the host draw the background into it.
    fn capture_scene(&mut self, draw: &mut dyn FnMut(&mut Self::Surface)) -> Result<(), FrameFault>;

    /// Sample the capture through the current field and write the output.
    fn composite(&mut self, time: f32) -> Result<(), FrameFault>;

    /// Drop every buffer and program. Safe to call repeatedly.
    fn release(&mut self);

    /// Number of live buffer/program handles.
    fn live_resources(&self) -> usize;
}
