//! Effect session: owns one backend, the interaction tracker and the
//! per-frame ordering.
//!
//! `initialize` is the only fallible entry point. After that every fault is
//! contained: a failing stage is logged and skipped, a lost context pauses
//! the session until it is restored, and the host's render loop never sees
//! an error. Dropping the session tears it down.

use std::cell::Cell;
use std::rc::Rc;
use std::time::Instant;

use anyhow::Context;

use crate::backend::{AllocationPlan, FrameFault, RenderBackend, SurfaceSize};
use crate::config::WaterConfig;
use crate::encoding::{Capability, StepperState};
use crate::interaction::{InputEvent, InputSender, InteractionTracker};
use crate::stepper::StepInput;

/// Timing for one frame, supplied by the host's animation loop.
#[derive(Debug, Clone, Copy)]
pub struct FrameClock {
    pub now: Instant,
    /// Seconds since the effect started.
    pub elapsed: f32,
    /// Seconds since the previous frame.
    pub delta: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Running,
    /// Waiting for the GPU context to come back.
    ContextLost,
    TornDown,
}

/// What happened during one call to [`EffectSession::frame`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FrameReport {
    pub simulated: bool,
    pub captured: bool,
    pub composited: bool,
    pub state: Option<StepperState>,
    pub faults: Vec<FrameFault>,
}

impl FrameReport {
    pub fn is_clean(&self) -> bool {
        self.faults.is_empty()
    }
}

/// Shared flag telling the host whether the overlay may be drawn.
///
/// Cleared while the background is being captured so the overlay never
/// shows up inside its own capture.
#[derive(Debug, Clone)]
pub struct OverlayVisibility(Rc<Cell<bool>>);

impl OverlayVisibility {
    fn new() -> Self {
        Self(Rc::new(Cell::new(true)))
    }

    pub fn is_visible(&self) -> bool {
        self.0.get()
    }

    fn hide(&self) -> HiddenOverlay<'_> {
        self.0.set(false);
        HiddenOverlay(self)
    }
}

/// Restores overlay visibility when dropped, on success and on error alike.
struct HiddenOverlay<'a>(&'a OverlayVisibility);

impl Drop for HiddenOverlay<'_> {
    fn drop(&mut self) {
        (self.0).0.set(true);
    }
}

pub struct EffectSession<B: RenderBackend> {
    backend: B,
    config: WaterConfig,
    tracker: InteractionTracker,
    capability: Capability,
    plan: AllocationPlan,
    surface: SurfaceSize,
    status: SessionStatus,
    overlay: OverlayVisibility,
    frame_index: u64,
}

impl<B: RenderBackend> EffectSession<B> {
    /// Probe the backend, allocate every buffer and start tracking input.
    ///
    /// Fails if the config is unusable or the backend cannot allocate; in
    /// that case anything partially allocated has already been released.
    pub fn initialize(
        mut backend: B,
        config: WaterConfig,
        surface: SurfaceSize,
        now: Instant,
    ) -> anyhow::Result<Self> {
        config.validate()?;

        let capability = backend.probe();
        let plan = AllocationPlan::new(&config, capability, surface);
        if !capability.float_color_buffers {
            log::info!("float color buffers unavailable, using {} field storage", plan.encoding.name());
        }

        if let Err(err) = backend.allocate(&plan, &config) {
            backend.release();
            return Err(err).context("allocating water effect buffers");
        }

        log::info!(
            "water effect initialized: {}² field, {}x{} capture, {} storage",
            plan.field_resolution,
            plan.scene.width,
            plan.scene.height,
            plan.encoding.name()
        );

        let tracker = InteractionTracker::new(&config, now);
        Ok(Self {
            backend,
            config,
            tracker,
            capability,
            plan,
            surface,
            status: SessionStatus::Running,
            overlay: OverlayVisibility::new(),
            frame_index: 0,
        })
    }

    /// Run one frame: simulate, capture the background, composite.
    ///
    /// `draw_scene` is only called on capture frames. Faults are logged and
    /// reported, never returned.
    pub fn frame(
        &mut self,
        clock: FrameClock,
        draw_scene: &mut dyn FnMut(&mut B::Surface),
    ) -> FrameReport {
        let mut report = FrameReport::default();
        if self.status != SessionStatus::Running {
            return report;
        }

        self.tracker.drain();
        self.tracker.update(clock.now);
        let snapshot = self.tracker.snapshot();
        let input = StepInput {
            interaction: snapshot,
            time: self.config.simulation_time(clock.elapsed),
            delta: self.config.clamped_delta(clock.delta),
        };

        match self.backend.simulate(&input) {
            Ok(()) => {
                report.simulated = true;
                report.state = Some(StepperState::from_inactive(snapshot.inactive));
            }
            Err(fault) => self.contain("water simulation", fault, &mut report),
        }
        self.tracker.end_frame();
        if self.status != SessionStatus::Running {
            return report;
        }

        let capture_due = self.frame_index % u64::from(self.config.scene.interval.max(1)) == 0;
        self.frame_index += 1;
        if capture_due {
            let result = {
                let _hidden = self.overlay.hide();
                self.backend.capture_scene(draw_scene)
            };
            match result {
                Ok(()) => report.captured = true,
                Err(fault) => self.contain("scene capture", fault, &mut report),
            }
            if self.status != SessionStatus::Running {
                return report;
            }
        }

        match self.backend.composite(clock.elapsed) {
            Ok(()) => report.composited = true,
            Err(fault) => self.contain("compositing", fault, &mut report),
        }

        report
    }

    fn contain(&mut self, stage: &str, fault: FrameFault, report: &mut FrameReport) {
        match &fault {
            FrameFault::ContextLost => {
                log::warn!("{} hit a lost context, pausing water effect", stage);
                self.status = SessionStatus::ContextLost;
            }
            FrameFault::Transient(msg) => {
                log::warn!("{} skipped this frame: {}", stage, msg);
            }
        }
        report.faults.push(fault);
    }

    /// The output surface changed size. Only the scene capture is reallocated.
    pub fn resize(&mut self, surface: SurfaceSize) {
        if self.status == SessionStatus::TornDown {
            return;
        }
        self.surface = surface;
        let physical = surface.physical();
        let reallocate_scene = self.config.scene.track_resize;
        self.plan.output = physical;
        if reallocate_scene {
            self.plan.scene = physical;
        }
        if self.status != SessionStatus::Running {
            // Picked up by the reallocation on restore.
            return;
        }

        log::debug!("resizing water effect output to {}x{}", physical.width, physical.height);
        if let Err(fault) = self.backend.resize(physical, reallocate_scene) {
            let mut report = FrameReport::default();
            self.contain("resize", fault, &mut report);
        }
    }

    /// The host reported that the GPU context is gone.
    pub fn context_lost(&mut self) {
        if self.status == SessionStatus::Running {
            log::warn!("rendering context lost, water effect paused");
            self.status = SessionStatus::ContextLost;
        }
    }

    /// The host reported that the GPU context is back.
    ///
    /// Buffers are rebuilt from scratch and the interaction state is reset.
    /// Returns whether the session is running again.
    pub fn context_restored(&mut self, now: Instant) -> bool {
        match self.status {
            SessionStatus::TornDown => return false,
            SessionStatus::Running => {
                log::debug!("context restore without a loss, rebuilding anyway");
            }
            SessionStatus::ContextLost => {}
        }

        let previous_scene = self.plan.scene;
        self.capability = self.backend.probe();
        self.plan = AllocationPlan::new(&self.config, self.capability, self.surface);
        if !self.config.scene.track_resize {
            // Keep whatever capture size the session started with.
            self.plan.scene = previous_scene;
        }

        self.backend.release();
        if let Err(err) = self.backend.allocate(&self.plan, &self.config) {
            log::warn!("water effect could not be rebuilt after context restore: {:#}", err);
            self.backend.release();
            self.status = SessionStatus::ContextLost;
            return false;
        }

        self.tracker.reset(now);
        self.frame_index = 0;
        self.status = SessionStatus::Running;
        log::warn!("rendering context restored, water effect resumed");
        true
    }

    /// Release every buffer and stop listening for input. Idempotent.
    pub fn teardown(&mut self) {
        if self.status == SessionStatus::TornDown {
            return;
        }
        self.backend.release();
        self.tracker.detach();
        self.status = SessionStatus::TornDown;
        log::info!("water effect torn down");
    }

    pub fn apply_input(&mut self, event: InputEvent) {
        self.tracker.apply(event);
    }

    /// Handle for posting input from event handlers. `None` after teardown.
    pub fn input_sender(&self) -> Option<InputSender> {
        self.tracker.input_sender()
    }

    /// Visibility flag the host checks before drawing the overlay itself.
    pub fn overlay_visibility(&self) -> OverlayVisibility {
        self.overlay.clone()
    }

    pub fn tracker(&self) -> &InteractionTracker {
        &self.tracker
    }

    pub fn tracker_mut(&mut self) -> &mut InteractionTracker {
        &mut self.tracker
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn config(&self) -> &WaterConfig {
        &self.config
    }

    pub fn capability(&self) -> Capability {
        self.capability
    }

    pub fn plan(&self) -> &AllocationPlan {
        &self.plan
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn is_running(&self) -> bool {
        self.status == SessionStatus::Running
    }
}

impl<B: RenderBackend> Drop for EffectSession<B> {
    fn drop(&mut self) {
        self.teardown();
    }
}
