use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use glam::Vec2;
use ripple_core::backend::{AllocationPlan, FrameFault, PhysicalSize, RenderBackend};
use ripple_core::{
    Capability, ColorBuffer, CpuBackend, EffectSession, FrameClock, InputEvent, SessionStatus,
    StepInput, StepperState, SurfaceSize, Viewport, WaterConfig,
};

// ── Helpers ──────────────────────────────────────────────────────

const FRAME: f32 = 1.0 / 60.0;
const VIEW: Viewport = Viewport { width: 400.0, height: 400.0 };

fn surface() -> SurfaceSize {
    SurfaceSize::new(48, 32, 1.0)
}

fn small_config() -> WaterConfig {
    WaterConfig { grid_resolution: 32, ..WaterConfig::desktop() }
}

fn clock(start: Instant, frame: u32) -> FrameClock {
    let elapsed = frame as f32 * FRAME;
    FrameClock {
        now: start + Duration::from_secs_f32(elapsed),
        elapsed,
        delta: FRAME,
    }
}

fn gray_scene(scene: &mut ColorBuffer) {
    scene.fill([0.5, 0.5, 0.5, 1.0]);
}

/// CPU backend with switchable faults per stage.
///
/// `live` mirrors the inner resource count so tests can still see it after
/// the backend has been moved into a session.
struct FlakyBackend {
    inner: CpuBackend,
    live: Rc<Cell<usize>>,
    fail_allocate: bool,
    simulate_fault: Option<FrameFault>,
    capture_fault: Option<FrameFault>,
    composite_fault: Option<FrameFault>,
}

impl FlakyBackend {
    fn new() -> Self {
        Self {
            inner: CpuBackend::new(),
            live: Rc::new(Cell::new(0)),
            fail_allocate: false,
            simulate_fault: None,
            capture_fault: None,
            composite_fault: None,
        }
    }
}

impl RenderBackend for FlakyBackend {
    type Surface = ColorBuffer;

    fn probe(&mut self) -> Capability {
        self.inner.probe()
    }

    fn allocate(&mut self, plan: &AllocationPlan, config: &WaterConfig) -> anyhow::Result<()> {
        self.inner.allocate(plan, config)?;
        self.live.set(self.inner.live_resources());
        if self.fail_allocate {
            anyhow::bail!("out of texture memory");
        }
        Ok(())
    }

    fn resize(&mut self, output: PhysicalSize, reallocate_scene: bool) -> Result<(), FrameFault> {
        self.inner.resize(output, reallocate_scene)
    }

    fn simulate(&mut self, input: &StepInput) -> Result<(), FrameFault> {
        match &self.simulate_fault {
            Some(fault) => Err(fault.clone()),
            None => self.inner.simulate(input),
        }
    }

    fn capture_scene(&mut self, draw: &mut dyn FnMut(&mut ColorBuffer)) -> Result<(), FrameFault> {
        match &self.capture_fault {
            Some(fault) => Err(fault.clone()),
            None => self.inner.capture_scene(draw),
        }
    }

    fn composite(&mut self, time: f32) -> Result<(), FrameFault> {
        match &self.composite_fault {
            Some(fault) => Err(fault.clone()),
            None => self.inner.composite(time),
        }
    }

    fn release(&mut self) {
        self.inner.release();
        self.live.set(self.inner.live_resources());
    }

    fn live_resources(&self) -> usize {
        self.inner.live_resources()
    }
}

// ── 1. Lifecycle ─────────────────────────────────────────────────

#[test]
fn initialize_allocates_everything() {
    let session =
        EffectSession::initialize(CpuBackend::new(), small_config(), surface(), Instant::now()).unwrap();
    assert!(session.is_running());
    assert_eq!(session.backend().live_resources(), 4);
    let field = session.backend().field().unwrap();
    assert_eq!(field.resolution(), 32);
    assert_eq!(session.backend().scene().unwrap().width(), 48);
}

#[test]
fn allocation_failure_is_a_hard_error_and_leaks_nothing() {
    let mut backend = FlakyBackend::new();
    backend.fail_allocate = true;
    let live = Rc::clone(&backend.live);
    let result = EffectSession::initialize(backend, small_config(), surface(), Instant::now());
    let err = result.err().expect("initialization should fail");
    assert!(format!("{:#}", err).contains("out of texture memory"));
    assert_eq!(live.get(), 0);
}

#[test]
fn flaky_backend_tracks_live_resources() {
    let backend = FlakyBackend::new();
    let live = Rc::clone(&backend.live);
    let mut session =
        EffectSession::initialize(backend, small_config(), surface(), Instant::now()).unwrap();
    assert_eq!(live.get(), 4);
    session.teardown();
    assert_eq!(live.get(), 0);
}

#[test]
fn unrepresentable_timeout_is_an_error_not_a_panic() {
    let config: WaterConfig =
        serde_json::from_str(r#"{ "grid_resolution": 32, "inactivity_timeout_secs": 1e30 }"#).unwrap();
    let result = EffectSession::initialize(CpuBackend::new(), config, surface(), Instant::now());
    let err = result.err().expect("initialization should fail");
    assert!(format!("{:#}", err).contains("inactivity timeout"));
}

#[test]
fn invalid_config_is_rejected() {
    let config = WaterConfig { grid_resolution: 0, ..WaterConfig::desktop() };
    assert!(EffectSession::initialize(CpuBackend::new(), config, surface(), Instant::now()).is_err());
}

#[test]
fn teardown_is_idempotent() {
    let start = Instant::now();
    let mut session =
        EffectSession::initialize(CpuBackend::new(), small_config(), surface(), start).unwrap();
    session.frame(clock(start, 1), &mut gray_scene);

    session.teardown();
    session.teardown();
    assert_eq!(session.status(), SessionStatus::TornDown);
    assert_eq!(session.backend().live_resources(), 0);

    let mut drawn = false;
    let report = session.frame(clock(start, 2), &mut |_| drawn = true);
    assert!(!drawn);
    assert!(!report.simulated && !report.composited);
}

#[test]
fn teardown_detaches_input() {
    let start = Instant::now();
    let mut session =
        EffectSession::initialize(CpuBackend::new(), small_config(), surface(), start).unwrap();
    let sender = session.input_sender().unwrap();
    session.teardown();
    assert!(!sender.send(InputEvent::PointerPressed));
    assert!(session.input_sender().is_none());
}

// ── 2. Frame ordering ────────────────────────────────────────────

#[test]
fn buffers_swap_exactly_once_per_frame() {
    let start = Instant::now();
    let mut session =
        EffectSession::initialize(CpuBackend::new(), small_config(), surface(), start).unwrap();

    for frame in 1..=10u32 {
        let before = session.backend().field().unwrap().read_index();
        let report = session.frame(clock(start, frame), &mut gray_scene);
        assert!(report.is_clean());
        let field = session.backend().field().unwrap();
        // Last step's write grid is this step's read grid.
        assert_eq!(field.read_index(), 1 - before);
        assert_eq!(field.swaps(), frame as u64);
    }
}

#[test]
fn scene_captured_on_interval_with_overlay_hidden() {
    let start = Instant::now();
    let mut session =
        EffectSession::initialize(CpuBackend::new(), small_config(), surface(), start).unwrap();
    let overlay = session.overlay_visibility();

    let mut captured_frames = Vec::new();
    for frame in 1..=6u32 {
        let watcher = overlay.clone();
        let mut hidden_during_draw = None;
        let report = session.frame(clock(start, frame), &mut |scene| {
            hidden_during_draw = Some(!watcher.is_visible());
            gray_scene(scene);
        });
        if report.captured {
            captured_frames.push(frame);
            assert_eq!(hidden_during_draw, Some(true));
        }
        assert!(overlay.is_visible());
        assert!(report.composited);
    }
    // Desktop captures every second frame, starting with the first.
    assert_eq!(captured_frames, vec![1, 3, 5]);
}

#[test]
fn mobile_captures_every_frame() {
    let start = Instant::now();
    let config = WaterConfig { grid_resolution: 32, ..WaterConfig::mobile() };
    let mut session = EffectSession::initialize(CpuBackend::new(), config, surface(), start).unwrap();
    for frame in 1..=3u32 {
        assert!(session.frame(clock(start, frame), &mut gray_scene).captured);
    }
}

#[test]
fn output_reflects_captured_scene() {
    let start = Instant::now();
    let mut session =
        EffectSession::initialize(CpuBackend::new(), small_config(), surface(), start).unwrap();
    session.frame(clock(start, 1), &mut |scene: &mut ColorBuffer| scene.fill([0.0, 0.0, 1.0, 1.0]));
    let out = session.backend().output().unwrap();
    let p = out.get(10, 10);
    assert!(p[2] > 0.8);
    assert!(p[0] < 0.2);
}

// ── 3. Fault containment ─────────────────────────────────────────

#[test]
fn transient_simulation_fault_skips_frame_and_keeps_buffers() {
    let start = Instant::now();
    let mut session =
        EffectSession::initialize(FlakyBackend::new(), small_config(), surface(), start).unwrap();
    session.frame(clock(start, 1), &mut gray_scene);
    let before = session.backend().inner.field().unwrap().read().clone();
    let swaps = session.backend().inner.field().unwrap().swaps();

    session.backend_mut().simulate_fault = Some(FrameFault::transient("bind failed"));
    let report = session.frame(clock(start, 2), &mut gray_scene);
    assert!(!report.simulated);
    assert_eq!(report.faults.len(), 1);
    assert!(session.is_running());

    let field = session.backend().inner.field().unwrap();
    assert_eq!(field.swaps(), swaps);
    assert!(field.read().samples().zip(before.samples()).all(|(a, b)| a == b));

    session.backend_mut().simulate_fault = None;
    let report = session.frame(clock(start, 3), &mut gray_scene);
    assert!(report.simulated && report.is_clean());
}

#[test]
fn composite_fault_does_not_stop_the_session() {
    let start = Instant::now();
    let mut session =
        EffectSession::initialize(FlakyBackend::new(), small_config(), surface(), start).unwrap();
    session.backend_mut().composite_fault = Some(FrameFault::transient("program missing"));
    session.backend_mut().capture_fault = Some(FrameFault::transient("capture failed"));
    let overlay = session.overlay_visibility();

    let report = session.frame(clock(start, 1), &mut gray_scene);
    assert!(report.simulated);
    assert!(!report.captured && !report.composited);
    assert_eq!(report.faults.len(), 2);
    // Visibility comes back even though the capture failed.
    assert!(overlay.is_visible());
    assert!(session.is_running());
}

#[test]
fn context_lost_fault_pauses_session() {
    let start = Instant::now();
    let mut session =
        EffectSession::initialize(FlakyBackend::new(), small_config(), surface(), start).unwrap();
    session.backend_mut().simulate_fault = Some(FrameFault::ContextLost);
    let mut drawn = false;
    let report = session.frame(clock(start, 1), &mut |_| drawn = true);
    assert_eq!(report.faults, vec![FrameFault::ContextLost]);
    assert!(!drawn);
    assert_eq!(session.status(), SessionStatus::ContextLost);

    session.backend_mut().simulate_fault = None;
    assert!(session.context_restored(start + Duration::from_secs(1)));
    assert!(session.frame(clock(start, 2), &mut gray_scene).simulated);
}

// ── 4. Context loss / restore ────────────────────────────────────

#[test]
fn context_loss_and_restore_resets_idle_state() {
    let start = Instant::now();
    let mut session =
        EffectSession::initialize(CpuBackend::new(), small_config(), surface(), start).unwrap();
    session.frame(clock(start, 1), &mut gray_scene);

    // Go idle.
    let idle = clock(start, 60 * 31);
    let report = session.frame(idle, &mut gray_scene);
    assert_eq!(report.state, Some(StepperState::Inactive));
    assert!(session.tracker().is_inactive());

    session.context_lost();
    assert_eq!(session.status(), SessionStatus::ContextLost);
    let mut drawn = false;
    let report = session.frame(clock(start, 60 * 32), &mut |_| drawn = true);
    assert!(!drawn);
    assert!(!report.simulated);

    let restored_at = start + Duration::from_secs(33);
    assert!(session.context_restored(restored_at));
    assert!(session.is_running());
    assert!(!session.tracker().is_inactive());
    assert_eq!(session.tracker().last_interaction(), restored_at);
    // Fresh buffers, not stale state.
    assert_eq!(session.backend().field().unwrap().swaps(), 0);

    let report = session.frame(clock(start, 60 * 33 + 1), &mut gray_scene);
    assert_eq!(report.state, Some(StepperState::Active));
    assert!(report.captured);
}

#[test]
fn restore_reprobes_capability() {
    let start = Instant::now();
    let mut session =
        EffectSession::initialize(CpuBackend::new(), small_config(), surface(), start).unwrap();
    assert_eq!(session.capability(), Capability::FULL);

    session.context_lost();
    session.backend_mut().set_capability(Capability::LIMITED);
    assert!(session.context_restored(start));
    assert_eq!(session.capability(), Capability::LIMITED);
    assert_eq!(
        session.backend().field().unwrap().encoding(),
        ripple_core::StorageEncoding::BiasScaled
    );
}

#[test]
fn restore_after_teardown_is_refused() {
    let start = Instant::now();
    let mut session =
        EffectSession::initialize(CpuBackend::new(), small_config(), surface(), start).unwrap();
    session.teardown();
    assert!(!session.context_restored(start));
    assert_eq!(session.backend().live_resources(), 0);
}

// ── 5. Resize ────────────────────────────────────────────────────

#[test]
fn resize_leaves_field_untouched() {
    let start = Instant::now();
    let mut session =
        EffectSession::initialize(CpuBackend::new(), small_config(), surface(), start).unwrap();
    session.apply_input(InputEvent::PointerMoved { x: 150.0, y: 200.0, viewport: VIEW });
    session.apply_input(InputEvent::PointerMoved { x: 200.0, y: 200.0, viewport: VIEW });
    for frame in 1..=4u32 {
        session.frame(clock(start, frame), &mut gray_scene);
    }
    let before = session.backend().field().unwrap().clone();

    session.resize(SurfaceSize::new(100, 60, 2.0));

    let after = session.backend().field().unwrap();
    assert_eq!(after.resolution(), before.resolution());
    assert_eq!(after.read_index(), before.read_index());
    assert!(after.read().samples().zip(before.read().samples()).all(|(a, b)| a == b));

    let scene = session.backend().scene().unwrap();
    assert_eq!((scene.width(), scene.height()), (200, 120));
    let out = session.backend().output().unwrap();
    assert_eq!((out.width(), out.height()), (200, 120));

    assert!(session.frame(clock(start, 5), &mut gray_scene).is_clean());
}

#[test]
fn fixed_capture_size_survives_resize() {
    let start = Instant::now();
    let config = WaterConfig { grid_resolution: 32, ..WaterConfig::mobile() };
    let mut session = EffectSession::initialize(CpuBackend::new(), config, surface(), start).unwrap();
    session.resize(SurfaceSize::new(20, 90, 1.0));
    let scene = session.backend().scene().unwrap();
    assert_eq!((scene.width(), scene.height()), (48, 32));
    let out = session.backend().output().unwrap();
    assert_eq!((out.width(), out.height()), (20, 90));
}

// ── 6. Scenarios ─────────────────────────────────────────────────

#[test]
fn calm_start_has_negligible_distortion() {
    let start = Instant::now();
    let mut session =
        EffectSession::initialize(CpuBackend::new(), WaterConfig::desktop(), surface(), start).unwrap();

    for frame in 1..=5u32 {
        session.frame(clock(start, frame), &mut gray_scene);
        let backend = session.backend();
        let field = backend.field().unwrap().read();
        let compositor = backend.compositor().unwrap();
        for i in 0..=16 {
            for j in 0..=16 {
                let uv = Vec2::new(i as f32 / 16.0, j as f32 / 16.0);
                let d = compositor.distortion_at(field, uv);
                assert!(d.length() < 2e-3, "distortion {:?} at {:?} on frame {}", d, uv, frame);
            }
        }
    }
}

#[test]
fn single_swipe_produces_local_gradient() {
    let start = Instant::now();
    let mut config = WaterConfig::desktop();
    config.grid_resolution = 128;
    config.idle_waves.amplitude = 0.0;
    let radius = config.interaction.radius;
    let mut session = EffectSession::initialize(CpuBackend::new(), config, surface(), start).unwrap();

    let sender = session.input_sender().unwrap();
    sender.send(InputEvent::PointerMoved { x: 180.0, y: 200.0, viewport: VIEW });
    sender.send(InputEvent::PointerMoved { x: 200.0, y: 200.0, viewport: VIEW });
    session.frame(clock(start, 1), &mut gray_scene);

    let field = session.backend().field().unwrap().read();
    let (cx, cy) = field.cell_at(Vec2::splat(0.5));
    let center = field.get(cx as i64, cy as i64);
    assert!(center.gradient().length() > 1e-4, "gradient at centre: {:?}", center.gradient());

    let far_uv = Vec2::splat(0.5) - Vec2::splat(radius * 2.0);
    assert!((far_uv - Vec2::splat(0.5)).length() > radius * 2.0);
    let (fx, fy) = field.cell_at(far_uv);
    let far = field.get(fx as i64, fy as i64);
    assert_eq!(far.gradient(), Vec2::ZERO);
    assert_eq!(far.pressure, 0.0);
}

#[test]
fn idle_field_settles_after_timeout() {
    let start = Instant::now();
    let mut session =
        EffectSession::initialize(CpuBackend::new(), WaterConfig::desktop(), surface(), start).unwrap();

    // Let the idle waves build some surface.
    for frame in 1..=20u32 {
        let report = session.frame(clock(start, frame), &mut gray_scene);
        assert_eq!(report.state, Some(StepperState::Active));
    }
    let mut previous = session.backend().field().unwrap().read().mean_abs_pressure();
    assert!(previous > 0.0);

    // No input for longer than the timeout.
    let idle_start = 60 * 31;
    for frame in idle_start..idle_start + 30 {
        let report = session.frame(clock(start, frame), &mut gray_scene);
        assert_eq!(report.state, Some(StepperState::Inactive));
        let mean = session.backend().field().unwrap().read().mean_abs_pressure();
        assert!(mean < previous, "mean |p| rose from {} to {} on frame {}", previous, mean, frame);
        previous = mean;
    }
}

#[test]
fn input_clears_inactivity_immediately() {
    let start = Instant::now();
    let mut session =
        EffectSession::initialize(CpuBackend::new(), small_config(), surface(), start).unwrap();
    let report = session.frame(clock(start, 60 * 31), &mut gray_scene);
    assert_eq!(report.state, Some(StepperState::Inactive));

    session.input_sender().unwrap().send(InputEvent::TouchStarted { x: 10.0, y: 10.0, viewport: VIEW });
    let report = session.frame(clock(start, 60 * 31 + 1), &mut gray_scene);
    assert_eq!(report.state, Some(StepperState::Active));
}
