use glam::Vec2;
use ripple_core::{
    FieldBuffers, InteractionSnapshot, SimulationStepper, StepInput, StorageEncoding, WaterConfig,
};

// ── Helpers ──────────────────────────────────────────────────────

fn config(resolution: u32) -> WaterConfig {
    WaterConfig { grid_resolution: resolution, ..WaterConfig::desktop() }
}

fn input(interaction: InteractionSnapshot, step: u32) -> StepInput {
    StepInput { interaction, time: step as f32 / 60.0, delta: 1.0 }
}

fn swipe(position: Vec2, velocity: Vec2, pressed: bool) -> InteractionSnapshot {
    InteractionSnapshot { position, velocity, pressed, inactive: false }
}

// ── 1. Range containment ─────────────────────────────────────────

#[test]
fn bias_scaled_field_stays_in_range_under_hard_forcing() {
    let mut config = config(48);
    config.interaction.strength = 3.0;
    config.idle_waves.amplitude = 0.5;
    let stepper = SimulationStepper::new(&config);
    let mut buffers = FieldBuffers::new(48, StorageEncoding::BiasScaled);

    for step in 0..120 {
        let angle = step as f32 * 0.2;
        let position = Vec2::new(0.5 + 0.3 * angle.cos(), 0.5 + 0.3 * angle.sin());
        let velocity = Vec2::new(-angle.sin(), angle.cos()) * 0.06;
        stepper.step(&mut buffers, &input(swipe(position, velocity, true), step));

        for sample in buffers.read().samples() {
            assert!(sample.pressure.abs() <= 0.5 + 1e-6, "pressure {} on step {}", sample.pressure, step);
            assert!(sample.velocity.abs() <= 0.5 + 1e-6, "velocity {} on step {}", sample.velocity, step);
        }
    }
}

#[test]
fn direct_field_is_not_clamped() {
    let mut config = config(32);
    config.interaction.strength = 3.0;
    config.idle_waves.amplitude = 0.0;
    let stepper = SimulationStepper::new(&config);
    let mut buffers = FieldBuffers::new(32, StorageEncoding::Direct);

    let held = swipe(Vec2::splat(0.5), Vec2::ZERO, true);
    for step in 0..10 {
        stepper.step(&mut buffers, &input(held, step));
    }
    let peak = buffers.read().samples().map(|s| s.pressure).fold(0.0f32, f32::max);
    assert!(peak > 0.5, "peak pressure {}", peak);
}

// ── 2. Interaction locality ──────────────────────────────────────

#[test]
fn pointer_only_touches_cells_inside_its_radius() {
    let config = config(64);
    let radius = config.interaction.radius;
    let stepper = SimulationStepper::new(&config);

    // Shared non-trivial starting state.
    let mut base = FieldBuffers::new(64, StorageEncoding::Direct);
    for step in 0..5 {
        stepper.step(&mut base, &input(InteractionSnapshot::default(), step));
    }

    let mut quiet = base.clone();
    let mut touched = base.clone();
    let pointer = Vec2::new(0.3, 0.6);
    stepper.step(&mut quiet, &input(InteractionSnapshot::default(), 5));
    stepper.step(&mut touched, &input(swipe(pointer, Vec2::new(0.02, -0.01), false), 5));

    let grid = quiet.read();
    let mut changed_inside = 0;
    for y in 0..64u32 {
        for x in 0..64u32 {
            let a = quiet.read().get(x as i64, y as i64);
            let b = touched.read().get(x as i64, y as i64);
            let dist = (grid.cell_uv(x, y) - pointer).length();
            if dist >= radius {
                assert_eq!(a.pressure, b.pressure, "cell ({}, {}) outside radius changed", x, y);
                assert_eq!(a.velocity, b.velocity, "cell ({}, {}) outside radius changed", x, y);
            } else if a.pressure != b.pressure {
                changed_inside += 1;
            }
        }
    }
    assert!(changed_inside > 0);
}

#[test]
fn pressed_but_still_pointer_injects_without_flow() {
    let mut config = config(32);
    config.idle_waves.amplitude = 0.0;
    let stepper = SimulationStepper::new(&config);
    let mut buffers = FieldBuffers::new(32, StorageEncoding::Direct);

    stepper.step(&mut buffers, &input(swipe(Vec2::splat(0.5), Vec2::ZERO, true), 0));
    let grid = buffers.read();
    let (cx, cy) = grid.cell_at(Vec2::splat(0.5));
    let center = grid.get(cx as i64, cy as i64);
    assert!(center.pressure > 0.0);
    // No swipe direction, so no velocity push.
    assert!(grid.samples().all(|s| s.velocity == 0.0));
}

// ── 3. Buffer roles ──────────────────────────────────────────────

#[test]
fn read_buffer_is_previous_write_buffer() {
    let config = config(16);
    let stepper = SimulationStepper::new(&config);
    let mut buffers = FieldBuffers::new(16, StorageEncoding::Direct);

    for step in 0..6 {
        let write = buffers.write_index();
        stepper.step(&mut buffers, &input(InteractionSnapshot::default(), step));
        assert_eq!(buffers.read_index(), write);
        assert_eq!(buffers.swaps(), step as u64 + 1);
    }
}

#[test]
fn large_frame_gap_is_capped() {
    let config = config(16);
    assert_eq!(config.clamped_delta(1.0), 1.4);
    assert!((config.clamped_delta(1.0 / 60.0) - 1.0).abs() < 1e-5);
    assert_eq!(config.clamped_delta(-0.5), 0.0);
}
