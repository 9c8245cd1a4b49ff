//! Simulation stepper: advances the field one discrete step.
//!
//! Each step reads only the read grid and writes every cell of the write
//! grid, then swaps. Per cell: a two-axis Laplacian drives velocity,
//! velocity integrates into pressure, both are damped, the pointer and the
//! idle waves add forcing. A second sweep over the freshly written grid
//! stores the central-difference pressure gradient used by the compositor.

use glam::Vec2;

use crate::config::{IdleWaveConfig, InteractionConfig, WaterConfig, WaveAxis};
use crate::encoding::{DampingTable, StepperState};
use crate::field::{FieldBuffers, FieldSample};
use crate::interaction::InteractionSnapshot;
use crate::math::smoothstep;

/// Everything one step needs from the outside world.
#[derive(Debug, Clone, Copy)]
pub struct StepInput {
    pub interaction: InteractionSnapshot,
    /// Simulation time (already scaled/wrapped).
    pub time: f32,
    /// Frame-time derived step, already capped by `max_delta`.
    pub delta: f32,
}

/// Pointer forcing resolved once per step from the snapshot.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Injection {
    pub position: Vec2,
    /// Unit swipe direction when the pointer is moving fast enough.
    pub flow: Option<Vec2>,
    pub speed: f32,
    pub radius: f32,
    pub strength: f32,
    pub turbulence: f32,
    pub turbulence_frequency: f32,
    pub flow_push: f32,
}

impl Injection {
    /// `None` when the pointer should leave the field alone this step.
    pub fn resolve(snapshot: &InteractionSnapshot, config: &InteractionConfig) -> Option<Self> {
        let speed = snapshot.velocity.length() * config.speed_gain;
        let moving = speed > config.speed_threshold;
        let engaged = snapshot.pressed || (config.hover_injection && moving);
        if !engaged || config.radius <= 0.0 {
            return None;
        }

        let flow = if moving {
            Some((snapshot.velocity + Vec2::splat(0.001)).normalize_or_zero())
        } else {
            None
        };

        Some(Self {
            position: snapshot.position,
            flow,
            speed,
            radius: config.radius,
            strength: config.strength,
            turbulence: config.turbulence,
            turbulence_frequency: config.turbulence_frequency,
            flow_push: config.flow_push,
        })
    }

    /// Add this cell's share of the perturbation. Cells at or past the radius get nothing.
    #[inline]
    fn apply(&self, uv: Vec2, time: f32, pressure: &mut f32, velocity: &mut f32) {
        let to_pointer = uv - self.position;
        let dist = to_pointer.length();
        if dist >= self.radius {
            return;
        }

        let falloff = smoothstep(self.radius, 0.0, dist);
        let trail = match self.flow {
            Some(flow) => smoothstep(-self.radius * 0.5, self.radius * 1.5, -to_pointer.dot(flow)),
            None => 1.0,
        };
        let f = self.turbulence_frequency;
        let turbulence = (uv.x * f + time).sin() * (uv.y * f - time).cos() * self.turbulence;
        let effect = falloff * trail * self.strength * (1.0 + self.speed);

        *pressure += effect * (1.0 + turbulence);
        if let Some(flow) = self.flow {
            *velocity += effect * to_pointer.dot(flow) * self.flow_push;
        }
    }
}

/// Sum of the configured travelling sinusoids at `uv`.
pub fn idle_disturbance(config: &IdleWaveConfig, uv: Vec2, time: f32) -> f32 {
    let sum: f32 = config
        .layers
        .iter()
        .map(|layer| {
            let coord = match layer.axis {
                WaveAxis::X => uv.x,
                WaveAxis::Y => uv.y,
                WaveAxis::Diagonal => uv.x + uv.y,
            };
            (coord * layer.frequency + time * config.speed * layer.speed_factor).sin() * layer.weight
        })
        .sum();
    sum * config.amplitude
}

pub struct SimulationStepper {
    stencil_weight: f32,
    damping: DampingTable,
    interaction: InteractionConfig,
    idle_waves: IdleWaveConfig,
}

impl SimulationStepper {
    pub fn new(config: &WaterConfig) -> Self {
        Self {
            stencil_weight: config.stencil_weight,
            damping: config.damping,
            interaction: config.interaction.clone(),
            idle_waves: config.idle_waves.clone(),
        }
    }

    /// Advance `buffers` by exactly one step and swap them.
    pub fn step(&self, buffers: &mut FieldBuffers, input: &StepInput) -> StepperState {
        let encoding = buffers.encoding();
        let state = StepperState::from_inactive(input.interaction.inactive);
        let damping = self.damping.select(encoding, state);
        let limit = encoding.value_limit();
        let delta = input.delta.clamp(0.0, 1.0);
        let weight = self.stencil_weight;
        let injection = Injection::resolve(&input.interaction, &self.interaction);
        let time = input.time;

        let (read, write) = buffers.split_mut();
        let n = read.resolution();

        for y in 0..n {
            for x in 0..n {
                let (xi, yi) = (x as i64, y as i64);
                let cell = read.get(xi, yi);
                let mut pressure = cell.pressure;
                let mut velocity = cell.velocity;

                let left = read.pressure(xi - 1, yi);
                let right = read.pressure(xi + 1, yi);
                let up = read.pressure(xi, yi + 1);
                let down = read.pressure(xi, yi - 1);

                velocity += delta * (-2.0 * pressure + left + right) * weight;
                velocity += delta * (-2.0 * pressure + up + down) * weight;
                pressure += delta * velocity;

                velocity *= damping.velocity;
                pressure *= damping.pressure;

                let uv = read.cell_uv(x, y);
                if let Some(injection) = &injection {
                    injection.apply(uv, time, &mut pressure, &mut velocity);
                }
                if state == StepperState::Active {
                    pressure += idle_disturbance(&self.idle_waves, uv, time);
                }

                if let Some(limit) = limit {
                    pressure = pressure.clamp(-limit, limit);
                    velocity = velocity.clamp(-limit, limit);
                }

                write.set(x, y, FieldSample { pressure, velocity, grad_x: 0.0, grad_y: 0.0 });
            }
        }

        for y in 0..n {
            for x in 0..n {
                let (xi, yi) = (x as i64, y as i64);
                let grad_x = (write.pressure(xi + 1, yi) - write.pressure(xi - 1, yi)) * 0.5;
                let grad_y = (write.pressure(xi, yi + 1) - write.pressure(xi, yi - 1)) * 0.5;
                write.set_gradient(x, y, grad_x, grad_y);
            }
        }

        buffers.swap();
        state
    }
}
