use anyhow::Result;
use glow::HasContext;
use ripple_core::config::{IdleWaveConfig, InteractionConfig, WaveAxis};
use ripple_core::encoding::DampingTable;
use ripple_core::{Injection, StepInput, StepperState, StorageEncoding, WaterConfig};

use crate::fbo::{RenderTarget, TargetFormat};
use crate::program::{compile_fullscreen_program, uniform, FullscreenTriangle};
use crate::shaders::{self, GlslTarget, MAX_WAVE_LAYERS};

type Loc = Option<glow::UniformLocation>;

struct SimulationUniforms {
    field: Loc,
    resolution: Loc,
    delta: Loc,
    time: Loc,
    weight: Loc,
    damping: Loc,
    active: Loc,
    inject: Loc,
    pointer: Loc,
    flow: Loc,
    force: Loc,
    turbulence: Loc,
    idle: Loc,
    layer_count: Loc,
    layers: Loc,
}

/// Field stepping via ping-pong render targets.
///
/// One target is read, the other written; [`swap`](Self::swap) flips them
/// once the draw went through.
pub struct SimulationPass {
    program: glow::Program,
    targets: [RenderTarget; 2],
    read_idx: usize,
    swaps: u64,
    resolution: u32,
    encoding: StorageEncoding,
    stencil_weight: f32,
    damping: DampingTable,
    interaction: InteractionConfig,
    idle_amplitude: f32,
    idle_speed: f32,
    layers: Vec<f32>,
    layer_count: i32,
    loc: SimulationUniforms,
}

impl SimulationPass {
    pub fn new(
        gl: &glow::Context,
        target: GlslTarget,
        resolution: u32,
        encoding: StorageEncoding,
        config: &WaterConfig,
    ) -> Result<Self> {
        let program = compile_fullscreen_program(gl, target, &shaders::simulation_fragment(encoding, target))?;
        let format = TargetFormat::for_encoding(encoding);

        let first = match RenderTarget::new(gl, resolution, resolution, format) {
            Ok(t) => t,
            Err(e) => {
                unsafe { gl.delete_program(program) };
                return Err(e);
            }
        };
        let second = match RenderTarget::new(gl, resolution, resolution, format) {
            Ok(t) => t,
            Err(e) => {
                first.destroy(gl);
                unsafe { gl.delete_program(program) };
                return Err(e);
            }
        };

        let zero = encoding.zero();
        for target in [&first, &second] {
            target.clear(gl, [zero; 4]);
        }
        unsafe { gl.bind_framebuffer(glow::FRAMEBUFFER, None) };

        let loc = |name: &str| uniform(gl, program, name);
        let loc = SimulationUniforms {
            field: loc("u_field"),
            resolution: loc("u_resolution"),
            delta: loc("u_delta"),
            time: loc("u_time"),
            weight: loc("u_weight"),
            damping: loc("u_damping"),
            active: loc("u_active"),
            inject: loc("u_inject"),
            pointer: loc("u_pointer"),
            flow: loc("u_flow"),
            force: loc("u_force"),
            turbulence: loc("u_turbulence"),
            idle: loc("u_idle"),
            layer_count: loc("u_layer_count"),
            layers: loc("u_layers"),
        };

        let (layers, layer_count) = pack_layers(&config.idle_waves);

        Ok(Self {
            program,
            targets: [first, second],
            read_idx: 0,
            swaps: 0,
            resolution,
            encoding,
            stencil_weight: config.stencil_weight,
            damping: config.damping,
            interaction: config.interaction.clone(),
            idle_amplitude: config.idle_waves.amplitude,
            idle_speed: config.idle_waves.speed,
            layers,
            layer_count,
            loc,
        })
    }

    /// Draw one step from the read target into the write target.
    ///
    /// Does not swap; call [`swap`](Self::swap) once the draw is known good.
    pub fn render(&self, gl: &glow::Context, input: &StepInput, triangle: &FullscreenTriangle) -> StepperState {
        let state = StepperState::from_inactive(input.interaction.inactive);
        let damping = self.damping.select(self.encoding, state);
        let injection = Injection::resolve(&input.interaction, &self.interaction);
        let write = &self.targets[1 - self.read_idx];
        let read = &self.targets[self.read_idx];
        let l = &self.loc;

        unsafe {
            gl.use_program(Some(self.program));
            write.bind(gl);

            gl.active_texture(glow::TEXTURE0);
            gl.bind_texture(glow::TEXTURE_2D, Some(read.texture));
            gl.uniform_1_i32(l.field.as_ref(), 0);

            gl.uniform_1_i32(l.resolution.as_ref(), self.resolution as i32);
            gl.uniform_1_f32(l.delta.as_ref(), input.delta.clamp(0.0, 1.0));
            gl.uniform_1_f32(l.time.as_ref(), input.time);
            gl.uniform_1_f32(l.weight.as_ref(), self.stencil_weight);
            gl.uniform_2_f32(l.damping.as_ref(), damping.velocity, damping.pressure);
            gl.uniform_1_f32(l.active.as_ref(), flag(state == StepperState::Active));

            match injection {
                Some(inj) => {
                    let flow = inj.flow.unwrap_or_default();
                    gl.uniform_1_f32(l.inject.as_ref(), 1.0);
                    gl.uniform_2_f32(l.pointer.as_ref(), inj.position.x, inj.position.y);
                    gl.uniform_3_f32(l.flow.as_ref(), flow.x, flow.y, flag(inj.flow.is_some()));
                    gl.uniform_4_f32(l.force.as_ref(), inj.radius, inj.strength, inj.speed, inj.flow_push);
                    gl.uniform_2_f32(l.turbulence.as_ref(), inj.turbulence, inj.turbulence_frequency);
                }
                None => gl.uniform_1_f32(l.inject.as_ref(), 0.0),
            }

            gl.uniform_2_f32(l.idle.as_ref(), self.idle_amplitude, self.idle_speed);
            gl.uniform_1_i32(l.layer_count.as_ref(), self.layer_count);
            gl.uniform_4_f32_slice(l.layers.as_ref(), &self.layers);

            triangle.draw(gl);

            gl.use_program(None);
        }
        state
    }

    pub fn swap(&mut self) {
        self.read_idx = 1 - self.read_idx;
        self.swaps += 1;
    }

    /// Texture holding the latest completed step.
    pub fn read_texture(&self) -> glow::Texture {
        self.targets[self.read_idx].texture
    }

    pub fn read_index(&self) -> usize {
        self.read_idx
    }

    pub fn swaps(&self) -> u64 {
        self.swaps
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    pub fn encoding(&self) -> StorageEncoding {
        self.encoding
    }

    pub fn destroy(&self, gl: &glow::Context) {
        unsafe { gl.delete_program(self.program) };
        self.targets[0].destroy(gl);
        self.targets[1].destroy(gl);
    }
}

fn flag(on: bool) -> f32 {
    if on {
        1.0
    } else {
        0.0
    }
}

/// Flatten wave layers into `vec4(axis, frequency, speed factor, weight)` slots.
fn pack_layers(config: &IdleWaveConfig) -> (Vec<f32>, i32) {
    if config.layers.len() > MAX_WAVE_LAYERS {
        log::warn!(
            "{} idle wave layers configured, the GPU path evaluates the first {}",
            config.layers.len(),
            MAX_WAVE_LAYERS
        );
    }
    let mut packed = vec![0.0; MAX_WAVE_LAYERS * 4];
    let used = config.layers.len().min(MAX_WAVE_LAYERS);
    for (slot, layer) in packed.chunks_exact_mut(4).zip(&config.layers) {
        let axis = match layer.axis {
            WaveAxis::X => 0.0,
            WaveAxis::Y => 1.0,
            WaveAxis::Diagonal => 2.0,
        };
        slot.copy_from_slice(&[axis, layer.frequency, layer.speed_factor, layer.weight]);
    }
    (packed, used as i32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ripple_core::config::WaveLayer;

    #[test]
    fn test_pack_layers_default() {
        let (packed, count) = pack_layers(&IdleWaveConfig::default());
        assert_eq!(count, 3);
        assert_eq!(packed.len(), MAX_WAVE_LAYERS * 4);
        assert_eq!(&packed[0..4], &[0.0, 12.0, 1.0, 0.4]);
        assert_eq!(&packed[8..12], &[2.0, 6.0, 1.3, 0.3]);
        assert!(packed[12..].iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_pack_layers_truncates() {
        let config = IdleWaveConfig {
            amplitude: 0.1,
            speed: 1.0,
            layers: vec![WaveLayer::new(WaveAxis::Y, 1.0, 1.0, 1.0); MAX_WAVE_LAYERS + 2],
        };
        let (packed, count) = pack_layers(&config);
        assert_eq!(count as usize, MAX_WAVE_LAYERS);
        assert_eq!(packed.len(), MAX_WAVE_LAYERS * 4);
        assert_eq!(packed[0], 1.0);
    }
}
