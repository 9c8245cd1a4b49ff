use anyhow::Result;
use glam::Vec3;
use glow::HasContext;
use ripple_core::config::LookConfig;
use ripple_core::StorageEncoding;

use crate::program::{compile_fullscreen_program, uniform, FullscreenTriangle};
use crate::shaders::{self, GlslTarget};

type Loc = Option<glow::UniformLocation>;

/// Final pass: refracts the scene capture through the field and shades the water.
pub struct CompositePass {
    program: glow::Program,
    look: LookConfig,
    light_dir: Vec3,
    loc_field: Loc,
    loc_scene: Loc,
    loc_time: Loc,
    loc_distortion: Loc,
    loc_aberration: Loc,
    loc_accent: Loc,
    loc_water_tint: Loc,
    loc_scatter_tint: Loc,
    loc_scatter_amount: Loc,
    loc_light_dir: Loc,
    loc_specular_power: Loc,
    loc_specular_strength: Loc,
    loc_pressure_strength: Loc,
    loc_caustics: Loc,
    loc_caustic: Loc,
}

impl CompositePass {
    pub fn new(
        gl: &glow::Context,
        target: GlslTarget,
        encoding: StorageEncoding,
        look: &LookConfig,
    ) -> Result<Self> {
        let program = compile_fullscreen_program(gl, target, &shaders::composite_fragment(encoding, target))?;
        let loc = |name: &str| uniform(gl, program, name);

        Ok(Self {
            program,
            look: look.clone(),
            light_dir: Vec3::from_array(look.light_dir).normalize_or_zero(),
            loc_field: loc("u_field"),
            loc_scene: loc("u_scene"),
            loc_time: loc("u_time"),
            loc_distortion: loc("u_distortion"),
            loc_aberration: loc("u_aberration"),
            loc_accent: loc("u_accent"),
            loc_water_tint: loc("u_water_tint"),
            loc_scatter_tint: loc("u_scatter_tint"),
            loc_scatter_amount: loc("u_scatter_amount"),
            loc_light_dir: loc("u_light_dir"),
            loc_specular_power: loc("u_specular_power"),
            loc_specular_strength: loc("u_specular_strength"),
            loc_pressure_strength: loc("u_pressure_strength"),
            loc_caustics: loc("u_caustics"),
            loc_caustic: loc("u_caustic"),
        })
    }

    /// Render into the currently bound framebuffer.
    pub fn render(
        &self,
        gl: &glow::Context,
        field_tex: glow::Texture,
        scene_tex: glow::Texture,
        time: f32,
        triangle: &FullscreenTriangle,
    ) {
        let look = &self.look;
        unsafe {
            gl.use_program(Some(self.program));

            gl.active_texture(glow::TEXTURE0);
            gl.bind_texture(glow::TEXTURE_2D, Some(field_tex));
            gl.uniform_1_i32(self.loc_field.as_ref(), 0);

            gl.active_texture(glow::TEXTURE1);
            gl.bind_texture(glow::TEXTURE_2D, Some(scene_tex));
            gl.uniform_1_i32(self.loc_scene.as_ref(), 1);

            gl.uniform_1_f32(self.loc_time.as_ref(), time);
            gl.uniform_1_f32(self.loc_distortion.as_ref(), look.distortion_strength);
            gl.uniform_1_f32(self.loc_aberration.as_ref(), look.aberration_strength);
            gl.uniform_3_f32_slice(self.loc_accent.as_ref(), &look.accent_color);
            gl.uniform_3_f32_slice(self.loc_water_tint.as_ref(), &look.water_tint);
            gl.uniform_3_f32_slice(self.loc_scatter_tint.as_ref(), &look.scatter_tint);
            gl.uniform_1_f32(self.loc_scatter_amount.as_ref(), look.scatter_amount);
            gl.uniform_3_f32_slice(self.loc_light_dir.as_ref(), &self.light_dir.to_array());
            gl.uniform_1_f32(self.loc_specular_power.as_ref(), look.specular_power);
            gl.uniform_1_f32(self.loc_specular_strength.as_ref(), look.specular_strength);
            gl.uniform_1_f32(self.loc_pressure_strength.as_ref(), look.pressure_strength);
            gl.uniform_1_f32(self.loc_caustics.as_ref(), if look.caustics { 1.0 } else { 0.0 });
            gl.uniform_2_f32(self.loc_caustic.as_ref(), look.caustic_scale, look.caustic_strength);

            triangle.draw(gl);

            gl.active_texture(glow::TEXTURE0);
            gl.use_program(None);
        }
    }

    pub fn destroy(&self, gl: &glow::Context) {
        unsafe { gl.delete_program(self.program) };
    }
}
