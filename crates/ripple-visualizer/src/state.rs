use std::num::NonZeroU32;

use glow::HasContext;

/// Texture units the passes touch.
const SAVED_TEXTURE_UNITS: usize = 2;

/// Host GL state, saved before a pass and put back afterwards so the host's
/// own rendering never notices the effect ran.
pub struct SavedGlState {
    pub framebuffer: Option<glow::Framebuffer>,
    viewport: [i32; 4],
    blend_enabled: bool,
    scissor_enabled: bool,
    depth_enabled: bool,
    clear_color: [f32; 4],
    program: Option<glow::Program>,
    vao: Option<glow::VertexArray>,
    active_texture: i32,
    bound_textures: [Option<glow::Texture>; SAVED_TEXTURE_UNITS],
}

fn handle(id: i32) -> Option<NonZeroU32> {
    NonZeroU32::new(id as u32)
}

impl SavedGlState {
    pub unsafe fn save(gl: &glow::Context) -> Self {
        let framebuffer = handle(gl.get_parameter_i32(glow::FRAMEBUFFER_BINDING)).map(glow::NativeFramebuffer);

        let mut viewport = [0i32; 4];
        gl.get_parameter_i32_slice(glow::VIEWPORT, &mut viewport);

        let mut clear_color = [0.0f32; 4];
        gl.get_parameter_f32_slice(glow::COLOR_CLEAR_VALUE, &mut clear_color);

        let program = handle(gl.get_parameter_i32(glow::CURRENT_PROGRAM)).map(glow::NativeProgram);
        let vao = handle(gl.get_parameter_i32(glow::VERTEX_ARRAY_BINDING)).map(glow::NativeVertexArray);
        let active_texture = gl.get_parameter_i32(glow::ACTIVE_TEXTURE);

        let mut bound_textures = [None; SAVED_TEXTURE_UNITS];
        for (i, bound) in bound_textures.iter_mut().enumerate() {
            gl.active_texture(glow::TEXTURE0 + i as u32);
            *bound = handle(gl.get_parameter_i32(glow::TEXTURE_BINDING_2D)).map(glow::NativeTexture);
        }
        gl.active_texture(active_texture as u32);

        Self {
            framebuffer,
            viewport,
            blend_enabled: gl.is_enabled(glow::BLEND),
            scissor_enabled: gl.is_enabled(glow::SCISSOR_TEST),
            depth_enabled: gl.is_enabled(glow::DEPTH_TEST),
            clear_color,
            program,
            vao,
            active_texture,
            bound_textures,
        }
    }

    /// Disable everything that would interfere with a fullscreen pass.
    pub unsafe fn prepare_pass(gl: &glow::Context) {
        gl.disable(glow::BLEND);
        gl.disable(glow::SCISSOR_TEST);
        gl.disable(glow::DEPTH_TEST);
    }

    pub unsafe fn restore(&self, gl: &glow::Context) {
        gl.bind_framebuffer(glow::FRAMEBUFFER, self.framebuffer);
        gl.viewport(self.viewport[0], self.viewport[1], self.viewport[2], self.viewport[3]);

        set_capability(gl, glow::BLEND, self.blend_enabled);
        set_capability(gl, glow::SCISSOR_TEST, self.scissor_enabled);
        set_capability(gl, glow::DEPTH_TEST, self.depth_enabled);
        let [r, g, b, a] = self.clear_color;
        gl.clear_color(r, g, b, a);

        gl.use_program(self.program);
        gl.bind_vertex_array(self.vao);

        for (i, bound) in self.bound_textures.iter().enumerate() {
            gl.active_texture(glow::TEXTURE0 + i as u32);
            gl.bind_texture(glow::TEXTURE_2D, *bound);
        }
        gl.active_texture(self.active_texture as u32);
    }
}

unsafe fn set_capability(gl: &glow::Context, cap: u32, enabled: bool) {
    if enabled {
        gl.enable(cap);
    } else {
        gl.disable(cap);
    }
}
