use anyhow::{anyhow, bail, Result};
use glow::HasContext;

use crate::shaders::{self, GlslTarget};

/// Empty vertex array for the attribute-less fullscreen triangle. Core
/// profiles refuse to draw with no VAO bound, even one with no attributes.
pub struct FullscreenTriangle {
    vao: glow::VertexArray,
}

impl FullscreenTriangle {
    pub fn new(gl: &glow::Context) -> Result<Self> {
        let vao = unsafe { gl.create_vertex_array() }.map_err(|e| anyhow!("create vao: {}", e))?;
        Ok(Self { vao })
    }

    pub fn draw(&self, gl: &glow::Context) {
        unsafe {
            gl.bind_vertex_array(Some(self.vao));
            gl.draw_arrays(glow::TRIANGLES, 0, 3);
            gl.bind_vertex_array(None);
        }
    }

    pub fn destroy(&self, gl: &glow::Context) {
        unsafe { gl.delete_vertex_array(self.vao) };
    }
}

/// Compile `frag_src` against the shared fullscreen vertex shader and link.
pub fn compile_fullscreen_program(
    gl: &glow::Context,
    target: GlslTarget,
    frag_src: &str,
) -> Result<glow::Program> {
    unsafe {
        let vert = compile_shader(gl, glow::VERTEX_SHADER, &shaders::fullscreen_vertex(target))?;
        let frag = match compile_shader(gl, glow::FRAGMENT_SHADER, frag_src) {
            Ok(frag) => frag,
            Err(e) => {
                gl.delete_shader(vert);
                return Err(e);
            }
        };

        let program = match gl.create_program() {
            Ok(program) => program,
            Err(e) => {
                gl.delete_shader(vert);
                gl.delete_shader(frag);
                bail!("create program: {}", e);
            }
        };
        gl.attach_shader(program, vert);
        gl.attach_shader(program, frag);
        gl.link_program(program);
        let linked = gl.get_program_link_status(program);

        gl.detach_shader(program, vert);
        gl.detach_shader(program, frag);
        gl.delete_shader(vert);
        gl.delete_shader(frag);

        if !linked {
            let log = gl.get_program_info_log(program);
            gl.delete_program(program);
            bail!("program linking failed:\n{}", log);
        }
        Ok(program)
    }
}

unsafe fn compile_shader(gl: &glow::Context, kind: u32, src: &str) -> Result<glow::Shader> {
    let stage = if kind == glow::VERTEX_SHADER { "vertex" } else { "fragment" };
    let shader = gl
        .create_shader(kind)
        .map_err(|e| anyhow!("create {} shader: {}", stage, e))?;
    gl.shader_source(shader, src);
    gl.compile_shader(shader);
    if !gl.get_shader_compile_status(shader) {
        let log = gl.get_shader_info_log(shader);
        gl.delete_shader(shader);
        bail!("{} shader failed:\n{}", stage, log);
    }
    Ok(shader)
}

/// Uniform lookup. The driver drops uniforms the shader never reads, so a
/// missing one is logged rather than treated as fatal.
pub fn uniform(gl: &glow::Context, program: glow::Program, name: &str) -> Option<glow::UniformLocation> {
    let loc = unsafe { gl.get_uniform_location(program, name) };
    if loc.is_none() {
        log::debug!("uniform {} not active", name);
    }
    loc
}
