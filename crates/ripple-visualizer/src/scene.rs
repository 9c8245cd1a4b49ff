use anyhow::Result;
use ripple_core::PhysicalSize;

use crate::fbo::{RenderTarget, TargetFormat};

/// Offscreen copy of the background the water refracts.
pub struct ScenePass {
    target: RenderTarget,
    clear_color: [f32; 4],
}

impl ScenePass {
    pub fn new(gl: &glow::Context, size: PhysicalSize, clear_color: [f32; 4]) -> Result<Self> {
        let target = RenderTarget::new(gl, size.width, size.height, TargetFormat::Rgba8)?;
        // Transparent until the first capture so compositing falls back to white.
        target.clear(gl, [0.0; 4]);
        Ok(Self { target, clear_color })
    }

    /// Swap in a target of the new size. The old one survives a failed allocation.
    pub fn resize(&mut self, gl: &glow::Context, size: PhysicalSize) -> Result<()> {
        if size.width == self.target.width && size.height == self.target.height {
            return Ok(());
        }
        let target = RenderTarget::new(gl, size.width, size.height, TargetFormat::Rgba8)?;
        target.clear(gl, [0.0; 4]);
        let old = std::mem::replace(&mut self.target, target);
        old.destroy(gl);
        Ok(())
    }

    /// Bind the capture target and clear it for the host to draw into.
    pub fn begin(&self, gl: &glow::Context) {
        self.target.clear(gl, self.clear_color);
    }

    pub fn texture(&self) -> glow::Texture {
        self.target.texture
    }

    pub fn size(&self) -> PhysicalSize {
        PhysicalSize { width: self.target.width, height: self.target.height }
    }

    pub fn destroy(&self, gl: &glow::Context) {
        self.target.destroy(gl);
    }
}
