use anyhow::{anyhow, bail, Result};
use glow::HasContext;
use ripple_core::StorageEncoding;

/// Texel storage of a render target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetFormat {
    /// Half-float RGBA. Needs renderable float color buffers.
    Rgba16F,
    /// Normalized 8-bit RGBA.
    Rgba8,
}

impl TargetFormat {
    /// Storage for a simulation field with the given encoding.
    pub fn for_encoding(encoding: StorageEncoding) -> Self {
        match encoding {
            StorageEncoding::Direct => TargetFormat::Rgba16F,
            StorageEncoding::BiasScaled => TargetFormat::Rgba8,
        }
    }

    fn internal_format(self) -> i32 {
        match self {
            TargetFormat::Rgba16F => glow::RGBA16F as i32,
            TargetFormat::Rgba8 => glow::RGBA8 as i32,
        }
    }

    fn pixel_type(self) -> u32 {
        match self {
            TargetFormat::Rgba16F => glow::HALF_FLOAT,
            TargetFormat::Rgba8 => glow::UNSIGNED_BYTE,
        }
    }
}

/// A framebuffer object with one color texture attachment.
pub struct RenderTarget {
    pub fbo: glow::Framebuffer,
    pub texture: glow::Texture,
    pub width: u32,
    pub height: u32,
    pub format: TargetFormat,
}

impl RenderTarget {
    /// Create a linearly filtered, edge-clamped target.
    ///
    /// Fails if the driver refuses the texture or the framebuffer is not
    /// complete; nothing is leaked in that case.
    pub fn new(gl: &glow::Context, width: u32, height: u32, format: TargetFormat) -> Result<Self> {
        if width == 0 || height == 0 {
            bail!("render target size {}x{} is empty", width, height);
        }

        unsafe {
            let texture = gl.create_texture().map_err(|e| anyhow!("create texture: {}", e))?;
            gl.bind_texture(glow::TEXTURE_2D, Some(texture));
            gl.tex_image_2d(
                glow::TEXTURE_2D,
                0,
                format.internal_format(),
                width as i32,
                height as i32,
                0,
                glow::RGBA,
                format.pixel_type(),
                glow::PixelUnpackData::Slice(None),
            );
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MIN_FILTER, glow::LINEAR as i32);
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_MAG_FILTER, glow::LINEAR as i32);
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_S, glow::CLAMP_TO_EDGE as i32);
            gl.tex_parameter_i32(glow::TEXTURE_2D, glow::TEXTURE_WRAP_T, glow::CLAMP_TO_EDGE as i32);

            let fbo = match gl.create_framebuffer() {
                Ok(fbo) => fbo,
                Err(e) => {
                    gl.bind_texture(glow::TEXTURE_2D, None);
                    gl.delete_texture(texture);
                    bail!("create framebuffer: {}", e);
                }
            };
            gl.bind_framebuffer(glow::FRAMEBUFFER, Some(fbo));
            gl.framebuffer_texture_2d(
                glow::FRAMEBUFFER,
                glow::COLOR_ATTACHMENT0,
                glow::TEXTURE_2D,
                Some(texture),
                0,
            );

            let status = gl.check_framebuffer_status(glow::FRAMEBUFFER);
            gl.bind_framebuffer(glow::FRAMEBUFFER, None);
            gl.bind_texture(glow::TEXTURE_2D, None);

            let target = Self { fbo, texture, width, height, format };
            if status != glow::FRAMEBUFFER_COMPLETE {
                target.destroy(gl);
                bail!("{:?} framebuffer {}x{} incomplete: 0x{:X}", format, width, height, status);
            }
            Ok(target)
        }
    }

    /// Bind this render target and set its viewport.
    pub fn bind(&self, gl: &glow::Context) {
        unsafe {
            gl.bind_framebuffer(glow::FRAMEBUFFER, Some(self.fbo));
            gl.viewport(0, 0, self.width as i32, self.height as i32);
        }
    }

    /// Bind and fill with one color.
    pub fn clear(&self, gl: &glow::Context, color: [f32; 4]) {
        self.bind(gl);
        unsafe {
            gl.clear_color(color[0], color[1], color[2], color[3]);
            gl.clear(glow::COLOR_BUFFER_BIT);
        }
    }

    /// Destroy GPU resources.
    pub fn destroy(&self, gl: &glow::Context) {
        unsafe {
            gl.delete_framebuffer(self.fbo);
            gl.delete_texture(self.texture);
        }
    }
}
