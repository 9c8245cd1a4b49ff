//! CPU compositor: samples the captured scene through the field's gradient
//! and adds the chromatic accent, specular highlight and caustics.
//!
//! The GL backend runs the same math as a fragment shader; this version is
//! the reference used by the CPU backend and the tests.

use glam::{Vec2, Vec3};

use crate::config::LookConfig;
use crate::field::FieldGrid;
use crate::math::{mix, smoothstep};

/// Keeps distorted lookups off the very edge of the capture.
const UV_MARGIN: f32 = 0.0001;

/// Linear RGBA image, row 0 at the top. Sampling coordinates have y up.
#[derive(Debug, Clone, PartialEq)]
pub struct ColorBuffer {
    width: u32,
    height: u32,
    pixels: Vec<[f32; 4]>,
}

impl ColorBuffer {
    pub fn new(width: u32, height: u32, fill: [f32; 4]) -> Self {
        Self {
            width,
            height,
            pixels: vec![fill; (width as usize) * (height as usize)],
        }
    }

    /// Build from 8-bit RGBA bytes, e.g. a decoded PNG. `None` unless
    /// `bytes` holds exactly `width * height` pixels.
    pub fn from_rgba8(width: u32, height: u32, bytes: &[u8]) -> Option<Self> {
        let expected = (width as usize) * (height as usize) * 4;
        if bytes.len() != expected {
            return None;
        }
        let pixels = bytes
            .chunks_exact(4)
            .map(|p| [p[0] as f32 / 255.0, p[1] as f32 / 255.0, p[2] as f32 / 255.0, p[3] as f32 / 255.0])
            .collect();
        Some(Self { width, height, pixels })
    }

    /// Convert to 8-bit RGBA, clamping to the displayable range.
    pub fn to_rgba8(&self) -> Vec<u8> {
        self.pixels
            .iter()
            .flat_map(|p| p.map(|c| (c.clamp(0.0, 1.0) * 255.0 + 0.5) as u8))
            .collect()
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn pixels(&self) -> &[[f32; 4]] {
        &self.pixels
    }

    pub fn get(&self, x: u32, y: u32) -> [f32; 4] {
        self.pixels[(y as usize) * self.width as usize + x as usize]
    }

    pub fn set(&mut self, x: u32, y: u32, color: [f32; 4]) {
        let w = self.width as usize;
        self.pixels[(y as usize) * w + x as usize] = color;
    }

    pub fn fill(&mut self, color: [f32; 4]) {
        self.pixels.fill(color);
    }

    /// Texture coordinate of a pixel centre.
    pub fn pixel_uv(&self, x: u32, y: u32) -> Vec2 {
        Vec2::new(
            (x as f32 + 0.5) / self.width as f32,
            1.0 - (y as f32 + 0.5) / self.height as f32,
        )
    }

    #[inline]
    fn texel(&self, x: i64, y: i64) -> [f32; 4] {
        let cx = x.clamp(0, self.width as i64 - 1) as usize;
        let cy = y.clamp(0, self.height as i64 - 1) as usize;
        self.pixels[cy * self.width as usize + cx]
    }

    /// Bilinear lookup with clamp-to-edge addressing.
    pub fn sample(&self, uv: Vec2) -> [f32; 4] {
        if self.pixels.is_empty() {
            return [0.0; 4];
        }
        let fx = uv.x * self.width as f32 - 0.5;
        let fy = (1.0 - uv.y) * self.height as f32 - 0.5;
        let x0 = fx.floor();
        let y0 = fy.floor();
        let tx = fx - x0;
        let ty = fy - y0;
        let (x0, y0) = (x0 as i64, y0 as i64);

        let a = self.texel(x0, y0);
        let b = self.texel(x0 + 1, y0);
        let c = self.texel(x0, y0 + 1);
        let d = self.texel(x0 + 1, y0 + 1);

        let mut out = [0.0f32; 4];
        for ch in 0..4 {
            let top = mix(a[ch], b[ch], tx);
            let bottom = mix(c[ch], d[ch], tx);
            out[ch] = mix(top, bottom, ty);
        }
        out
    }
}

pub struct Compositor {
    look: LookConfig,
    light_dir: Vec3,
}

impl Compositor {
    pub fn new(look: &LookConfig) -> Self {
        Self {
            look: look.clone(),
            light_dir: Vec3::from_array(look.light_dir).normalize_or_zero(),
        }
    }

    pub fn look(&self) -> &LookConfig {
        &self.look
    }

    /// Screen-space offset applied to the scene lookup at `uv`.
    pub fn distortion_at(&self, field: &FieldGrid, uv: Vec2) -> Vec2 {
        field.sample_bilinear(uv).gradient() * self.look.distortion_strength
    }

    /// Final color of one output pixel.
    pub fn shade(&self, field: &FieldGrid, scene: &ColorBuffer, uv: Vec2, time: f32) -> [f32; 4] {
        let look = &self.look;
        let water = field.sample_bilinear(uv);
        let pressure = water.pressure;

        let distortion = water.gradient() * look.distortion_strength;
        let distorted = uv + distortion;
        let aberration = distortion * look.aberration_strength / look.distortion_strength.max(0.001);

        let uv_center = distorted.clamp(Vec2::splat(UV_MARGIN), Vec2::splat(1.0 - UV_MARGIN));
        let uv_offset =
            (distorted + aberration).clamp(Vec2::splat(UV_MARGIN), Vec2::splat(1.0 - UV_MARGIN));

        let center = scene.sample(uv_center);
        let offset = scene.sample(uv_offset);

        let accent = Vec3::from_array(look.accent_color);
        let mut base = Vec3::new(center[0], center[1], center[2])
            .max(Vec3::new(offset[0], offset[1], offset[2]) * accent);
        // Unset or transparent capture regions composite as opaque white.
        if center[3] < 0.01 {
            base = Vec3::ONE;
        }

        let normal = Vec3::new(-water.grad_x, 0.1, -water.grad_y).normalize();
        let depth = pressure.abs() * 2.0 + 0.1;
        let depth_attenuation = (-depth * 0.5).exp();
        let spec = normal.dot(self.light_dir).max(0.0).powf(look.specular_power) * depth_attenuation;
        let scatter = 1.0 - (-depth * 0.5).exp();

        let mut color = base * Vec3::from_array(look.water_tint);
        color = color.lerp(Vec3::from_array(look.scatter_tint), scatter * look.scatter_amount);

        if look.caustics {
            color += Vec3::splat(self.caustic(uv, time, depth) * 0.1);
        }

        color += Vec3::splat(spec * look.specular_strength);
        color += Vec3::splat(pressure * look.pressure_strength);

        [color.x, color.y, color.z, 1.0]
    }

    /// Two drifting sinusoid products, faded out where the water is deep.
    fn caustic(&self, uv: Vec2, time: f32, depth: f32) -> f32 {
        let s = self.look.caustic_scale;
        let c1 = (uv.x * s + time * 0.3).sin() * (uv.y * s + time * 0.2).sin();
        let c2 = (uv.x * s * 1.3 - time * 0.25).sin() * (uv.y * s * 0.8 + time * 0.18).sin();
        let c = smoothstep(-0.5, 0.5, (c1 + c2) * 0.5);
        c * (-depth).exp() * self.look.caustic_strength
    }

    /// Shade every pixel of `out`.
    pub fn render(&self, field: &FieldGrid, scene: &ColorBuffer, time: f32, out: &mut ColorBuffer) {
        for y in 0..out.height() {
            for x in 0..out.width() {
                let uv = out.pixel_uv(x, y);
                let color = self.shade(field, scene, uv, time);
                out.set(x, y, color);
            }
        }
    }
}
