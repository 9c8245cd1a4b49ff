use std::path::Path;

use anyhow::{anyhow, Context, Result};
use image::imageops::FilterType;
use ripple_core::{ColorBuffer, PhysicalSize};

/// Load an image and scale it to the capture size.
pub fn load(path: &Path, size: PhysicalSize) -> Result<ColorBuffer> {
    let img = image::open(path).with_context(|| format!("opening background {}", path.display()))?;
    let rgba = img.resize_exact(size.width, size.height, FilterType::Triangle).to_rgba8();
    ColorBuffer::from_rgba8(size.width, size.height, rgba.as_raw())
        .ok_or_else(|| anyhow!("background {} resized to the wrong pixel count", path.display()))
}

/// Dark backdrop with a light grid and a few accent bars, so refraction
/// shows up clearly without any input file.
pub fn generate(size: PhysicalSize) -> ColorBuffer {
    let mut buf = ColorBuffer::new(size.width, size.height, [0.0; 4]);
    let cell = (size.width.max(size.height) / 12).max(4);
    for y in 0..size.height {
        for x in 0..size.width {
            let t = y as f32 / size.height.max(1) as f32;
            let mut color = [0.10 + 0.08 * t, 0.10 + 0.05 * t, 0.14 + 0.10 * t, 1.0];
            if x % cell == 0 || y % cell == 0 {
                color = [0.85, 0.87, 0.90, 1.0];
            }
            if (x / cell + y / cell) % 5 == 0 && (y / 2) % cell < cell / 4 {
                color = [0.616, 0.941, 0.196, 1.0];
            }
            buf.set(x, y, color);
        }
    }
    buf
}

/// Resample `src` onto whatever size `dst` has.
pub fn blit(src: &ColorBuffer, dst: &mut ColorBuffer) {
    if src.width() == dst.width() && src.height() == dst.height() {
        dst.clone_from(src);
        return;
    }
    for y in 0..dst.height() {
        for x in 0..dst.width() {
            let uv = dst.pixel_uv(x, y);
            dst.set(x, y, src.sample(uv));
        }
    }
}
