//! Headless water effect renderer.
//!
//! Runs the software backend over a background image with a scripted
//! diagonal swipe and writes every composited frame as a PNG.

mod args;
mod background;

use std::path::Path;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use ripple_core::{
    load_config, save_config, Capability, ColorBuffer, CpuBackend, EffectSession, FrameClock,
    InputEvent, InputSender, SurfaceSize, Viewport, WaterConfig,
};

use args::{Options, Preset};

const FRAME_SECS: f32 = 1.0 / 60.0;
/// Share of the run spent swiping; the rest shows the field settling.
const SWIPE_SHARE: f32 = 0.6;

fn main() {
    env_logger::init();

    let argv: Vec<String> = std::env::args().collect();
    let opts = match args::parse(&argv) {
        Ok(Some(opts)) => opts,
        Ok(None) => {
            println!("{}", args::USAGE);
            return;
        }
        Err(e) => {
            eprintln!("error: {:#}\n{}", e, args::USAGE);
            std::process::exit(2);
        }
    };

    if let Err(e) = run(&opts) {
        eprintln!("error: {:#}", e);
        std::process::exit(1);
    }
}

fn build_config(opts: &Options) -> Result<WaterConfig> {
    let config = match &opts.config {
        Some(path) => load_config(path).with_context(|| format!("loading config {}", path.display()))?,
        None => match opts.preset {
            Preset::Desktop => WaterConfig::desktop(),
            Preset::Mobile => WaterConfig::mobile_for_pixel_ratio(opts.pixel_ratio),
        },
    };
    config.validate()?;
    Ok(config)
}

fn run(opts: &Options) -> Result<()> {
    let config = build_config(opts)?;
    if let Some(path) = &opts.save_config {
        save_config(path, &config).with_context(|| format!("saving config {}", path.display()))?;
        log::info!("wrote config to {}", path.display());
    }

    let capability = if opts.no_float { Capability::LIMITED } else { Capability::FULL };
    let surface = SurfaceSize::new(opts.width, opts.height, opts.pixel_ratio);
    let physical = surface.physical();

    let backdrop = match &opts.background {
        Some(path) => background::load(path, physical)?,
        None => background::generate(physical),
    };

    std::fs::create_dir_all(&opts.out)
        .with_context(|| format!("creating output directory {}", opts.out.display()))?;

    let start = Instant::now();
    let mut session = EffectSession::initialize(CpuBackend::with_capability(capability), config, surface, start)?;
    let sender = session
        .input_sender()
        .ok_or_else(|| anyhow!("input queue unavailable"))?;
    let viewport = Viewport::new(opts.width as f32, opts.height as f32);
    let swipe_frames = ((opts.frames as f32 * SWIPE_SHARE) as u32).max(1);

    let mut faults = 0usize;
    for frame in 0..opts.frames {
        script_swipe(&sender, viewport, frame, swipe_frames);

        let elapsed = frame as f32 * FRAME_SECS;
        let clock = FrameClock {
            now: start + Duration::from_secs_f32(elapsed),
            elapsed,
            delta: FRAME_SECS,
        };
        let report = session.frame(clock, &mut |scene: &mut ColorBuffer| background::blit(&backdrop, scene));
        faults += report.faults.len();

        let output = session
            .backend()
            .output()
            .ok_or_else(|| anyhow!("output buffer missing after frame {}", frame))?;
        let path = opts.out.join(format!("frame_{:04}.png", frame));
        write_png(output, &path)?;
    }

    session.teardown();
    log::info!(
        "rendered {} frames to {} ({} faults)",
        opts.frames,
        opts.out.display(),
        faults
    );
    Ok(())
}

/// Press at the upper left, drag to the lower right, release.
fn script_swipe(sender: &InputSender, viewport: Viewport, frame: u32, swipe_frames: u32) {
    if frame > swipe_frames {
        return;
    }
    if frame == swipe_frames {
        sender.send(InputEvent::PointerReleased);
        return;
    }
    let t = frame as f32 / swipe_frames as f32;
    let x = viewport.width * (0.2 + 0.6 * t);
    let y = viewport.height * (0.2 + 0.6 * t);
    sender.send(InputEvent::PointerMoved { x, y, viewport });
    if frame == 0 {
        sender.send(InputEvent::PointerPressed);
    }
}

fn write_png(buffer: &ColorBuffer, path: &Path) -> Result<()> {
    let img = image::RgbaImage::from_raw(buffer.width(), buffer.height(), buffer.to_rgba8())
        .ok_or_else(|| anyhow!("frame buffer size mismatch"))?;
    img.save(path).with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}
