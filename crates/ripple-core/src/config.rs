use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;

use crate::encoding::DampingTable;

/// Accent color `#9DF032`.
pub const ACCENT_GREEN: [f32; 3] = [0.616, 0.941, 0.196];
/// Clear color for scene captures, `#1a1a1a`.
pub const CAPTURE_CLEAR: [f32; 4] = [0.102, 0.102, 0.102, 1.0];
/// One day. Longer timeouts are indistinguishable from never settling.
pub const MAX_INACTIVITY_TIMEOUT_SECS: f32 = 86_400.0;

/// Full tuning record for the water effect.
///
/// Every constant of the pipeline lives here. The values are visual tuning,
/// not physics: change them freely. [`WaterConfig::desktop`] is the default;
/// [`WaterConfig::mobile`] trades resolution for memory and uses
/// press-only interaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaterConfig {
    /// Side length of the square simulation grid, in cells.
    pub grid_resolution: u32,
    /// Laplacian stencil weight per axis. Values above 0.25 go unstable.
    pub stencil_weight: f32,
    /// Upper bound on the frame-time derived step (1.0 = one 60 Hz frame).
    pub max_delta: f32,
    /// Per-frame multiplier applied to the tracked pointer velocity.
    pub velocity_decay: f32,
    /// Seconds without input before the field is allowed to settle.
    pub inactivity_timeout_secs: f32,
    /// Multiplier applied to elapsed time before it reaches the stepper.
    pub time_scale: f32,
    /// Wrap for the scaled simulation time, keeps sin() arguments small.
    pub time_wrap: Option<f32>,
    pub damping: DampingTable,
    pub interaction: InteractionConfig,
    pub idle_waves: IdleWaveConfig,
    pub look: LookConfig,
    pub scene: SceneCaptureConfig,
}

/// Pointer/touch injection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractionConfig {
    /// Radius in normalized units.
    pub radius: f32,
    pub strength: f32,
    /// Inject on plain pointer movement, not only while pressed.
    pub hover_injection: bool,
    /// Minimum scaled speed that counts as a swipe.
    pub speed_threshold: f32,
    /// Multiplier turning a per-frame position delta into swipe speed.
    pub speed_gain: f32,
    pub turbulence: f32,
    pub turbulence_frequency: f32,
    /// How much of the swipe direction is pushed into the velocity channel.
    pub flow_push: f32,
}

/// Which coordinate an idle wave layer travels along.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WaveAxis {
    X,
    Y,
    Diagonal,
}

/// One sinusoidal idle layer: `sin(coord * frequency + t * speed * speed_factor) * weight`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WaveLayer {
    pub axis: WaveAxis,
    pub frequency: f32,
    pub speed_factor: f32,
    pub weight: f32,
}

impl WaveLayer {
    pub const fn new(axis: WaveAxis, frequency: f32, speed_factor: f32, weight: f32) -> Self {
        Self { axis, frequency, speed_factor, weight }
    }
}

/// Ambient forcing that keeps the surface moving while the user is active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdleWaveConfig {
    pub amplitude: f32,
    pub speed: f32,
    pub layers: Vec<WaveLayer>,
}

/// Compositing and lighting.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LookConfig {
    pub distortion_strength: f32,
    pub aberration_strength: f32,
    pub accent_color: [f32; 3],
    pub water_tint: [f32; 3],
    pub scatter_tint: [f32; 3],
    pub scatter_amount: f32,
    pub light_dir: [f32; 3],
    pub specular_power: f32,
    pub specular_strength: f32,
    pub pressure_strength: f32,
    /// Two-layer animated caustics.
    pub caustics: bool,
    pub caustic_scale: f32,
    pub caustic_strength: f32,
}

/// Background capture cadence and sizing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneCaptureConfig {
    /// Capture the background every N frames.
    pub interval: u32,
    /// Reallocate the capture buffer when the output surface is resized.
    /// When false the size chosen at initialization is kept.
    pub track_resize: bool,
    pub clear_color: [f32; 4],
}

impl Default for WaterConfig {
    fn default() -> Self {
        Self::desktop()
    }
}

impl Default for InteractionConfig {
    fn default() -> Self {
        Self {
            radius: 0.12,
            strength: 0.3,
            hover_injection: true,
            speed_threshold: 0.01,
            speed_gain: 10.0,
            turbulence: 0.2,
            turbulence_frequency: 30.0,
            flow_push: 0.3,
        }
    }
}

impl Default for IdleWaveConfig {
    fn default() -> Self {
        Self {
            amplitude: 0.06,
            speed: 0.3,
            layers: vec![
                WaveLayer::new(WaveAxis::X, 12.0, 1.0, 0.4),
                WaveLayer::new(WaveAxis::Y, 8.0, 0.7, 0.3),
                WaveLayer::new(WaveAxis::Diagonal, 6.0, 1.3, 0.3),
            ],
        }
    }
}

impl Default for LookConfig {
    fn default() -> Self {
        Self {
            distortion_strength: 0.055,
            aberration_strength: 0.008,
            accent_color: ACCENT_GREEN,
            water_tint: [0.98, 0.99, 1.0],
            scatter_tint: [0.95, 0.97, 1.0],
            scatter_amount: 0.05,
            light_dir: [-0.3, 1.0, 0.3],
            specular_power: 50.0,
            specular_strength: 0.04,
            pressure_strength: 0.01,
            caustics: true,
            caustic_scale: 6.0,
            caustic_strength: 0.12,
        }
    }
}

impl Default for SceneCaptureConfig {
    fn default() -> Self {
        Self {
            interval: 2,
            track_resize: true,
            clear_color: CAPTURE_CLEAR,
        }
    }
}

impl WaterConfig {
    /// Pointer-driven variant with a high resolution scene capture.
    pub fn desktop() -> Self {
        Self {
            grid_resolution: 256,
            stencil_weight: 0.1875,
            max_delta: 1.4,
            velocity_decay: 0.95,
            inactivity_timeout_secs: 30.0,
            time_scale: 1.0,
            time_wrap: None,
            damping: DampingTable::default(),
            interaction: InteractionConfig::default(),
            idle_waves: IdleWaveConfig::default(),
            look: LookConfig::default(),
            scene: SceneCaptureConfig::default(),
        }
    }

    /// Touch variant for memory-constrained devices at pixel ratio 1.
    pub fn mobile() -> Self {
        Self::mobile_for_pixel_ratio(1.0)
    }

    /// Touch variant whose grid shrinks as the device pixel ratio grows.
    pub fn mobile_for_pixel_ratio(pixel_ratio: f32) -> Self {
        let ratio = pixel_ratio.clamp(1.0, 2.0).max(1.2);
        let resolution = (512.0 / ratio).floor() as u32;

        Self {
            grid_resolution: resolution,
            time_scale: 0.3,
            time_wrap: Some(1000.0),
            interaction: InteractionConfig {
                hover_injection: false,
                ..InteractionConfig::default()
            },
            idle_waves: IdleWaveConfig {
                amplitude: 0.09,
                speed: 0.5,
                layers: vec![
                    WaveLayer::new(WaveAxis::X, 10.0, 1.0, 0.5),
                    WaveLayer::new(WaveAxis::Y, 7.0, 0.8, 0.4),
                    WaveLayer::new(WaveAxis::Diagonal, 5.0, 1.2, 0.3),
                ],
            },
            look: LookConfig {
                distortion_strength: 0.09,
                aberration_strength: 0.012,
                caustics: false,
                ..LookConfig::default()
            },
            scene: SceneCaptureConfig {
                interval: 1,
                track_resize: false,
                ..SceneCaptureConfig::default()
            },
            ..Self::desktop()
        }
    }

    /// Reject configurations no backend can allocate for.
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.grid_resolution >= 2,
            "grid resolution must be at least 2 cells, got {}",
            self.grid_resolution
        );
        anyhow::ensure!(
            self.grid_resolution <= 8192,
            "grid resolution {} exceeds 8192",
            self.grid_resolution
        );
        anyhow::ensure!(self.max_delta > 0.0, "max_delta must be positive");
        anyhow::ensure!(
            self.stencil_weight > 0.0 && self.stencil_weight <= 0.25,
            "stencil weight {} is outside (0, 0.25]",
            self.stencil_weight
        );
        anyhow::ensure!(
            (0.0..=1.0).contains(&self.velocity_decay),
            "velocity decay {} is outside [0, 1]",
            self.velocity_decay
        );
        anyhow::ensure!(
            (0.0..=MAX_INACTIVITY_TIMEOUT_SECS).contains(&self.inactivity_timeout_secs),
            "inactivity timeout {}s is outside [0, {}]",
            self.inactivity_timeout_secs,
            MAX_INACTIVITY_TIMEOUT_SECS
        );
        anyhow::ensure!(
            self.interaction.radius.is_finite() && self.interaction.radius >= 0.0,
            "interaction radius {} must be finite and non-negative",
            self.interaction.radius
        );
        anyhow::ensure!(
            self.scene.interval >= 1,
            "scene capture interval must be at least 1"
        );
        Ok(())
    }

    /// Simulation time for a given elapsed wall-clock time.
    pub fn simulation_time(&self, elapsed_secs: f32) -> f32 {
        let t = elapsed_secs * self.time_scale;
        match self.time_wrap {
            Some(wrap) if wrap > 0.0 => t % wrap,
            _ => t,
        }
    }

    /// Integration step for a frame that took `frame_secs`.
    pub fn clamped_delta(&self, frame_secs: f32) -> f32 {
        (frame_secs.max(0.0) * 60.0).min(self.max_delta)
    }
}

/// Save a config as pretty JSON.
pub fn save_config(path: &Path, config: &WaterConfig) -> io::Result<()> {
    let json = serde_json::to_string_pretty(config)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    std::fs::write(path, json)
}

/// Load a config from JSON. Missing fields take their desktop defaults.
pub fn load_config(path: &Path) -> io::Result<WaterConfig> {
    let json = std::fs::read_to_string(path)?;
    serde_json::from_str(&json).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}
