use serde::{Deserialize, Serialize};

/// Runtime support level for extended-range color buffers.
///
/// Probed once when a session is initialized and again after the GPU
/// context is restored. Everything downstream keys off the
/// [`StorageEncoding`] derived from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capability {
    /// Float (or half-float) render targets can hold signed values.
    pub float_color_buffers: bool,
}

impl Capability {
    pub const FULL: Capability = Capability { float_color_buffers: true };
    pub const LIMITED: Capability = Capability { float_color_buffers: false };

    pub fn encoding(self) -> StorageEncoding {
        StorageEncoding::for_capability(self)
    }
}

/// How field values are laid out in storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageEncoding {
    /// Signed values stored as-is.
    Direct,
    /// Signed values mapped into `[0, 1]` for normalized storage.
    BiasScaled,
}

/// Hard clamp applied to pressure and velocity when storage is bias-scaled.
pub const BIAS_SCALED_LIMIT: f32 = 0.5;

impl StorageEncoding {
    pub fn for_capability(capability: Capability) -> Self {
        if capability.float_color_buffers {
            StorageEncoding::Direct
        } else {
            StorageEncoding::BiasScaled
        }
    }

    /// Map a signed simulation value into storage.
    ///
    /// Bias-scaled storage saturates at the `[0, 1]` bounds the same way a
    /// normalized texture does.
    #[inline]
    pub fn encode(self, value: f32) -> f32 {
        match self {
            StorageEncoding::Direct => value,
            StorageEncoding::BiasScaled => (value * 0.5 + 0.5).clamp(0.0, 1.0),
        }
    }

    /// Map a stored value back to the signed simulation range.
    #[inline]
    pub fn decode(self, stored: f32) -> f32 {
        match self {
            StorageEncoding::Direct => stored,
            StorageEncoding::BiasScaled => stored * 2.0 - 1.0,
        }
    }

    /// Symmetric bound applied to pressure and velocity after each step.
    pub fn value_limit(self) -> Option<f32> {
        match self {
            StorageEncoding::Direct => None,
            StorageEncoding::BiasScaled => Some(BIAS_SCALED_LIMIT),
        }
    }

    /// Value a freshly cleared buffer decodes to zero from.
    pub fn zero(self) -> f32 {
        self.encode(0.0)
    }

    /// GLSL `decode_value` / `encode_value` pair matching this encoding.
    ///
    /// Spliced into shader sources once at program build time.
    pub fn glsl_codec(self) -> &'static str {
        match self {
            StorageEncoding::Direct => {
                "float decode_value(float s) { return s; }\n\
                 vec4 encode_sample(vec4 v) { return v; }\n\
                 const float VALUE_LIMIT = 0.0;\n"
            }
            StorageEncoding::BiasScaled => {
                "float decode_value(float s) { return s * 2.0 - 1.0; }\n\
                 vec4 encode_sample(vec4 v) { return clamp(v * 0.5 + 0.5, 0.0, 1.0); }\n\
                 const float VALUE_LIMIT = 0.5;\n"
            }
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            StorageEncoding::Direct => "direct",
            StorageEncoding::BiasScaled => "bias-scaled",
        }
    }
}

/// Which dynamics regime the stepper is running in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepperState {
    /// Full dynamics plus ambient idle waves.
    Active,
    /// Stronger damping, idle waves suppressed.
    Inactive,
}

impl StepperState {
    pub fn from_inactive(inactive: bool) -> Self {
        if inactive {
            StepperState::Inactive
        } else {
            StepperState::Active
        }
    }
}

/// Per-step multiplicative damping.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Damping {
    pub velocity: f32,
    pub pressure: f32,
}

impl Damping {
    pub const fn new(velocity: f32, pressure: f32) -> Self {
        Self { velocity, pressure }
    }
}

/// Active/inactive damping for one storage encoding.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DampingPair {
    pub active: Damping,
    pub inactive: Damping,
}

/// Damping constants for every (encoding, state) combination.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DampingTable {
    pub direct: DampingPair,
    pub bias_scaled: DampingPair,
}

impl Default for DampingTable {
    fn default() -> Self {
        Self {
            direct: DampingPair {
                active: Damping::new(0.998, 0.999),
                inactive: Damping::new(0.95, 0.96),
            },
            bias_scaled: DampingPair {
                active: Damping::new(0.985, 0.990),
                inactive: Damping::new(0.90, 0.92),
            },
        }
    }
}

impl DampingTable {
    pub fn select(&self, encoding: StorageEncoding, state: StepperState) -> Damping {
        let pair = match encoding {
            StorageEncoding::Direct => &self.direct,
            StorageEncoding::BiasScaled => &self.bias_scaled,
        };
        match state {
            StepperState::Active => pair.active,
            StepperState::Inactive => pair.inactive,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capability_selects_encoding() {
        assert_eq!(Capability::FULL.encoding(), StorageEncoding::Direct);
        assert_eq!(Capability::LIMITED.encoding(), StorageEncoding::BiasScaled);
    }

    #[test]
    fn test_bias_scaled_codec() {
        let enc = StorageEncoding::BiasScaled;
        assert!((enc.encode(0.0) - 0.5).abs() < 1e-6);
        assert!((enc.encode(-1.0)).abs() < 1e-6);
        assert!((enc.decode(enc.encode(0.3)) - 0.3).abs() < 1e-6);
        // Out-of-range values saturate like a normalized texture would.
        assert_eq!(enc.encode(3.0), 1.0);
        assert_eq!(enc.encode(-3.0), 0.0);
    }

    #[test]
    fn test_direct_codec_is_identity() {
        let enc = StorageEncoding::Direct;
        assert_eq!(enc.encode(-2.5), -2.5);
        assert_eq!(enc.decode(7.0), 7.0);
        assert_eq!(enc.value_limit(), None);
    }

    #[test]
    fn test_inactive_damping_is_stronger() {
        let table = DampingTable::default();
        for enc in [StorageEncoding::Direct, StorageEncoding::BiasScaled] {
            let active = table.select(enc, StepperState::Active);
            let idle = table.select(enc, StepperState::Inactive);
            assert!(idle.velocity < active.velocity);
            assert!(idle.pressure < active.pressure);
        }
    }

    #[test]
    fn test_glsl_codec_differs_per_encoding() {
        assert!(StorageEncoding::Direct.glsl_codec().contains("return s;"));
        assert!(StorageEncoding::BiasScaled.glsl_codec().contains("s * 2.0 - 1.0"));
    }
}
