//! Small GLSL-flavoured helpers shared by the CPU stepper and compositor.

/// GLSL `smoothstep`. Works with `edge0 > edge1` the way GPU drivers evaluate it.
#[inline]
pub fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

#[inline]
pub fn mix(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_smoothstep_edges() {
        assert_eq!(smoothstep(0.0, 1.0, -1.0), 0.0);
        assert_eq!(smoothstep(0.0, 1.0, 2.0), 1.0);
        assert!((smoothstep(0.0, 1.0, 0.5) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_reversed_smoothstep_is_a_falloff() {
        let r = 0.12;
        assert_eq!(smoothstep(r, 0.0, 0.0), 1.0);
        assert_eq!(smoothstep(r, 0.0, r), 0.0);
        assert_eq!(smoothstep(r, 0.0, 0.5), 0.0);
        assert!(smoothstep(r, 0.0, 0.03) > smoothstep(r, 0.0, 0.09));
    }
}
