use glow::HasContext;
use ripple_core::StorageEncoding;

/// Idle wave layers the simulation shader can evaluate.
pub const MAX_WAVE_LAYERS: usize = 4;

const VERSION_MARKER: &str = "{{VERSION}}";
const CODEC_MARKER: &str = "{{CODEC}}";
const LAYERS_MARKER: &str = "{{MAX_WAVE_LAYERS}}";

/// GLSL dialect a context compiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlslTarget {
    /// OpenGL 3.3 core.
    Desktop,
    /// GLES 3.0 / WebGL2.
    Embedded,
}

impl GlslTarget {
    pub fn for_context(gl: &glow::Context) -> Self {
        Self::from_embedded(gl.version().is_embedded)
    }

    pub fn from_embedded(embedded: bool) -> Self {
        if embedded {
            GlslTarget::Embedded
        } else {
            GlslTarget::Desktop
        }
    }

    /// First lines of every shader. ES has no default float precision in
    /// fragment shaders, and the field needs highp to hold small pressures.
    pub fn header(self) -> &'static str {
        match self {
            GlslTarget::Desktop => "#version 330 core\n",
            GlslTarget::Embedded => {
                "#version 300 es\n\
                 precision highp float;\n\
                 precision highp int;\n\
                 precision highp sampler2D;\n"
            }
        }
    }
}

// ── Fullscreen vertex shader ────────────────────────────────────────

// One oversized triangle generated from gl_VertexID; the visible part
// covers clip space exactly with uv in [0, 1].
const FULLSCREEN_VERTEX: &str = r#"{{VERSION}}
out vec2 v_uv;

void main() {
    vec2 corner = vec2(float((gl_VertexID << 1) & 2), float(gl_VertexID & 2));
    v_uv = corner;
    gl_Position = vec4(corner * 2.0 - 1.0, 0.0, 1.0);
}
"#;

// ── Simulation shader ───────────────────────────────────────────────

const SIMULATION_TEMPLATE: &str = r#"{{VERSION}}

in vec2 v_uv;

uniform sampler2D u_field;
uniform int u_resolution;
uniform float u_delta;
uniform float u_time;
uniform float u_weight;
uniform vec2 u_damping;      // velocity, pressure
uniform float u_active;      // 1.0 while idle waves run

uniform float u_inject;      // 1.0 when the pointer perturbs this step
uniform vec2 u_pointer;
uniform vec3 u_flow;         // xy = swipe direction, z = 1.0 when swiping
uniform vec4 u_force;        // radius, strength, speed, flow push
uniform vec2 u_turbulence;   // amount, frequency

const int MAX_WAVE_LAYERS = {{MAX_WAVE_LAYERS}};
uniform vec2 u_idle;         // amplitude, speed
uniform int u_layer_count;
uniform vec4 u_layers[MAX_WAVE_LAYERS]; // axis, frequency, speed factor, weight

out vec4 frag_color;

{{CODEC}}

ivec2 clamp_cell(ivec2 c) {
    return clamp(c, ivec2(0), ivec2(u_resolution - 1));
}

// Decoded (pressure, velocity) from the read grid.
vec2 load(ivec2 c) {
    vec4 s = texelFetch(u_field, clamp_cell(c), 0);
    return vec2(decode_value(s.r), decode_value(s.g));
}

float idle_waves(vec2 uv) {
    float sum = 0.0;
    for (int i = 0; i < MAX_WAVE_LAYERS; i++) {
        if (i >= u_layer_count) {
            break;
        }
        vec4 layer = u_layers[i];
        float coord = layer.x < 0.5 ? uv.x : (layer.x < 1.5 ? uv.y : uv.x + uv.y);
        sum += sin(coord * layer.y + u_time * u_idle.y * layer.z) * layer.w;
    }
    return sum * u_idle.x;
}

// (pressure, velocity) of cell c after this step.
vec2 advance(ivec2 c) {
    c = clamp_cell(c);
    vec2 here = load(c);
    float p = here.x;
    float v = here.y;

    float left = load(c + ivec2(-1, 0)).x;
    float right = load(c + ivec2(1, 0)).x;
    float up = load(c + ivec2(0, 1)).x;
    float down = load(c + ivec2(0, -1)).x;

    v += u_delta * (-2.0 * p + left + right) * u_weight;
    v += u_delta * (-2.0 * p + up + down) * u_weight;
    p += u_delta * v;

    v *= u_damping.x;
    p *= u_damping.y;

    vec2 uv = (vec2(c) + 0.5) / float(u_resolution);
    if (u_inject > 0.5) {
        vec2 to_pointer = uv - u_pointer;
        float dist = length(to_pointer);
        float radius = u_force.x;
        if (dist < radius) {
            float falloff = 1.0 - smoothstep(0.0, radius, dist);
            float along = dot(to_pointer, u_flow.xy);
            float trail = u_flow.z > 0.5 ? smoothstep(-radius * 0.5, radius * 1.5, -along) : 1.0;
            float turbulence = sin(uv.x * u_turbulence.y + u_time)
                * cos(uv.y * u_turbulence.y - u_time) * u_turbulence.x;
            float effect = falloff * trail * u_force.y * (1.0 + u_force.z);

            p += effect * (1.0 + turbulence);
            if (u_flow.z > 0.5) {
                v += effect * along * u_force.w;
            }
        }
    }

    if (u_active > 0.5) {
        p += idle_waves(uv);
    }

    if (VALUE_LIMIT > 0.0) {
        p = clamp(p, -VALUE_LIMIT, VALUE_LIMIT);
        v = clamp(v, -VALUE_LIMIT, VALUE_LIMIT);
    }
    return vec2(p, v);
}

void main() {
    ivec2 c = ivec2(gl_FragCoord.xy);
    vec2 here = advance(c);

    // Gradient of the pressure written this step, not the one read.
    float grad_x = (advance(c + ivec2(1, 0)).x - advance(c + ivec2(-1, 0)).x) * 0.5;
    float grad_y = (advance(c + ivec2(0, 1)).x - advance(c + ivec2(0, -1)).x) * 0.5;

    frag_color = encode_sample(vec4(here, grad_x, grad_y));
}
"#;

// ── Composite shader ────────────────────────────────────────────────

const COMPOSITE_TEMPLATE: &str = r#"{{VERSION}}

in vec2 v_uv;

uniform sampler2D u_field;
uniform sampler2D u_scene;
uniform float u_time;

uniform float u_distortion;
uniform float u_aberration;
uniform vec3 u_accent;
uniform vec3 u_water_tint;
uniform vec3 u_scatter_tint;
uniform float u_scatter_amount;
uniform vec3 u_light_dir;       // normalized
uniform float u_specular_power;
uniform float u_specular_strength;
uniform float u_pressure_strength;
uniform float u_caustics;       // 1.0 when enabled
uniform vec2 u_caustic;         // scale, strength

out vec4 frag_color;

{{CODEC}}

const float UV_MARGIN = 0.0001;

float caustic(vec2 uv, float depth) {
    float s = u_caustic.x;
    float c1 = sin(uv.x * s + u_time * 0.3) * sin(uv.y * s + u_time * 0.2);
    float c2 = sin(uv.x * s * 1.3 - u_time * 0.25) * sin(uv.y * s * 0.8 + u_time * 0.18);
    float c = smoothstep(-0.5, 0.5, (c1 + c2) * 0.5);
    return c * exp(-depth) * u_caustic.y;
}

void main() {
    vec4 s = texture(u_field, v_uv);
    float pressure = decode_value(s.r);
    vec2 grad = vec2(decode_value(s.b), decode_value(s.a));

    vec2 distortion = grad * u_distortion;
    vec2 distorted = v_uv + distortion;
    vec2 aberration = distortion * u_aberration / max(u_distortion, 0.001);

    vec4 center = texture(u_scene, clamp(distorted, UV_MARGIN, 1.0 - UV_MARGIN));
    vec4 offset = texture(u_scene, clamp(distorted + aberration, UV_MARGIN, 1.0 - UV_MARGIN));

    vec3 base = max(center.rgb, offset.rgb * u_accent);
    if (center.a < 0.01) {
        base = vec3(1.0);
    }

    vec3 normal = normalize(vec3(-grad.x, 0.1, -grad.y));
    float depth = abs(pressure) * 2.0 + 0.1;
    float spec = pow(max(dot(normal, u_light_dir), 0.0), u_specular_power) * exp(-depth * 0.5);
    float scatter = 1.0 - exp(-depth * 0.5);

    vec3 color = base * u_water_tint;
    color = mix(color, u_scatter_tint, scatter * u_scatter_amount);
    if (u_caustics > 0.5) {
        color += vec3(caustic(v_uv, depth) * 0.1);
    }
    color += vec3(spec * u_specular_strength);
    color += vec3(pressure * u_pressure_strength);

    frag_color = vec4(color, 1.0);
}
"#;

pub fn fullscreen_vertex(target: GlslTarget) -> String {
    FULLSCREEN_VERTEX.replace(VERSION_MARKER, target.header())
}

/// Simulation fragment source for one storage encoding.
pub fn simulation_fragment(encoding: StorageEncoding, target: GlslTarget) -> String {
    SIMULATION_TEMPLATE
        .replace(VERSION_MARKER, target.header())
        .replace(LAYERS_MARKER, &MAX_WAVE_LAYERS.to_string())
        .replace(CODEC_MARKER, encoding.glsl_codec())
}

/// Composite fragment source for one storage encoding.
pub fn composite_fragment(encoding: StorageEncoding, target: GlslTarget) -> String {
    COMPOSITE_TEMPLATE
        .replace(VERSION_MARKER, target.header())
        .replace(CODEC_MARKER, encoding.glsl_codec())
}
