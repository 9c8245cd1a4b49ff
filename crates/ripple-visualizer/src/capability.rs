use std::collections::HashSet;

use glow::HasContext;
use ripple_core::Capability;

/// Extension names that make half-float color attachments renderable on
/// GLES and WebGL contexts.
const FLOAT_BUFFER_EXTENSIONS: [&str; 4] = [
    "GL_EXT_color_buffer_float",
    "EXT_color_buffer_float",
    "GL_EXT_color_buffer_half_float",
    "EXT_color_buffer_half_float",
];

/// Ask the live context whether float render targets are available.
pub fn probe(gl: &glow::Context) -> Capability {
    let version = gl.version();
    let capability = capability_from(version.is_embedded, version.major, gl.supported_extensions());
    log::debug!(
        "GL {}.{}{}: float color buffers {}",
        version.major,
        version.minor,
        if version.is_embedded { " ES" } else { "" },
        if capability.float_color_buffers { "available" } else { "unavailable" }
    );
    capability
}

/// Desktop GL 3+ renders to float textures natively; embedded contexts need an extension.
pub fn capability_from(embedded: bool, major: u32, extensions: &HashSet<String>) -> Capability {
    let float_color_buffers = if embedded {
        FLOAT_BUFFER_EXTENSIONS.iter().any(|ext| extensions.contains(*ext))
    } else {
        major >= 3
    };
    Capability { float_color_buffers }
}
