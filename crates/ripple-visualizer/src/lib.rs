pub mod backend;
pub mod capability;
pub mod compositor;
pub mod fbo;
pub mod program;
pub mod scene;
pub mod shaders;
pub mod simulation;
pub mod state;

pub use backend::{GlBackend, GlSurface};
