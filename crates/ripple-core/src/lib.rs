pub mod backend;
pub mod composite;
pub mod config;
pub mod cpu;
pub mod encoding;
pub mod field;
pub mod interaction;
pub mod math;
pub mod session;
pub mod stepper;

pub use backend::{AllocationPlan, FrameFault, PhysicalSize, RenderBackend, SurfaceSize};
pub use composite::{ColorBuffer, Compositor};
pub use config::{load_config, save_config, WaterConfig};
pub use cpu::CpuBackend;
pub use encoding::{Capability, StepperState, StorageEncoding};
pub use field::{FieldBuffers, FieldGrid, FieldSample};
pub use interaction::{InputEvent, InputSender, InteractionSnapshot, InteractionTracker, Viewport};
pub use session::{EffectSession, FrameClock, FrameReport, OverlayVisibility, SessionStatus};
pub use stepper::{idle_disturbance, Injection, SimulationStepper, StepInput};
