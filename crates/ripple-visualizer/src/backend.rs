use std::sync::Arc;

use glow::HasContext;
use ripple_core::{
    AllocationPlan, Capability, FrameFault, PhysicalSize, RenderBackend, StepInput, WaterConfig,
};

use crate::capability;
use crate::compositor::CompositePass;
use crate::program::FullscreenTriangle;
use crate::scene::ScenePass;
use crate::shaders::GlslTarget;
use crate::simulation::SimulationPass;
use crate::state::SavedGlState;

/// Handle the host draws the background through during a capture.
///
/// The capture framebuffer is bound and cleared when the host gets this;
/// any GL state the host changes is rolled back afterwards.
pub struct GlSurface {
    gl: Arc<glow::Context>,
    size: PhysicalSize,
}

impl GlSurface {
    pub fn gl(&self) -> &glow::Context {
        &self.gl
    }

    pub fn size(&self) -> PhysicalSize {
        self.size
    }
}

/// OpenGL 3.3 / GLES 3 execution of the water pipeline.
///
/// Shaders are compiled in the dialect of the live context, so an ES
/// context without float color buffers runs the bias-scaled 8-bit path.
///
/// The composite is drawn into whatever framebuffer the host has bound when
/// the frame starts.
pub struct GlBackend {
    gl: Arc<glow::Context>,
    triangle: Option<FullscreenTriangle>,
    simulation: Option<SimulationPass>,
    scene: Option<ScenePass>,
    composite: Option<CompositePass>,
    output: PhysicalSize,
}

impl GlBackend {
    pub fn new(gl: Arc<glow::Context>) -> Self {
        Self {
            gl,
            triangle: None,
            simulation: None,
            scene: None,
            composite: None,
            output: PhysicalSize { width: 1, height: 1 },
        }
    }

    pub fn gl(&self) -> &Arc<glow::Context> {
        &self.gl
    }

    pub fn simulation(&self) -> Option<&SimulationPass> {
        self.simulation.as_ref()
    }

    pub fn output_size(&self) -> PhysicalSize {
        self.output
    }

    fn build(&mut self, plan: &AllocationPlan, config: &WaterConfig) -> anyhow::Result<()> {
        let gl = &*self.gl;
        let target = GlslTarget::for_context(gl);
        self.triangle = Some(FullscreenTriangle::new(gl)?);
        self.simulation = Some(SimulationPass::new(gl, target, plan.field_resolution, plan.encoding, config)?);
        self.scene = Some(ScenePass::new(gl, plan.scene, config.scene.clear_color)?);
        self.composite = Some(CompositePass::new(gl, target, plan.encoding, &config.look)?);
        self.output = plan.output;
        unsafe { gl.bind_framebuffer(glow::FRAMEBUFFER, None) };
        Ok(())
    }
}

fn not_allocated(what: &str) -> FrameFault {
    FrameFault::transient(format!("{} not allocated", what))
}

/// Drain the GL error queue. A lost context wins over anything else queued.
fn take_errors(gl: &glow::Context) -> Result<(), FrameFault> {
    let mut first = None;
    // The queue is finite, but a lost context may keep reporting.
    for _ in 0..16 {
        let err = unsafe { gl.get_error() };
        match err {
            glow::NO_ERROR => break,
            glow::CONTEXT_LOST => return Err(FrameFault::ContextLost),
            other => {
                if first.is_none() {
                    first = Some(other);
                }
            }
        }
    }
    match first {
        Some(code) => Err(FrameFault::transient(format!("GL error 0x{:04X}", code))),
        None => Ok(()),
    }
}

/// Clear anything the host left queued so it is not blamed on this stage.
fn discard_host_errors(gl: &glow::Context) -> Result<(), FrameFault> {
    match take_errors(gl) {
        Err(FrameFault::Transient(msg)) => {
            log::debug!("ignoring pending host {}", msg);
            Ok(())
        }
        other => other,
    }
}

impl RenderBackend for GlBackend {
    type Surface = GlSurface;

    fn probe(&mut self) -> Capability {
        capability::probe(&self.gl)
    }

    fn allocate(&mut self, plan: &AllocationPlan, config: &WaterConfig) -> anyhow::Result<()> {
        self.release();
        if let Err(err) = self.build(plan, config) {
            self.release();
            return Err(err);
        }
        log::debug!(
            "gl backend allocated {}² {} field, {}x{} scene",
            plan.field_resolution,
            plan.encoding.name(),
            plan.scene.width,
            plan.scene.height
        );
        Ok(())
    }

    fn resize(&mut self, output: PhysicalSize, reallocate_scene: bool) -> Result<(), FrameFault> {
        let gl = &*self.gl;
        discard_host_errors(gl)?;
        if reallocate_scene {
            let scene = self.scene.as_mut().ok_or_else(|| not_allocated("scene capture"))?;
            let saved = unsafe { SavedGlState::save(gl) };
            let result = scene.resize(gl, output);
            unsafe { saved.restore(gl) };
            result.map_err(|e| FrameFault::transient(format!("{:#}", e)))?;
        }
        self.output = output;
        take_errors(gl)
    }

    fn simulate(&mut self, input: &StepInput) -> Result<(), FrameFault> {
        let gl = &*self.gl;
        let triangle = self.triangle.as_ref().ok_or_else(|| not_allocated("fullscreen triangle"))?;
        let simulation = self.simulation.as_mut().ok_or_else(|| not_allocated("simulation"))?;
        discard_host_errors(gl)?;

        unsafe {
            let saved = SavedGlState::save(gl);
            SavedGlState::prepare_pass(gl);
            simulation.render(gl, input, triangle);
            saved.restore(gl);
        }
        take_errors(gl)?;
        simulation.swap();
        Ok(())
    }

    fn capture_scene(&mut self, draw: &mut dyn FnMut(&mut GlSurface)) -> Result<(), FrameFault> {
        let gl = &*self.gl;
        let scene = self.scene.as_ref().ok_or_else(|| not_allocated("scene capture"))?;
        discard_host_errors(gl)?;

        let mut surface = GlSurface { gl: Arc::clone(&self.gl), size: scene.size() };
        unsafe {
            let saved = SavedGlState::save(gl);
            SavedGlState::prepare_pass(gl);
            scene.begin(gl);
            draw(&mut surface);
            saved.restore(gl);
        }
        take_errors(gl)
    }

    fn composite(&mut self, time: f32) -> Result<(), FrameFault> {
        let gl = &*self.gl;
        let triangle = self.triangle.as_ref().ok_or_else(|| not_allocated("fullscreen triangle"))?;
        let simulation = self.simulation.as_ref().ok_or_else(|| not_allocated("simulation"))?;
        let scene = self.scene.as_ref().ok_or_else(|| not_allocated("scene capture"))?;
        let composite = self.composite.as_ref().ok_or_else(|| not_allocated("composite"))?;
        discard_host_errors(gl)?;

        unsafe {
            let saved = SavedGlState::save(gl);
            SavedGlState::prepare_pass(gl);
            gl.bind_framebuffer(glow::FRAMEBUFFER, saved.framebuffer);
            gl.viewport(0, 0, self.output.width as i32, self.output.height as i32);
            composite.render(gl, simulation.read_texture(), scene.texture(), time, triangle);
            saved.restore(gl);
        }
        take_errors(gl)
    }

    fn release(&mut self) {
        let gl = &*self.gl;
        if let Some(composite) = self.composite.take() {
            composite.destroy(gl);
        }
        if let Some(scene) = self.scene.take() {
            scene.destroy(gl);
        }
        if let Some(simulation) = self.simulation.take() {
            simulation.destroy(gl);
        }
        if let Some(triangle) = self.triangle.take() {
            triangle.destroy(gl);
        }
    }

    fn live_resources(&self) -> usize {
        // Simulation holds a program and two targets.
        self.triangle.iter().count()
            + self.simulation.iter().count() * 3
            + self.scene.iter().count()
            + self.composite.iter().count()
    }
}

impl Drop for GlBackend {
    fn drop(&mut self) {
        self.release();
    }
}
