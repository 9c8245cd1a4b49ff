use crate::backend::{AllocationPlan, FrameFault, PhysicalSize, RenderBackend};
use crate::composite::{ColorBuffer, Compositor};
use crate::config::WaterConfig;
use crate::encoding::Capability;
use crate::field::FieldBuffers;
use crate::stepper::{SimulationStepper, StepInput};

/// Software backend: explicit double-buffered grid loop plus per-pixel compositing.
///
/// The host draws the background into a [`ColorBuffer`]; the composited
/// frame is read back with [`output`](Self::output).
pub struct CpuBackend {
    capability: Capability,
    clear_color: [f32; 4],
    stepper: Option<SimulationStepper>,
    compositor: Option<Compositor>,
    field: Option<FieldBuffers>,
    scene: Option<ColorBuffer>,
    output: Option<ColorBuffer>,
}

impl CpuBackend {
    /// Full-precision storage.
    pub fn new() -> Self {
        Self::with_capability(Capability::FULL)
    }

    /// Emulate a device with the given storage capability.
    pub fn with_capability(capability: Capability) -> Self {
        Self {
            capability,
            clear_color: [0.0, 0.0, 0.0, 1.0],
            stepper: None,
            compositor: None,
            field: None,
            scene: None,
            output: None,
        }
    }

    /// Change what the next `probe` reports, e.g. after a simulated device swap.
    pub fn set_capability(&mut self, capability: Capability) {
        self.capability = capability;
    }

    pub fn field(&self) -> Option<&FieldBuffers> {
        self.field.as_ref()
    }

    /// Direct field access for seeding a state.
    pub fn field_mut(&mut self) -> Option<&mut FieldBuffers> {
        self.field.as_mut()
    }

    pub fn scene(&self) -> Option<&ColorBuffer> {
        self.scene.as_ref()
    }

    pub fn output(&self) -> Option<&ColorBuffer> {
        self.output.as_ref()
    }

    pub fn compositor(&self) -> Option<&Compositor> {
        self.compositor.as_ref()
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn not_allocated(what: &str) -> FrameFault {
    FrameFault::transient(format!("{} buffer not allocated", what))
}

impl RenderBackend for CpuBackend {
    type Surface = ColorBuffer;

    fn probe(&mut self) -> Capability {
        self.capability
    }

    fn allocate(&mut self, plan: &AllocationPlan, config: &WaterConfig) -> anyhow::Result<()> {
        self.release();
        anyhow::ensure!(plan.field_resolution >= 2, "field resolution {} too small", plan.field_resolution);
        anyhow::ensure!(
            plan.scene.width > 0 && plan.scene.height > 0,
            "scene capture size {}x{} is empty",
            plan.scene.width,
            plan.scene.height
        );

        self.clear_color = config.scene.clear_color;
        self.stepper = Some(SimulationStepper::new(config));
        self.compositor = Some(Compositor::new(&config.look));
        self.field = Some(FieldBuffers::new(plan.field_resolution, plan.encoding));
        // Transparent until the first capture so compositing falls back to white.
        self.scene = Some(ColorBuffer::new(plan.scene.width, plan.scene.height, [0.0; 4]));
        self.output = Some(ColorBuffer::new(plan.output.width, plan.output.height, [0.0, 0.0, 0.0, 1.0]));

        log::debug!(
            "cpu backend allocated {}² field ({}), {}x{} scene",
            plan.field_resolution,
            plan.encoding.name(),
            plan.scene.width,
            plan.scene.height
        );
        Ok(())
    }

    fn resize(&mut self, output: PhysicalSize, reallocate_scene: bool) -> Result<(), FrameFault> {
        if self.output.is_none() {
            return Err(not_allocated("output"));
        }
        if reallocate_scene {
            self.scene = Some(ColorBuffer::new(output.width, output.height, [0.0; 4]));
        }
        self.output = Some(ColorBuffer::new(output.width, output.height, [0.0, 0.0, 0.0, 1.0]));
        Ok(())
    }

    fn simulate(&mut self, input: &StepInput) -> Result<(), FrameFault> {
        let stepper = self.stepper.as_ref().ok_or_else(|| not_allocated("stepper"))?;
        let field = self.field.as_mut().ok_or_else(|| not_allocated("field"))?;
        stepper.step(field, input);
        Ok(())
    }

    fn capture_scene(&mut self, draw: &mut dyn FnMut(&mut ColorBuffer)) -> Result<(), FrameFault> {
        let scene = self.scene.as_mut().ok_or_else(|| not_allocated("scene"))?;
        scene.fill(self.clear_color);
        draw(scene);
        Ok(())
    }

    fn composite(&mut self, time: f32) -> Result<(), FrameFault> {
        let compositor = self.compositor.as_ref().ok_or_else(|| not_allocated("compositor"))?;
        let field = self.field.as_ref().ok_or_else(|| not_allocated("field"))?;
        let scene = self.scene.as_ref().ok_or_else(|| not_allocated("scene"))?;
        let output = self.output.as_mut().ok_or_else(|| not_allocated("output"))?;
        compositor.render(field.read(), scene, time, output);
        Ok(())
    }

    fn release(&mut self) {
        self.stepper = None;
        self.compositor = None;
        self.field = None;
        self.scene = None;
        self.output = None;
    }

    fn live_resources(&self) -> usize {
        let field = if self.field.is_some() { 2 } else { 0 };
        field + self.scene.iter().count() + self.output.iter().count()
    }
}
