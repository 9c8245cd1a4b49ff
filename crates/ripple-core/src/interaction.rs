//! Interaction tracker: turns pointer and touch events into a normalized
//! position, a decaying velocity and pressed/inactive flags.
//!
//! Events can be applied directly or posted from any thread through an
//! [`InputSender`]; queued events are applied when the frame drains the
//! queue. The stepper only ever sees an [`InteractionSnapshot`] copy.

use std::time::{Duration, Instant};

use crossbeam::channel::{bounded, Receiver, Sender, TrySendError};
use glam::Vec2;

use crate::config::WaterConfig;

/// Events queued beyond this are dropped. Pointer input is lossy anyway.
pub const INPUT_QUEUE_CAPACITY: usize = 256;

/// Pixel size of the element that pointer coordinates are relative to.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
}

impl Viewport {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    /// Pixel coordinates (origin top-left) to `[0, 1]²` with y pointing up.
    pub fn normalize(&self, x: f32, y: f32) -> Vec2 {
        let w = self.width.max(1.0);
        let h = self.height.max(1.0);
        Vec2::new((x / w).clamp(0.0, 1.0), (1.0 - y / h).clamp(0.0, 1.0))
    }
}

/// Raw device input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    PointerMoved { x: f32, y: f32, viewport: Viewport },
    PointerPressed,
    PointerReleased,
    TouchStarted { x: f32, y: f32, viewport: Viewport },
    TouchMoved { x: f32, y: f32, viewport: Viewport },
    TouchEnded,
}

/// Per-frame copy of the interaction state handed to the stepper.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InteractionSnapshot {
    pub position: Vec2,
    pub velocity: Vec2,
    pub pressed: bool,
    pub inactive: bool,
}

impl Default for InteractionSnapshot {
    fn default() -> Self {
        Self {
            position: Vec2::splat(0.5),
            velocity: Vec2::ZERO,
            pressed: false,
            inactive: false,
        }
    }
}

/// Cloneable handle for posting events from event handlers.
///
/// Once the owning tracker is detached every send is a silent no-op.
#[derive(Debug, Clone)]
pub struct InputSender {
    tx: Sender<InputEvent>,
}

impl InputSender {
    /// Queue an event. Returns false if it was dropped.
    pub fn send(&self, event: InputEvent) -> bool {
        match self.tx.try_send(event) {
            Ok(()) => true,
            Err(TrySendError::Full(_)) => {
                log::debug!("input queue full, dropping {:?}", event);
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }
}

pub struct InteractionTracker {
    position: Vec2,
    velocity: Vec2,
    pressed: bool,
    inactive: bool,
    last_interaction: Instant,
    /// An event arrived since the last `update`; the timer restarts there.
    touched: bool,
    inactivity_timeout: Duration,
    velocity_decay: f32,
    queue: Option<(Sender<InputEvent>, Receiver<InputEvent>)>,
}

impl InteractionTracker {
    pub fn new(config: &WaterConfig, now: Instant) -> Self {
        Self {
            position: Vec2::splat(0.5),
            velocity: Vec2::ZERO,
            pressed: false,
            inactive: false,
            last_interaction: now,
            touched: false,
            inactivity_timeout: timeout_duration(config.inactivity_timeout_secs),
            velocity_decay: config.velocity_decay,
            queue: Some(bounded(INPUT_QUEUE_CAPACITY)),
        }
    }

    /// Handle for posting events from elsewhere. `None` after [`detach`](Self::detach).
    pub fn input_sender(&self) -> Option<InputSender> {
        self.queue.as_ref().map(|(tx, _)| InputSender { tx: tx.clone() })
    }

    pub fn is_detached(&self) -> bool {
        self.queue.is_none()
    }

    /// Apply everything queued through [`InputSender`]s. Returns the count applied.
    pub fn drain(&mut self) -> usize {
        let events: Vec<InputEvent> = match &self.queue {
            Some((_, rx)) => rx.try_iter().collect(),
            None => return 0,
        };
        let count = events.len();
        for event in events {
            self.apply(event);
        }
        count
    }

    pub fn apply(&mut self, event: InputEvent) {
        match event {
            InputEvent::PointerMoved { x, y, viewport } => self.pointer_moved(x, y, viewport),
            InputEvent::PointerPressed => self.pointer_pressed(),
            InputEvent::PointerReleased => self.pointer_released(),
            InputEvent::TouchStarted { x, y, viewport } => self.touch_started(x, y, viewport),
            InputEvent::TouchMoved { x, y, viewport } => self.touch_moved(x, y, viewport),
            InputEvent::TouchEnded => self.touch_ended(),
        }
    }

    pub fn pointer_moved(&mut self, x: f32, y: f32, viewport: Viewport) {
        if self.is_detached() {
            return;
        }
        let next = viewport.normalize(x, y);
        self.velocity = next - self.position;
        self.position = next;
        self.mark_interaction();
    }

    pub fn pointer_pressed(&mut self) {
        if self.is_detached() {
            return;
        }
        self.pressed = true;
        self.mark_interaction();
    }

    pub fn pointer_released(&mut self) {
        if self.is_detached() {
            return;
        }
        self.pressed = false;
    }

    /// A touch jumps the position without producing a velocity spike.
    pub fn touch_started(&mut self, x: f32, y: f32, viewport: Viewport) {
        if self.is_detached() {
            return;
        }
        self.position = viewport.normalize(x, y);
        self.pressed = true;
        self.mark_interaction();
    }

    pub fn touch_moved(&mut self, x: f32, y: f32, viewport: Viewport) {
        self.pointer_moved(x, y, viewport);
    }

    pub fn touch_ended(&mut self) {
        self.pointer_released();
    }

    fn mark_interaction(&mut self) {
        self.touched = true;
        self.inactive = false;
    }

    /// Restart the inactivity timer if input arrived, then re-evaluate the idle flag.
    pub fn update(&mut self, now: Instant) {
        if self.touched {
            self.touched = false;
            self.last_interaction = now;
            self.inactive = false;
            return;
        }
        if now.saturating_duration_since(self.last_interaction) > self.inactivity_timeout {
            if !self.inactive {
                log::debug!("no input for {:?}, settling field", self.inactivity_timeout);
            }
            self.inactive = true;
        }
    }

    pub fn snapshot(&self) -> InteractionSnapshot {
        InteractionSnapshot {
            position: self.position,
            velocity: self.velocity,
            pressed: self.pressed,
            inactive: self.inactive,
        }
    }

    /// Decay the velocity toward zero. Called once per frame after the snapshot.
    pub fn end_frame(&mut self) {
        self.velocity *= self.velocity_decay;
    }

    /// Back to a centred, active, unpressed state with the timer restarted.
    pub fn reset(&mut self, now: Instant) {
        self.position = Vec2::splat(0.5);
        self.velocity = Vec2::ZERO;
        self.pressed = false;
        self.inactive = false;
        self.touched = false;
        self.last_interaction = now;
    }

    /// Stop accepting input. Outstanding senders become no-ops.
    pub fn detach(&mut self) {
        self.queue = None;
        self.pressed = false;
        self.velocity = Vec2::ZERO;
    }

    pub fn position(&self) -> Vec2 {
        self.position
    }

    pub fn velocity(&self) -> Vec2 {
        self.velocity
    }

    pub fn is_pressed(&self) -> bool {
        self.pressed
    }

    pub fn is_inactive(&self) -> bool {
        self.inactive
    }

    pub fn last_interaction(&self) -> Instant {
        self.last_interaction
    }
}

/// Non-finite or out-of-range timeouts saturate instead of panicking; NaN
/// and negatives mean "settle immediately".
fn timeout_duration(secs: f32) -> Duration {
    if secs.is_nan() || secs <= 0.0 {
        return Duration::ZERO;
    }
    Duration::try_from_secs_f32(secs).unwrap_or(Duration::MAX)
}
