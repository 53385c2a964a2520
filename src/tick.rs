use tracing::trace;

use crate::utils::timer::Timer;

/// Anything advanced once per frame.
pub trait Updatable {
    fn tick(&mut self, dt: f32);
}

/// Drives a set of [`Updatable`]s with measured frame times.
pub struct FrameLoop {
    timer: Timer,
    frames: u64,
}

impl Default for FrameLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameLoop {
    pub fn new() -> Self {
        let mut timer = Timer::new();
        timer.start();
        Self { timer, frames: 0 }
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// Ticks every system with the time since the previous step.
    pub fn step(&mut self, systems: &mut [&mut dyn Updatable]) -> f32 {
        let dt = self.timer.lap().as_secs_f32();
        self.step_fixed(dt, systems);
        dt
    }

    /// Ticks every system with a caller-chosen `dt`.
    pub fn step_fixed(&mut self, dt: f32, systems: &mut [&mut dyn Updatable]) {
        self.frames += 1;
        trace!("Frame {} dt {:.4}", self.frames, dt);
        for system in systems.iter_mut() {
            system.tick(dt);
        }
    }

    pub fn pause(&mut self) {
        self.timer.pause();
    }

    pub fn resume(&mut self) {
        self.timer.start();
    }
}
