use std::time::{Duration, Instant};

/// Stopwatch measuring frame time. Paused time is not counted.
#[derive(Debug, Default)]
pub struct Timer {
    running_since: Option<Instant>,
    banked: Duration,
}

#[allow(dead_code)]
impl Timer {
    pub fn new() -> Timer {
        Timer::default()
    }

    pub fn is_running(&self) -> bool {
        self.running_since.is_some()
    }

    // Starts or resumes. Time banked by a pause is kept.
    pub fn start(&mut self) {
        if self.running_since.is_none() {
            self.running_since = Some(Instant::now());
        }
    }

    pub fn pause(&mut self) {
        if let Some(since) = self.running_since.take() {
            self.banked += since.elapsed();
        }
    }

    pub fn reset(&mut self) {
        self.running_since = None;
        self.banked = Duration::ZERO;
    }

    pub fn elapsed_duration(&self) -> Duration {
        match self.running_since {
            Some(since) => self.banked + since.elapsed(),
            None => self.banked,
        }
    }

    pub fn elapsed_ms(&self) -> u128 {
        self.elapsed_duration().as_millis()
    }

    pub fn elapsed_seconds_f32(&self) -> f32 {
        self.elapsed_duration().as_secs_f32()
    }

    /// Returns the time since the previous lap and keeps running.
    pub fn lap(&mut self) -> Duration {
        let elapsed = self.elapsed_duration();
        self.banked = Duration::ZERO;
        if self.running_since.is_some() {
            self.running_since = Some(Instant::now());
        }
        elapsed
    }
}
