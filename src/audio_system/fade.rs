/// Stepped volume fades
///
/// A fade moves a handle's volume from `from` to `to` in a fixed number of
/// equal steps, one timer per step, so it can be cancelled between any two
/// steps and never runs on its own thread.
use std::time::Duration;

use super::timer::TimerId;

/// Default number of volume steps per fade
pub const DEFAULT_FADE_STEPS: u32 = 20;

/// Identity of one fade, carried by its step events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FadeId(pub u64);

/// An in-flight fade
#[derive(Debug, Clone, Copy)]
pub struct Fade {
    pub id: FadeId,
    pub from: f32,
    pub to: f32,
    pub steps: u32,
    /// Steps applied so far
    pub step: u32,
    /// Timer for the next step
    pub timer: TimerId,
}

impl Fade {
    /// Advance one step and return the volume to apply
    pub fn advance(&mut self) -> f32 {
        self.step = (self.step + 1).min(self.steps);
        self.volume_at(self.step)
    }

    pub fn volume_at(&self, step: u32) -> f32 {
        if self.steps == 0 {
            return self.to;
        }
        let t = step.min(self.steps) as f32 / self.steps as f32;
        (self.from + (self.to - self.from) * t).clamp(0.0, 1.0)
    }

    pub fn is_complete(&self) -> bool {
        self.step >= self.steps
    }

    /// Change the destination, keeping the remaining step count
    pub fn retarget(&mut self, to: f32) {
        let current = self.volume_at(self.step);
        let remaining = self.steps - self.step;
        self.from = current;
        self.to = to;
        self.steps = remaining;
        self.step = 0;
    }
}

/// Time between two steps of a fade lasting `duration`
pub fn step_interval(duration: Duration, steps: u32) -> Duration {
    duration / steps.max(1)
}
