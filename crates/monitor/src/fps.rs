//! Frame-rate measurement

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Sliding-window FPS counter
#[derive(Debug, Clone)]
pub struct FpsCounter {
    window: Duration,
    ticks: VecDeque<Instant>,
}

impl FpsCounter {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            ticks: VecDeque::new(),
        }
    }

    /// Record a processed frame at `now` and return the current rate
    pub fn tick(&mut self, now: Instant) -> f64 {
        self.ticks.push_back(now);
        while let Some(&oldest) = self.ticks.front() {
            if now.saturating_duration_since(oldest) > self.window {
                self.ticks.pop_front();
            } else {
                break;
            }
        }
        self.fps()
    }

    /// Frames per second over the retained window
    pub fn fps(&self) -> f64 {
        match (self.ticks.front(), self.ticks.back()) {
            (Some(first), Some(last)) if self.ticks.len() > 1 => {
                let span = last.saturating_duration_since(*first).as_secs_f64();
                if span > 0.0 {
                    (self.ticks.len() - 1) as f64 / span
                } else {
                    0.0
                }
            }
            _ => 0.0,
        }
    }
}

impl Default for FpsCounter {
    fn default() -> Self {
        Self::new(Duration::from_secs(1))
    }
}
