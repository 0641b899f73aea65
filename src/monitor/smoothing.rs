use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PressureSample {
    pub pressure: f32,
    pub observed_at: Instant,
}

/// Direction the gauge is allowed to move freely in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    /// Falls are limited to one step per tick
    Rising,
    /// Rises are limited to one step per tick
    Falling,
    Free,
}

/// Turns bursty cuff pressure readings into a steady gauge value.
///
/// A reading is only eligible for display once it's been buffered for
/// `min_delay`, which absorbs single-sample transport glitches. Against the
/// current trend the displayed value moves at most `max_step` per tick.
#[derive(Debug, Clone)]
pub struct PressureSmoother {
    min_delay: Duration,
    max_step: f32,
    samples: Vec<PressureSample>,
    current: Option<f32>,
}

impl PressureSmoother {
    pub fn new(min_delay: Duration, max_step: f32) -> Self {
        Self {
            min_delay,
            max_step: max_step.max(0.0),
            samples: Vec::new(),
            current: None,
        }
    }

    pub fn push(&mut self, pressure: f32, observed_at: Instant) {
        self.samples.push(PressureSample {
            pressure,
            observed_at,
        });
    }

    pub fn samples(&self) -> &[PressureSample] {
        &self.samples
    }

    pub fn current(&self) -> Option<f32> {
        self.current
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.current = None;
    }

    /// Advances the displayed pressure. Returns the new value if it changed.
    pub fn tick(&mut self, now: Instant, trend: Trend) -> Option<f32> {
        let target = self
            .samples
            .iter()
            .filter(|s| now.saturating_duration_since(s.observed_at) >= self.min_delay)
            .max_by_key(|s| s.observed_at)?
            .pressure;
        let next = match self.current {
            None => target,
            Some(current) => match trend {
                Trend::Rising if target < current => target.max(current - self.max_step),
                Trend::Falling if target > current => target.min(current + self.max_step),
                _ => target,
            },
        };
        if self.current == Some(next) {
            return None;
        }
        self.current = Some(next);
        Some(next)
    }
}
