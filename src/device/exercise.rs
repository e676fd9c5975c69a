//! Single-device exercises ("test device").
//!
//! An exercise drives one device through a named operation over a fixed
//! number of ticks, independently of any protocol run.

use serde::{Deserialize, Serialize};

/// Outcome of advancing an exercise by one tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExerciseTick {
    /// Device progress after this tick, 0-100.
    pub progress: u8,
    /// True on the tick that first crosses the halfway mark.
    pub halfway: bool,
    /// True once the exercise has run its full duration.
    pub finished: bool,
}

/// An in-flight device exercise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceExercise {
    device: String,
    operation: String,
    elapsed: u32,
    duration: u32,
}

impl DeviceExercise {
    /// Start an exercise. A zero duration is treated as one tick.
    pub fn new(device: impl Into<String>, operation: impl Into<String>, duration: u32) -> Self {
        Self {
            device: device.into(),
            operation: operation.into(),
            elapsed: 0,
            duration: duration.max(1),
        }
    }

    /// Device being exercised.
    pub fn device(&self) -> &str {
        &self.device
    }

    /// Operation label.
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Advance one tick.
    pub fn advance(&mut self) -> ExerciseTick {
        if self.elapsed < self.duration {
            self.elapsed += 1;
        }
        let half = self.duration / 2;
        ExerciseTick {
            progress: percent(self.elapsed, self.duration),
            halfway: half > 0 && self.elapsed == half,
            finished: self.elapsed >= self.duration,
        }
    }
}

/// Integer percentage of `done` over `total`, saturating at 100.
pub(crate) fn percent(done: u32, total: u32) -> u8 {
    if total == 0 {
        return 100;
    }
    let pct = (u64::from(done) * 100) / u64::from(total);
    pct.min(100) as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exercise_runs_full_duration() {
        let mut ex = DeviceExercise::new("Centrifuge", "Spinning at 2000 RPM", 10);
        let ticks: Vec<_> = (0..10).map(|_| ex.advance()).collect();

        assert_eq!(ticks[0].progress, 10);
        assert!(ticks[4].halfway);
        assert_eq!(ticks.iter().filter(|t| t.halfway).count(), 1);
        assert!(!ticks[8].finished);
        assert!(ticks[9].finished);
        assert_eq!(ticks[9].progress, 100);
    }

    #[test]
    fn test_zero_duration_is_one_tick() {
        let mut ex = DeviceExercise::new("Incubator", "Temperature verification", 0);
        let tick = ex.advance();
        assert!(tick.finished);
        assert_eq!(tick.progress, 100);
    }

    #[test]
    fn test_percent() {
        assert_eq!(percent(0, 6), 0);
        assert_eq!(percent(1, 3), 33);
        assert_eq!(percent(5, 5), 100);
        assert_eq!(percent(9, 5), 100);
    }
}
