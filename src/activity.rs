//! Activity log shown alongside the workcell controls.
//!
//! A bounded, timestamped list of human-readable lines derived from
//! [`RunEvent`]s. Oldest entries are dropped once the capacity is reached.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

use crate::events::RunEvent;

/// Severity/category of an activity line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivityLevel {
    /// Routine information.
    Info,
    /// Something needs attention.
    Warning,
    /// Something went wrong or was aborted.
    Error,
    /// An operation finished.
    Success,
    /// A device action.
    Device,
}

impl fmt::Display for ActivityLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ActivityLevel::Info => "INFO",
            ActivityLevel::Warning => "WARNING",
            ActivityLevel::Error => "ERROR",
            ActivityLevel::Success => "SUCCESS",
            ActivityLevel::Device => "DEVICE",
        };
        f.pad(s)
    }
}

/// One line of the activity log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEntry {
    /// When the line was recorded.
    pub timestamp: DateTime<Local>,
    /// Category.
    pub level: ActivityLevel,
    /// Text.
    pub message: String,
}

impl fmt::Display for ActivityEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {}: {}",
            self.timestamp.format("%H:%M:%S"),
            self.level,
            self.message
        )
    }
}

/// Bounded activity log.
#[derive(Debug, Clone)]
pub struct ActivityLog {
    entries: VecDeque<ActivityEntry>,
    capacity: usize,
}

impl ActivityLog {
    /// Create a log retaining at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Append a line.
    pub fn push(&mut self, level: ActivityLevel, message: impl Into<String>) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(ActivityEntry {
            timestamp: Local::now(),
            level,
            message: message.into(),
        });
    }

    /// Append the lines describing `event`, if any.
    pub fn record_event(&mut self, event: &RunEvent) {
        for (level, message) in describe(event) {
            self.push(level, message);
        }
    }

    /// Entries, oldest first.
    pub fn entries(&self) -> impl Iterator<Item = &ActivityEntry> {
        self.entries.iter()
    }

    /// Owned copy of the entries, oldest first.
    pub fn snapshot(&self) -> Vec<ActivityEntry> {
        self.entries.iter().cloned().collect()
    }

    /// Number of retained entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Human-readable lines for an event. Per-tick device status changes produce
/// none.
pub fn describe(event: &RunEvent) -> Vec<(ActivityLevel, String)> {
    use ActivityLevel::*;

    match event {
        RunEvent::RunStarted {
            protocol,
            sample_count,
            ..
        } => vec![
            (Success, format!("Starting protocol: {protocol}")),
            (Info, format!("Processing {sample_count} samples")),
        ],
        RunEvent::StepStarted {
            index,
            total,
            device,
            label,
        } => vec![(Device, format!("Step {}/{}: {device} - {label}", index + 1, total))],
        RunEvent::StepCompleted { device, label, .. } => {
            vec![(Success, format!("{device}: {label} completed successfully"))]
        }
        RunEvent::SampleRecorded(sample) => vec![(
            Info,
            format!("Sample {} recorded at {} ({})", sample.id, sample.location, sample.kind),
        )],
        RunEvent::SampleUpdated { id, status } => {
            vec![(Info, format!("Sample {id} status set to {status}"))]
        }
        RunEvent::RunPaused { .. } => vec![(Warning, "Protocol paused by user".to_string())],
        RunEvent::RunResumed { .. } => vec![(Info, "Protocol resumed".to_string())],
        RunEvent::RunCompleted { .. } => {
            vec![(Success, "Protocol execution completed".to_string())]
        }
        RunEvent::EmergencyStop { .. } => vec![(Error, "EMERGENCY STOP ACTIVATED".to_string())],
        RunEvent::DevicesReset { devices } => vec![(
            Info,
            format!("Reset {} stopped device(s) to Ready", devices.len()),
        )],
        RunEvent::DeviceStatusChanged { .. } => Vec::new(),
        RunEvent::DeviceProgress {
            device,
            operation,
            progress,
        } => vec![(Info, format!("{device}: {operation} {progress}% complete"))],
        RunEvent::ExerciseStarted { device, operation } => {
            vec![(Device, format!("Starting {device}: {operation}"))]
        }
        RunEvent::ExerciseCancelled { device, operation } => vec![(
            Warning,
            format!("{device}: {operation} cancelled by protocol step"),
        )],
        RunEvent::ExerciseCompleted { device, operation } => {
            vec![(Success, format!("{device}: {operation} completed successfully"))]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceStatus;

    #[test]
    fn test_capacity_drops_oldest() {
        let mut log = ActivityLog::new(2);
        log.push(ActivityLevel::Info, "one");
        log.push(ActivityLevel::Info, "two");
        log.push(ActivityLevel::Info, "three");
        let messages: Vec<_> = log.entries().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, ["two", "three"]);
    }

    #[test]
    fn test_status_changes_are_not_logged() {
        let mut log = ActivityLog::new(10);
        log.record_event(&RunEvent::DeviceStatusChanged {
            device: "Centrifuge".into(),
            status: DeviceStatus::Active,
            progress: 30,
        });
        assert!(log.is_empty());
    }

    #[test]
    fn test_emergency_stop_line() {
        let mut log = ActivityLog::new(10);
        log.record_event(&RunEvent::EmergencyStop {
            interrupted: vec![],
            run_stopped: false,
        });
        let entry = log.entries().next().unwrap();
        assert_eq!(entry.level, ActivityLevel::Error);
        assert!(entry.to_string().ends_with("ERROR: EMERGENCY STOP ACTIVATED"));
    }

    #[test]
    fn test_exercise_cancelled_line() {
        let mut log = ActivityLog::new(10);
        log.record_event(&RunEvent::ExerciseCancelled {
            device: "Centrifuge".into(),
            operation: "Spinning at 2000 RPM".into(),
        });
        let entry = log.entries().next().unwrap();
        assert_eq!(entry.level, ActivityLevel::Warning);
        assert_eq!(entry.message, "Centrifuge: Spinning at 2000 RPM cancelled by protocol step");
    }

    #[test]
    fn test_clear() {
        let mut log = ActivityLog::new(10);
        log.push(ActivityLevel::Success, "done");
        log.clear();
        assert_eq!(log.len(), 0);
    }
}
