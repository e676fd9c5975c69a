//! Notifications emitted by the protocol runner.
//!
//! Every state change a presentation layer cares about is reported as a
//! [`RunEvent`]: step transitions, device status changes and new sample
//! records. Events are queued inside the runner and drained by its owner
//! after each operation or tick, so they always arrive in the order the
//! changes happened.
//!
//! ```text
//! RunStarted
//!    ├── StepStarted ── DeviceStatusChanged (N per step) ── StepCompleted
//!    │                                                        └── SampleRecorded
//!    ├── RunPaused / RunResumed
//! RunCompleted | EmergencyStop
//! ```

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::device::DeviceStatus;
use crate::sample::Sample;

/// Runner notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    /// A new run began.
    RunStarted {
        /// Unique run identifier.
        run_id: Uuid,
        /// Protocol name.
        protocol: String,
        /// Samples processed by the run.
        sample_count: u32,
        /// Number of steps in the protocol.
        total_steps: usize,
    },
    /// A step's device was activated.
    StepStarted {
        /// Zero-based step index.
        index: usize,
        /// Number of steps in the protocol.
        total: usize,
        /// Device performing the step.
        device: String,
        /// Operation label.
        label: String,
    },
    /// A step ran its full duration.
    StepCompleted {
        /// Zero-based step index.
        index: usize,
        /// Number of steps in the protocol.
        total: usize,
        /// Device that performed the step.
        device: String,
        /// Operation label.
        label: String,
    },
    /// A sample record was appended.
    SampleRecorded(Sample),
    /// A sample's status changed.
    SampleUpdated {
        /// Sample id.
        id: String,
        /// New status.
        status: String,
    },
    /// The run was paused.
    RunPaused {
        /// Step the run is held at.
        step: usize,
    },
    /// The run was resumed.
    RunResumed {
        /// Step the run continues from.
        step: usize,
    },
    /// Every step finished.
    RunCompleted {
        /// Run identifier.
        run_id: Uuid,
        /// Protocol name.
        protocol: String,
        /// Samples processed by the run.
        sample_count: u32,
    },
    /// Emergency stop: all devices halted.
    EmergencyStop {
        /// Devices that were Active when the stop arrived.
        interrupted: Vec<String>,
        /// Whether a Running or Paused run was stopped.
        run_stopped: bool,
    },
    /// Stopped devices were returned to Ready before a new run.
    DevicesReset {
        /// Devices that were reset.
        devices: Vec<String>,
    },
    /// A device's status or progress changed.
    DeviceStatusChanged {
        /// Device name.
        device: String,
        /// New status.
        status: DeviceStatus,
        /// New progress, 0-100.
        progress: u8,
    },
    /// Milestone note for a running device exercise.
    DeviceProgress {
        /// Device name.
        device: String,
        /// Operation label.
        operation: String,
        /// Progress at the milestone.
        progress: u8,
    },
    /// A single-device exercise began.
    ExerciseStarted {
        /// Device name.
        device: String,
        /// Operation label.
        operation: String,
    },
    /// A protocol step took over a device that was being exercised.
    ExerciseCancelled {
        /// Device name.
        device: String,
        /// Operation label of the abandoned exercise.
        operation: String,
    },
    /// A single-device exercise finished.
    ExerciseCompleted {
        /// Device name.
        device: String,
        /// Operation label.
        operation: String,
    },
}

impl RunEvent {
    /// Short machine-readable name of the event kind.
    pub fn kind(&self) -> &'static str {
        match self {
            RunEvent::RunStarted { .. } => "run_started",
            RunEvent::StepStarted { .. } => "step_started",
            RunEvent::StepCompleted { .. } => "step_completed",
            RunEvent::SampleRecorded(_) => "sample_recorded",
            RunEvent::SampleUpdated { .. } => "sample_updated",
            RunEvent::RunPaused { .. } => "run_paused",
            RunEvent::RunResumed { .. } => "run_resumed",
            RunEvent::RunCompleted { .. } => "run_completed",
            RunEvent::EmergencyStop { .. } => "emergency_stop",
            RunEvent::DevicesReset { .. } => "devices_reset",
            RunEvent::DeviceStatusChanged { .. } => "device_status_changed",
            RunEvent::DeviceProgress { .. } => "device_progress",
            RunEvent::ExerciseStarted { .. } => "exercise_started",
            RunEvent::ExerciseCancelled { .. } => "exercise_cancelled",
            RunEvent::ExerciseCompleted { .. } => "exercise_completed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serialized_tag_matches_kind() {
        let event = RunEvent::StepStarted {
            index: 0,
            total: 6,
            device: "Transport Robot".into(),
            label: "Retrieving samples from storage".into(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], event.kind());
        assert_eq!(json["device"], "Transport Robot");
    }
}
