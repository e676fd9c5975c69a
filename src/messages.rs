//! Message types for actor-based communication
//!
//! This module defines the command types used for message-passing between a
//! front end and the [`WorkcellActor`](crate::app_actor::WorkcellActor). Every
//! command carries a oneshot sender for its reply, so callers never touch the
//! workcell state directly.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{broadcast, oneshot};
use uuid::Uuid;

use crate::activity::ActivityEntry;
use crate::device::Device;
use crate::error::AppResult;
use crate::events::RunEvent;
use crate::runner::RunSnapshot;
use crate::sample::Sample;

/// Summary figures for the statistics panel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    /// Devices in the workcell.
    pub total_devices: usize,
    /// Devices currently Active.
    pub active_operations: usize,
    /// Samples tracked this session.
    pub samples_tracked: usize,
    /// Ticks processed since the actor started.
    pub ticks: u64,
    /// Time since the actor started.
    #[serde(with = "humantime_serde")]
    pub uptime: Duration,
}

/// Commands that can be sent to the WorkcellActor
#[derive(Debug)]
pub enum WorkcellCommand {
    /// Start a protocol run
    StartProtocol {
        protocol: String,
        sample_count: u32,
        response: oneshot::Sender<AppResult<Uuid>>,
    },

    /// Pause the running protocol
    Pause {
        response: oneshot::Sender<AppResult<()>>,
    },

    /// Resume a paused protocol
    Resume {
        response: oneshot::Sender<AppResult<()>>,
    },

    /// Halt every device and stop the run
    EmergencyStop { response: oneshot::Sender<()> },

    /// Exercise a single device
    TestDevice {
        device: String,
        response: oneshot::Sender<AppResult<()>>,
    },

    /// Add a manual test sample
    AddSample { response: oneshot::Sender<Sample> },

    /// Change a sample's status
    SetSampleStatus {
        id: String,
        status: String,
        response: oneshot::Sender<AppResult<()>>,
    },

    /// Snapshot of every device
    GetDevices {
        response: oneshot::Sender<Vec<Device>>,
    },

    /// Every tracked sample
    GetSamples {
        response: oneshot::Sender<Vec<Sample>>,
    },

    /// Run summary
    GetRunStatus {
        response: oneshot::Sender<RunSnapshot>,
    },

    /// Statistics panel figures
    GetStatistics {
        response: oneshot::Sender<Statistics>,
    },

    /// Activity log contents
    GetActivityLog {
        response: oneshot::Sender<Vec<ActivityEntry>>,
    },

    /// Empty the activity log
    ClearLog { response: oneshot::Sender<()> },

    /// Subscribe to runner notifications
    Subscribe {
        response: oneshot::Sender<broadcast::Receiver<RunEvent>>,
    },

    /// Advance one tick immediately, outside the interval
    Tick { response: oneshot::Sender<()> },

    /// Stop the actor
    Shutdown { response: oneshot::Sender<()> },
}

impl WorkcellCommand {
    /// Helper to create a StartProtocol command
    pub fn start_protocol(
        protocol: String,
        sample_count: u32,
    ) -> (Self, oneshot::Receiver<AppResult<Uuid>>) {
        let (tx, rx) = oneshot::channel();
        (
            Self::StartProtocol {
                protocol,
                sample_count,
                response: tx,
            },
            rx,
        )
    }

    /// Helper to create a Pause command
    pub fn pause() -> (Self, oneshot::Receiver<AppResult<()>>) {
        let (tx, rx) = oneshot::channel();
        (Self::Pause { response: tx }, rx)
    }

    /// Helper to create a Resume command
    pub fn resume() -> (Self, oneshot::Receiver<AppResult<()>>) {
        let (tx, rx) = oneshot::channel();
        (Self::Resume { response: tx }, rx)
    }

    /// Helper to create an EmergencyStop command
    pub fn emergency_stop() -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        (Self::EmergencyStop { response: tx }, rx)
    }

    /// Helper to create a TestDevice command
    pub fn test_device(device: String) -> (Self, oneshot::Receiver<AppResult<()>>) {
        let (tx, rx) = oneshot::channel();
        (Self::TestDevice { device, response: tx }, rx)
    }

    /// Helper to create an AddSample command
    pub fn add_sample() -> (Self, oneshot::Receiver<Sample>) {
        let (tx, rx) = oneshot::channel();
        (Self::AddSample { response: tx }, rx)
    }

    /// Helper to create a SetSampleStatus command
    pub fn set_sample_status(id: String, status: String) -> (Self, oneshot::Receiver<AppResult<()>>) {
        let (tx, rx) = oneshot::channel();
        (
            Self::SetSampleStatus {
                id,
                status,
                response: tx,
            },
            rx,
        )
    }

    /// Helper to create a GetDevices command
    pub fn get_devices() -> (Self, oneshot::Receiver<Vec<Device>>) {
        let (tx, rx) = oneshot::channel();
        (Self::GetDevices { response: tx }, rx)
    }

    /// Helper to create a GetSamples command
    pub fn get_samples() -> (Self, oneshot::Receiver<Vec<Sample>>) {
        let (tx, rx) = oneshot::channel();
        (Self::GetSamples { response: tx }, rx)
    }

    /// Helper to create a GetRunStatus command
    pub fn get_run_status() -> (Self, oneshot::Receiver<RunSnapshot>) {
        let (tx, rx) = oneshot::channel();
        (Self::GetRunStatus { response: tx }, rx)
    }

    /// Helper to create a GetStatistics command
    pub fn get_statistics() -> (Self, oneshot::Receiver<Statistics>) {
        let (tx, rx) = oneshot::channel();
        (Self::GetStatistics { response: tx }, rx)
    }

    /// Helper to create a GetActivityLog command
    pub fn get_activity_log() -> (Self, oneshot::Receiver<Vec<ActivityEntry>>) {
        let (tx, rx) = oneshot::channel();
        (Self::GetActivityLog { response: tx }, rx)
    }

    /// Helper to create a ClearLog command
    pub fn clear_log() -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        (Self::ClearLog { response: tx }, rx)
    }

    /// Helper to create a Subscribe command
    pub fn subscribe() -> (Self, oneshot::Receiver<broadcast::Receiver<RunEvent>>) {
        let (tx, rx) = oneshot::channel();
        (Self::Subscribe { response: tx }, rx)
    }

    /// Helper to create a Tick command
    pub fn tick() -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        (Self::Tick { response: tx }, rx)
    }

    /// Helper to create a Shutdown command
    pub fn shutdown() -> (Self, oneshot::Receiver<()>) {
        let (tx, rx) = oneshot::channel();
        (Self::Shutdown { response: tx }, rx)
    }
}
