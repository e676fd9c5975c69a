//! Actor-based workcell state management
//!
//! The [`WorkcellActor`] owns the [`ProtocolRunner`] and is the cooperative
//! scheduler that drives it. A single async task processes commands from an
//! mpsc channel and ticks on a fixed interval inside one `select!` loop, so a
//! user action can never run in the middle of a tick and no state is shared
//! behind a lock.
//!
//! Front ends talk to the actor through a cloneable [`WorkcellHandle`].

use std::ops::ControlFlow;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, trace};
use uuid::Uuid;

use crate::activity::{ActivityEntry, ActivityLevel, ActivityLog};
use crate::config::Settings;
use crate::device::Device;
use crate::error::{AppResult, WorkcellError};
use crate::events::RunEvent;
use crate::messages::{Statistics, WorkcellCommand};
use crate::runner::{ProtocolRunner, RunSnapshot};
use crate::sample::Sample;

/// Actor that owns all workcell state
pub struct WorkcellActor {
    runner: ProtocolRunner,
    activity: ActivityLog,
    events_tx: broadcast::Sender<RunEvent>,
    tick_interval: Duration,
    started: Instant,
    ticks: u64,
}

impl WorkcellActor {
    /// Creates a new actor from configuration
    pub fn new(settings: &Settings) -> Self {
        Self::with_runner(ProtocolRunner::from_settings(settings), settings)
    }

    /// Creates an actor around an existing runner, taking timing and
    /// capacities from `settings`
    pub fn with_runner(runner: ProtocolRunner, settings: &Settings) -> Self {
        let app = &settings.application;
        let (events_tx, _) = broadcast::channel(app.event_channel_capacity);
        let mut activity = ActivityLog::new(app.activity_log_capacity);
        activity.push(ActivityLevel::Success, format!("{} initialized", app.name));
        activity.push(
            ActivityLevel::Info,
            format!("{} devices connected and ready", runner.devices().len()),
        );

        Self {
            runner,
            activity,
            events_tx,
            tick_interval: Duration::from_millis(app.tick_interval_ms.max(1)),
            started: Instant::now(),
            ticks: 0,
        }
    }

    /// Use a fixed seed for manually added samples
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.runner = self.runner.with_rng_seed(seed);
        self
    }

    /// Spawn the actor on the current Tokio runtime.
    ///
    /// Returns a handle for sending commands and the join handle of the task.
    pub fn spawn(self, command_capacity: usize) -> (WorkcellHandle, JoinHandle<()>) {
        let (command_tx, command_rx) = mpsc::channel(command_capacity.max(1));
        let task = tokio::spawn(self.run(command_rx));
        (WorkcellHandle { command_tx }, task)
    }

    /// Runs the actor event loop until shutdown or until every handle is dropped
    pub async fn run(mut self, mut command_rx: mpsc::Receiver<WorkcellCommand>) {
        info!(tick_interval = ?self.tick_interval, "WorkcellActor started");

        let mut interval = tokio::time::interval_at(Instant::now() + self.tick_interval, self.tick_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;

                command = command_rx.recv() => {
                    let Some(command) = command else {
                        info!("Command channel closed");
                        break;
                    };
                    let flow = self.handle_command(command);
                    self.publish_events();
                    if flow.is_break() {
                        break;
                    }
                }

                _ = interval.tick() => {
                    self.tick();
                }
            }
        }

        info!(ticks = self.ticks, "WorkcellActor shutting down");
    }

    fn handle_command(&mut self, command: WorkcellCommand) -> ControlFlow<()> {
        match command {
            WorkcellCommand::StartProtocol {
                protocol,
                sample_count,
                response,
            } => {
                let result = self.runner.start(&protocol, sample_count);
                if let Err(e) = &result {
                    self.activity.push(ActivityLevel::Error, e.to_string());
                }
                let _ = response.send(result);
            }

            WorkcellCommand::Pause { response } => {
                let _ = response.send(self.runner.pause());
            }

            WorkcellCommand::Resume { response } => {
                let _ = response.send(self.runner.resume());
            }

            WorkcellCommand::EmergencyStop { response } => {
                self.runner.stop();
                let _ = response.send(());
            }

            WorkcellCommand::TestDevice { device, response } => {
                let result = self.runner.test_device(&device);
                if let Err(WorkcellError::DeviceBusy(name)) = &result {
                    self.activity
                        .push(ActivityLevel::Warning, format!("{name} is already active"));
                }
                let _ = response.send(result);
            }

            WorkcellCommand::AddSample { response } => {
                let sample = self.runner.add_sample();
                let _ = response.send(sample);
            }

            WorkcellCommand::SetSampleStatus {
                id,
                status,
                response,
            } => {
                let _ = response.send(self.runner.set_sample_status(&id, &status));
            }

            WorkcellCommand::GetDevices { response } => {
                let _ = response.send(self.runner.devices().snapshot());
            }

            WorkcellCommand::GetSamples { response } => {
                let _ = response.send(self.runner.samples().all().to_vec());
            }

            WorkcellCommand::GetRunStatus { response } => {
                let _ = response.send(self.runner.snapshot());
            }

            WorkcellCommand::GetStatistics { response } => {
                let _ = response.send(self.statistics());
            }

            WorkcellCommand::GetActivityLog { response } => {
                let _ = response.send(self.activity.snapshot());
            }

            WorkcellCommand::ClearLog { response } => {
                self.activity.clear();
                let _ = response.send(());
            }

            WorkcellCommand::Subscribe { response } => {
                let _ = response.send(self.events_tx.subscribe());
            }

            WorkcellCommand::Tick { response } => {
                self.tick();
                let _ = response.send(());
            }

            WorkcellCommand::Shutdown { response } => {
                info!("Shutdown command received");
                let _ = response.send(());
                return ControlFlow::Break(());
            }
        }
        ControlFlow::Continue(())
    }

    fn tick(&mut self) {
        self.ticks += 1;
        trace!(tick = self.ticks, "tick");
        self.runner.tick();
        self.publish_events();
    }

    fn statistics(&self) -> Statistics {
        Statistics {
            total_devices: self.runner.devices().len(),
            active_operations: self.runner.devices().active_count(),
            samples_tracked: self.runner.samples().len(),
            ticks: self.ticks,
            uptime: self.started.elapsed(),
        }
    }

    /// Drain runner events into the activity log and out to subscribers.
    fn publish_events(&mut self) {
        for event in self.runner.drain_events() {
            debug!(kind = event.kind(), "run event");
            self.activity.record_event(&event);
            // No subscribers is fine.
            let _ = self.events_tx.send(event);
        }
    }
}

/// Cloneable front-end handle to a running [`WorkcellActor`]
#[derive(Debug, Clone)]
pub struct WorkcellHandle {
    command_tx: mpsc::Sender<WorkcellCommand>,
}

impl WorkcellHandle {
    async fn request<T>(&self, (command, rx): (WorkcellCommand, oneshot::Receiver<T>)) -> AppResult<T> {
        self.command_tx
            .send(command)
            .await
            .map_err(|_| WorkcellError::ActorUnavailable)?;
        rx.await.map_err(|_| WorkcellError::ActorUnavailable)
    }

    /// Start a protocol run
    pub async fn start_protocol(&self, protocol: &str, sample_count: u32) -> AppResult<Uuid> {
        self.request(WorkcellCommand::start_protocol(protocol.to_string(), sample_count))
            .await?
    }

    /// Pause the running protocol
    pub async fn pause(&self) -> AppResult<()> {
        self.request(WorkcellCommand::pause()).await?
    }

    /// Resume a paused protocol
    pub async fn resume(&self) -> AppResult<()> {
        self.request(WorkcellCommand::resume()).await?
    }

    /// Halt every device and stop the run
    pub async fn emergency_stop(&self) -> AppResult<()> {
        self.request(WorkcellCommand::emergency_stop()).await
    }

    /// Exercise a single device
    pub async fn test_device(&self, device: &str) -> AppResult<()> {
        self.request(WorkcellCommand::test_device(device.to_string()))
            .await?
    }

    /// Add a manual test sample
    pub async fn add_sample(&self) -> AppResult<Sample> {
        self.request(WorkcellCommand::add_sample()).await
    }

    /// Change a sample's status
    pub async fn set_sample_status(&self, id: &str, status: &str) -> AppResult<()> {
        self.request(WorkcellCommand::set_sample_status(
            id.to_string(),
            status.to_string(),
        ))
        .await?
    }

    /// Snapshot of every device
    pub async fn devices(&self) -> AppResult<Vec<Device>> {
        self.request(WorkcellCommand::get_devices()).await
    }

    /// Every tracked sample
    pub async fn samples(&self) -> AppResult<Vec<Sample>> {
        self.request(WorkcellCommand::get_samples()).await
    }

    /// Run summary
    pub async fn run_status(&self) -> AppResult<RunSnapshot> {
        self.request(WorkcellCommand::get_run_status()).await
    }

    /// Statistics panel figures
    pub async fn statistics(&self) -> AppResult<Statistics> {
        self.request(WorkcellCommand::get_statistics()).await
    }

    /// Activity log contents
    pub async fn activity_log(&self) -> AppResult<Vec<ActivityEntry>> {
        self.request(WorkcellCommand::get_activity_log()).await
    }

    /// Empty the activity log
    pub async fn clear_log(&self) -> AppResult<()> {
        self.request(WorkcellCommand::clear_log()).await
    }

    /// Subscribe to runner notifications
    pub async fn subscribe(&self) -> AppResult<broadcast::Receiver<RunEvent>> {
        self.request(WorkcellCommand::subscribe()).await
    }

    /// Advance one tick immediately
    pub async fn tick(&self) -> AppResult<()> {
        self.request(WorkcellCommand::tick()).await
    }

    /// Stop the actor
    pub async fn shutdown(&self) -> AppResult<()> {
        self.request(WorkcellCommand::shutdown()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[tokio::test]
    #[traced_test]
    async fn test_run_logs_interval_and_stops_on_closed_channel() {
        let mut settings = Settings::default();
        settings.application.tick_interval_ms = 250;
        let (command_tx, command_rx) = mpsc::channel(1);
        drop(command_tx);

        WorkcellActor::new(&settings).run(command_rx).await;

        assert!(logs_contain("tick_interval=250ms"));
        assert!(logs_contain("Command channel closed"));
    }
}
