//! Protocol runner: the workcell state machine.
//!
//! The runner owns all mutable workcell state (device registry, sample
//! tracker, protocol library, the current run) and advances it one tick at a
//! time. It never spawns tasks or sleeps; whoever owns it decides when to
//! call [`ProtocolRunner::tick`].
//!
//! # Run lifecycle
//!
//! ```text
//!   Idle ──start──▶ Running ──(last step done)──▶ Completed
//!                    │  ▲
//!               pause│  │resume
//!                    ▼  │
//!                   Paused
//!
//!   Running | Paused ──stop──▶ Stopped
//! ```
//!
//! `Stopped` and `Completed` are terminal until the next `start`, which
//! replaces the run with a fresh one.
//!
//! Every rejected call leaves the runner exactly as it was.

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::Settings;
use crate::device::exercise::percent;
use crate::device::{DeviceExercise, DeviceRegistry, DeviceStatus};
use crate::error::{AppResult, WorkcellError};
use crate::events::RunEvent;
use crate::protocol::{Protocol, ProtocolLibrary};
use crate::sample::{Sample, SampleKind, SampleTracker};

/// Smallest number of samples a run accepts.
pub const MIN_SAMPLE_COUNT: u32 = 1;
/// Largest number of samples a run accepts (one 96-well plate).
pub const MAX_SAMPLE_COUNT: u32 = 96;

/// Exercise length used when none is configured.
const DEFAULT_EXERCISE_TICKS: u32 = 10;
/// Operation label used for devices without a configured test operation.
const DEFAULT_TEST_OPERATION: &str = "Running test";

/// Lifecycle state of a protocol run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    /// No run has started.
    Idle,
    /// Steps advance on every tick.
    Running,
    /// Held; ticks change nothing.
    Paused,
    /// Halted by an emergency stop.
    Stopped,
    /// All steps finished.
    Completed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RunState::Idle => "Idle",
            RunState::Running => "Running",
            RunState::Paused => "Paused",
            RunState::Stopped => "Stopped",
            RunState::Completed => "Completed",
        };
        f.pad(s)
    }
}

/// State of one protocol run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolRun {
    run_id: Uuid,
    protocol: Protocol,
    sample_count: u32,
    step_index: usize,
    step_elapsed: u32,
    completed_ticks: u32,
    state: RunState,
}

impl ProtocolRun {
    /// Unique id of this run.
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Protocol being run.
    pub fn protocol(&self) -> &Protocol {
        &self.protocol
    }

    /// Samples processed by the run.
    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    /// Index of the current step.
    pub fn step_index(&self) -> usize {
        self.step_index
    }

    /// Ticks spent in the current step.
    pub fn step_elapsed(&self) -> u32 {
        self.step_elapsed
    }

    /// Current lifecycle state.
    pub fn state(&self) -> RunState {
        self.state
    }

    fn overall_percent(&self) -> u8 {
        if self.state == RunState::Completed {
            return 100;
        }
        percent(self.completed_ticks, self.protocol.total_ticks())
    }
}

/// Point-in-time summary of the run for display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSnapshot {
    /// Run id, if a run has ever started.
    pub run_id: Option<Uuid>,
    /// Protocol name, if a run has ever started.
    pub protocol: Option<String>,
    /// Lifecycle state.
    pub state: RunState,
    /// Zero-based current step.
    pub step_index: Option<usize>,
    /// Steps in the protocol.
    pub total_steps: usize,
    /// Human-readable step line, e.g. `Step 2/6: Dispensing reagents`.
    pub step_label: Option<String>,
    /// Progress through the current step, 0-100.
    pub step_progress: u8,
    /// Progress through the whole protocol, 0-100.
    pub overall_progress: u8,
    /// Samples processed by the run.
    pub sample_count: u32,
    /// Sample records held by the tracker.
    pub samples_recorded: usize,
}

/// The workcell state machine.
#[derive(Debug)]
pub struct ProtocolRunner {
    devices: DeviceRegistry,
    samples: SampleTracker,
    library: ProtocolLibrary,
    test_operations: HashMap<String, String>,
    exercise_ticks: u32,
    exercises: Vec<DeviceExercise>,
    run: Option<ProtocolRun>,
    events: Vec<RunEvent>,
    rng: StdRng,
}

impl ProtocolRunner {
    /// Create a runner over an existing registry and library.
    pub fn new(devices: DeviceRegistry, library: ProtocolLibrary) -> Self {
        Self {
            devices,
            samples: SampleTracker::new(),
            library,
            test_operations: HashMap::new(),
            exercise_ticks: DEFAULT_EXERCISE_TICKS,
            exercises: Vec::new(),
            run: None,
            events: Vec::new(),
            rng: StdRng::from_entropy(),
        }
    }

    /// Create a runner from validated configuration.
    pub fn from_settings(settings: &Settings) -> Self {
        let mut runner = Self::new(
            DeviceRegistry::from_definitions(&settings.devices),
            ProtocolLibrary::from_settings(settings),
        )
        .with_exercise_ticks(settings.application.exercise_ticks);
        for def in &settings.devices {
            runner
                .test_operations
                .insert(def.name.clone(), def.test_operation.clone());
        }
        runner
    }

    /// Set how many ticks a device exercise takes.
    pub fn with_exercise_ticks(mut self, ticks: u32) -> Self {
        self.exercise_ticks = ticks.max(1);
        self
    }

    /// Use a fixed seed for randomly generated samples.
    pub fn with_rng_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Set the operation label used when `device` is exercised.
    pub fn with_test_operation(mut self, device: impl Into<String>, operation: impl Into<String>) -> Self {
        self.test_operations.insert(device.into(), operation.into());
        self
    }

    // ------------------------------------------------------------------
    // Run control
    // ------------------------------------------------------------------

    /// Start a protocol run.
    ///
    /// # Errors
    ///
    /// - `InvalidSampleCount` if `sample_count` is outside 1-96
    /// - `UnknownProtocol` if no steps are registered for `protocol`
    /// - `UnknownDevice` if a step names a device the registry lacks
    /// - `InvalidTransition` while another run is Running or Paused
    pub fn start(&mut self, protocol: &str, sample_count: u32) -> AppResult<Uuid> {
        if !(MIN_SAMPLE_COUNT..=MAX_SAMPLE_COUNT).contains(&sample_count) {
            return Err(WorkcellError::InvalidSampleCount {
                count: sample_count,
                min: MIN_SAMPLE_COUNT,
                max: MAX_SAMPLE_COUNT,
            });
        }

        let protocol = self
            .library
            .get(protocol)
            .cloned()
            .ok_or_else(|| WorkcellError::UnknownProtocol(protocol.to_string()))?;

        if let Some(missing) = protocol
            .steps
            .iter()
            .find(|s| !self.devices.contains(&s.device))
        {
            return Err(WorkcellError::UnknownDevice(missing.device.clone()));
        }

        let state = self.state();
        if matches!(state, RunState::Running | RunState::Paused) {
            return Err(WorkcellError::InvalidTransition {
                from: state,
                action: "start",
            });
        }

        let reset = self.devices.reset_stopped();
        if !reset.is_empty() {
            debug!(count = reset.len(), "returning stopped devices to ready");
            self.emit(RunEvent::DevicesReset { devices: reset });
        }

        let run_id = Uuid::new_v4();
        let mut run = ProtocolRun {
            run_id,
            protocol,
            sample_count,
            step_index: 0,
            step_elapsed: 0,
            completed_ticks: 0,
            state: RunState::Idle,
        };
        run.state = RunState::Running;

        info!(
            %run_id,
            protocol = %run.protocol.name,
            sample_count,
            steps = run.protocol.steps.len(),
            "protocol run started"
        );
        self.emit(RunEvent::RunStarted {
            run_id,
            protocol: run.protocol.name.clone(),
            sample_count,
            total_steps: run.protocol.steps.len(),
        });
        self.run = Some(run);
        self.begin_step(0);

        Ok(run_id)
    }

    /// Advance the simulation by one tick.
    ///
    /// Device exercises always advance. The protocol run advances only while
    /// Running.
    pub fn tick(&mut self) {
        self.tick_exercises();
        self.tick_run();
    }

    /// Hold a Running run.
    pub fn pause(&mut self) -> AppResult<()> {
        let step = self.transition(RunState::Running, RunState::Paused, "pause")?;
        info!(step, "protocol run paused");
        self.emit(RunEvent::RunPaused { step });
        Ok(())
    }

    /// Continue a Paused run from exactly where it was held.
    pub fn resume(&mut self) -> AppResult<()> {
        let step = self.transition(RunState::Paused, RunState::Running, "resume")?;
        info!(step, "protocol run resumed");
        self.emit(RunEvent::RunResumed { step });
        Ok(())
    }

    /// Emergency stop.
    ///
    /// Halts every device, cancels device exercises and moves a Running or
    /// Paused run to Stopped. Remaining steps are discarded; samples already
    /// recorded are kept.
    pub fn stop(&mut self) {
        let interrupted = self.devices.stop_all();
        self.exercises.clear();

        let run_stopped = match self.run.as_mut() {
            Some(run) if matches!(run.state, RunState::Running | RunState::Paused) => {
                run.state = RunState::Stopped;
                true
            }
            _ => false,
        };

        warn!(
            interrupted = interrupted.len(),
            run_stopped, "emergency stop activated"
        );
        let changes: Vec<_> = self
            .devices
            .get_all()
            .iter()
            .map(|d| RunEvent::DeviceStatusChanged {
                device: d.name.clone(),
                status: d.status,
                progress: d.progress,
            })
            .collect();
        self.events.extend(changes);
        self.emit(RunEvent::EmergencyStop {
            interrupted,
            run_stopped,
        });
    }

    // ------------------------------------------------------------------
    // Devices and samples
    // ------------------------------------------------------------------

    /// Exercise a single device with its configured test operation.
    ///
    /// # Errors
    ///
    /// `UnknownDevice` for an undefined name, `DeviceBusy` if the device is
    /// already Active.
    pub fn test_device(&mut self, name: &str) -> AppResult<()> {
        let device = self
            .devices
            .get(name)
            .ok_or_else(|| WorkcellError::UnknownDevice(name.to_string()))?;
        if device.is_active() {
            return Err(WorkcellError::DeviceBusy(name.to_string()));
        }

        let operation = self
            .test_operations
            .get(name)
            .cloned()
            .unwrap_or_else(|| DEFAULT_TEST_OPERATION.to_string());

        info!(device = name, %operation, "device exercise started");
        self.exercises
            .push(DeviceExercise::new(name, operation.clone(), self.exercise_ticks));
        self.update_device(name, DeviceStatus::Active, 0, Some(operation.clone()));
        self.emit(RunEvent::ExerciseStarted {
            device: name.to_string(),
            operation,
        });
        Ok(())
    }

    /// Record a manually added test sample.
    pub fn add_sample(&mut self) -> Sample {
        let sample = self.samples.record_random(&mut self.rng).clone();
        debug!(id = %sample.id, location = %sample.location, "sample added");
        self.emit(RunEvent::SampleRecorded(sample.clone()));
        sample
    }

    /// Change the status of a recorded sample.
    pub fn set_sample_status(&mut self, id: &str, status: &str) -> AppResult<()> {
        self.samples.set_status(id, status)?;
        self.emit(RunEvent::SampleUpdated {
            id: id.to_string(),
            status: status.to_string(),
        });
        Ok(())
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    /// Current run state (`Idle` before any run).
    pub fn state(&self) -> RunState {
        self.run.as_ref().map_or(RunState::Idle, |r| r.state)
    }

    /// The current or most recent run.
    pub fn current_run(&self) -> Option<&ProtocolRun> {
        self.run.as_ref()
    }

    /// Device registry.
    pub fn devices(&self) -> &DeviceRegistry {
        &self.devices
    }

    /// Sample tracker.
    pub fn samples(&self) -> &SampleTracker {
        &self.samples
    }

    /// Protocol library.
    pub fn library(&self) -> &ProtocolLibrary {
        &self.library
    }

    /// Number of device exercises in flight.
    pub fn exercises_in_flight(&self) -> usize {
        self.exercises.len()
    }

    /// Summary of the run for display.
    pub fn snapshot(&self) -> RunSnapshot {
        let samples_recorded = self.samples.len();
        let Some(run) = self.run.as_ref() else {
            return RunSnapshot {
                run_id: None,
                protocol: None,
                state: RunState::Idle,
                step_index: None,
                total_steps: 0,
                step_label: None,
                step_progress: 0,
                overall_progress: 0,
                sample_count: 0,
                samples_recorded,
            };
        };

        let total = run.protocol.steps.len();
        let (step_index, step_label, step_progress) = match run.state {
            RunState::Running | RunState::Paused => {
                let step = &run.protocol.steps[run.step_index];
                (
                    Some(run.step_index),
                    Some(format!("Step {}/{}: {}", run.step_index + 1, total, step.label)),
                    percent(run.step_elapsed, step.duration),
                )
            }
            RunState::Completed => (None, Some("Protocol completed successfully!".to_string()), 100),
            RunState::Stopped => (Some(run.step_index), Some("Protocol stopped".to_string()), 0),
            RunState::Idle => (None, None, 0),
        };

        RunSnapshot {
            run_id: Some(run.run_id),
            protocol: Some(run.protocol.name.clone()),
            state: run.state,
            step_index,
            total_steps: total,
            step_label,
            step_progress,
            overall_progress: run.overall_percent(),
            sample_count: run.sample_count,
            samples_recorded,
        }
    }

    /// Take every pending notification, oldest first.
    pub fn drain_events(&mut self) -> Vec<RunEvent> {
        std::mem::take(&mut self.events)
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn emit(&mut self, event: RunEvent) {
        self.events.push(event);
    }

    fn transition(&mut self, from: RunState, to: RunState, action: &'static str) -> AppResult<usize> {
        match self.run.as_mut() {
            Some(run) if run.state == from => {
                run.state = to;
                Ok(run.step_index)
            }
            other => Err(WorkcellError::InvalidTransition {
                from: other.map_or(RunState::Idle, |r| r.state),
                action,
            }),
        }
    }

    fn update_device(&mut self, name: &str, status: DeviceStatus, progress: u8, operation: Option<String>) {
        let result = self
            .devices
            .set_status(name, status, progress)
            .and_then(|()| self.devices.set_operation(name, operation));
        if let Err(e) = result {
            warn!(device = name, error = %e, "device update skipped");
            return;
        }
        self.emit(RunEvent::DeviceStatusChanged {
            device: name.to_string(),
            status,
            progress: progress.min(100),
        });
    }

    /// Activate the device for step `index` of the current run.
    fn begin_step(&mut self, index: usize) {
        let Some(run) = self.run.as_ref() else {
            return;
        };
        let total = run.protocol.steps.len();
        let step = run.protocol.steps[index].clone();

        // The protocol takes precedence over a manual exercise on the same device.
        if let Some(pos) = self.exercises.iter().position(|e| e.device() == step.device) {
            let cancelled = self.exercises.remove(pos);
            warn!(device = %step.device, operation = cancelled.operation(), "exercise cancelled by protocol step");
            self.emit(RunEvent::ExerciseCancelled {
                device: step.device.clone(),
                operation: cancelled.operation().to_string(),
            });
        }

        info!(step = index + 1, total, device = %step.device, label = %step.label, "step started");
        self.update_device(&step.device, DeviceStatus::Active, 0, Some(step.label.clone()));
        self.emit(RunEvent::StepStarted {
            index,
            total,
            device: step.device,
            label: step.label,
        });
    }

    fn tick_run(&mut self) {
        let Some(run) = self.run.as_mut() else {
            return;
        };
        if run.state != RunState::Running {
            return;
        }

        run.step_elapsed += 1;
        run.completed_ticks = run.completed_ticks.saturating_add(1);
        let index = run.step_index;
        let total = run.protocol.steps.len();
        let step = run.protocol.steps[index].clone();
        let progress = percent(run.step_elapsed, step.duration);

        if run.step_elapsed < step.duration {
            let halfway = run.step_elapsed == step.duration / 2;
            self.update_device(&step.device, DeviceStatus::Active, progress, Some(step.label.clone()));
            if halfway {
                self.emit(RunEvent::DeviceProgress {
                    device: step.device,
                    operation: step.label,
                    progress,
                });
            }
            return;
        }

        // Step finished.
        self.update_device(&step.device, DeviceStatus::Ready, 100, None);
        let sample = self
            .samples
            .record(SampleKind::AssayPlate, step.device.clone(), step.label.clone())
            .clone();
        info!(step = index + 1, total, device = %step.device, sample = %sample.id, "step completed");
        self.emit(RunEvent::StepCompleted {
            index,
            total,
            device: step.device,
            label: step.label,
        });
        self.emit(RunEvent::SampleRecorded(sample));

        let next = index + 1;
        if next < total {
            if let Some(run) = self.run.as_mut() {
                run.step_index = next;
                run.step_elapsed = 0;
            }
            self.begin_step(next);
        } else {
            self.complete_run();
        }
    }

    /// Finish the current run: record its processed samples, then report
    /// completion.
    fn complete_run(&mut self) {
        let Some(run) = self.run.as_mut() else {
            return;
        };
        run.state = RunState::Completed;
        let event = RunEvent::RunCompleted {
            run_id: run.run_id,
            protocol: run.protocol.name.clone(),
            sample_count: run.sample_count,
        };
        info!(run_id = %run.run_id, protocol = %run.protocol.name, samples = run.sample_count, "protocol run completed");

        for _ in 0..run.sample_count {
            let sample = self.samples.record_random(&mut self.rng).clone();
            self.events.push(RunEvent::SampleRecorded(sample));
        }
        self.emit(event);
    }

    fn tick_exercises(&mut self) {
        if self.exercises.is_empty() {
            return;
        }

        let mut updates = Vec::with_capacity(self.exercises.len());
        for exercise in &mut self.exercises {
            let tick = exercise.advance();
            updates.push((exercise.device().to_string(), exercise.operation().to_string(), tick));
        }
        self.exercises.retain(|e| {
            !updates
                .iter()
                .any(|(device, _, tick)| tick.finished && device == e.device())
        });

        for (device, operation, tick) in updates {
            if tick.finished {
                self.update_device(&device, DeviceStatus::Ready, 100, None);
                info!(device = %device, %operation, "device exercise completed");
                self.emit(RunEvent::ExerciseCompleted { device, operation });
                continue;
            }
            self.update_device(&device, DeviceStatus::Active, tick.progress, Some(operation.clone()));
            if tick.halfway {
                self.emit(RunEvent::DeviceProgress {
                    device,
                    operation,
                    progress: tick.progress,
                });
            }
        }
    }
}
