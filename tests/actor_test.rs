//! Integration tests for the workcell actor and its handle.

use tokio::sync::broadcast;
use workcell_hub::activity::ActivityLevel;
use workcell_hub::config::Settings;
use workcell_hub::device::DeviceStatus;
use workcell_hub::{RunEvent, RunState, WorkcellActor, WorkcellError, WorkcellHandle};

const CLONE_SCREENING: &str = "High-Throughput Clone Screening";

/// Settings whose interval never fires during a test, so only explicit
/// `tick()` calls advance the workcell.
fn manual_settings() -> Settings {
    let mut settings = Settings::default();
    settings.application.tick_interval_ms = 3_600_000;
    settings
}

fn spawn(settings: &Settings) -> (WorkcellHandle, tokio::task::JoinHandle<()>) {
    WorkcellActor::new(settings)
        .with_rng_seed(42)
        .spawn(settings.application.command_channel_capacity)
}

async fn ticks(handle: &WorkcellHandle, n: u32) {
    for _ in 0..n {
        handle.tick().await.unwrap();
    }
}

fn drain(rx: &mut broadcast::Receiver<RunEvent>) -> Vec<RunEvent> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}

#[tokio::test]
async fn test_start_and_complete_with_manual_ticks() {
    let (handle, task) = spawn(&manual_settings());

    handle.start_protocol(CLONE_SCREENING, 24).await.unwrap();
    let status = handle.run_status().await.unwrap();
    assert_eq!(status.state, RunState::Running);
    assert_eq!(status.total_steps, 6);

    ticks(&handle, 60).await;

    let status = handle.run_status().await.unwrap();
    assert_eq!(status.state, RunState::Completed);
    assert_eq!(status.overall_progress, 100);
    let devices = handle.devices().await.unwrap();
    assert!(devices.iter().all(|d| d.status != DeviceStatus::Active));
    assert_eq!(handle.samples().await.unwrap().len(), 6 + 24);

    handle.shutdown().await.unwrap();
    task.await.unwrap();
}

#[tokio::test]
async fn test_invalid_start_is_reported() {
    let (handle, task) = spawn(&manual_settings());

    let err = handle.start_protocol(CLONE_SCREENING, 0).await.unwrap_err();
    assert!(matches!(err, WorkcellError::InvalidSampleCount { .. }));
    let err = handle.start_protocol("Unknown", 4).await.unwrap_err();
    assert!(matches!(err, WorkcellError::UnknownProtocol(_)));

    assert_eq!(handle.run_status().await.unwrap().state, RunState::Idle);
    let log = handle.activity_log().await.unwrap();
    let errors = log.iter().filter(|e| e.level == ActivityLevel::Error).count();
    assert_eq!(errors, 2);

    handle.shutdown().await.unwrap();
    task.await.unwrap();
}

#[tokio::test]
async fn test_subscribers_see_run_events() {
    let (handle, task) = spawn(&manual_settings());
    let mut events = handle.subscribe().await.unwrap();

    handle.start_protocol(CLONE_SCREENING, 24).await.unwrap();
    ticks(&handle, 10).await;

    let kinds: Vec<_> = drain(&mut events).iter().map(RunEvent::kind).collect();
    assert_eq!(kinds.first(), Some(&"run_started"));
    assert!(kinds.contains(&"step_completed"));
    assert!(kinds.contains(&"sample_recorded"));
    assert_eq!(kinds.iter().filter(|k| **k == "step_started").count(), 2);

    handle.shutdown().await.unwrap();
    task.await.unwrap();
}

#[tokio::test]
async fn test_pause_resume_and_emergency_stop() {
    let (handle, task) = spawn(&manual_settings());

    assert!(handle.resume().await.is_err());
    handle.start_protocol(CLONE_SCREENING, 24).await.unwrap();
    ticks(&handle, 3).await;

    handle.pause().await.unwrap();
    ticks(&handle, 5).await;
    let status = handle.run_status().await.unwrap();
    assert_eq!(status.state, RunState::Paused);
    assert_eq!(status.step_progress, 30);

    handle.resume().await.unwrap();
    handle.tick().await.unwrap();
    assert_eq!(handle.run_status().await.unwrap().step_progress, 40);

    handle.emergency_stop().await.unwrap();
    let devices = handle.devices().await.unwrap();
    assert!(devices.iter().all(|d| d.status == DeviceStatus::Stopped));
    assert_eq!(handle.run_status().await.unwrap().state, RunState::Stopped);

    let log = handle.activity_log().await.unwrap();
    assert!(log
        .iter()
        .any(|e| e.level == ActivityLevel::Error && e.message.contains("EMERGENCY STOP")));

    handle.shutdown().await.unwrap();
    task.await.unwrap();
}

#[tokio::test]
async fn test_device_exercise_and_busy_warning() {
    let (handle, task) = spawn(&manual_settings());

    handle.test_device("Centrifuge").await.unwrap();
    let err = handle.test_device("Centrifuge").await.unwrap_err();
    assert!(matches!(err, WorkcellError::DeviceBusy(_)));
    assert!(matches!(
        handle.test_device("Autoclave").await,
        Err(WorkcellError::UnknownDevice(_))
    ));

    let stats = handle.statistics().await.unwrap();
    assert_eq!(stats.active_operations, 1);
    assert_eq!(stats.total_devices, 6);

    ticks(&handle, 10).await;
    let devices = handle.devices().await.unwrap();
    let centrifuge = devices.iter().find(|d| d.name == "Centrifuge").unwrap();
    assert_eq!(centrifuge.status, DeviceStatus::Ready);
    assert_eq!(centrifuge.progress, 100);

    let log = handle.activity_log().await.unwrap();
    assert!(log
        .iter()
        .any(|e| e.level == ActivityLevel::Warning && e.message.contains("already active")));

    handle.shutdown().await.unwrap();
    task.await.unwrap();
}

#[tokio::test]
async fn test_samples_and_statistics() {
    let (handle, task) = spawn(&manual_settings());

    let first = handle.add_sample().await.unwrap();
    let second = handle.add_sample().await.unwrap();
    assert_eq!(first.id, "S0001");
    assert_eq!(second.id, "S0002");

    handle.set_sample_status("S0002", "Archived").await.unwrap();
    assert!(matches!(
        handle.set_sample_status("S0099", "Lost").await,
        Err(WorkcellError::UnknownSample(_))
    ));
    let samples = handle.samples().await.unwrap();
    assert_eq!(samples[1].status, "Archived");

    ticks(&handle, 3).await;
    let stats = handle.statistics().await.unwrap();
    assert_eq!(stats.samples_tracked, 2);
    assert_eq!(stats.active_operations, 0);
    assert_eq!(stats.ticks, 3);

    handle.shutdown().await.unwrap();
    task.await.unwrap();
}

#[tokio::test]
async fn test_activity_log_startup_and_clear() {
    let (handle, task) = spawn(&manual_settings());

    let log = handle.activity_log().await.unwrap();
    assert_eq!(log.len(), 2);
    assert!(log[0].message.ends_with("initialized"));
    assert_eq!(log[1].message, "6 devices connected and ready");

    handle.clear_log().await.unwrap();
    assert!(handle.activity_log().await.unwrap().is_empty());

    handle.shutdown().await.unwrap();
    task.await.unwrap();
}

#[tokio::test]
async fn test_handle_fails_after_shutdown() {
    let (handle, task) = spawn(&manual_settings());
    handle.shutdown().await.unwrap();
    task.await.unwrap();

    let err = handle.devices().await.unwrap_err();
    assert!(matches!(err, WorkcellError::ActorUnavailable));
}

#[tokio::test]
async fn test_actor_stops_when_handles_dropped() {
    let (handle, task) = spawn(&manual_settings());
    drop(handle);
    task.await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_interval_drives_the_run() {
    let mut settings = Settings::default();
    settings.application.tick_interval_ms = 500;
    let (handle, task) = spawn(&settings);
    let mut events = handle.subscribe().await.unwrap();

    handle
        .start_protocol("Inter-Lab Sample Transfer", 8)
        .await
        .unwrap();

    let mut steps = 0;
    loop {
        match events.recv().await.unwrap() {
            RunEvent::StepCompleted { .. } => steps += 1,
            RunEvent::RunCompleted { sample_count, .. } => {
                assert_eq!(sample_count, 8);
                break;
            }
            _ => {}
        }
    }
    assert_eq!(steps, 6);

    let stats = handle.statistics().await.unwrap();
    assert!(stats.ticks >= 60);

    handle.shutdown().await.unwrap();
    task.await.unwrap();
}
