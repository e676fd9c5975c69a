//! Headless front end for the workcell hub.
//!
//! ```bash
//! workcell_hub devices
//! workcell_hub run --protocol "High-Throughput Clone Screening" --samples 24 --tick-ms 100
//! workcell_hub test-device Centrifuge
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use workcell_hub::activity::describe;
use workcell_hub::config::{Settings, DEFAULT_CONFIG_PATH};
use workcell_hub::{RunEvent, WorkcellActor, WorkcellHandle};

#[derive(Parser, Debug)]
#[command(name = "workcell_hub", version, about = "Laboratory workcell control hub simulator")]
struct Cli {
    /// Configuration file
    #[arg(long = "config", value_name = "PATH", global = true)]
    config_path: Option<PathBuf>,
    /// Overrides the configured log level
    #[arg(long = "log-level", value_name = "LEVEL", global = true)]
    log_level: Option<String>,
    /// Emit JSON instead of text
    #[arg(long, global = true)]
    json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List devices and their initial status
    Devices,
    /// List available protocols and their steps
    Protocols,
    /// Run a protocol to completion
    Run {
        /// Protocol name
        #[arg(long)]
        protocol: String,
        /// Number of samples (1-96); defaults to the configured value
        #[arg(long)]
        samples: Option<u32>,
        /// Tick period in milliseconds; defaults to the configured value
        #[arg(long = "tick-ms")]
        tick_ms: Option<u64>,
        /// Trigger an emergency stop after this many completed steps
        #[arg(long = "stop-after-steps")]
        stop_after_steps: Option<usize>,
    },
    /// Exercise a single device
    TestDevice {
        /// Device name
        name: String,
        /// Tick period in milliseconds; defaults to the configured value
        #[arg(long = "tick-ms")]
        tick_ms: Option<u64>,
    },
    /// Print the effective configuration as TOML
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli
        .config_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    let mut settings = Settings::load_from(&config_path)
        .with_context(|| format!("load configuration from {}", config_path.display()))?;

    let level = cli
        .log_level
        .clone()
        .unwrap_or_else(|| settings.application.log_level.clone());
    workcell_hub::logging::init(&level, cli.json)?;
    info!(config = %config_path.display(), "configuration loaded");

    match cli.command {
        Command::Devices => {
            let runner = workcell_hub::ProtocolRunner::from_settings(&settings);
            let devices = runner.devices().snapshot();
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&devices)?);
            } else {
                for device in devices {
                    println!("{:<20} {:<8} {:>3}%", device.name, device.status, device.progress);
                }
            }
        }

        Command::Protocols => {
            let runner = workcell_hub::ProtocolRunner::from_settings(&settings);
            let protocols = runner.library().protocols();
            if cli.json {
                println!("{}", serde_json::to_string_pretty(protocols)?);
            } else {
                for protocol in protocols {
                    println!("{} ({} ticks)", protocol.name, protocol.total_ticks());
                    for (i, step) in protocol.steps.iter().enumerate() {
                        println!("  {}. {:<16} {} [{}]", i + 1, step.device, step.label, step.duration);
                    }
                }
            }
        }

        Command::Run {
            protocol,
            samples,
            tick_ms,
            stop_after_steps,
        } => {
            if let Some(ms) = tick_ms {
                settings.application.tick_interval_ms = ms.max(1);
            }
            let samples = samples.unwrap_or(settings.application.default_sample_count);
            run_protocol(&settings, &protocol, samples, stop_after_steps, cli.json).await?;
        }

        Command::TestDevice { name, tick_ms } => {
            if let Some(ms) = tick_ms {
                settings.application.tick_interval_ms = ms.max(1);
            }
            test_device(&settings, &name, cli.json).await?;
        }

        Command::Config => {
            print!("{}", settings.to_toml()?);
        }
    }

    Ok(())
}

fn spawn_actor(settings: &Settings) -> (WorkcellHandle, tokio::task::JoinHandle<()>) {
    WorkcellActor::new(settings).spawn(settings.application.command_channel_capacity)
}

fn print_event(event: &RunEvent, json: bool) -> Result<()> {
    if json {
        if !matches!(event, RunEvent::DeviceStatusChanged { .. }) {
            println!("{}", serde_json::to_string(event)?);
        }
        return Ok(());
    }
    for (level, message) in describe(event) {
        println!("{level:<8} {message}");
    }
    Ok(())
}

async fn run_protocol(
    settings: &Settings,
    protocol: &str,
    samples: u32,
    stop_after_steps: Option<usize>,
    json: bool,
) -> Result<()> {
    let (handle, task) = spawn_actor(settings);
    let mut events = handle.subscribe().await?;

    handle
        .start_protocol(protocol, samples)
        .await
        .with_context(|| format!("start protocol '{protocol}'"))?;

    let mut steps_done = 0usize;
    loop {
        tokio::select! {
            event = events.recv() => {
                let event = match event {
                    Ok(event) => event,
                    Err(RecvError::Lagged(n)) => {
                        warn!(skipped = n, "event subscriber lagged");
                        continue;
                    }
                    Err(RecvError::Closed) => break,
                };
                print_event(&event, json)?;
                match event {
                    RunEvent::StepCompleted { .. } => {
                        steps_done += 1;
                        if stop_after_steps.is_some_and(|n| steps_done >= n) {
                            handle.emergency_stop().await?;
                        }
                    }
                    RunEvent::RunCompleted { .. } | RunEvent::EmergencyStop { .. } => break,
                    _ => {}
                }
            }
            _ = tokio::signal::ctrl_c() => {
                warn!("interrupt received");
                handle.emergency_stop().await?;
            }
        }
    }

    let status = handle.run_status().await?;
    let samples = handle.samples().await?;
    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        println!("{}", serde_json::to_string_pretty(&samples)?);
    } else {
        println!();
        println!("State: {}  Progress: {}%", status.state, status.overall_progress);
        for sample in &samples {
            println!(
                "{}  {:<12} {:<16} {:<32} {}",
                sample.id,
                sample.kind,
                sample.location,
                sample.status,
                sample.timestamp.format("%H:%M:%S")
            );
        }
    }

    handle.shutdown().await?;
    task.await.context("workcell actor task failed")?;
    Ok(())
}

async fn test_device(settings: &Settings, name: &str, json: bool) -> Result<()> {
    let (handle, task) = spawn_actor(settings);
    let mut events = handle.subscribe().await?;

    handle
        .test_device(name)
        .await
        .with_context(|| format!("test device '{name}'"))?;

    loop {
        match events.recv().await {
            Ok(event) => {
                print_event(&event, json)?;
                if matches!(
                    event,
                    RunEvent::ExerciseCompleted { .. } | RunEvent::ExerciseCancelled { .. }
                ) {
                    break;
                }
            }
            Err(RecvError::Lagged(_)) => continue,
            Err(RecvError::Closed) => break,
        }
    }

    handle.shutdown().await?;
    task.await.context("workcell actor task failed")?;
    Ok(())
}
