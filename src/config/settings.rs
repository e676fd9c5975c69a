//! Workcell configuration using Figment
//!
//! Configuration is layered, lowest to highest precedence:
//! 1. Built-in defaults (the six standard workcell devices and protocols)
//! 2. A TOML file (default: `config/workcell.toml`, optional)
//! 3. Environment variables prefixed with `WORKCELL_`
//!
//! Nested keys are separated by a double underscore in environment variables:
//!
//! ```text
//! WORKCELL_APPLICATION__LOG_LEVEL=debug
//! WORKCELL_APPLICATION__TICK_INTERVAL_MS=100
//! ```

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

use crate::runner::{MAX_SAMPLE_COUNT, MIN_SAMPLE_COUNT};

/// Default location of the configuration file.
pub const DEFAULT_CONFIG_PATH: &str = "config/workcell.toml";

/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "WORKCELL_";

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Figment failed to read or deserialize a provider.
    #[error("Configuration load error: {0}")]
    LoadError(#[from] Box<figment::Error>),
    /// The configuration parsed but is logically invalid.
    #[error("Configuration validation error: {0}")]
    ValidationError(String),
}

/// Top-level workcell configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// Application settings
    #[serde(default)]
    pub application: ApplicationConfig,
    /// Devices present in the workcell, in display order
    #[serde(default = "default_devices")]
    pub devices: Vec<DeviceDefinition>,
    /// Canned protocols available to the runner
    #[serde(default = "default_protocols")]
    pub protocols: Vec<ProtocolDefinition>,
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApplicationConfig {
    /// Application name
    #[serde(default = "default_name")]
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Period of the scheduler tick in milliseconds
    #[serde(default = "default_tick_interval")]
    pub tick_interval_ms: u64,
    /// Capacity of the actor command channel
    #[serde(default = "default_command_capacity")]
    pub command_channel_capacity: usize,
    /// Capacity of the event broadcast channel
    #[serde(default = "default_event_capacity")]
    pub event_channel_capacity: usize,
    /// Maximum number of retained activity log entries
    #[serde(default = "default_activity_capacity")]
    pub activity_log_capacity: usize,
    /// Ticks taken by a single-device exercise
    #[serde(default = "default_exercise_ticks")]
    pub exercise_ticks: u32,
    /// Sample count preselected by front ends
    #[serde(default = "default_sample_count")]
    pub default_sample_count: u32,
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            log_level: default_log_level(),
            tick_interval_ms: default_tick_interval(),
            command_channel_capacity: default_command_capacity(),
            event_channel_capacity: default_event_capacity(),
            activity_log_capacity: default_activity_capacity(),
            exercise_ticks: default_exercise_ticks(),
            default_sample_count: default_sample_count(),
        }
    }
}

/// Device definition in configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeviceDefinition {
    /// Unique device name
    pub name: String,
    /// Operation label shown when the device is exercised on its own
    #[serde(default = "default_test_operation")]
    pub test_operation: String,
}

/// Protocol definition in configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProtocolDefinition {
    /// Unique protocol name
    pub name: String,
    /// Ordered steps
    pub steps: Vec<StepDefinition>,
}

/// A single protocol step in configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepDefinition {
    /// Name of the device performing the step
    pub device: String,
    /// Operation label
    pub label: String,
    /// Number of ticks the step takes
    #[serde(default = "default_step_duration")]
    pub duration_ticks: u32,
}

impl StepDefinition {
    fn new(device: &str, label: &str) -> Self {
        Self {
            device: device.to_string(),
            label: label.to_string(),
            duration_ticks: default_step_duration(),
        }
    }
}

// ============================================================================
// Default value functions
// ============================================================================

fn default_name() -> String {
    "Integrated Workcell Control Hub".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_tick_interval() -> u64 {
    500
}

fn default_command_capacity() -> usize {
    100
}

fn default_event_capacity() -> usize {
    256
}

fn default_activity_capacity() -> usize {
    1000
}

fn default_exercise_ticks() -> u32 {
    10
}

fn default_sample_count() -> u32 {
    24
}

fn default_test_operation() -> String {
    "Running test".to_string()
}

fn default_step_duration() -> u32 {
    10
}

fn default_devices() -> Vec<DeviceDefinition> {
    [
        ("Transport Robot", "Moving to position A3"),
        ("Liquid Handler", "Aspirating samples"),
        ("Plate Reader", "Reading absorbance at 450nm"),
        ("Centrifuge", "Spinning at 2000 RPM"),
        ("Incubator", "Temperature verification"),
        ("Storage Unit", "Retrieving plate from position B2"),
    ]
    .into_iter()
    .map(|(name, op)| DeviceDefinition {
        name: name.to_string(),
        test_operation: op.to_string(),
    })
    .collect()
}

fn default_protocols() -> Vec<ProtocolDefinition> {
    [
        "Cell Culture - Automated Passage",
        "High-Throughput Clone Screening",
        "Sample Prep for LC-MS Analysis",
        "Plate-Based Assay Workflow",
        "Bioreactor Sample Collection",
        "Inter-Lab Sample Transfer",
    ]
    .into_iter()
    .map(|name| ProtocolDefinition {
        name: name.to_string(),
        steps: standard_steps(),
    })
    .collect()
}

/// The plate round trip every stock protocol runs.
fn standard_steps() -> Vec<StepDefinition> {
    vec![
        StepDefinition::new("Transport Robot", "Retrieving samples from storage"),
        StepDefinition::new("Liquid Handler", "Dispensing reagents"),
        StepDefinition::new("Incubator", "Incubating samples"),
        StepDefinition::new("Centrifuge", "Centrifuging samples"),
        StepDefinition::new("Plate Reader", "Reading plate"),
        StepDefinition::new("Transport Robot", "Returning samples to storage"),
    ]
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            application: ApplicationConfig::default(),
            devices: default_devices(),
            protocols: default_protocols(),
        }
    }
}

// ============================================================================
// Configuration Loading and Validation
// ============================================================================

impl Settings {
    /// Load configuration from `config/workcell.toml` and environment variables.
    ///
    /// A missing file is not an error; the built-in defaults apply.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific file path
    ///
    /// # Errors
    ///
    /// Returns a ConfigError if the file is malformed or validation fails.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let settings: Self = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|e| ConfigError::LoadError(Box::new(e)))?;

        settings.validate()?;
        Ok(settings)
    }

    /// Render the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ValidationError(e.to_string()))
    }

    /// Validate configuration after loading
    ///
    /// Checks:
    /// - Log level is valid (trace, debug, info, warn, error)
    /// - Tick interval and channel capacities are non-zero
    /// - Default sample count is within the plate range
    /// - Device and protocol names are unique
    /// - Every protocol has steps, every step names a defined device and lasts
    ///   at least one tick
    pub fn validate(&self) -> Result<(), ConfigError> {
        let app = &self.application;

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&app.log_level.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                app.log_level,
                valid_levels.join(", ")
            )));
        }

        if app.tick_interval_ms == 0 {
            return Err(ConfigError::ValidationError(
                "tick_interval_ms must be greater than 0".to_string(),
            ));
        }

        if app.command_channel_capacity == 0
            || app.event_channel_capacity == 0
            || app.activity_log_capacity == 0
        {
            return Err(ConfigError::ValidationError(
                "channel and log capacities must be greater than 0".to_string(),
            ));
        }

        if app.exercise_ticks == 0 {
            return Err(ConfigError::ValidationError(
                "exercise_ticks must be greater than 0".to_string(),
            ));
        }

        if !(MIN_SAMPLE_COUNT..=MAX_SAMPLE_COUNT).contains(&app.default_sample_count) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid default_sample_count {}. Must be {}-{}",
                app.default_sample_count, MIN_SAMPLE_COUNT, MAX_SAMPLE_COUNT
            )));
        }

        let mut device_names = HashSet::new();
        for device in &self.devices {
            if device.name.trim().is_empty() {
                return Err(ConfigError::ValidationError(
                    "Device name cannot be empty".to_string(),
                ));
            }
            if !device_names.insert(device.name.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "Duplicate device name: '{}'",
                    device.name
                )));
            }
        }

        let mut protocol_names = HashSet::new();
        for protocol in &self.protocols {
            if !protocol_names.insert(protocol.name.as_str()) {
                return Err(ConfigError::ValidationError(format!(
                    "Duplicate protocol name: '{}'",
                    protocol.name
                )));
            }
            if protocol.steps.is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "Protocol '{}' has no steps",
                    protocol.name
                )));
            }
            for (idx, step) in protocol.steps.iter().enumerate() {
                if !device_names.contains(step.device.as_str()) {
                    return Err(ConfigError::ValidationError(format!(
                        "Protocol '{}' step {} references unknown device '{}'",
                        protocol.name,
                        idx + 1,
                        step.device
                    )));
                }
                if step.duration_ticks == 0 {
                    return Err(ConfigError::ValidationError(format!(
                        "Protocol '{}' step {} must last at least one tick",
                        protocol.name,
                        idx + 1
                    )));
                }
            }
            let total = protocol
                .steps
                .iter()
                .try_fold(0u32, |total, step| total.checked_add(step.duration_ticks));
            if total.is_none() {
                return Err(ConfigError::ValidationError(format!(
                    "Protocol '{}' total duration exceeds {} ticks",
                    protocol.name,
                    u32::MAX
                )));
            }
        }

        Ok(())
    }
}
