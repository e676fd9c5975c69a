//! Workcell Configuration System
//!
//! Configuration management using Figment. Devices and protocols are static
//! configuration data supplied at startup; nothing here changes at runtime.
//!
//! # Configuration Sources
//!
//! Configuration is loaded from (in order of precedence):
//! 1. Environment variables prefixed with `WORKCELL_`
//! 2. TOML configuration file (default: `config/workcell.toml`)
//! 3. Built-in defaults
//!
//! # Example
//!
//! ```no_run
//! use workcell_hub::config::Settings;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = Settings::load()?;
//!     println!("Devices: {}", settings.devices.len());
//!     println!("Tick: {} ms", settings.application.tick_interval_ms);
//!     Ok(())
//! }
//! ```

pub mod settings;

pub use settings::{
    ApplicationConfig, ConfigError, DeviceDefinition, ProtocolDefinition, Settings,
    StepDefinition, DEFAULT_CONFIG_PATH, ENV_PREFIX,
};
