//! Core library for the workcell_hub application.
//!
//! A simulation core for a laboratory workcell control panel: mock devices
//! with status and progress, canned protocols advanced one tick at a time,
//! and sample records produced along the way.
//!
//! - [`runner::ProtocolRunner`] is the state machine and owns all state.
//! - [`app_actor::WorkcellActor`] drives it as a cooperative scheduler and
//!   serves front ends through [`app_actor::WorkcellHandle`].
//! - [`config::Settings`] supplies devices and protocols at startup.

pub mod activity;
pub mod app_actor;
pub mod config;
pub mod device;
pub mod error;
pub mod events;
pub mod logging;
pub mod messages;
pub mod protocol;
pub mod runner;
pub mod sample;

pub use app_actor::{WorkcellActor, WorkcellHandle};
pub use config::Settings;
pub use error::{AppResult, WorkcellError};
pub use events::RunEvent;
pub use runner::{ProtocolRunner, RunState};
