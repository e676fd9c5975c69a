//! Simulated workcell devices.
//!
//! - [`DeviceRegistry`] holds the status and progress of every device and is
//!   the read-only snapshot a presentation layer renders.
//! - [`DeviceExercise`] drives a single device through its self-test
//!   operation, tick by tick.

pub mod exercise;
pub mod registry;

pub use exercise::{DeviceExercise, ExerciseTick};
pub use registry::{Device, DeviceRegistry, DeviceStatus};
