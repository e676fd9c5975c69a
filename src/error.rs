//! Custom error types for the workcell hub.
//!
//! This module defines the primary error type, `WorkcellError`. Using the
//! `thiserror` crate, it gives every rejected operation a distinct, displayable
//! variant that a front end can turn into a user-visible message.
//!
//! ## Error Hierarchy
//!
//! - **`InvalidSampleCount`**: a run was requested with a sample count outside
//!   the supported plate range (1-96).
//! - **`UnknownProtocol`**: no step list is registered under the requested name.
//! - **`InvalidTransition`**: the run state machine does not allow the action in
//!   its current state (e.g. `resume` while Idle).
//! - **`UnknownDevice`** / **`DeviceBusy`**: device lookups and exercise requests.
//! - **`UnknownSample`**: a status update named a sample id that was never created.
//! - **`Config`**: loading or validating [`Settings`](crate::config::Settings).
//! - **`ActorUnavailable`**: the workcell actor has shut down or dropped a reply.
//!
//! None of these are fatal. Every operation that returns one of them leaves the
//! in-memory state exactly as it was before the call.

use crate::config::ConfigError;
use crate::runner::RunState;
use thiserror::Error;

/// Convenience alias for results using the application error type.
pub type AppResult<T> = std::result::Result<T, WorkcellError>;

/// Errors raised by the workcell core.
#[derive(Error, Debug)]
pub enum WorkcellError {
    /// Sample count outside the supported range.
    #[error("Invalid sample count {count}: must be between {min} and {max}")]
    InvalidSampleCount {
        /// Requested count.
        count: u32,
        /// Smallest accepted count.
        min: u32,
        /// Largest accepted count.
        max: u32,
    },

    /// No protocol registered under that name.
    #[error("Unknown protocol: '{0}'")]
    UnknownProtocol(String),

    /// The action is not allowed from the current run state.
    #[error("Cannot {action} while run is {from}")]
    InvalidTransition {
        /// State the run was in when the action was attempted.
        from: RunState,
        /// Name of the rejected action.
        action: &'static str,
    },

    /// No device with that name was ever defined.
    #[error("Unknown device: '{0}'")]
    UnknownDevice(String),

    /// The device already has an operation in progress.
    #[error("Device '{0}' is already active")]
    DeviceBusy(String),

    /// No sample with that id exists.
    #[error("Unknown sample: '{0}'")]
    UnknownSample(String),

    /// Configuration could not be loaded or failed validation.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// The actor task is gone.
    #[error("Workcell actor unavailable")]
    ActorUnavailable,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = WorkcellError::UnknownProtocol("Bogus".to_string());
        assert_eq!(err.to_string(), "Unknown protocol: 'Bogus'");
    }

    #[test]
    fn test_invalid_transition_display() {
        let err = WorkcellError::InvalidTransition {
            from: RunState::Idle,
            action: "resume",
        };
        assert_eq!(err.to_string(), "Cannot resume while run is Idle");
    }

    #[test]
    fn test_sample_count_display() {
        let err = WorkcellError::InvalidSampleCount {
            count: 97,
            min: 1,
            max: 96,
        };
        assert!(err.to_string().contains("97"));
        assert!(err.to_string().contains("between 1 and 96"));
    }
}
