//! Protocol definitions.
//!
//! A protocol is a named, ordered list of steps. Each step names the device
//! that performs it, an operation label and how many ticks it takes. Protocols
//! are immutable once the library is built.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::config::Settings;

/// One step of a protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProtocolStep {
    /// Device performing the step.
    pub device: String,
    /// Operation label.
    pub label: String,
    /// Ticks needed to complete the step (at least 1).
    pub duration: u32,
}

impl ProtocolStep {
    /// Create a step. A zero duration is raised to one tick.
    pub fn new(device: impl Into<String>, label: impl Into<String>, duration: u32) -> Self {
        Self {
            device: device.into(),
            label: label.into(),
            duration: duration.max(1),
        }
    }
}

/// A named protocol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Protocol {
    /// Protocol name.
    pub name: String,
    /// Steps in execution order.
    pub steps: Vec<ProtocolStep>,
}

impl Protocol {
    /// Sum of all step durations: the number of ticks a full run takes.
    /// Saturates at `u32::MAX`.
    pub fn total_ticks(&self) -> u32 {
        self.steps
            .iter()
            .fold(0u32, |total, s| total.saturating_add(s.duration))
    }
}

/// Protocol name -> step list, preserving definition order for listing.
#[derive(Debug, Clone, Default)]
pub struct ProtocolLibrary {
    protocols: Vec<Protocol>,
    index: HashMap<String, usize>,
}

impl ProtocolLibrary {
    /// Empty library.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the library from configuration.
    pub fn from_settings(settings: &Settings) -> Self {
        let mut library = Self::new();
        for def in &settings.protocols {
            let steps = def
                .steps
                .iter()
                .map(|s| ProtocolStep::new(&s.device, &s.label, s.duration_ticks))
                .collect();
            library.register(&def.name, steps);
        }
        library
    }

    /// Register (or replace) a protocol.
    pub fn register(&mut self, name: impl Into<String>, steps: Vec<ProtocolStep>) {
        let name = name.into();
        let protocol = Protocol {
            name: name.clone(),
            steps,
        };
        match self.index.get(&name) {
            Some(&i) => self.protocols[i] = protocol,
            None => {
                self.index.insert(name, self.protocols.len());
                self.protocols.push(protocol);
            }
        }
    }

    /// Look up a protocol. Protocols registered with no steps are treated as
    /// absent.
    pub fn get(&self, name: &str) -> Option<&Protocol> {
        self.index
            .get(name)
            .map(|&i| &self.protocols[i])
            .filter(|p| !p.steps.is_empty())
    }

    /// Protocol names in definition order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.protocols.iter().map(|p| p.name.as_str())
    }

    /// All protocols in definition order.
    pub fn protocols(&self) -> &[Protocol] {
        &self.protocols
    }
}
