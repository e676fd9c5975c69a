//! Device registry: the observable state of every workcell device.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use tracing::trace;

use crate::config::DeviceDefinition;
use crate::error::{AppResult, WorkcellError};

/// Observable status of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeviceStatus {
    /// Idle and available.
    Ready,
    /// Performing an operation.
    Active,
    /// Halted by an emergency stop.
    Stopped,
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeviceStatus::Ready => "Ready",
            DeviceStatus::Active => "Active",
            DeviceStatus::Stopped => "Stopped",
        };
        f.pad(s)
    }
}

/// A single device as seen by a front end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Device {
    /// Identifier, unique within the registry.
    pub name: String,
    /// Current status.
    pub status: DeviceStatus,
    /// Progress of the current operation, 0-100.
    pub progress: u8,
    /// Label of the operation in progress, if any.
    pub operation: Option<String>,
}

impl Device {
    fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: DeviceStatus::Ready,
            progress: 0,
            operation: None,
        }
    }

    /// Whether the device is currently performing an operation.
    pub fn is_active(&self) -> bool {
        self.status == DeviceStatus::Active
    }
}

/// Fixed set of devices, kept in definition order.
///
/// Devices are created once from configuration and never removed. All
/// mutation goes through `&mut self`, so a single owner serializes updates
/// and reads.
#[derive(Debug, Clone, Default)]
pub struct DeviceRegistry {
    devices: Vec<Device>,
    index: HashMap<String, usize>,
}

impl DeviceRegistry {
    /// Build a registry from device names. Duplicate names are ignored.
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut registry = Self::default();
        for name in names {
            let name = name.into();
            if registry.index.contains_key(&name) {
                continue;
            }
            registry.index.insert(name.clone(), registry.devices.len());
            registry.devices.push(Device::new(name));
        }
        registry
    }

    /// Build a registry from configuration.
    pub fn from_definitions(defs: &[DeviceDefinition]) -> Self {
        Self::new(defs.iter().map(|d| d.name.clone()))
    }

    /// Update one device's status and progress. Progress above 100 is clamped.
    pub fn set_status(&mut self, name: &str, status: DeviceStatus, progress: u8) -> AppResult<()> {
        let device = self.get_mut(name)?;
        device.status = status;
        device.progress = progress.min(100);
        trace!(device = name, %status, progress = device.progress, "device updated");
        Ok(())
    }

    /// Set or clear the operation label of a device.
    pub fn set_operation(&mut self, name: &str, operation: Option<String>) -> AppResult<()> {
        self.get_mut(name)?.operation = operation;
        Ok(())
    }

    /// Look up a device by name.
    pub fn get(&self, name: &str) -> Option<&Device> {
        self.index.get(name).map(|&i| &self.devices[i])
    }

    /// Whether a device with this name exists.
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Current snapshot of every device, in definition order.
    pub fn get_all(&self) -> &[Device] {
        &self.devices
    }

    /// Owned copy of [`get_all`](Self::get_all) for handing across a channel.
    pub fn snapshot(&self) -> Vec<Device> {
        self.devices.clone()
    }

    /// Number of devices currently Active.
    pub fn active_count(&self) -> usize {
        self.devices.iter().filter(|d| d.is_active()).count()
    }

    /// Number of devices.
    pub fn len(&self) -> usize {
        self.devices.len()
    }

    /// True when no devices are defined.
    pub fn is_empty(&self) -> bool {
        self.devices.is_empty()
    }

    /// Return every Stopped device to Ready with no progress.
    pub fn reset_stopped(&mut self) -> Vec<String> {
        let mut reset = Vec::new();
        for device in &mut self.devices {
            if device.status == DeviceStatus::Stopped {
                device.status = DeviceStatus::Ready;
                device.progress = 0;
                device.operation = None;
                reset.push(device.name.clone());
            }
        }
        reset
    }

    /// Mark every device Stopped with no progress. Returns the devices that
    /// were Active at the time.
    pub fn stop_all(&mut self) -> Vec<String> {
        let mut interrupted = Vec::new();
        for device in &mut self.devices {
            if device.is_active() {
                interrupted.push(device.name.clone());
            }
            device.status = DeviceStatus::Stopped;
            device.progress = 0;
            device.operation = None;
        }
        interrupted
    }

    fn get_mut(&mut self, name: &str) -> AppResult<&mut Device> {
        match self.index.get(name) {
            Some(&i) => Ok(&mut self.devices[i]),
            None => Err(WorkcellError::UnknownDevice(name.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> DeviceRegistry {
        DeviceRegistry::new(["Transport Robot", "Centrifuge", "Plate Reader"])
    }

    #[test]
    fn test_set_status_updates_one_device() {
        let mut reg = registry();
        reg.set_status("Centrifuge", DeviceStatus::Active, 40).unwrap();

        let dev = reg.get("Centrifuge").unwrap();
        assert_eq!(dev.status, DeviceStatus::Active);
        assert_eq!(dev.progress, 40);
        assert_eq!(reg.get("Plate Reader").unwrap().status, DeviceStatus::Ready);
        assert_eq!(reg.active_count(), 1);
    }

    #[test]
    fn test_unknown_device_is_rejected() {
        let mut reg = registry();
        let err = reg.set_status("Autoclave", DeviceStatus::Active, 10).unwrap_err();
        assert!(matches!(err, WorkcellError::UnknownDevice(ref n) if n == "Autoclave"));
        assert_eq!(reg.active_count(), 0);
    }

    #[test]
    fn test_progress_is_clamped() {
        let mut reg = registry();
        reg.set_status("Centrifuge", DeviceStatus::Active, 250).unwrap();
        assert_eq!(reg.get("Centrifuge").unwrap().progress, 100);
    }

    #[test]
    fn test_snapshot_keeps_definition_order() {
        let reg = DeviceRegistry::new(["B", "A", "B", "C"]);
        let names: Vec<_> = reg.get_all().iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, ["B", "A", "C"]);
        assert_eq!(reg.len(), 3);
    }

    #[test]
    fn test_stop_all_and_reset() {
        let mut reg = registry();
        reg.set_status("Transport Robot", DeviceStatus::Active, 70).unwrap();

        let interrupted = reg.stop_all();
        assert_eq!(interrupted, vec!["Transport Robot".to_string()]);
        assert!(reg.get_all().iter().all(|d| d.status == DeviceStatus::Stopped && d.progress == 0));

        let reset = reg.reset_stopped();
        assert_eq!(reset.len(), 3);
        assert!(reg.get_all().iter().all(|d| d.status == DeviceStatus::Ready));
    }
}
