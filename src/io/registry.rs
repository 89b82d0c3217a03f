//! Device registry and the bus built on it.

use crate::io::device::{Attachable, Device, DeviceError};
use crate::io::IoBus;
use log::warn;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Devices keyed by case-insensitive name.
#[derive(Default)]
pub struct DeviceRegistry {
    devices: BTreeMap<String, Box<dyn Device>>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `device` under `name`, replacing any previous entry.
    pub fn add(&mut self, name: &str, device: Box<dyn Device>) -> Result<(), DeviceError> {
        let key = name.trim();
        if key.is_empty() {
            return Err(DeviceError::EmptyName);
        }
        self.devices.insert(key.to_ascii_lowercase(), device);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&dyn Device> {
        self.devices
            .get(&name.trim().to_ascii_lowercase())
            .map(|d| d.as_ref())
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut (dyn Device + 'static)> {
        self.devices
            .get_mut(&name.trim().to_ascii_lowercase())
            .map(|d| d.as_mut())
    }

    /// Bind the named device to a host file.
    pub fn attach(&mut self, name: &str, path: &Path, create_new: bool) -> Result<(), DeviceError> {
        self.attachable(name)?.attach(path, create_new)
    }

    /// Flush the named device and release its host file.
    pub fn detach(&mut self, name: &str) -> Result<(), DeviceError> {
        self.attachable(name)?.detach()
    }

    fn attachable(&mut self, name: &str) -> Result<&mut dyn Attachable, DeviceError> {
        let device = self
            .get_mut(name)
            .ok_or_else(|| DeviceError::UnknownDevice(name.trim().to_owned()))?;
        device
            .as_attachable()
            .ok_or_else(|| DeviceError::NotAttachable(name.trim().to_owned()))
    }

    /// All devices in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &dyn Device)> {
        self.devices.iter().map(|(k, d)| (k.as_str(), d.as_ref()))
    }

    /// Flush every device, stopping at the first failure.
    pub fn flush_all(&mut self) -> Result<(), DeviceError> {
        for device in self.devices.values_mut() {
            device.flush()?;
        }
        Ok(())
    }
}

/// [`IoBus`] that resolves device codes against a registry.
///
/// Code 0 is `tty` and code 1 is `lpt`; other codes are absent.
#[derive(Default)]
pub struct DeviceBus {
    pub devices: DeviceRegistry,
    missing: BTreeSet<u8>,
}

impl DeviceBus {
    pub fn new(devices: DeviceRegistry) -> Self {
        Self {
            devices,
            missing: BTreeSet::new(),
        }
    }

    /// Codes that were accessed with no device behind them, in order.
    pub fn missing_codes(&self) -> impl Iterator<Item = u8> + '_ {
        self.missing.iter().copied()
    }

    /// Registry name for a device code.
    pub fn device_name(code: u8) -> Option<&'static str> {
        match code {
            0 => Some("tty"),
            1 => Some("lpt"),
            _ => None,
        }
    }

    fn resolve(&mut self, code: u8) -> Option<&mut (dyn Device + 'static)> {
        let device = match Self::device_name(code) {
            Some(name) => self.devices.get_mut(name),
            None => None,
        };
        // warn once per code
        if device.is_none() && self.missing.insert(code) {
            warn!("no device for code {}", code);
        }
        device
    }
}

impl IoBus for DeviceBus {
    fn read_status(&mut self, device: u8) -> Option<u16> {
        self.resolve(device).and_then(|d| d.status_word())
    }

    fn write_word(&mut self, device: u8, value: u16) -> Result<(), DeviceError> {
        match self.resolve(device) {
            Some(d) => d.write_word(value),
            None => Err(DeviceError::NoDevice(device)),
        }
    }

    fn read_byte(&mut self, device: u8) -> u8 {
        self.resolve(device).map(|d| d.read_byte()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::{ConsoleTty, LinePrinter, STATUS_READY};
    use std::fs;

    /// Device with no output and a fixed status word.
    struct Fixed(u16);

    impl Device for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }
        fn status(&self) -> String {
            format!("status={:06o}", self.0)
        }
        fn status_word(&self) -> Option<u16> {
            Some(self.0)
        }
    }

    #[test]
    fn test_registry_is_case_insensitive() {
        let mut reg = DeviceRegistry::new();
        reg.add("TTY", Box::new(ConsoleTty::new(Vec::new()))).unwrap();
        assert!(reg.get("tty").is_some());
        assert!(reg.get("Tty").is_some());
        assert!(reg.get("lpt").is_none());
        assert!(matches!(
            reg.add("  ", Box::new(Fixed(0))),
            Err(DeviceError::EmptyName)
        ));
    }

    #[test]
    fn test_bus_resolves_codes() {
        let mut reg = DeviceRegistry::new();
        reg.add("tty", Box::new(ConsoleTty::new(Vec::new()))).unwrap();
        reg.add("lpt", Box::new(Fixed(0o100))).unwrap();
        let mut bus = DeviceBus::new(reg);

        assert_eq!(bus.read_status(0), Some(STATUS_READY));
        assert_eq!(bus.read_status(1), Some(0o100));
        assert_eq!(bus.read_status(2), None);
        assert_eq!(bus.read_byte(7), 0);
    }

    #[test]
    fn test_listing_is_sorted() {
        let mut reg = DeviceRegistry::new();
        reg.add("tty", Box::new(Fixed(1))).unwrap();
        reg.add("lpt", Box::new(Fixed(2))).unwrap();
        let names: Vec<_> = reg.iter().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["lpt", "tty"]);
    }

    #[test]
    fn test_attach_by_name() {
        let path = std::env::temp_dir().join(format!("hp3000-{}-bus-lpt.txt", std::process::id()));
        let mut reg = DeviceRegistry::new();
        reg.add("tty", Box::new(ConsoleTty::new(Vec::new()))).unwrap();
        reg.add("LPT", Box::new(LinePrinter::new())).unwrap();
        reg.attach("lpt", &path, true).unwrap();

        assert!(matches!(
            reg.attach("tty", &path, false),
            Err(DeviceError::NotAttachable(_))
        ));
        assert!(matches!(
            reg.detach("disc"),
            Err(DeviceError::UnknownDevice(_))
        ));

        let mut bus = DeviceBus::new(reg);
        assert_eq!(bus.read_status(1), Some(STATUS_READY));
        for byte in b"OK\n" {
            bus.write_word(1, *byte as u16).unwrap();
        }
        bus.devices.detach("lpt").unwrap();
        assert_eq!(bus.read_status(1), Some(0));
        assert_eq!(fs::read_to_string(&path).unwrap(), "OK\n");
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_bus_write_reports_failures() {
        let mut reg = DeviceRegistry::new();
        reg.add("lpt", Box::new(LinePrinter::new())).unwrap();
        reg.add("tty", Box::new(Fixed(STATUS_READY))).unwrap();
        let mut bus = DeviceBus::new(reg);

        assert!(matches!(bus.write_word(5, 1), Err(DeviceError::NoDevice(5))));
        assert!(matches!(bus.write_word(1, 1), Err(DeviceError::NotAttached(_))));
        assert!(matches!(bus.write_word(0, 1), Err(DeviceError::NotOutput(_))));
    }

    #[test]
    fn test_missing_codes_recorded_once() {
        let mut bus = DeviceBus::default();
        for _ in 0..100 {
            assert_eq!(bus.read_status(7), None);
        }
        assert_eq!(bus.read_byte(3), 0);
        assert_eq!(bus.read_status(7), None);
        assert_eq!(bus.missing_codes().collect::<Vec<_>>(), vec![3, 7]);
    }
}
