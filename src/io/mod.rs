//! I/O bus seen by the RIO and WIO instructions.
//!
//! The CPU never owns its peripherals: callers pass an [`IoBus`] into
//! every `step`, and the bus maps small device codes onto whatever
//! devices it knows about.

pub mod device;
pub mod registry;

pub use device::{Attachable, ConsoleTty, Device, DeviceError, LinePrinter};
pub use registry::{DeviceBus, DeviceRegistry};

/// Status bit reporting a device ready to transfer.
pub const STATUS_READY: u16 = 0x0002;

/// Device access used by the I/O instructions.
pub trait IoBus {
    /// Status word of `device`, or `None` if no such device is present
    fn read_status(&mut self, device: u8) -> Option<u16>;

    /// Send a word to `device`
    fn write_word(&mut self, device: u8, value: u16) -> Result<(), DeviceError>;

    /// Read one byte from `device`, zero if nothing is available
    fn read_byte(&mut self, device: u8) -> u8;
}

/// Bus with nothing attached
#[derive(Debug, Default, Clone, Copy)]
pub struct NullBus;

impl IoBus for NullBus {
    fn read_status(&mut self, _device: u8) -> Option<u16> {
        None
    }

    fn write_word(&mut self, device: u8, _value: u16) -> Result<(), DeviceError> {
        Err(DeviceError::NoDevice(device))
    }

    fn read_byte(&mut self, _device: u8) -> u8 {
        0
    }
}
