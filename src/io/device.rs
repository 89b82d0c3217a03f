//! Peripheral devices.
//!
//! Devices are plain stream wrappers. A [`ConsoleTty`] prints the low byte
//! of every word to a writer and hands out queued input bytes; a
//! [`LinePrinter`] collects bytes into lines and appends each finished
//! line to the file it is attached to.

use crate::io::STATUS_READY;
use std::collections::VecDeque;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised by devices.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("device name required")]
    EmptyName,

    #[error("path required")]
    EmptyPath,

    #[error("{0} is not an output device")]
    NotOutput(String),

    #[error("{0} is not attached")]
    NotAttached(String),

    #[error("{0} cannot be attached to a file")]
    NotAttachable(String),

    #[error("unknown device: {0}")]
    UnknownDevice(String),

    #[error("no device for code {0}")]
    NoDevice(u8),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A peripheral reachable through the device registry.
pub trait Device {
    /// Human readable device name
    fn name(&self) -> &str;

    /// One-line status for listings
    fn status(&self) -> String;

    /// Hardware status word; output devices report ready by default
    fn status_word(&self) -> Option<u16> {
        if self.is_output() {
            Some(STATUS_READY)
        } else {
            None
        }
    }

    /// Whether the device accepts words
    fn is_output(&self) -> bool {
        false
    }

    /// Accept one word from WIO
    fn write_word(&mut self, _value: u16) -> Result<(), DeviceError> {
        Err(DeviceError::NotOutput(self.name().to_owned()))
    }

    /// Supply one byte to RIO
    fn read_byte(&mut self) -> u8 {
        0
    }

    /// Push out any buffered output
    fn flush(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }

    /// Access to the attach/detach capability, if the device has one
    fn as_attachable(&mut self) -> Option<&mut dyn Attachable> {
        None
    }
}

/// A device backed by a host file.
pub trait Attachable {
    /// Bind to `path`, truncating it first when `create_new` is set
    fn attach(&mut self, path: &Path, create_new: bool) -> Result<(), DeviceError>;

    /// Flush pending output and release the host file
    fn detach(&mut self) -> Result<(), DeviceError>;

    /// Currently attached path
    fn path(&self) -> Option<&Path>;
}

fn ensure_parent(path: &Path) -> Result<(), DeviceError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}

/// Console teletype.
pub struct ConsoleTty<W: Write = std::io::Stdout> {
    out: W,
    input: VecDeque<u8>,
}

impl ConsoleTty {
    /// Console writing to standard output.
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl<W: Write> ConsoleTty<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            input: VecDeque::new(),
        }
    }

    /// Queue bytes for later RIO reads.
    pub fn feed(&mut self, bytes: &[u8]) {
        self.input.extend(bytes);
    }

    pub fn writer(&self) -> &W {
        &self.out
    }
}

impl<W: Write> Device for ConsoleTty<W> {
    fn name(&self) -> &str {
        "Console TTY"
    }

    fn status(&self) -> String {
        "ready".to_owned()
    }

    fn is_output(&self) -> bool {
        true
    }

    fn write_word(&mut self, value: u16) -> Result<(), DeviceError> {
        self.out.write_all(&[value as u8])?;
        Ok(())
    }

    fn read_byte(&mut self) -> u8 {
        self.input.pop_front().unwrap_or(0)
    }

    fn flush(&mut self) -> Result<(), DeviceError> {
        self.out.flush()?;
        Ok(())
    }
}

/// Line printer appending to a host file.
///
/// A printer with no file attached reports a zero status word, so WIO
/// sees it as present but not ready.
#[derive(Default)]
pub struct LinePrinter {
    path: Option<PathBuf>,
    line: Vec<u8>,
}

impl LinePrinter {
    /// Printer with no file attached.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one complete line.
    pub fn print_line(&mut self, text: &str) -> Result<(), DeviceError> {
        let path = self
            .path
            .as_deref()
            .ok_or_else(|| DeviceError::NotAttached(self.name().to_owned()))?;
        let mut file = OpenOptions::new().create(true).append(true).open(path)?;
        writeln!(file, "{}", text)?;
        Ok(())
    }

    fn end_line(&mut self) -> Result<(), DeviceError> {
        let text = String::from_utf8_lossy(&self.line).into_owned();
        self.line.clear();
        self.print_line(&text)
    }
}

impl Device for LinePrinter {
    fn name(&self) -> &str {
        "Line Printer"
    }

    fn status(&self) -> String {
        match self.path() {
            Some(path) => format!("output={}", path.display()),
            None => "detached".to_owned(),
        }
    }

    fn status_word(&self) -> Option<u16> {
        Some(if self.path.is_some() { STATUS_READY } else { 0 })
    }

    fn is_output(&self) -> bool {
        true
    }

    fn write_word(&mut self, value: u16) -> Result<(), DeviceError> {
        if self.path.is_none() {
            return Err(DeviceError::NotAttached(self.name().to_owned()));
        }
        match value as u8 {
            b'\n' => self.end_line(),
            b'\r' => Ok(()),
            byte => {
                self.line.push(byte);
                Ok(())
            }
        }
    }

    fn flush(&mut self) -> Result<(), DeviceError> {
        if self.line.is_empty() {
            Ok(())
        } else {
            self.end_line()
        }
    }

    fn as_attachable(&mut self) -> Option<&mut dyn Attachable> {
        Some(self)
    }
}

impl Attachable for LinePrinter {
    fn attach(&mut self, path: &Path, create_new: bool) -> Result<(), DeviceError> {
        if path.as_os_str().is_empty() {
            return Err(DeviceError::EmptyPath);
        }
        if create_new && path.exists() {
            fs::remove_file(path)?;
        }
        ensure_parent(path)?;
        self.path = Some(path.to_path_buf());
        Ok(())
    }

    fn detach(&mut self) -> Result<(), DeviceError> {
        if self.path.is_some() {
            self.flush()?;
        }
        self.path = None;
        Ok(())
    }

    fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("hp3000-{}-{}", std::process::id(), name))
    }

    #[test]
    fn test_tty_writes_low_byte() {
        let mut tty = ConsoleTty::new(Vec::new());
        tty.write_word(0x4148).unwrap();
        tty.write_word(b'i' as u16).unwrap();
        assert_eq!(tty.writer(), b"Hi");
        assert_eq!(tty.status_word(), Some(STATUS_READY));
    }

    #[test]
    fn test_tty_input_queue() {
        let mut tty = ConsoleTty::new(Vec::new());
        tty.feed(b"ok");
        assert_eq!(tty.read_byte(), b'o');
        assert_eq!(tty.read_byte(), b'k');
        assert_eq!(tty.read_byte(), 0);
    }

    #[test]
    fn test_line_printer_appends_lines() {
        let path = scratch("lpt.txt");
        let mut lpt = LinePrinter::new();
        lpt.attach(&path, true).unwrap();
        for byte in b"AB\r\nC" {
            lpt.write_word(*byte as u16).unwrap();
        }
        lpt.flush().unwrap();
        let text = fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().collect::<Vec<_>>(), vec!["AB", "C"]);
        fs::remove_file(&path).unwrap();
    }

    #[test]
    fn test_attach_requires_path() {
        let mut lpt = LinePrinter::new();
        assert!(matches!(
            lpt.attach(Path::new(""), false),
            Err(DeviceError::EmptyPath)
        ));
        assert_eq!(lpt.path(), None);
    }

    #[test]
    fn test_detached_printer_is_not_ready() {
        let mut lpt = LinePrinter::new();
        assert_eq!(lpt.status_word(), Some(0));
        assert_eq!(lpt.status(), "detached");
        assert!(matches!(
            lpt.write_word(b'A' as u16),
            Err(DeviceError::NotAttached(_))
        ));
    }

    #[test]
    fn test_detach_flushes_and_unbinds() {
        let path = scratch("detach.txt");
        let mut lpt = LinePrinter::new();
        lpt.attach(&path, true).unwrap();
        assert_eq!(lpt.status_word(), Some(STATUS_READY));
        assert_eq!(lpt.path(), Some(path.as_path()));

        lpt.write_word(b'Z' as u16).unwrap();
        lpt.detach().unwrap();

        assert_eq!(lpt.path(), None);
        assert_eq!(lpt.status_word(), Some(0));
        assert_eq!(fs::read_to_string(&path).unwrap(), "Z\n");
        fs::remove_file(&path).unwrap();
    }
}
