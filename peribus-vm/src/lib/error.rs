use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::io;

use crate::slot::Slot;

/// A misconfigured card or slot. These are raised while the machine is being
/// put together, before any guest code runs, and are never reported to the
/// guest.
#[derive(Debug, PartialEq, Eq)]
pub enum ConfigError {
    InvalidRomSize(usize),
    RomAfterAssign,
    AlreadyAssigned(Slot),
    InvalidSlot(u8),
    InvalidIoOffset(u8),
    SlotOccupied(Slot),
}

pub type ConfigResult<T> = Result<T, ConfigError>;

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidRomSize(size) => write!(
                f, "Invalid card ROM size: {} bytes (must be 256, 2048 or 4096).", size),
            ConfigError::RomAfterAssign => write!(
                f, "The card ROM must be loaded before the card is inserted in a slot."),
            ConfigError::AlreadyAssigned(slot) => write!(
                f, "The card is already assigned to slot {}.", slot),
            ConfigError::InvalidSlot(slot) => write!(
                f, "Invalid slot number {} (must be 0 to 7).", slot),
            ConfigError::InvalidIoOffset(offset) => write!(
                f, "Invalid I/O page offset {:#04X} (must be 0 to 15).", offset),
            ConfigError::SlotOccupied(slot) => write!(
                f, "Slot {} already holds a card.", slot),
        }
    }
}

impl Error for ConfigError {}

/// Failure to open or parse a disk image.
#[derive(Debug)]
pub struct ImageError {
    desc: String,
}

impl ImageError {
    pub(crate) fn new<S>(desc: S) -> Self
        where S: Into<String>
    {
        ImageError {
            desc: desc.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.desc
    }
}

pub type ImageResult<T> = Result<T, ImageError>;

impl Display for ImageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.desc)
    }
}

impl Error for ImageError {}

/// Convert IO errors to image errors.
impl From<io::Error> for ImageError {
    fn from(e: io::Error) -> Self {
        let msg = match e.kind() {
            io::ErrorKind::NotFound => "File not found",
            io::ErrorKind::PermissionDenied => "Permission denied",
            io::ErrorKind::UnexpectedEof => "Unexpected EOF",
            _ => "Unexpected IO error",
        };
        ImageError {
            desc: format!("IO error: {}.", msg)
        }
    }
}
