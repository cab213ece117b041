//! Peripheral bus emulation for an 8-bit machine with seven expansion slots:
//! the slot attachment every card shares, a ProDOS/SmartPort hard disk card
//! and a Disk II floppy controller, along with the block and nibble media
//! they operate on.

pub mod card;
pub mod error;
pub mod mmu;
pub mod nib;
mod ram;
pub mod slot;
pub mod storage;

pub use crate::card::{build_hard_disk_rom, Card, CardDiskII, CardHardDisk, DriveSelect};
pub use crate::error::{ConfigError, ConfigResult, ImageError, ImageResult};
pub use crate::mmu::MMU;
pub use crate::slot::{IoOffset, Slot};

/// Set up logging for a test. Safe to call more than once.
#[cfg(test)]
pub fn init_test_logging() {
    use simplelog::{Config, LevelFilter, TestLogger};

    let _ = TestLogger::init(LevelFilter::Trace, Config::default());
}
