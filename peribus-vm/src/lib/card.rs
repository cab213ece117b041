mod card_base;
mod card_disk_ii;
mod card_hard_disk;
mod card_interface;

pub use card_base::{CardBase, RomWindow};
pub use card_disk_ii::{CardDiskII, DriveSelect};
pub use card_hard_disk::*;
pub use card_interface::*;

// Mock implementation for testing.
#[cfg(test)]
mod card_mock;
#[cfg(test)]
pub use card_mock::MockCard;
