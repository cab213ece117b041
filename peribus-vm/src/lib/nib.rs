//! Floppy media at the nibble level: whole tracks of disk bytes as the
//! drive head sees them, plus the encoder that builds them from sector
//! images.

mod diskette;
mod nib_encoder;
mod nib_image;

pub use diskette::*;
pub use nib_encoder::{nibble_track, SectorOrder, DEFAULT_VOLUME};
pub use nib_image::NibImage;

pub const NIB_TRACKS: usize = 35;
pub const NIB_BYTES_PER_TRACK: usize = 6656;
pub const NIB_IMAGE_SIZE: usize = NIB_TRACKS * NIB_BYTES_PER_TRACK;

pub const SECTORS_PER_TRACK: usize = 16;
pub const SECTOR_SIZE: usize = 256;
pub const TRACK_SIZE: usize = SECTORS_PER_TRACK * SECTOR_SIZE;
pub const DSK_IMAGE_SIZE: usize = NIB_TRACKS * TRACK_SIZE;

/// Head positions per physical track.
pub const STEPS_PER_TRACK: usize = 4;
/// Innermost reachable head position.
pub const MAX_QUARTER_TRACK: usize = (NIB_TRACKS - 1) * STEPS_PER_TRACK;
