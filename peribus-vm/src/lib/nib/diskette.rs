use std::io::{self, Read, Write};

use peribus_utils::read_be::ReadBE;
use peribus_utils::write_be::WriteBE;

use super::{NibImage, STEPS_PER_TRACK};
use crate::mmu::FLOATING_BUS;

/// A floppy in a drive, as seen by the head: a stream of disk bytes from
/// whichever track the head is over.
pub trait Diskette {
    /// The drive motor started.
    fn power_on(&mut self) {}
    /// The drive motor stopped.
    fn power_off(&mut self) {}

    /// The next byte under the head.
    fn read(&mut self, quarter_track: usize) -> u8;
    /// Replace the next byte under the head.
    fn write(&mut self, quarter_track: usize, value: u8);

    fn is_write_protected(&self) -> bool;

    /// Persist the head position along the track.
    fn save(&self, output: &mut dyn Write) -> io::Result<()>;
    fn load(&mut self, input: &mut dyn Read) -> io::Result<()>;
}

/// A 16-sector nibble disk. The disk spins under the head whatever track it
/// is on, so there is a single byte position shared by every track.
pub struct Diskette16Sector {
    image: NibImage,
    position: usize,
    write_protected: bool,
}

impl Diskette16Sector {
    pub fn new(image: NibImage) -> Self {
        Diskette16Sector {
            image,
            position: 0,
            write_protected: false,
        }
    }

    pub fn set_write_protected(&mut self, write_protected: bool) {
        self.write_protected = write_protected;
    }

    /// Byte offset of the head along the track.
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn image(&self) -> &NibImage {
        &self.image
    }
}

impl Diskette for Diskette16Sector {
    fn read(&mut self, quarter_track: usize) -> u8 {
        let track = match self.image.track(quarter_track / STEPS_PER_TRACK) {
            Some(track) => track,
            None => return FLOATING_BUS,
        };
        let i = self.position % track.len();
        let value = track[i];
        self.position = (i + 1) % track.len();
        value
    }

    fn write(&mut self, quarter_track: usize, value: u8) {
        let track = match self.image.track_mut(quarter_track / STEPS_PER_TRACK) {
            Some(track) => track,
            None => return,
        };
        let i = self.position % track.len();
        track[i] = value;
        self.position = (i + 1) % track.len();
    }

    fn is_write_protected(&self) -> bool {
        self.write_protected
    }

    fn save(&self, output: &mut dyn Write) -> io::Result<()> {
        output.write_be_u32(self.position as u32)
    }

    fn load(&mut self, input: &mut dyn Read) -> io::Result<()> {
        self.position = input.read_be_u32()? as usize;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use ntest::timeout;

    use crate::nib::{NIB_BYTES_PER_TRACK, NIB_TRACKS};

    /// Track n holds n in its first byte and a counting pattern after.
    fn counting_image() -> NibImage {
        let tracks = (0..NIB_TRACKS)
            .map(|n| {
                let mut track: Vec<u8> = (0..NIB_BYTES_PER_TRACK).map(|i| (i % 251) as u8).collect();
                track[0] = 0x80 | n as u8;
                track
            })
            .collect();
        NibImage::from_tracks(tracks).unwrap()
    }

    #[test]
    #[timeout(10000)]
    fn test_cursor_wraps() {
        let mut disk = Diskette16Sector::new(counting_image());
        let first = disk.read(0);
        for _ in 1..NIB_BYTES_PER_TRACK {
            disk.read(0);
        }
        assert_eq!(disk.position(), 0);
        assert_eq!(disk.read(0), first);
        assert_eq!(disk.position(), 1);
    }

    #[test]
    fn test_cursor_shared_between_tracks() {
        let mut disk = Diskette16Sector::new(counting_image());
        for _ in 0..10 {
            disk.read(0);
        }
        // Quarter tracks 4 to 7 are all track 1.
        assert_eq!(disk.read(5), 10);
        assert_eq!(disk.read(8), 11);
        assert_eq!(disk.position(), 12);

        // Back at the start of the track, each track has its own bytes.
        for _ in 12..NIB_BYTES_PER_TRACK {
            disk.read(0);
        }
        assert_eq!(disk.read(4 * 17), 0x80 | 17);
    }

    #[test]
    fn test_write() {
        let mut disk = Diskette16Sector::new(counting_image());
        disk.read(12);
        disk.write(12, 0xD5);
        disk.write(13, 0xAA);
        assert_eq!(disk.position(), 3);
        assert_eq!(&disk.image().track(3).unwrap()[..4], &[0x83, 0xD5, 0xAA, 3]);
        // Other tracks are untouched.
        assert_eq!(&disk.image().track(2).unwrap()[..4], &[0x82, 1, 2, 3]);
    }

    #[test]
    fn test_off_the_end() {
        let mut disk = Diskette16Sector::new(NibImage::from_tracks(vec![vec![1, 2, 3]]).unwrap());
        assert_eq!(disk.read(4), FLOATING_BUS);
        disk.write(4, 0);
        assert_eq!(disk.position(), 0);
        assert_eq!(disk.read(3), 1);
    }

    #[test]
    fn test_save_load() {
        let mut disk = Diskette16Sector::new(counting_image());
        for _ in 0..300 {
            disk.read(0);
        }
        let mut snapshot = Vec::new();
        disk.save(&mut snapshot).unwrap();
        assert_eq!(snapshot, vec![0, 0, 0x01, 0x2C]);

        let mut restored = Diskette16Sector::new(counting_image());
        restored.load(&mut snapshot.as_slice()).unwrap();
        assert_eq!(restored.position(), 300);
        assert_eq!(restored.read(0), disk.read(0));
    }
}
