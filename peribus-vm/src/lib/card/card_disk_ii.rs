//! The Disk II floppy controller: two drives, each a stepper motor over a
//! spinning nibble disk, driven entirely through the 16 softswitches of the
//! card's I/O page.
//!
//! See "Beneath Apple DOS" chapter 6 and "Understanding the Apple II"
//! chapter 9.

use log::{debug, trace};
use std::io::{self, Read, Write};

use peribus_utils::read_be::ReadBE;
use peribus_utils::write_be::WriteBE;

use super::card_base::{dispatch_load, dispatch_store, CardBase};
use super::card_interface::*;
use crate::error::ConfigResult;
use crate::mmu::FLOATING_BUS;
use crate::nib::{Diskette, MAX_QUARTER_TRACK};
use crate::slot::{IoOffset, Slot};

// Softswitches. Reads and writes behave the same.
const SS_PHASE_BEGIN: u8 = 0x0;    // $0-$7: phase n off at 2n, on at 2n+1.
const SS_MOTOR_OFF: u8 = 0x8;
const SS_MOTOR_ON: u8 = 0x9;
const SS_DRIVE_1: u8 = 0xA;
const SS_DRIVE_2: u8 = 0xB;
const SS_Q6L: u8 = 0xC;
const SS_Q6H: u8 = 0xD;
const SS_Q7L: u8 = 0xE;
const SS_Q7H: u8 = 0xF;

const SS_NAMES: [&str; 16] = [
    "PHASE0OFF", "PHASE0ON", "PHASE1OFF", "PHASE1ON",
    "PHASE2OFF", "PHASE2ON", "PHASE3OFF", "PHASE3ON",
    "MOTOROFF", "MOTORON", "DRIVE1", "DRIVE2",
    "Q6L", "Q6H", "Q7L", "Q7H",
];

const NUM_PHASES: u8 = 4;
/// Quarter tracks between two adjacent magnets.
const STEPS_PER_PHASE: i32 = 2;
/// Quarter tracks in a full cycle of the four magnets.
const STEPS_PER_CYCLE: i32 = STEPS_PER_PHASE * NUM_PHASES as i32;

/// Write protect sense, in the top bit.
const WRITE_PROTECTED: u8 = 0x80;

/// One of the two drives on the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriveSelect {
    Drive1,
    Drive2,
}

impl DriveSelect {
    fn index(self) -> usize {
        match self {
            DriveSelect::Drive1 => 0,
            DriveSelect::Drive2 => 1,
        }
    }
}

#[derive(Default)]
struct Drive {
    diskette: Option<Box<dyn Diskette>>,
    phases: u8,     // Bit n set when magnet n is energized.
    quarter_track: usize,
}

impl Drive {
    fn set_phase(&mut self, phase: u8, on: bool) {
        if on {
            self.phases |= 1 << phase;
        } else {
            self.phases &= !(1 << phase);
        }
        let moved = move_stepper(self.phases, self.quarter_track);
        if moved != self.quarter_track {
            trace!("Head moved from quarter track {} to {}.", self.quarter_track, moved);
            self.quarter_track = moved;
        }
    }
}

/// Where the head settles when the given magnets are energized. Each magnet
/// pulls the head towards itself from at most half a cycle away, and two
/// adjacent magnets hold it between them.
fn move_stepper(phases: u8, current: usize) -> usize {
    let position = (current % STEPS_PER_CYCLE as usize) as i32;

    let mut total = 0;
    let mut pulls = 0;
    for phase in 0..NUM_PHASES {
        if phases & (1 << phase) == 0 {
            continue;
        }
        let magnet = phase as i32 * STEPS_PER_PHASE;
        let delta = (magnet - position + STEPS_PER_CYCLE + STEPS_PER_CYCLE / 2) % STEPS_PER_CYCLE
            - STEPS_PER_CYCLE / 2;
        // Directly opposite: no net pull.
        if delta == -STEPS_PER_CYCLE / 2 {
            continue;
        }
        total += delta;
        pulls += 1;
    }
    if pulls == 0 {
        return current;
    }

    let target = current as i32 + total / pulls;
    target.clamp(0, MAX_QUARTER_TRACK as i32) as usize
}

/// The Disk II controller card.
pub struct CardDiskII {
    base: CardBase<CardDiskII>,
    drives: [Drive; 2],
    selected: DriveSelect,
    motor_on: bool,
    q6: bool,
    q7: bool,
    data_latch: u8,
}

impl CardDiskII {
    pub fn new() -> Self {
        let mut card = CardDiskII {
            base: CardBase::new(),
            drives: Default::default(),
            selected: DriveSelect::Drive1,
            motor_on: false,
            q6: false,
            q7: false,
            data_latch: 0,
        };
        for offset in IoOffset::all() {
            let name = SS_NAMES[offset.index()];
            card.base.add_card_soft_switch_r(offset, |card, offset, _| {
                card.access(offset);
                card.read_data(offset)
            }, name);
            card.base.add_card_soft_switch_w(offset, |card, offset, _, value| {
                card.access(offset);
                card.write_data(value);
            }, name);
        }
        card
    }

    /// Put a disk in a drive, returning whatever was there before.
    pub fn insert_diskette(&mut self, drive: DriveSelect,
                           diskette: Box<dyn Diskette>) -> Option<Box<dyn Diskette>> {
        debug!("Diskette inserted in drive {}.", drive.index() + 1);
        self.drives[drive.index()].diskette.replace(diskette)
    }

    pub fn eject_diskette(&mut self, drive: DriveSelect) -> Option<Box<dyn Diskette>> {
        self.drives[drive.index()].diskette.take()
    }

    pub fn quarter_track(&self, drive: DriveSelect) -> usize {
        self.drives[drive.index()].quarter_track
    }

    pub fn selected_drive(&self) -> DriveSelect {
        self.selected
    }

    pub fn is_motor_on(&self) -> bool {
        self.motor_on
    }

    fn card_base(card: &Self) -> &CardBase<Self> {
        &card.base
    }

    fn drive_mut(&mut self) -> &mut Drive {
        &mut self.drives[self.selected.index()]
    }

    /// The side effect every access has, read or write.
    fn access(&mut self, offset: IoOffset) {
        let switch = offset.index() as u8;
        match switch {
            SS_MOTOR_OFF => self.set_motor(false),
            SS_MOTOR_ON => self.set_motor(true),
            SS_DRIVE_1 => self.select(DriveSelect::Drive1),
            SS_DRIVE_2 => self.select(DriveSelect::Drive2),
            SS_Q6L => self.q6 = false,
            SS_Q6H => self.q6 = true,
            SS_Q7L => self.q7 = false,
            SS_Q7H => self.q7 = true,
            _ => {
                let phase = (switch - SS_PHASE_BEGIN) / 2;
                let on = switch & 1 == 1;
                self.drive_mut().set_phase(phase, on);
            }
        }
    }

    fn set_motor(&mut self, on: bool) {
        if self.motor_on == on {
            return;
        }
        self.motor_on = on;
        debug!("Drive {} motor {}.", self.selected.index() + 1, if on { "on" } else { "off" });
        if let Some(diskette) = self.drive_mut().diskette.as_mut() {
            if on {
                diskette.power_on();
            } else {
                diskette.power_off();
            }
        }
    }

    fn select(&mut self, drive: DriveSelect) {
        if self.selected == drive {
            return;
        }
        // The motor signal follows the selection.
        let motor_on = self.motor_on;
        self.set_motor(false);
        self.selected = drive;
        self.set_motor(motor_on);
    }

    /// What the data bus sees on a read. Only even addresses drive it.
    fn read_data(&mut self, offset: IoOffset) -> u8 {
        if offset.index() % 2 == 1 {
            return FLOATING_BUS;
        }
        match (self.q6, self.q7) {
            (false, false) => {
                if !self.motor_on {
                    return FLOATING_BUS;
                }
                let drive = &mut self.drives[self.selected.index()];
                match drive.diskette.as_mut() {
                    Some(diskette) => {
                        self.data_latch = diskette.read(drive.quarter_track);
                        self.data_latch
                    }
                    None => FLOATING_BUS,
                }
            }
            (true, false) => {
                let protected = self.drives[self.selected.index()].diskette.as_ref()
                    .map_or(false, |diskette| diskette.is_write_protected());
                if protected { WRITE_PROTECTED } else { 0 }
            }
            _ => self.data_latch,
        }
    }

    /// In write mode with the motor on, the value goes to the disk.
    fn write_data(&mut self, value: u8) {
        if !(self.q6 && self.q7 && self.motor_on) {
            return;
        }
        self.data_latch = value;
        let drive = &mut self.drives[self.selected.index()];
        if let Some(diskette) = drive.diskette.as_mut() {
            if diskette.is_write_protected() {
                trace!("Write of ${:02X} to a protected diskette dropped.", value);
            } else {
                diskette.write(drive.quarter_track, value);
            }
        }
    }
}

impl Default for CardDiskII {
    fn default() -> Self {
        Self::new()
    }
}

impl Card for CardDiskII {
    fn name(&self) -> &'static str {
        "Disk II"
    }

    fn load_rom(&mut self, data: Vec<u8>) -> ConfigResult<()> {
        self.base.load_rom(data)
    }

    fn assign(&mut self, bus: &mut dyn SlotRegistry, slot: Slot) -> ConfigResult<()> {
        self.base.assign(bus, slot)
    }

    fn load_io(&mut self, offset: IoOffset, memory: &mut dyn Memory) -> u8 {
        dispatch_load(self, Self::card_base, offset, memory)
    }

    fn store_io(&mut self, offset: IoOffset, memory: &mut dyn Memory, value: u8) {
        dispatch_store(self, Self::card_base, offset, memory, value)
    }

    fn save(&self, output: &mut dyn Write) -> io::Result<()> {
        output.write_u8(self.selected.index() as u8)?;
        output.write_bool(self.motor_on)?;
        output.write_bool(self.q6)?;
        output.write_bool(self.q7)?;
        output.write_u8(self.data_latch)?;
        for drive in self.drives.iter() {
            output.write_u8(drive.phases)?;
            output.write_be_u16(drive.quarter_track as u16)?;
            output.write_bool(drive.diskette.is_some())?;
            if let Some(diskette) = &drive.diskette {
                diskette.save(output)?;
            }
        }
        Ok(())
    }

    fn load(&mut self, input: &mut dyn Read) -> io::Result<()> {
        self.selected = match input.read_u8()? {
            0 => DriveSelect::Drive1,
            1 => DriveSelect::Drive2,
            n => return Err(io::Error::new(
                io::ErrorKind::InvalidData, format!("Invalid drive number {}.", n))),
        };
        self.motor_on = input.read_bool()?;
        self.q6 = input.read_bool()?;
        self.q7 = input.read_bool()?;
        self.data_latch = input.read_u8()?;
        for (i, drive) in self.drives.iter_mut().enumerate() {
            drive.phases = input.read_u8()? & 0x0F;
            drive.quarter_track = (input.read_be_u16()? as usize).min(MAX_QUARTER_TRACK);
            let present = input.read_bool()?;
            match (present, drive.diskette.as_mut()) {
                (true, Some(diskette)) => diskette.load(input)?,
                (false, None) => {}
                _ => return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("Snapshot does not match the diskette in drive {}.", i + 1))),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::init_test_logging;
    use crate::mmu::MMU;
    use crate::nib::{Diskette16Sector, NibImage, NIB_BYTES_PER_TRACK, NIB_TRACKS};

    const SLOT: u8 = 6;

    /// A Disk II card in slot 6 with a diskette in drive 1, accessed through
    /// the bus.
    struct DiskIIFixture {
        mmu: MMU,
        slot: Slot,
    }

    impl DiskIIFixture {
        fn new(write_protected: bool) -> Self {
            init_test_logging();

            let slot = Slot::new(SLOT).unwrap();
            let mut diskette = Diskette16Sector::new(numbered_image());
            diskette.set_write_protected(write_protected);
            let mut card = CardDiskII::new();
            card.load_rom(vec![0xEA; ROM_SIZE_SLOT_PAGE]).unwrap();
            card.insert_diskette(DriveSelect::Drive1, Box::new(diskette));
            let mut mmu = MMU::new();
            mmu.insert_card(slot, Box::new(card)).unwrap();
            DiskIIFixture { mmu, slot }
        }

        fn read(&mut self, switch: u8) -> u8 {
            let address = self.slot.io_address(IoOffset::at(switch));
            self.mmu.peek(address)
        }

        fn write(&mut self, switch: u8, value: u8) {
            let address = self.slot.io_address(IoOffset::at(switch));
            self.mmu.poke(address, value);
        }

        /// Flip a switch without reading the data latch.
        fn touch(&mut self, switch: u8) {
            self.write(switch, 0);
        }

        fn phase(&mut self, phase: u8, on: bool) {
            self.touch(SS_PHASE_BEGIN + phase * 2 + on as u8);
        }
    }

    /// Each track starts with $80 + its number, followed by a counting
    /// pattern.
    fn numbered_image() -> NibImage {
        let tracks = (0..NIB_TRACKS)
            .map(|n| {
                let mut track: Vec<u8> = (0..NIB_BYTES_PER_TRACK).map(|i| i as u8).collect();
                track[0] = 0x80 + n as u8;
                track
            })
            .collect();
        NibImage::from_tracks(tracks).unwrap()
    }

    #[test]
    fn test_stepper() {
        // One magnet pulls half a track, two adjacent hold a quarter track.
        assert_eq!(move_stepper(0b0010, 0), 2);
        assert_eq!(move_stepper(0b0011, 0), 1);
        assert_eq!(move_stepper(0b0100, 2), 4);
        assert_eq!(move_stepper(0b0001, 2), 0);
        // The opposite magnet does nothing.
        assert_eq!(move_stepper(0b0100, 0), 0);
        assert_eq!(move_stepper(0b0000, 7), 7);
        // Clamped at both ends.
        assert_eq!(move_stepper(0b1000, 0), 0);
        assert_eq!(move_stepper(0b0001, MAX_QUARTER_TRACK), MAX_QUARTER_TRACK);
        assert_eq!(move_stepper(0b0010, MAX_QUARTER_TRACK), MAX_QUARTER_TRACK);
    }

    #[test]
    fn test_seek_one_track() {
        let mut fixture = DiskIIFixture::new(false);

        fixture.phase(0, true);
        fixture.phase(1, true);
        fixture.phase(0, false);
        fixture.phase(2, true);
        fixture.phase(1, false);
        fixture.phase(2, false);

        // Now over track 1, still at the start of the track.
        fixture.touch(SS_MOTOR_ON);
        assert_eq!(fixture.read(SS_Q6L), 0x81);
    }

    #[test]
    fn test_read_walks_cursor() {
        let mut fixture = DiskIIFixture::new(false);

        // Motor off: nothing to read.
        assert_eq!(fixture.read(SS_Q6L), FLOATING_BUS);

        fixture.touch(SS_MOTOR_ON);
        assert_eq!(fixture.read(SS_Q6L), 0x80);
        assert_eq!(fixture.read(SS_Q6L), 1);
        assert_eq!(fixture.read(SS_Q6L), 2);
        // Odd addresses do not drive the bus or move the disk.
        assert_eq!(fixture.read(SS_Q6H), FLOATING_BUS);
        fixture.touch(SS_Q6L);
        assert_eq!(fixture.read(SS_Q6L), 3);

        // Step in to track 1; the cursor carries on where it was.
        fixture.phase(1, true);
        fixture.phase(2, true);
        fixture.phase(1, false);
        fixture.phase(2, false);
        assert_eq!(fixture.read(SS_Q6L), 4);

        fixture.touch(SS_MOTOR_OFF);
        assert_eq!(fixture.read(SS_Q6L), FLOATING_BUS);
    }

    #[test]
    fn test_drive_2_empty() {
        let mut fixture = DiskIIFixture::new(false);
        fixture.touch(SS_MOTOR_ON);
        fixture.touch(SS_DRIVE_2);
        assert_eq!(fixture.read(SS_Q6L), FLOATING_BUS);
        fixture.touch(SS_DRIVE_1);
        assert_eq!(fixture.read(SS_Q6L), 0x80);
    }

    #[test]
    fn test_eject() {
        let mut card = CardDiskII::new();
        assert!(card.eject_diskette(DriveSelect::Drive1).is_none());
        card.insert_diskette(DriveSelect::Drive2, Box::new(Diskette16Sector::new(numbered_image())));
        assert!(card.eject_diskette(DriveSelect::Drive1).is_none());
        let mut diskette = card.eject_diskette(DriveSelect::Drive2).unwrap();
        assert_eq!(diskette.read(0), 0x80);
        assert!(card.eject_diskette(DriveSelect::Drive2).is_none());
    }

    #[test]
    fn test_write_protect_sense() {
        let mut fixture = DiskIIFixture::new(true);
        fixture.touch(SS_Q6H);
        assert_eq!(fixture.read(SS_Q7L) & 0x80, 0x80);

        let mut fixture = DiskIIFixture::new(false);
        fixture.touch(SS_Q6H);
        assert_eq!(fixture.read(SS_Q7L) & 0x80, 0x00);
    }

    #[test]
    fn test_write() {
        let mut fixture = DiskIIFixture::new(false);
        fixture.read(SS_MOTOR_ON);
        fixture.read(SS_Q6H);
        fixture.read(SS_Q7H);
        fixture.write(SS_Q6H, 0xD5);
        fixture.write(SS_Q6H, 0xAA);

        // Back to read mode and round once more to the start.
        fixture.touch(SS_Q7L);
        fixture.touch(SS_Q6L);
        for _ in 2..NIB_BYTES_PER_TRACK {
            fixture.read(SS_Q6L);
        }
        assert_eq!(fixture.read(SS_Q6L), 0xD5);
        assert_eq!(fixture.read(SS_Q6L), 0xAA);
        assert_eq!(fixture.read(SS_Q6L), 2);
    }

    #[test]
    fn test_write_protected_drops_writes() {
        let mut fixture = DiskIIFixture::new(true);
        fixture.read(SS_MOTOR_ON);
        fixture.read(SS_Q6H);
        fixture.read(SS_Q7H);
        fixture.write(SS_Q6H, 0xD5);

        fixture.touch(SS_Q7L);
        fixture.touch(SS_Q6L);
        assert_eq!(fixture.read(SS_Q6L), 0x80);
    }

    #[test]
    fn test_save_load() {
        init_test_logging();

        let mut card = CardDiskII::new();
        card.insert_diskette(DriveSelect::Drive2, Box::new(Diskette16Sector::new(numbered_image())));
        let mut mmu = MMU::new();
        for switch in [SS_DRIVE_2, SS_MOTOR_ON, SS_PHASE_BEGIN + 3] {
            card.store_io(IoOffset::at(switch), &mut mmu, 0);
        }
        assert_eq!(card.quarter_track(DriveSelect::Drive2), 2);
        assert_eq!(card.load_io(IoOffset::at(SS_Q6L), &mut mmu), 0x80);
        assert_eq!(card.load_io(IoOffset::at(SS_Q6L), &mut mmu), 1);

        let mut snapshot = Vec::new();
        card.save(&mut snapshot).unwrap();
        assert_eq!(snapshot, vec![
            1, 1, 0, 0, 1,      // Drive 2, motor on, Q6L, Q7L, latch.
            0, 0, 0, 0,         // Drive 1: no phases, track 0, empty.
            0b0010, 0, 2, 1,    // Drive 2: phase 1, quarter track 2, diskette...
            0, 0, 0, 2,         // ...at position 2.
        ]);

        let mut restored = CardDiskII::new();
        restored.insert_diskette(DriveSelect::Drive2, Box::new(Diskette16Sector::new(numbered_image())));
        restored.load(&mut snapshot.as_slice()).unwrap();
        assert_eq!(restored.selected_drive(), DriveSelect::Drive2);
        assert!(restored.is_motor_on());
        assert_eq!(restored.quarter_track(DriveSelect::Drive2), 2);
        assert_eq!(restored.load_io(IoOffset::at(SS_Q6L), &mut mmu), 2);

        // A diskette missing from the snapshot's drive is an error.
        let mut empty = CardDiskII::new();
        assert!(empty.load(&mut snapshot.as_slice()).is_err());
    }
}
