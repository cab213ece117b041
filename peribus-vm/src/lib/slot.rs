use std::convert::TryFrom;
use std::fmt::{self, Display, Formatter};

use crate::error::ConfigError;

/// Number of slot positions, including the built-in slot 0.
pub const NUM_SLOTS: usize = 8;

/// Number of softswitch addresses in each slot's I/O page.
pub const IO_PAGE_SIZE: usize = 0x10;

/// Size of each slot's ROM page.
pub const ROM_PAGE_SIZE: usize = 0x100;

// The card area of the address space.
pub const BEGIN_CARD_SPACE: u16 = 0xC000;       // Built-in softswitches
pub const BEGIN_SLOT_IO: u16 = 0xC080;          // Slot I/O pages, slot 0 first
pub const BEGIN_SLOT_ROM: u16 = 0xC100;         // ROM page of slot 1
pub const BEGIN_EXPANSION_ROM: u16 = 0xC800;    // Shared expansion ROM window
pub const END_CARD_SPACE: u16 = 0xD000;

/// An expansion slot number, 0 to 7. Slot 0 is for cards that do not sit in
/// the standard expansion window, so their ROM is never relocated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Slot(u8);

impl Slot {
    pub fn new(number: u8) -> Result<Self, ConfigError> {
        if (number as usize) < NUM_SLOTS {
            Ok(Slot(number))
        } else {
            Err(ConfigError::InvalidSlot(number))
        }
    }

    /// The slot whose ROM page ($Cs00-$CsFF) holds the address.
    pub(crate) fn of_rom_page(address: u16) -> Self {
        Slot(((address >> 8) & 0x07) as u8)
    }

    pub fn number(self) -> u8 {
        self.0
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    /// Slot 0 has no ROM window of its own.
    pub fn is_relocatable(self) -> bool {
        self.0 != 0
    }

    /// First address of the slot's 16-byte I/O page: $C080 + slot*$10.
    pub fn io_base(self) -> u16 {
        BEGIN_SLOT_IO + (self.0 as u16) * IO_PAGE_SIZE as u16
    }

    /// First address of the slot's 256-byte ROM page: $Cs00.
    pub fn rom_base(self) -> u16 {
        BEGIN_CARD_SPACE + (self.0 as u16) * ROM_PAGE_SIZE as u16
    }

    /// Address of the given softswitch in this slot's I/O page.
    pub fn io_address(self, offset: IoOffset) -> u16 {
        self.io_base() + offset.0 as u16
    }
}

impl Display for Slot {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<u8> for Slot {
    type Error = ConfigError;

    fn try_from(number: u8) -> Result<Self, Self::Error> {
        Slot::new(number)
    }
}

/// An offset inside a slot's I/O page, 0 to 15.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IoOffset(u8);

impl IoOffset {
    /// For offsets known at compile time. Out of range is a compile error when
    /// used in a constant.
    pub const fn at(offset: u8) -> Self {
        assert!((offset as usize) < IO_PAGE_SIZE, "I/O page offset out of range");
        IoOffset(offset)
    }

    /// The offset of an address within whichever I/O page it falls in.
    pub fn of_address(address: u16) -> Self {
        IoOffset((address & 0x0F) as u8)
    }

    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn all() -> impl Iterator<Item=IoOffset> {
        (0..IO_PAGE_SIZE as u8).map(IoOffset)
    }
}

impl TryFrom<u8> for IoOffset {
    type Error = ConfigError;

    fn try_from(offset: u8) -> Result<Self, Self::Error> {
        if (offset as usize) < IO_PAGE_SIZE {
            Ok(IoOffset(offset))
        } else {
            Err(ConfigError::InvalidIoOffset(offset))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_addresses() {
        for n in 1..8 {
            let slot = Slot::new(n).unwrap();
            assert_eq!(slot.io_base(), 0xC080 + n as u16 * 0x10);
            assert_eq!(slot.rom_base(), 0xC000 + n as u16 * 0x100);
            assert!(slot.is_relocatable());
        }
        let slot7 = Slot::new(7).unwrap();
        assert_eq!(slot7.io_base(), 0xC0F0);
        assert_eq!(slot7.io_address(IoOffset::at(5)), 0xC0F5);
        assert!(!Slot::new(0).unwrap().is_relocatable());
    }

    #[test]
    fn test_card_space_layout() {
        let first = Slot::new(1).unwrap();
        let last = Slot::new(7).unwrap();
        assert_eq!(Slot::new(0).unwrap().io_base(), BEGIN_SLOT_IO);
        assert_eq!(last.io_base() + IO_PAGE_SIZE as u16, BEGIN_SLOT_ROM);
        assert_eq!(first.rom_base(), BEGIN_SLOT_ROM);
        assert_eq!(last.rom_base() + ROM_PAGE_SIZE as u16, BEGIN_EXPANSION_ROM);
        assert_eq!(Slot::of_rom_page(BEGIN_SLOT_ROM), first);
        assert!(BEGIN_CARD_SPACE < BEGIN_SLOT_IO && BEGIN_EXPANSION_ROM < END_CARD_SPACE);
    }

    #[test]
    fn test_out_of_range() {
        assert_eq!(Slot::new(8), Err(ConfigError::InvalidSlot(8)));
        assert_eq!(IoOffset::try_from(16), Err(ConfigError::InvalidIoOffset(16)));
        assert_eq!(IoOffset::try_from(15).unwrap().index(), 15);
        assert_eq!(IoOffset::of_address(0xC0EC).index(), 0xC);
        assert_eq!(IoOffset::all().count(), 16);
    }
}
