use std::io::{self, Read, Write};

use crate::card::RomWindow;
use crate::error::ConfigResult;
use crate::slot::{IoOffset, ROM_PAGE_SIZE, Slot};

// Sizes of card ROM images.
pub const ROM_SIZE_SLOT_PAGE: usize = ROM_PAGE_SIZE;  // Cs00 only.
pub const ROM_SIZE_EXPANSION: usize = 0x800;    // Cs00 plus C800.
pub const ROM_SIZE_FULL: usize = 0x1000;        // The whole of C000-CFFF.

/// Handler for a read from one of the card's softswitches.
pub type SoftSwitchR<C> = fn(&mut C, IoOffset, &mut dyn Memory) -> u8;
/// Handler for a write to one of the card's softswitches.
pub type SoftSwitchW<C> = fn(&mut C, IoOffset, &mut dyn Memory, u8);

/// Byte-level access to the guest address space. Cards use this both to
/// fetch command parameters and to move data, so every access goes through
/// the same path a CPU access would.
pub trait Memory {
    fn peek(&mut self, address: u16) -> u8;
    fn poke(&mut self, address: u16, value: u8);

    /// Read a little-endian word, wrapping at the top of memory.
    fn peek_word(&mut self, address: u16) -> u16 {
        let lo = self.peek(address) as u16;
        let hi = self.peek(address.wrapping_add(1)) as u16;
        lo | (hi << 8)
    }
}

/// The parts of the bus a card hooks itself into when it is inserted.
pub trait SlotRegistry {
    /// Install the ROM page for the slot ($Cs00-$CsFF).
    fn set_card_rom(&mut self, slot: Slot, rom: RomWindow);
    /// Install the shared expansion ROM for the slot ($C800-$CFFF).
    fn set_card_rom_extra(&mut self, slot: Slot, rom: RomWindow);
    /// Register a read softswitch. `None` leaves the address unmapped.
    fn add_soft_switch_r(&mut self, address: u16, name: Option<&'static str>);
    /// Register a write softswitch. `None` leaves the address unmapped.
    fn add_soft_switch_w(&mut self, address: u16, name: Option<&'static str>);
}

/// An expansion card.
pub trait Card {
    fn name(&self) -> &'static str;

    /// Install the card ROM. Must happen before `assign`.
    fn load_rom(&mut self, data: Vec<u8>) -> ConfigResult<()>;

    /// Insert the card in a slot, registering its ROM and softswitches.
    fn assign(&mut self, bus: &mut dyn SlotRegistry, slot: Slot) -> ConfigResult<()>;

    /// Handle a read from the card's I/O page.
    fn load_io(&mut self, offset: IoOffset, memory: &mut dyn Memory) -> u8;

    /// Handle a write to the card's I/O page.
    fn store_io(&mut self, offset: IoOffset, memory: &mut dyn Memory, value: u8);

    /// Persist any mutable card state.
    fn save(&self, _output: &mut dyn Write) -> io::Result<()> {
        Ok(())
    }

    /// Restore state written by `save`.
    fn load(&mut self, _input: &mut dyn Read) -> io::Result<()> {
        Ok(())
    }
}
