use log::{info, trace, warn};
use std::io::{self, Read, Write};

use peribus_utils::read_be::ReadBE;
use peribus_utils::write_be::WriteBE;

use crate::card::{Card, Memory, RomWindow, SlotRegistry};
use crate::error::{ConfigError, ConfigResult};
use crate::ram::RAM;
use crate::slot::{BEGIN_CARD_SPACE, BEGIN_EXPANSION_ROM, BEGIN_SLOT_IO, BEGIN_SLOT_ROM,
                  END_CARD_SPACE, IoOffset, NUM_SLOTS, Slot};

/// The value read from an address nothing drives.
pub const FLOATING_BUS: u8 = 0xFF;

// Memory-mapped zones outside the card area.
const BEGIN_RAM: u16 = 0x0000;                  // Read/Write
const BEGIN_HIGH_RAM: u16 = END_CARD_SPACE;     // Read/Write

/// Any access here releases the expansion ROM window.
const EXPANSION_ROM_RELEASE: u16 = END_CARD_SPACE - 1;

const SLOT_IO_SIZE: usize = (BEGIN_SLOT_ROM - BEGIN_SLOT_IO) as usize;

pub const RAM_SIZE: usize = 0x10000;

/// Snapshot marker for "no expansion ROM selected".
const NO_ACTIVE_SLOT: u8 = 0xFF;

/// The bus: RAM plus the slot area, routing every access in a card's ranges
/// to that card.
pub struct MMU {
    ram: RAM,
    cards: [Option<Box<dyn Card>>; NUM_SLOTS],
    card_rom: [Option<RomWindow>; NUM_SLOTS],
    card_rom_extra: [Option<RomWindow>; NUM_SLOTS],
    active_rom_extra: Option<Slot>,
    ss_r_names: [Option<&'static str>; SLOT_IO_SIZE],
    ss_w_names: [Option<&'static str>; SLOT_IO_SIZE],
}

impl MMU {
    /// An empty machine: zeroed RAM and no cards.
    pub fn new() -> Self {
        MMU {
            ram: RAM::new(),
            cards: Default::default(),
            card_rom: Default::default(),
            card_rom_extra: Default::default(),
            active_rom_extra: None,
            ss_r_names: [None; SLOT_IO_SIZE],
            ss_w_names: [None; SLOT_IO_SIZE],
        }
    }

    /// Put a card in a slot. The card registers its ROM and softswitches
    /// with the bus, then stays in the slot for the life of the machine.
    pub fn insert_card(&mut self, slot: Slot, mut card: Box<dyn Card>) -> ConfigResult<()> {
        if self.cards[slot.index()].is_some() {
            return Err(ConfigError::SlotOccupied(slot));
        }
        card.assign(self, slot)?;
        info!("{} card inserted in slot {}.", card.name(), slot);
        self.cards[slot.index()] = Some(card);
        Ok(())
    }

    pub fn card(&self, slot: Slot) -> Option<&dyn Card> {
        self.cards[slot.index()].as_deref()
    }

    /// The ROM page registered for a slot.
    pub fn card_rom(&self, slot: Slot) -> Option<&RomWindow> {
        self.card_rom[slot.index()].as_ref()
    }

    /// The expansion ROM registered for a slot.
    pub fn card_rom_extra(&self, slot: Slot) -> Option<&RomWindow> {
        self.card_rom_extra[slot.index()].as_ref()
    }

    /// Which slot currently drives $C800-$CFFF.
    pub fn active_rom_extra(&self) -> Option<Slot> {
        self.active_rom_extra
    }

    pub fn load_8(&mut self, address: u16) -> u8 {
        if address < BEGIN_CARD_SPACE {  // RAM
            self.ram[address - BEGIN_RAM]
        } else if address < BEGIN_SLOT_IO {  // Built-in softswitches
            trace!("Unhandled softswitch read at ${:04X}.", address);
            FLOATING_BUS
        } else if address < BEGIN_SLOT_ROM {  // Card I/O
            self.load_io(address)
        } else if address < BEGIN_EXPANSION_ROM {  // Card ROM page
            let slot = self.select_rom_extra(address);
            self.card_rom[slot.index()].as_ref()
                .and_then(|rom| rom.peek(address))
                .unwrap_or(FLOATING_BUS)
        } else if address < BEGIN_HIGH_RAM {  // Expansion ROM
            let value = self.active_rom_extra
                .and_then(|slot| self.card_rom_extra[slot.index()].as_ref())
                .and_then(|rom| rom.peek(address))
                .unwrap_or(FLOATING_BUS);
            self.release_rom_extra(address);
            value
        } else {  // RAM
            self.ram[address]
        }
    }

    pub fn store_8(&mut self, address: u16, value: u8) {
        if address < BEGIN_CARD_SPACE {  // RAM
            self.ram[address - BEGIN_RAM] = value;
        } else if address < BEGIN_SLOT_IO {  // Built-in softswitches
            trace!("Unhandled softswitch write of ${:02X} at ${:04X}.", value, address);
        } else if address < BEGIN_SLOT_ROM {  // Card I/O
            self.store_io(address, value);
        } else if address < BEGIN_EXPANSION_ROM {  // Card ROM page, read-only
            self.select_rom_extra(address);
        } else if address < BEGIN_HIGH_RAM {  // Expansion ROM, read-only
            self.release_rom_extra(address);
        } else {  // RAM
            self.ram[address] = value;
        }
    }

    /// Write the state of every card, slot by slot. Empty slots are marked
    /// so the layout can be checked on load.
    pub fn save_cards(&self, output: &mut dyn Write) -> io::Result<()> {
        output.write_u8(self.active_rom_extra.map_or(NO_ACTIVE_SLOT, Slot::number))?;
        for card in self.cards.iter() {
            output.write_bool(card.is_some())?;
            if let Some(card) = card {
                card.save(output)?;
            }
        }
        Ok(())
    }

    /// Restore card state written by `save_cards`. The same cards must be
    /// installed in the same slots.
    pub fn load_cards(&mut self, input: &mut dyn Read) -> io::Result<()> {
        let active = input.read_u8()?;
        self.active_rom_extra = match active {
            NO_ACTIVE_SLOT => None,
            n => Some(Slot::new(n).map_err(
                |e| io::Error::new(io::ErrorKind::InvalidData, e.to_string()))?),
        };
        for (i, card) in self.cards.iter_mut().enumerate() {
            let present = input.read_bool()?;
            if present != card.is_some() {
                return Err(io::Error::new(
                    io::ErrorKind::InvalidData,
                    format!("Snapshot does not match the card in slot {}.", i)));
            }
            if let Some(card) = card {
                card.load(input)?;
            }
        }
        Ok(())
    }

    /// Slot whose I/O page holds the address, which must be in the slot I/O
    /// range.
    fn io_slot(address: u16) -> usize {
        ((address - BEGIN_SLOT_IO) >> 4) as usize
    }

    fn load_io(&mut self, address: u16) -> u8 {
        let name = match self.ss_r_names[(address - BEGIN_SLOT_IO) as usize] {
            Some(name) => name,
            None => {
                trace!("Unmapped card read at ${:04X}.", address);
                return FLOATING_BUS;
            }
        };

        // The card is out of its slot while its handler runs, so the handler
        // can use the bus without aliasing itself.
        let slot = Self::io_slot(address);
        let mut card = match self.cards[slot].take() {
            Some(card) => card,
            None => {
                warn!("Reentrant read of {} (${:04X}) ignored.", name, address);
                return FLOATING_BUS;
            }
        };
        let value = card.load_io(IoOffset::of_address(address), self);
        self.cards[slot] = Some(card);
        trace!("Softswitch {} (${:04X}) read: ${:02X}.", name, address, value);
        value
    }

    fn store_io(&mut self, address: u16, value: u8) {
        let name = match self.ss_w_names[(address - BEGIN_SLOT_IO) as usize] {
            Some(name) => name,
            None => {
                trace!("Unmapped card write of ${:02X} at ${:04X}.", value, address);
                return;
            }
        };

        let slot = Self::io_slot(address);
        let mut card = match self.cards[slot].take() {
            Some(card) => card,
            None => {
                warn!("Reentrant write of {} (${:04X}) ignored.", name, address);
                return;
            }
        };
        trace!("Softswitch {} (${:04X}) write: ${:02X}.", name, address, value);
        card.store_io(IoOffset::of_address(address), self, value);
        self.cards[slot] = Some(card);
    }

    /// An access to $Cs00-$CsFF hands the expansion ROM window to slot s, if
    /// that slot has one.
    fn select_rom_extra(&mut self, address: u16) -> Slot {
        let slot = Slot::of_rom_page(address);
        if self.card_rom_extra[slot.index()].is_some() && self.active_rom_extra != Some(slot) {
            trace!("Expansion ROM of slot {} selected.", slot);
            self.active_rom_extra = Some(slot);
        }
        slot
    }

    fn release_rom_extra(&mut self, address: u16) {
        if address == EXPANSION_ROM_RELEASE && self.active_rom_extra.is_some() {
            trace!("Expansion ROM released.");
            self.active_rom_extra = None;
        }
    }
}

impl Default for MMU {
    fn default() -> Self {
        Self::new()
    }
}

impl Memory for MMU {
    fn peek(&mut self, address: u16) -> u8 {
        self.load_8(address)
    }

    fn poke(&mut self, address: u16, value: u8) {
        self.store_8(address, value)
    }
}

impl SlotRegistry for MMU {
    fn set_card_rom(&mut self, slot: Slot, rom: RomWindow) {
        self.card_rom[slot.index()] = Some(rom);
    }

    fn set_card_rom_extra(&mut self, slot: Slot, rom: RomWindow) {
        self.card_rom_extra[slot.index()] = Some(rom);
    }

    fn add_soft_switch_r(&mut self, address: u16, name: Option<&'static str>) {
        self.ss_r_names[(address - BEGIN_SLOT_IO) as usize] = name;
    }

    fn add_soft_switch_w(&mut self, address: u16, name: Option<&'static str>) {
        self.ss_w_names[(address - BEGIN_SLOT_IO) as usize] = name;
    }
}
