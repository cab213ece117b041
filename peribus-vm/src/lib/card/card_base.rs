use log::debug;
use std::rc::Rc;

use super::card_interface::*;
use crate::error::{ConfigError, ConfigResult};
use crate::mmu::FLOATING_BUS;
use crate::slot::{BEGIN_CARD_SPACE, BEGIN_EXPANSION_ROM, IO_PAGE_SIZE, IoOffset, Slot};

/// A read-only window of card ROM mapped at a base address. Clones share
/// the underlying bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RomWindow {
    base: u16,
    data: Rc<[u8]>,
}

impl RomWindow {
    pub fn new(base: u16, data: Rc<[u8]>) -> Self {
        RomWindow { base, data }
    }

    pub fn base(&self) -> u16 {
        self.base
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data
    }

    fn relocate(&mut self, base: u16) {
        self.base = base;
    }

    /// The byte at the given bus address, if the window covers it.
    pub fn peek(&self, address: u16) -> Option<u8> {
        let offset = address.checked_sub(self.base)? as usize;
        self.data.get(offset).copied()
    }
}

/// The slot attachment shared by every card: ROM windows plus the table of
/// softswitch handlers for the 16 addresses of the card's I/O page.
///
/// `C` is the concrete card type the handlers operate on.
pub struct CardBase<C> {
    rom_csxx: Option<RomWindow>,
    rom_c8xx: Option<RomWindow>,
    rom_cxxx: Option<RomWindow>,
    slot: Option<Slot>,
    ssr: [Option<SoftSwitchR<C>>; IO_PAGE_SIZE],
    ssw: [Option<SoftSwitchW<C>>; IO_PAGE_SIZE],
    ssr_name: [&'static str; IO_PAGE_SIZE],
    ssw_name: [&'static str; IO_PAGE_SIZE],
}

impl<C> CardBase<C> {
    pub fn new() -> Self {
        CardBase {
            rom_csxx: None,
            rom_c8xx: None,
            rom_cxxx: None,
            slot: None,
            ssr: [None; IO_PAGE_SIZE],
            ssw: [None; IO_PAGE_SIZE],
            ssr_name: [""; IO_PAGE_SIZE],
            ssw_name: [""; IO_PAGE_SIZE],
        }
    }

    /// The slot the card was assigned to, if any.
    pub fn slot(&self) -> Option<Slot> {
        self.slot
    }

    pub fn load_rom(&mut self, data: Vec<u8>) -> ConfigResult<()> {
        if self.slot.is_some() {
            return Err(ConfigError::RomAfterAssign);
        }

        self.rom_csxx = None;
        self.rom_c8xx = None;
        self.rom_cxxx = None;
        match data.len() {
            ROM_SIZE_SLOT_PAGE => {
                // Just 256 bytes in Cs00.
                self.rom_csxx = Some(RomWindow::new(0, Rc::from(data)));
            }
            ROM_SIZE_EXPANSION => {
                // The image covers C800-CFFF; its first page also shows in Cs00.
                let data: Rc<[u8]> = Rc::from(data);
                self.rom_csxx = Some(RomWindow::new(0, Rc::from(&data[..ROM_SIZE_SLOT_PAGE])));
                self.rom_c8xx = Some(RomWindow::new(BEGIN_EXPANSION_ROM, data));
            }
            ROM_SIZE_FULL => {
                // The image covers the full Cxxx range. Only the page of the
                // assigned slot is visible in Cs00.
                self.rom_cxxx = Some(RomWindow::new(BEGIN_CARD_SPACE, Rc::from(data)));
            }
            size => return Err(ConfigError::InvalidRomSize(size)),
        }
        Ok(())
    }

    pub fn assign(&mut self, bus: &mut dyn SlotRegistry, slot: Slot) -> ConfigResult<()> {
        if let Some(current) = self.slot {
            return Err(ConfigError::AlreadyAssigned(current));
        }
        self.slot = Some(slot);

        if slot.is_relocatable() {
            if let Some(rom) = &mut self.rom_csxx {
                rom.relocate(slot.rom_base());
                bus.set_card_rom(slot, rom.clone());
            }
            if let Some(rom) = &self.rom_c8xx {
                bus.set_card_rom_extra(slot, rom.clone());
            }
            if let Some(rom) = &self.rom_cxxx {
                bus.set_card_rom(slot, rom.clone());
                bus.set_card_rom_extra(slot, rom.clone());
            }
        }

        for offset in IoOffset::all() {
            let i = offset.index();
            let address = slot.io_address(offset);
            bus.add_soft_switch_r(address, self.ssr[i].map(|_| self.ssr_name[i]));
            bus.add_soft_switch_w(address, self.ssw[i].map(|_| self.ssw_name[i]));
        }
        debug!("Card base assigned to slot {}.", slot);
        Ok(())
    }

    pub fn add_card_soft_switch_r(&mut self, offset: IoOffset, ss: SoftSwitchR<C>,
                                  name: &'static str) {
        self.ssr[offset.index()] = Some(ss);
        self.ssr_name[offset.index()] = name;
    }

    pub fn add_card_soft_switch_w(&mut self, offset: IoOffset, ss: SoftSwitchW<C>,
                                  name: &'static str) {
        self.ssw[offset.index()] = Some(ss);
        self.ssw_name[offset.index()] = name;
    }

    pub fn soft_switch_r(&self, offset: IoOffset) -> Option<SoftSwitchR<C>> {
        self.ssr[offset.index()]
    }

    pub fn soft_switch_w(&self, offset: IoOffset) -> Option<SoftSwitchW<C>> {
        self.ssw[offset.index()]
    }
}

impl<C> Default for CardBase<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// Run the read handler at the given offset of a card's table, or float the
/// bus if there is none. The handler is copied out first so it can borrow
/// the whole card.
pub(crate) fn dispatch_load<C>(card: &mut C, base: fn(&C) -> &CardBase<C>,
                               offset: IoOffset, memory: &mut dyn Memory) -> u8 {
    let handler = base(card).soft_switch_r(offset);
    match handler {
        Some(ss) => ss(card, offset, memory),
        None => FLOATING_BUS,
    }
}

/// Run the write handler at the given offset of a card's table, if any.
pub(crate) fn dispatch_store<C>(card: &mut C, base: fn(&C) -> &CardBase<C>,
                                offset: IoOffset, memory: &mut dyn Memory, value: u8) {
    let handler = base(card).soft_switch_w(offset);
    if let Some(ss) = handler {
        ss(card, offset, memory, value);
    }
}
