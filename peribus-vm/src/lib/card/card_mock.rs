use std::io::{self, Read, Write};

use peribus_utils::read_be::ReadBE;
use peribus_utils::write_be::WriteBE;

use super::card_base::{dispatch_load, dispatch_store, CardBase};
use super::card_interface::*;
use crate::error::ConfigResult;
use crate::slot::{IoOffset, Slot};

/// A card with a single latch register at offset 0 and a "peek through"
/// register at offset 1 that reads guest memory at `peek_address`, used when
/// testing the bus. Offsets $E and $F read back how many times the latch was
/// read and written, so tests can see traffic once the bus owns the card.
pub struct MockCard {
    base: CardBase<MockCard>,
    pub latch: u8,
    pub loads: usize,
    pub stores: usize,
    pub peek_address: u16,
}

impl MockCard {
    pub fn new() -> Self {
        let mut card = MockCard {
            base: CardBase::new(),
            latch: 0,
            loads: 0,
            stores: 0,
            peek_address: 0x0300,
        };
        card.base.add_card_soft_switch_r(IoOffset::at(0), |card, _, _| {
            card.loads += 1;
            card.latch
        }, "MOCKLATCH");
        card.base.add_card_soft_switch_w(IoOffset::at(0), |card, _, _, value| {
            card.stores += 1;
            card.latch = value;
        }, "MOCKLATCH");
        card.base.add_card_soft_switch_r(IoOffset::at(1), |card, _, memory| {
            memory.peek(card.peek_address)
        }, "MOCKPEEK");
        card.base.add_card_soft_switch_r(IoOffset::at(0xE), |card, _, _| {
            card.loads as u8
        }, "MOCKLOADS");
        card.base.add_card_soft_switch_r(IoOffset::at(0xF), |card, _, _| {
            card.stores as u8
        }, "MOCKSTORES");
        card
    }

    fn card_base(card: &Self) -> &CardBase<Self> {
        &card.base
    }
}

impl Card for MockCard {
    fn name(&self) -> &'static str {
        "Mock card"
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
        output.write_u8(self.latch)
    }

    fn load(&mut self, input: &mut dyn Read) -> io::Result<()> {
        self.latch = input.read_u8()?;
        Ok(())
    }
}
