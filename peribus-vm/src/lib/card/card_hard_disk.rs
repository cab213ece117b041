//! A hard disk card: enough to boot from the card's slot and to satisfy the
//! ProDOS block device expectations, through both the direct driver entry
//! point and the SmartPort (MLI style) entry point.
//!
//! See "Beneath ProDOS" sections 5-8, 6-6 and 7-13, the Apple IIc Technical
//! Reference chapter 8, and ProDOS technical note 21.

use log::{debug, info, log_enabled, trace, Level};
use std::io::{self, Read, Write};

use peribus_utils::hexprint::pretty_print_hex_block;
use peribus_utils::read_be::ReadBE;
use peribus_utils::write_be::WriteBE;

use super::card_base::{dispatch_load, dispatch_store, CardBase};
use super::card_interface::*;
use crate::error::ConfigResult;
use crate::slot::{IoOffset, Slot};
use crate::storage::{Block, BlockStore, BLOCK_SIZE};

// Softswitches in the card's I/O page.
const SS_COMMAND: IoOffset = IoOffset::at(0);       // Read: execute the ProDOS command.
const SS_BLOCKS_LO: IoOffset = IoOffset::at(1);     // Read: blocks available, low byte.
const SS_BLOCKS_HI: IoOffset = IoOffset::at(2);     // Read: blocks available, high byte.
const SS_SMARTPORT: IoOffset = IoOffset::at(3);     // Read: execute the SmartPort command.
const SS_SMARTPORT_LO: IoOffset = IoOffset::at(4);  // Write: command block pointer, low byte.
const SS_SMARTPORT_HI: IoOffset = IoOffset::at(5);  // Write: command block pointer, high byte.

// ProDOS driver command block in zero page.
pub const ZP_COMMAND: u16 = 0x42;
pub const ZP_UNIT: u16 = 0x43;
pub const ZP_BUFFER: u16 = 0x44;     // Two bytes.
pub const ZP_BLOCK: u16 = 0x46;      // Two bytes.

// ProDOS device commands.
pub const COMMAND_STATUS: u8 = 0;
pub const COMMAND_READ: u8 = 1;
pub const COMMAND_WRITE: u8 = 2;
pub const COMMAND_FORMAT: u8 = 3;

/// Where the boot code loads block 0.
pub const BOOT_ADDRESS: u16 = 0x0800;

/// Status codes returned to the guest in register A.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ProDosStatus {
    NoError = 0x00,
    IOError = 0x27,
    NoDevice = 0x28,
    WriteProtected = 0x2B,
}

impl ProDosStatus {
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// A block command, as read from either calling convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct BlockRequest {
    command: u8,
    unit: u8,
    buffer: u16,
    block: u16,
}

/// Build the 256 byte card ROM for the given slot. This is 6502 code run by
/// the guest, so the layout is fixed.
pub fn build_hard_disk_rom(slot: Slot) -> Vec<u8> {
    let mut data = vec![0; ROM_SIZE_SLOT_PAGE];
    let ss_base = (slot.io_base() & 0xFF) as u8;
    let slot_page = 0xC0 + slot.number();

    let preamble_and_boot: &[u8] = &[
        // Signature bytes expected at $Cn01, 3, 5 and 7.
        0xA9, 0x20,             // LDA #$20
        0xA9, 0x00,             // LDA #$00
        0xA9, 0x03,             // LDA #$03
        0xA9, 0x3C,             // LDA #$3C

        // Boot: read block 0 into $0800 and jump there. The loaded code
        // expects $42-$47 to still describe that read.
        0xA9, 0x01,             // LDA #$01
        0x85, 0x42,             // STA $42 ; Command READ
        0xA9, 0x00,             // LDA #$00
        0x85, 0x43,             // STA $43 ; Unit 0
        0x85, 0x44,             // STA $44 ; LO($0800)
        0x85, 0x46,             // STA $46 ; LO(block 0)
        0x85, 0x47,             // STA $47 ; HI(block 0)
        0xA9, 0x08,             // LDA #$08
        0x85, 0x45,             // STA $45 ; HI($0800)

        0xAD, ss_base, 0xC0,    // LDA $C0n0 ; Softswitch 0, execute command
        0xA2, slot.number() << 4, // LDX #$s0 ; Slot in the high nibble of X
        0x4C, 0x01, 0x08,       // JMP $0801
    ];
    data[..preamble_and_boot.len()].copy_from_slice(preamble_and_boot);

    let entry_points: &[u8] = &[
        0x4C, 0x80, slot_page,  // JMP $Cs80 ; ProDOS entry point

        // SmartPort entry point, 3 bytes later. The command block follows
        // the caller's JSR.
        0x68,                   // PLA
        0x8D, ss_base + 4, 0xC0, // STA $C0n4 ; Softswitch 4, LO(cmdBlock)
        0xA8,                   // TAY
        0x68,                   // PLA
        0x8D, ss_base + 5, 0xC0, // STA $C0n5 ; Softswitch 5, HI(cmdBlock)
        0x48,                   // PHA
        0x98,                   // TYA
        0x18,                   // CLC
        0x69, 0x03,             // ADC #$03 ; Return past the command block
        0x48,                   // PHA
        0xAD, ss_base + 3, 0xC0, // LDA $C0n3 ; Softswitch 3, error code in A
        0x18,                   // CLC
        0xF0, 0x01,             // BEQ +1
        0x38,                   // SEC ; Carry set on error
        0x60,                   // RTS
    ];
    data[0x40..0x40 + entry_points.len()].copy_from_slice(entry_points);

    let prodos_driver: &[u8] = &[
        0xAD, ss_base, 0xC0,    // LDA $C0n0 ; Softswitch 0, error code in A
        0x48,                   // PHA
        0xAE, ss_base + 1, 0xC0, // LDX $C0n1 ; LO(blocks) for STATUS
        0xAC, ss_base + 2, 0xC0, // LDY $C0n2 ; HI(blocks) for STATUS
        0x18,                   // CLC
        0x68,                   // PLA ; Sets Z if no error
        0xF0, 0x01,             // BEQ +1
        0x38,                   // SEC ; Carry set on error
        0x60,                   // RTS
    ];
    data[0x80..0x80 + prodos_driver.len()].copy_from_slice(prodos_driver);

    data[0xFC] = 0;
    data[0xFD] = 0;
    data[0xFE] = 3;     // Status and read. No write, no format. Single volume.
    data[0xFF] = 0x40;  // Driver entry point.

    data
}

/// Do what the boot code at $Cs08 does before it jumps into the loaded
/// block: fill in the zero page command block and trigger softswitch 0.
/// Returns the status the guest would find in A.
pub fn issue_boot_read(memory: &mut dyn Memory, slot: Slot) -> u8 {
    memory.poke(ZP_COMMAND, COMMAND_READ);
    memory.poke(ZP_UNIT, 0);
    memory.poke(ZP_BUFFER, (BOOT_ADDRESS & 0xFF) as u8);
    memory.poke(ZP_BUFFER + 1, (BOOT_ADDRESS >> 8) as u8);
    memory.poke(ZP_BLOCK, 0);
    memory.poke(ZP_BLOCK + 1, 0);
    memory.peek(slot.io_address(SS_COMMAND))
}

/// The hard disk card.
pub struct CardHardDisk {
    base: CardBase<CardHardDisk>,
    disk: Option<Box<dyn BlockStore>>,
    mli_params: u16,
    trace: bool,
}

impl CardHardDisk {
    /// A card with no disk attached. Every command answers "no device"
    /// until `add_disk` is called.
    pub fn new() -> Self {
        let mut card = CardHardDisk {
            base: CardBase::new(),
            disk: None,
            mli_params: 0,
            trace: false,
        };

        card.base.add_card_soft_switch_r(SS_COMMAND, |card, _, memory| {
            let request = BlockRequest {
                command: memory.peek(ZP_COMMAND),
                unit: memory.peek(ZP_UNIT),
                buffer: memory.peek_word(ZP_BUFFER),
                block: memory.peek_word(ZP_BLOCK),
            };
            card.execute("ProDOS", request, memory).code()
        }, "HDCOMMAND");
        card.base.add_card_soft_switch_r(SS_BLOCKS_LO, |card, _, _| {
            card.blocks() as u8
        }, "HDBLOCKSLO");
        card.base.add_card_soft_switch_r(SS_BLOCKS_HI, |card, _, _| {
            (card.blocks() >> 8) as u8
        }, "HDBLOCKSHI");
        card.base.add_card_soft_switch_r(SS_SMARTPORT, |card, _, memory| {
            let params = card.mli_params;
            let command = memory.peek(params.wrapping_add(1));
            let params_address = memory.peek_word(params.wrapping_add(2));
            let request = BlockRequest {
                command,
                unit: memory.peek(params_address.wrapping_add(1)),
                buffer: memory.peek_word(params_address.wrapping_add(2)),
                block: memory.peek_word(params_address.wrapping_add(4)),
            };
            card.execute("SmartPort", request, memory).code()
        }, "HDSMARTPORT");
        card.base.add_card_soft_switch_w(SS_SMARTPORT_LO, |card, _, _, value| {
            card.mli_params = (card.mli_params & 0xFF00) | value as u16;
            trace!("SmartPort params LO: {:#06X}.", card.mli_params);
        }, "HDSMARTPORTLO");
        card.base.add_card_soft_switch_w(SS_SMARTPORT_HI, |card, _, _, value| {
            card.mli_params = (card.mli_params & 0x00FF) | ((value as u16) << 8);
            trace!("SmartPort params HI: {:#06X}.", card.mli_params);
        }, "HDSMARTPORTHI");

        card
    }

    /// A card with the given disk attached.
    pub fn with_disk(disk: Box<dyn BlockStore>) -> Self {
        let mut card = Self::new();
        card.add_disk(disk);
        card
    }

    pub fn add_disk(&mut self, disk: Box<dyn BlockStore>) {
        let header = disk.header();
        info!("Hard disk attached: {} blocks{}.", header.blocks,
              if header.read_only { ", read only" } else { "" });
        self.disk = Some(disk);
    }

    /// Log every command at info level rather than debug.
    pub fn set_trace(&mut self, trace: bool) {
        self.trace = trace;
    }

    /// The SmartPort command block pointer.
    pub fn mli_params(&self) -> u16 {
        self.mli_params
    }

    /// Capacity of the attached disk, or 0 with no disk.
    pub fn blocks(&self) -> u16 {
        self.disk.as_ref().map_or(0, |disk| disk.header().blocks)
    }

    fn card_base(card: &Self) -> &CardBase<Self> {
        &card.base
    }

    fn execute(&mut self, entry: &str, request: BlockRequest,
               memory: &mut dyn Memory) -> ProDosStatus {
        let level = if self.trace { Level::Info } else { Level::Debug };
        log::log!(level, "{} command {} on unit ${:02X}, block {} at ${:04X}.",
                  entry, request.command, request.unit, request.block, request.buffer);

        if self.disk.is_none() {
            return ProDosStatus::NoDevice;
        }
        match request.command {
            COMMAND_STATUS => ProDosStatus::NoError,
            COMMAND_READ => self.read_block(request.block, request.buffer, memory),
            COMMAND_WRITE => self.write_block(request.block, request.buffer, memory),
            _ => {
                debug!("{} command {} not supported.", entry, request.command);
                ProDosStatus::IOError
            }
        }
    }

    /// Copy a block from the disk into guest memory at `dest`, one byte at a
    /// time through the normal write path.
    pub fn read_block(&mut self, block: u16, dest: u16, memory: &mut dyn Memory) -> ProDosStatus {
        let disk = match self.disk.as_mut() {
            Some(disk) => disk,
            None => return ProDosStatus::NoDevice,
        };

        let data = match disk.read(block) {
            Ok(data) => data,
            Err(e) => {
                debug!("Hard disk read of block {} failed: {}", block, e);
                return ProDosStatus::IOError;
            }
        };
        for (i, &byte) in data.iter().enumerate() {
            memory.poke(dest.wrapping_add(i as u16), byte);
        }
        if log_enabled!(Level::Trace) {
            trace!("Block {}:\n{}", block, pretty_print_hex_block(&data, dest));
        }

        ProDosStatus::NoError
    }

    /// Copy a block from guest memory at `source` onto the disk, one byte at
    /// a time through the normal read path.
    pub fn write_block(&mut self, block: u16, source: u16, memory: &mut dyn Memory) -> ProDosStatus {
        let disk = match self.disk.as_mut() {
            Some(disk) => disk,
            None => return ProDosStatus::NoDevice,
        };

        if disk.header().read_only {
            debug!("Hard disk write of block {} rejected: write protected.", block);
            return ProDosStatus::WriteProtected;
        }

        let mut data: Block = [0; BLOCK_SIZE];
        for (i, byte) in data.iter_mut().enumerate() {
            *byte = memory.peek(source.wrapping_add(i as u16));
        }

        match disk.write(block, &data) {
            Ok(()) => ProDosStatus::NoError,
            Err(e) => {
                debug!("Hard disk write of block {} failed: {}", block, e);
                ProDosStatus::IOError
            }
        }
    }
}

impl Default for CardHardDisk {
    fn default() -> Self {
        Self::new()
    }
}

impl Card for CardHardDisk {
    fn name(&self) -> &'static str {
        "Hard disk"
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
        output.write_be_u16(self.mli_params)
    }

    fn load(&mut self, input: &mut dyn Read) -> io::Result<()> {
        self.mli_params = input.read_be_u16()?;
        Ok(())
    }
}
