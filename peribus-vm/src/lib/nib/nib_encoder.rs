//! 16-sector 6-and-2 GCR encoding. See "Beneath Apple DOS" chapter 3.

use super::{NIB_BYTES_PER_TRACK, SECTOR_SIZE, SECTORS_PER_TRACK, TRACK_SIZE};

/// Volume number written into every address field.
pub const DEFAULT_VOLUME: u8 = 254;

const SYNC: u8 = 0xFF;
const SYNC_TRACK_START: usize = 48;
const SYNC_AFTER_ADDRESS: usize = 6;
const SYNC_AFTER_DATA: usize = 27;

const ADDRESS_PROLOGUE: [u8; 3] = [0xD5, 0xAA, 0x96];
const DATA_PROLOGUE: [u8; 3] = [0xD5, 0xAA, 0xAD];
const EPILOGUE: [u8; 3] = [0xDE, 0xAA, 0xEB];

/// Size of the 2-bit auxiliary buffer.
const AUX_SIZE: usize = 86;
/// Encoded sector data, not counting the checksum.
pub(crate) const ENCODED_SECTOR_SIZE: usize = AUX_SIZE + SECTOR_SIZE;

/// Valid disk bytes for each 6-bit value.
pub(crate) const WRITE_TABLE: [u8; 64] = [
    0x96, 0x97, 0x9A, 0x9B, 0x9D, 0x9E, 0x9F, 0xA6,
    0xA7, 0xAB, 0xAC, 0xAD, 0xAE, 0xAF, 0xB2, 0xB3,
    0xB4, 0xB5, 0xB6, 0xB7, 0xB9, 0xBA, 0xBB, 0xBC,
    0xBD, 0xBE, 0xBF, 0xCB, 0xCD, 0xCE, 0xCF, 0xD3,
    0xD6, 0xD7, 0xD9, 0xDA, 0xDB, 0xDC, 0xDD, 0xDE,
    0xDF, 0xE5, 0xE6, 0xE7, 0xE9, 0xEA, 0xEB, 0xEC,
    0xED, 0xEE, 0xEF, 0xF2, 0xF3, 0xF4, 0xF5, 0xF6,
    0xF7, 0xF9, 0xFA, 0xFB, 0xFC, 0xFD, 0xFE, 0xFF,
];

// Which sector of the image file each physical sector holds.
const DOS_ORDER: [usize; SECTORS_PER_TRACK] = [
    0x0, 0x7, 0xE, 0x6, 0xD, 0x5, 0xC, 0x4, 0xB, 0x3, 0xA, 0x2, 0x9, 0x1, 0x8, 0xF,
];
const PRODOS_ORDER: [usize; SECTORS_PER_TRACK] = [
    0x0, 0x8, 0x1, 0x9, 0x2, 0xA, 0x3, 0xB, 0x4, 0xC, 0x5, 0xD, 0x6, 0xE, 0x7, 0xF,
];

/// How the sectors of a track are laid out in an image file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectorOrder {
    /// DOS 3.3 logical order (`.dsk`, `.do`).
    Dos,
    /// ProDOS block order (`.po`).
    ProDos,
}

impl SectorOrder {
    /// The file sector stored in the given physical sector.
    pub fn file_sector(self, physical: usize) -> usize {
        match self {
            SectorOrder::Dos => DOS_ORDER[physical],
            SectorOrder::ProDos => PRODOS_ORDER[physical],
        }
    }
}

/// Build the nibbles of one track from its 4096 bytes of sector data, in
/// file order.
pub fn nibble_track(sectors: &[u8; TRACK_SIZE], track: u8, volume: u8,
                    order: SectorOrder) -> Vec<u8> {
    let mut nibbles = Vec::with_capacity(NIB_BYTES_PER_TRACK);
    nibbles.extend_from_slice(&[SYNC; SYNC_TRACK_START]);

    for physical in 0..SECTORS_PER_TRACK {
        let sector = physical as u8;
        nibbles.extend_from_slice(&ADDRESS_PROLOGUE);
        for value in [volume, track, sector, volume ^ track ^ sector] {
            nibbles.extend_from_slice(&encode_4_and_4(value));
        }
        nibbles.extend_from_slice(&EPILOGUE);
        nibbles.extend_from_slice(&[SYNC; SYNC_AFTER_ADDRESS]);

        let start = order.file_sector(physical) * SECTOR_SIZE;
        let mut data = [0; SECTOR_SIZE];
        data.copy_from_slice(&sectors[start..start + SECTOR_SIZE]);
        nibbles.extend_from_slice(&DATA_PROLOGUE);
        nibbles.extend_from_slice(&encode_6_and_2(&data));
        nibbles.extend_from_slice(&EPILOGUE);
        nibbles.extend_from_slice(&[SYNC; SYNC_AFTER_DATA]);
    }

    nibbles.resize(NIB_BYTES_PER_TRACK, SYNC);
    nibbles
}

/// Odd bits then even bits, each with the clock bits set.
pub(crate) fn encode_4_and_4(value: u8) -> [u8; 2] {
    [(value >> 1) | 0xAA, value | 0xAA]
}

/// 342 disk bytes plus a checksum byte for a 256 byte sector.
pub(crate) fn encode_6_and_2(data: &[u8; SECTOR_SIZE]) -> Vec<u8> {
    // The low two bits of each byte go to the auxiliary buffer, swapped,
    // three bytes per auxiliary entry.
    let mut buffer = [0u8; ENCODED_SECTOR_SIZE];
    for (i, &value) in data.iter().enumerate() {
        let low = ((value & 0x01) << 1) | ((value & 0x02) >> 1);
        buffer[i % AUX_SIZE] |= low << (2 * (i / AUX_SIZE));
        buffer[AUX_SIZE + i] = value >> 2;
    }

    // Each disk byte encodes the difference to the previous value.
    let mut encoded = Vec::with_capacity(ENCODED_SECTOR_SIZE + 1);
    let mut previous = 0;
    for &value in buffer.iter() {
        encoded.push(WRITE_TABLE[(value ^ previous) as usize]);
        previous = value;
    }
    encoded.push(WRITE_TABLE[previous as usize]);
    encoded
}
