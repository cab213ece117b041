//! Block devices: fixed-size 512 byte blocks addressed by a 16-bit index.

mod storage_file;
mod storage_memory;

use std::io;

pub use storage_file::FileBlockStore;
pub use storage_memory::MemoryBlockStore;

pub const BLOCK_SIZE: usize = 512;
pub type Block = [u8; BLOCK_SIZE];

/// Largest number of blocks a 16-bit block index can address.
pub const MAX_BLOCKS: usize = u16::MAX as usize;

/// Geometry and protection of a block store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockStoreHeader {
    pub blocks: u16,
    pub read_only: bool,
}

/// A medium holding `header().blocks` blocks. Any index at or past the end
/// is an error, as is any write to a read-only store.
pub trait BlockStore {
    fn header(&self) -> BlockStoreHeader;
    fn read(&mut self, block: u16) -> io::Result<Block>;
    fn write(&mut self, block: u16, data: &Block) -> io::Result<()>;
}

fn out_of_range(block: u16, blocks: u16) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput,
                   format!("Block {} out of range ({} blocks).", block, blocks))
}

fn write_protected() -> io::Error {
    io::Error::new(io::ErrorKind::PermissionDenied, "Block store is read only.")
}
