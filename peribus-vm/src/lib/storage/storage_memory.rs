use std::io;

use super::*;
use crate::error::{ImageError, ImageResult};

/// A block store held entirely in memory.
pub struct MemoryBlockStore {
    data: Vec<u8>,
    blocks: u16,
    read_only: bool,
}

impl MemoryBlockStore {
    /// A blank, writable store.
    pub fn new(blocks: u16) -> Self {
        MemoryBlockStore {
            data: vec![0; blocks as usize * BLOCK_SIZE],
            blocks,
            read_only: false,
        }
    }

    /// Wrap a raw ProDOS order image.
    pub fn from_bytes(data: Vec<u8>) -> ImageResult<Self> {
        if data.is_empty() || data.len() % BLOCK_SIZE != 0 {
            return Err(ImageError::new(format!(
                "Image size {} is not a whole number of blocks.", data.len())));
        }
        let blocks = data.len() / BLOCK_SIZE;
        if blocks > MAX_BLOCKS {
            return Err(ImageError::new(format!("Image too large: {} blocks.", blocks)));
        }
        Ok(MemoryBlockStore {
            data,
            blocks: blocks as u16,
            read_only: false,
        })
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.data
    }

    fn range(&self, block: u16) -> io::Result<std::ops::Range<usize>> {
        if block >= self.blocks {
            return Err(out_of_range(block, self.blocks));
        }
        let start = block as usize * BLOCK_SIZE;
        Ok(start..start + BLOCK_SIZE)
    }
}

impl BlockStore for MemoryBlockStore {
    fn header(&self) -> BlockStoreHeader {
        BlockStoreHeader {
            blocks: self.blocks,
            read_only: self.read_only,
        }
    }

    fn read(&mut self, block: u16) -> io::Result<Block> {
        let range = self.range(block)?;
        let mut data = [0; BLOCK_SIZE];
        data.copy_from_slice(&self.data[range]);
        Ok(data)
    }

    fn write(&mut self, block: u16, data: &Block) -> io::Result<()> {
        if self.read_only {
            return Err(write_protected());
        }
        let range = self.range(block)?;
        self.data[range].copy_from_slice(data);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank() {
        let mut store = MemoryBlockStore::new(4);
        assert_eq!(store.header(), BlockStoreHeader { blocks: 4, read_only: false });
        assert_eq!(store.read(3).unwrap(), [0; BLOCK_SIZE]);
        assert_eq!(store.read(4).unwrap_err().kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_write_read() {
        let mut store = MemoryBlockStore::new(2);
        let mut block = [0; BLOCK_SIZE];
        block.iter_mut().for_each(|b| *b = rand::random());
        store.write(1, &block).unwrap();
        assert_eq!(store.read(1).unwrap(), block);
        assert_eq!(store.read(0).unwrap(), [0; BLOCK_SIZE]);
        assert!(store.write(2, &block).is_err());

        let bytes = store.into_bytes();
        assert_eq!(&bytes[BLOCK_SIZE..], &block[..]);
    }

    #[test]
    fn test_read_only() {
        let mut store = MemoryBlockStore::new(1);
        store.set_read_only(true);
        assert!(store.header().read_only);
        let err = store.write(0, &[0xAA; BLOCK_SIZE]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
        assert_eq!(store.read(0).unwrap(), [0; BLOCK_SIZE]);
    }

    #[test]
    fn test_from_bytes() {
        let store = MemoryBlockStore::from_bytes(vec![7; BLOCK_SIZE * 3]).unwrap();
        assert_eq!(store.header().blocks, 3);
        assert!(MemoryBlockStore::from_bytes(vec![]).is_err());
        assert!(MemoryBlockStore::from_bytes(vec![0; BLOCK_SIZE + 1]).is_err());
        assert!(MemoryBlockStore::from_bytes(vec![0; BLOCK_SIZE * (MAX_BLOCKS + 1)]).is_err());
    }
}
