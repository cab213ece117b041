use log::{debug, info};
use std::fs;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::*;
use crate::error::{ImageError, ImageResult};

// 2MG container layout. All fields little-endian.
const MAGIC_2MG: &[u8; 4] = b"2IMG";
const HEADER_2MG_SIZE: usize = 0x40;
const OFFSET_2MG_FORMAT: usize = 0x0C;
const OFFSET_2MG_FLAGS: usize = 0x10;
const OFFSET_2MG_BLOCKS: usize = 0x14;
const OFFSET_2MG_DATA_OFFSET: usize = 0x18;
const OFFSET_2MG_DATA_LENGTH: usize = 0x1C;
const FORMAT_2MG_PRODOS: u32 = 1;
const FLAG_2MG_LOCKED: u32 = 0x8000_0000;

/// A block store backed by an image file on the host: either a raw ProDOS
/// order image or a 2MG container holding one.
pub struct FileBlockStore {
    path: PathBuf,
    file: fs::File,
    data_offset: u64,
    header: BlockStoreHeader,
}

impl FileBlockStore {
    /// Open an image. If `read_only` is false but the file cannot be opened
    /// for writing, it is mounted read only instead.
    pub fn open(path: impl Into<PathBuf>, read_only: bool) -> ImageResult<Self> {
        let path = path.into();
        let (mut file, mut read_only) = open_file(&path, read_only)?;
        let file_len = file.metadata()?.len();

        let mut prefix = Vec::with_capacity(HEADER_2MG_SIZE);
        (&mut file).take(HEADER_2MG_SIZE as u64).read_to_end(&mut prefix)?;

        let (data_offset, blocks) = if prefix.len() == HEADER_2MG_SIZE && prefix.starts_with(MAGIC_2MG) {
            let layout = parse_2mg_header(&prefix, file_len)?;
            if layout.locked && !read_only {
                info!("Image '{}' is locked, mounting read only.", path.display());
                read_only = true;
            }
            (layout.data_offset, layout.blocks)
        } else {
            (0, raw_blocks(file_len)?)
        };

        debug!("Opened image '{}': {} blocks at offset {}.", path.display(), blocks, data_offset);
        Ok(FileBlockStore {
            path,
            file,
            data_offset,
            header: BlockStoreHeader {
                blocks,
                read_only,
            },
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn seek_to(&mut self, block: u16) -> io::Result<()> {
        if block >= self.header.blocks {
            return Err(out_of_range(block, self.header.blocks));
        }
        let offset = self.data_offset + block as u64 * BLOCK_SIZE as u64;
        self.file.seek(SeekFrom::Start(offset))?;
        Ok(())
    }
}

impl BlockStore for FileBlockStore {
    fn header(&self) -> BlockStoreHeader {
        self.header
    }

    fn read(&mut self, block: u16) -> io::Result<Block> {
        self.seek_to(block)?;
        let mut data = [0; BLOCK_SIZE];
        self.file.read_exact(&mut data)?;
        Ok(data)
    }

    fn write(&mut self, block: u16, data: &Block) -> io::Result<()> {
        if self.header.read_only {
            return Err(write_protected());
        }
        self.seek_to(block)?;
        self.file.write_all(data)?;
        self.file.flush()
    }
}

/// Open for read/write if asked, dropping to read only when the host says no.
fn open_file(path: &Path, read_only: bool) -> ImageResult<(fs::File, bool)> {
    if !read_only {
        match fs::OpenOptions::new().read(true).write(true).open(path) {
            Ok(file) => return Ok((file, false)),
            Err(e) if e.kind() == io::ErrorKind::PermissionDenied => {
                info!("Image '{}' is not writable, mounting read only.", path.display());
            }
            Err(e) => return Err(e.into()),
        }
    }
    Ok((fs::File::open(path)?, true))
}

fn raw_blocks(file_len: u64) -> ImageResult<u16> {
    if file_len == 0 || file_len % BLOCK_SIZE as u64 != 0 {
        return Err(ImageError::new(format!(
            "Image size {} is not a whole number of blocks.", file_len)));
    }
    let blocks = file_len / BLOCK_SIZE as u64;
    if blocks > MAX_BLOCKS as u64 {
        return Err(ImageError::new(format!("Image too large: {} blocks.", blocks)));
    }
    Ok(blocks as u16)
}

/// Where the blocks of a 2MG image live.
#[derive(Debug, PartialEq, Eq)]
struct Layout2mg {
    data_offset: u64,
    blocks: u16,
    locked: bool,
}

fn le_u32(bytes: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]])
}

fn parse_2mg_header(header: &[u8], file_len: u64) -> ImageResult<Layout2mg> {
    let format = le_u32(header, OFFSET_2MG_FORMAT);
    if format != FORMAT_2MG_PRODOS {
        return Err(ImageError::new(format!(
            "Unsupported 2MG image format {} (only ProDOS order is supported).", format)));
    }

    let flags = le_u32(header, OFFSET_2MG_FLAGS);
    let data_offset = le_u32(header, OFFSET_2MG_DATA_OFFSET) as u64;
    let data_length = le_u32(header, OFFSET_2MG_DATA_LENGTH) as u64;
    if data_offset < HEADER_2MG_SIZE as u64 || data_offset + data_length > file_len {
        return Err(ImageError::new("2MG data area lies outside the file."));
    }

    let available = data_length / BLOCK_SIZE as u64;
    let blocks = match le_u32(header, OFFSET_2MG_BLOCKS) as u64 {
        0 => available,
        n => n,
    };
    if blocks == 0 || blocks > available || blocks > MAX_BLOCKS as u64 {
        return Err(ImageError::new(format!("Invalid 2MG block count {}.", blocks)));
    }

    Ok(Layout2mg {
        data_offset,
        blocks: blocks as u16,
        locked: flags & FLAG_2MG_LOCKED != 0,
    })
}
