use log::info;
use std::fs;
use std::path::Path;

use super::*;
use crate::error::{ImageError, ImageResult};

/// A whole floppy as nibble tracks, one byte buffer per physical track.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NibImage {
    tracks: Vec<Vec<u8>>,
}

impl NibImage {
    /// Use the given tracks as they are. Every track must hold some bytes.
    pub fn from_tracks(tracks: Vec<Vec<u8>>) -> ImageResult<Self> {
        if tracks.is_empty() {
            return Err(ImageError::new("Nibble image has no tracks."));
        }
        if let Some(n) = tracks.iter().position(|track| track.is_empty()) {
            return Err(ImageError::new(format!("Nibble track {} is empty.", n)));
        }
        Ok(NibImage { tracks })
    }

    /// A raw `.nib` file: 35 tracks of 6656 bytes.
    pub fn from_nib_bytes(data: &[u8]) -> ImageResult<Self> {
        if data.len() != NIB_IMAGE_SIZE {
            return Err(ImageError::new(format!(
                "Invalid nibble image size {} (must be {}).", data.len(), NIB_IMAGE_SIZE)));
        }
        Self::from_tracks(data.chunks(NIB_BYTES_PER_TRACK).map(<[u8]>::to_vec).collect())
    }

    /// A 16-sector sector image, encoded to nibbles.
    pub fn from_dsk_bytes(data: &[u8], order: SectorOrder) -> ImageResult<Self> {
        if data.len() != DSK_IMAGE_SIZE {
            return Err(ImageError::new(format!(
                "Invalid sector image size {} (must be {}).", data.len(), DSK_IMAGE_SIZE)));
        }
        let mut tracks = Vec::with_capacity(NIB_TRACKS);
        for (n, chunk) in data.chunks(TRACK_SIZE).enumerate() {
            let mut sectors = [0; TRACK_SIZE];
            sectors.copy_from_slice(chunk);
            tracks.push(nibble_track(&sectors, n as u8, DEFAULT_VOLUME, order));
        }
        Self::from_tracks(tracks)
    }

    /// Load an image file, choosing the format from its extension.
    pub fn open(path: &Path) -> ImageResult<Self> {
        let extension = path.extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        let data = fs::read(path)?;
        let image = match extension.as_str() {
            "nib" => Self::from_nib_bytes(&data)?,
            "dsk" | "do" => Self::from_dsk_bytes(&data, SectorOrder::Dos)?,
            "po" => Self::from_dsk_bytes(&data, SectorOrder::ProDos)?,
            _ => return Err(ImageError::new(format!(
                "Unknown floppy image type '{}'.", path.display()))),
        };
        info!("Loaded floppy image '{}'.", path.display());
        Ok(image)
    }

    pub fn tracks(&self) -> &[Vec<u8>] {
        &self.tracks
    }

    pub fn track(&self, n: usize) -> Option<&[u8]> {
        self.tracks.get(n).map(Vec::as_slice)
    }

    pub(crate) fn track_mut(&mut self, n: usize) -> Option<&mut Vec<u8>> {
        self.tracks.get_mut(n)
    }

    /// The raw bytes, in `.nib` layout.
    pub fn to_nib_bytes(&self) -> Vec<u8> {
        self.tracks.concat()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use ntest::timeout;
    use tempfile;

    use crate::init_test_logging;

    #[test]
    fn test_bad_sizes() {
        assert!(NibImage::from_nib_bytes(&[0xFF; 100]).is_err());
        assert!(NibImage::from_dsk_bytes(&vec![0; DSK_IMAGE_SIZE - 1], SectorOrder::Dos).is_err());
        assert!(NibImage::from_tracks(vec![]).is_err());
        assert!(NibImage::from_tracks(vec![vec![1, 2], vec![]]).is_err());
    }

    #[test]
    fn test_nib_bytes() {
        let data: Vec<u8> = (0..NIB_IMAGE_SIZE).map(|i| (i / NIB_BYTES_PER_TRACK) as u8).collect();
        let image = NibImage::from_nib_bytes(&data).unwrap();
        assert_eq!(image.tracks().len(), NIB_TRACKS);
        assert_eq!(image.track(34).unwrap(), &[34; NIB_BYTES_PER_TRACK][..]);
        assert!(image.track(35).is_none());
        assert_eq!(image.to_nib_bytes(), data);
    }

    #[test]
    #[timeout(10000)]
    fn test_sector_orders_differ() {
        let data: Vec<u8> = (0..DSK_IMAGE_SIZE).map(|i| (i / SECTOR_SIZE) as u8).collect();
        let dos = NibImage::from_dsk_bytes(&data, SectorOrder::Dos).unwrap();
        let prodos = NibImage::from_dsk_bytes(&data, SectorOrder::ProDos).unwrap();
        assert_eq!(dos.tracks().len(), NIB_TRACKS);
        assert!(dos.tracks().iter().all(|track| track.len() == NIB_BYTES_PER_TRACK));
        // Sector 0 is in place either way, the rest is interleaved differently.
        assert_eq!(dos.track(0).unwrap()[..400], prodos.track(0).unwrap()[..400]);
        assert_ne!(dos.track(0), prodos.track(0));
    }

    #[test]
    #[timeout(10000)]
    fn test_open_by_extension() {
        init_test_logging();

        let temp_dir = tempfile::tempdir().unwrap();
        let dsk = temp_dir.path().join("game.DSK");
        fs::write(&dsk, vec![0; DSK_IMAGE_SIZE]).unwrap();
        let nib = temp_dir.path().join("game.nib");
        fs::write(&nib, vec![0xFF; NIB_IMAGE_SIZE]).unwrap();
        let other = temp_dir.path().join("game.woz");
        fs::write(&other, vec![0; 16]).unwrap();

        let image = NibImage::open(&dsk).unwrap();
        assert_eq!(image.tracks().len(), NIB_TRACKS);
        let image = NibImage::open(&nib).unwrap();
        assert_eq!(image.track(0).unwrap()[0], 0xFF);
        assert!(NibImage::open(&other).is_err());
        assert!(NibImage::open(&temp_dir.path().join("missing.po")).is_err());
    }
}
