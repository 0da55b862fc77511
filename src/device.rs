//! Raw volume access
//!
//! A thin sector-aligned reader over whatever handle backs the volume:
//! a `\\.\X:` device on Windows, or a raw image file anywhere. Reads are
//! positioned; the partition's byte offset (for physical-drive handles and
//! carved images) is folded into every read so callers always work in
//! volume-relative offsets.

use crate::error::{MftFindError, Result};
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

/// Alignment granularity for raw device reads.
const DEVICE_SECTOR: u64 = 512;

/// Read-only, shared-access view of an NTFS volume.
pub struct RawVolume<D> {
    inner: D,
    /// Byte offset of the volume's sector 0 within the handle
    base: u64,
    /// Short display label, e.g. `C:` for drive-letter volumes
    label: String,
}

impl<D: Read + Seek> RawVolume<D> {
    pub fn new(inner: D, base: u64, label: impl Into<String>) -> Self {
        Self {
            inner,
            base,
            label: label.into(),
        }
    }

    /// Volume display label (empty for image files)
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Read `buf.len()` bytes at a volume-relative byte offset.
    /// Offsets and lengths must be sector multiples.
    pub fn read_at(&mut self, offset: u64, buf: &mut [u8]) -> Result<()> {
        debug_assert_eq!(offset % DEVICE_SECTOR, 0, "unaligned read offset");
        debug_assert_eq!(buf.len() as u64 % DEVICE_SECTOR, 0, "unaligned read length");

        self.inner.seek(SeekFrom::Start(self.base + offset))?;
        self.inner.read_exact(buf)?;
        Ok(())
    }
}

impl RawVolume<File> {
    /// Open a volume by user-supplied path.
    ///
    /// Bare drive-letter forms (`X:`, `X:\`) map to the `\\.\X:` device on
    /// Windows; anything else, including `\\.\` device namespace paths, is
    /// opened read-only as a file. For images and physical-drive paths,
    /// `offset_sectors` gives the NTFS partition's sector offset within the
    /// handle.
    pub fn open_path(path: &str, offset_sectors: u64) -> Result<Self> {
        let base = offset_sectors * DEVICE_SECTOR;

        if path.len() <= 3 {
            if let Some(letter) = drive_letter(path) {
                return open_drive_letter(letter, base);
            }
        }

        let file = File::open(Path::new(path))
            .map_err(|e| MftFindError::DeviceOpen(path.to_string(), e))?;
        Ok(Self::new(file, base, String::new()))
    }
}

/// Extract the drive letter from `X:` / `X:\...` forms.
pub fn drive_letter(path: &str) -> Option<char> {
    let mut chars = path.chars();
    let letter = chars.next()?;
    if letter.is_ascii_alphabetic() && chars.next() == Some(':') {
        Some(letter.to_ascii_uppercase())
    } else {
        None
    }
}

#[cfg(windows)]
fn open_drive_letter(letter: char, base: u64) -> Result<RawVolume<File>> {
    use std::os::windows::fs::OpenOptionsExt;

    const FILE_SHARE_READ: u32 = 0x0000_0001;
    const FILE_SHARE_WRITE: u32 = 0x0000_0002;

    let device_path = format!("\\\\.\\{}:", letter);
    let file = std::fs::OpenOptions::new()
        .read(true)
        .share_mode(FILE_SHARE_READ | FILE_SHARE_WRITE)
        .open(&device_path)
        .map_err(|e| MftFindError::DeviceOpen(device_path.clone(), e))?;

    Ok(RawVolume::new(file, base, format!("{}:", letter)))
}

#[cfg(not(windows))]
fn open_drive_letter(letter: char, _base: u64) -> Result<RawVolume<File>> {
    Err(MftFindError::DeviceOpen(
        format!("{}:", letter),
        std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "drive-letter volumes are only available on Windows; pass an image path",
        ),
    ))
}
