//! NTFS on-disk structures and constants
//!
//! All multi-byte integers on disk are little-endian and all structures are
//! packed; every type here is decoded through a bounds-checked `from_bytes`
//! rather than a pointer cast.

use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;

// ============================================================================
// NTFS Constants
// ============================================================================

/// MFT record signature "FILE"
pub const MFT_RECORD_SIGNATURE: u32 = 0x454C4946; // "FILE" in little-endian

/// Bad MFT record signature "BAAD"
pub const MFT_RECORD_BAD_SIGNATURE: u32 = 0x44414142; // "BAAD"

/// End of attributes marker
pub const ATTRIBUTE_END_MARKER: u32 = 0xFFFFFFFF;

/// Standard MFT record size
pub const DEFAULT_MFT_RECORD_SIZE: u32 = 1024;

/// Fix-up granularity: one update-sequence slot per 512-byte stride
pub const SECTOR_SIZE: u32 = 512;

/// Lower 48 bits of an MFT file reference hold the record index
pub const MFT_REFERENCE_MASK: u64 = 0x0000_FFFF_FFFF_FFFF;

// MFT Record Flags
pub const MFT_RECORD_IN_USE: u16 = 0x0001;
pub const MFT_RECORD_IS_DIRECTORY: u16 = 0x0002;

// Attribute flags (on the attribute header)
pub const ATTR_FLAG_COMPRESSED: u16 = 0x0001;
pub const ATTR_FLAG_ENCRYPTED: u16 = 0x4000;
pub const ATTR_FLAG_SPARSE: u16 = 0x8000;

// ============================================================================
// Attribute Types
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum AttributeType {
    StandardInformation = 0x10,
    AttributeList = 0x20,
    FileName = 0x30,
    ObjectId = 0x40,
    SecurityDescriptor = 0x50,
    VolumeName = 0x60,
    VolumeInformation = 0x70,
    Data = 0x80,
    IndexRoot = 0x90,
    IndexAllocation = 0xA0,
    Bitmap = 0xB0,
    ReparsePoint = 0xC0,
    EaInformation = 0xD0,
    Ea = 0xE0,
    LoggedUtilityStream = 0x100,
    End = 0xFFFFFFFF,
}

impl AttributeType {
    pub fn from_u32(value: u32) -> Option<Self> {
        match value {
            0x10 => Some(Self::StandardInformation),
            0x20 => Some(Self::AttributeList),
            0x30 => Some(Self::FileName),
            0x40 => Some(Self::ObjectId),
            0x50 => Some(Self::SecurityDescriptor),
            0x60 => Some(Self::VolumeName),
            0x70 => Some(Self::VolumeInformation),
            0x80 => Some(Self::Data),
            0x90 => Some(Self::IndexRoot),
            0xA0 => Some(Self::IndexAllocation),
            0xB0 => Some(Self::Bitmap),
            0xC0 => Some(Self::ReparsePoint),
            0xD0 => Some(Self::EaInformation),
            0xE0 => Some(Self::Ea),
            0x100 => Some(Self::LoggedUtilityStream),
            0xFFFFFFFF => Some(Self::End),
            _ => None,
        }
    }

    /// Display name used by the query report's record-type histogram.
    /// Indexed by the high nibble of the type code.
    pub fn nibble_name(nibble: usize) -> &'static str {
        const NAMES: [&str; 16] = [
            "0x00",
            "Standard Information", // 0x10
            "Attribute List",       // 0x20
            "File Names",           // 0x30
            "Object Id",            // 0x40
            "Security Descriptor",  // 0x50
            "Volume Name",          // 0x60
            "Volume Information",   // 0x70
            "Data",                 // 0x80
            "Index Root",           // 0x90
            "Index Allocation",     // 0xa0
            "Bitmap",               // 0xb0
            "Reparse Point",        // 0xc0
            "Extended Attribute",   // 0xd0
            "EA",                   // 0xe0
            "0xf0",
        ];
        NAMES[nibble & 0xF]
    }
}

// ============================================================================
// Filename Namespace
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FilenameNamespace {
    Posix = 0,
    Win32 = 1,
    Dos = 2,
    Win32AndDos = 3,
}

impl FilenameNamespace {
    pub fn from_u8(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::Posix),
            1 => Some(Self::Win32),
            2 => Some(Self::Dos),
            3 => Some(Self::Win32AndDos),
            _ => None,
        }
    }

    /// Preference rank when one record carries several names.
    /// Win32 (Unicode) > Win32+DOS > POSIX > DOS; ties keep the first seen.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Win32 => 3,
            Self::Win32AndDos => 2,
            Self::Posix => 1,
            Self::Dos => 0,
        }
    }
}

// ============================================================================
// NTFS Boot Sector
// ============================================================================

/// Parsed NTFS boot sector (first 512 bytes of an NTFS partition)
#[derive(Debug, Clone)]
pub struct BootSector {
    /// OEM ID - must be "NTFS    " (8 bytes at offset 0x03)
    pub oem_id: [u8; 8],
    /// Bytes per sector (offset 0x0B, typically 512)
    pub bytes_per_sector: u16,
    /// Sectors per cluster (offset 0x0D, raw encoded byte)
    /// Values > 0x7F encode a power of two: count = 1 << -(value as i8)
    pub sectors_per_cluster: u8,
    /// Total sectors on volume (offset 0x28)
    pub total_sectors: u64,
    /// MFT starting cluster number / LCN (offset 0x30)
    pub mft_start_cluster: i64,
    /// MFT mirror starting cluster number (offset 0x38)
    pub mft_mirror_cluster: i64,
    /// Clusters per MFT record (offset 0x40, signed)
    /// If negative, record size = 2^|value| bytes
    /// If positive, record size = value * bytes_per_cluster
    pub clusters_per_mft_record: i8,
    /// Clusters per index block (offset 0x44, signed, same encoding)
    pub clusters_per_index_block: i8,
    /// Volume serial number (offset 0x48)
    pub volume_serial_number: u64,
}

impl BootSector {
    /// Parse from raw boot sector data.
    ///
    /// Fails with `NotNtfs` for a BitLocker-locked (`-FVE-FS-`) or FAT
    /// (`MSDOS*`) OEM id, or any other non-NTFS signature.
    pub fn from_bytes(data: &[u8]) -> crate::Result<Self> {
        use crate::MftFindError;

        if data.len() < 0x50 {
            return Err(MftFindError::NotNtfs(String::from("short boot sector")));
        }

        let mut oem_id = [0u8; 8];
        oem_id.copy_from_slice(&data[0x03..0x0B]);

        if &oem_id != b"NTFS    " {
            let oem = String::from_utf8_lossy(&oem_id).into_owned();
            return Err(MftFindError::NotNtfs(oem));
        }

        let bytes_per_sector = u16::from_le_bytes([data[0x0B], data[0x0C]]);
        let sectors_per_cluster = data[0x0D];
        let total_sectors = u64::from_le_bytes(data[0x28..0x30].try_into().unwrap());
        let mft_start_cluster = i64::from_le_bytes(data[0x30..0x38].try_into().unwrap());
        let mft_mirror_cluster = i64::from_le_bytes(data[0x38..0x40].try_into().unwrap());
        let clusters_per_mft_record = data[0x40] as i8;
        let clusters_per_index_block = data[0x44] as i8;
        let volume_serial_number = u64::from_le_bytes(data[0x48..0x50].try_into().unwrap());

        Ok(Self {
            oem_id,
            bytes_per_sector,
            sectors_per_cluster,
            total_sectors,
            mft_start_cluster,
            mft_mirror_cluster,
            clusters_per_mft_record,
            clusters_per_index_block,
            volume_serial_number,
        })
    }

    /// Sanity-check the geometry fields
    pub fn is_plausible(&self) -> bool {
        self.bytes_per_sector >= 256
            && self.bytes_per_sector.is_power_of_two()
            && self.sectors_per_cluster_count() > 0
            && self.mft_start_cluster > 0
    }

    /// Decoded sectors per cluster.
    /// Raw values above 0x7F are negative powers of two: 0xF9 -> 2^7 = 128.
    pub fn sectors_per_cluster_count(&self) -> u32 {
        let raw = self.sectors_per_cluster;
        if raw > 0x7F {
            let shift = (-(raw as i8 as i32)) as u32;
            1u32 << shift.min(31)
        } else {
            raw as u32
        }
    }

    /// Calculate bytes per cluster
    pub fn bytes_per_cluster(&self) -> u32 {
        self.bytes_per_sector as u32 * self.sectors_per_cluster_count()
    }

    /// Calculate bytes per MFT record.
    ///
    /// Prefers the computed form; falls back to 1024 (with a warning) when
    /// the on-disk value yields an implausible size.
    pub fn bytes_per_mft_record(&self) -> u32 {
        let v = self.clusters_per_mft_record;
        let computed = if v < 0 {
            let shift = (-(v as i32)) as u32;
            1u32 << shift.min(31)
        } else {
            v as u32 * self.bytes_per_cluster()
        };

        if computed < 256 || !computed.is_power_of_two() {
            log::warn!(
                "implausible MFT record size {} (raw {}), using {}",
                computed,
                v,
                DEFAULT_MFT_RECORD_SIZE
            );
            return DEFAULT_MFT_RECORD_SIZE;
        }
        if computed != DEFAULT_MFT_RECORD_SIZE {
            log::warn!("unusual MFT record size {} bytes", computed);
        }
        computed
    }

    /// Byte offset of the MFT from the start of the volume
    pub fn mft_byte_offset(&self) -> u64 {
        self.mft_start_cluster as u64 * self.bytes_per_cluster() as u64
    }
}

// ============================================================================
// MFT Record Header
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct MftRecordHeader {
    pub signature: u32,
    pub update_sequence_offset: u16,
    pub update_sequence_count: u16,
    pub log_sequence_number: u64,
    pub sequence_number: u16,
    pub hard_link_count: u16,
    pub first_attribute_offset: u16,
    pub flags: u16,
    pub used_size: u32,
    pub allocated_size: u32,
    pub base_record_reference: u64,
    pub next_attribute_id: u16,
}

impl MftRecordHeader {
    /// Parse MFT record header from raw bytes
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < 48 {
            return None;
        }

        let mut cursor = Cursor::new(data);

        Some(Self {
            signature: cursor.read_u32::<LittleEndian>().ok()?,
            update_sequence_offset: cursor.read_u16::<LittleEndian>().ok()?,
            update_sequence_count: cursor.read_u16::<LittleEndian>().ok()?,
            log_sequence_number: cursor.read_u64::<LittleEndian>().ok()?,
            sequence_number: cursor.read_u16::<LittleEndian>().ok()?,
            hard_link_count: cursor.read_u16::<LittleEndian>().ok()?,
            first_attribute_offset: cursor.read_u16::<LittleEndian>().ok()?,
            flags: cursor.read_u16::<LittleEndian>().ok()?,
            used_size: cursor.read_u32::<LittleEndian>().ok()?,
            allocated_size: cursor.read_u32::<LittleEndian>().ok()?,
            base_record_reference: cursor.read_u64::<LittleEndian>().ok()?,
            next_attribute_id: cursor.read_u16::<LittleEndian>().ok()?,
        })
    }

    pub fn is_valid(&self) -> bool {
        self.signature == MFT_RECORD_SIGNATURE
    }

    pub fn is_in_use(&self) -> bool {
        (self.flags & MFT_RECORD_IN_USE) != 0
    }

    pub fn is_directory(&self) -> bool {
        (self.flags & MFT_RECORD_IS_DIRECTORY) != 0
    }

    /// Get the base record number (lower 48 bits)
    pub fn base_record_number(&self) -> u64 {
        self.base_record_reference & MFT_REFERENCE_MASK
    }
}

// ============================================================================
// Attribute Header
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct AttributeHeader {
    pub attribute_type: u32,
    pub length: u32,
    pub non_resident: bool,
    pub name_length: u8,
    pub name_offset: u16,
    pub flags: u16,
    pub attribute_id: u16,
}

#[derive(Debug, Clone)]
pub struct ResidentAttributeHeader {
    pub base: AttributeHeader,
    pub value_length: u32,
    pub value_offset: u16,
    pub indexed_flag: u8,
}

#[derive(Debug, Clone)]
pub struct NonResidentAttributeHeader {
    pub base: AttributeHeader,
    pub start_vcn: u64,
    pub end_vcn: u64,
    pub run_list_offset: u16,
    pub compression_unit: u16,
    pub allocated_size: u64,
    pub real_size: u64,
    pub stream_size: u64,
}

impl AttributeHeader {
    /// Parse attribute header from raw bytes
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < 16 {
            return None;
        }

        let mut cursor = Cursor::new(data);

        Some(Self {
            attribute_type: cursor.read_u32::<LittleEndian>().ok()?,
            length: cursor.read_u32::<LittleEndian>().ok()?,
            non_resident: cursor.read_u8().ok()? != 0,
            name_length: cursor.read_u8().ok()?,
            name_offset: cursor.read_u16::<LittleEndian>().ok()?,
            flags: cursor.read_u16::<LittleEndian>().ok()?,
            attribute_id: cursor.read_u16::<LittleEndian>().ok()?,
        })
    }

    pub fn is_sparse(&self) -> bool {
        (self.flags & ATTR_FLAG_SPARSE) != 0
    }

    /// Decode the attribute's UTF-16 name (stream identifier), if any.
    /// `data` is the slice beginning at the attribute header.
    pub fn name(&self, data: &[u8]) -> Option<String> {
        if self.name_length == 0 {
            return None;
        }
        let start = self.name_offset as usize;
        let end = start + self.name_length as usize * 2;
        if end > data.len() {
            return None;
        }
        let units: Vec<u16> = data[start..end]
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        Some(String::from_utf16_lossy(&units))
    }
}

impl ResidentAttributeHeader {
    /// Parse resident attribute header
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        let base = AttributeHeader::from_bytes(data)?;
        if base.non_resident || data.len() < 24 {
            return None;
        }

        let mut cursor = Cursor::new(&data[16..]);

        Some(Self {
            base,
            value_length: cursor.read_u32::<LittleEndian>().ok()?,
            value_offset: cursor.read_u16::<LittleEndian>().ok()?,
            indexed_flag: cursor.read_u8().ok()?,
        })
    }

    /// The resident value bytes within `data` (the attribute slice)
    pub fn value<'a>(&self, data: &'a [u8]) -> Option<&'a [u8]> {
        let start = self.value_offset as usize;
        let end = start + self.value_length as usize;
        if end > data.len() {
            return None;
        }
        Some(&data[start..end])
    }
}

impl NonResidentAttributeHeader {
    /// Parse non-resident attribute header
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        let base = AttributeHeader::from_bytes(data)?;
        if !base.non_resident || data.len() < 64 {
            return None;
        }

        let mut cursor = Cursor::new(&data[16..]);

        let start_vcn = cursor.read_u64::<LittleEndian>().ok()?;
        let end_vcn = cursor.read_u64::<LittleEndian>().ok()?;
        let run_list_offset = cursor.read_u16::<LittleEndian>().ok()?;
        let compression_unit = cursor.read_u16::<LittleEndian>().ok()?;
        let _padding = cursor.read_u32::<LittleEndian>().ok()?;
        let allocated_size = cursor.read_u64::<LittleEndian>().ok()?;
        let real_size = cursor.read_u64::<LittleEndian>().ok()?;
        let stream_size = cursor.read_u64::<LittleEndian>().ok()?;

        Some(Self {
            base,
            start_vcn,
            end_vcn,
            run_list_offset,
            compression_unit,
            allocated_size,
            real_size,
            stream_size,
        })
    }
}

// ============================================================================
// Standard Information Attribute
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct StandardInformation {
    pub created: u64,
    pub modified: u64,
    pub mft_modified: u64,
    pub accessed: u64,
    pub file_attributes: u32,
    pub max_versions: u32,
    pub version_number: u32,
    pub class_id: u32,
}

impl StandardInformation {
    /// Parse from resident attribute content
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < 48 {
            return None;
        }

        let mut cursor = Cursor::new(data);

        Some(Self {
            created: cursor.read_u64::<LittleEndian>().ok()?,
            modified: cursor.read_u64::<LittleEndian>().ok()?,
            mft_modified: cursor.read_u64::<LittleEndian>().ok()?,
            accessed: cursor.read_u64::<LittleEndian>().ok()?,
            file_attributes: cursor.read_u32::<LittleEndian>().ok()?,
            max_versions: cursor.read_u32::<LittleEndian>().ok()?,
            version_number: cursor.read_u32::<LittleEndian>().ok()?,
            class_id: cursor.read_u32::<LittleEndian>().ok()?,
        })
    }
}

// ============================================================================
// File Name Attribute
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct FileNameAttribute {
    pub parent_reference: u64,
    pub created: u64,
    pub modified: u64,
    pub mft_modified: u64,
    pub accessed: u64,
    pub allocated_size: u64,
    pub real_size: u64,
    pub file_attributes: u32,
    pub reparse_value: u32,
    pub name_length: u8,
    pub namespace: Option<FilenameNamespace>,
    pub name: String,
}

impl FileNameAttribute {
    /// Parse from resident attribute content
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < 66 {
            return None;
        }

        let mut cursor = Cursor::new(data);

        let parent_reference = cursor.read_u64::<LittleEndian>().ok()?;
        let created = cursor.read_u64::<LittleEndian>().ok()?;
        let modified = cursor.read_u64::<LittleEndian>().ok()?;
        let mft_modified = cursor.read_u64::<LittleEndian>().ok()?;
        let accessed = cursor.read_u64::<LittleEndian>().ok()?;
        let allocated_size = cursor.read_u64::<LittleEndian>().ok()?;
        let real_size = cursor.read_u64::<LittleEndian>().ok()?;
        let file_attributes = cursor.read_u32::<LittleEndian>().ok()?;
        let reparse_value = cursor.read_u32::<LittleEndian>().ok()?;
        let name_length = cursor.read_u8().ok()?;
        let namespace = FilenameNamespace::from_u8(cursor.read_u8().ok()?);

        // Filename is UTF-16LE at offset 66
        let name_bytes = name_length as usize * 2;
        if data.len() < 66 + name_bytes {
            return None;
        }
        let units: Vec<u16> = data[66..66 + name_bytes]
            .chunks_exact(2)
            .map(|c| u16::from_le_bytes([c[0], c[1]]))
            .collect();
        let name = String::from_utf16_lossy(&units);

        Some(Self {
            parent_reference,
            created,
            modified,
            mft_modified,
            accessed,
            allocated_size,
            real_size,
            file_attributes,
            reparse_value,
            name_length,
            namespace,
            name,
        })
    }

    /// Get the parent record number (lower 48 bits)
    pub fn parent_record_number(&self) -> u64 {
        self.parent_reference & MFT_REFERENCE_MASK
    }
}

// ============================================================================
// Index Root (selected fields, used by the query detail dump)
// ============================================================================

#[derive(Debug, Clone)]
pub struct IndexRootHeader {
    pub indexed_attribute_type: u32,
    pub collation_rule: u32,
    pub index_block_size: u32,
    pub clusters_per_index_block: u8,
    pub entries_offset: u32,
    pub entries_total_size: u32,
    pub entries_allocated_size: u32,
}

impl IndexRootHeader {
    pub fn from_bytes(data: &[u8]) -> Option<Self> {
        if data.len() < 32 {
            return None;
        }

        let mut cursor = Cursor::new(data);

        let indexed_attribute_type = cursor.read_u32::<LittleEndian>().ok()?;
        let collation_rule = cursor.read_u32::<LittleEndian>().ok()?;
        let index_block_size = cursor.read_u32::<LittleEndian>().ok()?;
        let clusters_per_index_block = cursor.read_u8().ok()?;
        let _reserved = [
            cursor.read_u8().ok()?,
            cursor.read_u8().ok()?,
            cursor.read_u8().ok()?,
        ];
        // Embedded index node header
        let entries_offset = cursor.read_u32::<LittleEndian>().ok()?;
        let entries_total_size = cursor.read_u32::<LittleEndian>().ok()?;
        let entries_allocated_size = cursor.read_u32::<LittleEndian>().ok()?;

        Some(Self {
            indexed_attribute_type,
            collation_rule,
            index_block_size,
            clusters_per_index_block,
            entries_offset,
            entries_total_size,
            entries_allocated_size,
        })
    }
}

// ============================================================================
// FILETIME conversion utilities
// ============================================================================

/// Difference between 1601 and 1970 epochs in 100-nanosecond intervals
const FILETIME_UNIX_DIFF: u64 = 116_444_736_000_000_000;

/// Convert Windows FILETIME (100-nanosecond intervals since 1601) to Unix seconds
pub fn filetime_to_unix(filetime: u64) -> i64 {
    if filetime < FILETIME_UNIX_DIFF {
        return 0;
    }
    ((filetime - FILETIME_UNIX_DIFF) / 10_000_000) as i64
}

/// Convert Unix seconds to Windows FILETIME
pub fn unix_to_filetime(unix: i64) -> u64 {
    if unix <= 0 {
        return 0;
    }
    unix as u64 * 10_000_000 + FILETIME_UNIX_DIFF
}

/// Convert Windows FILETIME to chrono DateTime
pub fn filetime_to_datetime(filetime: u64) -> chrono::DateTime<chrono::Utc> {
    use chrono::{TimeZone, Utc};
    let unix_ts = filetime_to_unix(filetime);
    Utc.timestamp_opt(unix_ts, 0)
        .single()
        .unwrap_or_else(|| Utc.timestamp_opt(0, 0).single().unwrap())
}

// ============================================================================
// File Attributes
// ============================================================================

pub mod file_attributes {
    pub const READONLY: u32 = 0x00000001;
    pub const HIDDEN: u32 = 0x00000002;
    pub const SYSTEM: u32 = 0x00000004;
    pub const DIRECTORY: u32 = 0x00000010;
    pub const ARCHIVE: u32 = 0x00000020;
    pub const DEVICE: u32 = 0x00000040;
    pub const NORMAL: u32 = 0x00000080;
    pub const TEMPORARY: u32 = 0x00000100;
    pub const SPARSE_FILE: u32 = 0x00000200;
    pub const REPARSE_POINT: u32 = 0x00000400;
    pub const COMPRESSED: u32 = 0x00000800;
    pub const OFFLINE: u32 = 0x00001000;
    pub const NOT_CONTENT_INDEXED: u32 = 0x00002000;
    pub const ENCRYPTED: u32 = 0x00004000;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boot_bytes() -> Vec<u8> {
        let mut b = vec![0u8; 512];
        b[0x03..0x0B].copy_from_slice(b"NTFS    ");
        b[0x0B..0x0D].copy_from_slice(&512u16.to_le_bytes());
        b[0x0D] = 8; // 4096-byte clusters
        b[0x28..0x30].copy_from_slice(&1_000_000u64.to_le_bytes());
        b[0x30..0x38].copy_from_slice(&786_432i64.to_le_bytes());
        b[0x38..0x40].copy_from_slice(&2i64.to_le_bytes());
        b[0x40] = 0xF6; // -10 -> 1024-byte records
        b[0x44] = 0x01;
        b[0x48..0x50].copy_from_slice(&0xDEADBEEFu64.to_le_bytes());
        b
    }

    #[test]
    fn boot_sector_geometry() {
        let bs = BootSector::from_bytes(&boot_bytes()).unwrap();
        assert!(bs.is_plausible());
        assert_eq!(bs.bytes_per_cluster(), 4096);
        assert_eq!(bs.bytes_per_mft_record(), 1024);
        assert_eq!(bs.mft_byte_offset(), 786_432 * 4096);
    }

    #[test]
    fn boot_sector_rejects_bitlocker_and_fat() {
        let mut b = boot_bytes();
        b[0x03..0x0B].copy_from_slice(b"-FVE-FS-");
        assert!(matches!(
            BootSector::from_bytes(&b),
            Err(crate::MftFindError::NotNtfs(_))
        ));

        let mut b = boot_bytes();
        b[0x03..0x0B].copy_from_slice(b"MSDOS5.0");
        assert!(matches!(
            BootSector::from_bytes(&b),
            Err(crate::MftFindError::NotNtfs(_))
        ));
    }

    #[test]
    fn sectors_per_cluster_power_of_two_encoding() {
        let mut b = boot_bytes();
        b[0x0D] = 0xF9; // -(−7) -> 2^7 = 128 sectors
        let bs = BootSector::from_bytes(&b).unwrap();
        assert_eq!(bs.sectors_per_cluster_count(), 128);
        assert_eq!(bs.bytes_per_cluster(), 128 * 512);
    }

    #[test]
    fn positive_clusters_per_record() {
        let mut b = boot_bytes();
        b[0x0D] = 2; // 1024-byte clusters
        b[0x40] = 1; // one cluster per record
        let bs = BootSector::from_bytes(&b).unwrap();
        assert_eq!(bs.bytes_per_mft_record(), 1024);
    }

    #[test]
    fn implausible_record_size_falls_back() {
        let mut b = boot_bytes();
        b[0x40] = 3; // 3 clusters = 12288, not a power of two
        let bs = BootSector::from_bytes(&b).unwrap();
        assert_eq!(bs.bytes_per_mft_record(), DEFAULT_MFT_RECORD_SIZE);
    }

    #[test]
    fn filetime_round_trip() {
        let unix = 1_673_784_000i64; // 2023-01-15T12:00:00Z
        let ft = unix_to_filetime(unix);
        assert_eq!(filetime_to_unix(ft), unix);
        let dt = filetime_to_datetime(ft);
        assert_eq!(dt.format("%Y-%m-%d %H:%M:%S").to_string(), "2023-01-15 12:00:00");
    }

    #[test]
    fn namespace_preference_order() {
        assert!(FilenameNamespace::Win32.rank() > FilenameNamespace::Win32AndDos.rank());
        assert!(FilenameNamespace::Win32AndDos.rank() > FilenameNamespace::Posix.rank());
        assert!(FilenameNamespace::Posix.rank() > FilenameNamespace::Dos.rank());
    }

    #[test]
    fn filename_attribute_parse() {
        let mut v = vec![0u8; 66 + 8];
        v[0..8].copy_from_slice(&5u64.to_le_bytes()); // parent ref
        v[40..48].copy_from_slice(&2048u64.to_le_bytes()); // allocated
        v[48..56].copy_from_slice(&1234u64.to_le_bytes()); // real
        v[56..60].copy_from_slice(&0x20u32.to_le_bytes()); // archive
        v[64] = 4; // name length in chars
        v[65] = 1; // Win32
        for (i, ch) in "a.txt".encode_utf16().take(4).enumerate() {
            v[66 + i * 2..68 + i * 2].copy_from_slice(&ch.to_le_bytes());
        }
        let fname = FileNameAttribute::from_bytes(&v).unwrap();
        assert_eq!(fname.parent_record_number(), 5);
        assert_eq!(fname.real_size, 1234);
        assert_eq!(fname.name, "a.tx");
        assert_eq!(fname.namespace, Some(FilenameNamespace::Win32));
    }
}
