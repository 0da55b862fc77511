//! MFT record parsing
//!
//! Applies the per-sector update-sequence fix-up to a raw record buffer,
//! then walks the attribute list to produce a [`ParsedRecord`]: standard
//! information, the best FILE_NAME, name/stream counts, the sparse flag and
//! the default DATA stream's extents.

use crate::error::{MftFindError, Result};
use crate::ntfs::runlist::{decode_runs, Extent};
use crate::ntfs::structs::*;

/// Everything extracted from one fixed-up MFT record.
#[derive(Debug, Clone, Default)]
pub struct ParsedRecord {
    pub header: MftRecordHeader,
    pub standard: StandardInformation,
    /// Best FILE_NAME by namespace preference (Win32 > Both > POSIX > DOS)
    pub file_name: Option<FileNameAttribute>,
    /// Number of FILE_NAME attributes in the record
    pub name_count: u32,
    /// Number of DATA attributes (default and named streams)
    pub stream_count: u32,
    /// Any DATA attribute carried the sparse flag
    pub sparse: bool,
    /// Allocated size of the default DATA stream (FILE_NAME value until a
    /// non-resident unnamed DATA attribute overrides it)
    pub disk_size: u64,
    /// Real size of the default DATA stream
    pub file_size: u64,
    /// On-disk extents of the default DATA stream
    pub extents: Vec<Extent>,
    /// Attribute-type histogram for this record, indexed by high nibble
    pub type_counts: [u8; 16],
}

impl ParsedRecord {
    pub fn in_use(&self) -> bool {
        self.header.is_in_use()
    }

    pub fn is_directory(&self) -> bool {
        self.header.is_directory()
    }

    /// Parse a record buffer in place. The buffer is mutated by the fix-up
    /// pass, so callers hand in a scratch copy. `index` is only used for
    /// error reporting.
    pub fn parse(data: &mut [u8], index: u64) -> Result<Self> {
        let header = MftRecordHeader::from_bytes(data)
            .filter(|h| h.is_valid())
            .ok_or(MftFindError::BadRecord(index))?;

        apply_fixup(data, &header, index)?;

        let mut rec = ParsedRecord {
            header,
            ..Default::default()
        };
        rec.walk_attributes(data, index)?;
        Ok(rec)
    }

    fn walk_attributes(&mut self, data: &[u8], index: u64) -> Result<()> {
        let mut offset = self.header.first_attribute_offset as usize;
        let mut saw_default_data = false;

        while offset + 16 <= data.len() {
            let attr = match AttributeHeader::from_bytes(&data[offset..]) {
                Some(a) => a,
                None => break,
            };

            if attr.attribute_type == ATTRIBUTE_END_MARKER || attr.length == 0 {
                break;
            }
            let end = offset + attr.length as usize;
            if end > data.len() {
                log::warn!("record {}: attribute at {} overruns record", index, offset);
                break;
            }

            let attr_slice = &data[offset..end];
            self.type_counts[((attr.attribute_type >> 4) & 0xF) as usize] =
                self.type_counts[((attr.attribute_type >> 4) & 0xF) as usize].saturating_add(1);

            match AttributeType::from_u32(attr.attribute_type) {
                Some(AttributeType::StandardInformation) => {
                    if let Some(value) = ResidentAttributeHeader::from_bytes(attr_slice)
                        .and_then(|h| h.value(attr_slice).map(|v| v.to_vec()))
                    {
                        if let Some(si) = StandardInformation::from_bytes(&value) {
                            self.standard = si;
                        }
                    }
                }
                Some(AttributeType::FileName) => {
                    if let Some(value) = ResidentAttributeHeader::from_bytes(attr_slice)
                        .and_then(|h| h.value(attr_slice).map(|v| v.to_vec()))
                    {
                        if let Some(fname) = FileNameAttribute::from_bytes(&value) {
                            self.name_count += 1;
                            self.take_better_name(fname);
                        }
                    }
                }
                Some(AttributeType::Data) => {
                    self.stream_count += 1;
                    self.sparse |= attr.is_sparse();

                    // Only a non-resident unnamed DATA attribute overrides
                    // the FILE_NAME sizes; resident data stays described by
                    // the name attribute.
                    let named = attr.name_length > 0;
                    if attr.non_resident && !named && !saw_default_data {
                        if let Some(nr) = NonResidentAttributeHeader::from_bytes(attr_slice) {
                            saw_default_data = true;
                            self.disk_size = nr.allocated_size;
                            self.file_size = nr.real_size;
                            let runs_at = nr.run_list_offset as usize;
                            if runs_at < attr_slice.len() {
                                self.extents = decode_runs(&attr_slice[runs_at..])?;
                            }
                        }
                    }
                }
                _ => {}
            }

            offset = end;
        }

        if !saw_default_data {
            if let Some(name) = &self.file_name {
                self.disk_size = name.allocated_size;
                self.file_size = name.real_size;
            }
        }

        Ok(())
    }

    fn take_better_name(&mut self, candidate: FileNameAttribute) {
        let better = match (&self.file_name, candidate.namespace) {
            (_, None) => false,
            (None, Some(_)) => true,
            (Some(current), Some(ns)) => {
                // Strictly better only; ties keep the first encountered
                current.namespace.map(|c| c.rank()).unwrap_or(0) < ns.rank()
            }
        };
        if better {
            self.file_name = Some(candidate);
        }
    }
}

// ============================================================================
// Fix-up
// ============================================================================

/// Apply the NTFS update-sequence fix-up to a raw record buffer.
///
/// The last two bytes of every 512-byte stride must equal the sentinel (the
/// first u16 of the update-sequence array); each is restored from the
/// corresponding array slot. A mismatch means a torn or corrupt record.
pub fn apply_fixup(data: &mut [u8], header: &MftRecordHeader, index: u64) -> Result<()> {
    let usa_offset = header.update_sequence_offset as usize;
    let usa_count = header.update_sequence_count as usize;

    if usa_count < 2 {
        // Nothing protected (some synthetic images omit the array)
        return Ok(());
    }
    if usa_offset + usa_count * 2 > data.len() {
        return Err(MftFindError::BadRecord(index));
    }

    let sentinel = u16::from_le_bytes([data[usa_offset], data[usa_offset + 1]]);

    for slot in 1..usa_count {
        let sector_end = slot * SECTOR_SIZE as usize - 2;
        let fixup_at = usa_offset + slot * 2;
        if sector_end + 2 > data.len() {
            break;
        }

        let stored = u16::from_le_bytes([data[sector_end], data[sector_end + 1]]);
        if stored != sentinel {
            return Err(MftFindError::BadRecord(index));
        }

        data[sector_end] = data[fixup_at];
        data[sector_end + 1] = data[fixup_at + 1];
    }

    Ok(())
}

// ============================================================================
// Attribute summaries (query detail dump)
// ============================================================================

/// One attribute's surface detail, as shown by the verbose query report.
#[derive(Debug, Clone)]
pub struct AttributeSummary {
    pub type_code: u32,
    pub non_resident: bool,
    /// Stream identifier for named attributes
    pub name: Option<String>,
    /// Resident value length
    pub resident_length: Option<u32>,
    /// (start_vcn, end_vcn, allocated, real, stream) for non-resident
    pub non_resident_sizes: Option<(u64, u64, u64, u64, u64)>,
    /// First run-list header byte, when a run list is present
    pub first_run_byte: Option<u8>,
    /// Selected INDEX_ROOT fields
    pub index_root: Option<IndexRootHeader>,
}

/// Walk a fixed-up record and summarise each attribute for display.
pub fn summarize_attributes(data: &[u8]) -> Vec<AttributeSummary> {
    let mut out = Vec::new();
    let header = match MftRecordHeader::from_bytes(data).filter(|h| h.is_valid()) {
        Some(h) => h,
        None => return out,
    };

    let mut offset = header.first_attribute_offset as usize;
    while offset + 16 <= data.len() {
        let attr = match AttributeHeader::from_bytes(&data[offset..]) {
            Some(a) => a,
            None => break,
        };
        if attr.attribute_type == ATTRIBUTE_END_MARKER || attr.length == 0 {
            break;
        }
        let end = offset + attr.length as usize;
        if end > data.len() {
            break;
        }
        let attr_slice = &data[offset..end];

        let mut summary = AttributeSummary {
            type_code: attr.attribute_type,
            non_resident: attr.non_resident,
            name: attr.name(attr_slice),
            resident_length: None,
            non_resident_sizes: None,
            first_run_byte: None,
            index_root: None,
        };

        if attr.non_resident {
            if let Some(nr) = NonResidentAttributeHeader::from_bytes(attr_slice) {
                summary.non_resident_sizes = Some((
                    nr.start_vcn,
                    nr.end_vcn,
                    nr.allocated_size,
                    nr.real_size,
                    nr.stream_size,
                ));
                let runs_at = nr.run_list_offset as usize;
                if runs_at != 0 && runs_at < attr_slice.len() {
                    summary.first_run_byte = Some(attr_slice[runs_at]);
                }
            }
        } else if let Some(res) = ResidentAttributeHeader::from_bytes(attr_slice) {
            summary.resident_length = Some(res.value_length);
            if attr.attribute_type == AttributeType::IndexRoot as u32 {
                summary.index_root = res
                    .value(attr_slice)
                    .and_then(IndexRootHeader::from_bytes);
            }
        }

        out.push(summary);
        offset = end;
    }

    out
}
