//! MFT loading and iteration
//!
//! [`MftVolume`] owns the raw device for one scan session. Bootstrap reads
//! the boot sector, then record 0 (the MFT describing itself), verifies the
//! `$MFT` name, follows the record's DATA run list and pulls the whole
//! table into memory. Iteration is then a plain in-memory walk; the
//! directory resolver falls back to raw reads through the MFT's own extent
//! map for records the in-memory copy no longer holds.

use crate::device::RawVolume;
use crate::error::{MftFindError, Result};
use crate::ntfs::record::ParsedRecord;
use crate::ntfs::runlist::{total_clusters, Extent};
use crate::ntfs::structs::*;
use std::collections::HashMap;
use std::io::{Read, Seek};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Ancestor chains deeper than this are treated as cyclic.
const MAX_RESOLVE_DEPTH: u32 = 4096;

/// Chunk size for streaming the MFT into memory.
const LOAD_CHUNK_BYTES: u64 = 4 * 1024 * 1024;

// ============================================================================
// File Entry
// ============================================================================

/// Everything the reporters need to know about one MFT record.
#[derive(Debug, Clone, Default)]
pub struct FileEntry {
    /// MFT record number
    pub record_index: u32,
    /// Parent directory record number (48-bit reference, masked)
    pub parent_index: u32,
    /// Record sequence number
    pub sequence: u16,
    /// Best filename (Win32 > Win32+DOS > POSIX > DOS); empty when the
    /// record carries no FILE_NAME
    pub name: String,
    /// Number of FILE_NAME attributes
    pub name_count: u32,
    /// Number of DATA attributes (default stream counts as one)
    pub stream_count: u32,
    /// Allocated size on disk
    pub disk_size: u64,
    /// Real file size
    pub file_size: u64,
    /// DOS-style attribute flags
    pub attributes: u32,
    pub created: u64,
    pub modified: u64,
    pub mft_modified: u64,
    pub accessed: u64,
    pub in_use: bool,
    pub is_directory: bool,
    pub sparse: bool,
    /// Fix-up or attribute-walk failure; reporters skip, query counts
    pub corrupt: bool,
    /// On-disk extents of the default DATA stream
    pub extents: Vec<Extent>,
    /// Resolved parent path, populated only when the report needs it
    pub directory: Option<String>,
}

impl FileEntry {
    pub fn deleted(&self) -> bool {
        !self.in_use
    }

    pub fn is_hidden(&self) -> bool {
        (self.attributes & file_attributes::HIDDEN) != 0
    }

    pub fn is_system(&self) -> bool {
        (self.attributes & file_attributes::SYSTEM) != 0
    }
}

// ============================================================================
// Record sink (load-time pruning)
// ============================================================================

/// Observes every record as the MFT streams in. Returning `false` zeroes
/// the record's bytes in place, keeping index arithmetic intact while
/// releasing nothing the caller wants to retain.
pub trait RecordSink {
    /// `record` is `None` when the bytes do not parse as a FILE record.
    fn inspect(&mut self, index: u64, record: Option<&ParsedRecord>) -> bool;
}

// ============================================================================
// MFT Volume
// ============================================================================

/// One scan session over an NTFS volume.
pub struct MftVolume<D> {
    device: RawVolume<D>,
    boot: BootSector,
    bytes_per_cluster: u32,
    record_size: u32,
    /// In-memory copy of the MFT; pruned records are zeroed placeholders
    mft: Vec<u8>,
    /// The MFT's own on-disk extents, for raw record reads
    mft_extents: Vec<Extent>,
    /// Memoised parent-path lookups
    dir_map: HashMap<u64, String>,
    slash: char,
    abort: Option<Arc<AtomicBool>>,
}

impl<D: Read + Seek> MftVolume<D> {
    /// Bootstrap and load the full MFT.
    pub fn open(device: RawVolume<D>) -> Result<Self> {
        Self::open_with(device, None, None)
    }

    /// Bootstrap and load, optionally pruning with `sink` and reporting
    /// load progress as `(bytes_loaded, bytes_total)`.
    pub fn open_with(
        mut device: RawVolume<D>,
        sink: Option<&mut dyn RecordSink>,
        progress: Option<&dyn Fn(u64, u64)>,
    ) -> Result<Self> {
        let mut boot_buf = [0u8; 512];
        device.read_at(0, &mut boot_buf)?;
        let boot = BootSector::from_bytes(&boot_buf)?;
        if !boot.is_plausible() {
            return Err(MftFindError::NotNtfs(String::from("implausible geometry")));
        }

        let bytes_per_cluster = boot.bytes_per_cluster();
        let record_size = boot.bytes_per_mft_record();
        log::debug!(
            "geometry: {} bytes/cluster, {} bytes/record, MFT at cluster {}",
            bytes_per_cluster,
            record_size,
            boot.mft_start_cluster
        );

        // Record 0 describes the MFT itself
        let mut rec0 = vec![0u8; record_size.max(512) as usize];
        device.read_at(boot.mft_byte_offset(), &mut rec0)?;
        rec0.truncate(record_size as usize);
        let parsed0 = ParsedRecord::parse(&mut rec0, 0)?;

        let named_mft = parsed0
            .file_name
            .as_ref()
            .map(|f| f.name == "$MFT")
            .unwrap_or(false);
        if !named_mft {
            return Err(MftFindError::NoMft);
        }
        if parsed0.extents.is_empty() {
            return Err(MftFindError::NoMft);
        }
        let mft_extents = parsed0.extents.clone();

        let total_bytes = total_clusters(&mft_extents) * bytes_per_cluster as u64;
        let mut mft = Vec::with_capacity(total_bytes as usize);

        for extent in &mft_extents {
            let extent_bytes = extent.clusters * bytes_per_cluster as u64;
            match extent.lcn {
                None => {
                    // A hole in the MFT itself; keep the placeholder bytes
                    mft.resize(mft.len() + extent_bytes as usize, 0);
                    if let Some(cb) = progress {
                        cb(mft.len() as u64, total_bytes);
                    }
                }
                Some(lcn) => {
                    let mut remaining = extent_bytes;
                    let mut disk_offset = lcn as u64 * bytes_per_cluster as u64;
                    while remaining > 0 {
                        let chunk = remaining.min(LOAD_CHUNK_BYTES) as usize;
                        let start = mft.len();
                        mft.resize(start + chunk, 0);
                        device.read_at(disk_offset, &mut mft[start..start + chunk])?;
                        disk_offset += chunk as u64;
                        remaining -= chunk as u64;
                        if let Some(cb) = progress {
                            cb(mft.len() as u64, total_bytes);
                        }
                    }
                }
            }
        }

        let mut volume = Self {
            device,
            boot,
            bytes_per_cluster,
            record_size,
            mft,
            mft_extents,
            dir_map: HashMap::new(),
            slash: '\\',
            abort: None,
        };

        if let Some(sink) = sink {
            volume.apply_sink(sink);
        }

        Ok(volume)
    }

    fn apply_sink(&mut self, sink: &mut dyn RecordSink) {
        let record_size = self.record_size as usize;
        let count = self.record_count();

        for index in 0..count {
            let offset = index as usize * record_size;
            let slice = &self.mft[offset..offset + record_size];

            let keep = if &slice[0..4] == b"FILE" {
                let mut scratch = slice.to_vec();
                match ParsedRecord::parse(&mut scratch, index) {
                    Ok(parsed) => sink.inspect(index, Some(&parsed)),
                    Err(_) => sink.inspect(index, None),
                }
            } else {
                sink.inspect(index, None)
            };

            if !keep {
                self.mft[offset..offset + record_size].fill(0);
            }
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn boot(&self) -> &BootSector {
        &self.boot
    }

    pub fn record_size(&self) -> u32 {
        self.record_size
    }

    pub fn bytes_per_cluster(&self) -> u32 {
        self.bytes_per_cluster
    }

    pub fn record_count(&self) -> u64 {
        self.mft.len() as u64 / self.record_size as u64
    }

    pub fn mft_extents(&self) -> &[Extent] {
        &self.mft_extents
    }

    /// Raw bytes of a record in the in-memory MFT (fix-up not applied)
    pub fn record_bytes(&self, index: u64) -> Option<&[u8]> {
        let record_size = self.record_size as usize;
        let offset = index as usize * record_size;
        self.mft.get(offset..offset + record_size)
    }

    pub fn set_slash(&mut self, slash: char) {
        self.slash = slash;
    }

    /// Install the cooperative cancellation flag; checked between records.
    pub fn set_abort_flag(&mut self, flag: Arc<AtomicBool>) {
        self.abort = Some(flag);
    }

    fn aborted(&self) -> bool {
        self.abort
            .as_ref()
            .map(|f| f.load(Ordering::Relaxed))
            .unwrap_or(false)
    }

    // ------------------------------------------------------------------
    // Record iteration
    // ------------------------------------------------------------------

    /// Extract the record at `index` into a [`FileEntry`].
    ///
    /// Returns `NoMoreFiles` past the end of the table and `Aborted` when
    /// the cancellation flag is set. Corrupt records come back as entries
    /// with `corrupt = true` rather than errors, so iteration continues.
    pub fn file_entry(&mut self, index: u64, want_directory: bool) -> Result<FileEntry> {
        if self.aborted() {
            return Err(MftFindError::Aborted);
        }

        let record_size = self.record_size as usize;
        let slice = match (index as usize)
            .checked_mul(record_size)
            .and_then(|o| o.checked_add(record_size).map(|end| (o, end)))
            .and_then(|(o, end)| self.mft.get(o..end))
        {
            Some(s) => s,
            None => return Err(MftFindError::NoMoreFiles),
        };

        if &slice[0..4] != b"FILE" {
            // Never-used or pruned placeholder
            return Ok(FileEntry {
                record_index: index as u32,
                ..Default::default()
            });
        }

        let mut scratch = slice.to_vec();
        let parsed = match ParsedRecord::parse(&mut scratch, index) {
            Ok(parsed) => parsed,
            Err(e) => {
                log::warn!("skipping record {}: {}", index, e);
                return Ok(FileEntry {
                    record_index: index as u32,
                    corrupt: true,
                    ..Default::default()
                });
            }
        };

        let mut entry = Self::entry_from_parsed(index, &parsed);
        if want_directory {
            self.attach_directory(&mut entry);
        }
        Ok(entry)
    }

    fn entry_from_parsed(index: u64, parsed: &ParsedRecord) -> FileEntry {
        let (name, parent, attributes) = match &parsed.file_name {
            Some(f) => (
                f.name.clone(),
                f.parent_record_number() as u32,
                f.file_attributes,
            ),
            None => (String::new(), 0, parsed.standard.file_attributes),
        };

        FileEntry {
            record_index: index as u32,
            parent_index: parent,
            sequence: parsed.header.sequence_number,
            name,
            name_count: parsed.name_count,
            stream_count: parsed.stream_count,
            disk_size: parsed.disk_size,
            file_size: parsed.file_size,
            attributes,
            created: parsed.standard.created,
            modified: parsed.standard.modified,
            mft_modified: parsed.standard.mft_modified,
            accessed: parsed.standard.accessed,
            in_use: parsed.in_use(),
            is_directory: parsed.is_directory(),
            sparse: parsed.sparse,
            corrupt: false,
            extents: parsed.extents.clone(),
            directory: None,
        }
    }

    /// Populate `entry.directory`, degrading to an empty path on failure.
    pub fn attach_directory(&mut self, entry: &mut FileEntry) {
        if entry.parent_index == 0 {
            entry.directory = Some(String::new());
            return;
        }
        match self.resolve_directory(entry.parent_index as u64) {
            Ok(path) => entry.directory = Some(path),
            Err(e) => {
                log::warn!(
                    "directory resolution failed for record {}: {}",
                    entry.record_index,
                    e
                );
                entry.directory = Some(String::new());
            }
        }
    }

    // ------------------------------------------------------------------
    // Directory resolution
    // ------------------------------------------------------------------

    /// Reconstruct the path of the directory record at `index`.
    /// The root resolves to the empty string; memoised per session.
    pub fn resolve_directory(&mut self, index: u64) -> Result<String> {
        self.resolve_inner(index, 0)
    }

    fn resolve_inner(&mut self, index: u64, depth: u32) -> Result<String> {
        if let Some(path) = self.dir_map.get(&index) {
            return Ok(path.clone());
        }
        if depth > MAX_RESOLVE_DEPTH {
            log::warn!("directory chain at record {} exceeds depth limit", index);
            return Ok(String::new());
        }

        let parsed = self.read_record_anywhere(index)?;
        let result = match &parsed.file_name {
            None => String::new(),
            Some(f) => {
                let parent = f.parent_record_number();
                if parent == index || parent == 0 {
                    String::new()
                } else {
                    let mut path = self.resolve_inner(parent, depth + 1)?;
                    path.push(self.slash);
                    path.push_str(&f.name);
                    path
                }
            }
        };

        self.dir_map.insert(index, result.clone());
        Ok(result)
    }

    /// Parse record `index` from the in-memory MFT when present, otherwise
    /// raw-read it through the MFT's extent map.
    fn read_record_anywhere(&mut self, index: u64) -> Result<ParsedRecord> {
        let record_size = self.record_size as usize;
        let offset = index as usize * record_size;

        if let Some(slice) = self.mft.get(offset..offset + record_size) {
            if &slice[0..4] == b"FILE" {
                let mut scratch = slice.to_vec();
                return ParsedRecord::parse(&mut scratch, index);
            }
        }

        let mut scratch = self.read_record_raw(index)?;
        ParsedRecord::parse(&mut scratch, index)
    }

    /// Read one record from disk via the MFT's own extent list.
    fn read_record_raw(&mut self, index: u64) -> Result<Vec<u8>> {
        let record_size = self.record_size as u64;
        let bpc = self.bytes_per_cluster as u64;
        let start = index * record_size;

        let mut out = vec![0u8; record_size as usize];
        let mut done = 0u64;
        let mut cluster_buf = vec![0u8; bpc as usize];

        while done < record_size {
            let byte_offset = start + done;
            let cluster = byte_offset / bpc;
            let within = byte_offset % bpc;

            let lcn = self.translate_cluster(cluster)?;
            self.device.read_at(lcn as u64 * bpc, &mut cluster_buf)?;

            let take = (bpc - within).min(record_size - done);
            out[done as usize..(done + take) as usize]
                .copy_from_slice(&cluster_buf[within as usize..(within + take) as usize]);
            done += take;
        }

        Ok(out)
    }

    /// Map an MFT-relative cluster number to its on-disk LCN.
    fn translate_cluster(&self, cluster: u64) -> Result<i64> {
        lookup_cluster(&self.mft_extents, cluster).ok_or(MftFindError::BadExtent(
            cluster * self.bytes_per_cluster as u64,
        ))
    }
}

/// Find the on-disk LCN backing a logical cluster of an extent-mapped file.
/// `None` when the cluster is past the map or falls in a sparse hole.
fn lookup_cluster(extents: &[Extent], cluster: u64) -> Option<i64> {
    let mut logical = 0u64;
    for extent in extents {
        if cluster < logical + extent.clusters {
            return extent.lcn.map(|lcn| lcn + (cluster - logical) as i64);
        }
        logical += extent.clusters;
    }
    None
}
