//! Report configuration and output
//!
//! [`ReportConfig`] carries every knob for a scan: columns, attribute mask,
//! deleted-only mode, separators and the two filter stages. [`Reporter`]
//! streams matched entries as columnar text, emitting the header once on
//! the first row. [`QueryStats`] is the alternate driver that accumulates
//! per-record statistics instead of printing rows.

use crate::error::Result;
use crate::filter::MatchRule;
use crate::ntfs::mft::{FileEntry, RecordSink};
use crate::ntfs::record::ParsedRecord;
use crate::ntfs::structs::{file_attributes, filetime_to_datetime, AttributeType};
use std::io::Write;

// ============================================================================
// Report configuration
// ============================================================================

/// All knobs for one scan of one volume.
#[derive(Debug, Clone)]
pub struct ReportConfig {
    /// Run the MFT query/summary driver instead of the row reporter
    pub query_info: bool,
    /// With `query_info`, dump per-record attribute detail
    pub show_detail: bool,

    // Report columns
    pub mft_index: bool,
    pub modify_time: bool,
    pub disk_size: bool,
    pub file_size: bool,
    pub attribute: bool,
    pub directory: bool,
    pub name_count: bool,
    pub stream_count: bool,
    pub show_extents: bool,

    /// Report only deleted (not-in-use) entries
    pub deleted_only: bool,
    /// Attribute-bit mask gating reported entries
    pub attributes: u32,

    pub separator: String,
    pub slash: char,
    /// Volume label prefixed to each path
    pub volume: String,

    /// Evaluated during record iteration, before directory resolution
    pub read_filter: Option<MatchRule>,
    /// Evaluated after directory resolution (directory patterns)
    pub post_filter: Option<MatchRule>,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            query_info: false,
            show_detail: false,
            mft_index: false,
            modify_time: false,
            disk_size: false,
            file_size: false,
            attribute: false,
            directory: false,
            name_count: false,
            stream_count: false,
            show_extents: false,
            deleted_only: false,
            attributes: u32::MAX,
            separator: String::from(" "),
            slash: '\\',
            volume: String::new(),
            read_filter: None,
            post_filter: None,
        }
    }
}

impl ReportConfig {
    /// Validate both filter stages.
    pub fn validate(&self) -> Result<()> {
        if let Some(f) = &self.read_filter {
            f.validate()?;
        }
        if let Some(f) = &self.post_filter {
            f.validate()?;
        }
        Ok(())
    }

    /// Directory resolution is needed for the column or a directory filter.
    pub fn wants_directory(&self) -> bool {
        self.directory
            || self
                .post_filter
                .as_ref()
                .map(MatchRule::wants_directory)
                .unwrap_or(false)
    }

    /// Attribute-mask gate applied before printing.
    ///
    /// An entry passes when its attribute bits intersect the mask, or it has
    /// no attribute bits and the mask includes system, or the counts column
    /// is on and it has extra names/streams, or it is sparse and the mask
    /// includes system.
    pub fn passes_report_gate(&self, entry: &FileEntry) -> bool {
        let system = self.attributes & file_attributes::SYSTEM != 0;
        let mut good = entry.attributes & self.attributes != 0;
        good |= entry.attributes == 0 && system;
        good |= (entry.stream_count > 1 || entry.name_count > 1) && self.stream_count;
        good |= entry.sparse && system;
        good
    }
}

/// Parse the `-A=` attribute selector characters into a mask.
///
/// Selectors: `s`=system, `h`=hidden, `r`=readonly, `d`=directory,
/// `f`=files (everything but directories), `c`=compressed. As documented in
/// the CLI help, `r` also selects system. An empty selector keeps the
/// match-everything mask.
pub fn parse_attribute_mask(spec: &str) -> u32 {
    if spec.is_empty() {
        return u32::MAX;
    }
    let mut mask = 0u32;
    for c in spec.chars() {
        match c.to_ascii_lowercase() {
            'r' => mask |= file_attributes::READONLY | file_attributes::SYSTEM,
            's' => mask |= file_attributes::SYSTEM,
            'h' => mask |= file_attributes::HIDDEN,
            'd' => mask |= file_attributes::DIRECTORY,
            'f' => mask = !file_attributes::DIRECTORY,
            'c' => mask |= file_attributes::COMPRESSED,
            other => log::warn!("ignoring unknown attribute selector '{}'", other),
        }
    }
    mask
}

// ============================================================================
// Row reporter
// ============================================================================

/// Streams matched entries as one line of separated columns each.
pub struct Reporter<'a, W: Write> {
    cfg: &'a ReportConfig,
    out: W,
    header_written: bool,
    rows: u64,
}

impl<'a, W: Write> Reporter<'a, W> {
    pub fn new(cfg: &'a ReportConfig, out: W) -> Self {
        Self {
            cfg,
            out,
            header_written: false,
            rows: 0,
        }
    }

    pub fn rows_written(&self) -> u64 {
        self.rows
    }

    /// Write one matched entry, emitting the header first if needed.
    pub fn write_entry(&mut self, entry: &FileEntry) -> Result<()> {
        if !self.header_written {
            self.header_written = true;
            self.write_header()?;
        }

        let cfg = self.cfg;
        let sep = &cfg.separator;

        if cfg.mft_index {
            write!(self.out, "{:>6}{}", entry.record_index, sep)?;
        }
        if cfg.stream_count {
            write!(self.out, "{:>6}{}", entry.stream_count, sep)?;
        }
        if cfg.modify_time {
            write!(
                self.out,
                "{}{}",
                filetime_to_datetime(entry.modified).format("%Y-%m-%d %H:%M:%S"),
                sep
            )?;
        }
        if cfg.disk_size {
            write!(
                self.out,
                "{:>19}{}{}",
                entry.disk_size,
                if entry.sparse { '%' } else { ' ' },
                sep
            )?;
        }
        if cfg.file_size {
            write!(self.out, "{:>19}{}", entry.file_size, sep)?;
        }
        if cfg.attribute {
            let kind = if entry.is_directory || entry.attributes & file_attributes::DIRECTORY != 0
            {
                " Dir "
            } else if entry.stream_count > 1 {
                " Aux "
            } else {
                "     "
            };
            write!(self.out, "{}{}{:>8x}{}", kind, sep, entry.attributes, sep)?;
        }
        if cfg.show_extents && !entry.extents.is_empty() {
            write!(self.out, " VCN({}) ", entry.extents.len())?;
            for extent in &entry.extents {
                match extent.lcn {
                    Some(lcn) => write!(self.out, "{}#{} ", lcn, extent.clusters)?,
                    None => write!(self.out, "-#{} ", extent.clusters)?,
                }
            }
        }
        if cfg.name_count {
            write!(self.out, "{:>6}{}", entry.name_count, sep)?;
        }

        write!(self.out, "{}", cfg.volume)?;
        if cfg.directory {
            write!(
                self.out,
                "{}{}",
                entry.directory.as_deref().unwrap_or(""),
                cfg.slash
            )?;
        }
        writeln!(self.out, "{}", entry.name)?;

        self.rows += 1;
        Ok(())
    }

    fn write_header(&mut self) -> Result<()> {
        let cfg = self.cfg;
        let sep = &cfg.separator;

        if cfg.mft_index {
            write!(self.out, "{:>6}{}", "Index", sep)?;
        }
        if cfg.stream_count {
            write!(self.out, "{:>6}{}", "#Data", sep)?;
        }
        if cfg.modify_time {
            write!(self.out, "   Modified Date   {}", sep)?;
        }
        if cfg.disk_size {
            write!(self.out, "{:>19} {}", "DiskSize", sep)?;
        }
        if cfg.file_size {
            write!(self.out, "{:>19}{}", "FileSize", sep)?;
        }
        if cfg.attribute {
            write!(self.out, " Dir {}{:>8}{}", sep, "Attribute", sep)?;
        }
        if cfg.name_count {
            write!(self.out, "{:>6}{}", "#Name", sep)?;
        }
        writeln!(self.out, "Path")?;
        Ok(())
    }
}

// ============================================================================
// Query statistics
// ============================================================================

/// Per-bucket record counts, split by in-use and deleted populations.
#[derive(Debug, Clone, Default)]
pub struct CountInfo {
    /// Indexed by the low three attribute bits: readonly=1, hidden=2, system=4
    pub attr_counts: [u64; 8],
    /// Indexed by filename namespace: POSIX, Unicode, DOS, Unicode&DOS
    pub name_type_counts: [u64; 4],
    pub file_count: u64,
    pub dir_count: u64,
    pub real_size: u64,
    pub alloc_size: u64,
}

impl CountInfo {
    fn count(&mut self, rec: &ParsedRecord) {
        let (flags, namespace) = match &rec.file_name {
            Some(f) => (
                f.file_attributes,
                f.namespace.map(|n| n as u8).unwrap_or(0),
            ),
            None => (0, 0),
        };

        self.attr_counts[(flags & 7) as usize] += 1;
        self.name_type_counts[(namespace & 3) as usize] += 1;

        if flags & file_attributes::DIRECTORY != 0 {
            self.dir_count += 1;
        } else {
            self.file_count += 1;
            self.real_size += rec.file_size;
            self.alloc_size += rec.disk_size;
        }
    }

    pub fn total(&self) -> u64 {
        self.file_count + self.dir_count
    }

    fn write_report(&self, out: &mut dyn Write) -> Result<()> {
        writeln!(out, "  --ATTRIBUTES (count)--")?;
        let labels = [
            "Normal",
            "ReadOnly(R)",
            "Hidden(H)",
            "R&H",
            "System(S)",
            "S&R",
            "S&H",
            "S&R&H",
        ];
        for (label, count) in labels.iter().zip(self.attr_counts.iter()) {
            writeln!(out, "{:>20}:{:>15}", label, count)?;
        }
        writeln!(out)?;
        writeln!(out, "  --NAME TYPES (count)--")?;
        let names = ["POSIX", "Unicode", "DOS", "Unicode&DOS"];
        for (label, count) in names.iter().zip(self.name_type_counts.iter()) {
            writeln!(out, "{:>20}:{:>15}", label, count)?;
        }
        writeln!(out)?;
        writeln!(out, "  --TYPE (count)--")?;
        writeln!(out, "{:>20}:{:>15}", "File", self.file_count)?;
        writeln!(out, "{:>20}:{:>15}", "Directory", self.dir_count)?;
        writeln!(out)?;
        writeln!(out, "  --SIZE--")?;
        writeln!(out, "{:>20}:{:>15}", "Real", self.real_size)?;
        writeln!(out, "{:>20}:{:>15}", "Allocated", self.alloc_size)?;
        Ok(())
    }
}

/// Accumulates whole-MFT statistics while the loader streams records in,
/// pruning everything but the system files unless detail mode needs the
/// full table retained.
#[derive(Debug, Clone, Default)]
pub struct QueryStats {
    pub active: CountInfo,
    pub deleted: CountInfo,
    /// Attribute-type histogram over every record, by type high nibble
    pub type_counts: [u64; 16],
    /// Records whose fix-up or signature check failed
    pub corrupt: u64,
    /// Fragment count of the MFT itself (set after load)
    pub fragments: usize,
    /// Retain every record (needed for the `-v` detail dump)
    pub keep_all: bool,
}

impl QueryStats {
    pub fn new(keep_all: bool) -> Self {
        Self {
            keep_all,
            ..Default::default()
        }
    }

    pub fn write_summary(&self, out: &mut dyn Write) -> Result<()> {
        writeln!(out)?;
        writeln!(out, "====Record Summary (Count)====")?;
        writeln!(out, "{:>20}:{:>15}", "Active", self.active.total())?;
        writeln!(out, "{:>20}:{:>15}", "Free", self.deleted.total())?;
        writeln!(
            out,
            "{:>20}:{:>15}",
            "Total",
            self.active.total() + self.deleted.total() + self.corrupt
        )?;
        writeln!(out, "{:>20}:{:>15}", "Corrupt", self.corrupt)?;
        writeln!(out, "{:>20}:{:>15}", "Fragments", self.fragments)?;
        writeln!(out)?;

        writeln!(out, "====MFT Information (Record Count)====")?;
        for nibble in 1..16 {
            writeln!(
                out,
                " {:>20}{:>15}",
                AttributeType::nibble_name(nibble),
                self.type_counts[nibble]
            )?;
        }
        writeln!(out)?;

        writeln!(out, "====Active Records====")?;
        self.active.write_report(out)?;
        writeln!(out)?;
        writeln!(out, "====Free(deleted) Records====")?;
        self.deleted.write_report(out)?;
        Ok(())
    }
}

impl RecordSink for QueryStats {
    fn inspect(&mut self, _index: u64, record: Option<&ParsedRecord>) -> bool {
        let rec = match record {
            Some(rec) => rec,
            None => {
                self.corrupt += 1;
                return false;
            }
        };

        for (total, per_record) in self.type_counts.iter_mut().zip(rec.type_counts.iter()) {
            *total += *per_record as u64;
        }

        if rec.in_use() {
            self.active.count(rec);
        } else {
            self.deleted.count(rec);
        }

        if self.keep_all {
            return true;
        }

        // Keep only the system metadata files for the listing pass
        match &rec.file_name {
            Some(f) => {
                rec.in_use()
                    && f.name.starts_with('$')
                    && f.file_attributes & file_attributes::SYSTEM != 0
                    && f.real_size != 0
                    && f.parent_record_number() < 16
            }
            None => false,
        }
    }
}
