//! Scan orchestration
//!
//! Opens the raw device for one input path, bootstraps the MFT and drives
//! either the row reporter or the query/summary reporter over it. The
//! device handle lives for exactly one scan session and is released on
//! every exit path.

use crate::device::RawVolume;
use crate::error::{MftFindError, Result};
use crate::filter::MatchContext;
use crate::ntfs::mft::MftVolume;
use crate::ntfs::record::{apply_fixup, summarize_attributes};
use crate::ntfs::structs::{AttributeType, MftRecordHeader};
use crate::report::{QueryStats, ReportConfig, Reporter};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::{Read, Seek, Write};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// Session-level knobs that are not part of the report itself.
pub struct ScanOptions {
    /// NTFS partition sector offset for physical-drive and image handles
    pub offset_sectors: u64,
    /// Show an MFT load progress bar on stderr
    pub show_progress: bool,
    /// Cooperative cancellation flag, checked between records
    pub abort: Arc<AtomicBool>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            offset_sectors: 0,
            show_progress: false,
            abort: Arc::new(AtomicBool::new(false)),
        }
    }
}

/// Scan one input path (drive letter, device path or image file).
pub fn scan_path(path: &str, cfg: &ReportConfig, opts: &ScanOptions, out: &mut dyn Write) -> Result<()> {
    cfg.validate()?;
    let device = RawVolume::open_path(path, opts.offset_sectors)?;

    let bar = if opts.show_progress {
        let bar = ProgressBar::new(0);
        bar.set_style(ProgressStyle::default_bar());
        bar.set_message("loading MFT");
        Some(bar)
    } else {
        None
    };
    let progress_cb;
    let progress: Option<&dyn Fn(u64, u64)> = match &bar {
        Some(bar) => {
            progress_cb = |loaded: u64, total: u64| {
                bar.set_length(total);
                bar.set_position(loaded);
            };
            Some(&progress_cb)
        }
        None => None,
    };

    let result = if cfg.query_info {
        run_query(device, cfg, opts, progress, out)
    } else {
        let mut volume = MftVolume::open_with(device, None, progress)?;
        volume.set_abort_flag(opts.abort.clone());
        volume.set_slash(cfg.slash);
        run_scan(&mut volume, cfg, out)
    };

    if let Some(bar) = bar {
        bar.finish_and_clear();
    }
    result
}

/// Iterate the loaded MFT, apply both filter stages and report rows.
pub fn run_scan<D: Read + Seek>(
    volume: &mut MftVolume<D>,
    cfg: &ReportConfig,
    out: &mut dyn Write,
) -> Result<()> {
    let want_directory = cfg.wants_directory();
    let mut reporter = Reporter::new(cfg, out);

    for index in 0.. {
        let mut entry = match volume.file_entry(index, false) {
            Ok(entry) => entry,
            Err(MftFindError::NoMoreFiles) => break,
            Err(e) => return Err(e),
        };

        if entry.corrupt || entry.name.is_empty() {
            continue;
        }
        if entry.deleted() != cfg.deleted_only {
            continue;
        }

        if let Some(filter) = &cfg.read_filter {
            if !filter.matches(&MatchContext::read_stage(&entry)) {
                continue;
            }
        }
        if !cfg.passes_report_gate(&entry) {
            continue;
        }

        if want_directory {
            volume.attach_directory(&mut entry);
        }
        if let Some(filter) = &cfg.post_filter {
            let directory = entry.directory.as_deref().unwrap_or("");
            let ctx = if want_directory {
                MatchContext::post_stage(&entry, directory)
            } else {
                MatchContext::read_stage(&entry)
            };
            if !filter.matches(&ctx) {
                continue;
            }
        }

        reporter.write_entry(&entry)?;
    }

    log::debug!("reported {} entries", reporter.rows_written());
    Ok(())
}

/// Query driver: load with the counting sink, list the retained system
/// files, optionally dump attribute detail, then print the summary.
fn run_query(
    device: RawVolume<File>,
    cfg: &ReportConfig,
    opts: &ScanOptions,
    progress: Option<&dyn Fn(u64, u64)>,
    out: &mut dyn Write,
) -> Result<()> {
    let mut stats = QueryStats::new(cfg.show_detail);
    let mut volume = MftVolume::open_with(device, Some(&mut stats), progress)?;
    volume.set_abort_flag(opts.abort.clone());
    volume.set_slash(cfg.slash);
    stats.fragments = volume.mft_extents().len();

    writeln!(out)?;
    writeln!(out, "MFT Information for volume {}", cfg.volume)?;
    writeln!(out)?;
    writeln!(out, "====System Files====")?;

    let listing_cfg = ReportConfig {
        query_info: false,
        show_detail: false,
        mft_index: true,
        modify_time: true,
        disk_size: true,
        file_size: true,
        attribute: true,
        directory: true,
        read_filter: None,
        post_filter: None,
        ..cfg.clone()
    };
    run_scan(&mut volume, &listing_cfg, out)?;

    if cfg.show_detail {
        dump_detail(&volume, out)?;
    }

    stats.write_summary(out)
}

/// Per-record attribute detail for the verbose query report.
fn dump_detail<D: Read + Seek>(volume: &MftVolume<D>, out: &mut dyn Write) -> Result<()> {
    writeln!(out)?;
    writeln!(
        out,
        "====MFT StartSector:{}====",
        volume.boot().mft_byte_offset() / 512
    )?;

    for index in 0..volume.record_count() {
        let bytes = match volume.record_bytes(index) {
            Some(b) if &b[0..4] == b"FILE" => b,
            _ => continue,
        };
        let mut scratch = bytes.to_vec();
        let header = match MftRecordHeader::from_bytes(&scratch) {
            Some(h) if h.is_in_use() => h,
            _ => continue,
        };
        if apply_fixup(&mut scratch, &header, index).is_err() {
            continue;
        }

        writeln!(out)?;
        for attr in summarize_attributes(&scratch) {
            writeln!(
                out,
                "  Record({:x}) {}",
                attr.type_code,
                AttributeType::nibble_name((attr.type_code >> 4) as usize & 0xF)
            )?;
            if let Some((start_vcn, end_vcn, alloc, real, stream)) = attr.non_resident_sizes {
                writeln!(out, "    Location: NonResident")?;
                writeln!(out, "    StartVCN: {:>15}", start_vcn)?;
                writeln!(out, "    EndVCN:   {:>15}", end_vcn)?;
                writeln!(out, "    RealSize: {:>15}", real)?;
                writeln!(out, "    AlloSize: {:>15}", alloc)?;
                writeln!(out, "    StreamSz: {:>15}", stream)?;
                if let Some(name) = &attr.name {
                    writeln!(out, "    Stream:   {}", clean_name(name))?;
                }
                if let Some(first) = attr.first_run_byte {
                    writeln!(out, "    RunLength=0x{:02x}", first)?;
                }
            } else if let Some(len) = attr.resident_length {
                writeln!(out, "    Location: Resident")?;
                writeln!(out, "    Size:     {:>15}", len)?;
                if let Some(name) = &attr.name {
                    writeln!(out, "    Stream:   {}", clean_name(name))?;
                }
            }
            if let Some(root) = &attr.index_root {
                writeln!(out, "    Size:     {:>15}", root.index_block_size)?;
                writeln!(out, "    EntrySize:{:>15}", root.entries_total_size)?;
                writeln!(out, "    EntryOff: {:>15}", root.entries_offset)?;
            }
        }
    }
    Ok(())
}

/// Replace non-printable characters for terminal-safe output.
fn clean_name(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_control() { '~' } else { c })
        .collect()
}
