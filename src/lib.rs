//! mftfind - fast NTFS file finder
//!
//! Enumerates the files of an NTFS volume by reading the Master File Table
//! straight off the raw block device, instead of walking directories
//! through the OS. Reading the MFT directly locates files anywhere on a
//! disk quickly and also surfaces entries a directory walk never sees,
//! such as deleted records and alternate data streams.
//!
//! # Features
//!
//! - **Direct MFT reading**: boot-sector bootstrap, fix-up verification,
//!   attribute parsing and data-run decoding
//! - **Composable filters**: name globs, modify time, size, stream count
//!   and directory patterns, with AND/OR/NOT composition
//! - **Lazy path resolution**: parent chains are reconstructed on demand
//!   and memoised
//! - **Query mode**: whole-MFT statistics instead of a file listing
//! - **Image support**: the same engine runs against raw volume images
//!
//! # Example
//!
//! ```no_run
//! use mftfind::{scan_path, MatchRule, ReportConfig, ScanOptions};
//!
//! fn main() -> mftfind::Result<()> {
//!     let cfg = ReportConfig {
//!         modify_time: true,
//!         disk_size: true,
//!         directory: true,
//!         read_filter: Some(MatchRule::Name {
//!             pattern: "*.log".into(),
//!             case_sensitive: false,
//!             invert: false,
//!         }),
//!         ..Default::default()
//!     };
//!     let mut stdout = std::io::stdout().lock();
//!     scan_path("C:", &cfg, &ScanOptions::default(), &mut stdout)
//! }
//! ```

pub mod device;
pub mod error;
pub mod filter;
pub mod ntfs;
pub mod report;
pub mod scan;
pub mod slow;

// Re-export main types
pub use device::RawVolume;
pub use error::{MftFindError, Result};
pub use filter::{glob_match, CmpOp, MatchContext, MatchRule};
pub use ntfs::{FileEntry, MftVolume};
pub use report::{parse_attribute_mask, QueryStats, ReportConfig, Reporter};
pub use scan::{run_scan, scan_path, ScanOptions};
pub use slow::slow_scan;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Format bytes as human-readable string
pub fn format_size(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB", "PB"];

    if bytes == 0 {
        return "0 B".to_string();
    }

    let exp = (bytes as f64).log(1024.0).floor() as usize;
    let exp = exp.min(UNITS.len() - 1);
    let size = bytes as f64 / 1024_f64.powi(exp as i32);

    if exp == 0 {
        format!("{} B", bytes)
    } else {
        format!("{:.2} {}", size, UNITS[exp])
    }
}

/// Format a Windows FILETIME as a human-readable date string
pub fn format_filetime(filetime: u64) -> String {
    ntfs::filetime_to_datetime(filetime)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}
