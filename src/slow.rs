//! Slow directory-tree scan
//!
//! Fallback traversal over the live directory tree through the OS
//! enumeration APIs. Slower than reading the MFT for a whole volume, but
//! faster when the search is confined to a known subdirectory. Reuses the
//! same filter rules as the MFT scan.

use crate::device::drive_letter;
use crate::error::Result;
use crate::filter::MatchContext;
use crate::ntfs::mft::FileEntry;
use crate::ntfs::structs::{file_attributes, unix_to_filetime};
use crate::report::ReportConfig;
use std::io::Write;
use std::path::Path;
use std::time::UNIX_EPOCH;
use walkdir::WalkDir;

/// Walk the live tree under `root`, printing paths that pass both filter
/// stages. A trailing glob component in `root` is folded into the name
/// filter by the CLI, so only the directory part is walked here.
pub fn slow_scan(root: &str, cfg: &ReportConfig, out: &mut dyn Write) -> Result<()> {
    cfg.validate()?;

    if cfg.deleted_only {
        log::warn!("deleted entries are not visible to the directory walker");
        return Ok(());
    }

    let root = walk_root(root);
    for item in WalkDir::new(&root).into_iter().filter_map(|e| e.ok()) {
        if !item.file_type().is_file() {
            continue;
        }
        let meta = match item.metadata() {
            Ok(m) => m,
            Err(e) => {
                log::warn!("cannot stat {}: {}", item.path().display(), e);
                continue;
            }
        };

        let modified = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| unix_to_filetime(d.as_secs() as i64))
            .unwrap_or(0);

        let entry = FileEntry {
            name: item.file_name().to_string_lossy().into_owned(),
            disk_size: meta.len(),
            file_size: meta.len(),
            modified,
            in_use: true,
            attributes: file_attributes::ARCHIVE,
            ..Default::default()
        };

        let directory = directory_for_match(item.path());
        if let Some(filter) = &cfg.post_filter {
            if !filter.matches(&MatchContext::post_stage(&entry, &directory)) {
                continue;
            }
        }
        if let Some(filter) = &cfg.read_filter {
            if !filter.matches(&MatchContext::post_stage(&entry, &directory)) {
                continue;
            }
        }

        writeln!(out, "{}", item.path().display())?;
    }

    Ok(())
}

/// Strip a trailing glob component, leaving the directory to walk.
fn walk_root(root: &str) -> String {
    let path = Path::new(root);
    if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
        if name.contains('*') || name.contains('?') {
            if let Some(parent) = path.parent() {
                let parent = parent.to_string_lossy();
                if !parent.is_empty() {
                    return parent.into_owned();
                }
            }
            return String::from(".");
        }
    }
    root.to_string()
}

/// Directory string used for pattern matching: the file's parent path with
/// any drive prefix stripped, mirroring the MFT resolver's output shape.
fn directory_for_match(path: &Path) -> String {
    let parent = path
        .parent()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_default();
    if drive_letter(&parent).is_some() {
        parent[2..].to_string()
    } else {
        parent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn walk_root_strips_glob_component() {
        assert_eq!(walk_root("logs"), "logs");
        assert_eq!(walk_root("logs/*.log"), "logs");
        assert_eq!(walk_root("*.log"), ".");
    }

    #[test]
    fn directory_for_match_shapes() {
        #[cfg(windows)]
        assert_eq!(
            directory_for_match(Path::new("C:\\logs\\app.log")),
            "\\logs"
        );
        assert_eq!(directory_for_match(Path::new("a/b/c.txt")), "a/b");
        assert_eq!(directory_for_match(Path::new("c.txt")), "");
    }

    #[test]
    fn walker_finds_matching_files() {
        let dir = std::env::temp_dir().join("mftfind-slow-test");
        let sub = dir.join("logs");
        std::fs::create_dir_all(&sub).unwrap();
        std::fs::write(sub.join("app.log"), b"hello").unwrap();
        std::fs::write(sub.join("readme.txt"), b"hi").unwrap();

        let cfg = ReportConfig {
            read_filter: Some(crate::filter::MatchRule::Name {
                pattern: String::from("*.log"),
                case_sensitive: false,
                invert: false,
            }),
            ..Default::default()
        };

        let mut buf = Vec::new();
        slow_scan(dir.to_str().unwrap(), &cfg, &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert!(text.contains("app.log"));
        assert!(!text.contains("readme.txt"));

        std::fs::remove_dir_all(&dir).ok();
    }
}
