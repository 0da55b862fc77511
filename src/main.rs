//! mftfind CLI
//!
//! Searches NTFS volumes by reading the Master File Table directly rather
//! than iterating across directories. No index database is used or
//! maintained; every invocation is stateless.

use clap::Parser;
use console::style;
use mftfind::ntfs::unix_to_filetime;
use mftfind::{
    parse_attribute_mask, scan_path, slow_scan, CmpOp, MatchRule, ReportConfig, ScanOptions,
};
use std::io::Write;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

/// 100-nanosecond FILETIME units per day
const FILETIME_PER_DAY: f64 = 864_000_000_000.0;

const EXAMPLES: &str = "\
Examples:
    mftfind c: d:                   List entire c and d drive, display filenames.
    mftfind -I -T -S -A -D d:       Add mft index, time, size, attribute and directory columns.

  Filter examples (prefix a -f pattern with ! to invert the rule):
    mftfind -f *.txt d:             Files ending in .txt on d: drive
    mftfind -f \\*\\foo*\\*.txt d:     Files ending in .txt in a directory starting with foo
    mftfind -f Map1.* -f Map2.* c:  Files matching either pattern
    mftfind -T -S -f *cache -t -0.1 c:   Files ending in cache, modified in the last 0.1 days
    mftfind -f !*.txt d:            Files NOT ending in .txt
    mftfind -t 2.5 -f *.log c:      Modified more than 2.5 days ago and ending in .log
    mftfind -s 1000 d:              File size greater than 1000 bytes
    mftfind -s -1000 d: e:          File size less than 1000 bytes
    mftfind -d 1 d:                 Files with more than 1 data stream
    mftfind -X -f * c:              All deleted entries
    mftfind -Q c:                   Display MFT information only
    mftfind -z c:\\windows\\system32\\*.dll   Force the slow directory search.
";

#[derive(Parser)]
#[command(name = "mftfind")]
#[command(version)]
#[command(disable_version_flag = true)]
#[command(about = "Fast NTFS file find - searches the MFT instead of walking directories")]
#[command(after_help = EXAMPLES)]
struct Cli {
    /// Filter by filename glob (* and ?); `dir\name` forms also filter the
    /// directory; prefix with ! to invert
    #[arg(short = 'f', long = "filter", value_name = "PATTERN")]
    filters: Vec<String>,

    /// Filter by modify time in relative days; negative means newer than
    /// |DAYS| days ago, positive means older
    #[arg(short = 't', long = "days", value_name = "DAYS", allow_negative_numbers = true)]
    days: Option<f64>,

    /// Filter by file size in bytes; positive means greater, negative less
    #[arg(short = 's', long = "size", value_name = "BYTES", allow_negative_numbers = true)]
    size: Option<i64>,

    /// Filter by data stream count; positive means greater, negative less
    #[arg(short = 'd', long = "streams", value_name = "COUNT", allow_negative_numbers = true)]
    streams: Option<i64>,

    /// Include the attribute column; selector chars filter on attributes:
    /// s=system, h=hidden, r=readonly (implies system), d=directory,
    /// f=files, c=compressed
    #[arg(
        short = 'A',
        long = "attributes",
        value_name = "CHARS",
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = ""
    )]
    attributes: Option<String>,

    /// Include the directory column
    #[arg(short = 'D', long = "directory")]
    directory: bool,

    /// Include the MFT index column
    #[arg(short = 'I', long = "index")]
    index: bool,

    /// Include the size columns
    #[arg(short = 'S', long = "sizes")]
    sizes: bool,

    /// Include the modify time column
    #[arg(short = 'T', long = "time")]
    time: bool,

    /// Include the extent (VCN) list column
    #[arg(short = 'V', long = "extents")]
    extents: bool,

    /// Include stream and name counts
    #[arg(short = '#', long = "counts")]
    counts: bool,

    /// Report only deleted entries
    #[arg(short = 'X', long = "deleted")]
    deleted: bool,

    /// Query mode: display MFT information instead of a file listing
    #[arg(short = 'Q', long = "query")]
    query: bool,

    /// Verbose query output (per-record attribute detail)
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// Force the slow directory-walk search instead of reading the MFT
    #[arg(short = 'z', long = "walk")]
    walk: bool,

    /// Sector offset of the NTFS volume within a raw image or
    /// physical-drive path
    #[arg(long = "offset", value_name = "SECTORS", default_value_t = 0)]
    offset: u64,

    /// Drive letters, volume paths or raw image files to search
    #[arg(required = true, value_name = "PATH")]
    paths: Vec<String>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();
    let code = run(&cli);
    if code != 0 {
        std::process::exit(code);
    }
}

fn run(cli: &Cli) -> i32 {
    let slash = '\\';

    // Shared filter pieces built once from the flags
    let mut base_reads = Vec::new();
    if let Some(days) = cli.days {
        let now = unix_to_filetime(chrono::Utc::now().timestamp());
        let span = (days.abs() * FILETIME_PER_DAY) as u64;
        let cutoff = now.saturating_sub(span);
        let op = if days < 0.0 { CmpOp::Greater } else { CmpOp::Less };
        base_reads.push(MatchRule::Date { filetime: cutoff, op, invert: false });
    }
    if let Some(size) = cli.size {
        let op = if size > 0 { CmpOp::Greater } else { CmpOp::Less };
        base_reads.push(MatchRule::Size {
            bytes: size.unsigned_abs(),
            op,
            invert: false,
        });
    }
    if let Some(streams) = cli.streams {
        let op = if streams > 0 { CmpOp::Greater } else { CmpOp::Less };
        base_reads.push(MatchRule::StreamCount {
            count: streams.unsigned_abs() as u32,
            op,
            invert: false,
        });
    }

    let mut base_names = Vec::new();
    let mut base_posts = Vec::new();
    for pattern in &cli.filters {
        add_file_filter(pattern, slash, &mut base_names, &mut base_posts);
    }

    let opts = ScanOptions {
        offset_sectors: cli.offset,
        show_progress: console::Term::stderr().is_term() && !cli.walk,
        abort: Arc::new(AtomicBool::new(false)),
    };

    let mut stdout = std::io::stdout().lock();
    let mut worst = 0i32;

    for path in &cli.paths {
        // Fresh filter value per input path
        let mut names = base_names.clone();
        let mut posts = base_posts.clone();
        let target = split_path_pattern(path, slash, &mut names, &mut posts);

        let mut reads = base_reads.clone();
        if names.len() == 1 {
            reads.push(names.remove(0));
        } else if !names.is_empty() {
            reads.push(MatchRule::Any(names));
        }

        let cfg = ReportConfig {
            query_info: cli.query,
            show_detail: cli.verbose,
            mft_index: cli.index,
            modify_time: cli.time,
            disk_size: cli.sizes,
            file_size: cli.sizes,
            attribute: cli.attributes.is_some(),
            directory: cli.directory,
            name_count: cli.counts,
            stream_count: cli.counts,
            show_extents: cli.extents,
            deleted_only: cli.deleted,
            attributes: match (&cli.attributes, cli.query) {
                (_, true) => mftfind::ntfs::file_attributes::SYSTEM,
                (Some(spec), false) => parse_attribute_mask(spec),
                (None, false) => u32::MAX,
            },
            slash,
            volume: volume_label(&target),
            read_filter: mftfind::filter::all_of(reads),
            post_filter: mftfind::filter::all_of(posts),
            ..Default::default()
        };

        let result = if cli.walk {
            slow_scan(path, &cfg, &mut stdout)
        } else {
            scan_path(&target, &cfg, &opts, &mut stdout)
        };

        if let Err(e) = result {
            let _ = writeln!(
                std::io::stderr(),
                "{} {}: {}",
                style("Error").red().bold(),
                path,
                e
            );
            let code = e.exit_code();
            if worst == 0 || code == -2 {
                worst = code;
            }
        }
    }

    worst
}

/// Turn one `-f` pattern (or a path-embedded pattern) into filter rules.
///
/// A bare name glob becomes a read-stage name rule. Patterns containing a
/// slash split into a directory rule (post stage) plus, when the final
/// component is a real glob, a name rule.
fn add_file_filter(
    pattern: &str,
    slash: char,
    names: &mut Vec<MatchRule>,
    posts: &mut Vec<MatchRule>,
) {
    let (pattern, invert) = match pattern.strip_prefix('!') {
        Some(rest) => (rest, true),
        None => (pattern, false),
    };
    if pattern.is_empty() {
        return;
    }

    match pattern.rfind(slash) {
        None => names.push(MatchRule::Name {
            pattern: pattern.to_string(),
            case_sensitive: false,
            invert,
        }),
        Some(pos) => {
            let dir = &pattern[..pos];
            let name = &pattern[pos + 1..];
            if !name.is_empty() && name != "*" {
                names.push(MatchRule::Name {
                    pattern: name.to_string(),
                    case_sensitive: false,
                    invert,
                });
            }
            posts.push(MatchRule::Directory {
                pattern: dir.to_string(),
                invert,
            });
        }
    }
}

/// Split a positional like `C:\dir\*.txt` into the volume to scan and an
/// embedded filter. Returns the scan target.
fn split_path_pattern(
    path: &str,
    slash: char,
    names: &mut Vec<MatchRule>,
    posts: &mut Vec<MatchRule>,
) -> String {
    let bytes = path.as_bytes();
    if bytes.len() >= 2 && bytes[0].is_ascii_alphabetic() && bytes[1] == b':' {
        if path.len() > 3 {
            // Keep the leading slash so directory patterns line up with
            // resolved paths, which are always root-relative
            add_file_filter(&path[2..], slash, names, posts);
        }
        return path[..2].to_string();
    }
    path.to_string()
}

/// Display label prefixed to reported paths.
fn volume_label(target: &str) -> String {
    match mftfind::device::drive_letter(target) {
        Some(letter) => format!("{}:", letter),
        None => String::new(),
    }
}
