//! NTFS on-disk format support
//!
//! Decoding for the boot sector, MFT records, attributes and run lists,
//! plus the in-memory MFT session used by the scanners.

pub mod mft;
pub mod record;
pub mod runlist;
pub mod structs;

pub use mft::{FileEntry, MftVolume, RecordSink};
pub use record::{AttributeSummary, ParsedRecord};
pub use runlist::{decode_runs, encode_runs, total_clusters, Extent};
pub use structs::{
    file_attributes, filetime_to_datetime, filetime_to_unix, unix_to_filetime, AttributeType,
    BootSector, FileNameAttribute, FilenameNamespace, MftRecordHeader, StandardInformation,
};
