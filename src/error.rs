//! Error types for mftfind
//!
//! One error enum covers the whole scan pipeline, from opening the raw
//! device through per-record parsing and filter construction.

use thiserror::Error;

/// Main error type for mftfind operations
#[derive(Error, Debug)]
pub enum MftFindError {
    #[error("Failed to open device '{0}': {1}")]
    DeviceOpen(String, std::io::Error),

    #[error("Device I/O error: {0}")]
    Device(#[from] std::io::Error),

    #[error("Volume is not an NTFS filesystem (OEM id {0:?})")]
    NotNtfs(String),

    #[error("MFT record 0 is not named $MFT")]
    NoMft,

    #[error("Fix-up verification failed for MFT record {0}")]
    BadRecord(u64),

    #[error("Malformed data run list: {0}")]
    BadRunList(String),

    #[error("MFT extent map does not cover byte offset {0}")]
    BadExtent(u64),

    /// Normal iteration terminator, not user-visible.
    #[error("No more MFT records")]
    NoMoreFiles,

    #[error("Scan aborted")]
    Aborted,

    #[error("Invalid filter: {0}")]
    FilterInvalid(String),
}

/// Result type alias for mftfind operations
pub type Result<T> = std::result::Result<T, MftFindError>;

impl MftFindError {
    /// Process exit code for this error.
    ///
    /// OS errors carry their raw code; the remaining variants map onto the
    /// nearest Win32 error number so batch scripts can distinguish them.
    pub fn exit_code(&self) -> i32 {
        match self {
            MftFindError::DeviceOpen(_, e) | MftFindError::Device(e) => {
                e.raw_os_error().unwrap_or(5)
            }
            MftFindError::NotNtfs(_) => 15,     // ERROR_INVALID_DRIVE
            MftFindError::NoMft => 1200,        // ERROR_BAD_DEVICE
            MftFindError::BadRecord(_) => 1392, // ERROR_FILE_CORRUPT
            MftFindError::BadRunList(_) => 1392,
            MftFindError::BadExtent(_) => 1784, // ERROR_INVALID_USER_BUFFER
            MftFindError::NoMoreFiles => 0,
            MftFindError::Aborted => -2,
            MftFindError::FilterInvalid(_) => 87, // ERROR_INVALID_PARAMETER
        }
    }

    /// Check if this error is recoverable (scan can continue past it)
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            MftFindError::BadRecord(_)
                | MftFindError::BadRunList(_)
                | MftFindError::BadExtent(_)
        )
    }
}
