//! clipcards - Error types
//!
//! Failures surfaced by the clipboard access core

use crate::clipboard::native::NativeError;

/// Clipboard core error type
#[derive(Debug, thiserror::Error)]
pub enum ClipboardError {
    /// Bounded lock retries exhausted; back off or force a reset
    #[error("Cannot acquire clipboard lock after {attempts} attempts")]
    LockTimeout { attempts: u32 },
    /// Another process holds the native clipboard (retried internally)
    #[error("Clipboard access denied")]
    AccessDenied,
    #[error("Invalid handle for format {format}")]
    InvalidHandle { format: u32 },
    #[error("Clipboard format {format} is not supported")]
    UnsupportedFormat { format: u32 },
    /// A stale holder never released the clipboard lock
    #[error("Clipboard lock held by a stray owner")]
    StrayResourceHeld,
    #[error("No clipboard item matches formats {wanted:?}")]
    FormatNotFound { wanted: Vec<u32> },
    #[error("Index {index} out of range for clip of length {len}")]
    IndexOutOfRange { index: usize, len: usize },
    #[error("Failed to write any of {attempted} clipboard item(s)")]
    WriteFailed { attempted: usize },
    /// The monitor serving the request is no longer running
    #[error("Clipboard monitor has stopped")]
    MonitorStopped,
    #[error("Native clipboard error: {0}")]
    Native(#[from] NativeError),
}

impl ClipboardError {
    /// Whether the caller may recover by retrying later or forcing a reset
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ClipboardError::LockTimeout { .. }
                | ClipboardError::AccessDenied
                | ClipboardError::StrayResourceHeld
        )
    }
}

pub type Result<T> = std::result::Result<T, ClipboardError>;
