//! clipcards - Native clipboard surface
//!
//! The OS-owned operations the access core consumes. Only [`Handler`]
//! touches an implementation, and only while its lock is held.
//!
//! [`Handler`]: crate::clipboard::Handler

pub mod memory;
#[cfg(windows)]
pub mod win32;

pub use memory::MemoryClipboard;
#[cfg(windows)]
pub use win32::WindowsClipboard;

/// Clipboard backend for the current target
#[cfg(windows)]
pub type PlatformClipboard = WindowsClipboard;
/// Clipboard backend for the current target
#[cfg(not(windows))]
pub type PlatformClipboard = MemoryClipboard;

/// Errors reported by a native clipboard backend
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NativeError {
    /// Another owner has the clipboard open
    #[error("Access is denied")]
    AccessDenied,
    /// The calling owner has not opened the clipboard
    #[error("Clipboard is not open")]
    NotOpen,
    #[error("The handle is invalid")]
    InvalidHandle,
    /// Format is advertised but its data cannot be retrieved
    #[error("Clipboard format {0} unavailable")]
    FormatUnavailable(u32),
    #[error("OS error {code}")]
    Os { code: i32 },
}

/// Operations on the single OS clipboard resource
pub trait NativeClipboard: Send {
    /// Open a clipboard session for this owner
    fn open(&mut self) -> Result<(), NativeError>;

    fn close(&mut self) -> Result<(), NativeError>;

    /// Remove every format (requires an open session)
    fn empty(&mut self) -> Result<(), NativeError>;

    /// Format id following `after`; pass 0 to start. `None` ends enumeration.
    fn next_format(&self, after: u32) -> Option<u32>;

    fn get(&self, format: u32) -> Result<Vec<u8>, NativeError>;

    fn set(&mut self, format: u32, data: &[u8]) -> Result<(), NativeError>;

    /// OS change-sequence counter; readable without a session
    fn sequence(&self) -> u32;

    /// Current clipboard owner, for diagnostics only
    fn owner(&self) -> Option<isize> {
        None
    }

    /// Every format currently on the clipboard, in enumeration order
    fn formats(&self) -> Vec<u32> {
        let mut formats = Vec::new();
        let mut current = 0;
        while let Some(next) = self.next_format(current) {
            formats.push(next);
            current = next;
        }
        formats
    }
}
