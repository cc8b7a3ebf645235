//! clipcards - Windows clipboard backend
//!
//! Raw clipboard calls through clipboard-win, with format enumeration and
//! format naming straight from the Win32 DataExchange API.

use clipboard_win::{raw, ErrorCode};
use windows::Win32::System::DataExchange::{EnumClipboardFormats, GetClipboardFormatNameW};

use super::{NativeClipboard, NativeError};

const ERROR_ACCESS_DENIED: i32 = 5;
const ERROR_INVALID_HANDLE: i32 = 6;
const ERROR_CLIPBOARD_NOT_OPEN: i32 = 1418;

/// The system clipboard of the calling thread
#[derive(Debug, Default)]
pub struct WindowsClipboard;

impl WindowsClipboard {
    pub fn new() -> Self {
        Self
    }
}

fn map_error(err: ErrorCode) -> NativeError {
    match err.raw_code() {
        ERROR_ACCESS_DENIED => NativeError::AccessDenied,
        ERROR_INVALID_HANDLE => NativeError::InvalidHandle,
        ERROR_CLIPBOARD_NOT_OPEN => NativeError::NotOpen,
        code => NativeError::Os { code },
    }
}

impl NativeClipboard for WindowsClipboard {
    fn open(&mut self) -> Result<(), NativeError> {
        raw::open().map_err(map_error)
    }

    fn close(&mut self) -> Result<(), NativeError> {
        raw::close().map_err(map_error)
    }

    fn empty(&mut self) -> Result<(), NativeError> {
        raw::empty().map_err(map_error)
    }

    fn next_format(&self, after: u32) -> Option<u32> {
        match unsafe { EnumClipboardFormats(after) } {
            0 => None,
            format => Some(format),
        }
    }

    fn get(&self, format: u32) -> Result<Vec<u8>, NativeError> {
        if !raw::is_format_avail(format) {
            return Err(NativeError::FormatUnavailable(format));
        }
        let mut out = Vec::new();
        match raw::get_vec(format, &mut out) {
            Ok(_) => Ok(out),
            Err(err) if err.raw_code() == 0 => Err(NativeError::FormatUnavailable(format)),
            Err(err) => Err(map_error(err)),
        }
    }

    fn set(&mut self, format: u32, data: &[u8]) -> Result<(), NativeError> {
        raw::set_without_clear(format, data).map_err(map_error)
    }

    fn sequence(&self) -> u32 {
        raw::seq_num().map(|seq| seq.get()).unwrap_or(0)
    }

    fn owner(&self) -> Option<isize> {
        raw::get_owner().map(|owner| owner.as_ptr() as isize)
    }
}

/// Register a private clipboard format name with the OS
pub fn register_format(name: &str) -> Option<u32> {
    raw::register_format(name).map(|id| id.get())
}

/// Name the OS has registered for `format`, if any
pub fn format_name(format: u32) -> Option<String> {
    let mut buffer = [0u16; 256];
    let len = unsafe { GetClipboardFormatNameW(format, &mut buffer) };
    if len <= 0 {
        return None;
    }
    Some(String::from_utf16_lossy(&buffer[..len as usize]))
}
