//! clipcards - Clipboard module
//!
//! Structured clipboard contents, guarded access to the native clipboard,
//! and change monitoring

pub mod clip;
pub mod codec;
pub mod format;
pub mod handler;
pub mod lock;
pub mod models;
pub mod monitor;
pub mod native;

pub use clip::{Clip, FormatPriority, Item};
pub use format::Format;
pub use handler::{Handler, HandlerState, Session};
pub use lock::{ClipboardLock, LockHold};
pub use models::{infer_format, Datum, Payload, PayloadKind};
pub use monitor::{Monitor, MonitorCommand, MonitorEvent, MonitorHandle, TickOutcome};
pub use native::{MemoryClipboard, NativeClipboard, NativeError, PlatformClipboard};
