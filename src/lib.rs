//! clipcards - Structured clipboard access
//!
//! Reads and writes every format on the system clipboard as one ordered
//! [`Clip`], serialises access to the clipboard behind a process-wide lock,
//! and notices changes made by other programs by polling the clipboard's
//! sequence counter.

pub mod clipboard;
pub mod config;
pub mod error;
pub mod storage;

pub use clipboard::{
    Clip, ClipboardLock, Datum, Format, Handler, Item, Monitor, MonitorEvent, Payload,
};
pub use error::{ClipboardError, Result};

/// Initialize logging
///
/// Honours `RUST_LOG`, defaulting to `info`. Safe to call more than once.
pub fn init_logging() {
    let initialized = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init();
    if initialized.is_ok() {
        log::info!("clipcards v{} logging initialized", env!("CARGO_PKG_VERSION"));
    }
}
