//! clipcards - Clipboard handler
//!
//! Mediates exclusive access to the native clipboard. A [`Session`] is the
//! scoped acquisition: opening one takes the clipboard lock and opens the
//! native clipboard, and dropping it always closes and unlocks again.

use std::thread;

use tokio::time;

use super::clip::Clip;
use super::codec;
use super::format::Format;
use super::lock::{ClipboardLock, LockHold};
use super::models::{infer_format, Datum};
use super::native::{NativeClipboard, NativeError, PlatformClipboard};
use crate::config::{self, LockSettings};
use crate::error::{ClipboardError, Result};

/// Where a handler is in its acquisition cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerState {
    Closed,
    Acquiring,
    Open,
}

/// Owner of one native clipboard endpoint
pub struct Handler<N: NativeClipboard = PlatformClipboard> {
    native: N,
    lock: ClipboardLock,
    settings: LockSettings,
    state: HandlerState,
    /// Last sequence number this handler observed
    current_seq: u32,
}

impl<N: NativeClipboard> Handler<N> {
    /// Create a handler using the global lock settings
    pub fn new(native: N, lock: ClipboardLock) -> Self {
        Self::with_settings(native, lock, config::get_settings().lock)
    }

    pub fn with_settings(native: N, lock: ClipboardLock, settings: LockSettings) -> Self {
        let current_seq = native.sequence();
        log::info!("[Handler] Initialized at sequence {}", current_seq);
        Self {
            native,
            lock,
            settings,
            state: HandlerState::Closed,
            current_seq,
        }
    }

    pub fn lock(&self) -> &ClipboardLock {
        &self.lock
    }

    pub fn native(&self) -> &N {
        &self.native
    }

    pub fn state(&self) -> HandlerState {
        self.state
    }

    /// Sequence number cached by the last read, write, clear or refresh
    pub fn current_seq(&self) -> u32 {
        self.current_seq
    }

    /// Read the OS sequence counter and cache it
    pub fn sequence(&mut self) -> u32 {
        self.current_seq = self.native.sequence();
        self.current_seq
    }

    /// Read the OS sequence counter without touching the cache
    pub fn live_sequence(&self) -> u32 {
        self.native.sequence()
    }

    /// Acquire the clipboard for a scoped session
    pub fn open(&mut self) -> Result<Session<'_, N>> {
        self.state = HandlerState::Acquiring;
        match self.acquire() {
            Ok(hold) => {
                self.state = HandlerState::Open;
                Ok(Session {
                    handler: self,
                    hold: Some(hold),
                })
            }
            Err(e) => {
                self.state = HandlerState::Closed;
                Err(e)
            }
        }
    }

    /// Acquire the clipboard without blocking the runtime thread
    ///
    /// Same retry policy as [`open`](Self::open), but every wait yields.
    pub async fn open_async(&mut self) -> Result<Session<'_, N>> {
        self.state = HandlerState::Acquiring;
        match self.acquire_async().await {
            Ok(hold) => {
                self.state = HandlerState::Open;
                Ok(Session {
                    handler: self,
                    hold: Some(hold),
                })
            }
            Err(e) => {
                self.state = HandlerState::Closed;
                Err(e)
            }
        }
    }

    fn acquire(&mut self) -> Result<LockHold> {
        let attempts = self.settings.max_attempts;
        let timeout = self.settings.attempt_timeout();

        for attempt in 1..=attempts {
            let Some(hold) = self.lock.hold_for(timeout) else {
                continue;
            };
            match self.open_native(hold, attempt)? {
                Some(hold) => return Ok(hold),
                None => thread::sleep(timeout),
            }
        }
        Err(self.timed_out())
    }

    async fn acquire_async(&mut self) -> Result<LockHold> {
        let attempts = self.settings.max_attempts;
        let timeout = self.settings.attempt_timeout();

        for attempt in 1..=attempts {
            let Some(hold) = self.lock.hold_within(timeout).await else {
                continue;
            };
            match self.open_native(hold, attempt)? {
                Some(hold) => return Ok(hold),
                None => time::sleep(timeout).await,
            }
        }
        Err(self.timed_out())
    }

    /// Open the native clipboard under `hold`
    ///
    /// `Ok(None)` means access was denied and the hold has been given back.
    fn open_native(&mut self, hold: LockHold, attempt: u32) -> Result<Option<LockHold>> {
        match self.native.open() {
            Ok(()) => {
                log::debug!("[Handler] Clipboard opened on attempt {}", attempt);
                Ok(Some(hold))
            }
            Err(NativeError::AccessDenied) => {
                log::debug!(
                    "[Handler] Access denied (owner {:?}), attempt {}/{}",
                    self.native.owner(),
                    attempt,
                    self.settings.max_attempts
                );
                hold.release();
                Ok(None)
            }
            Err(e) => {
                log::error!("[Handler] Failed to open clipboard: {}", e);
                Err(e.into())
            }
        }
    }

    fn timed_out(&self) -> ClipboardError {
        let attempts = self.settings.max_attempts;
        log::warn!("[Handler] Cannot acquire clipboard lock after {} attempts", attempts);
        ClipboardError::LockTimeout { attempts }
    }

    /// Open, read everything, release
    pub fn read(&mut self) -> Result<Clip> {
        let mut session = self.open()?;
        let clip = session.read();
        session.release()?;
        Ok(clip)
    }

    /// Open, replace the contents with `clip`, release
    pub fn write(&mut self, clip: &Clip) -> Result<usize> {
        let mut session = self.open()?;
        let written = session.write(clip);
        let released = session.release();
        let written = written?;
        released?;
        Ok(written)
    }

    pub async fn read_async(&mut self) -> Result<Clip> {
        let mut session = self.open_async().await?;
        let clip = session.read();
        session.release_async().await?;
        Ok(clip)
    }

    pub async fn write_async(&mut self, clip: &Clip) -> Result<usize> {
        let mut session = self.open_async().await?;
        let written = session.write(clip);
        let released = session.release_async().await;
        let written = written?;
        released?;
        Ok(written)
    }

    /// Open, empty the clipboard, release
    pub fn clear(&mut self) -> Result<()> {
        let mut session = self.open()?;
        let cleared = session.clear();
        let released = session.release();
        cleared?;
        released
    }

    /// Close any stray native session and force the lock open
    ///
    /// Only for when a previous holder crashed or hung without releasing.
    pub fn force_reset(&mut self) -> bool {
        log::error!(
            "[Handler] FORCED RESET: clipboard lock held by a stray owner ({})",
            ClipboardError::StrayResourceHeld
        );
        if let Err(e) = self.native.close() {
            log::debug!("[Handler] No native session to close during reset: {}", e);
        }
        let was_held = self.lock.force_unlock();
        self.state = HandlerState::Closed;
        was_held
    }
}

/// Scoped clipboard acquisition; released on drop
pub struct Session<'a, N: NativeClipboard> {
    handler: &'a mut Handler<N>,
    hold: Option<LockHold>,
}

impl<N: NativeClipboard> Session<'_, N> {
    /// Everything currently on the clipboard, stamped with its sequence number
    ///
    /// Unreadable formats become null datums; an empty clipboard reads as a
    /// single null datum.
    pub fn read(&mut self) -> Clip {
        let native = &self.handler.native;
        let seq = native.sequence();
        let mut clip = Clip::with_sequence(seq);

        for id in native.formats() {
            let format = Format::new(id);
            if !format.is_supported() {
                log::warn!("[Handler] {} not supported, substituting null", format);
                clip.append(Datum::null());
                continue;
            }
            match native.get(id) {
                Ok(bytes) => {
                    let payload = codec::decode(&format, &bytes);
                    clip.append(Datum::with_format(Some(payload), format));
                }
                Err(e) => {
                    log::warn!("[Handler] Format {} unavailable: {}", format, e);
                    clip.append(Datum::with_format(None, format));
                }
            }
        }

        if clip.is_empty() {
            clip.append(Datum::null());
        }
        log::debug!("[Handler] Read {}", clip);
        self.handler.current_seq = seq;
        clip
    }

    /// Replace the clipboard contents with `clip`
    ///
    /// Items that fail are skipped; the write fails only if every non-null
    /// item failed. Returns the number of formats set.
    pub fn write(&mut self, clip: &Clip) -> Result<usize> {
        let emptied = self.handler.native.empty();
        if let Err(e) = emptied {
            self.handler.sequence();
            return Err(e.into());
        }

        let mut attempted = 0;
        let mut written = 0;
        for datum in clip {
            let Some(payload) = &datum.data else {
                continue;
            };
            attempted += 1;

            let format = if datum.format.is_null() {
                infer_format(Some(payload))
            } else {
                datum.format.clone()
            };
            let Some(id) = format.id() else {
                log::warn!("[Handler] Format '{}' has no id, skipping", format.name());
                continue;
            };
            if !format.is_supported() {
                log::warn!("[Handler] {}, skipping", ClipboardError::UnsupportedFormat { format: id });
                continue;
            }
            let Some(bytes) = codec::encode(payload, &format) else {
                log::warn!("[Handler] No {} rendering for '{}', skipping", format, datum.preview(40));
                continue;
            };

            match self.handler.native.set(id, &bytes) {
                Ok(()) => written += 1,
                Err(NativeError::InvalidHandle) => {
                    log::warn!("[Handler] {} ({}). Skipping...", ClipboardError::InvalidHandle { format: id }, format);
                }
                Err(NativeError::NotOpen) => {
                    self.handler.sequence();
                    return Err(NativeError::NotOpen.into());
                }
                Err(e) => log::warn!("[Handler] Failed to set {}: {}", format, e),
            }
        }

        let seq = self.handler.sequence();
        log::debug!("[Handler] Wrote {}/{} item(s), sequence now {}", written, attempted, seq);
        if attempted > 0 && written == 0 {
            return Err(ClipboardError::WriteFailed { attempted });
        }
        Ok(written)
    }

    /// Empty the clipboard
    pub fn clear(&mut self) -> Result<()> {
        let emptied = self.handler.native.empty();
        self.handler.sequence();
        emptied.map_err(Into::into)
    }

    /// Read and cache the OS sequence counter
    pub fn sequence(&mut self) -> u32 {
        self.handler.sequence()
    }

    /// Close the native clipboard and unlock
    pub fn release(mut self) -> Result<()> {
        self.finish()
    }

    /// Like [`release`](Self::release), but the grace delay yields
    pub async fn release_async(mut self) -> Result<()> {
        let Some(hold) = self.hold.take() else {
            return Ok(());
        };
        let closed = self.close_native();
        time::sleep(self.handler.settings.release_grace()).await;
        hold.release();
        self.handler.state = HandlerState::Closed;
        closed
    }

    fn finish(&mut self) -> Result<()> {
        let Some(hold) = self.hold.take() else {
            return Ok(());
        };
        let closed = self.close_native();
        thread::sleep(self.handler.settings.release_grace());
        hold.release();
        self.handler.state = HandlerState::Closed;
        closed
    }

    fn close_native(&mut self) -> Result<()> {
        match self.handler.native.close() {
            Ok(()) => Ok(()),
            Err(NativeError::NotOpen) => {
                log::warn!("[Handler] Clipboard was not open at release");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl<N: NativeClipboard> Drop for Session<'_, N> {
    fn drop(&mut self) {
        if let Err(e) = self.finish() {
            log::error!("[Handler] Failed to release clipboard: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clipboard::clip::Item;
    use crate::clipboard::models::Payload;
    use crate::clipboard::native::MemoryClipboard;
    use pretty_assertions::assert_eq;

    fn quick() -> LockSettings {
        LockSettings {
            attempt_timeout_ms: 1,
            max_attempts: 5,
            release_grace_ms: 0,
        }
    }

    fn handler() -> (Handler<MemoryClipboard>, MemoryClipboard) {
        let clipboard = MemoryClipboard::new();
        let handler = Handler::with_settings(clipboard.connect(), ClipboardLock::new(), quick());
        (handler, clipboard)
    }

    #[test]
    fn test_session_releases_on_drop() {
        let (mut handler, clipboard) = handler();
        {
            let _session = handler.open().unwrap();
            assert!(clipboard.is_open());
        }
        assert!(!clipboard.is_open());
        assert!(!handler.lock().is_held());
        assert_eq!(handler.state(), HandlerState::Closed);
    }

    #[test]
    fn test_session_releases_on_early_error() {
        fn failing(handler: &mut Handler<MemoryClipboard>) -> Result<()> {
            let _session = handler.open()?;
            Err(ClipboardError::AccessDenied)
        }
        let (mut handler, clipboard) = handler();
        assert!(failing(&mut handler).is_err());
        assert!(!clipboard.is_open());
        assert!(!handler.lock().is_held());
    }

    #[test]
    fn test_access_denied_is_retried() {
        let (mut handler, clipboard) = handler();
        clipboard.deny_opens(3);
        assert!(handler.read().is_ok());
    }

    #[test]
    fn test_access_denied_exhausts_into_lock_timeout() {
        let (mut handler, clipboard) = handler();
        clipboard.deny_opens(10);
        assert!(matches!(
            handler.read(),
            Err(ClipboardError::LockTimeout { attempts: 5 })
        ));
        assert!(!handler.lock().is_held());
        assert_eq!(handler.state(), HandlerState::Closed);
    }

    #[tokio::test]
    async fn test_async_access_denied_exhausts_into_lock_timeout() {
        let (mut handler, clipboard) = handler();
        clipboard.deny_opens(10);
        assert!(matches!(
            handler.read_async().await,
            Err(ClipboardError::LockTimeout { attempts: 5 })
        ));
        assert!(!handler.lock().is_held());

        clipboard.deny_opens(0);
        assert_eq!(handler.write_async(&Clip::from_item("async")).await.unwrap(), 1);
        assert_eq!(handler.read_async().await.unwrap()[0].data, Some(Payload::from("async")));
        assert_eq!(handler.state(), HandlerState::Closed);
    }

    #[test]
    fn test_held_lock_times_out() {
        let (mut handler, _clipboard) = handler();
        let _stray = handler.lock().try_hold().unwrap();
        let err = handler.read().unwrap_err();
        assert!(matches!(err, ClipboardError::LockTimeout { .. }));
        assert!(err.is_recoverable());
    }

    #[test]
    fn test_release_swallows_not_open() {
        let (mut handler, clipboard) = handler();
        let session = handler.open().unwrap();
        clipboard.drop_session();
        assert!(session.release().is_ok());
        assert!(!handler.lock().is_held());
    }

    #[test]
    fn test_read_empty_clipboard_yields_single_null() {
        let (mut handler, _clipboard) = handler();
        let clip = handler.read().unwrap();
        assert_eq!(clip.len(), 1);
        assert!(clip[0].is_null());
        assert!(!clip.is_placeholder());
    }

    #[test]
    fn test_read_decodes_each_format() {
        let (mut handler, clipboard) = handler();
        clipboard.external_write(&[(13, b"h\0i\0\0\0".to_vec()), (8, vec![1, 2, 3])]);
        let clip = handler.read().unwrap();
        assert_eq!(clip.len(), 2);
        assert_eq!(clip.find(13).unwrap().data, Some(Payload::from("hi")));
        assert_eq!(clip.find(8).unwrap().data, Some(Payload::Bytes(vec![1, 2, 3])));
        assert_eq!(clip.sequence(), i64::from(clipboard.connect().sequence()));
    }

    #[test]
    fn test_read_degrades_unavailable_and_unsupported_formats() {
        let (mut handler, clipboard) = handler();
        clipboard.external_write(&[(3, b"wmf".to_vec()), (8, b"dib".to_vec()), (13, b"x\0".to_vec())]);
        clipboard.make_unavailable(8);
        let clip = handler.read().unwrap();
        assert_eq!(clip.len(), 3);
        assert!(clip[0].is_null() && clip[0].format.is_null());
        assert!(clip[1].is_null());
        assert_eq!(clip[1].format, 8u32);
        assert_eq!(clip[2].data, Some(Payload::from("x")));
    }

    #[test]
    fn test_write_skips_invalid_handles() {
        let (mut handler, clipboard) = handler();
        clipboard.reject(1);
        let clip = Clip::from_item(Item::list([
            Item::Datum(Datum::with_format(Some("plain".into()), 1)),
            Item::from("unicode"),
        ]));
        assert_eq!(handler.write(&clip).unwrap(), 1);
        assert_eq!(clipboard.contents().len(), 1);
    }

    #[test]
    fn test_write_fails_when_every_item_fails() {
        let (mut handler, clipboard) = handler();
        clipboard.reject(13);
        let clip = Clip::from_item("only text");
        assert!(matches!(
            handler.write(&clip),
            Err(ClipboardError::WriteFailed { attempted: 1 })
        ));
        assert!(!handler.lock().is_held());
    }

    #[test]
    fn test_write_refreshes_sequence() {
        let (mut handler, _clipboard) = handler();
        let before = handler.sequence();
        handler.write(&Clip::from_item("test")).unwrap();
        assert_eq!(handler.current_seq(), before + 2);
        assert_eq!(handler.current_seq(), handler.live_sequence());
    }

    #[test]
    fn test_clear_bumps_sequence_each_time() {
        let (mut handler, clipboard) = handler();
        clipboard.external_write(&[(13, b"a\0\0\0")]);
        let start = handler.sequence();
        handler.clear().unwrap();
        assert!(clipboard.contents().is_empty());
        assert_eq!(handler.current_seq(), start + 1);
        handler.clear().unwrap();
        assert!(clipboard.contents().is_empty());
        assert_eq!(handler.current_seq(), start + 2);
    }

    #[test]
    fn test_force_reset_unlocks_stray_hold() {
        let (mut handler, _clipboard) = handler();
        let stray = handler.lock().try_hold().unwrap();
        assert!(handler.force_reset());
        assert!(!stray.is_current());
        assert!(handler.read().is_ok());
    }
}
