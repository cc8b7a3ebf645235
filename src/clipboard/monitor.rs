//! clipcards - Clipboard monitoring module
//!
//! Polls the clipboard sequence counter on a cooperative timer and publishes
//! a full read whenever it moves. Writes requested by collaborators go through
//! the same loop, so they never overlap a change check.

use std::fmt;

use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, MissedTickBehavior};

use super::clip::Clip;
use super::handler::Handler;
use super::native::{NativeClipboard, PlatformClipboard};
use crate::config::{self, MonitorSettings};
use crate::error::{ClipboardError, Result};

/// Queued commands per monitor
const COMMAND_CAPACITY: usize = 16;

/// What collaborators are told about clipboard changes
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorEvent {
    /// The sequence counter moved; a `NewClip` follows
    Changed,
    /// Everything read after a change
    NewClip(Clip),
}

/// Result of one polling tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Sequence number unchanged
    Unchanged,
    /// Lock held elsewhere; check skipped
    Busy,
    /// Lock was stuck and has been forced open
    ForcedReset,
    /// A change was read and published at this sequence number
    Published(u32),
    /// A change was seen but could not be read
    Failed,
}

type EventCallback = Box<dyn FnMut(MonitorEvent) + Send>;

/// Clipboard change monitor
pub struct Monitor<N: NativeClipboard = PlatformClipboard> {
    handler: Handler<N>,
    settings: MonitorSettings,
    /// Consecutive ticks that could not take the lock
    try_count: u32,
    current: Option<Clip>,
    callback: EventCallback,
}

impl<N: NativeClipboard> Monitor<N> {
    /// Create a monitor using the global monitor settings
    ///
    /// callback: called with every change event, in order
    pub fn new<F>(handler: Handler<N>, callback: F) -> Self
    where
        F: FnMut(MonitorEvent) + Send + 'static,
    {
        Self::with_settings(handler, config::get_settings().monitor, callback)
    }

    pub fn with_settings<F>(handler: Handler<N>, settings: MonitorSettings, callback: F) -> Self
    where
        F: FnMut(MonitorEvent) + Send + 'static,
    {
        Self {
            handler,
            settings,
            try_count: 0,
            current: None,
            callback: Box::new(callback),
        }
    }

    pub fn handler(&self) -> &Handler<N> {
        &self.handler
    }

    pub fn try_count(&self) -> u32 {
        self.try_count
    }

    /// Last clip this monitor published
    pub fn current(&self) -> Option<&Clip> {
        self.current.as_ref()
    }

    /// Whether the clipboard changed since the last read or write
    ///
    /// Returns `None` if the lock could not be taken without waiting.
    pub fn check(&self) -> Option<bool> {
        let hold = self.handler.lock().try_hold()?;
        let changed = self.handler.live_sequence() != self.handler.current_seq();
        hold.release();
        Some(changed)
    }

    /// Finish a tick that needs no clipboard read
    ///
    /// `None` means the sequence moved and a read must be published.
    fn poll(&mut self) -> Option<TickOutcome> {
        match self.check() {
            None => {
                self.try_count += 1;
                if self.try_count > self.settings.stuck_threshold {
                    log::error!(
                        "[Monitor] Clipboard lock unavailable for {} consecutive checks",
                        self.try_count
                    );
                    self.handler.force_reset();
                    self.try_count = 0;
                    return Some(TickOutcome::ForcedReset);
                }
                Some(TickOutcome::Busy)
            }
            Some(false) => {
                self.try_count = 0;
                Some(TickOutcome::Unchanged)
            }
            Some(true) => {
                self.try_count = 0;
                None
            }
        }
    }

    /// One polling step
    pub fn tick(&mut self) -> TickOutcome {
        match self.poll() {
            Some(outcome) => outcome,
            None => {
                let read = self.handler.read();
                self.publish(read)
            }
        }
    }

    /// One polling step that yields instead of blocking while acquiring
    pub async fn tick_async(&mut self) -> TickOutcome {
        match self.poll() {
            Some(outcome) => outcome,
            None => {
                let read = self.handler.read_async().await;
                self.publish(read)
            }
        }
    }

    fn publish(&mut self, read: Result<Clip>) -> TickOutcome {
        match read {
            Ok(clip) => {
                let seq = self.handler.current_seq();
                self.announce(clip);
                TickOutcome::Published(seq)
            }
            Err(ClipboardError::LockTimeout { attempts }) => {
                log::error!("[Monitor] Change seen but lock not acquired after {} attempts", attempts);
                self.handler.force_reset();
                TickOutcome::ForcedReset
            }
            Err(e) => {
                log::error!("[Monitor] Failed to read changed clipboard: {}", e);
                TickOutcome::Failed
            }
        }
    }

    fn announce(&mut self, clip: Clip) {
        log::info!("[Monitor] New content detected: {}", clip);
        self.current = Some(clip.clone());
        (self.callback)(MonitorEvent::Changed);
        (self.callback)(MonitorEvent::NewClip(clip));
    }

    /// Sequence moved since the last read or write
    fn change_pending(&self) -> bool {
        self.handler.live_sequence() != self.handler.current_seq()
    }

    /// Everything currently on the clipboard
    ///
    /// A change not yet published is published with this read.
    pub fn read(&mut self) -> Result<Clip> {
        let previous = self.handler.current_seq();
        let clip = self.handler.read()?;
        self.announce_if_new(previous, &clip);
        Ok(clip)
    }

    pub async fn read_async(&mut self) -> Result<Clip> {
        let previous = self.handler.current_seq();
        let clip = self.handler.read_async().await?;
        self.announce_if_new(previous, &clip);
        Ok(clip)
    }

    fn announce_if_new(&mut self, previous: u32, clip: &Clip) {
        if clip.sequence() != i64::from(previous) {
            self.announce(clip.clone());
        }
    }

    /// Replace the clipboard contents with `clip`
    ///
    /// A pending external change is published first; the monitor does not
    /// report its own write as a change.
    pub fn load(&mut self, clip: &Clip) -> Result<usize> {
        if self.change_pending() {
            let read = self.handler.read();
            self.publish(read);
        }
        let written = self.handler.write(clip)?;
        log::info!("[Monitor] Loaded {} ({} format(s) set)", clip, written);
        Ok(written)
    }

    pub async fn load_async(&mut self, clip: &Clip) -> Result<usize> {
        if self.change_pending() {
            let read = self.handler.read_async().await;
            self.publish(read);
        }
        let written = self.handler.write_async(clip).await?;
        log::info!("[Monitor] Loaded {} ({} format(s) set)", clip, written);
        Ok(written)
    }

    /// Poll until stopped, serving requests between ticks
    ///
    /// Every clipboard wait yields to the runtime. Ends on
    /// [`MonitorCommand::Stop`] or once every [`MonitorHandle`] is dropped.
    pub async fn run(mut self, mut commands: mpsc::Receiver<MonitorCommand>) -> Self {
        let mut ticker = time::interval(self.settings.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        log::info!(
            "[Monitor] Started with {}ms interval",
            self.settings.poll_interval().as_millis()
        );

        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(MonitorCommand::Load { clip, reply }) => {
                        let result = self.load_async(&clip).await;
                        if let Err(e) = &result {
                            log::error!("[Monitor] Failed to load clip: {}", e);
                        }
                        if reply.send(result).is_err() {
                            log::debug!("[Monitor] Load requester went away");
                        }
                    }
                    Some(MonitorCommand::Read { reply }) => {
                        let result = self.read_async().await;
                        if reply.send(result).is_err() {
                            log::debug!("[Monitor] Read requester went away");
                        }
                    }
                    Some(MonitorCommand::Stop) | None => break,
                },
                _ = ticker.tick() => {
                    let outcome = self.tick_async().await;
                    if outcome != TickOutcome::Unchanged {
                        log::debug!("[Monitor] Tick: {:?}", outcome);
                    }
                }
            }
        }

        log::info!("[Monitor] Stopped");
        self
    }
}

impl<N: NativeClipboard> fmt::Debug for Monitor<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Monitor")
            .field("settings", &self.settings)
            .field("try_count", &self.try_count)
            .field("current_seq", &self.handler.current_seq())
            .finish_non_exhaustive()
    }
}

/// Request served by a running monitor
#[derive(Debug)]
pub enum MonitorCommand {
    Load {
        clip: Clip,
        reply: oneshot::Sender<Result<usize>>,
    },
    Read {
        reply: oneshot::Sender<Result<Clip>>,
    },
    Stop,
}

/// Sends commands to a running [`Monitor`]
#[derive(Debug, Clone)]
pub struct MonitorHandle {
    tx: mpsc::Sender<MonitorCommand>,
}

impl MonitorHandle {
    /// Write `clip` to the clipboard, returning the number of formats set
    pub async fn load(&self, clip: Clip) -> Result<usize> {
        let (reply, response) = oneshot::channel();
        self.send(MonitorCommand::Load { clip, reply }).await?;
        response.await.map_err(|_| ClipboardError::MonitorStopped)?
    }

    /// Everything currently on the clipboard
    pub async fn read(&self) -> Result<Clip> {
        let (reply, response) = oneshot::channel();
        self.send(MonitorCommand::Read { reply }).await?;
        response.await.map_err(|_| ClipboardError::MonitorStopped)?
    }

    /// Halt future ticks
    pub async fn stop(&self) {
        if self.send(MonitorCommand::Stop).await.is_err() {
            log::debug!("[Monitor] Already stopped");
        }
    }

    async fn send(&self, command: MonitorCommand) -> Result<()> {
        self.tx
            .send(command)
            .await
            .map_err(|_| ClipboardError::MonitorStopped)
    }
}

/// Command channel for [`Monitor::run`]
pub fn channel() -> (MonitorHandle, mpsc::Receiver<MonitorCommand>) {
    let (tx, rx) = mpsc::channel(COMMAND_CAPACITY);
    (MonitorHandle { tx }, rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clipboard::lock::ClipboardLock;
    use crate::clipboard::native::MemoryClipboard;
    use crate::config::LockSettings;
    use parking_lot::Mutex;
    use std::sync::Arc;

    fn monitor(clipboard: &MemoryClipboard, threshold: u32) -> (Monitor<MemoryClipboard>, Arc<Mutex<Vec<MonitorEvent>>>) {
        let lock_settings = LockSettings {
            attempt_timeout_ms: 1,
            max_attempts: 3,
            release_grace_ms: 0,
        };
        let handler = Handler::with_settings(clipboard.connect(), ClipboardLock::new(), lock_settings);
        let settings = MonitorSettings {
            poll_interval_ms: 1,
            stuck_threshold: threshold,
        };
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let monitor = Monitor::with_settings(handler, settings, move |event| sink.lock().push(event));
        (monitor, events)
    }

    #[test]
    fn test_unchanged_clipboard_publishes_nothing() {
        let clipboard = MemoryClipboard::new();
        let (mut monitor, events) = monitor(&clipboard, 5);
        assert_eq!(monitor.tick(), TickOutcome::Unchanged);
        assert!(events.lock().is_empty());
    }

    #[test]
    fn test_change_publishes_once() {
        let clipboard = MemoryClipboard::new();
        let (mut monitor, events) = monitor(&clipboard, 5);
        clipboard.external_write(&[(8, b"raw")]);

        let seq = clipboard.connect().sequence();
        assert_eq!(monitor.tick(), TickOutcome::Published(seq));
        assert_eq!(monitor.tick(), TickOutcome::Unchanged);

        let events = events.lock();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0], MonitorEvent::Changed);
        assert!(matches!(&events[1], MonitorEvent::NewClip(clip) if clip.sequence() == i64::from(seq)));
        assert_eq!(monitor.current().map(Clip::len), Some(1));
    }

    #[test]
    fn test_busy_ticks_count_up_then_reset() {
        let clipboard = MemoryClipboard::new();
        let (mut monitor, _events) = monitor(&clipboard, 3);
        let stray = monitor.handler().lock().try_hold().unwrap();

        for expected in 1..=3 {
            assert_eq!(monitor.tick(), TickOutcome::Busy);
            assert_eq!(monitor.try_count(), expected);
        }
        assert_eq!(monitor.tick(), TickOutcome::ForcedReset);
        assert_eq!(monitor.try_count(), 0);
        assert!(!stray.is_current());
        assert_eq!(monitor.tick(), TickOutcome::Unchanged);
    }

    #[test]
    fn test_load_is_not_republished() {
        let clipboard = MemoryClipboard::new();
        let (mut monitor, events) = monitor(&clipboard, 5);
        assert_eq!(monitor.load(&Clip::from_item("mine")).unwrap(), 1);
        assert_eq!(monitor.tick(), TickOutcome::Unchanged);
        assert!(events.lock().is_empty());
    }

    #[test]
    fn test_read_failure_keeps_cached_sequence() {
        let clipboard = MemoryClipboard::new();
        let (mut monitor, events) = monitor(&clipboard, 5);
        let before = monitor.handler().current_seq();
        clipboard.external_write(&[(13, b"a\0\0\0")]);
        clipboard.deny_opens(3);

        assert_eq!(monitor.tick(), TickOutcome::ForcedReset);
        assert_eq!(monitor.handler().current_seq(), before);
        assert!(events.lock().is_empty());

        assert!(matches!(monitor.tick(), TickOutcome::Published(_)));
    }

    #[test]
    fn test_load_publishes_pending_change_first() {
        let clipboard = MemoryClipboard::new();
        let (mut monitor, events) = monitor(&clipboard, 5);
        clipboard.external_write(&[(8, b"theirs")]);
        let theirs = clipboard.connect().sequence();

        assert_eq!(monitor.load(&Clip::from_item("mine")).unwrap(), 1);
        {
            let events = events.lock();
            assert_eq!(events.len(), 2);
            assert_eq!(events[0], MonitorEvent::Changed);
            assert!(matches!(&events[1], MonitorEvent::NewClip(clip) if clip.sequence() == i64::from(theirs)));
        }
        assert_eq!(monitor.tick(), TickOutcome::Unchanged);
        assert_eq!(events.lock().len(), 2);
    }

    #[test]
    fn test_read_announces_only_unseen_changes() {
        let clipboard = MemoryClipboard::new();
        let (mut monitor, events) = monitor(&clipboard, 5);
        clipboard.external_write(&[(8, b"raw")]);

        monitor.read().unwrap();
        assert_eq!(events.lock().len(), 2);
        monitor.read().unwrap();
        assert_eq!(events.lock().len(), 2);
        assert_eq!(monitor.tick(), TickOutcome::Unchanged);
    }
}
