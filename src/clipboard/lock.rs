//! clipcards - Clipboard lock
//!
//! Process-wide mutual exclusion around the native clipboard. Create one at
//! startup and hand clones to every handler and monitor that share it.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

/// How often an async waiter re-checks the lock
const POLL_STEP: Duration = Duration::from_millis(1);

#[derive(Debug, Default)]
struct LockState {
    /// Token of the current holder
    holder: Mutex<Option<u64>>,
    released: Condvar,
    next_token: AtomicU64,
}

/// Shared handle to the clipboard lock
#[derive(Debug, Clone, Default)]
pub struct ClipboardLock {
    inner: Arc<LockState>,
}

impl ClipboardLock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the lock without waiting
    pub fn try_hold(&self) -> Option<LockHold> {
        let mut holder = self.inner.holder.lock();
        if holder.is_some() {
            return None;
        }
        Some(self.grant(&mut holder))
    }

    /// Take the lock, waiting at most `timeout`
    pub fn hold_for(&self, timeout: Duration) -> Option<LockHold> {
        let deadline = Instant::now() + timeout;
        let mut holder = self.inner.holder.lock();
        while holder.is_some() {
            if self.inner.released.wait_until(&mut holder, deadline).timed_out() && holder.is_some() {
                return None;
            }
        }
        Some(self.grant(&mut holder))
    }

    /// Take the lock within `timeout` without blocking the thread
    ///
    /// Polls and yields to the runtime between checks.
    pub async fn hold_within(&self, timeout: Duration) -> Option<LockHold> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(hold) = self.try_hold() {
                return Some(hold);
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            tokio::time::sleep(POLL_STEP.min(deadline - now)).await;
        }
    }

    pub fn is_held(&self) -> bool {
        self.inner.holder.lock().is_some()
    }

    /// Release the lock regardless of who holds it
    ///
    /// The previous holder's [`LockHold`] becomes inert. Returns whether the
    /// lock was held.
    pub fn force_unlock(&self) -> bool {
        let mut holder = self.inner.holder.lock();
        let was_held = holder.take().is_some();
        self.inner.released.notify_all();
        was_held
    }

    fn grant(&self, holder: &mut Option<u64>) -> LockHold {
        let token = self.inner.next_token.fetch_add(1, Ordering::Relaxed);
        *holder = Some(token);
        LockHold {
            lock: self.clone(),
            token,
            released: false,
        }
    }
}

/// Proof of holding the clipboard lock; released on drop
#[derive(Debug)]
pub struct LockHold {
    lock: ClipboardLock,
    token: u64,
    released: bool,
}

impl LockHold {
    /// Whether this hold still owns the lock (a forced unlock revokes it)
    pub fn is_current(&self) -> bool {
        !self.released && *self.lock.inner.holder.lock() == Some(self.token)
    }

    pub fn release(mut self) {
        self.unlock();
    }

    fn unlock(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        let mut holder = self.lock.inner.holder.lock();
        if *holder == Some(self.token) {
            *holder = None;
            self.lock.inner.released.notify_one();
        } else {
            log::debug!("[Lock] Hold {} was revoked before release", self.token);
        }
    }
}

impl Drop for LockHold {
    fn drop(&mut self) {
        self.unlock();
    }
}
